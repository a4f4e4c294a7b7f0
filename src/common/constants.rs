pub static PROJECT_NAME: &str = "mev_bot_cosmos";

pub fn get_env(key: &str) -> String {
    std::env::var(key).unwrap_or(String::from(""))
}

/// Process environment: endpoints and secrets. Everything that shapes trading
/// behavior lives in config.json instead.
#[derive(Debug, Clone)]
pub struct Env {
    pub rpc_url: String,
    pub lcd_url: String,
    pub signer_url: String,
    pub sender_address: String,
    pub config_path: String,
    pub telegram_bot_token: String,
    pub telegram_chat_id: Option<i64>,
    pub log_file: Option<String>,
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}

impl Env {
    pub fn new() -> Self {
        let config_path = {
            let raw = get_env("CONFIG_PATH");
            if raw.is_empty() {
                String::from("config.json")
            } else {
                raw
            }
        };
        Env {
            rpc_url: get_env("RPC_URL"),
            lcd_url: get_env("LCD_URL"),
            signer_url: get_env("SIGNER_URL"),
            sender_address: get_env("SENDER_ADDRESS"),
            config_path,
            telegram_bot_token: get_env("TELEGRAM_BOT_TOKEN"),
            telegram_chat_id: get_env("TELEGRAM_CHAT_ID").parse().ok(),
            log_file: {
                let raw = get_env("LOG_FILE");
                if raw.is_empty() {
                    None
                } else {
                    Some(raw)
                }
            },
        }
    }
}
