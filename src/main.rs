use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;

use mev_bot_cosmos::chain::notifier::{FanoutNotifier, LogNotifier, Notifier, TelegramNotifier};
use mev_bot_cosmos::chain::rpc::HttpChainClient;
use mev_bot_cosmos::common::config::Config;
use mev_bot_cosmos::common::constants::Env;
use mev_bot_cosmos::common::utils::setup_logger;
use mev_bot_cosmos::execution::scheduler::ArbEngine;
use mev_bot_cosmos::telemetry::Metrics;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let env = Env::new();
    setup_logger(env.log_file.as_deref()).expect("logger setup");

    info!("Starting mev_bot_cosmos");

    // Config and setup failures are the one fatal class: better to die here
    // than trade against a half-known venue set.
    let config = Config::load(&env.config_path)
        .map_err(|e| anyhow::anyhow!("{}", e))
        .with_context(|| format!("loading {}", env.config_path))?;
    info!(
        "⚙️ {}: {} pools, {} orderbooks, max {} hops, root {}",
        config.chain_id,
        config.pools.len(),
        config.orderbooks.len(),
        config.max_hops,
        config.root_asset.id()
    );

    let mut sinks: Vec<Arc<dyn Notifier>> = vec![Arc::new(LogNotifier)];
    match (env.telegram_bot_token.is_empty(), env.telegram_chat_id) {
        (false, Some(chat_id)) => {
            sinks.push(Arc::new(TelegramNotifier::new(&env.telegram_bot_token, chat_id)));
            info!("📣 Telegram notifications enabled");
        }
        _ => info!("📣 Telegram not configured, logging notifications only"),
    }
    let notifier: Arc<dyn Notifier> = Arc::new(FanoutNotifier::new(sinks));

    let client = Arc::new(HttpChainClient::new(
        env.rpc_url.clone(),
        env.lcd_url.clone(),
        env.signer_url.clone(),
        env.sender_address.clone(),
        &config.orderbooks,
    ));

    let metrics = Metrics::new();
    let engine = ArbEngine::init(client, config, notifier, metrics)
        .await
        .context("engine init")?;

    engine.run().await
}
