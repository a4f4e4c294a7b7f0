//! src/markets/types.rs

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

use crate::markets::errors::MarketError;
use crate::markets::math;

/// Identity of a fungible asset on chain. Equality is tag + payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AssetInfo {
    NativeToken { denom: String },
    Token { contract_addr: String },
}

impl AssetInfo {
    pub fn native(denom: &str) -> Self {
        AssetInfo::NativeToken {
            denom: denom.to_string(),
        }
    }

    pub fn token(contract_addr: &str) -> Self {
        AssetInfo::Token {
            contract_addr: contract_addr.to_string(),
        }
    }

    /// Vertex key in the route graph: denom or contract address.
    pub fn id(&self) -> &str {
        match self {
            AssetInfo::NativeToken { denom } => denom,
            AssetInfo::Token { contract_addr } => contract_addr,
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, AssetInfo::NativeToken { .. })
    }
}

/// An amount of a specific asset. Immutable value type: derived assets are
/// always new values, reserves are only rewritten through [`Pool`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Asset {
    pub info: AssetInfo,
    #[serde(with = "uint128_string")]
    pub amount: u128,
}

impl Asset {
    pub fn new(info: AssetInfo, amount: u128) -> Self {
        Asset { info, amount }
    }
}

/// Uint128 JSON convention: amounts travel as decimal strings.
pub mod uint128_string {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<u128>()
            .map_err(|e| D::Error::custom(format!("invalid Uint128 '{}': {}", raw, e)))
    }
}

/// Contract dialect a pool speaks. Selected once at pool construction and
/// used to pick the matching message encoder, never re-dispatched per call.
#[derive(Debug, Clone, Copy, EnumIter, Serialize, Deserialize, Eq, PartialEq, Hash, Display)]
#[serde(rename_all = "snake_case")]
pub enum DexVariant {
    ConstantProduct,
    Wynd,
    Junoswap,
    Osmosis,
    ConcentratedLiquidity,
}

impl Default for DexVariant {
    fn default() -> Self {
        DexVariant::ConstantProduct
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash, Display)]
#[serde(rename_all = "snake_case")]
pub enum PairType {
    Xyk,
    Stable,
    Concentrated,
}

/// Curve parameters carried by concentrated-liquidity pools.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ClParams {
    pub d: f64,
    pub amp: f64,
    pub gamma: f64,
    pub price_scale: f64,
    pub fee_gamma: f64,
    pub mid_fee: f64,
    pub out_fee: f64,
}

/// One on-chain liquidity venue. Identity is `address`; the tracked set never
/// holds two pools with the same address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pool {
    pub address: String,
    pub assets: [Asset; 2],
    #[serde(with = "uint128_string")]
    pub total_share: u128,
    #[serde(default)]
    pub variant: DexVariant,
    pub pair_type: PairType,
    pub input_fee_bps: u16,
    pub output_fee_bps: u16,
    #[serde(default)]
    pub factory_addr: Option<String>,
    #[serde(default)]
    pub router_addr: Option<String>,
    #[serde(default)]
    pub cl_params: Option<ClParams>,
}

impl Pool {
    /// Builds a pool, rejecting empty reserves up front so the solver never
    /// sees a degenerate venue.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        address: String,
        assets: [Asset; 2],
        total_share: u128,
        variant: DexVariant,
        pair_type: PairType,
        input_fee_bps: u16,
        output_fee_bps: u16,
        factory_addr: Option<String>,
        router_addr: Option<String>,
        cl_params: Option<ClParams>,
    ) -> Result<Self, MarketError> {
        if assets[0].amount == 0 || assets[1].amount == 0 {
            return Err(MarketError::EmptyReserve { pool: address });
        }
        if assets[0].info == assets[1].info {
            return Err(MarketError::DuplicateAssets { pool: address });
        }
        Ok(Pool {
            address,
            assets,
            total_share,
            variant,
            pair_type,
            input_fee_bps,
            output_fee_bps,
            factory_addr,
            router_addr,
            cl_params,
        })
    }

    pub fn has_asset(&self, info: &AssetInfo) -> bool {
        self.assets.iter().any(|a| &a.info == info)
    }

    /// Reserve of `info`, if this pool carries it.
    pub fn reserve(&self, info: &AssetInfo) -> Option<&Asset> {
        self.assets.iter().find(|a| &a.info == info)
    }

    /// The opposite side of the pair from `info`.
    pub fn other_side(&self, info: &AssetInfo) -> Option<&Asset> {
        self.assets.iter().find(|a| &a.info != info)
    }

    /// Output for swapping `offer` into this pool, floored the same way the
    /// contract floors, without touching reserves.
    pub fn out_given_in(&self, offer: &Asset) -> Result<Asset, MarketError> {
        let reserve_in = self
            .reserve(&offer.info)
            .ok_or_else(|| MarketError::AssetNotInPool {
                pool: self.address.clone(),
                asset: offer.info.id().to_string(),
            })?;
        let reserve_out = self
            .other_side(&offer.info)
            .ok_or_else(|| MarketError::AssetNotInPool {
                pool: self.address.clone(),
                asset: offer.info.id().to_string(),
            })?;
        let amount = math::out_given_in(
            reserve_in.amount,
            reserve_out.amount,
            offer.amount,
            self.input_fee_bps,
            self.output_fee_bps,
        )?;
        Ok(Asset::new(reserve_out.info.clone(), amount))
    }

    /// Applies a swap to the reserves in place and returns the output asset.
    /// Only the state projector and tests call this; live state is replaced
    /// wholesale by refreshes.
    pub fn apply_swap(&mut self, offer: &Asset) -> Result<Asset, MarketError> {
        let out = self.out_given_in(offer)?;
        let out_reserve = self.reserve(&out.info).map(|a| a.amount).unwrap_or_default();
        if out.amount >= out_reserve {
            return Err(MarketError::InsufficientLiquidity {
                pool: self.address.clone(),
                requested: out.amount,
                available: out_reserve,
            });
        }
        for asset in self.assets.iter_mut() {
            if asset.info == offer.info {
                asset.amount += offer.amount;
            } else {
                asset.amount -= out.amount;
            }
        }
        Ok(out)
    }

    /// Fee multiplier pair `(1 - input_fee, 1 - output_fee)` as reals, for
    /// the closed-form solver.
    pub fn fee_multipliers(&self) -> (f64, f64) {
        (
            1.0 - f64::from(self.input_fee_bps) / f64::from(math::BPS),
            1.0 - f64::from(self.output_fee_bps) / f64::from(math::BPS),
        )
    }
}


#[cfg(test)]
mod tests {
    use super::testing::xyk_pool;
    use super::*;

    fn uatom() -> AssetInfo {
        AssetInfo::native("uatom")
    }

    fn uosmo() -> AssetInfo {
        AssetInfo::native("uosmo")
    }

    #[test]
    fn rejects_zero_reserve() {
        let res = Pool::new(
            "pool1".to_string(),
            [Asset::new(uatom(), 0), Asset::new(uosmo(), 100)],
            0,
            DexVariant::ConstantProduct,
            PairType::Xyk,
            30,
            0,
            None,
            None,
            None,
        );
        assert!(matches!(res, Err(MarketError::EmptyReserve { .. })));
    }

    #[test]
    fn apply_swap_moves_both_reserves() {
        let mut pool = xyk_pool(
            "pool1",
            Asset::new(uatom(), 1_000_000),
            Asset::new(uosmo(), 2_000_000),
            30,
        );
        let out = pool
            .apply_swap(&Asset::new(uatom(), 10_000))
            .expect("swap applies");
        assert_eq!(pool.reserve(&uatom()).unwrap().amount, 1_010_000);
        assert_eq!(
            pool.reserve(&uosmo()).unwrap().amount,
            2_000_000 - out.amount
        );
        assert!(out.amount > 0);
        assert_eq!(out.info, uosmo());
    }

    #[test]
    fn asset_amount_round_trips_as_string() {
        let asset = Asset::new(uatom(), 340_282_366_920_938_463_463);
        let raw = serde_json::to_string(&asset).unwrap();
        assert!(raw.contains("\"340282366920938463463\""));
        let back: Asset = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, asset);
    }

    #[test]
    fn asset_info_json_shape() {
        let info: AssetInfo =
            serde_json::from_str(r#"{"native_token":{"denom":"uatom"}}"#).unwrap();
        assert_eq!(info, uatom());
        let info: AssetInfo =
            serde_json::from_str(r#"{"token":{"contract_addr":"juno1abc"}}"#).unwrap();
        assert_eq!(info.id(), "juno1abc");
    }
}
