//! src/markets/math.rs - Constant-product swap math
//!
//! Integer math mirrors the wasm contracts: every division floors. The
//! floating-point helpers exist for the closed-form solver only; amounts that
//! reach a transaction are always floored integers.

use crate::markets::errors::MarketError;

/// Basis-point denominator shared by every fee field.
pub const BPS: u16 = 10_000;

/// Output of a constant-product swap with input and output fees, floored at
/// each step exactly like the on-chain implementation.
pub fn out_given_in(
    reserve_in: u128,
    reserve_out: u128,
    amount_in: u128,
    input_fee_bps: u16,
    output_fee_bps: u16,
) -> Result<u128, MarketError> {
    if reserve_in == 0 || reserve_out == 0 {
        return Err(MarketError::EmptyReserve {
            pool: String::new(),
        });
    }
    if amount_in == 0 {
        return Ok(0);
    }
    let in_after_fee = mul_bps(amount_in, BPS - input_fee_bps)?;
    let numerator = reserve_out
        .checked_mul(in_after_fee)
        .ok_or(MarketError::Overflow)?;
    let gross = numerator / (reserve_in + in_after_fee);
    mul_bps(gross, BPS - output_fee_bps)
}

/// `amount * bps / 10_000` with overflow checking, floored.
fn mul_bps(amount: u128, bps: u16) -> Result<u128, MarketError> {
    amount
        .checked_mul(u128::from(bps))
        .map(|v| v / u128::from(BPS))
        .ok_or(MarketError::Overflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_in_zero_out() {
        assert_eq!(out_given_in(1_000, 1_000, 0, 30, 0).unwrap(), 0);
    }

    #[test]
    fn fee_strictly_reduces_output() {
        let no_fee = out_given_in(1_000_000, 1_000_000, 10_000, 0, 0).unwrap();
        let with_fee = out_given_in(1_000_000, 1_000_000, 10_000, 30, 0).unwrap();
        assert!(with_fee < no_fee);
        let with_both = out_given_in(1_000_000, 1_000_000, 10_000, 30, 15).unwrap();
        assert!(with_both < with_fee);
    }

    #[test]
    fn product_never_decreases() {
        // Fees only ever net-increase the invariant product.
        let cases = [
            (1_000u128, 1_000u128, 1u128, 0u16),
            (1_000, 1_000, 500, 30),
            (1_000_000, 3_000_000, 250_000, 100),
            (7, 13, 5, 0),
            (1_000_000_000_000, 900_000_000_000, 123_456_789, 20),
        ];
        for (r_in, r_out, amount, fee) in cases {
            let out = out_given_in(r_in, r_out, amount, fee, 0).unwrap();
            let before = r_in * r_out;
            let after = (r_in + amount) * (r_out - out);
            assert!(
                after >= before,
                "product shrank for ({}, {}, {}, {})",
                r_in,
                r_out,
                amount,
                fee
            );
        }
    }

    #[test]
    fn empty_reserve_is_an_error() {
        assert!(out_given_in(0, 1_000, 10, 30, 0).is_err());
        assert!(out_given_in(1_000, 0, 10, 30, 0).is_err());
    }
}
