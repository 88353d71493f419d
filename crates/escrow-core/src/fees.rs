//! Fee and payout calculator.
//!
//! A pure function splitting an order amount into the seller payout and the
//! platform fee. The fee is rounded to money precision and the payout is
//! derived by subtraction, so `payout + fee == amount` holds exactly and no
//! rounding leakage can occur.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

/// Fixed platform fee rate (10%).
pub const PLATFORM_FEE_RATE: Decimal = dec!(0.10);

/// Decimal places used for monetary values.
pub const MONEY_PRECISION: u32 = 2;

/// Result of splitting an amount at settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSplit {
	/// Amount released to the seller.
	pub payout: Decimal,
	/// Amount retained by the platform.
	pub fee: Decimal,
}

/// Splits an amount into seller payout and platform fee.
///
/// The fee is `amount * fee_rate` rounded to [`MONEY_PRECISION`] decimal
/// places (midpoint away from zero); the payout is the exact remainder.
pub fn split_amount(amount: Decimal, fee_rate: Decimal) -> FeeSplit {
	let fee = (amount * fee_rate)
		.round_dp_with_strategy(MONEY_PRECISION, RoundingStrategy::MidpointAwayFromZero);
	FeeSplit {
		payout: amount - fee,
		fee,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn splits_round_amount() {
		let split = split_amount(dec!(1000), PLATFORM_FEE_RATE);
		assert_eq!(split.fee, dec!(100.00));
		assert_eq!(split.payout, dec!(900.00));
	}

	#[test]
	fn fee_conservation_holds_for_awkward_amounts() {
		for amount in [
			dec!(0.01),
			dec!(0.05),
			dec!(33.33),
			dec!(49.99),
			dec!(100.01),
			dec!(999.99),
			dec!(123456.78),
		] {
			let split = split_amount(amount, PLATFORM_FEE_RATE);
			assert_eq!(
				split.payout + split.fee,
				amount,
				"leakage for amount {}",
				amount
			);
		}
	}

	#[test]
	fn sub_cent_fees_round_to_money_precision() {
		// 0.05 * 0.10 = 0.005, rounds away from zero to 0.01
		let split = split_amount(dec!(0.05), PLATFORM_FEE_RATE);
		assert_eq!(split.fee, dec!(0.01));
		assert_eq!(split.payout, dec!(0.04));

		// 0.01 * 0.10 = 0.001, rounds down to zero
		let split = split_amount(dec!(0.01), PLATFORM_FEE_RATE);
		assert_eq!(split.fee, dec!(0.00));
		assert_eq!(split.payout, dec!(0.01));
	}

	#[test]
	fn zero_rate_takes_no_fee() {
		let split = split_amount(dec!(50), Decimal::ZERO);
		assert_eq!(split.fee, Decimal::ZERO);
		assert_eq!(split.payout, dec!(50));
	}
}
