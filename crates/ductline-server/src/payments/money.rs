//! Conversions between edge amounts (decimal currency units) and stored cents.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Largest single checkout accepted, in cents.
pub const MAX_AMOUNT_CENTS: i64 = 100_000_000;

/// Convert a decimal amount to cents. Half-cents round away from zero.
///
/// Returns `None` for non-positive or oversized amounts.
pub fn to_cents(amount: Decimal) -> Option<i64> {
    if amount <= Decimal::ZERO {
        return None;
    }
    let cents = amount
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .checked_mul(Decimal::ONE_HUNDRED)?
        .to_i64()?;
    (1..=MAX_AMOUNT_CENTS).contains(&cents).then_some(cents)
}

/// Render cents the way processors expect totals: `"25.00"`.
pub fn format_cents(cents: i64) -> String {
    Decimal::new(cents, 2).to_string()
}
