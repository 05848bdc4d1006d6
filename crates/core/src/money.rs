use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Renders an integer rupiah amount as `Rp1.500.000`.
pub fn format_rupiah(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    if amount < 0 {
        format!("-Rp{grouped}")
    } else {
        format!("Rp{grouped}")
    }
}

/// `ceil(numerator / denominator)` for positive rupiah values.
pub fn ceil_div(numerator: i64, denominator: i64) -> i64 {
    if denominator <= 0 {
        return numerator;
    }
    (numerator + denominator - 1) / denominator
}

/// Applies a percentage rate to an amount and rounds half away from zero.
pub fn apply_rate(amount: i64, rate_percent: Decimal) -> i64 {
    let value = Decimal::from(amount) * rate_percent / Decimal::ONE_HUNDRED;
    value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero).to_i64().unwrap_or(0)
}
