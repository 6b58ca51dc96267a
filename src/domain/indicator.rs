//! Exact-decimal indicator helpers used by strategies.

use rust_decimal::Decimal;

/// Simple moving average of the last `window` values, `None` when there are
/// fewer than `window` values or `window` is zero.
pub fn sma(values: &[Decimal], window: usize) -> Option<Decimal> {
    if window == 0 || values.len() < window {
        return None;
    }
    let segment = &values[values.len() - window..];
    let sum: Decimal = segment.iter().sum();
    Some(sum / Decimal::from(window))
}

/// min(1, |short − long| / |long|); zero when `long` is zero.
pub fn spread_confidence(short: Decimal, long: Decimal) -> Decimal {
    if long.is_zero() {
        return Decimal::ZERO;
    }
    let ratio = (short - long).abs() / long.abs();
    ratio.min(Decimal::ONE)
}
