//! Monetary amount formatting per provider convention.
//!
//! There is no shared numeric format: some protocols want minor units as an
//! integer string, some a period-decimal two-place format, and the Finnish
//! and Swedish bank formats use a comma decimal separator with or without
//! a no-break-space thousands separator. Each formatter here reproduces one
//! such convention exactly; the adapters pick the one their wire protocol
//! dictates.

use rust_decimal::{Decimal, RoundingStrategy};

/// fi-FI / sv-SE group separator is the no-break space.
const GROUP_SEPARATOR: char = '\u{a0}';

/// `100.25`, invariant two-decimal format.
pub fn invariant_2dp(amount: Decimal) -> String {
    format!(
        "{:.2}",
        amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    )
}

/// `100,25`, comma decimal separator, no grouping.
pub fn comma_2dp(amount: Decimal) -> String {
    invariant_2dp(amount).replace('.', ",")
}

/// `1 234,50`, comma decimal separator with no-break-space thousands
/// grouping.
pub fn grouped_comma_2dp(amount: Decimal) -> String {
    let plain = invariant_2dp(amount);
    let (integral, fraction) = plain.split_once('.').unwrap_or((plain.as_str(), "00"));
    let (sign, digits) = match integral.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", integral),
    };
    let mut grouped = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(GROUP_SEPARATOR);
        }
        grouped.push(ch);
    }
    format!("{sign}{grouped},{fraction}")
}

/// `10025`, amount in minor units (hundredths), rounded.
pub fn minor_units(amount: Decimal) -> String {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .normalize()
        .to_string()
}

/// `10025`, amount in minor units, truncated downwards. Some protocols
/// specify a floor rather than rounding.
pub fn minor_units_floor(amount: Decimal) -> String {
    (amount * Decimal::ONE_HUNDRED).floor().normalize().to_string()
}

/// `1100`, whole units, rounded to zero decimals.
pub fn whole_units(amount: Decimal) -> String {
    amount
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .normalize()
        .to_string()
}

/// Parses a returned amount in the invariant format. `None` covers both
/// missing and malformed values, which verifiers treat as a rejection.
pub fn parse_invariant(value: Option<&str>) -> Option<Decimal> {
    value.and_then(|v| v.trim().parse::<Decimal>().ok())
}

/// Parses a returned amount expressed in minor units back to major units.
pub fn parse_minor_units(value: Option<&str>) -> Option<Decimal> {
    parse_invariant(value).map(|v| v / Decimal::ONE_HUNDRED)
}
