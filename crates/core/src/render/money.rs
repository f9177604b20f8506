//! Monetary display for every layout.
//!
//! Amounts are shown the fr-FR way: rounded half away from zero to two
//! places, digits grouped by a narrow no-break space, a decimal comma and a
//! trailing currency symbol after a no-break space, e.g. `2 850,00 €`.

use std::collections::HashMap;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::domain::quote::DEFAULT_CURRENCY;

pub const GROUP_SEPARATOR: char = '\u{202f}';
pub const SYMBOL_SEPARATOR: char = '\u{a0}';
const DECIMAL_SEPARATOR: char = ',';
const FRACTION_DIGITS: u32 = 2;

pub fn format_money(amount: Decimal, currency: &str) -> String {
    let rounded =
        amount.round_dp_with_strategy(FRACTION_DIGITS, RoundingStrategy::MidpointAwayFromZero);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let digits = format!("{:.2}", rounded.abs());
    let (integer, fraction) = digits.split_once('.').unwrap_or((digits.as_str(), "00"));

    let mut output = String::with_capacity(digits.len() + currency.len() + 8);
    if negative {
        output.push('-');
    }
    output.push_str(&group_thousands(integer));
    output.push(DECIMAL_SEPARATOR);
    output.push_str(fraction);

    let currency = currency.trim();
    if !currency.is_empty() {
        output.push(SYMBOL_SEPARATOR);
        output.push_str(currency);
    }
    output
}

/// Plain number display for quantities and the tax percentage: `5`, `1.5`, `20`.
pub fn format_number(value: Decimal) -> String {
    value.normalize().to_string()
}

fn group_thousands(integer: &str) -> String {
    let len = integer.len();
    let mut grouped = String::with_capacity(len + len / 3 * GROUP_SEPARATOR.len_utf8());
    for (index, digit) in integer.chars().enumerate() {
        if index > 0 && (len - index) % 3 == 0 {
            grouped.push(GROUP_SEPARATOR);
        }
        grouped.push(digit);
    }
    grouped
}

/// Tera `money` filter: `line.unit_price | money(currency=currency)`.
///
/// Accepts decimals serialized as strings as well as plain JSON numbers.
pub fn tera_money_filter(
    value: &tera::Value,
    args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let amount = match value {
        tera::Value::String(raw) => Decimal::from_str(raw)
            .map_err(|error| tera::Error::msg(format!("money filter: `{raw}`: {error}")))?,
        tera::Value::Number(number) => Decimal::from_str(&number.to_string())
            .or_else(|_| Decimal::from_scientific(&number.to_string()))
            .map_err(|error| tera::Error::msg(format!("money filter: `{number}`: {error}")))?,
        tera::Value::Null => Decimal::ZERO,
        other => {
            return Err(tera::Error::msg(format!(
                "money filter expects a number or decimal string, got `{other}`"
            )))
        }
    };

    let currency = args.get("currency").and_then(tera::Value::as_str).unwrap_or(DEFAULT_CURRENCY);

    Ok(tera::Value::String(format_money(amount, currency)))
}
