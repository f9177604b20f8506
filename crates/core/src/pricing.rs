use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::quote::{LineItem, QuoteData};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteTotals {
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
}

pub trait TotalsEngine: Send + Sync {
    fn totals(&self, quote: &QuoteData) -> QuoteTotals;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DeterministicTotalsEngine;

impl TotalsEngine for DeterministicTotalsEngine {
    fn totals(&self, quote: &QuoteData) -> QuoteTotals {
        compute_totals(&quote.items, quote.tax_rate)
    }
}

/// Sum of line totals, clamped at the decimal bounds.
pub fn subtotal(items: &[LineItem]) -> Decimal {
    items.iter().fold(Decimal::ZERO, |sum, item| sum.saturating_add(item.line_total()))
}

/// Derives subtotal, tax and grand total. Nothing is rounded here; the money
/// formatter rounds for display only.
///
/// Never panics. When a step leaves the decimal range the result is clamped
/// to `Decimal::MAX` or `Decimal::MIN`, following the sign of the exact
/// value; [`checked_totals`] tells whether that happened.
pub fn compute_totals(items: &[LineItem], tax_rate_percent: Decimal) -> QuoteTotals {
    checked_totals(items, tax_rate_percent)
        .unwrap_or_else(|| saturating_totals(items, tax_rate_percent))
}

/// Exact totals, or `None` when any intermediate amount overflows.
pub fn checked_totals(items: &[LineItem], tax_rate_percent: Decimal) -> Option<QuoteTotals> {
    let subtotal = items
        .iter()
        .try_fold(Decimal::ZERO, |sum, item| sum.checked_add(item.checked_line_total()?))?;
    let tax_amount = subtotal.checked_mul(tax_rate_percent)?.checked_div(Decimal::ONE_HUNDRED)?;
    let total = subtotal.checked_add(tax_amount)?;

    Some(QuoteTotals { subtotal, tax_amount, total })
}

fn saturating_totals(items: &[LineItem], tax_rate_percent: Decimal) -> QuoteTotals {
    let subtotal = subtotal(items);
    let tax_amount = subtotal
        .checked_mul(tax_rate_percent)
        .and_then(|product| product.checked_div(Decimal::ONE_HUNDRED))
        .or_else(|| {
            subtotal
                .checked_div(Decimal::ONE_HUNDRED)
                .map(|share| share.saturating_mul(tax_rate_percent))
        })
        .unwrap_or(Decimal::ZERO);
    let total = subtotal.saturating_add(tax_amount);

    QuoteTotals { subtotal, tax_amount, total }
}
