use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    errors::ServiceError,
    models::{DependentLine, Document, LineItem},
    services::money::{amounts_with_tax, tax_for},
};

/// Header-level totals folded from the current line set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTotals {
    /// Σ quantity × unit_price
    pub subtotal: Decimal,
    /// Σ tax, using each line's precomputed tax when present.
    pub tax_total: Decimal,
    /// Σ line discounts actually applied.
    pub line_discount_total: Decimal,
    pub document_discount: Decimal,
    /// Σ line total_price − document discount, floored at zero.
    pub grand_total: Decimal,
}

/// Pure fold over the lines. Calling it twice on the same input yields the
/// same totals.
pub fn compute_totals(items: &[LineItem], document_discount: Decimal) -> DocumentTotals {
    let mut totals = items
        .iter()
        .map(LineItem::amounts)
        .fold(DocumentTotals::default(), |mut totals, amounts| {
            totals.subtotal = totals.subtotal.saturating_add(amounts.subtotal);
            totals.tax_total = totals.tax_total.saturating_add(amounts.tax_amount);
            totals.line_discount_total = totals.line_discount_total.saturating_add(amounts.discount);
            totals
        });

    totals.document_discount = document_discount;
    totals.grand_total = totals
        .subtotal
        .saturating_add(totals.tax_total)
        .saturating_sub(totals.line_discount_total)
        .saturating_sub(document_discount)
        .max(Decimal::ZERO);
    totals
}

/// Rejects a line set whose summed line totals do not fit in a `Decimal`,
/// even though every line does on its own.
pub fn ensure_totals_in_range(items: &[LineItem]) -> Result<(), ServiceError> {
    items
        .iter()
        .try_fold(Decimal::ZERO, |acc, item| {
            let amounts = item.amounts();
            acc.checked_add(amounts.subtotal)?.checked_add(amounts.tax_amount)
        })
        .map(|_| ())
        .ok_or_else(|| {
            ServiceError::ValidationError("Document total is out of the representable range".into())
        })
}

pub fn document_totals(document: &Document) -> DocumentTotals {
    compute_totals(&document.items, document.discount)
}

/// Amount billed for invoicing `lines` of `document`: the invoiced share of
/// each line's subtotal, its tax at the line's rate and a pro-rated share of
/// the line discount.
pub fn invoice_amount(document: &Document, lines: &[DependentLine]) -> Result<Decimal, ServiceError> {
    lines.iter().try_fold(Decimal::ZERO, |acc, invoiced| {
        let line = document
            .line(invoiced.source_line_id)
            .ok_or_else(|| ServiceError::line_not_found(invoiced.source_line_id))?;
        if line.quantity.is_zero() {
            return Ok(acc);
        }
        let share = invoiced.quantity / line.quantity;
        let subtotal = invoiced.quantity.saturating_mul(line.unit_price);
        let tax = match line.tax_amount {
            Some(tax_amount) => tax_amount.saturating_mul(share),
            None => tax_for(subtotal, line.tax_percent),
        };
        let amounts = amounts_with_tax(subtotal, tax, line.discount.saturating_mul(share));
        Ok(acc.saturating_add(amounts.total_price))
    })
}
