//! Per-line money arithmetic.
//!
//! All values stay at full `Decimal` precision. Rounding happens only through
//! [`round_for_display`], at the presentation edge.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;

const ONE_HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Amounts derived from a single line's quantity, price, tax and discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineAmounts {
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    /// The discount actually applied, never more than `subtotal + tax_amount`.
    pub discount: Decimal,
    pub total_price: Decimal,
}

/// Tax on a subtotal for a percentage in `0..=100`. Saturates instead of
/// overflowing; stored lines are range-checked with [`checked_gross`] first.
pub fn tax_for(subtotal: Decimal, tax_percent: Decimal) -> Decimal {
    subtotal.saturating_mul(tax_percent) / ONE_HUNDRED
}

fn out_of_range(what: &str) -> ServiceError {
    ServiceError::ValidationError(format!("{} is out of the representable range", what))
}

/// `quantity × unit_price`, rejecting products `Decimal` cannot hold.
pub fn checked_subtotal(quantity: Decimal, unit_price: Decimal) -> Result<Decimal, ServiceError> {
    quantity
        .checked_mul(unit_price)
        .ok_or_else(|| out_of_range("Line subtotal"))
}

pub fn checked_tax(subtotal: Decimal, tax_percent: Decimal) -> Result<Decimal, ServiceError> {
    subtotal
        .checked_mul(tax_percent)
        .map(|scaled| scaled / ONE_HUNDRED)
        .ok_or_else(|| out_of_range("Line tax"))
}

/// `subtotal + tax_amount` for a line, or `ValidationError` when it does not fit.
pub fn checked_gross(subtotal: Decimal, tax_amount: Decimal) -> Result<Decimal, ServiceError> {
    subtotal
        .checked_add(tax_amount)
        .ok_or_else(|| out_of_range("Line total"))
}

/// Computes subtotal, tax and total for one line.
///
/// Fails with `ValidationError` when quantity, unit price, tax percent or
/// discount are negative, when the tax percent exceeds 100, or when the
/// amounts do not fit in a `Decimal`. A discount
/// larger than `subtotal + tax_amount` is clamped so the total never goes
/// below zero.
pub fn compute_line_amounts(
    quantity: Decimal,
    unit_price: Decimal,
    tax_percent: Decimal,
    discount: Decimal,
) -> Result<LineAmounts, ServiceError> {
    validate_amount_inputs(quantity, unit_price, tax_percent, discount)?;
    let subtotal = checked_subtotal(quantity, unit_price)?;
    let tax_amount = checked_tax(subtotal, tax_percent)?;
    checked_gross(subtotal, tax_amount)?;
    Ok(amounts_with_tax(subtotal, tax_amount, discount))
}

/// Like [`compute_line_amounts`] but with an already known tax amount, used
/// when a line carries an explicitly edited tax override.
pub fn amounts_with_tax(subtotal: Decimal, tax_amount: Decimal, discount: Decimal) -> LineAmounts {
    let gross = subtotal.saturating_add(tax_amount);
    let applied = discount.max(Decimal::ZERO).min(gross.max(Decimal::ZERO));
    LineAmounts {
        subtotal,
        tax_amount,
        discount: applied,
        total_price: (gross - applied).max(Decimal::ZERO),
    }
}

pub fn validate_amount_inputs(
    quantity: Decimal,
    unit_price: Decimal,
    tax_percent: Decimal,
    discount: Decimal,
) -> Result<(), ServiceError> {
    if quantity < Decimal::ZERO {
        return Err(ServiceError::ValidationError(format!(
            "Quantity cannot be negative: {}",
            quantity
        )));
    }
    if unit_price < Decimal::ZERO {
        return Err(ServiceError::ValidationError(format!(
            "Unit price cannot be negative: {}",
            unit_price
        )));
    }
    validate_tax_percent(tax_percent)?;
    if discount < Decimal::ZERO {
        return Err(ServiceError::ValidationError(format!(
            "Discount cannot be negative: {}",
            discount
        )));
    }
    Ok(())
}

pub fn validate_tax_percent(tax_percent: Decimal) -> Result<(), ServiceError> {
    if tax_percent < Decimal::ZERO || tax_percent > ONE_HUNDRED {
        return Err(ServiceError::ValidationError(format!(
            "Tax percent must be between 0 and 100, got {}",
            tax_percent
        )));
    }
    Ok(())
}

/// Rounds a value for presentation only. Never feed the result back into a
/// calculation.
pub fn round_for_display(value: Decimal, scale: u32) -> Decimal {
    value.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero)
}
