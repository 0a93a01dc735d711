use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    models::status::OrderSide,
    services::money::{
        amounts_with_tax, checked_gross, checked_subtotal, checked_tax, tax_for,
        validate_amount_inputs, LineAmounts,
    },
};

/// One product or service entry on an originating document.
///
/// The cumulative quantities are written by the persistence gateway when a
/// dependent document is recorded. They only grow, except through an explicit
/// reversal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: Uuid,
    pub product_id: Uuid,
    #[serde(default)]
    pub description: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub tax_percent: Decimal,
    /// Precomputed tax. When present it takes precedence over `tax_percent`,
    /// which preserves an explicitly edited override.
    #[serde(default)]
    pub tax_amount: Option<Decimal>,
    /// Absolute amount, not a percentage.
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub delivered_quantity: Decimal,
    #[serde(default)]
    pub invoiced_quantity: Decimal,
    #[serde(default)]
    pub received_quantity: Decimal,
}

impl LineItem {
    pub fn subtotal(&self) -> Decimal {
        self.quantity.saturating_mul(self.unit_price)
    }

    pub fn effective_tax(&self) -> Decimal {
        self.tax_amount
            .unwrap_or_else(|| tax_for(self.subtotal(), self.tax_percent))
    }

    pub fn amounts(&self) -> LineAmounts {
        amounts_with_tax(self.subtotal(), self.effective_tax(), self.discount)
    }

    pub fn total_price(&self) -> Decimal {
        self.amounts().total_price
    }

    /// Delivered quantity on the sales side, received quantity on the
    /// purchase side.
    pub fn fulfilled_quantity(&self, side: OrderSide) -> Decimal {
        match side {
            OrderSide::Sales => self.delivered_quantity,
            OrderSide::Purchase => self.received_quantity,
        }
    }

    pub fn remaining_to_fulfil(&self, side: OrderSide) -> Decimal {
        (self.quantity - self.fulfilled_quantity(side)).max(Decimal::ZERO)
    }

    pub fn remaining_to_invoice(&self, side: OrderSide) -> Decimal {
        (self.fulfilled_quantity(side) - self.invoiced_quantity).max(Decimal::ZERO)
    }

    /// The floor below which `quantity` may not be edited.
    pub fn locked_quantity(&self) -> Decimal {
        self.delivered_quantity
            .max(self.received_quantity)
            .max(self.invoiced_quantity)
    }

    pub fn has_fulfilment(&self) -> bool {
        self.delivered_quantity > Decimal::ZERO
            || self.invoiced_quantity > Decimal::ZERO
            || self.received_quantity > Decimal::ZERO
    }

    /// Range checks for a line about to be stored: positive quantity,
    /// non-negative price, discount, tax and cumulative quantities, and
    /// amounts that fit in a `Decimal`.
    pub fn validate_amounts(&self) -> Result<(), ServiceError> {
        if self.quantity <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "Line {} must have a positive quantity",
                self.id
            )));
        }
        validate_amount_inputs(self.quantity, self.unit_price, self.tax_percent, self.discount)?;
        if self.tax_amount.map_or(false, |tax| tax < Decimal::ZERO) {
            return Err(ServiceError::ValidationError(format!(
                "Line {} has a negative tax amount",
                self.id
            )));
        }
        if self.delivered_quantity < Decimal::ZERO
            || self.received_quantity < Decimal::ZERO
            || self.invoiced_quantity < Decimal::ZERO
        {
            return Err(ServiceError::ValidationError(format!(
                "Line {} has a negative cumulative quantity",
                self.id
            )));
        }
        let subtotal = checked_subtotal(self.quantity, self.unit_price)?;
        let tax = match self.tax_amount {
            Some(tax) => tax,
            None => checked_tax(subtotal, self.tax_percent)?,
        };
        checked_gross(subtotal, tax)?;
        Ok(())
    }

    /// Checks `fulfilled <= quantity` and `invoiced <= fulfilled`.
    pub fn check_fulfilment_invariants(&self, side: OrderSide) -> Result<(), ServiceError> {
        let fulfilled = self.fulfilled_quantity(side);
        if fulfilled > self.quantity {
            return Err(ServiceError::Conflict(format!(
                "Line {} would be fulfilled beyond its quantity ({} > {})",
                self.id, fulfilled, self.quantity
            )));
        }
        if self.invoiced_quantity > fulfilled {
            return Err(ServiceError::Conflict(format!(
                "Line {} would be invoiced beyond its fulfilled quantity ({} > {})",
                self.id, self.invoiced_quantity, fulfilled
            )));
        }
        Ok(())
    }
}
