use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    errors::ServiceError,
    models::{document::validate_non_negative_amount, Document, LineBadge, LineItem, OrderSide},
    services::{
        money::compute_line_amounts,
        totals::{compute_totals, DocumentTotals},
    },
};

/// Input for a new line, as entered in the line form.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LineInput {
    #[validate(required)]
    pub product_id: Option<Uuid>,
    #[validate(custom = "validate_positive_quantity")]
    pub quantity: Decimal,
    #[validate(custom = "validate_non_negative_amount")]
    pub unit_price: Decimal,
    pub tax_percent: Decimal,
    #[serde(default)]
    #[validate(custom = "validate_non_negative_amount")]
    pub discount: Decimal,
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

impl LineInput {
    pub fn new(product_id: Uuid, quantity: Decimal, unit_price: Decimal, tax_percent: Decimal) -> Self {
        Self {
            product_id: Some(product_id),
            quantity,
            unit_price,
            tax_percent,
            discount: Decimal::ZERO,
            description: None,
        }
    }

    pub fn with_discount(mut self, discount: Decimal) -> Self {
        self.discount = discount;
        self
    }
}

/// Partial edit of an existing line. Unset fields keep their value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineItemUpdate {
    pub product_id: Option<Uuid>,
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub tax_percent: Option<Decimal>,
    /// Explicit tax override. Takes precedence over the derived tax.
    pub tax_amount: Option<Decimal>,
    pub discount: Option<Decimal>,
    pub description: Option<Option<String>>,
}

impl LineItemUpdate {
    pub fn quantity(quantity: Decimal) -> Self {
        Self {
            quantity: Some(quantity),
            ..Default::default()
        }
    }

    fn reprices(&self) -> bool {
        self.quantity.is_some() || self.unit_price.is_some() || self.tax_percent.is_some()
    }
}

fn validate_positive_quantity(quantity: &Decimal) -> Result<(), ValidationError> {
    if *quantity <= Decimal::ZERO {
        let mut err = ValidationError::new("quantity");
        err.message = Some("Quantity must be greater than zero".into());
        return Err(err);
    }
    Ok(())
}

/// Working copy of a document's lines.
///
/// Every operation either applies completely or leaves the editor untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItemEditor {
    side: OrderSide,
    items: Vec<LineItem>,
}

impl LineItemEditor {
    pub fn new(side: OrderSide) -> Self {
        Self {
            side,
            items: Vec::new(),
        }
    }

    pub fn from_document(document: &Document) -> Self {
        Self {
            side: document.side(),
            items: document.items.clone(),
        }
    }

    pub fn side(&self) -> OrderSide {
        self.side
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn into_items(self) -> Vec<LineItem> {
        self.items
    }

    pub fn index_of(&self, line_id: Uuid) -> Option<usize> {
        self.items.iter().position(|item| item.id == line_id)
    }

    pub fn totals(&self, document_discount: Decimal) -> DocumentTotals {
        compute_totals(&self.items, document_discount)
    }

    pub fn add_line(&mut self, input: LineInput) -> Result<&LineItem, ServiceError> {
        input.validate()?;
        let product_id = input
            .product_id
            .ok_or_else(|| ServiceError::ValidationError("A product must be selected".into()))?;
        let amounts = compute_line_amounts(
            input.quantity,
            input.unit_price,
            input.tax_percent,
            input.discount,
        )?;

        self.items.push(LineItem {
            id: Uuid::new_v4(),
            product_id,
            description: input.description,
            quantity: input.quantity,
            unit_price: input.unit_price,
            tax_percent: input.tax_percent,
            tax_amount: Some(amounts.tax_amount),
            discount: input.discount,
            delivered_quantity: Decimal::ZERO,
            invoiced_quantity: Decimal::ZERO,
            received_quantity: Decimal::ZERO,
        });
        debug!(product_id = %product_id, total_price = %amounts.total_price, "line added");
        Ok(&self.items[self.items.len() - 1])
    }

    pub fn edit_line(
        &mut self,
        index: usize,
        update: LineItemUpdate,
    ) -> Result<&LineItem, ServiceError> {
        let current = self.line_at(index)?;
        let mut edited = current.clone();

        if let Some(product_id) = update.product_id {
            edited.product_id = product_id;
        }
        if let Some(quantity) = update.quantity {
            edited.quantity = quantity;
        }
        if let Some(unit_price) = update.unit_price {
            edited.unit_price = unit_price;
        }
        if let Some(tax_percent) = update.tax_percent {
            edited.tax_percent = tax_percent;
        }
        if let Some(discount) = update.discount {
            edited.discount = discount;
        }
        if let Some(description) = update.description.clone() {
            edited.description = description;
        }

        if edited.quantity <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Quantity must be greater than zero".into(),
            ));
        }
        let locked = current.locked_quantity();
        if edited.quantity < locked {
            return Err(ServiceError::ValidationError(format!(
                "Quantity cannot drop below the already fulfilled {} (requested {})",
                locked, edited.quantity
            )));
        }

        let amounts = compute_line_amounts(
            edited.quantity,
            edited.unit_price,
            edited.tax_percent,
            edited.discount,
        )?;
        if let Some(tax_amount) = update.tax_amount {
            if tax_amount < Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "Tax amount cannot be negative: {}",
                    tax_amount
                )));
            }
            edited.tax_amount = Some(tax_amount);
        } else if update.reprices() || edited.tax_amount.is_none() {
            edited.tax_amount = Some(amounts.tax_amount);
        }

        self.items[index] = edited;
        Ok(&self.items[index])
    }

    /// Removes a line that has no fulfilment recorded against it.
    pub fn remove_line(&mut self, index: usize) -> Result<LineItem, ServiceError> {
        let line = self.line_at(index)?;
        if line.has_fulfilment() {
            return Err(ServiceError::Conflict(format!(
                "Line {} has fulfilment recorded (delivered {}, received {}, invoiced {}) and cannot be removed",
                line.id, line.delivered_quantity, line.received_quantity, line.invoiced_quantity
            )));
        }
        Ok(self.items.remove(index))
    }

    fn line_at(&self, index: usize) -> Result<&LineItem, ServiceError> {
        self.items.get(index).ok_or_else(|| {
            ServiceError::NotFound(format!(
                "Line index {} out of range ({} lines)",
                index,
                self.items.len()
            ))
        })
    }
}

/// Fulfilled quantity over ordered quantity, 0 when nothing is ordered.
pub fn fulfillment_ratio(line: &LineItem, side: OrderSide) -> Decimal {
    if line.quantity.is_zero() {
        return Decimal::ZERO;
    }
    line.fulfilled_quantity(side) / line.quantity
}

pub fn line_badge(line: &LineItem, side: OrderSide) -> LineBadge {
    let ratio = fulfillment_ratio(line, side);
    if ratio <= Decimal::ZERO {
        LineBadge::None
    } else if ratio < Decimal::ONE {
        LineBadge::Partial
    } else {
        LineBadge::Complete
    }
}

/// Line counts per badge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfilmentSummary {
    pub total_lines: usize,
    pub pending_lines: usize,
    pub partial_lines: usize,
    pub complete_lines: usize,
}

pub fn fulfilment_summary(items: &[LineItem], side: OrderSide) -> FulfilmentSummary {
    items
        .iter()
        .fold(FulfilmentSummary::default(), |mut summary, line| {
            summary.total_lines += 1;
            match line_badge(line, side) {
                LineBadge::None => summary.pending_lines += 1,
                LineBadge::Partial => summary.partial_lines += 1,
                LineBadge::Complete => summary.complete_lines += 1,
            }
            summary
        })
}
