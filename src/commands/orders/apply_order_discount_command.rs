use crate::{
    commands::Command,
    errors::ServiceError,
    models::Document,
    services::documents::{DocumentDetails, DocumentService},
};
use lazy_static::lazy_static;
use prometheus::IntCounter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::{Validate, ValidationError};

lazy_static! {
    static ref DISCOUNTS_APPLIED: IntCounter = IntCounter::new(
        "ledger_order_discounts_applied_total",
        "Total number of document discounts applied"
    )
    .expect("metric can be created");
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ApplyOrderDiscountCommand {
    pub document_id: Uuid,
    /// Absolute amount taken off the document total.
    #[validate(custom = "validate_discount")]
    pub discount: Decimal,
}

fn validate_discount(discount: &Decimal) -> Result<(), ValidationError> {
    if *discount < Decimal::ZERO {
        let mut err = ValidationError::new("discount");
        err.message = Some("Discount cannot be negative".into());
        return Err(err);
    }
    Ok(())
}

#[async_trait::async_trait]
impl Command for ApplyOrderDiscountCommand {
    type Result = Document;

    #[instrument(skip(self, service), fields(document_id = %self.document_id))]
    async fn execute(&self, service: Arc<DocumentService>) -> Result<Self::Result, ServiceError> {
        self.validate()?;

        let details = DocumentDetails {
            discount: Some(self.discount),
            ..Default::default()
        };
        let document = service
            .update_details(self.document_id, details)
            .await
            .map_err(|e| {
                error!("Failed to apply discount: {}", e);
                e
            })?;

        DISCOUNTS_APPLIED.inc();
        info!(
            discount = %self.discount,
            total_amount = %document.total_amount,
            "Discount applied"
        );
        Ok(document)
    }
}
