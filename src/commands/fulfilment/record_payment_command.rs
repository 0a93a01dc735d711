use crate::{
    commands::Command,
    errors::ServiceError,
    models::DependentDocumentRequest,
    services::documents::{DocumentService, RecordedDependent},
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
    static ref PAYMENTS_RECORDED: IntCounter = IntCounter::new(
        "ledger_payments_recorded_total",
        "Total number of payments recorded against invoices"
    )
    .expect("metric can be created");
    static ref PAYMENT_FAILURES: IntCounter = IntCounter::new(
        "ledger_payment_failures_total",
        "Total number of rejected or failed payments"
    )
    .expect("metric can be created");
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RecordPaymentCommand {
    pub order_id: Uuid,
    pub invoice_id: Uuid,
    #[validate(custom = "validate_payment_amount")]
    pub amount: Decimal,
    #[validate(length(max = 100))]
    pub reference: Option<String>,
}

fn validate_payment_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if *amount <= Decimal::ZERO {
        let mut err = ValidationError::new("amount");
        err.message = Some("Payment amount must be greater than zero".into());
        return Err(err);
    }
    Ok(())
}

#[async_trait::async_trait]
impl Command for RecordPaymentCommand {
    type Result = RecordedDependent;

    #[instrument(skip(self, service), fields(order_id = %self.order_id, invoice_id = %self.invoice_id))]
    async fn execute(&self, service: Arc<DocumentService>) -> Result<Self::Result, ServiceError> {
        self.validate().map_err(|e| {
            PAYMENT_FAILURES.inc();
            ServiceError::from(e)
        })?;

        let mut request = DependentDocumentRequest::payment(self.order_id, self.invoice_id, self.amount);
        request.reference = self.reference.clone();

        let recorded = service.record_dependent(request).await.map_err(|e| {
            PAYMENT_FAILURES.inc();
            error!("Failed to record payment: {}", e);
            e
        })?;

        PAYMENTS_RECORDED.inc();
        info!(
            payment = %recorded.dependent.number,
            amount = %self.amount,
            payment_status = %recorded.document.payment_status,
            "Payment recorded"
        );
        Ok(recorded)
    }
}
