use crate::{
    commands::{orders::StatusChangeResult, Command},
    errors::{ErrorCategory, ServiceError},
    services::documents::DocumentService,
};
use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

lazy_static! {
    static ref ORDER_CANCELLATIONS: IntCounter = IntCounter::new(
        "ledger_order_cancellations_total",
        "Total number of order cancellations"
    )
    .expect("metric can be created");
    static ref ORDER_CANCELLATION_FAILURES: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new(
        "ledger_order_cancellation_failures_total",
        "Total number of failed order cancellations"),
        &["error_type"]
    )
    .expect("metric can be created");
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CancelOrderCommand {
    pub order_id: Uuid,
    #[validate(length(max = 500, message = "Reason must be at most 500 characters"))]
    pub reason: Option<String>,
}

#[async_trait::async_trait]
impl Command for CancelOrderCommand {
    type Result = StatusChangeResult;

    #[instrument(skip(self, service), fields(order_id = %self.order_id))]
    async fn execute(&self, service: Arc<DocumentService>) -> Result<Self::Result, ServiceError> {
        self.validate().map_err(|e| {
            ORDER_CANCELLATION_FAILURES
                .with_label_values(&["validation_error"])
                .inc();
            ServiceError::from(e)
        })?;

        let document = service.cancel(self.order_id).await.map_err(|e| {
            let label = match e.category() {
                ErrorCategory::Local => "rejected",
                ErrorCategory::Persistence => "persistence_error",
                ErrorCategory::NotFound => "not_found",
            };
            ORDER_CANCELLATION_FAILURES.with_label_values(&[label]).inc();
            error!("Failed to cancel order {}: {}", self.order_id, e);
            e
        })?;

        ORDER_CANCELLATIONS.inc();
        info!(
            order_id = %self.order_id,
            reason = self.reason.as_deref().unwrap_or(""),
            "Order canceled successfully"
        );
        Ok(StatusChangeResult::from(&document))
    }
}
