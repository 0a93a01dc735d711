use crate::{
    commands::{orders::StatusChangeResult, Command},
    errors::ServiceError,
    services::documents::DocumentService,
};
use lazy_static::lazy_static;
use prometheus::IntCounter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

lazy_static! {
    static ref ORDERS_COMPLETED: IntCounter = IntCounter::new(
        "ledger_orders_completed_total",
        "Total number of orders marked delivered or received"
    )
    .expect("metric can be created");
}

/// Marks a fully delivered sales order `delivered`, or a fully received
/// purchase order `received`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteOrderCommand {
    pub order_id: Uuid,
}

#[async_trait::async_trait]
impl Command for CompleteOrderCommand {
    type Result = StatusChangeResult;

    #[instrument(skip(self, service), fields(order_id = %self.order_id))]
    async fn execute(&self, service: Arc<DocumentService>) -> Result<Self::Result, ServiceError> {
        let document = service.complete(self.order_id).await.map_err(|e| {
            error!("Failed to complete order {}: {}", self.order_id, e);
            e
        })?;

        ORDERS_COMPLETED.inc();
        info!(order_number = %document.order_number, status = %document.status, "Order completed");
        Ok(StatusChangeResult::from(&document))
    }
}
