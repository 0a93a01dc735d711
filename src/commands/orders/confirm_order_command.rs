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
    static ref ORDERS_CONFIRMED: IntCounter =
        IntCounter::new("ledger_orders_confirmed_total", "Total number of orders confirmed")
            .expect("metric can be created");
    static ref ORDER_CONFIRM_FAILURES: IntCounter = IntCounter::new(
        "ledger_order_confirm_failures_total",
        "Total number of failed order confirmations"
    )
    .expect("metric can be created");
}

/// Moves a draft sales order to `confirmed` or a draft purchase order to
/// `ordered`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmOrderCommand {
    pub order_id: Uuid,
}

#[async_trait::async_trait]
impl Command for ConfirmOrderCommand {
    type Result = StatusChangeResult;

    #[instrument(skip(self, service), fields(order_id = %self.order_id))]
    async fn execute(&self, service: Arc<DocumentService>) -> Result<Self::Result, ServiceError> {
        let document = service.confirm(self.order_id).await.map_err(|e| {
            ORDER_CONFIRM_FAILURES.inc();
            error!("Failed to confirm order {}: {}", self.order_id, e);
            e
        })?;

        ORDERS_CONFIRMED.inc();
        info!(order_number = %document.order_number, status = %document.status, "Order confirmed");
        Ok(StatusChangeResult::from(&document))
    }
}
