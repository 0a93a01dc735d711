use crate::{
    commands::{fulfilment::lines_or_outstanding, Command},
    errors::ServiceError,
    models::{DependentKind, DependentLine},
    services::documents::{DocumentService, RecordedDependent},
};
use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

lazy_static! {
    static ref DELIVERIES_CREATED: IntCounter = IntCounter::new(
        "ledger_deliveries_created_total",
        "Total number of delivery orders recorded"
    )
    .expect("metric can be created");
    static ref DELIVERY_FAILURES: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new(
            "ledger_delivery_failures_total",
            "Total number of rejected or failed deliveries"
        ),
        &["error_type"]
    )
    .expect("metric can be created");
}

/// "Create Delivery" on a confirmed sales order. Without explicit lines the
/// whole remaining quantity of every open line is delivered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDeliveryCommand {
    pub order_id: Uuid,
    pub lines: Option<Vec<DependentLine>>,
}

#[async_trait::async_trait]
impl Command for CreateDeliveryCommand {
    type Result = RecordedDependent;

    #[instrument(skip(self, service), fields(order_id = %self.order_id))]
    async fn execute(&self, service: Arc<DocumentService>) -> Result<Self::Result, ServiceError> {
        let result = async {
            let lines =
                lines_or_outstanding(&service, self.order_id, DependentKind::Delivery, &self.lines)
                    .await?;
            service.create_delivery(self.order_id, lines).await
        }
        .await;

        match &result {
            Ok(recorded) => {
                DELIVERIES_CREATED.inc();
                info!(
                    delivery = %recorded.dependent.number,
                    delivery_status = %recorded.document.delivery_status,
                    "Delivery recorded"
                );
            }
            Err(e) => {
                let label = match e {
                    ServiceError::InvalidOperation(_) => "gated",
                    ServiceError::Conflict(_) => "over_delivery",
                    _ => "error",
                };
                DELIVERY_FAILURES.with_label_values(&[label]).inc();
                error!("Failed to record delivery: {}", e);
            }
        }
        result
    }
}
