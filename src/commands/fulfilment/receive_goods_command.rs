use crate::{
    commands::{fulfilment::lines_or_outstanding, Command},
    errors::ServiceError,
    models::{DependentDocumentRequest, DependentKind, DependentLine},
    services::documents::{DocumentService, RecordedDependent},
};
use lazy_static::lazy_static;
use prometheus::IntCounter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

lazy_static! {
    static ref RECEIPTS_RECORDED: IntCounter = IntCounter::new(
        "ledger_receipts_recorded_total",
        "Total number of purchase receipts recorded"
    )
    .expect("metric can be created");
    static ref RECEIPT_FAILURES: IntCounter = IntCounter::new(
        "ledger_receipt_failures_total",
        "Total number of rejected or failed purchase receipts"
    )
    .expect("metric can be created");
}

/// "Receive Goods" on an ordered purchase order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiveGoodsCommand {
    pub order_id: Uuid,
    pub lines: Option<Vec<DependentLine>>,
    pub reference: Option<String>,
}

#[async_trait::async_trait]
impl Command for ReceiveGoodsCommand {
    type Result = RecordedDependent;

    #[instrument(skip(self, service), fields(order_id = %self.order_id))]
    async fn execute(&self, service: Arc<DocumentService>) -> Result<Self::Result, ServiceError> {
        let result = async {
            let lines =
                lines_or_outstanding(&service, self.order_id, DependentKind::Receipt, &self.lines)
                    .await?;
            let mut request = DependentDocumentRequest::receipt(self.order_id, lines);
            request.reference = self.reference.clone();
            service.record_dependent(request).await
        }
        .await;

        match &result {
            Ok(recorded) => {
                RECEIPTS_RECORDED.inc();
                info!(
                    receipt = %recorded.dependent.number,
                    received_status = %recorded.document.received_status,
                    "Goods received"
                );
            }
            Err(e) => {
                RECEIPT_FAILURES.inc();
                error!("Failed to receive goods: {}", e);
            }
        }
        result
    }
}
