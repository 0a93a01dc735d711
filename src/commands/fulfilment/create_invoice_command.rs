use crate::{
    commands::{fulfilment::lines_or_outstanding, Command},
    errors::ServiceError,
    models::{DependentKind, DependentLine},
    services::documents::{DocumentService, RecordedDependent},
};
use lazy_static::lazy_static;
use prometheus::IntCounter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

lazy_static! {
    static ref INVOICES_CREATED: IntCounter = IntCounter::new(
        "ledger_invoices_created_total",
        "Total number of invoices created"
    )
    .expect("metric can be created");
    static ref INVOICE_FAILURES: IntCounter = IntCounter::new(
        "ledger_invoice_failures_total",
        "Total number of rejected or failed invoices"
    )
    .expect("metric can be created");
}

/// "Create Invoice". Without explicit lines every delivered (or received)
/// but not yet invoiced quantity is billed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInvoiceCommand {
    pub order_id: Uuid,
    pub lines: Option<Vec<DependentLine>>,
}

#[async_trait::async_trait]
impl Command for CreateInvoiceCommand {
    type Result = RecordedDependent;

    #[instrument(skip(self, service), fields(order_id = %self.order_id))]
    async fn execute(&self, service: Arc<DocumentService>) -> Result<Self::Result, ServiceError> {
        let result = async {
            let lines =
                lines_or_outstanding(&service, self.order_id, DependentKind::Invoice, &self.lines)
                    .await?;
            service.create_invoice(self.order_id, lines).await
        }
        .await;

        match &result {
            Ok(recorded) => {
                INVOICES_CREATED.inc();
                info!(
                    invoice = %recorded.dependent.number,
                    amount = %recorded.dependent.amount,
                    invoice_status = %recorded.document.invoice_status,
                    "Invoice created"
                );
            }
            Err(e) => {
                INVOICE_FAILURES.inc();
                error!("Failed to create invoice: {}", e);
            }
        }
        result
    }
}
