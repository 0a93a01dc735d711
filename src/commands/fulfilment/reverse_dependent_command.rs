use crate::{
    commands::Command, errors::ServiceError, models::Document,
    services::documents::DocumentService,
};
use lazy_static::lazy_static;
use prometheus::IntCounter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

lazy_static! {
    static ref DEPENDENTS_REVERSED: IntCounter = IntCounter::new(
        "ledger_dependents_reversed_total",
        "Total number of deliveries, receipts, invoices and payments reversed"
    )
    .expect("metric can be created");
}

/// Correction: undo a recorded delivery, receipt, invoice or payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReverseDependentCommand {
    pub dependent_id: Uuid,
}

#[async_trait::async_trait]
impl Command for ReverseDependentCommand {
    type Result = Document;

    #[instrument(skip(self, service), fields(dependent_id = %self.dependent_id))]
    async fn execute(&self, service: Arc<DocumentService>) -> Result<Self::Result, ServiceError> {
        let document = service
            .reverse_dependent(self.dependent_id)
            .await
            .map_err(|e| {
                warn!("Reversal rejected: {}", e);
                e
            })?;

        DEPENDENTS_REVERSED.inc();
        info!(order_number = %document.order_number, "Dependent document reversed");
        Ok(document)
    }
}
