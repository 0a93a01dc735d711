use crate::{
    commands::Command, errors::ServiceError, models::Document,
    services::documents::DocumentService,
};
use lazy_static::lazy_static;
use prometheus::IntCounter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

lazy_static! {
    static ref LINES_REMOVED: IntCounter =
        IntCounter::new("ledger_lines_removed_total", "Total number of lines removed")
            .expect("metric can be created");
    static ref LINE_REMOVAL_FAILURES: IntCounter = IntCounter::new(
        "ledger_line_removal_failures_total",
        "Total number of rejected or failed line removals"
    )
    .expect("metric can be created");
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveLineCommand {
    pub document_id: Uuid,
    pub line_id: Uuid,
}

#[async_trait::async_trait]
impl Command for RemoveLineCommand {
    type Result = Document;

    #[instrument(skip(self, service), fields(document_id = %self.document_id, line_id = %self.line_id))]
    async fn execute(&self, service: Arc<DocumentService>) -> Result<Self::Result, ServiceError> {
        let result = service.remove_line(self.document_id, self.line_id).await;
        match &result {
            Ok(document) => {
                LINES_REMOVED.inc();
                info!(total_amount = %document.total_amount, "Line removed");
            }
            Err(e @ ServiceError::Conflict(_)) => {
                LINE_REMOVAL_FAILURES.inc();
                warn!("Line removal rejected: {}", e);
            }
            Err(e) => {
                LINE_REMOVAL_FAILURES.inc();
                error!("Failed to remove line: {}", e);
            }
        }
        result
    }
}
