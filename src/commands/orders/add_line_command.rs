use crate::{
    commands::Command,
    errors::ServiceError,
    models::Document,
    services::{documents::DocumentService, line_items::LineInput},
};
use lazy_static::lazy_static;
use prometheus::IntCounter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

lazy_static! {
    static ref LINES_ADDED: IntCounter =
        IntCounter::new("ledger_lines_added_total", "Total number of lines added to orders")
            .expect("metric can be created");
    static ref LINE_ADD_FAILURES: IntCounter = IntCounter::new(
        "ledger_line_add_failures_total",
        "Total number of failed line additions"
    )
    .expect("metric can be created");
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AddLineCommand {
    pub document_id: Uuid,
    #[validate]
    pub line: LineInput,
}

#[async_trait::async_trait]
impl Command for AddLineCommand {
    type Result = Document;

    #[instrument(skip(self, service), fields(document_id = %self.document_id))]
    async fn execute(&self, service: Arc<DocumentService>) -> Result<Self::Result, ServiceError> {
        self.validate().map_err(|e| {
            LINE_ADD_FAILURES.inc();
            error!("Invalid line: {}", e);
            ServiceError::from(e)
        })?;

        let result = service.add_line(self.document_id, self.line.clone()).await;
        match &result {
            Ok(document) => {
                LINES_ADDED.inc();
                info!(
                    document_id = %document.id,
                    total_amount = %document.total_amount,
                    "Line added"
                );
            }
            Err(e) => {
                LINE_ADD_FAILURES.inc();
                error!(document_id = %self.document_id, "Failed to add line: {}", e);
            }
        }
        result
    }
}
