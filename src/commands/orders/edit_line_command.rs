use crate::{
    commands::Command,
    errors::ServiceError,
    models::Document,
    services::{documents::DocumentService, line_items::LineItemUpdate},
};
use lazy_static::lazy_static;
use prometheus::IntCounter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

lazy_static! {
    static ref LINES_EDITED: IntCounter =
        IntCounter::new("ledger_lines_edited_total", "Total number of line edits")
            .expect("metric can be created");
    static ref LINE_EDIT_FAILURES: IntCounter = IntCounter::new(
        "ledger_line_edit_failures_total",
        "Total number of rejected or failed line edits"
    )
    .expect("metric can be created");
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditLineCommand {
    pub document_id: Uuid,
    pub line_id: Uuid,
    pub update: LineItemUpdate,
}

#[async_trait::async_trait]
impl Command for EditLineCommand {
    type Result = Document;

    #[instrument(skip(self, service), fields(document_id = %self.document_id, line_id = %self.line_id))]
    async fn execute(&self, service: Arc<DocumentService>) -> Result<Self::Result, ServiceError> {
        let result = service
            .edit_line(self.document_id, self.line_id, self.update.clone())
            .await;
        match &result {
            Ok(document) => {
                LINES_EDITED.inc();
                info!(total_amount = %document.total_amount, "Line edited");
            }
            Err(e) => {
                LINE_EDIT_FAILURES.inc();
                error!("Failed to edit line: {}", e);
            }
        }
        result
    }
}
