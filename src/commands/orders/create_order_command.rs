use crate::{
    commands::Command,
    errors::ServiceError,
    models::{Document, DocumentKind, NewDocument},
    services::{
        documents::DocumentService,
        line_items::{LineInput, LineItemEditor},
    },
};
use lazy_static::lazy_static;
use prometheus::IntCounter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

lazy_static! {
    static ref ORDERS_CREATED: IntCounter = IntCounter::new(
        "ledger_orders_created_total",
        "Total number of sales and purchase orders created"
    )
    .expect("metric can be created");
    static ref ORDER_CREATION_FAILURES: IntCounter = IntCounter::new(
        "ledger_order_creation_failures_total",
        "Total number of failed order creations"
    )
    .expect("metric can be created");
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateOrderCommand {
    pub kind: DocumentKind,
    pub order_number: Option<String>,
    pub counterparty_id: Option<Uuid>,
    #[serde(default)]
    pub discount: Decimal,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    #[validate]
    #[serde(default)]
    pub lines: Vec<LineInput>,
}

impl CreateOrderCommand {
    pub fn new(kind: DocumentKind) -> Self {
        Self {
            kind,
            order_number: None,
            counterparty_id: None,
            discount: Decimal::ZERO,
            notes: None,
            lines: Vec::new(),
        }
    }

    pub fn with_line(mut self, line: LineInput) -> Self {
        self.lines.push(line);
        self
    }

    fn into_new_document(&self) -> Result<NewDocument, ServiceError> {
        let mut editor = LineItemEditor::new(self.kind.side());
        for line in &self.lines {
            editor.add_line(line.clone())?;
        }
        Ok(NewDocument {
            kind: self.kind,
            order_number: self.order_number.clone(),
            counterparty_id: self.counterparty_id,
            items: editor.into_items(),
            discount: self.discount,
            notes: self.notes.clone(),
        })
    }
}

#[async_trait::async_trait]
impl Command for CreateOrderCommand {
    type Result = Document;

    #[instrument(skip(self, service), fields(kind = %self.kind))]
    async fn execute(&self, service: Arc<DocumentService>) -> Result<Self::Result, ServiceError> {
        self.validate().map_err(|e| {
            ORDER_CREATION_FAILURES.inc();
            error!("Invalid create order command: {}", e);
            ServiceError::from(e)
        })?;

        let result = match self.into_new_document() {
            Ok(new) => service.create(new).await,
            Err(e) => Err(e),
        };

        match &result {
            Ok(document) => {
                ORDERS_CREATED.inc();
                info!(
                    document_id = %document.id,
                    order_number = %document.order_number,
                    total_amount = %document.total_amount,
                    "Order created successfully"
                );
            }
            Err(e) => {
                ORDER_CREATION_FAILURES.inc();
                error!("Failed to create order: {}", e);
            }
        }
        result
    }
}
