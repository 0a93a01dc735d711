#![allow(dead_code)]

use std::sync::Arc;

use order_ledger::{
    commands::{orders::CreateOrderCommand, Command},
    events::{Event, EventSender},
    gateway::InMemoryGateway,
    models::{Document, DocumentKind},
    services::{documents::DocumentService, line_items::LineInput},
};
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Helper harness wiring a document service to a fresh in-memory gateway and
/// an event channel the test can drain.
pub struct TestLedger {
    pub service: Arc<DocumentService>,
    pub gateway: InMemoryGateway,
    events: mpsc::Receiver<Event>,
}

impl TestLedger {
    pub fn new() -> Self {
        Self::with_event_capacity(256)
    }

    /// Same wiring with a smaller event buffer the test may leave undrained.
    pub fn with_event_capacity(capacity: usize) -> Self {
        let gateway = InMemoryGateway::new();
        let (sender, events) = EventSender::channel(capacity);
        let service = DocumentService::new(Arc::new(gateway.clone())).with_events(Arc::new(sender));
        Self {
            service: Arc::new(service),
            gateway,
            events,
        }
    }

    /// Creates a draft order with one line per `(quantity, unit_price, tax_percent)`.
    pub async fn draft(&self, kind: DocumentKind, lines: &[(Decimal, Decimal, Decimal)]) -> Document {
        let mut command = CreateOrderCommand::new(kind);
        for (quantity, unit_price, tax_percent) in lines {
            command = command.with_line(LineInput::new(Uuid::new_v4(), *quantity, *unit_price, *tax_percent));
        }
        command
            .execute(self.service.clone())
            .await
            .expect("draft order can be created")
    }

    /// Draft followed by confirmation (sales) or ordering (purchase).
    pub async fn confirmed(&self, kind: DocumentKind, lines: &[(Decimal, Decimal, Decimal)]) -> Document {
        let draft = self.draft(kind, lines).await;
        self.service
            .confirm(draft.id)
            .await
            .expect("draft order can be confirmed")
    }

    /// Everything published so far.
    pub fn drain_events(&mut self) -> Vec<Event> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            drained.push(event);
        }
        drained
    }
}

pub fn line_id(document: &Document, index: usize) -> Uuid {
    document.items[index].id
}
