use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::models::{DependentKind, DocumentKind, DocumentStatus, DocumentStatuses};

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Builds a bounded channel and returns the sender half wrapped.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Events are advisory. The write that produced the event has already
    /// committed, so a full or closed channel drops the event with a log line
    /// instead of blocking the caller.
    pub async fn send_or_log(&self, event: Event) {
        let name = event.name();
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(event = name, document_id = %event.document_id(), "event channel full; dropping domain event");
            }
            Err(TrySendError::Closed(_)) => {
                error!(event = name, "event channel closed; dropping domain event");
            }
        }
    }
}

// Domain events emitted after a write has been committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    DocumentCreated {
        document_id: Uuid,
        order_number: String,
        kind: DocumentKind,
    },
    LinesSaved {
        document_id: Uuid,
        line_count: usize,
        total_amount: Decimal,
    },
    StatusChanged {
        document_id: Uuid,
        old_status: DocumentStatus,
        new_status: DocumentStatus,
    },
    DerivedStatusChanged {
        document_id: Uuid,
        before: DocumentStatuses,
        after: DocumentStatuses,
    },
    DependentRecorded {
        document_id: Uuid,
        dependent_id: Uuid,
        kind: DependentKind,
        number: String,
    },
    DependentReversed {
        document_id: Uuid,
        dependent_id: Uuid,
        kind: DependentKind,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::DocumentCreated { .. } => "document_created",
            Event::LinesSaved { .. } => "lines_saved",
            Event::StatusChanged { .. } => "status_changed",
            Event::DerivedStatusChanged { .. } => "derived_status_changed",
            Event::DependentRecorded { .. } => "dependent_recorded",
            Event::DependentReversed { .. } => "dependent_reversed",
        }
    }

    pub fn document_id(&self) -> Uuid {
        match self {
            Event::DocumentCreated { document_id, .. }
            | Event::LinesSaved { document_id, .. }
            | Event::StatusChanged { document_id, .. }
            | Event::DerivedStatusChanged { document_id, .. }
            | Event::DependentRecorded { document_id, .. }
            | Event::DependentReversed { document_id, .. } => *document_id,
        }
    }
}

/// Drains the receiver and logs each event until every sender is dropped.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match serde_json::to_string(&event) {
            Ok(payload) => {
                info!(event = event.name(), document_id = %event.document_id(), %payload, "domain event")
            }
            Err(err) => error!(event = event.name(), error = %err, "failed to serialize domain event"),
        }
    }
    info!("event channel closed");
}
