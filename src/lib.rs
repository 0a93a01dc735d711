//! Order Ledger Library
//!
//! Sales and purchase order documents with editable line items, derived
//! totals, and status propagated from the deliveries, receipts, invoices and
//! payments recorded against them. Storage sits behind
//! [`gateway::PersistenceGateway`].
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod commands;
pub mod config;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod models;
pub mod services;
pub mod tracing;

pub use errors::ServiceError;
pub use gateway::{InMemoryGateway, PersistenceGateway};
pub use services::documents::{DocumentService, DocumentView, RecordedDependent};

use std::sync::Arc;

/// Wires an in-memory ledger with an event channel, returning the service and
/// the receiving half of the channel.
pub fn in_memory_ledger(
    config: &config::AppConfig,
) -> (DocumentService, tokio::sync::mpsc::Receiver<events::Event>) {
    let (sender, receiver) = events::EventSender::channel(config.event_channel_capacity);
    let service = DocumentService::new(Arc::new(InMemoryGateway::new()))
        .with_settings(services::documents::ServiceSettings::from(config))
        .with_events(Arc::new(sender));
    (service, receiver)
}
