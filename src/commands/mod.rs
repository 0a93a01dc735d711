use crate::{errors::ServiceError, services::documents::DocumentService};
use async_trait::async_trait;
use std::sync::Arc;

/// Command trait for implementing the Command Pattern
///
/// Each user action (a form submit or a workflow button) is one command:
/// it validates its own input, then drives the document service, which
/// talks to the persistence gateway and publishes domain events.
#[async_trait]
pub trait Command: Send + Sync {
    /// The return type of the command when executed successfully
    type Result;

    /// Execute the command against the given document service
    async fn execute(&self, service: Arc<DocumentService>) -> Result<Self::Result, ServiceError>;
}

pub mod fulfilment;
pub mod orders;
