//! Persistence boundary for documents and their dependent records.
//!
//! The core never computes cumulative quantities itself: recording a
//! dependent document must increment the parent's line quantities in the
//! same atomic step. Implementations own that contract.

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    models::{
        DependentDocument, DependentDocumentRequest, Document, DocumentFilter,
        DocumentHeaderUpdate, LineItem, NewDocument,
    },
};

pub mod in_memory;

pub use in_memory::InMemoryGateway;

#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn fetch_document(&self, id: Uuid) -> Result<Document, ServiceError>;

    async fn fetch_document_list(&self, filter: DocumentFilter)
        -> Result<Vec<Document>, ServiceError>;

    /// Persists a draft document and assigns its order number when none was
    /// supplied.
    async fn create_document(&self, document: NewDocument) -> Result<Document, ServiceError>;

    /// Delete-then-insert replacement of the whole line set. Last write wins.
    async fn replace_document_items(
        &self,
        document_id: Uuid,
        items: Vec<LineItem>,
    ) -> Result<(), ServiceError>;

    async fn update_document_header(
        &self,
        id: Uuid,
        update: DocumentHeaderUpdate,
    ) -> Result<Document, ServiceError>;

    async fn record_dependent_document(
        &self,
        request: DependentDocumentRequest,
    ) -> Result<DependentDocument, ServiceError>;

    async fn fetch_dependent_document(&self, id: Uuid) -> Result<DependentDocument, ServiceError>;

    async fn fetch_dependent_documents(
        &self,
        parent_document_id: Uuid,
    ) -> Result<Vec<DependentDocument>, ServiceError>;

    /// Undoes a recorded dependent document, decrementing what recording it
    /// incremented.
    async fn reverse_dependent_document(&self, id: Uuid)
        -> Result<DependentDocument, ServiceError>;
}
