pub mod add_line_command;
pub mod apply_order_discount_command;
pub mod cancel_order_command;
pub mod complete_order_command;
pub mod confirm_order_command;
pub mod create_order_command;
pub mod edit_line_command;
pub mod remove_line_command;

// Re-export commands for easier access
pub use add_line_command::AddLineCommand;
pub use apply_order_discount_command::ApplyOrderDiscountCommand;
pub use cancel_order_command::CancelOrderCommand;
pub use complete_order_command::CompleteOrderCommand;
pub use confirm_order_command::ConfirmOrderCommand;
pub use create_order_command::CreateOrderCommand;
pub use edit_line_command::EditLineCommand;
pub use remove_line_command::RemoveLineCommand;

use crate::models::Document;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::DocumentStatus;

/// Outcome of a workflow button.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChangeResult {
    pub id: Uuid,
    pub order_number: String,
    pub status: DocumentStatus,
    pub version: u64,
}

impl From<&Document> for StatusChangeResult {
    fn from(document: &Document) -> Self {
        Self {
            id: document.id,
            order_number: document.order_number.clone(),
            status: document.status,
            version: document.version,
        }
    }
}
