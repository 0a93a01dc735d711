pub mod create_delivery_command;
pub mod create_invoice_command;
pub mod receive_goods_command;
pub mod record_payment_command;
pub mod reverse_dependent_command;

pub use create_delivery_command::CreateDeliveryCommand;
pub use create_invoice_command::CreateInvoiceCommand;
pub use receive_goods_command::ReceiveGoodsCommand;
pub use record_payment_command::RecordPaymentCommand;
pub use reverse_dependent_command::ReverseDependentCommand;

use crate::{
    errors::ServiceError,
    models::{DependentKind, DependentLine},
    services::documents::{outstanding_lines, DocumentService},
};
use uuid::Uuid;

/// Explicit lines when given, otherwise everything still open on the order.
pub(crate) async fn lines_or_outstanding(
    service: &DocumentService,
    order_id: Uuid,
    kind: DependentKind,
    lines: &Option<Vec<DependentLine>>,
) -> Result<Vec<DependentLine>, ServiceError> {
    match lines {
        Some(lines) => Ok(lines.clone()),
        None => {
            let document = service.load(order_id).await?;
            Ok(outstanding_lines(&document, kind))
        }
    }
}
