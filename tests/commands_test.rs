//! Command-level tests: each user action driven through its command type.

mod common;

use assert_matches::assert_matches;
use common::{line_id, TestLedger};
use order_ledger::{
    commands::{
        fulfilment::{
            CreateDeliveryCommand, CreateInvoiceCommand, ReceiveGoodsCommand, RecordPaymentCommand,
            ReverseDependentCommand,
        },
        orders::{
            AddLineCommand, ApplyOrderDiscountCommand, CancelOrderCommand, CompleteOrderCommand,
            ConfirmOrderCommand, CreateOrderCommand, EditLineCommand, RemoveLineCommand,
        },
        Command,
    },
    config::AppConfig,
    errors::ServiceError,
    events::Event,
    in_memory_ledger,
    models::{DocumentKind, DocumentStatus, FulfillmentStatus, InvoiceStatus, PaymentStatus},
    services::line_items::{LineInput, LineItemUpdate},
};
use rust_decimal_macros::dec;
use std::{sync::Arc, time::Duration};
use uuid::Uuid;

#[tokio::test]
async fn create_order_command_builds_priced_lines() {
    let ledger = TestLedger::new();
    let command = CreateOrderCommand::new(DocumentKind::SalesOrder)
        .with_line(LineInput::new(Uuid::new_v4(), dec!(3), dec!(20), dec!(10)))
        .with_line(LineInput::new(Uuid::new_v4(), dec!(1), dec!(40), dec!(0)).with_discount(dec!(5)));

    let document = command.execute(ledger.service.clone()).await.unwrap();
    assert_eq!(document.items.len(), 2);
    assert_eq!(document.total_amount, dec!(101));
}

#[tokio::test]
async fn create_order_command_rejects_negative_price() {
    let ledger = TestLedger::new();
    let command = CreateOrderCommand::new(DocumentKind::SalesOrder)
        .with_line(LineInput::new(Uuid::new_v4(), dec!(1), dec!(-1), dec!(0)));

    let result = command.execute(ledger.service.clone()).await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));
    assert_eq!(ledger.gateway.document_count(), 0);
}

#[tokio::test]
async fn line_commands_edit_a_draft() {
    let ledger = TestLedger::new();
    let draft = ledger
        .draft(DocumentKind::PurchaseOrder, &[(dec!(2), dec!(10), dec!(0))])
        .await;

    let added = AddLineCommand {
        document_id: draft.id,
        line: LineInput::new(Uuid::new_v4(), dec!(1), dec!(5), dec!(0)),
    }
    .execute(ledger.service.clone())
    .await
    .unwrap();
    assert_eq!(added.total_amount, dec!(25));

    let edited = EditLineCommand {
        document_id: draft.id,
        line_id: line_id(&added, 0),
        update: LineItemUpdate::quantity(dec!(3)),
    }
    .execute(ledger.service.clone())
    .await
    .unwrap();
    assert_eq!(edited.total_amount, dec!(35));

    let removed = RemoveLineCommand {
        document_id: draft.id,
        line_id: line_id(&edited, 1),
    }
    .execute(ledger.service.clone())
    .await
    .unwrap();
    assert_eq!(removed.total_amount, dec!(30));

    let discounted = ApplyOrderDiscountCommand {
        document_id: draft.id,
        discount: dec!(50),
    }
    .execute(ledger.service.clone())
    .await
    .unwrap();
    assert_eq!(discounted.discount, dec!(50));
    assert_eq!(discounted.total_amount, dec!(0));
}

#[tokio::test]
async fn fulfilment_commands_default_to_outstanding_lines() {
    let mut ledger = TestLedger::new();
    let draft = ledger
        .draft(
            DocumentKind::SalesOrder,
            &[(dec!(2), dec!(10), dec!(0)), (dec!(1), dec!(30), dec!(0))],
        )
        .await;

    let confirmed = ConfirmOrderCommand { order_id: draft.id }
        .execute(ledger.service.clone())
        .await
        .unwrap();
    assert_eq!(confirmed.status, DocumentStatus::Confirmed);

    let delivery = CreateDeliveryCommand {
        order_id: draft.id,
        lines: None,
    }
    .execute(ledger.service.clone())
    .await
    .unwrap();
    assert_eq!(delivery.document.delivery_status, FulfillmentStatus::Completed);
    assert_eq!(delivery.dependent.lines.len(), 2);

    let invoice = CreateInvoiceCommand {
        order_id: draft.id,
        lines: None,
    }
    .execute(ledger.service.clone())
    .await
    .unwrap();
    assert_eq!(invoice.dependent.amount, dec!(50));
    assert_eq!(invoice.document.invoice_status, InvoiceStatus::FullyInvoiced);

    let payment = RecordPaymentCommand {
        order_id: draft.id,
        invoice_id: invoice.dependent.id,
        amount: dec!(50),
        reference: Some("bank transfer 0042".into()),
    }
    .execute(ledger.service.clone())
    .await
    .unwrap();
    assert_eq!(payment.document.payment_status, PaymentStatus::Paid);
    assert_eq!(payment.dependent.reference.as_deref(), Some("bank transfer 0042"));

    let completed = CompleteOrderCommand { order_id: draft.id }
        .execute(ledger.service.clone())
        .await
        .unwrap();
    assert_eq!(completed.status, DocumentStatus::Delivered);

    let events = ledger.drain_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::DerivedStatusChanged { .. })));
}

#[tokio::test]
async fn record_payment_command_rejects_zero_amount() {
    let ledger = TestLedger::new();
    let result = RecordPaymentCommand {
        order_id: Uuid::new_v4(),
        invoice_id: Uuid::new_v4(),
        amount: dec!(0),
        reference: None,
    }
    .execute(ledger.service.clone())
    .await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn receive_and_reverse_through_commands() {
    let ledger = TestLedger::new();
    let order = ledger
        .confirmed(DocumentKind::PurchaseOrder, &[(dec!(6), dec!(2), dec!(0))])
        .await;

    let receipt = ReceiveGoodsCommand {
        order_id: order.id,
        lines: None,
        reference: Some("packing slip 17".into()),
    }
    .execute(ledger.service.clone())
    .await
    .unwrap();
    assert_eq!(receipt.document.received_status, FulfillmentStatus::Completed);
    assert_eq!(receipt.dependent.reference.as_deref(), Some("packing slip 17"));

    let reversed = ReverseDependentCommand {
        dependent_id: receipt.dependent.id,
    }
    .execute(ledger.service.clone())
    .await
    .unwrap();
    assert_eq!(reversed.received_status, FulfillmentStatus::Pending);
    assert!(reversed.items[0].received_quantity.is_zero());
}

#[tokio::test]
async fn cancel_command_validates_reason_and_cancels() {
    let ledger = TestLedger::new();
    let order = ledger
        .confirmed(DocumentKind::SalesOrder, &[(dec!(1), dec!(10), dec!(0))])
        .await;

    let too_long = CancelOrderCommand {
        order_id: order.id,
        reason: Some("x".repeat(501)),
    }
    .execute(ledger.service.clone())
    .await;
    assert_matches!(too_long, Err(ServiceError::ValidationError(_)));

    let cancelled = CancelOrderCommand {
        order_id: order.id,
        reason: Some("customer withdrew".into()),
    }
    .execute(ledger.service.clone())
    .await
    .unwrap();
    assert_eq!(cancelled.status, DocumentStatus::Cancelled);

    let delivery = CreateDeliveryCommand {
        order_id: order.id,
        lines: None,
    }
    .execute(ledger.service.clone())
    .await;
    assert_matches!(delivery, Err(ServiceError::InvalidOperation(_)));
}

#[tokio::test]
async fn in_memory_ledger_publishes_events() {
    let (service, mut events) = in_memory_ledger(&AppConfig::default());
    let service = Arc::new(service);

    let created = CreateOrderCommand::new(DocumentKind::SalesOrder)
        .with_line(LineInput::new(Uuid::new_v4(), dec!(1), dec!(10), dec!(0)))
        .execute(service.clone())
        .await
        .unwrap();

    let first = events.recv().await.unwrap();
    assert_eq!(first.document_id(), created.id);
    assert_eq!(first.name(), "document_created");
}

#[tokio::test]
async fn commands_finish_when_nobody_reads_events() {
    let ledger = TestLedger::with_event_capacity(1);
    let actions = async {
        let draft = ledger
            .draft(DocumentKind::SalesOrder, &[(dec!(2), dec!(10), dec!(0))])
            .await;
        let confirmed = ConfirmOrderCommand { order_id: draft.id }
            .execute(ledger.service.clone())
            .await
            .unwrap();
        CreateDeliveryCommand {
            order_id: confirmed.id,
            lines: None,
        }
        .execute(ledger.service.clone())
        .await
        .unwrap()
    };

    let delivered = tokio::time::timeout(Duration::from_secs(5), actions)
        .await
        .expect("user actions must not wait on the event consumer");
    assert_eq!(delivered.document.delivery_status, FulfillmentStatus::Completed);
    let dependents = ledger.service.dependents(delivered.document.id).await.unwrap();
    assert_eq!(dependents.len(), 1);
}
