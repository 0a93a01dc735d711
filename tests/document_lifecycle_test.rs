//! End-to-end tests for the sales and purchase document lifecycle.
//!
//! Tests cover the full journey:
//! - Draft creation with line items and totals
//! - Confirmation (sales) and ordering (purchase)
//! - Partial and full delivery or receipt
//! - Invoicing and payment
//! - Completion, cancellation and reversal

mod common;

use assert_matches::assert_matches;
use common::{line_id, TestLedger};
use order_ledger::{
    errors::ServiceError,
    events::Event,
    models::{
        DependentKind, DependentLine, DocumentFilter, DocumentKind, DocumentStatus,
        FulfillmentStatus, InvoiceStatus, PaymentStatus,
    },
    services::{
        documents::{outstanding_lines, DocumentDetails},
        line_items::{LineInput, LineItemUpdate},
    },
};
use rstest::rstest;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

// ==================== Draft editing ====================

#[tokio::test]
async fn draft_totals_follow_lines_and_discount() {
    let ledger = TestLedger::new();
    let draft = ledger
        .draft(
            DocumentKind::SalesOrder,
            &[(dec!(10), dec!(1000), dec!(10)), (dec!(1), dec!(5000), dec!(0))],
        )
        .await;

    assert_eq!(draft.status, DocumentStatus::Draft);
    assert!(draft.order_number.starts_with("SO-"));
    assert_eq!(draft.total_amount, dec!(16000));

    let discounted = ledger
        .service
        .update_details(
            draft.id,
            DocumentDetails {
                discount: Some(dec!(1000)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(discounted.total_amount, dec!(15000));

    let view = ledger.service.view(draft.id).await.unwrap();
    assert_eq!(view.totals.subtotal, dec!(15000));
    assert_eq!(view.totals.tax_total, dec!(1000));
    assert_eq!(view.totals.grand_total, dec!(15000));
    assert!(!view.actions.create_delivery);
}

#[tokio::test]
async fn add_edit_and_remove_lines_on_a_draft() {
    let ledger = TestLedger::new();
    let draft = ledger
        .draft(DocumentKind::SalesOrder, &[(dec!(2), dec!(50), dec!(0))])
        .await;

    let added = ledger
        .service
        .add_line(draft.id, LineInput::new(Uuid::new_v4(), dec!(1), dec!(25), dec!(20)))
        .await
        .unwrap();
    assert_eq!(added.items.len(), 2);
    assert_eq!(added.total_amount, dec!(130));

    let second = line_id(&added, 1);
    let edited = ledger
        .service
        .edit_line(draft.id, second, LineItemUpdate::quantity(dec!(4)))
        .await
        .unwrap();
    assert_eq!(edited.total_amount, dec!(220));

    let removed = ledger.service.remove_line(draft.id, second).await.unwrap();
    assert_eq!(removed.items.len(), 1);
    assert_eq!(removed.total_amount, edited.total_amount - dec!(120));
}

#[tokio::test]
async fn unknown_line_is_not_found() {
    let ledger = TestLedger::new();
    let draft = ledger
        .draft(DocumentKind::SalesOrder, &[(dec!(1), dec!(10), dec!(0))])
        .await;

    let result = ledger
        .service
        .edit_line(draft.id, Uuid::new_v4(), LineItemUpdate::quantity(dec!(2)))
        .await;
    assert_matches!(result, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn empty_draft_cannot_be_confirmed() {
    let ledger = TestLedger::new();
    let draft = ledger.draft(DocumentKind::SalesOrder, &[]).await;

    let result = ledger.service.confirm(draft.id).await;
    assert_matches!(result, Err(ServiceError::InvalidOperation(_)));
}

// ==================== Sales flow ====================

#[tokio::test]
async fn sales_order_full_lifecycle() {
    let mut ledger = TestLedger::new();
    let order = ledger
        .confirmed(
            DocumentKind::SalesOrder,
            &[(dec!(10), dec!(1000), dec!(10)), (dec!(1), dec!(5000), dec!(0))],
        )
        .await;
    assert_eq!(order.status, DocumentStatus::Confirmed);
    let first = line_id(&order, 0);

    // partial delivery
    let recorded = ledger
        .service
        .create_delivery(order.id, vec![DependentLine::new(first, dec!(5))])
        .await
        .unwrap();
    assert_eq!(recorded.dependent.kind, DependentKind::Delivery);
    assert!(recorded.dependent.number.starts_with("DO-"));
    assert_eq!(recorded.document.delivery_status, FulfillmentStatus::Partial);
    assert_eq!(recorded.document.line(first).unwrap().delivered_quantity, dec!(5));

    // invoice what was delivered
    let invoice = ledger
        .service
        .create_invoice(order.id, vec![DependentLine::new(first, dec!(5))])
        .await
        .unwrap();
    assert_eq!(invoice.dependent.amount, dec!(5500));
    assert_eq!(invoice.document.invoice_status, InvoiceStatus::FullyInvoiced);
    assert!(!ledger.service.view(order.id).await.unwrap().actions.create_invoice);

    // deliver the rest, which re-opens invoicing
    let rest = outstanding_lines(&invoice.document, DependentKind::Delivery);
    assert_eq!(rest.len(), 2);
    let delivered = ledger.service.create_delivery(order.id, rest).await.unwrap();
    assert_eq!(delivered.document.delivery_status, FulfillmentStatus::Completed);
    assert_eq!(delivered.document.invoice_status, InvoiceStatus::Partial);

    let completed = ledger.service.complete(order.id).await.unwrap();
    assert_eq!(completed.status, DocumentStatus::Delivered);

    let final_invoice = ledger
        .service
        .create_invoice(
            order.id,
            outstanding_lines(&completed, DependentKind::Invoice),
        )
        .await
        .unwrap();
    assert_eq!(final_invoice.dependent.amount, dec!(10500));
    assert_eq!(final_invoice.document.invoice_status, InvoiceStatus::FullyInvoiced);

    // pay both invoices
    let partial = ledger
        .service
        .record_payment(order.id, invoice.dependent.id, dec!(5500))
        .await
        .unwrap();
    assert_eq!(partial.document.payment_status, PaymentStatus::Partial);
    assert_eq!(partial.document.outstanding_amount(), dec!(10500));

    let paid = ledger
        .service
        .record_payment(order.id, final_invoice.dependent.id, dec!(10500))
        .await
        .unwrap();
    assert_eq!(paid.document.payment_status, PaymentStatus::Paid);
    assert!(!ledger.service.view(order.id).await.unwrap().actions.record_payment);

    let dependents = ledger.service.dependents(order.id).await.unwrap();
    assert_eq!(dependents.len(), 6);

    let events = ledger.drain_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::DocumentCreated { document_id, .. } if *document_id == order.id)));
    assert!(events.iter().any(|e| matches!(
        e,
        Event::StatusChanged { new_status: DocumentStatus::Delivered, .. }
    )));
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, Event::DependentRecorded { .. }))
            .count(),
        6
    );
}

#[tokio::test]
async fn invoice_is_gated_until_something_is_delivered() {
    let ledger = TestLedger::new();
    let order = ledger
        .confirmed(DocumentKind::SalesOrder, &[(dec!(3), dec!(10), dec!(0))])
        .await;

    let result = ledger
        .service
        .create_invoice(order.id, vec![DependentLine::new(line_id(&order, 0), dec!(1))])
        .await;
    assert_matches!(result, Err(ServiceError::InvalidOperation(_)));
    assert!(ledger.service.dependents(order.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn delivery_on_a_draft_is_gated() {
    let ledger = TestLedger::new();
    let draft = ledger
        .draft(DocumentKind::SalesOrder, &[(dec!(3), dec!(10), dec!(0))])
        .await;

    let result = ledger
        .service
        .create_delivery(draft.id, vec![DependentLine::new(line_id(&draft, 0), dec!(1))])
        .await;
    assert_matches!(result, Err(ServiceError::InvalidOperation(_)));
}

#[tokio::test]
async fn over_delivery_is_a_conflict() {
    let ledger = TestLedger::new();
    let order = ledger
        .confirmed(DocumentKind::SalesOrder, &[(dec!(3), dec!(10), dec!(0))])
        .await;

    let result = ledger
        .service
        .create_delivery(order.id, vec![DependentLine::new(line_id(&order, 0), dec!(4))])
        .await;
    assert_matches!(result, Err(ServiceError::Conflict(_)));

    let reloaded = ledger.service.load(order.id).await.unwrap();
    assert_eq!(reloaded.items[0].delivered_quantity, Decimal::ZERO);
}

#[tokio::test]
async fn editing_below_delivered_quantity_is_rejected() {
    let ledger = TestLedger::new();
    let order = ledger
        .confirmed(DocumentKind::SalesOrder, &[(dec!(10), dec!(10), dec!(0))])
        .await;
    let line = line_id(&order, 0);
    ledger
        .service
        .create_delivery(order.id, vec![DependentLine::new(line, dec!(5))])
        .await
        .unwrap();

    let result = ledger
        .service
        .edit_line(order.id, line, LineItemUpdate::quantity(dec!(3)))
        .await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));

    let raised = ledger
        .service
        .edit_line(order.id, line, LineItemUpdate::quantity(dec!(12)))
        .await
        .unwrap();
    assert_eq!(raised.items[0].quantity, dec!(12));
    assert_eq!(raised.delivery_status, FulfillmentStatus::Partial);
}

#[tokio::test]
async fn delivered_line_cannot_be_removed() {
    let ledger = TestLedger::new();
    let order = ledger
        .confirmed(
            DocumentKind::SalesOrder,
            &[(dec!(2), dec!(10), dec!(0)), (dec!(1), dec!(10), dec!(0))],
        )
        .await;
    let delivered = line_id(&order, 0);
    ledger
        .service
        .create_delivery(order.id, vec![DependentLine::new(delivered, dec!(1))])
        .await
        .unwrap();

    let result = ledger.service.remove_line(order.id, delivered).await;
    assert_matches!(result, Err(ServiceError::Conflict(_)));

    // an untouched line can still go
    let kept = ledger
        .service
        .remove_line(order.id, line_id(&order, 1))
        .await
        .unwrap();
    assert_eq!(kept.items.len(), 1);
    assert_eq!(kept.delivery_status, FulfillmentStatus::Partial);
}

#[tokio::test]
async fn saved_lines_cannot_rewrite_cumulative_quantities() {
    let ledger = TestLedger::new();
    let order = ledger
        .confirmed(DocumentKind::SalesOrder, &[(dec!(10), dec!(10), dec!(0))])
        .await;

    let mut forged = order.items.clone();
    forged[0].delivered_quantity = dec!(10);
    let result = ledger.service.save_lines(order.id, forged).await;
    assert_matches!(result, Err(ServiceError::Conflict(_)));

    // a brand new line cannot arrive already fulfilled either
    let mut with_new = order.items.clone();
    let mut extra = order.items[0].clone();
    extra.id = Uuid::new_v4();
    extra.quantity = dec!(2);
    extra.delivered_quantity = dec!(2);
    with_new.push(extra);
    let result = ledger.service.save_lines(order.id, with_new).await;
    assert_matches!(result, Err(ServiceError::Conflict(_)));

    let reloaded = ledger.service.load(order.id).await.unwrap();
    assert!(reloaded.items[0].delivered_quantity.is_zero());
    assert_eq!(reloaded.items.len(), 1);
    assert_eq!(reloaded.delivery_status, FulfillmentStatus::Pending);
    assert!(ledger.service.dependents(order.id).await.unwrap().is_empty());
}

#[rstest]
#[case::zero_quantity(dec!(0), dec!(10), dec!(0))]
#[case::negative_quantity(dec!(-2), dec!(10), dec!(0))]
#[case::negative_price(dec!(1), dec!(-10), dec!(0))]
#[case::tax_above_hundred(dec!(1), dec!(10), dec!(150))]
#[tokio::test]
async fn saved_lines_are_range_checked(
    #[case] quantity: Decimal,
    #[case] unit_price: Decimal,
    #[case] tax_percent: Decimal,
) {
    let ledger = TestLedger::new();
    let draft = ledger
        .draft(DocumentKind::SalesOrder, &[(dec!(1), dec!(10), dec!(0))])
        .await;

    let mut items = draft.items.clone();
    items[0].quantity = quantity;
    items[0].unit_price = unit_price;
    items[0].tax_percent = tax_percent;
    let result = ledger.service.save_lines(draft.id, items).await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));

    let reloaded = ledger.service.load(draft.id).await.unwrap();
    assert_eq!(reloaded.items, draft.items);
    assert_eq!(reloaded.total_amount, dec!(10));
}

#[tokio::test]
async fn oversized_amounts_are_rejected_before_saving() {
    let ledger = TestLedger::new();
    let draft = ledger
        .draft(DocumentKind::PurchaseOrder, &[(dec!(1), dec!(10), dec!(0))])
        .await;
    let huge = Decimal::from_i128_with_scale(10i128.pow(20), 0);

    let result = ledger
        .service
        .add_line(draft.id, LineInput::new(Uuid::new_v4(), huge, huge, dec!(0)))
        .await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));

    let mut items = draft.items.clone();
    items[0].quantity = huge;
    items[0].unit_price = huge;
    let result = ledger.service.save_lines(draft.id, items).await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));

    assert_eq!(ledger.service.load(draft.id).await.unwrap().total_amount, dec!(10));
}

#[tokio::test]
async fn complete_requires_full_delivery() {
    let ledger = TestLedger::new();
    let order = ledger
        .confirmed(DocumentKind::SalesOrder, &[(dec!(2), dec!(10), dec!(0))])
        .await;
    ledger
        .service
        .create_delivery(order.id, vec![DependentLine::new(line_id(&order, 0), dec!(1))])
        .await
        .unwrap();

    let result = ledger.service.complete(order.id).await;
    assert_matches!(result, Err(ServiceError::InvalidOperation(_)));
}

#[tokio::test]
async fn overpayment_is_rejected() {
    let ledger = TestLedger::new();
    let order = ledger
        .confirmed(DocumentKind::SalesOrder, &[(dec!(1), dec!(100), dec!(0))])
        .await;
    let line = line_id(&order, 0);
    ledger
        .service
        .create_delivery(order.id, vec![DependentLine::new(line, dec!(1))])
        .await
        .unwrap();
    let invoice = ledger
        .service
        .create_invoice(order.id, vec![DependentLine::new(line, dec!(1))])
        .await
        .unwrap();

    let result = ledger
        .service
        .record_payment(order.id, invoice.dependent.id, dec!(150))
        .await;
    assert_matches!(result, Err(ServiceError::Conflict(_)));
}

// ==================== Purchase flow ====================

#[tokio::test]
async fn purchase_order_receive_invoice_and_pay() {
    let ledger = TestLedger::new();
    let order = ledger
        .confirmed(DocumentKind::PurchaseOrder, &[(dec!(4), dec!(25), dec!(0))])
        .await;
    assert_eq!(order.status, DocumentStatus::Ordered);
    assert!(order.order_number.starts_with("PO-"));
    let line = line_id(&order, 0);

    // purchase orders receive, they never deliver
    let wrong_side = ledger
        .service
        .create_delivery(order.id, vec![DependentLine::new(line, dec!(1))])
        .await;
    assert_matches!(wrong_side, Err(ServiceError::InvalidOperation(_)));

    let received = ledger
        .service
        .receive_goods(order.id, vec![DependentLine::new(line, dec!(4))])
        .await
        .unwrap();
    assert!(received.dependent.number.starts_with("GR-"));
    assert_eq!(received.document.received_status, FulfillmentStatus::Completed);
    assert_eq!(received.document.delivery_status, FulfillmentStatus::Pending);

    let completed = ledger.service.complete(order.id).await.unwrap();
    assert_eq!(completed.status, DocumentStatus::Received);

    let invoice = ledger
        .service
        .create_invoice(order.id, vec![DependentLine::new(line, dec!(4))])
        .await
        .unwrap();
    assert_eq!(invoice.dependent.amount, dec!(100));

    let paid = ledger
        .service
        .record_payment(order.id, invoice.dependent.id, dec!(100))
        .await
        .unwrap();
    assert_eq!(paid.document.payment_status, PaymentStatus::Paid);
    assert_eq!(paid.dependent.number.split('-').next(), Some("PAY"));
}

// ==================== Reversal ====================

#[tokio::test]
async fn reversal_unwinds_in_dependency_order() {
    let ledger = TestLedger::new();
    let order = ledger
        .confirmed(DocumentKind::SalesOrder, &[(dec!(5), dec!(10), dec!(0))])
        .await;
    let line = line_id(&order, 0);
    let delivery = ledger
        .service
        .create_delivery(order.id, vec![DependentLine::new(line, dec!(5))])
        .await
        .unwrap();
    let invoice = ledger
        .service
        .create_invoice(order.id, vec![DependentLine::new(line, dec!(5))])
        .await
        .unwrap();
    let payment = ledger
        .service
        .record_payment(order.id, invoice.dependent.id, dec!(20))
        .await
        .unwrap();

    // invoiced quantity would exceed delivered
    let early = ledger.service.reverse_dependent(delivery.dependent.id).await;
    assert_matches!(early, Err(ServiceError::Conflict(_)));

    // invoice still carries a payment
    let paid_invoice = ledger.service.reverse_dependent(invoice.dependent.id).await;
    assert_matches!(paid_invoice, Err(ServiceError::Conflict(_)));

    let unpaid = ledger
        .service
        .reverse_dependent(payment.dependent.id)
        .await
        .unwrap();
    assert_eq!(unpaid.paid_amount, Decimal::ZERO);
    assert_eq!(unpaid.payment_status, PaymentStatus::Unpaid);

    let uninvoiced = ledger
        .service
        .reverse_dependent(invoice.dependent.id)
        .await
        .unwrap();
    assert_eq!(uninvoiced.invoice_status, InvoiceStatus::NotInvoiced);

    let undelivered = ledger
        .service
        .reverse_dependent(delivery.dependent.id)
        .await
        .unwrap();
    assert_eq!(undelivered.delivery_status, FulfillmentStatus::Pending);
    assert!(undelivered.items[0].delivered_quantity.is_zero());

    let twice = ledger.service.reverse_dependent(delivery.dependent.id).await;
    assert_matches!(twice, Err(ServiceError::Conflict(_)));
}

// ==================== Status transitions ====================

#[rstest]
#[case(DocumentKind::SalesOrder, DocumentStatus::Ordered)]
#[case(DocumentKind::SalesOrder, DocumentStatus::Received)]
#[case(DocumentKind::PurchaseOrder, DocumentStatus::Confirmed)]
#[case(DocumentKind::PurchaseOrder, DocumentStatus::Delivered)]
#[tokio::test]
async fn drafts_reject_foreign_statuses(#[case] kind: DocumentKind, #[case] target: DocumentStatus) {
    let ledger = TestLedger::new();
    let draft = ledger.draft(kind, &[(dec!(1), dec!(10), dec!(0))]).await;

    let result = ledger.service.transition_status(draft.id, target).await;
    assert_matches!(result, Err(ServiceError::InvalidOperation(_)));
}

#[rstest]
#[case(DocumentKind::SalesOrder)]
#[case(DocumentKind::PurchaseOrder)]
#[tokio::test]
async fn cancelled_documents_are_frozen(#[case] kind: DocumentKind) {
    let ledger = TestLedger::new();
    let order = ledger.confirmed(kind, &[(dec!(2), dec!(10), dec!(0))]).await;

    let cancelled = ledger.service.cancel(order.id).await.unwrap();
    assert_eq!(cancelled.status, DocumentStatus::Cancelled);

    let view = ledger.service.view(order.id).await.unwrap();
    assert!(!view.actions.create_delivery);
    assert!(!view.actions.receive_goods);
    assert!(!view.actions.create_invoice);
    assert!(!view.actions.record_payment);

    let edit = ledger
        .service
        .add_line(order.id, LineInput::new(Uuid::new_v4(), dec!(1), dec!(1), dec!(0)))
        .await;
    assert_matches!(edit, Err(ServiceError::Conflict(_)));

    let reopen = ledger.service.confirm(order.id).await;
    assert_matches!(reopen, Err(ServiceError::InvalidOperation(_)));
}

#[tokio::test]
async fn repeated_confirm_is_a_no_op() {
    let ledger = TestLedger::new();
    let order = ledger
        .confirmed(DocumentKind::SalesOrder, &[(dec!(1), dec!(10), dec!(0))])
        .await;

    let again = ledger.service.confirm(order.id).await.unwrap();
    assert_eq!(again.status, DocumentStatus::Confirmed);
    assert_eq!(again.version, order.version);
}

// ==================== Listing ====================

#[tokio::test]
async fn list_filters_by_kind_and_status() {
    let ledger = TestLedger::new();
    ledger
        .confirmed(DocumentKind::SalesOrder, &[(dec!(1), dec!(10), dec!(0))])
        .await;
    ledger
        .draft(DocumentKind::SalesOrder, &[(dec!(1), dec!(10), dec!(0))])
        .await;
    ledger
        .draft(DocumentKind::PurchaseOrder, &[(dec!(1), dec!(10), dec!(0))])
        .await;

    let sales = ledger
        .service
        .list(DocumentFilter::kind(DocumentKind::SalesOrder))
        .await
        .unwrap();
    assert_eq!(sales.len(), 2);

    let confirmed = ledger
        .service
        .list(DocumentFilter {
            status: Some(DocumentStatus::Confirmed),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(confirmed.len(), 1);
    assert_eq!(ledger.gateway.document_count(), 3);
}
