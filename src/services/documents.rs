use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::AppConfig,
    errors::ServiceError,
    events::{Event, EventSender},
    gateway::PersistenceGateway,
    models::{
        DependentDocument, DependentDocumentRequest, DependentKind, DependentLine, Document,
        DocumentFilter, DocumentHeaderUpdate, DocumentStatus, DocumentStatuses, FulfillmentStatus,
        LineItem, NewDocument, OrderSide,
    },
    services::{
        line_items::{fulfilment_summary, FulfilmentSummary, LineInput, LineItemEditor, LineItemUpdate},
        money::round_for_display,
        status_propagator::{
            available_actions, derive_header, derive_statuses, ensure_action_allowed,
            refresh_derived, AvailableActions,
        },
        totals::{document_totals, ensure_totals_in_range, invoice_amount, DocumentTotals},
    },
    tracing::{ensure_not_cancelled, guard_read, guard_write},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceSettings {
    pub gateway_timeout: Duration,
    pub display_scale: u32,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            gateway_timeout: Duration::from_secs(10),
            display_scale: 2,
        }
    }
}

impl From<&AppConfig> for ServiceSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            gateway_timeout: config.gateway_timeout(),
            display_scale: config.display_scale,
        }
    }
}

/// A freshly loaded document together with everything derived from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentView {
    pub document: Document,
    pub totals: DocumentTotals,
    pub actions: AvailableActions,
    pub fulfilment: FulfilmentSummary,
}

impl DocumentView {
    pub fn from_document(document: Document) -> Self {
        let totals = document_totals(&document);
        let actions = available_actions(&document);
        let fulfilment = fulfilment_summary(&document.items, document.side());
        Self {
            document,
            totals,
            actions,
            fulfilment,
        }
    }

    /// Totals rounded for presentation.
    pub fn display_totals(&self, scale: u32) -> DocumentTotals {
        DocumentTotals {
            subtotal: round_for_display(self.totals.subtotal, scale),
            tax_total: round_for_display(self.totals.tax_total, scale),
            line_discount_total: round_for_display(self.totals.line_discount_total, scale),
            document_discount: round_for_display(self.totals.document_discount, scale),
            grand_total: round_for_display(self.totals.grand_total, scale),
        }
    }
}

/// User-editable header fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentDetails {
    pub discount: Option<Decimal>,
    pub notes: Option<Option<String>>,
    pub counterparty_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedDependent {
    pub dependent: DependentDocument,
    /// The parent, reloaded after the increment.
    pub document: Document,
}

/// Every line still open for `kind` at its full remaining quantity.
pub fn outstanding_lines(document: &Document, kind: DependentKind) -> Vec<DependentLine> {
    let side = document.side();
    document
        .items
        .iter()
        .filter_map(|line| {
            let remaining = match kind {
                DependentKind::Delivery | DependentKind::Receipt => line.remaining_to_fulfil(side),
                DependentKind::Invoice => line.remaining_to_invoice(side),
                DependentKind::Payment => Decimal::ZERO,
            };
            (remaining > Decimal::ZERO).then(|| DependentLine::new(line.id, remaining))
        })
        .collect()
}

/// Orchestrates load, recompute and save of documents against the gateway.
///
/// Each user action is one pass: load and re-derive, mutate locally,
/// recompute, write, reload. Nothing derived is cached between calls.
#[derive(Clone)]
pub struct DocumentService {
    gateway: Arc<dyn PersistenceGateway>,
    event_sender: Option<Arc<EventSender>>,
    settings: ServiceSettings,
}

impl DocumentService {
    pub fn new(gateway: Arc<dyn PersistenceGateway>) -> Self {
        Self {
            gateway,
            event_sender: None,
            settings: ServiceSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: ServiceSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_events(mut self, event_sender: Arc<EventSender>) -> Self {
        self.event_sender = Some(event_sender);
        self
    }

    pub fn settings(&self) -> ServiceSettings {
        self.settings
    }

    async fn read<T, F>(&self, operation: &str, future: F) -> Result<T, ServiceError>
    where
        F: Future<Output = Result<T, ServiceError>>,
    {
        guard_read(operation, self.settings.gateway_timeout, future).await
    }

    async fn write<T, F>(&self, operation: &str, future: F) -> Result<T, ServiceError>
    where
        F: Future<Output = Result<T, ServiceError>>,
    {
        guard_write(operation, self.settings.gateway_timeout, future)
            .await
            .map_err(|e| {
                error!(operation, error = %e, "gateway write failed; caller must re-fetch");
                e
            })
    }

    async fn publish(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            sender.send_or_log(event).await;
        }
    }

    /// Fetches a document and re-derives its totals and statuses from the
    /// current lines.
    #[instrument(skip(self))]
    pub async fn load(&self, id: Uuid) -> Result<Document, ServiceError> {
        let mut document = self.read("fetch_document", self.gateway.fetch_document(id)).await?;
        if refresh_derived(&mut document) {
            warn!(document_id = %id, "stored derived fields were stale");
        }
        Ok(document)
    }

    pub async fn view(&self, id: Uuid) -> Result<DocumentView, ServiceError> {
        Ok(DocumentView::from_document(self.load(id).await?))
    }

    pub async fn list(&self, filter: DocumentFilter) -> Result<Vec<Document>, ServiceError> {
        let mut documents = self
            .read("fetch_document_list", self.gateway.fetch_document_list(filter))
            .await?;
        for document in &mut documents {
            refresh_derived(document);
        }
        Ok(documents)
    }

    pub async fn dependents(&self, parent_id: Uuid) -> Result<Vec<DependentDocument>, ServiceError> {
        self.read(
            "fetch_dependent_documents",
            self.gateway.fetch_dependent_documents(parent_id),
        )
        .await
    }

    #[instrument(skip(self, new), fields(kind = %new.kind))]
    pub async fn create(&self, new: NewDocument) -> Result<Document, ServiceError> {
        new.validate()?;
        validate_lines(&new.items)?;
        for item in &new.items {
            ensure_cumulatives_match(item, None)?;
        }
        ensure_not_cancelled("create_document")?;

        let mut document = self
            .write("create_document", self.gateway.create_document(new))
            .await?;
        let derived = derive_header(&document);
        if derived.total_amount() != document.total_amount || derived.statuses() != document.statuses() {
            document = self
                .write(
                    "update_document_header",
                    self.gateway
                        .update_document_header(document.id, DocumentHeaderUpdate::derived(derived)),
                )
                .await?;
        }

        info!(document_id = %document.id, order_number = %document.order_number, "document created");
        self.publish(Event::DocumentCreated {
            document_id: document.id,
            order_number: document.order_number.clone(),
            kind: document.kind,
        })
        .await;
        Ok(document)
    }

    /// Replaces the whole line set of a document.
    #[instrument(skip(self, items), fields(line_count = items.len()))]
    pub async fn save_lines(
        &self,
        document_id: Uuid,
        items: Vec<LineItem>,
    ) -> Result<Document, ServiceError> {
        let current = self.load(document_id).await?;
        current.ensure_lines_editable()?;
        self.persist_lines(&current, items).await
    }

    pub async fn add_line(&self, document_id: Uuid, input: LineInput) -> Result<Document, ServiceError> {
        let current = self.load(document_id).await?;
        current.ensure_lines_editable()?;
        let mut editor = LineItemEditor::from_document(&current);
        editor.add_line(input)?;
        self.persist_lines(&current, editor.into_items()).await
    }

    pub async fn edit_line(
        &self,
        document_id: Uuid,
        line_id: Uuid,
        update: LineItemUpdate,
    ) -> Result<Document, ServiceError> {
        let current = self.load(document_id).await?;
        current.ensure_lines_editable()?;
        let mut editor = LineItemEditor::from_document(&current);
        let index = editor
            .index_of(line_id)
            .ok_or_else(|| ServiceError::line_not_found(line_id))?;
        editor.edit_line(index, update)?;
        self.persist_lines(&current, editor.into_items()).await
    }

    pub async fn remove_line(&self, document_id: Uuid, line_id: Uuid) -> Result<Document, ServiceError> {
        let current = self.load(document_id).await?;
        current.ensure_lines_editable()?;
        let mut editor = LineItemEditor::from_document(&current);
        let index = editor
            .index_of(line_id)
            .ok_or_else(|| ServiceError::line_not_found(line_id))?;
        editor.remove_line(index)?;
        self.persist_lines(&current, editor.into_items()).await
    }

    /// Items first, then the derived header, then a full reload. If the item
    /// replacement fails the header is never written.
    async fn persist_lines(&self, current: &Document, items: Vec<LineItem>) -> Result<Document, ServiceError> {
        validate_lines(&items)?;
        ensure_locked_lines_kept(current, &items)?;
        for item in &items {
            item.check_fulfilment_invariants(current.side())?;
        }

        let mut candidate = current.clone();
        candidate.items = items;
        let derived = derive_header(&candidate);
        let line_count = candidate.items.len();

        ensure_not_cancelled("save_lines")?;
        self.write(
            "replace_document_items",
            self.gateway.replace_document_items(current.id, candidate.items),
        )
        .await?;
        self.write(
            "update_document_header",
            self.gateway
                .update_document_header(current.id, DocumentHeaderUpdate::derived(derived)),
        )
        .await?;
        let document = self.reload(current.id).await?;

        info!(document_id = %document.id, line_count, total_amount = %document.total_amount, "lines saved");
        self.publish(Event::LinesSaved {
            document_id: document.id,
            line_count,
            total_amount: document.total_amount,
        })
        .await;
        if document.statuses() != current.statuses() {
            self.publish(Event::DerivedStatusChanged {
                document_id: document.id,
                before: current.statuses(),
                after: document.statuses(),
            })
            .await;
        }
        Ok(document)
    }

    /// Reload that belongs to a write sequence, so it is not cut short by
    /// the cancellation token.
    async fn reload(&self, id: Uuid) -> Result<Document, ServiceError> {
        let mut document = self.write("fetch_document", self.gateway.fetch_document(id)).await?;
        refresh_derived(&mut document);
        Ok(document)
    }

    #[instrument(skip(self, details))]
    pub async fn update_details(
        &self,
        document_id: Uuid,
        details: DocumentDetails,
    ) -> Result<Document, ServiceError> {
        let current = self.load(document_id).await?;
        let mut update = DocumentHeaderUpdate {
            notes: details.notes,
            counterparty_id: details.counterparty_id,
            ..Default::default()
        };

        if let Some(discount) = details.discount {
            if discount < Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "Discount cannot be negative: {}",
                    discount
                )));
            }
            if discount != current.discount {
                current.ensure_lines_editable()?;
                let mut candidate = current.clone();
                candidate.discount = discount;
                update.discount = Some(discount);
                update.derived = Some(derive_header(&candidate));
            }
        }

        ensure_not_cancelled("update_document_header")?;
        self.write(
            "update_document_header",
            self.gateway.update_document_header(document_id, update),
        )
        .await?;
        self.reload(document_id).await
    }

    pub async fn confirm(&self, document_id: Uuid) -> Result<Document, ServiceError> {
        let current = self.load(document_id).await?;
        let target = current.kind.confirmed_status();
        self.transition_from(current, target).await
    }

    pub async fn complete(&self, document_id: Uuid) -> Result<Document, ServiceError> {
        let current = self.load(document_id).await?;
        let target = current.kind.fulfilled_status();
        self.transition_from(current, target).await
    }

    pub async fn cancel(&self, document_id: Uuid) -> Result<Document, ServiceError> {
        let current = self.load(document_id).await?;
        self.transition_from(current, DocumentStatus::Cancelled).await
    }

    pub async fn transition_status(
        &self,
        document_id: Uuid,
        to: DocumentStatus,
    ) -> Result<Document, ServiceError> {
        let current = self.load(document_id).await?;
        self.transition_from(current, to).await
    }

    #[instrument(skip(self, current), fields(document_id = %current.id, from = %current.status))]
    async fn transition_from(&self, current: Document, to: DocumentStatus) -> Result<Document, ServiceError> {
        if current.status == to {
            return Ok(current);
        }
        if !current.kind.is_originating() || !current.status.can_transition_to(current.kind, to) {
            return Err(ServiceError::InvalidOperation(format!(
                "{} {} cannot move from {} to {}",
                current.kind, current.order_number, current.status, to
            )));
        }
        if to == current.kind.confirmed_status() && current.items.is_empty() {
            return Err(ServiceError::InvalidOperation(format!(
                "{} has no lines to confirm",
                current.order_number
            )));
        }
        if to == current.kind.fulfilled_status() {
            let statuses = derive_statuses(&current);
            let fulfilment = match current.side() {
                OrderSide::Sales => statuses.delivery_status,
                OrderSide::Purchase => statuses.received_status,
            };
            if fulfilment != FulfillmentStatus::Completed {
                return Err(ServiceError::InvalidOperation(format!(
                    "{} cannot be marked {} while fulfilment is {}",
                    current.order_number, to, fulfilment
                )));
            }
        }

        // derived fields are frozen as of the transition
        let update = DocumentHeaderUpdate {
            status: Some(to),
            derived: Some(derive_header(&current)),
            ..Default::default()
        };
        ensure_not_cancelled("update_document_header")?;
        self.write(
            "update_document_header",
            self.gateway.update_document_header(current.id, update),
        )
        .await?;
        let document = self.reload(current.id).await?;

        info!(document_id = %document.id, to = %to, "status changed");
        self.publish(Event::StatusChanged {
            document_id: document.id,
            old_status: current.status,
            new_status: document.status,
        })
        .await;
        Ok(document)
    }

    /// Records a delivery, receipt, invoice or payment against an originating
    /// document and writes back the re-derived header.
    #[instrument(skip(self, request), fields(kind = %request.kind, parent = %request.parent_document_id))]
    pub async fn record_dependent(
        &self,
        mut request: DependentDocumentRequest,
    ) -> Result<RecordedDependent, ServiceError> {
        let parent = self.load(request.parent_document_id).await?;
        ensure_action_allowed(&parent, request.kind.into())?;
        precheck_lines(&parent, &request)?;
        if request.kind == DependentKind::Invoice {
            request.amount = invoice_amount(&parent, &request.lines)?;
        }

        ensure_not_cancelled("record_dependent_document")?;
        let dependent = self
            .write(
                "record_dependent_document",
                self.gateway.record_dependent_document(request),
            )
            .await?;
        let document = self.resync_derived(parent.id, parent.statuses()).await?;

        info!(dependent_id = %dependent.id, number = %dependent.number, "dependent document recorded");
        self.publish(Event::DependentRecorded {
            document_id: document.id,
            dependent_id: dependent.id,
            kind: dependent.kind,
            number: dependent.number.clone(),
        })
        .await;
        Ok(RecordedDependent {
            dependent,
            document,
        })
    }

    pub async fn create_delivery(
        &self,
        parent_id: Uuid,
        lines: Vec<DependentLine>,
    ) -> Result<RecordedDependent, ServiceError> {
        self.record_dependent(DependentDocumentRequest::delivery(parent_id, lines))
            .await
    }

    pub async fn receive_goods(
        &self,
        parent_id: Uuid,
        lines: Vec<DependentLine>,
    ) -> Result<RecordedDependent, ServiceError> {
        self.record_dependent(DependentDocumentRequest::receipt(parent_id, lines))
            .await
    }

    /// The amount is computed from the invoiced lines.
    pub async fn create_invoice(
        &self,
        parent_id: Uuid,
        lines: Vec<DependentLine>,
    ) -> Result<RecordedDependent, ServiceError> {
        self.record_dependent(DependentDocumentRequest::invoice(parent_id, lines, Decimal::ZERO))
            .await
    }

    pub async fn record_payment(
        &self,
        parent_id: Uuid,
        invoice_id: Uuid,
        amount: Decimal,
    ) -> Result<RecordedDependent, ServiceError> {
        self.record_dependent(DependentDocumentRequest::payment(parent_id, invoice_id, amount))
            .await
    }

    /// Correction path: undoes a recorded dependent document.
    #[instrument(skip(self))]
    pub async fn reverse_dependent(&self, dependent_id: Uuid) -> Result<Document, ServiceError> {
        let dependent = self
            .read(
                "fetch_dependent_document",
                self.gateway.fetch_dependent_document(dependent_id),
            )
            .await?;
        let parent = self.load(dependent.parent_document_id).await?;
        if parent.status == DocumentStatus::Cancelled {
            return Err(ServiceError::InvalidOperation(format!(
                "{} is cancelled",
                parent.order_number
            )));
        }
        if dependent.kind.required_side().is_some() && parent.status == parent.kind.fulfilled_status() {
            return Err(ServiceError::InvalidOperation(format!(
                "{} is {}; its fulfilment can no longer be reversed",
                parent.order_number, parent.status
            )));
        }

        ensure_not_cancelled("reverse_dependent_document")?;
        let reversed = self
            .write(
                "reverse_dependent_document",
                self.gateway.reverse_dependent_document(dependent_id),
            )
            .await?;
        let document = self.resync_derived(parent.id, parent.statuses()).await?;

        info!(dependent_id = %reversed.id, number = %reversed.number, "dependent document reversed");
        self.publish(Event::DependentReversed {
            document_id: document.id,
            dependent_id: reversed.id,
            kind: reversed.kind,
        })
        .await;
        Ok(document)
    }

    /// Reloads after the gateway changed cumulative quantities and writes the
    /// re-derived header back when it differs from what is stored.
    async fn resync_derived(
        &self,
        id: Uuid,
        before: DocumentStatuses,
    ) -> Result<Document, ServiceError> {
        let stored = self.write("fetch_document", self.gateway.fetch_document(id)).await?;
        let mut document = stored.clone();
        if refresh_derived(&mut document) {
            document = self
                .write(
                    "update_document_header",
                    self.gateway
                        .update_document_header(id, DocumentHeaderUpdate::derived(derive_header(&stored))),
                )
                .await?;
        }
        if document.statuses() != before {
            self.publish(Event::DerivedStatusChanged {
                document_id: id,
                before,
                after: document.statuses(),
            })
            .await;
        }
        Ok(document)
    }
}

/// Range checks on every line, run before any write.
fn validate_lines(items: &[LineItem]) -> Result<(), ServiceError> {
    for item in items {
        item.validate_amounts()?;
    }
    ensure_totals_in_range(items)
}

/// An incoming line must carry the stored cumulative quantities of the line
/// it replaces, or zeros when it is new.
fn ensure_cumulatives_match(item: &LineItem, stored: Option<&LineItem>) -> Result<(), ServiceError> {
    let (delivered, received, invoiced) = stored.map_or(
        (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
        |line| (line.delivered_quantity, line.received_quantity, line.invoiced_quantity),
    );
    if item.delivered_quantity != delivered
        || item.received_quantity != received
        || item.invoiced_quantity != invoiced
    {
        return Err(ServiceError::Conflict(format!(
            "Cumulative quantities of line {} are maintained by dependent documents",
            item.id
        )));
    }
    Ok(())
}

/// Cumulative quantities are owned by dependent documents. A saved line set
/// must carry them over unchanged, a new line starts at zero, and a line with
/// fulfilment may not disappear or shrink below what has been fulfilled.
fn ensure_locked_lines_kept(current: &Document, items: &[LineItem]) -> Result<(), ServiceError> {
    for line in current.items.iter().filter(|line| line.has_fulfilment()) {
        match items.iter().find(|item| item.id == line.id) {
            None => {
                return Err(ServiceError::Conflict(format!(
                    "Line {} has fulfilment recorded and cannot be removed",
                    line.id
                )))
            }
            Some(item) if item.quantity < line.locked_quantity() => {
                return Err(ServiceError::ValidationError(format!(
                    "Quantity cannot drop below the already fulfilled {} (requested {})",
                    line.locked_quantity(),
                    item.quantity
                )))
            }
            Some(_) => {}
        }
    }

    items
        .iter()
        .try_for_each(|item| ensure_cumulatives_match(item, current.line(item.id)))
}

/// Local check against the loaded parent before anything is written. The
/// gateway enforces the same bounds atomically.
fn precheck_lines(parent: &Document, request: &DependentDocumentRequest) -> Result<(), ServiceError> {
    let side = parent.side();
    let mut requested: HashMap<Uuid, Decimal> = HashMap::new();
    for line in &request.lines {
        let total = requested.entry(line.source_line_id).or_insert(Decimal::ZERO);
        *total = total.checked_add(line.quantity).ok_or_else(|| {
            ServiceError::ValidationError(format!(
                "Requested quantity for line {} is out of range",
                line.source_line_id
            ))
        })?;
    }

    for (line_id, quantity) in requested {
        let line = parent
            .line(line_id)
            .ok_or_else(|| ServiceError::line_not_found(line_id))?;
        let available = match request.kind {
            DependentKind::Delivery | DependentKind::Receipt => line.remaining_to_fulfil(side),
            DependentKind::Invoice => line.remaining_to_invoice(side),
            DependentKind::Payment => continue,
        };
        if quantity > available {
            return Err(ServiceError::Conflict(format!(
                "Line {} has {} left for {} but {} was requested",
                line_id, available, request.kind, quantity
            )));
        }
    }
    Ok(())
}
