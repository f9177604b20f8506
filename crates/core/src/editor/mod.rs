//! Editing session: the single owner of the quote being edited.
//!
//! The session applies field and item edits, tracks the selected layout and
//! the assist request state, and hands read-only snapshots to the totals
//! engine and the renderer. Assist calls go through a begin/complete pair so a
//! host event loop can keep the session editable while a request is in flight;
//! `generate_items` and `improve_notes` run the whole round trip.

pub mod assist_state;

use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::assist::AssistGateway;
use crate::domain::quote::{LineItem, LineItemId, QuoteData};
use crate::errors::{EditorError, GenerationError};
use crate::pricing::{DeterministicTotalsEngine, QuoteTotals, TotalsEngine};
use crate::render::{DisplayDocument, QuoteRenderer, TemplateStyle};

use self::assist_state::{AssistKind, AssistOutcome, AssistState, AssistTicket, AssistTracker};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QuoteField {
    Number,
    Date,
    DueDate,
    Currency,
    CompanyName,
    CompanyAddress,
    CompanyEmail,
    ClientName,
    ClientAddress,
    ClientEmail,
    Notes,
    Terms,
}

impl QuoteField {
    pub const ALL: [QuoteField; 12] = [
        Self::Number,
        Self::Date,
        Self::DueDate,
        Self::Currency,
        Self::CompanyName,
        Self::CompanyAddress,
        Self::CompanyEmail,
        Self::ClientName,
        Self::ClientAddress,
        Self::ClientEmail,
        Self::Notes,
        Self::Terms,
    ];

    fn slot(self, quote: &mut QuoteData) -> &mut String {
        match self {
            Self::Number => &mut quote.number,
            Self::Date => &mut quote.date,
            Self::DueDate => &mut quote.due_date,
            Self::Currency => &mut quote.currency,
            Self::CompanyName => &mut quote.company_name,
            Self::CompanyAddress => &mut quote.company_address,
            Self::CompanyEmail => &mut quote.company_email,
            Self::ClientName => &mut quote.client_name,
            Self::ClientAddress => &mut quote.client_address,
            Self::ClientEmail => &mut quote.client_email,
            Self::Notes => &mut quote.notes,
            Self::Terms => &mut quote.terms,
        }
    }

    fn read(self, quote: &QuoteData) -> &str {
        match self {
            Self::Number => &quote.number,
            Self::Date => &quote.date,
            Self::DueDate => &quote.due_date,
            Self::Currency => &quote.currency,
            Self::CompanyName => &quote.company_name,
            Self::CompanyAddress => &quote.company_address,
            Self::CompanyEmail => &quote.company_email,
            Self::ClientName => &quote.client_name,
            Self::ClientAddress => &quote.client_address,
            Self::ClientEmail => &quote.client_email,
            Self::Notes => &quote.notes,
            Self::Terms => &quote.terms,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ItemUpdate {
    Description(String),
    Quantity(Decimal),
    UnitPrice(Decimal),
}

pub struct EditorSession<E = DeterministicTotalsEngine> {
    quote: QuoteData,
    template: TemplateStyle,
    assist: AssistTracker,
    totals_engine: E,
}

impl EditorSession<DeterministicTotalsEngine> {
    pub fn new(quote: QuoteData) -> Self {
        Self::with_engine(quote, DeterministicTotalsEngine)
    }
}

impl Default for EditorSession<DeterministicTotalsEngine> {
    fn default() -> Self {
        Self::new(QuoteData::default())
    }
}

impl<E> EditorSession<E>
where
    E: TotalsEngine,
{
    pub fn with_engine(quote: QuoteData, totals_engine: E) -> Self {
        Self {
            quote,
            template: TemplateStyle::default(),
            assist: AssistTracker::default(),
            totals_engine,
        }
    }

    pub fn with_template(mut self, template: TemplateStyle) -> Self {
        self.template = template;
        self
    }

    pub fn quote(&self) -> &QuoteData {
        &self.quote
    }

    pub fn template(&self) -> TemplateStyle {
        self.template
    }

    pub fn select_template(&mut self, template: TemplateStyle) {
        self.template = template;
    }

    pub fn field(&self, field: QuoteField) -> &str {
        field.read(&self.quote)
    }

    /// Accepts any text as-is; empty names or odd dates are not rejected.
    pub fn set_field(&mut self, field: QuoteField, value: impl Into<String>) {
        *field.slot(&mut self.quote) = value.into();
    }

    pub fn set_tax_rate(&mut self, tax_rate_percent: Decimal) {
        self.quote.tax_rate = tax_rate_percent;
    }

    pub fn add_item(&mut self) -> LineItemId {
        let mut item = LineItem::placeholder();
        while self.quote.contains_item(&item.id) {
            item.id = LineItemId::generate();
        }
        let id = item.id.clone();
        self.quote.items.push(item);
        id
    }

    pub fn remove_item(&mut self, id: &LineItemId) -> bool {
        let before = self.quote.items.len();
        self.quote.items.retain(|item| &item.id != id);
        self.quote.items.len() != before
    }

    pub fn update_item(&mut self, id: &LineItemId, update: ItemUpdate) -> bool {
        let Some(item) = self.quote.items.iter_mut().find(|item| &item.id == id) else {
            return false;
        };

        match update {
            ItemUpdate::Description(description) => item.description = description,
            ItemUpdate::Quantity(quantity) => item.quantity = quantity,
            ItemUpdate::UnitPrice(unit_price) => item.unit_price = unit_price,
        }
        true
    }

    /// Recomputed from the current quote on every call.
    pub fn totals(&self) -> QuoteTotals {
        self.totals_engine.totals(&self.quote)
    }

    pub fn render(&self, renderer: &QuoteRenderer) -> Result<DisplayDocument, EditorError> {
        let totals = self.totals();
        Ok(renderer.render(&self.quote, &totals, self.template)?)
    }

    pub fn assist_state(&self) -> &AssistState {
        self.assist.state()
    }

    pub fn is_busy(&self) -> bool {
        self.assist.is_busy()
    }

    pub fn acknowledge_assist(&mut self) {
        self.assist.acknowledge();
    }

    /// Returns `Ok(None)` for a blank prompt: nothing is dispatched.
    pub fn begin_generation(&mut self, prompt: &str) -> Result<Option<AssistTicket>, EditorError> {
        if prompt.trim().is_empty() {
            return Ok(None);
        }
        self.assist.begin(AssistKind::GenerateItems).map(Some)
    }

    /// Appends generated items in service order and returns their ids. On a
    /// failed generation the quote is left exactly as it was.
    pub fn complete_generation(
        &mut self,
        ticket: AssistTicket,
        result: Result<Vec<LineItem>, GenerationError>,
    ) -> Result<Vec<LineItemId>, EditorError> {
        if ticket.kind() != AssistKind::GenerateItems {
            return Err(EditorError::StaleTicket);
        }

        match result {
            Ok(items) => {
                self.assist.finish(ticket, AssistOutcome::Succeeded)?;
                let ids = self.append_generated(items);
                info!(
                    event_name = "editor.assist.items_appended",
                    appended = ids.len(),
                    item_count = self.quote.items.len(),
                    "generated line items appended to quote"
                );
                Ok(ids)
            }
            Err(error) => {
                self.assist.finish(ticket, AssistOutcome::Failed { reason: error.to_string() })?;
                warn!(
                    event_name = "editor.assist.generation_failed",
                    error = %error,
                    "line item generation failed; quote unchanged"
                );
                Err(error.into())
            }
        }
    }

    /// Starts a notes improvement and returns the text to send: the notes, or
    /// the terms when the notes are empty.
    pub fn begin_improvement(&mut self) -> Result<(AssistTicket, String), EditorError> {
        let ticket = self.assist.begin(AssistKind::ImproveNotes)?;
        let source =
            if self.quote.notes.is_empty() { self.quote.terms.clone() } else { self.quote.notes.clone() };
        Ok((ticket, source))
    }

    /// The improved text always lands in the notes.
    pub fn complete_improvement(
        &mut self,
        ticket: AssistTicket,
        improved: String,
    ) -> Result<(), EditorError> {
        if ticket.kind() != AssistKind::ImproveNotes {
            return Err(EditorError::StaleTicket);
        }
        self.assist.finish(ticket, AssistOutcome::Succeeded)?;
        self.quote.notes = improved;
        Ok(())
    }

    pub async fn generate_items<G>(
        &mut self,
        gateway: &G,
        prompt: &str,
    ) -> Result<Vec<LineItemId>, EditorError>
    where
        G: AssistGateway + ?Sized,
    {
        let Some(ticket) = self.begin_generation(prompt)? else {
            return Ok(Vec::new());
        };
        let result = gateway.generate_line_items(prompt).await;
        self.complete_generation(ticket, result)
    }

    pub async fn improve_notes<G>(&mut self, gateway: &G) -> Result<(), EditorError>
    where
        G: AssistGateway + ?Sized,
    {
        let (ticket, source) = self.begin_improvement()?;
        let improved = gateway.improve_text(&source).await;
        self.complete_improvement(ticket, improved)
    }

    fn append_generated(&mut self, items: Vec<LineItem>) -> Vec<LineItemId> {
        let mut ids = Vec::with_capacity(items.len());
        for mut item in items {
            while self.quote.contains_item(&item.id) {
                item.id = LineItemId::generate();
            }
            ids.push(item.id.clone());
            self.quote.items.push(item);
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use rust_decimal::Decimal;

    use crate::assist::AssistGateway;
    use crate::domain::quote::{LineItem, LineItemId, QuoteData, NEW_ITEM_DESCRIPTION};
    use crate::errors::{EditorError, GenerationError};
    use crate::pricing::{QuoteTotals, TotalsEngine};
    use crate::render::{QuoteRenderer, TemplateStyle};

    use super::assist_state::{AssistKind, AssistState};
    use super::{EditorSession, ItemUpdate, QuoteField};

    enum Script {
        Items(Vec<LineItem>),
        Fail(GenerationError),
    }

    struct FakeGateway {
        script: Script,
        improved: Option<String>,
        calls: AtomicUsize,
    }

    impl FakeGateway {
        fn items(items: Vec<LineItem>) -> Self {
            Self { script: Script::Items(items), improved: None, calls: AtomicUsize::new(0) }
        }

        fn failing(error: GenerationError) -> Self {
            Self { script: Script::Fail(error), improved: None, calls: AtomicUsize::new(0) }
        }

        fn improving(text: &str) -> Self {
            Self {
                script: Script::Items(Vec::new()),
                improved: Some(text.to_string()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AssistGateway for FakeGateway {
        async fn generate_line_items(
            &self,
            _prompt: &str,
        ) -> Result<Vec<LineItem>, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.script {
                Script::Items(items) => Ok(items.clone()),
                Script::Fail(error) => Err(error.clone()),
            }
        }

        async fn improve_text(&self, current_text: &str) -> String {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.improved.clone().unwrap_or_else(|| current_text.to_string())
        }
    }

    fn decimal(value: i64) -> Decimal {
        Decimal::new(value, 0)
    }

    fn generated(description: &str, quantity: i64, unit_price: i64) -> LineItem {
        LineItem::new(description, decimal(quantity), decimal(unit_price))
    }

    #[test]
    fn every_text_field_has_a_setter() {
        let mut session = EditorSession::new(QuoteData::blank());
        for (index, field) in QuoteField::ALL.into_iter().enumerate() {
            session.set_field(field, format!("value-{index}"));
        }
        for (index, field) in QuoteField::ALL.into_iter().enumerate() {
            assert_eq!(session.field(field), format!("value-{index}"));
        }
        assert_eq!(session.quote().client_email, "value-9");
    }

    #[test]
    fn edits_are_reflected_in_totals_immediately() {
        let mut session = EditorSession::new(QuoteData::blank());
        assert_eq!(session.totals(), QuoteTotals::default());

        let id = session.add_item();
        assert!(session.update_item(&id, ItemUpdate::Quantity(decimal(3))));
        assert!(session.update_item(&id, ItemUpdate::UnitPrice(decimal(100))));
        session.set_tax_rate(decimal(20));

        let totals = session.totals();
        assert_eq!(totals.subtotal, decimal(300));
        assert_eq!(totals.tax_amount, decimal(60));
        assert_eq!(totals.total, decimal(360));

        assert!(session.remove_item(&id));
        assert_eq!(session.totals(), QuoteTotals::default());
    }

    #[test]
    fn huge_edits_saturate_totals_and_still_render() {
        let huge = Decimal::from(1_000_000_000_000_000_i64);
        let mut session = EditorSession::default();
        let id = session.add_item();
        assert!(session.update_item(&id, ItemUpdate::Quantity(huge)));
        assert!(session.update_item(&id, ItemUpdate::UnitPrice(huge)));

        let totals = session.totals();
        assert_eq!(totals.subtotal, Decimal::MAX);
        assert_eq!(totals.total, Decimal::MAX);

        let renderer = QuoteRenderer::new().expect("renderer");
        for style in TemplateStyle::ALL {
            session.select_template(style);
            assert!(session.render(&renderer).is_ok(), "{style}: render");
        }
    }

    #[test]
    fn added_item_is_placeholder_at_the_end() {
        let mut session = EditorSession::default();
        let id = session.add_item();

        let last = session.quote().items.last().expect("item");
        assert_eq!(last.id, id);
        assert_eq!(last.description, NEW_ITEM_DESCRIPTION);
        assert_eq!(last.quantity, Decimal::ONE);
        assert_eq!(last.unit_price, Decimal::ZERO);
    }

    #[test]
    fn unknown_item_ids_are_ignored() {
        let mut session = EditorSession::default();
        let before = session.quote().clone();
        let missing = LineItemId("missing".to_string());

        assert!(!session.remove_item(&missing));
        assert!(!session.update_item(&missing, ItemUpdate::Description("x".to_string())));
        assert_eq!(session.quote(), &before);
    }

    #[test]
    fn description_update_keeps_item_position() {
        let mut session = EditorSession::default();
        let first = session.quote().items[0].id.clone();
        assert!(session.update_item(&first, ItemUpdate::Description("Audit".to_string())));
        assert_eq!(session.quote().items[0].description, "Audit");
    }

    #[test]
    fn template_selection_changes_only_presentation() {
        let renderer = QuoteRenderer::new().expect("renderer");
        let mut session = EditorSession::default();
        let totals = session.totals();

        let modern = session.render(&renderer).expect("modern");
        session.select_template(TemplateStyle::Classic);
        let classic = session.render(&renderer).expect("classic");

        assert_eq!(modern.style, TemplateStyle::Modern);
        assert_eq!(classic.style, TemplateStyle::Classic);
        assert_ne!(modern.html, classic.html);
        assert_eq!(session.totals(), totals);
    }

    #[tokio::test]
    async fn generated_items_are_appended_in_order() {
        let gateway = FakeGateway::items(vec![
            generated("Maquettes", 2, 300),
            generated("Intégration", 4, 450),
        ]);
        let mut session = EditorSession::default();

        let ids = session.generate_items(&gateway, "site vitrine").await.expect("generation");

        let items = &session.quote().items;
        assert_eq!(ids.len(), 2);
        assert_eq!(items.len(), 4);
        assert_eq!(items[2].description, "Maquettes");
        assert_eq!(items[3].description, "Intégration");
        assert_eq!(session.totals().subtotal, decimal(850 + 2000 + 600 + 1800));
        assert_eq!(
            session.assist_state(),
            &AssistState::Succeeded { kind: AssistKind::GenerateItems }
        );
    }

    #[tokio::test]
    async fn empty_service_answer_appends_nothing() {
        let gateway = FakeGateway::items(Vec::new());
        let mut session = EditorSession::default();
        let before = session.quote().clone();

        let ids = session.generate_items(&gateway, "rien").await.expect("generation");

        assert!(ids.is_empty());
        assert_eq!(session.quote(), &before);
    }

    #[tokio::test]
    async fn failed_generation_leaves_quote_unchanged() {
        let gateway =
            FakeGateway::failing(GenerationError::MalformedResponse("expected `]`".to_string()));
        let mut session = EditorSession::default();
        let before = session.quote().clone();

        let error = session.generate_items(&gateway, "site").await.expect_err("failure");

        assert!(matches!(error, EditorError::Generation(GenerationError::MalformedResponse(_))));
        assert_eq!(session.quote(), &before);
        assert!(matches!(
            session.assist_state(),
            AssistState::Failed { kind: AssistKind::GenerateItems, .. }
        ));
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn blank_prompt_is_a_no_op() {
        let gateway = FakeGateway::items(vec![generated("x", 1, 1)]);
        let mut session = EditorSession::default();

        let ids = session.generate_items(&gateway, "   ").await.expect("no-op");

        assert!(ids.is_empty());
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
        assert_eq!(session.assist_state(), &AssistState::Idle);
    }

    #[tokio::test]
    async fn generated_ids_never_collide_with_existing_items() {
        let mut session = EditorSession::default();
        let existing: Vec<LineItemId> =
            session.quote().items.iter().map(|item| item.id.clone()).collect();

        let mut clash = generated("Clash", 1, 10);
        clash.id = existing[0].clone();
        let mut twin = generated("Twin", 1, 10);
        twin.id = LineItemId("same".to_string());
        let mut twin_again = generated("Twin again", 1, 10);
        twin_again.id = LineItemId("same".to_string());
        let gateway = FakeGateway::items(vec![clash, twin, twin_again]);

        session.generate_items(&gateway, "doublons").await.expect("generation");

        let ids: HashSet<&LineItemId> = session.quote().items.iter().map(|item| &item.id).collect();
        assert_eq!(ids.len(), session.quote().items.len());
        assert_eq!(session.quote().items[0].id, existing[0]);
    }

    #[test]
    fn second_dispatch_while_pending_is_rejected() {
        let mut session = EditorSession::default();
        let ticket = session.begin_generation("site").expect("dispatch").expect("ticket");

        assert!(session.is_busy());
        assert!(matches!(
            session.begin_generation("autre"),
            Err(EditorError::Busy { pending: AssistKind::GenerateItems })
        ));
        assert!(matches!(session.begin_improvement(), Err(EditorError::Busy { .. })));

        session.complete_generation(ticket, Ok(Vec::new())).expect("completion");
        assert!(!session.is_busy());
    }

    #[test]
    fn edits_while_pending_are_kept_when_items_arrive() {
        let mut session = EditorSession::new(QuoteData::blank());
        let ticket = session.begin_generation("site").expect("dispatch").expect("ticket");

        let manual = session.add_item();
        session.set_field(QuoteField::ClientName, "ACME");
        session
            .complete_generation(ticket, Ok(vec![generated("Hébergement", 12, 20)]))
            .expect("completion");

        let items = &session.quote().items;
        assert_eq!(items[0].id, manual);
        assert_eq!(items[1].description, "Hébergement");
        assert_eq!(session.quote().client_name, "ACME");
    }

    #[test]
    fn stale_or_mismatched_tickets_are_rejected() {
        let mut session = EditorSession::default();
        let first = session.begin_generation("a").expect("dispatch").expect("ticket");
        session.complete_generation(first, Ok(Vec::new())).expect("completion");

        let before = session.quote().clone();
        let replay = session.complete_generation(first, Ok(vec![generated("late", 1, 1)]));
        assert!(matches!(replay, Err(EditorError::StaleTicket)));
        assert_eq!(session.quote(), &before);

        let (improve, _) = session.begin_improvement().expect("improvement");
        let wrong_kind = session.complete_generation(improve, Ok(Vec::new()));
        assert!(matches!(wrong_kind, Err(EditorError::StaleTicket)));
        assert!(session.is_busy());
    }

    #[tokio::test]
    async fn improved_text_replaces_notes() {
        let gateway = FakeGateway::improving("Nous vous remercions de votre confiance.");
        let mut session = EditorSession::default();

        session.improve_notes(&gateway).await.expect("improvement");

        assert_eq!(session.quote().notes, "Nous vous remercions de votre confiance.");
        assert_eq!(
            session.assist_state(),
            &AssistState::Succeeded { kind: AssistKind::ImproveNotes }
        );
    }

    #[test]
    fn improvement_falls_back_to_terms_when_notes_are_empty() {
        let mut session = EditorSession::default();
        session.set_field(QuoteField::Notes, "");

        let (ticket, source) = session.begin_improvement().expect("improvement");
        assert_eq!(source, session.quote().terms);

        session.complete_improvement(ticket, "Conditions revues.".to_string()).expect("complete");
        assert_eq!(session.quote().notes, "Conditions revues.");
        assert_eq!(session.quote().terms, QuoteData::default().terms);
    }

    #[tokio::test]
    async fn degraded_improvement_keeps_original_notes() {
        let gateway = FakeGateway::items(Vec::new());
        let mut session = EditorSession::default();
        let original = session.quote().notes.clone();

        session.improve_notes(&gateway).await.expect("improvement");

        assert_eq!(session.quote().notes, original);
    }

    #[test]
    fn custom_totals_engine_drives_session_totals() {
        struct FlatEngine;

        impl TotalsEngine for FlatEngine {
            fn totals(&self, _quote: &QuoteData) -> QuoteTotals {
                QuoteTotals { subtotal: decimal(1), tax_amount: decimal(0), total: decimal(1) }
            }
        }

        let session = EditorSession::with_engine(QuoteData::default(), FlatEngine);
        assert_eq!(session.totals().total, decimal(1));
    }
}
