pub mod assist;
pub mod config;
pub mod domain;
pub mod editor;
pub mod errors;
pub mod pricing;
pub mod render;

pub use assist::AssistGateway;
pub use domain::quote::{LineItem, LineItemId, QuoteData};
pub use editor::assist_state::{AssistKind, AssistState, AssistTicket};
pub use editor::{EditorSession, ItemUpdate, QuoteField};
pub use errors::{EditorError, GenerationError};
pub use pricing::{compute_totals, DeterministicTotalsEngine, QuoteTotals, TotalsEngine};
pub use render::{DisplayDocument, QuoteRenderer, RenderError, TemplateStyle};
