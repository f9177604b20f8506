use async_trait::async_trait;

use crate::domain::quote::LineItem;
use crate::errors::GenerationError;

/// Boundary to the generative-language service.
///
/// The two operations fail differently on purpose: item generation creates
/// data, so failures are returned to the caller; text improvement is a soft
/// enhancement, so implementations log the failure and hand back the input.
#[async_trait]
pub trait AssistGateway: Send + Sync {
    /// Drafts line items from a natural-language description. Each returned
    /// item carries a freshly generated id. An empty service answer is an
    /// empty list, not an error.
    async fn generate_line_items(&self, prompt: &str) -> Result<Vec<LineItem>, GenerationError>;

    /// Returns a corrected, more professional version of `current_text`, or
    /// `current_text` itself when the service fails or answers nothing.
    async fn improve_text(&self, current_text: &str) -> String;
}
