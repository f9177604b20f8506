use thiserror::Error;

use crate::editor::assist_state::AssistKind;
use crate::render::RenderError;

/// Item generation failed; the quote is left untouched.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("assist service request failed: {0}")]
    Transport(String),
    #[error("assist service returned an error: {0}")]
    Service(String),
    #[error("assist service returned malformed content: {0}")]
    MalformedResponse(String),
    #[error("assist service response does not match the line item schema: {0}")]
    SchemaViolation(String),
}

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("an assist request ({pending}) is already pending")]
    Busy { pending: AssistKind },
    #[error("assist completion does not match the pending request")]
    StaleTicket,
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl EditorError {
    /// Text for the blocking notice shown to the user, in French like the
    /// rendered quote.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Busy { .. } => "Une requête de l'assistant est déjà en cours. Veuillez patienter.",
            Self::StaleTicket => {
                "La réponse de l'assistant concerne une requête qui n'est plus active."
            }
            Self::Generation(_) => "Erreur lors de la génération. Vérifiez la clé API.",
            Self::Render(_) => "L'aperçu du devis n'a pas pu être généré.",
        }
    }
}
