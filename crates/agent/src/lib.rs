//! Assist runtime - generative-language access for the quote editor
//!
//! This crate connects the editor's [`smartquote_core::AssistGateway`] seam to
//! a hosted or local model:
//! - Drafts line items from a free-text description (structured JSON answer)
//! - Rewrites quote notes in a corrected, professional register
//!
//! # Architecture
//!
//! 1. **Transport** (`llm`) - `LlmClient` trait with a Gemini client and an
//!    OpenAI-compatible chat completions client (OpenAI, Ollama)
//! 2. **Gateway** (`assist`) - prompts, answer parsing, error classification
//!
//! # Failure Policy
//!
//! Item generation reports every failure as a `GenerationError` and the
//! editor leaves the quote untouched. Text improvement never fails: the
//! original text comes back and the failure is only logged.
//!
//! The model never computes totals. Amounts it proposes are plain line item
//! inputs; subtotal, tax and total stay with the core pricing module.

pub mod assist;
pub mod llm;

pub use assist::{line_item_schema, parse_line_items, LlmAssistGateway};
pub use llm::{build_llm_client, CompletionRequest, LlmClient, LlmError};
