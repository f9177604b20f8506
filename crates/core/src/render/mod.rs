//! Print-ready quote documents.
//!
//! Each [`TemplateStyle`] maps to one embedded Tera layout. Every layout
//! receives the same view (quote snapshot, per-line totals, derived totals),
//! so switching style changes presentation only. Rendering is deterministic:
//! identical inputs give byte-identical HTML.

pub mod money;

use std::convert::Infallible;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tera::{Context, Tera};
use thiserror::Error;

use crate::domain::quote::QuoteData;
use crate::pricing::QuoteTotals;

pub use money::{format_money, format_number};

const BASE_TEMPLATE: &str = "base.html.tera";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", from = "String")]
pub enum TemplateStyle {
    #[default]
    Modern,
    Minimalist,
    Classic,
    Bold,
}

impl TemplateStyle {
    pub const ALL: [TemplateStyle; 4] = [Self::Modern, Self::Minimalist, Self::Classic, Self::Bold];

    /// Unrecognized names fall back to [`TemplateStyle::Bold`].
    pub fn parse_or_fallback(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "modern" => Self::Modern,
            "minimalist" => Self::Minimalist,
            "classic" => Self::Classic,
            _ => Self::Bold,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Modern => "modern",
            Self::Minimalist => "minimalist",
            Self::Classic => "classic",
            Self::Bold => "bold",
        }
    }

    fn layout(&self) -> &'static Layout {
        match self {
            Self::Modern => &LAYOUTS[0],
            Self::Minimalist => &LAYOUTS[1],
            Self::Classic => &LAYOUTS[2],
            Self::Bold => &LAYOUTS[3],
        }
    }
}

impl std::fmt::Display for TemplateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateStyle {
    type Err = Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse_or_fallback(value))
    }
}

impl From<String> for TemplateStyle {
    fn from(value: String) -> Self {
        Self::parse_or_fallback(&value)
    }
}

struct Layout {
    template: &'static str,
    source: &'static str,
}

static LAYOUTS: [Layout; 4] = [
    Layout {
        template: "modern.html.tera",
        source: include_str!("../../templates/modern.html.tera"),
    },
    Layout {
        template: "minimalist.html.tera",
        source: include_str!("../../templates/minimalist.html.tera"),
    },
    Layout {
        template: "classic.html.tera",
        source: include_str!("../../templates/classic.html.tera"),
    },
    Layout { template: "bold.html.tera", source: include_str!("../../templates/bold.html.tera") },
];

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template error: {0}")]
    Template(String),
}

impl From<tera::Error> for RenderError {
    fn from(error: tera::Error) -> Self {
        // tera keeps the useful detail in the source chain
        let mut message = error.to_string();
        let mut source = std::error::Error::source(&error);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Self::Template(message)
    }
}

/// A fully laid-out quote, ready for the host's print facility.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisplayDocument {
    pub style: TemplateStyle,
    pub title: String,
    pub html: String,
}

#[derive(Serialize)]
struct LineView<'a> {
    description: &'a str,
    quantity: String,
    unit_price: Decimal,
    line_total: Decimal,
}

#[derive(Clone, Debug)]
pub struct QuoteRenderer {
    tera: Tera,
}

impl QuoteRenderer {
    pub fn new() -> Result<Self, RenderError> {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![".html.tera"]);
        tera.register_filter("money", money::tera_money_filter);

        let mut templates = vec![(BASE_TEMPLATE, include_str!("../../templates/base.html.tera"))];
        templates.extend(LAYOUTS.iter().map(|layout| (layout.template, layout.source)));
        tera.add_raw_templates(templates)?;

        Ok(Self { tera })
    }

    /// Lays out `quote` with `style`. Neither input is modified.
    pub fn render(
        &self,
        quote: &QuoteData,
        totals: &QuoteTotals,
        style: TemplateStyle,
    ) -> Result<DisplayDocument, RenderError> {
        let title = document_title(quote);
        let context = build_context(quote, totals, &title);
        let html = self.tera.render(style.layout().template, &context)?;

        Ok(DisplayDocument { style, title, html })
    }
}

fn document_title(quote: &QuoteData) -> String {
    let number = quote.number.trim();
    if number.is_empty() {
        "Devis".to_string()
    } else {
        format!("Devis {number}")
    }
}

fn build_context(quote: &QuoteData, totals: &QuoteTotals, title: &str) -> Context {
    let lines: Vec<LineView<'_>> = quote
        .items
        .iter()
        .map(|item| LineView {
            description: &item.description,
            quantity: format_number(item.quantity),
            unit_price: item.unit_price,
            line_total: item.line_total(),
        })
        .collect();

    let mut context = Context::new();
    context.insert("title", title);
    context.insert("quote", quote);
    context.insert("lines", &lines);
    context.insert("totals", totals);
    context.insert("tax_rate", &format_number(quote.tax_rate));
    context.insert("currency", &quote.currency);
    context
}
