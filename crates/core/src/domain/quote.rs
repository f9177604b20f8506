use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pricing::{compute_totals, QuoteTotals};

pub const NEW_ITEM_DESCRIPTION: &str = "Nouvel article";
pub const DEFAULT_CURRENCY: &str = "€";
const DEFAULT_VALIDITY_DAYS: i64 = 15;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineItemId(pub String);

impl LineItemId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LineItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    #[serde(default = "LineItemId::generate")]
    pub id: LineItemId,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

impl LineItem {
    /// Placeholder row appended by the editor's "add item" action.
    pub fn placeholder() -> Self {
        Self {
            id: LineItemId::generate(),
            description: NEW_ITEM_DESCRIPTION.to_string(),
            quantity: Decimal::ONE,
            unit_price: Decimal::ZERO,
        }
    }

    pub fn new(description: impl Into<String>, quantity: Decimal, unit_price: Decimal) -> Self {
        Self { id: LineItemId::generate(), description: description.into(), quantity, unit_price }
    }

    /// Clamped to `Decimal::MAX` / `Decimal::MIN` when the product leaves the
    /// decimal range.
    pub fn line_total(&self) -> Decimal {
        self.quantity.saturating_mul(self.unit_price)
    }

    /// `None` when the product does not fit a decimal.
    pub fn checked_line_total(&self) -> Option<Decimal> {
        self.quantity.checked_mul(self.unit_price)
    }
}

/// Editable quote document. Dates are free text; nothing here is validated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default = "QuoteData::blank")]
pub struct QuoteData {
    pub number: String,
    pub date: String,
    pub due_date: String,
    pub currency: String,
    pub company_name: String,
    pub company_address: String,
    pub company_email: String,
    pub client_name: String,
    pub client_address: String,
    pub client_email: String,
    pub items: Vec<LineItem>,
    pub notes: String,
    pub terms: String,
    pub tax_rate: Decimal,
}

impl QuoteData {
    pub fn blank() -> Self {
        Self {
            number: String::new(),
            date: String::new(),
            due_date: String::new(),
            currency: DEFAULT_CURRENCY.to_string(),
            company_name: String::new(),
            company_address: String::new(),
            company_email: String::new(),
            client_name: String::new(),
            client_address: String::new(),
            client_email: String::new(),
            items: Vec::new(),
            notes: String::new(),
            terms: String::new(),
            tax_rate: Decimal::ZERO,
        }
    }

    pub fn totals(&self) -> QuoteTotals {
        compute_totals(&self.items, self.tax_rate)
    }

    pub fn item(&self, id: &LineItemId) -> Option<&LineItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    pub fn contains_item(&self, id: &LineItemId) -> bool {
        self.item(id).is_some()
    }
}

impl Default for QuoteData {
    fn default() -> Self {
        let today = Utc::now().date_naive();
        let due = today + Duration::days(DEFAULT_VALIDITY_DAYS);

        Self {
            number: "DEV-2023-001".to_string(),
            date: today.format("%Y-%m-%d").to_string(),
            due_date: due.format("%Y-%m-%d").to_string(),
            currency: DEFAULT_CURRENCY.to_string(),
            company_name: "Ma Société".to_string(),
            company_address: "123 Rue de l'Innovation, 75001 Paris".to_string(),
            company_email: "contact@masociete.com".to_string(),
            client_name: "Client Exemple".to_string(),
            client_address: "456 Avenue du Succès, 69002 Lyon".to_string(),
            client_email: "client@exemple.com".to_string(),
            items: vec![
                LineItem {
                    id: LineItemId("1".to_string()),
                    description: "Consulting Stratégique".to_string(),
                    quantity: Decimal::ONE,
                    unit_price: Decimal::new(850, 0),
                },
                LineItem {
                    id: LineItemId("2".to_string()),
                    description: "Développement Web".to_string(),
                    quantity: Decimal::new(5, 0),
                    unit_price: Decimal::new(400, 0),
                },
            ],
            notes: "Merci de votre confiance.".to_string(),
            terms: "Paiement à 30 jours. Ce devis est valable 1 mois.".to_string(),
            tax_rate: Decimal::new(20, 0),
        }
    }
}
