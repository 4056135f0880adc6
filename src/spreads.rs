//! Spread document data model: the JSON shapes produced by the external
//! scanner, plus the display-eligibility policy applied before rendering.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Category rendered when no tab is selected.
pub const DEFAULT_TAB: &str = "dex";

/// Upper display bound. Spreads above this are treated as sentinel or
/// garbage values from the scanner and silently omitted.
pub const MAX_DISPLAY_SPREAD_PCT: f64 = 50.0;

/// Venue price as emitted by the scanner, which is not consistent about
/// quoting numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Price {
    Number(f64),
    Text(String),
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Price::Number(value) => write!(f, "{value}"),
            Price::Text(text) => f.write_str(text),
        }
    }
}

/// One buy-here/sell-there opportunity for a single asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpreadRecord {
    pub symbol: String,
    pub spread: f64,
    pub buy_at: String,
    pub sell_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buy_price: Option<Price>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sell_price: Option<Price>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub networks: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liquidity: Option<String>,
}

impl SpreadRecord {
    /// Eligibility bound is inclusive at the top: a spread of exactly
    /// `MAX_DISPLAY_SPREAD_PCT` still renders.
    pub fn is_displayable(&self) -> bool {
        self.spread > 0.0 && self.spread <= MAX_DISPLAY_SPREAD_PCT
    }

    pub fn buy_display(&self) -> String {
        venue_with_price(&self.buy_at, self.buy_price.as_ref())
    }

    pub fn sell_display(&self) -> String {
        venue_with_price(&self.sell_at, self.sell_price.as_ref())
    }

    pub fn networks_display(&self) -> &str {
        self.networks.as_deref().unwrap_or("Auto")
    }

    pub fn liquidity_display(&self) -> &str {
        self.liquidity.as_deref().unwrap_or("-")
    }
}

fn venue_with_price(venue: &str, price: Option<&Price>) -> String {
    match price {
        Some(price) => format!("{venue} ({price})"),
        None => venue.to_string(),
    }
}

/// Whole-document snapshot keyed by category (`"dex"`, `"spot"`, ...).
/// Record order inside a category is the scanner's order and is preserved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpreadDocument {
    #[serde(flatten)]
    pub categories: BTreeMap<String, Vec<SpreadRecord>>,
}

impl SpreadDocument {
    pub fn category(&self, name: &str) -> &[SpreadRecord] {
        self.categories
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Records of `name` that pass the display bound, in document order.
    pub fn displayable(&self, name: &str) -> Vec<&SpreadRecord> {
        self.category(name)
            .iter()
            .filter(|record| record.is_displayable())
            .collect()
    }

    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    pub fn total_records(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }
}

/// Health document for the external scanner process. Display-only; this
/// dashboard never controls the scanner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannerStatus {
    #[serde(default)]
    pub active: bool,
}
