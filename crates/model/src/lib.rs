//! Core domain model for the Sadio commercial simulator.
//!
//! This crate defines the types shared by every stage of the pipeline:
//! - `Cell` / `RawTable`: untyped grid values as read from an uploaded file
//! - `CanonicalField`: the fixed schema the rest of the system depends on
//! - `ProductRow`: a cleaned, strongly-typed price list entry
//! - `Discount`, `SaleUnit`, `DiscountMode`: the inputs of a quote line
//! - `PriceBreakdown`, `LineItem`: the outputs of pricing and simulation

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single untyped value from the source grid.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    /// Build a text cell, collapsing empty strings to `Empty`.
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            Self::Empty
        } else {
            Self::Text(value)
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Render the cell as a string.
    ///
    /// Numbers use the shortest decimal form and never an exponent, so a
    /// barcode read as `7898950000000.0` renders as `"7898950000000"`.
    pub fn to_text(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(s) => s.clone(),
            Self::Number(n) => n.to_string(),
        }
    }

    /// Text of a non-empty cell, `None` otherwise.
    pub fn non_empty_text(&self) -> Option<String> {
        match self {
            Self::Empty => None,
            other => Some(other.to_text()),
        }
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Self::text(s)
    }
}

/// A loaded grid with its header row separated from the data rows.
///
/// Every row has exactly `headers.len()` cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl RawTable {
    /// Build a table, padding or truncating rows to the header width.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Cell::Empty);
                row
            })
            .collect();
        Self { headers, rows }
    }

    /// Index of the first column with exactly this header.
    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Logical columns of a price list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CanonicalField {
    Ean,
    Description,
    Quantity,
    PriceCase,
    PriceUnit,
    Group,
    /// Internal product code (optional)
    Code,
    /// Brand (optional)
    Brand,
}

impl CanonicalField {
    /// Columns a price list must provide, in mapping order.
    pub const REQUIRED: [CanonicalField; 6] = [
        Self::Ean,
        Self::Description,
        Self::Quantity,
        Self::PriceCase,
        Self::PriceUnit,
        Self::Group,
    ];

    /// Columns a row cannot survive cleaning without.
    pub const CRITICAL: [CanonicalField; 3] =
        [Self::Description, Self::PriceCase, Self::PriceUnit];

    /// Header name used for this field in the supplier's files.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ean => "EAN",
            Self::Description => "Descrição",
            Self::Quantity => "QTD",
            Self::PriceCase => "Preco CX",
            Self::PriceUnit => "Preco UN",
            Self::Group => "Grupo",
            Self::Code => "Cod",
            Self::Brand => "Marca",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Quantity | Self::PriceCase | Self::PriceUnit)
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A cleaned price list entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRow {
    /// Internal product code (empty when the file has no code column)
    #[serde(default)]
    pub code: String,

    /// Barcode, always kept as text
    #[serde(default)]
    pub ean: String,

    pub description: String,

    /// Units per case
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity_per_pack: Option<f64>,

    pub price_per_case: f64,

    pub price_per_unit: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
}

impl ProductRow {
    /// Row with only the identifying fields and prices set.
    pub fn new(
        code: impl Into<String>,
        description: impl Into<String>,
        price_per_case: f64,
        price_per_unit: f64,
    ) -> Self {
        Self {
            code: code.into(),
            ean: String::new(),
            description: description.into(),
            quantity_per_pack: None,
            price_per_case,
            price_per_unit,
            group: None,
            brand: None,
        }
    }

    /// Price the quote starts from for the given sale unit.
    pub fn base_price(&self, unit: SaleUnit) -> f64 {
        match unit {
            SaleUnit::Case => self.price_per_case,
            SaleUnit::Unit => self.price_per_unit,
        }
    }
}

/// How a product is sold on a quote line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaleUnit {
    /// A packaged multiple of the unit (CX)
    #[default]
    Case,
    /// A single unit (UN)
    Unit,
}

impl SaleUnit {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Case => "Caixa",
            Self::Unit => "Unidade",
        }
    }
}

/// Which discount representation was authoritative for a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountMode {
    #[default]
    Percent,
    Currency,
}

impl DiscountMode {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Percent => "Porcentagem",
            Self::Currency => "Reais",
        }
    }
}

/// A discount expressed in exactly one representation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Discount {
    /// Percentage of the base price (0-100)
    Percent(f64),
    /// Currency amount off the base price
    Amount(f64),
}

impl Discount {
    pub fn mode(&self) -> DiscountMode {
        match self {
            Self::Percent(_) => DiscountMode::Percent,
            Self::Amount(_) => DiscountMode::Currency,
        }
    }

    pub fn value(&self) -> f64 {
        match self {
            Self::Percent(v) | Self::Amount(v) => *v,
        }
    }
}

impl Default for Discount {
    fn default() -> Self {
        Self::Percent(0.0)
    }
}

/// Result of applying a discount to a base price and quantity.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub unit_price_after: f64,
    pub total_after: f64,
    pub total_before: f64,
    pub discount_total: f64,
}

/// One confirmed line of a simulated quote. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_code: String,
    pub description: String,
    pub sale_unit: SaleUnit,
    pub quantity: u32,
    pub base_price: f64,
    pub discount_percent: f64,
    pub discount_amount: f64,
    pub discount_mode: DiscountMode,
    pub unit_price_after_discount: f64,
    pub line_total_after_discount: f64,
    pub line_total_before_discount: f64,
    pub discount_total: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_text_keeps_barcodes_intact() {
        assert_eq!(Cell::Number(7898950000000.0).to_text(), "7898950000000");
        assert_eq!(Cell::Number(1.05).to_text(), "1.05");
        assert_eq!(Cell::text("789").to_text(), "789");
        assert_eq!(Cell::Empty.to_text(), "");
    }

    #[test]
    fn test_empty_text_is_empty_cell() {
        assert!(Cell::text("").is_empty());
        assert_eq!(Cell::from("X"), Cell::Text("X".into()));
        assert_eq!(Cell::Empty.non_empty_text(), None);
    }

    #[test]
    fn test_raw_table_pads_rows() {
        let table = RawTable::new(
            vec!["A".into(), "B".into(), "C".into()],
            vec![vec![Cell::from(1.0)], vec![Cell::from(1.0); 4]],
        );
        assert!(table.rows.iter().all(|r| r.len() == 3));
        assert_eq!(table.column_index("B"), Some(1));
        assert_eq!(table.column_index("Z"), None);
    }

    #[test]
    fn test_field_labels() {
        let labels: Vec<_> = CanonicalField::REQUIRED.iter().map(|f| f.label()).collect();
        assert_eq!(labels, vec!["EAN", "Descrição", "QTD", "Preco CX", "Preco UN", "Grupo"]);
        assert!(CanonicalField::PriceUnit.is_numeric());
    }

    #[test]
    fn test_base_price_by_unit() {
        let product = ProductRow::new("9880", "DETERGENTE LIMAO", 21.0, 1.05);
        assert_eq!(product.base_price(SaleUnit::Case), 21.0);
        assert_eq!(product.base_price(SaleUnit::Unit), 1.05);
    }

    #[test]
    fn test_discount_serialization() {
        let parsed: Discount = serde_json::from_str(r#"{"amount": 2.0}"#).unwrap();
        assert_eq!(parsed, Discount::Amount(2.0));
        assert_eq!(parsed.mode(), DiscountMode::Currency);
        let json = serde_json::to_string(&Discount::Percent(5.0)).unwrap();
        assert_eq!(json, r#"{"percent":5.0}"#);
    }
}
