//! Quote simulation: the accumulated line items, the session that owns
//! them, and the delimited export.
//!
//! A `Simulation` is an append-only, ordered list of `LineItem`s. Items are
//! never edited or removed one by one; the only mutation besides `append`
//! is a wholesale `clear`. Aggregates are recomputed from the full list on
//! every call.

use chrono::NaiveDateTime;
use sadio_catalog::{load_catalog_with, Catalog, CatalogConfig, CatalogError};
use sadio_ingest::SourceKind;
use sadio_model::{Discount, DiscountMode, LineItem, ProductRow, SaleUnit};
use sadio_pricing::{quote, validate_discount, DiscountEditor, DiscountError, DiscountQuote, PricingConfig};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Quantity must be at least 1")]
    InvalidQuantity,

    #[error("No price list loaded")]
    NoCatalog,

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error(transparent)]
    Discount(#[from] DiscountError),

    #[error("Export failed: {0}")]
    Export(#[from] csv::Error),
}

/// Build the immutable line for a priced product.
pub fn build_line_item(
    product: &ProductRow,
    sale_unit: SaleUnit,
    quote: &DiscountQuote,
) -> Result<LineItem, SimulationError> {
    if quote.quantity == 0 {
        return Err(SimulationError::InvalidQuantity);
    }
    Ok(LineItem {
        product_code: product.code.clone(),
        description: product.description.clone(),
        sale_unit,
        quantity: quote.quantity,
        base_price: quote.base_price,
        discount_percent: quote.discount_percent,
        discount_amount: quote.discount_amount,
        discount_mode: quote.mode,
        unit_price_after_discount: quote.breakdown.unit_price_after,
        line_total_after_discount: quote.breakdown.total_after,
        line_total_before_discount: quote.breakdown.total_before,
        discount_total: quote.breakdown.discount_total,
    })
}

/// Aggregate figures over every line.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SimulationTotals {
    pub total_before: f64,
    pub total_after: f64,
    pub total_discount: f64,
    pub average_discount_percent: f64,
}

/// Ordered list of confirmed lines.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Simulation {
    items: Vec<LineItem>,
}

impl Simulation {
    /// Add a line at the end and return it. Identical products are not merged.
    pub fn append(&mut self, item: LineItem) -> &LineItem {
        let index = self.items.len();
        self.items.push(item);
        &self.items[index]
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Lines in insertion order.
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn totals(&self) -> SimulationTotals {
        let total_before: f64 = self.items.iter().map(|i| i.line_total_before_discount).sum();
        let total_after: f64 = self.items.iter().map(|i| i.line_total_after_discount).sum();
        let total_discount: f64 = self.items.iter().map(|i| i.discount_total).sum();
        let average_discount_percent = if total_before > 0.0 {
            total_discount / total_before * 100.0
        } else {
            0.0
        };

        SimulationTotals {
            total_before,
            total_after,
            total_discount,
            average_discount_percent,
        }
    }
}

/// State of one interactive session: the loaded price list, the discount
/// inputs, and the simulation being built.
#[derive(Debug, Default)]
pub struct Session {
    catalog: Option<Catalog>,
    simulation: Simulation,
    discount: DiscountEditor,
    catalog_config: CatalogConfig,
    pricing_config: PricingConfig,
}

impl Session {
    pub fn new(catalog_config: CatalogConfig, pricing_config: PricingConfig) -> Self {
        Self {
            discount: DiscountEditor::new(pricing_config.clone()),
            catalog_config,
            pricing_config,
            ..Default::default()
        }
    }

    /// Load an uploaded file. The current catalog is only replaced when the
    /// new one loads completely.
    pub fn load_upload(&mut self, file_name: &str, bytes: &[u8]) -> Result<&Catalog, CatalogError> {
        let kind = SourceKind::from_file_name(file_name);
        match load_catalog_with(bytes, kind, &self.catalog_config) {
            Ok(catalog) => {
                tracing::info!(file = file_name, products = catalog.len(), "Price list loaded");
                let catalog = self.catalog.insert(catalog);
                Ok(&*catalog)
            }
            Err(e) => {
                tracing::warn!(file = file_name, error = %e, "Upload rejected");
                Err(e)
            }
        }
    }

    pub fn catalog(&self) -> Option<&Catalog> {
        self.catalog.as_ref()
    }

    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    pub fn discount_editor(&self) -> &DiscountEditor {
        &self.discount
    }

    pub fn discount_editor_mut(&mut self) -> &mut DiscountEditor {
        &mut self.discount
    }

    /// Look a product up by code, then by exact description.
    fn product(&self, key: &str) -> Result<&ProductRow, SimulationError> {
        let catalog = self.catalog.as_ref().ok_or(SimulationError::NoCatalog)?;
        catalog
            .find_by_code(key)
            .or_else(|| catalog.find_by_description(key))
            .ok_or_else(|| SimulationError::ProductNotFound(key.to_string()))
    }

    /// Price a product without adding it.
    pub fn preview(
        &self,
        code: &str,
        sale_unit: SaleUnit,
        quantity: u32,
        discount: Discount,
    ) -> Result<DiscountQuote, SimulationError> {
        if quantity == 0 {
            return Err(SimulationError::InvalidQuantity);
        }
        let base_price = self.product(code)?.base_price(sale_unit);
        let discount = validate_discount(discount, base_price, &self.pricing_config)?;
        Ok(quote(base_price, quantity, discount))
    }

    /// Price a product and append it to the simulation.
    pub fn add_item(
        &mut self,
        code: &str,
        sale_unit: SaleUnit,
        quantity: u32,
        discount: Discount,
    ) -> Result<&LineItem, SimulationError> {
        let quote = self.preview(code, sale_unit, quantity, discount)?;
        let item = build_line_item(self.product(code)?, sale_unit, &quote)?;
        Ok(self.push(item))
    }

    /// Append a product using the current value of one discount input.
    pub fn add_from_editor(
        &mut self,
        code: &str,
        sale_unit: SaleUnit,
        quantity: u32,
        mode: DiscountMode,
    ) -> Result<&LineItem, SimulationError> {
        let discount = self.discount.discount(mode);
        self.add_item(code, sale_unit, quantity, discount)
    }

    fn push(&mut self, item: LineItem) -> &LineItem {
        tracing::info!(
            code = %item.product_code,
            percent = item.discount_percent,
            amount = item.discount_amount,
            "Line added to simulation"
        );
        self.simulation.append(item)
    }

    /// Empty the simulation and the discount inputs.
    pub fn reset_simulation(&mut self) {
        self.simulation.clear();
        self.discount.reset();
    }
}

/// Export column headers, in order.
pub const EXPORT_HEADERS: [&str; 10] = [
    "Código",
    "Descrição",
    "Tipo_Venda",
    "Quantidade",
    "Preço_Base",
    "Desconto_Percentual",
    "Desconto_Reais",
    "Tipo_Desconto",
    "Preço_Com_Desconto",
    "Total_Com_Desconto",
];

/// Unrounded decimal with a comma separator (`21,0`, `12,5`).
fn decimal_field(value: f64) -> String {
    format!("{value:?}").replace('.', ",")
}

/// Serialize lines as semicolon-separated text with comma decimals.
pub fn export_csv(items: &[LineItem]) -> Result<String, SimulationError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .from_writer(Vec::new());

    writer.write_record(EXPORT_HEADERS)?;
    for item in items {
        writer.write_record([
            item.product_code.clone(),
            item.description.clone(),
            item.sale_unit.label().to_string(),
            item.quantity.to_string(),
            decimal_field(item.base_price),
            decimal_field(item.discount_percent),
            decimal_field(item.discount_amount),
            item.discount_mode.label().to_string(),
            decimal_field(item.unit_price_after_discount),
            decimal_field(item.line_total_after_discount),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Export file name stamped to the minute.
pub fn export_file_name(now: NaiveDateTime) -> String {
    format!("simulacao_comercial_{}.csv", now.format("%Y%m%d_%H%M"))
}
