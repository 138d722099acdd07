//! Product catalog: cleaning, the upload pipeline, and browsing.
//!
//! `load_catalog` runs Loader -> Mapper -> Cleaner over an uploaded file and
//! either yields a complete `Catalog` or fails; a partial table is never
//! exposed. Per-cell coercion failures are recovered by treating the value as
//! missing, and rows missing a critical field are dropped.

use sadio_columns::{map_columns, ColumnMapping};
use sadio_ingest::{loader_for, DelimitedConfig, LoadError, SourceKind, SpreadsheetConfig};
use sadio_model::{CanonicalField, Cell, ProductRow, RawTable};
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

/// Errors that make an upload unusable.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(
        "Missing columns: {}. Available columns: {}",
        join_labels(.missing),
        .available.join(", ")
    )]
    MissingColumns {
        /// Required fields with no usable column, in canonical order
        missing: Vec<CanonicalField>,
        /// Every column found in the file
        available: Vec<String>,
    },
}

fn join_labels(fields: &[CanonicalField]) -> String {
    fields
        .iter()
        .map(|f| f.label())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Loader settings for an upload.
#[derive(Debug, Clone, Default)]
pub struct CatalogConfig {
    pub spreadsheet: SpreadsheetConfig,
    pub delimited: DelimitedConfig,
}

/// A cleaned product table together with how it was mapped.
#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    products: Vec<ProductRow>,
    mapping: ColumnMapping,
    columns: Vec<String>,
}

/// Load an uploaded file into a catalog with default settings.
pub fn load_catalog(bytes: &[u8], kind: SourceKind) -> Result<Catalog, CatalogError> {
    load_catalog_with(bytes, kind, &CatalogConfig::default())
}

/// Load an uploaded file into a catalog.
pub fn load_catalog_with(
    bytes: &[u8],
    kind: SourceKind,
    config: &CatalogConfig,
) -> Result<Catalog, CatalogError> {
    let loader = loader_for(kind, config.spreadsheet.clone(), config.delimited.clone());
    tracing::debug!(loader = loader.name(), bytes = bytes.len(), "Loading upload");
    let table = loader.load(bytes)?;
    Catalog::from_table(&table)
}

impl Catalog {
    /// Map and clean a loaded table.
    pub fn from_table(table: &RawTable) -> Result<Self, CatalogError> {
        tracing::debug!(columns = ?table.headers, "Columns detected");
        let mapping = map_columns(&table.headers);
        if mapping.is_empty() {
            tracing::warn!("No column matched the canonical schema");
        }

        let products = clean(table, &mapping)?;
        tracing::info!(products = products.len(), "Valid products loaded");

        Ok(Self {
            products,
            mapping,
            columns: table.headers.clone(),
        })
    }

    pub fn products(&self) -> &[ProductRow] {
        &self.products
    }

    pub fn mapping(&self) -> &ColumnMapping {
        &self.mapping
    }

    /// Column names as found in the file.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Products matching a filter, in file order.
    pub fn filter(&self, filter: &CatalogFilter) -> Vec<&ProductRow> {
        self.products.iter().filter(|p| filter.matches(p)).collect()
    }

    /// Distinct groups in first-seen order.
    pub fn groups(&self) -> Vec<&str> {
        distinct(self.products.iter().filter_map(|p| p.group.as_deref()))
    }

    /// Distinct brands in first-seen order.
    pub fn brands(&self) -> Vec<&str> {
        distinct(self.products.iter().filter_map(|p| p.brand.as_deref()))
    }

    pub fn find_by_code(&self, code: &str) -> Option<&ProductRow> {
        self.products.iter().find(|p| p.code == code)
    }

    /// First product with this exact description.
    pub fn find_by_description(&self, description: &str) -> Option<&ProductRow> {
        self.products.iter().find(|p| p.description == description)
    }

    pub fn stats(&self) -> CatalogStats {
        CatalogStats {
            products: self.products.len(),
            groups: self.groups().len(),
            mean_price_case: mean(self.products.iter().map(|p| p.price_per_case)),
            mean_price_unit: mean(self.products.iter().map(|p| p.price_per_unit)),
        }
    }
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = Vec::new();
    for value in values {
        if !seen.contains(&value) {
            seen.push(value);
        }
    }
    seen
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Summary figures for a loaded catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogStats {
    pub products: usize,
    pub groups: usize,
    pub mean_price_case: Option<f64>,
    pub mean_price_unit: Option<f64>,
}

/// Browse filter. `None` fields match everything.
#[derive(Debug, Clone, Default)]
pub struct CatalogFilter {
    /// Case-insensitive in the description; substring of code or EAN
    pub search: Option<String>,
    pub group: Option<String>,
    pub brand: Option<String>,
}

impl CatalogFilter {
    pub fn matches(&self, product: &ProductRow) -> bool {
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            let in_description = product
                .description
                .to_lowercase()
                .contains(&search.to_lowercase());
            if !in_description && !product.code.contains(search) && !product.ean.contains(search) {
                return false;
            }
        }
        if let Some(group) = &self.group {
            if product.group.as_ref() != Some(group) {
                return false;
            }
        }
        if let Some(brand) = &self.brand {
            if product.brand.as_ref() != Some(brand) {
                return false;
            }
        }
        true
    }
}

/// Coerce a cell into a number. Text uses comma-or-dot decimals;
/// anything unparsable or non-finite is missing.
pub fn coerce_number(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Empty => None,
        Cell::Number(n) => Some(*n).filter(|n| n.is_finite()),
        Cell::Text(text) => text
            .replace(',', ".")
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite()),
    }
}

/// Turn a mapped table into product rows.
///
/// Fails with `MissingColumns` when a required field has no column. Rows
/// missing any `CanonicalField::CRITICAL` value are dropped; a missing
/// quantity or group is kept as `None`.
pub fn clean(table: &RawTable, mapping: &ColumnMapping) -> Result<Vec<ProductRow>, CatalogError> {
    let indices: HashMap<CanonicalField, usize> = mapping
        .entries()
        .iter()
        .filter_map(|(field, header)| table.column_index(header).map(|i| (*field, i)))
        .collect();

    let missing: Vec<CanonicalField> = CanonicalField::REQUIRED
        .iter()
        .copied()
        .filter(|f| !indices.contains_key(f))
        .collect();
    if !missing.is_empty() {
        return Err(CatalogError::MissingColumns {
            missing,
            available: table.headers.clone(),
        });
    }

    let mut products = Vec::with_capacity(table.len());
    let mut dropped = 0usize;

    for row in &table.rows {
        let cell = |field: CanonicalField| indices.get(&field).map(|&i| &row[i]);
        let text = |field: CanonicalField| cell(field).and_then(Cell::non_empty_text);
        let number = |field: CanonicalField| cell(field).and_then(coerce_number);

        let present = |field: CanonicalField| {
            if field.is_numeric() {
                number(field).is_some()
            } else {
                text(field).is_some()
            }
        };
        if let Some(field) = CanonicalField::CRITICAL.into_iter().find(|f| !present(*f)) {
            tracing::trace!(%field, "Row dropped");
            dropped += 1;
            continue;
        }

        // Critical fields are present past this point
        products.push(ProductRow {
            code: text(CanonicalField::Code).unwrap_or_default(),
            ean: cell(CanonicalField::Ean).map(Cell::to_text).unwrap_or_default(),
            description: text(CanonicalField::Description).unwrap_or_default(),
            quantity_per_pack: number(CanonicalField::Quantity),
            price_per_case: number(CanonicalField::PriceCase).unwrap_or_default(),
            price_per_unit: number(CanonicalField::PriceUnit).unwrap_or_default(),
            group: text(CanonicalField::Group),
            brand: text(CanonicalField::Brand),
        });
    }

    if dropped > 0 {
        tracing::debug!(dropped, "Rows without description or prices removed");
    }
    Ok(products)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sadio_ingest::shape_spreadsheet_grid;

    fn text_row(values: &[&str]) -> Vec<Cell> {
        values.iter().map(|v| Cell::from(*v)).collect()
    }

    fn supplier_header() -> Vec<Cell> {
        text_row(&["EAN", "Cod", "Descrição", "QTD", "Preco CX", "Preco UN", "Grupo"])
    }

    fn detergent_row() -> Vec<Cell> {
        vec![
            Cell::from("7898950000000"),
            Cell::Number(9880.0),
            Cell::from("DETERGENTE LIMAO"),
            Cell::Number(20.0),
            Cell::Number(21.0),
            Cell::Number(1.05),
            Cell::from("DETERGENTE"),
        ]
    }

    fn table(headers: &[&str], rows: Vec<Vec<Cell>>) -> RawTable {
        RawTable::new(headers.iter().map(|h| h.to_string()).collect(), rows)
    }

    #[test]
    fn test_supplier_spreadsheet_scenario() {
        let grid = vec![
            text_row(&["TABELA"]),
            vec![],
            supplier_header(),
            detergent_row(),
            text_row(&["TOTAL GERAL"]),
        ];
        let raw = shape_spreadsheet_grid(grid, &SpreadsheetConfig::default()).unwrap();
        let catalog = Catalog::from_table(&raw).unwrap();

        assert_eq!(catalog.len(), 1);
        let product = &catalog.products()[0];
        assert_eq!(product.price_per_case, 21.00);
        assert_eq!(product.price_per_unit, 1.05);
        assert_eq!(product.ean, "7898950000000");
        assert_eq!(product.code, "9880");
        assert_eq!(product.quantity_per_pack, Some(20.0));
        assert_eq!(product.group.as_deref(), Some("DETERGENTE"));
    }

    #[test]
    fn test_data_rows_exclude_header_and_footer() {
        for total_rows in 5..12 {
            let mut grid = vec![text_row(&["TITLE"]), vec![], supplier_header()];
            for i in 3..total_rows {
                let mut row = detergent_row();
                row[2] = Cell::Text(format!("PRODUCT {i}"));
                grid.push(row);
            }
            let raw = shape_spreadsheet_grid(grid, &SpreadsheetConfig::default()).unwrap();
            let catalog = Catalog::from_table(&raw).unwrap();

            let descriptions: Vec<_> = catalog.products().iter().map(|p| p.description.clone()).collect();
            let expected: Vec<_> = (3..total_rows - 1).map(|i| format!("PRODUCT {i}")).collect();
            assert_eq!(descriptions, expected);
        }
    }

    #[test]
    fn test_missing_group_column() {
        let raw = table(
            &["EAN", "Descrição", "QTD", "Preco CX", "Preco UN"],
            vec![text_row(&["1", "A", "1", "2", "3"])],
        );
        match Catalog::from_table(&raw) {
            Err(CatalogError::MissingColumns { missing, available }) => {
                let labels: Vec<_> = missing.iter().map(|f| f.label()).collect();
                assert_eq!(labels, vec!["Grupo"]);
                assert_eq!(available.len(), 5);
            }
            other => panic!("expected MissingColumns, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_columns_message() {
        let err = CatalogError::MissingColumns {
            missing: vec![CanonicalField::PriceUnit, CanonicalField::Group],
            available: vec!["EAN".into(), "Nome".into()],
        };
        assert_eq!(
            err.to_string(),
            "Missing columns: Preco UN, Grupo. Available columns: EAN, Nome"
        );
    }

    #[test]
    fn test_coercion_failures_become_missing() {
        assert_eq!(coerce_number(&Cell::from(" 1,05 ")), Some(1.05));
        assert_eq!(coerce_number(&Cell::from("21.5")), Some(21.5));
        assert_eq!(coerce_number(&Cell::from("abc")), None);
        assert_eq!(coerce_number(&Cell::from("nan")), None);
        assert_eq!(coerce_number(&Cell::Number(f64::INFINITY)), None);
        assert_eq!(coerce_number(&Cell::Empty), None);
    }

    #[test]
    fn test_critical_fields_drop_rows() {
        let headers = ["EAN", "Descrição", "QTD", "Preco CX", "Preco UN", "Grupo"];
        let raw = table(
            &headers,
            vec![
                text_row(&["1", "OK", "", "10", "1", ""]),
                text_row(&["2", "", "6", "10", "1", "G"]),
                text_row(&["3", "NO CASE PRICE", "6", "abc", "1", "G"]),
                text_row(&["4", "NO UNIT PRICE", "6", "10", "", "G"]),
            ],
        );
        let products = clean(&raw, &map_columns(&raw.headers)).unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].description, "OK");
        assert_eq!(products[0].quantity_per_pack, None);
        assert_eq!(products[0].group, None);
    }

    #[test]
    fn test_only_critical_fields_drop_rows() {
        let headers = ["EAN", "Descrição", "QTD", "Preco CX", "Preco UN", "Grupo"];
        let full = ["1", "SABAO", "6", "10", "1", "G"];
        for (i, header) in headers.iter().enumerate() {
            let mut values = full;
            values[i] = "";
            let raw = table(&headers, vec![text_row(&values)]);
            let products = clean(&raw, &map_columns(&raw.headers)).unwrap();

            let field = map_columns(&raw.headers)
                .entries()
                .iter()
                .find(|(_, h)| h == header)
                .map(|(f, _)| *f)
                .unwrap();
            let expected = if CanonicalField::CRITICAL.contains(&field) { 0 } else { 1 };
            assert_eq!(products.len(), expected, "blank {header}");
        }
    }

    #[test]
    fn test_delimited_pipeline() {
        let csv = "EAN;Cod;Descrição;QTD;Preco CX;Preco UN;Grupo;Marca\n\
                   07898950000000;9880;DETERGENTE LIMAO;20;21,00;1,05;DETERGENTE;TANLUX\n\
                   7898950000001;9881;DETERGENTE MACA;20;21,00;1,05;DETERGENTE;TANLUX\n\
                   7898950000002;7001;SABAO PO;10;35,90;3,59;SABAO;ALVO\n";
        let catalog = load_catalog(csv.as_bytes(), SourceKind::Delimited).unwrap();

        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.products()[0].ean, "07898950000000");
        assert_eq!(catalog.products()[2].price_per_case, 35.9);
        assert_eq!(catalog.groups(), vec!["DETERGENTE", "SABAO"]);
        assert_eq!(catalog.brands(), vec!["TANLUX", "ALVO"]);
        assert_eq!(catalog.find_by_code("7001").map(|p| p.description.as_str()), Some("SABAO PO"));
        assert!(catalog.find_by_description("DETERGENTE MACA").is_some());
    }

    #[test]
    fn test_load_error_is_terminal() {
        let result = load_catalog(b"", SourceKind::Delimited);
        assert!(matches!(result, Err(CatalogError::Load(LoadError::Empty))));
    }

    #[test]
    fn test_filter() {
        let mut limao = ProductRow::new("9880", "DETERGENTE LIMAO", 21.0, 1.05);
        limao.ean = "7898950000000".into();
        limao.group = Some("DETERGENTE".into());
        limao.brand = Some("TANLUX".into());
        let mut sabao = ProductRow::new("7001", "SABAO PO", 35.9, 3.59);
        sabao.group = Some("SABAO".into());
        let catalog = Catalog {
            products: vec![limao, sabao],
            mapping: ColumnMapping::default(),
            columns: vec![],
        };

        let by_text = CatalogFilter {
            search: Some("limao".into()),
            ..Default::default()
        };
        assert_eq!(catalog.filter(&by_text).len(), 1);

        let by_ean = CatalogFilter {
            search: Some("78989".into()),
            ..Default::default()
        };
        assert_eq!(catalog.filter(&by_ean)[0].code, "9880");

        let by_group = CatalogFilter {
            group: Some("SABAO".into()),
            ..Default::default()
        };
        assert_eq!(catalog.filter(&by_group)[0].code, "7001");

        let by_brand = CatalogFilter {
            brand: Some("TANLUX".into()),
            search: Some("sabao".into()),
            ..Default::default()
        };
        assert!(catalog.filter(&by_brand).is_empty());
        assert_eq!(catalog.filter(&CatalogFilter::default()).len(), 2);
    }

    #[test]
    fn test_stats() {
        let catalog = Catalog {
            products: vec![
                ProductRow::new("1", "A", 20.0, 1.0),
                ProductRow::new("2", "B", 30.0, 2.0),
            ],
            mapping: ColumnMapping::default(),
            columns: vec![],
        };
        let stats = catalog.stats();
        assert_eq!(stats.products, 2);
        assert_eq!(stats.groups, 0);
        assert_eq!(stats.mean_price_case, Some(25.0));
        assert_eq!(stats.mean_price_unit, Some(1.5));
    }
}
