//! Column mapping from free-form headers to the canonical schema.
//!
//! Supplier files name their columns inconsistently ("Preço CX", "PRECOCX",
//! "Valor Caixa"...). The mapper scans the found headers against a fixed
//! pattern table and records which header feeds each `CanonicalField`.
//!
//! Matching is first-match-wins in two directions: fields are resolved in
//! declared order, and for each field the first column (in file order) whose
//! lower-cased name contains any of the field's patterns is taken. A more
//! specific header further right never overrides an earlier loose match.

use sadio_model::CanonicalField;
use serde::Serialize;

/// Substring patterns per required field, in resolution order.
pub const PATTERNS: &[(CanonicalField, &[&str])] = &[
    (
        CanonicalField::Ean,
        &["ean", "codigo barras", "código barras", "codigo de barras"],
    ),
    (
        CanonicalField::Description,
        &["descrição", "descricao", "produto", "nome", "item"],
    ),
    (
        CanonicalField::Quantity,
        &["qtd", "quantidade", "qtde", "qty", "quant"],
    ),
    (
        CanonicalField::PriceCase,
        &["preco cx", "precocx", "preço cx", "preçocx", "caixa"],
    ),
    (
        CanonicalField::PriceUnit,
        &["preco un", "precoun", "preço un", "preçoun", "unidade", "unitário"],
    ),
    (
        CanonicalField::Group,
        &["grupo", "categoria", "categ", "familia", "família"],
    ),
];

/// Optional fields, matched by exact (case-insensitive) header name.
pub const EXACT_NAMES: &[(CanonicalField, &str)] =
    &[(CanonicalField::Code, "cod"), (CanonicalField::Brand, "marca")];

/// Canonical field to found header, in resolution order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ColumnMapping {
    entries: Vec<(CanonicalField, String)>,
}

impl ColumnMapping {
    /// Header mapped to `field`, if any.
    pub fn get(&self, field: CanonicalField) -> Option<&str> {
        self.entries
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, header)| header.as_str())
    }

    pub fn entries(&self) -> &[(CanonicalField, String)] {
        &self.entries
    }

    /// Required fields with no mapped header, in canonical order.
    pub fn missing(&self) -> Vec<CanonicalField> {
        CanonicalField::REQUIRED
            .iter()
            .copied()
            .filter(|f| self.get(*f).is_none())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, field: CanonicalField, header: &str) {
        self.entries.push((field, header.to_string()));
    }
}

/// Map found column names to canonical fields.
pub fn map_columns<S: AsRef<str>>(columns: &[S]) -> ColumnMapping {
    let columns: Vec<&str> = columns.iter().map(|c| c.as_ref()).collect();
    let mut mapping = ColumnMapping::default();

    for (field, patterns) in PATTERNS {
        let found = columns.iter().find(|column| {
            let lower = column.trim().to_lowercase();
            patterns.iter().any(|pattern| lower.contains(pattern))
        });
        if let Some(column) = found {
            tracing::debug!(column = %column, field = %field, "Column mapped");
            mapping.insert(*field, column);
        }
    }

    for (field, name) in EXACT_NAMES {
        let found = columns
            .iter()
            .find(|column| column.trim().to_lowercase() == *name);
        if let Some(column) = found {
            tracing::debug!(column = %column, field = %field, "Optional column mapped");
            mapping.insert(*field, column);
        }
    }

    mapping
}

/// For each missing field, the first column whose name contains the
/// field's label. Diagnostic only.
pub fn suggest_similar<S: AsRef<str>>(
    missing: &[CanonicalField],
    columns: &[S],
) -> Vec<(CanonicalField, String)> {
    let columns: Vec<&str> = columns.iter().map(|c| c.as_ref()).collect();
    missing
        .iter()
        .filter_map(|field| {
            let label = field.label().to_lowercase();
            columns
                .iter()
                .find(|column| column.to_lowercase().contains(&label))
                .map(|column| (*field, column.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SUPPLIER_HEADERS: &[&str] = &[
        "EAN", "NCM", "Cod", "Descrição", "QTD", "X", "Peso", "Preco CX", "Preco UN", "Grupo",
        "Peso CX", "Ultima Venda", "Valor Ultima Venda", "Cod Grupo", "Marca", "DUN",
    ];

    #[test]
    fn test_supplier_layout() {
        let mapping = map_columns(SUPPLIER_HEADERS);
        assert_eq!(mapping.get(CanonicalField::Ean), Some("EAN"));
        assert_eq!(mapping.get(CanonicalField::Description), Some("Descrição"));
        assert_eq!(mapping.get(CanonicalField::Quantity), Some("QTD"));
        assert_eq!(mapping.get(CanonicalField::PriceCase), Some("Preco CX"));
        assert_eq!(mapping.get(CanonicalField::PriceUnit), Some("Preco UN"));
        // "Cod Grupo" also contains "grupo" but comes later
        assert_eq!(mapping.get(CanonicalField::Group), Some("Grupo"));
        assert_eq!(mapping.get(CanonicalField::Code), Some("Cod"));
        assert_eq!(mapping.get(CanonicalField::Brand), Some("Marca"));
        assert!(mapping.missing().is_empty());
    }

    #[test]
    fn test_free_form_headers() {
        let mapping = map_columns(&[
            "Codigo de Barras", "Nome do Produto", "Quantidade", "Valor Caixa",
            "Valor Unitário", "Categoria",
        ]);
        assert_eq!(mapping.get(CanonicalField::Ean), Some("Codigo de Barras"));
        assert_eq!(mapping.get(CanonicalField::Description), Some("Nome do Produto"));
        assert_eq!(mapping.get(CanonicalField::PriceCase), Some("Valor Caixa"));
        assert_eq!(mapping.get(CanonicalField::PriceUnit), Some("Valor Unitário"));
        assert_eq!(mapping.get(CanonicalField::Group), Some("Categoria"));
    }

    #[test]
    fn test_first_column_wins_over_specificity() {
        // "Item" matches the loose "item" pattern before "Descrição" is reached
        let mapping = map_columns(&["Item", "Descrição"]);
        assert_eq!(mapping.get(CanonicalField::Description), Some("Item"));
    }

    #[test]
    fn test_missing_fields() {
        let mapping = map_columns(&["EAN", "Descrição", "QTD", "Preco CX", "Preco UN"]);
        assert_eq!(mapping.missing(), vec![CanonicalField::Group]);
        assert_eq!(mapping.get(CanonicalField::Code), None);
    }

    #[test]
    fn test_no_match_gives_empty_mapping() {
        let mapping = map_columns(&["foo", "bar"]);
        assert!(mapping.is_empty());
        assert_eq!(mapping.missing().len(), 6);
    }

    #[test]
    fn test_mapping_is_deterministic() {
        let first = map_columns(SUPPLIER_HEADERS);
        let second = map_columns(SUPPLIER_HEADERS);
        assert_eq!(first, second);
    }

    #[test]
    fn test_suggest_similar() {
        let suggestions = suggest_similar(&[CanonicalField::Group], &["Sub Grupo", "Grupo B"]);
        assert_eq!(suggestions, vec![(CanonicalField::Group, "Sub Grupo".to_string())]);
    }
}
