//! Field selection from the fetched catalog.
//!
//! Picks the ids of fields matching the wanted data type. When the catalog
//! exposes no `type` attribute at all (schema drift on the server, or an
//! empty fetch), a static fundamentals list keeps the run going instead of
//! failing it.

use brain_client::DataField;
use tracing::{info, warn};

/// Fundamental fields used when the catalog exposes no `type` attribute.
pub const FALLBACK_FIELDS: &[&str] = &[
    "f1_totalassets",
    "f1_cashequivalents",
    "f1_totalrevenue",
    "f1_totalliabilities",
    "f1_netincome",
    "f2_ebit",
    "f2_ebitda",
    "f2_freecashflow",
    "f2_totaldebt",
];

/// Select ids of catalog fields whose data type matches `wanted_type`.
///
/// Capability check first: if no fetched field carries a type value the
/// fallback list is returned, so downstream generation always has inputs.
pub fn select_field_ids(fields: &[DataField], wanted_type: &str) -> Vec<String> {
    let has_type = fields.iter().any(|f| f.field_type.is_some());
    if !has_type {
        warn!(
            wanted_type,
            fetched = fields.len(),
            "catalog exposes no type attribute, using fallback field list"
        );
        return FALLBACK_FIELDS.iter().map(|s| s.to_string()).collect();
    }

    let ids: Vec<String> = fields
        .iter()
        .filter(|f| f.field_type.as_deref() == Some(wanted_type))
        .map(|f| f.id.clone())
        .collect();
    info!(
        selected = ids.len(),
        total = fields.len(),
        wanted_type,
        "selected catalog fields"
    );
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(id: &str, field_type: Option<&str>) -> DataField {
        DataField {
            id: id.to_string(),
            field_type: field_type.map(|t| t.to_string()),
            dataset: None,
            description: None,
        }
    }

    #[test]
    fn test_selects_matching_type_only() {
        let fields = vec![
            field("f1_totalassets", Some("MATRIX")),
            field("f1_news_score", Some("VECTOR")),
            field("f1_netincome", Some("MATRIX")),
        ];
        let ids = select_field_ids(&fields, "MATRIX");
        assert_eq!(ids, vec!["f1_totalassets", "f1_netincome"]);
    }

    #[test]
    fn test_missing_type_column_falls_back() {
        let fields = vec![field("f1_totalassets", None), field("f1_netincome", None)];
        let ids = select_field_ids(&fields, "MATRIX");
        assert_eq!(ids.len(), FALLBACK_FIELDS.len());
        assert_eq!(ids[0], "f1_totalassets");
    }

    #[test]
    fn test_empty_catalog_falls_back() {
        let ids = select_field_ids(&[], "MATRIX");
        assert_eq!(ids.len(), FALLBACK_FIELDS.len());
    }

    #[test]
    fn test_partial_type_column_does_not_fall_back() {
        // One typed field is enough to trust the column.
        let fields = vec![
            field("f1_totalassets", Some("MATRIX")),
            field("f1_mystery", None),
        ];
        let ids = select_field_ids(&fields, "MATRIX");
        assert_eq!(ids, vec!["f1_totalassets"]);
    }
}
