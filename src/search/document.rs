use serde_json::{Map, Value};

/// The indexed projection of an entity
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDocument {
    pub id: i64,
    pub fields: Map<String, Value>,
}

impl IndexDocument {
    /// Lowercased text of every string field, for local matching
    pub fn text(&self) -> String {
        self.fields
            .values()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }
}

/// Capability of an entity kind to be mirrored into the search index
///
/// The document is always recomputed from the entity, never stored.
pub trait Searchable {
    fn search_id(&self) -> i64;

    /// Names of the fields copied into the index
    fn searchable_fields() -> &'static [&'static str];

    fn field_value(&self, field: &str) -> Value;

    fn index_document(&self) -> IndexDocument {
        let fields = Self::searchable_fields()
            .iter()
            .map(|field| (field.to_string(), self.field_value(field)))
            .collect();
        IndexDocument {
            id: self.search_id(),
            fields,
        }
    }
}
