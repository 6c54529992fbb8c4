//! Hit serializers
//!
//! A view turns each hit into a JSON object through a [`HitSerializer`]. The
//! default, [`SourceSerializer`], returns the hit's `_source`, optionally projected
//! to a list of (dotted) paths and with the document id injected.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::response::Hit;

pub trait HitSerializer: Send + Sync {
    fn serialize(&self, hit: &Hit) -> Map<String, Value>;
}

/// `serializer_class` settings of a view.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SerializerDefinition {
    /// Paths of `_source` to keep; all of it when unset.
    pub fields: Option<Vec<String>>,
    /// Key under which the document id is added.
    pub id_field: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SourceSerializer {
    fields: Option<Vec<String>>,
    id_field: Option<String>,
}

impl SourceSerializer {
    pub fn new(definition: &SerializerDefinition) -> Self {
        Self {
            fields: definition.fields.clone(),
            id_field: definition.id_field.clone(),
        }
    }
}

impl HitSerializer for SourceSerializer {
    fn serialize(&self, hit: &Hit) -> Map<String, Value> {
        let mut out = Map::new();
        if let Some(key) = &self.id_field {
            out.insert(key.clone(), Value::String(hit.id.clone()));
        }
        match &self.fields {
            None => {
                for (k, v) in &hit.source {
                    out.entry(k.clone()).or_insert_with(|| v.clone());
                }
            }
            Some(paths) => {
                for path in paths {
                    if let Some(value) = hit.source_value(path) {
                        insert_path(&mut out, path, value.clone());
                    }
                }
            }
        }
        out
    }
}

fn insert_path(out: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            out.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let child = out
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(child) = child {
                insert_path(child, rest, value);
            }
        }
    }
}
