//! Raw `_search` response model
//!
//! Only the parts the pagination and shaping steps read are modelled; everything
//! else in the cluster's answer is ignored.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub took: u64,
    #[serde(default)]
    pub timed_out: bool,
    #[serde(default)]
    pub hits: Hits,
    #[serde(default)]
    pub aggregations: Option<Map<String, Value>>,
    #[serde(default)]
    pub suggest: Option<Map<String, Value>>,
    #[serde(default, rename = "_shards")]
    pub shards: Option<Value>,
}

impl SearchResponse {
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    pub fn total(&self) -> u64 {
        self.hits.total()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Hits {
    #[serde(default)]
    pub total: Option<TotalHits>,
    #[serde(default)]
    pub max_score: Option<f64>,
    #[serde(default)]
    pub hits: Vec<Hit>,
}

impl Hits {
    pub fn total(&self) -> u64 {
        match &self.total {
            Some(TotalHits::Count(n)) => *n,
            Some(TotalHits::Object { value, .. }) => *value,
            None => self.hits.len() as u64,
        }
    }
}

/// `hits.total`: a bare number on old clusters, `{value, relation}` on newer ones.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TotalHits {
    Count(u64),
    Object {
        value: u64,
        #[serde(default)]
        relation: Option<String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    #[serde(rename = "_index", default)]
    pub index: String,
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_score", default)]
    pub score: Option<f64>,
    #[serde(rename = "_source", default)]
    pub source: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Vec<Value>>,
}

impl Hit {
    /// Value of `_source` at a dotted path.
    pub fn source_value(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.source.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Drop the value at a dotted path of `_source`, if present.
    pub fn remove_source_path(&mut self, path: &str) {
        let mut segments: Vec<&str> = path.split('.').collect();
        let Some(last) = segments.pop() else {
            return;
        };
        let mut current = &mut self.source;
        for segment in segments {
            match current.get_mut(segment).and_then(Value::as_object_mut) {
                Some(child) => current = child,
                None => return,
            }
        }
        current.remove(last);
    }
}
