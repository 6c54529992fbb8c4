//! Query-string parameter bag
//!
//! Parameters are kept as ordered `(key, value)` occurrences so repeated keys
//! stay distinct and clause ordering is deterministic.

use url::form_urlencoded;

/// Separator between a field name and its lookup (`price__gte`).
pub const LOOKUP_SEPARATOR: &str = "__";

/// Separator between the parts of a multi-valued lookup value (`a|b|c`).
pub const VALUE_SEPARATOR: char = '|';

/// Keys with a fixed meaning that can never name a field.
pub const RESERVED_KEYS: &[&str] = &[
    "search",
    "query",
    "ordering",
    "page",
    "page_size",
    "limit",
    "offset",
    "cursor",
    "facet",
    "highlight",
    "source",
    "ids",
];

/// Ordered request parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    items: Vec<(String, String)>,
}

impl QueryParams {
    /// Build from ordered (key, value) items.
    pub fn from_items(items: &[(String, String)]) -> Self {
        Self {
            items: items.to_vec(),
        }
    }

    /// Parse a raw (already percent-encoded) query string.
    pub fn from_query(query: &str) -> Self {
        let items = form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Self { items }
    }

    pub fn items(&self) -> &[(String, String)] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value for `key`, in request order.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.items
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.items.iter().any(|(k, _)| k == key)
    }

    /// Comma-separated list values across every occurrence of `key`.
    ///
    /// `highlight=title,summary&highlight=body` yields `[title, summary, body]`.
    pub fn list(&self, key: &str) -> Vec<String> {
        self.get_all(key)
            .flat_map(|v| v.split(','))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Replace every occurrence of `key` with a single `key=value`.
    ///
    /// The replacement keeps the position of the first occurrence; an absent key is
    /// appended.
    pub fn with_value(&self, key: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        let mut items = Vec::with_capacity(self.items.len() + 1);
        let mut placed = false;
        for (k, v) in &self.items {
            if k == key {
                if !placed {
                    items.push((k.clone(), value.clone()));
                    placed = true;
                }
                continue;
            }
            items.push((k.clone(), v.clone()));
        }
        if !placed {
            items.push((key.to_string(), value));
        }
        Self { items }
    }

    /// Drop every occurrence of `key`.
    pub fn without(&self, key: &str) -> Self {
        Self {
            items: self
                .items
                .iter()
                .filter(|(k, _)| k != key)
                .cloned()
                .collect(),
        }
    }

    pub fn to_query_string(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (k, v) in &self.items {
            serializer.append_pair(k, v);
        }
        serializer.finish()
    }
}

/// A parameter key split into its field name, lookup and modifier parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamName<'a> {
    pub field: &'a str,
    pub lookup: Option<&'a str>,
    pub modifier: Option<&'a str>,
}

/// Split `field[__lookup][__modifier]`.
pub fn parse_param_name(key: &str) -> ParamName<'_> {
    let mut parts = key.splitn(3, LOOKUP_SEPARATOR);
    let field = parts.next().unwrap_or_default();
    let lookup = parts.next().filter(|s| !s.is_empty());
    let modifier = parts.next().filter(|s| !s.is_empty());
    ParamName {
        field,
        lookup,
        modifier,
    }
}

/// Split a multi-valued lookup value on `|`, trimming and dropping empty parts.
pub fn split_values(value: &str) -> Vec<String> {
    value
        .split(VALUE_SEPARATOR)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split on `|` keeping empty parts (positional values such as range bounds).
pub fn split_positional(value: &str) -> Vec<&str> {
    value.split(VALUE_SEPARATOR).map(str::trim).collect()
}

/// Interpret a truthy/falsy query-string value.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
