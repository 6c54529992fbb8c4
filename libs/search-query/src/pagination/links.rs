use crate::params::QueryParams;

/// Builds absolute `next`/`previous` URLs from the request's base URL and
/// query parameters, replacing only the paging keys.
#[derive(Debug, Clone)]
pub struct LinkBuilder {
    base: String,
    params: QueryParams,
}

impl LinkBuilder {
    pub fn new(base: impl Into<String>, params: QueryParams) -> Self {
        Self {
            base: base.into(),
            params,
        }
    }

    pub fn params(&self) -> &QueryParams {
        &self.params
    }

    /// URL with `key=value` in place of any existing `key`.
    pub fn with(&self, key: &str, value: impl Into<String>) -> String {
        self.url(&self.params.with_value(key, value))
    }

    /// URL for an explicit parameter set.
    pub fn url(&self, params: &QueryParams) -> String {
        let query = params.to_query_string();
        if query.is_empty() {
            self.base.clone()
        } else {
            format!("{}?{}", self.base, query)
        }
    }
}
