//! Query construction and result shaping for search-cluster backed REST views.
//!
//! A view is declared once as a [`ViewDefinition`] and resolved into an immutable
//! [`ViewConfig`]. Per request, the view's backend chain turns the query-string
//! parameters into a [`SearchRequest`], a [`Paginator`] slices it, and the shaping
//! helpers render the raw cluster response into the JSON envelope.
//!
//! ```rust
//! use sieve_query::{apply_chain, Action, QueryParams, SearchContext, SearchRequest, ViewDefinition};
//!
//! # fn example() -> sieve_query::Result<()> {
//! let definition: ViewDefinition = serde_json::from_value(serde_json::json!({
//!     "name": "books",
//!     "index": "books",
//!     "filter_fields": { "state": "state.raw" }
//! }))
//! .map_err(|e| sieve_query::QueryError::InvalidFieldConfig(e.to_string()))?;
//! let view = definition.resolve()?;
//!
//! let params = QueryParams::from_query("state=published&state=draft");
//! let ctx = SearchContext::new(Action::List, params);
//! let request = apply_chain(&view.backends, &SearchRequest::new(&view.index), &ctx, &view)?;
//! assert!(request.to_body()["query"]["bool"]["filter"].is_array());
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod context;
pub mod dsl;
pub mod error;
pub mod fields;
pub mod lookup;
pub mod pagination;
pub mod params;
pub mod request;
pub mod response;
pub mod serializer;
pub mod shaping;
pub mod view;

pub use backends::{apply_chain, BackendKind, DEFAULT_CHAIN};
pub use context::{Action, SearchContext};
pub use dsl::{GeoPoint, Query, SortKey, SortOrder, SourceFilter};
pub use error::{QueryError, Result};
pub use fields::{FieldConfig, FieldKind};
pub use lookup::Lookup;
pub use pagination::{
    CursorCodec, CursorDirection, CursorPosition, LinkBuilder, Page, PageRequest,
    PaginationMode, PaginationSettings, Paginator,
};
pub use params::QueryParams;
pub use request::SearchRequest;
pub use response::{Hit, SearchResponse};
pub use serializer::{HitSerializer, SourceSerializer};
pub use shaping::Envelope;
pub use view::{ViewConfig, ViewDefinition};
