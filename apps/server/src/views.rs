//! View orchestration
//!
//! Turns one HTTP request against a registered view into cluster searches and a
//! JSON body. The handlers only extract the request; everything between the
//! query string and the response envelope happens here:
//!
//! 1. compose the view's backend chain for the action
//! 2. slice it with the view's paginator
//! 3. run it on the cluster (with the view's timeout)
//! 4. shape hits, facets and suggestions

use std::time::Instant;

use futures::future::try_join_all;
use serde_json::{json, Map, Value};
use sieve_cluster::ClusterError;
use sieve_query::backends::{functional_suggester, suggester};
use sieve_query::shaping::{
    shape_facets, shape_functional_suggestion, shape_hit, shape_suggestions,
};
use sieve_query::{
    apply_chain, Action, BackendKind, Envelope, Hit, LinkBuilder, PaginationMode, Paginator,
    Query, QueryParams, SearchContext, SearchRequest, SearchResponse,
};

use crate::auth::object_permitted;
use crate::error::{Error, Result};
use crate::metrics;
use crate::state::{AppState, ViewState};

/// Backends that narrow the hit set; the base of every functional suggestion.
const NARROWING_BACKENDS: &[BackendKind] = &[
    BackendKind::Source,
    BackendKind::Filtering,
    BackendKind::Ids,
    BackendKind::Nested,
    BackendKind::GeoSpatial,
];

/// Lookup fields that address the document id itself rather than a source field.
const ID_LOOKUPS: &[&str] = &["id", "_id"];

/// One request against one view.
pub struct ViewRequest<'a> {
    state: &'a AppState,
    view: &'a ViewState,
    params: QueryParams,
    /// Absolute URL of the request without its query string.
    base_url: String,
}

impl<'a> ViewRequest<'a> {
    pub fn new(
        state: &'a AppState,
        view: &'a ViewState,
        params: QueryParams,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            state,
            view,
            params,
            base_url: base_url.into(),
        }
    }

    /// `GET /<view>/`
    pub async fn list(&self) -> Result<Value> {
        let composed = self.compose(SearchContext::new(Action::List, self.params.clone()))?;
        self.paginate(Action::List, &composed).await
    }

    /// `GET /<view>/count/`
    pub async fn count(&self) -> Result<Value> {
        let composed = self
            .compose(SearchContext::new(Action::Count, self.params.clone()))?
            .with_size(0);
        let response = self.execute(Action::Count, composed).await?;
        Ok(json!({ "count": response.total() }))
    }

    /// `GET /<view>/suggest/`
    pub async fn suggest(&self) -> Result<Value> {
        let ctx = SearchContext::new(Action::Suggest, self.params.clone());
        let request = suggester::suggest_request(&self.base_request(), &ctx, &self.view.config)?;
        let response = self.execute(Action::Suggest, request.clone()).await?;
        Ok(Value::Object(shape_suggestions(
            &request,
            response.suggest.as_ref(),
        )))
    }

    /// `GET /<view>/functional_suggest/`
    ///
    /// Each requested suggestion is answered by its own search over the
    /// narrowed (filtered, never sorted or faceted) base request; the searches
    /// run concurrently.
    pub async fn functional_suggest(&self) -> Result<Value> {
        let view = &self.view.config;
        let ctx = SearchContext::new(Action::FunctionalSuggest, self.params.clone());
        let suggestions = functional_suggester::require_requested(&ctx, view)?;

        let narrowing: Vec<BackendKind> = view
            .backends
            .iter()
            .copied()
            .filter(|b| NARROWING_BACKENDS.contains(b))
            .collect();
        let base = apply_chain(&narrowing, &self.base_request(), &ctx, view)?;

        let responses = try_join_all(
            suggestions
                .iter()
                .map(|suggestion| self.execute(Action::FunctionalSuggest, suggestion.request(&base))),
        )
        .await?;

        let out: Map<String, Value> = suggestions
            .iter()
            .zip(&responses)
            .map(|(suggestion, response)| {
                (
                    suggestion.key.clone(),
                    shape_functional_suggestion(suggestion, &response.hits.hits),
                )
            })
            .collect();
        Ok(Value::Object(out))
    }

    /// `GET /<view>/<id>/`
    pub async fn retrieve(&self, id: &str) -> Result<Value> {
        let hit = self.fetch_object(id, Action::Retrieve).await?;
        Ok(shape_hit(&hit, self.view.serializer.as_ref(), false))
    }

    /// `GET /<view>/<id>/more_like_this/`
    pub async fn more_like_this(&self, id: &str) -> Result<Value> {
        let seed = self.fetch_object(id, Action::MoreLikeThis).await?;
        let ctx =
            SearchContext::new(Action::MoreLikeThis, self.params.clone()).with_object_id(&seed.id);
        let mut composed = self.compose(ctx.clone())?;
        if !self.view.config.uses_backend(BackendKind::MoreLikeThis) {
            composed = BackendKind::MoreLikeThis.apply(&composed, &ctx, &self.view.config)?;
        }
        self.paginate(Action::MoreLikeThis, &composed).await
    }

    fn base_request(&self) -> SearchRequest {
        SearchRequest::new(&self.view.config.index)
    }

    fn compose(&self, ctx: SearchContext) -> Result<SearchRequest> {
        let view = &self.view.config;
        let composed = apply_chain(&view.backends, &self.base_request(), &ctx, view)?;
        Ok(composed.resolve_geo_sort())
    }

    /// Find the single document addressed by the view's lookup field.
    ///
    /// Zero or several matches, or a document hidden by the object rule, are all
    /// reported as not found.
    async fn fetch_object(&self, id: &str, action: Action) -> Result<Hit> {
        let view = &self.view.config;
        let query = if ID_LOOKUPS.contains(&view.lookup_field.as_str()) {
            Query::Ids {
                values: vec![id.to_string()],
            }
        } else {
            Query::Term {
                field: view.lookup_field.clone(),
                value: Value::String(id.to_string()),
            }
        };
        // The object rule reads its field even when the view's source filter hides it.
        let rule = self.view.object_permission.as_ref();
        let revealed = rule.and_then(|rule| view.source.revealing(&rule.field));
        let source = match &revealed {
            Some((widened, _)) => widened.clone(),
            None => view.source.clone(),
        };
        let mut request = self.base_request().with_filter(query).with_size(2);
        if !source.is_empty() {
            request = request.with_source(source);
        }

        let response = self.execute(action, request).await?;
        let total = response.total();
        if total != 1 {
            tracing::debug!(
                view = %view.name,
                lookup = %view.lookup_field,
                matches = total,
                "object lookup did not match exactly one document"
            );
            return Err(Error::NotFound);
        }
        let mut hit = response
            .hits
            .hits
            .into_iter()
            .next()
            .ok_or(Error::NotFound)?;
        if !object_permitted(rule, &hit) {
            tracing::debug!(view = %view.name, id = %hit.id, "object permission denied");
            return Err(Error::NotFound);
        }
        for path in revealed.iter().flat_map(|(_, extra)| extra) {
            hit.remove_source_path(path);
        }
        Ok(hit)
    }

    async fn paginate(&self, action: Action, composed: &SearchRequest) -> Result<Value> {
        let view = &self.view.config;
        let paginator = Paginator::new(
            view,
            &self.state.pagination,
            self.state.cursor_codec.as_deref(),
        );

        let mut page_request = paginator.parse(&self.params)?;
        if page_request.needs_total() {
            let counted = self.execute(action, composed.clone().with_size(0)).await?;
            page_request = paginator.resolve_last(page_request, counted.total());
        }

        let sliced = paginator.slice(composed, &page_request)?;
        let response = self.execute(action, sliced.clone()).await?;
        let total = response.total();
        let facets = shape_facets(&sliced, view, response.aggregations.as_ref());

        let links = LinkBuilder::new(self.base_url.clone(), self.params.clone());
        let page = paginator.page(&page_request, composed, response.hits.hits, total, &links)?;
        let include_sort = paginator.mode() == PaginationMode::Cursor;

        Ok(Envelope::from_page(page, self.view.serializer.as_ref(), include_sort)
            .with_facets(facets)
            .to_json())
    }

    /// Send one search to the cluster and record its outcome.
    async fn execute(&self, action: Action, request: SearchRequest) -> Result<SearchResponse> {
        let view = &self.view.config;
        let timeout = view
            .timeout
            .unwrap_or_else(|| self.state.config.cluster.timeout());
        let body = request.with_timeout(timeout).to_body();
        tracing::debug!(
            view = %view.name,
            action = action.as_str(),
            body = %body,
            "Sending search"
        );

        let start = Instant::now();
        let outcome = match self
            .state
            .cluster
            .search(&view.index, &body, Some(timeout))
            .await
        {
            Ok(raw) => SearchResponse::from_value(raw).map_err(|e| Error::from(ClusterError::from(e))),
            Err(e) => Err(Error::from(e)),
        };
        metrics::SEARCH_DURATION_SECONDS
            .with_label_values(&[&view.name, action.as_str()])
            .observe(start.elapsed().as_secs_f64());

        let status = match &outcome {
            Ok(_) => "success",
            Err(e) => metrics::status_class(e.status().as_u16()),
        };
        metrics::SEARCH_TOTAL
            .with_label_values(&[&view.name, action.as_str(), status])
            .inc();

        let response = outcome?;
        let total = response.total();
        metrics::SEARCH_HITS
            .with_label_values(&[&view.name])
            .observe(total as f64);
        tracing::info!(
            view = %view.name,
            document_type = view.document_type.as_deref().unwrap_or("-"),
            action = action.as_str(),
            total,
            returned = response.hits.hits.len(),
            took_ms = response.took,
            "Search completed"
        );
        Ok(response)
    }
}
