//! Paginators
//!
//! Three modes slice a composed [`SearchRequest`] and turn the returned hits into a
//! [`Page`] with `next`/`previous` links:
//!
//! - page number: `page=N` (or `page=last`) and `page_size=K`
//! - limit/offset: `limit=K` and `offset=M` (a malformed `offset` is rejected like a
//!   malformed `page`)
//! - cursor: `cursor=<token>` and `page_size=K`, driven by search-after over a
//!   tie-broken sort
//!
//! Sizes are clamped to the view's maximum; windows beyond the cluster's
//! `max_result_window` are rejected.

mod cursor;
mod links;

pub use cursor::{ordering_fingerprint, CursorCodec, CursorDirection, CursorPosition};
pub use links::LinkBuilder;

use serde::Deserialize;

use crate::dsl::{SortKey, SortOrder};
use crate::error::{QueryError, Result};
use crate::params::QueryParams;
use crate::request::SearchRequest;
use crate::response::Hit;
use crate::view::ViewConfig;

pub const PAGE_PARAM: &str = "page";
pub const PAGE_SIZE_PARAM: &str = "page_size";
pub const LIMIT_PARAM: &str = "limit";
pub const OFFSET_PARAM: &str = "offset";
pub const CURSOR_PARAM: &str = "cursor";

const LAST_PAGE: &str = "last";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationMode {
    #[default]
    PageNumber,
    LimitOffset,
    Cursor,
}

impl PaginationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PageNumber => "page_number",
            Self::LimitOffset => "limit_offset",
            Self::Cursor => "cursor",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationSettings {
    pub default_page_size: usize,
    pub max_page_size: usize,
    pub max_result_window: usize,
}

impl Default for PaginationSettings {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
            max_result_window: 10_000,
        }
    }
}

impl PaginationSettings {
    /// Apply the view's page size overrides.
    pub fn for_view(&self, view: &ViewConfig) -> Self {
        let max_page_size = view.max_page_size.unwrap_or(self.max_page_size).max(1);
        let default_page_size = view
            .page_size
            .unwrap_or(self.default_page_size)
            .clamp(1, max_page_size);
        Self {
            default_page_size,
            max_page_size,
            max_result_window: self.max_result_window,
        }
    }

    fn page_size(&self, raw: Option<&str>) -> usize {
        match raw.and_then(|v| v.trim().parse::<usize>().ok()) {
            Some(0) | None => self.default_page_size,
            Some(size) => size.min(self.max_page_size),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageNumber {
    Number(u64),
    /// `page=last`; resolved once the total is known.
    Last,
}

/// Paging parameters parsed from one request.
#[derive(Debug, Clone, PartialEq)]
pub enum PageRequest {
    PageNumber { page: PageNumber, size: usize },
    LimitOffset { limit: usize, offset: usize },
    Cursor { size: usize, position: Option<CursorPosition> },
}

impl PageRequest {
    pub fn size(&self) -> usize {
        match self {
            Self::PageNumber { size, .. } | Self::Cursor { size, .. } => *size,
            Self::LimitOffset { limit, .. } => *limit,
        }
    }

    /// `page=last` needs the total hit count before it can be sliced.
    pub fn needs_total(&self) -> bool {
        matches!(
            self,
            Self::PageNumber {
                page: PageNumber::Last,
                ..
            }
        )
    }
}

/// One page of hits with its navigation links.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Total hit count; `None` in cursor mode.
    pub count: Option<u64>,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub hits: Vec<Hit>,
}

#[derive(Debug, Clone)]
pub struct Paginator<'a> {
    mode: PaginationMode,
    settings: PaginationSettings,
    codec: Option<&'a CursorCodec>,
    tiebreaker: &'a str,
    view: &'a str,
}

impl<'a> Paginator<'a> {
    pub fn new(view: &'a ViewConfig, settings: &PaginationSettings, codec: Option<&'a CursorCodec>) -> Self {
        Self {
            mode: view.pagination,
            settings: settings.for_view(view),
            codec,
            tiebreaker: &view.cursor_tiebreaker,
            view: &view.name,
        }
    }

    pub fn mode(&self) -> PaginationMode {
        self.mode
    }

    pub fn parse(&self, params: &QueryParams) -> Result<PageRequest> {
        match self.mode {
            PaginationMode::PageNumber => {
                let page = match params.get(PAGE_PARAM).map(str::trim) {
                    None | Some("") => PageNumber::Number(1),
                    Some(LAST_PAGE) => PageNumber::Last,
                    Some(raw) => match raw.parse::<u64>() {
                        Ok(n) if n >= 1 => PageNumber::Number(n),
                        _ => return Err(QueryError::PageOutOfRange(raw.to_string())),
                    },
                };
                Ok(PageRequest::PageNumber {
                    page,
                    size: self.settings.page_size(params.get(PAGE_SIZE_PARAM)),
                })
            }
            PaginationMode::LimitOffset => {
                let offset = match params.get(OFFSET_PARAM).map(str::trim) {
                    None | Some("") => 0,
                    Some(raw) => raw
                        .parse::<usize>()
                        .map_err(|_| QueryError::PageOutOfRange(raw.to_string()))?,
                };
                Ok(PageRequest::LimitOffset {
                    limit: self.settings.page_size(params.get(LIMIT_PARAM)),
                    offset,
                })
            }
            PaginationMode::Cursor => {
                let position = match params.get(CURSOR_PARAM).filter(|v| !v.is_empty()) {
                    Some(token) => Some(self.codec()?.decode(token)?),
                    None => None,
                };
                Ok(PageRequest::Cursor {
                    size: self.settings.page_size(params.get(PAGE_SIZE_PARAM)),
                    position,
                })
            }
        }
    }

    /// Turn `page=last` into a concrete page number.
    pub fn resolve_last(&self, request: PageRequest, total: u64) -> PageRequest {
        match request {
            PageRequest::PageNumber {
                page: PageNumber::Last,
                size,
            } => PageRequest::PageNumber {
                page: PageNumber::Number(num_pages(total, size)),
                size,
            },
            other => other,
        }
    }

    /// Restrict the search to the requested window.
    pub fn slice(&self, search: &SearchRequest, request: &PageRequest) -> Result<SearchRequest> {
        match request {
            PageRequest::PageNumber { page, size } => {
                let PageNumber::Number(page) = *page else {
                    return Err(QueryError::PageOutOfRange(LAST_PAGE.into()));
                };
                let from = usize::try_from(page - 1)
                    .ok()
                    .and_then(|p| p.checked_mul(*size))
                    .ok_or_else(|| QueryError::PageOutOfRange(page.to_string()))?;
                self.check_window(from, *size, || page.to_string())?;
                Ok(search.clone().with_from(from).with_size(*size))
            }
            PageRequest::LimitOffset { limit, offset } => {
                self.check_window(*offset, *limit, || format!("offset {offset}"))?;
                Ok(search.clone().with_from(*offset).with_size(*limit))
            }
            PageRequest::Cursor { size, position } => {
                let mut sort = self.cursor_sort(search);
                let mut sliced = search.clone();
                if let Some(position) = position {
                    if position.values.len() != sort.len()
                        || position.ordering != self.fingerprint(&sort)
                    {
                        return Err(QueryError::InvalidCursor);
                    }
                    if position.direction.is_reverse() {
                        sort = sort.iter().map(SortKey::reversed).collect();
                    }
                    sliced = sliced.with_search_after(position.values.clone());
                }
                Ok(sliced.with_sort(sort).with_size(size + 1))
            }
        }
    }

    /// Build the page from the hits of a sliced search. `search` is the request
    /// before slicing; cursor links are bound to its ordering.
    pub fn page(
        &self,
        request: &PageRequest,
        search: &SearchRequest,
        mut hits: Vec<Hit>,
        total: u64,
        links: &LinkBuilder,
    ) -> Result<Page> {
        match request {
            PageRequest::PageNumber { page, size } => {
                let PageNumber::Number(page) = *page else {
                    return Err(QueryError::PageOutOfRange(LAST_PAGE.into()));
                };
                let pages = num_pages(total, *size);
                if page > pages {
                    return Err(QueryError::PageOutOfRange(page.to_string()));
                }
                let next = (page < pages).then(|| links.with(PAGE_PARAM, (page + 1).to_string()));
                let previous = (page > 1).then(|| links.with(PAGE_PARAM, (page - 1).to_string()));
                Ok(Page {
                    count: Some(total),
                    next,
                    previous,
                    hits,
                })
            }
            PageRequest::LimitOffset { limit, offset } => {
                let next = (((offset + limit) as u64) < total).then(|| {
                    links.url(
                        &links
                            .params()
                            .with_value(LIMIT_PARAM, limit.to_string())
                            .with_value(OFFSET_PARAM, (offset + limit).to_string()),
                    )
                });
                let previous = (*offset > 0).then(|| {
                    links.url(
                        &links
                            .params()
                            .with_value(LIMIT_PARAM, limit.to_string())
                            .with_value(OFFSET_PARAM, offset.saturating_sub(*limit).to_string()),
                    )
                });
                Ok(Page {
                    count: Some(total),
                    next,
                    previous,
                    hits,
                })
            }
            PageRequest::Cursor { size, position } => {
                let reverse = position.as_ref().is_some_and(|p| p.direction.is_reverse());
                let more = hits.len() > *size;
                hits.truncate(*size);
                if reverse {
                    hits.reverse();
                }

                let has_next = reverse || more;
                let has_previous = if reverse { more } else { position.is_some() };

                let ordering = self.fingerprint(&self.cursor_sort(search));
                let next = match hits.last() {
                    Some(hit) if has_next => {
                        self.cursor_link(hit, CursorDirection::Next, &ordering, links)?
                    }
                    _ => None,
                };
                let previous = match hits.first() {
                    Some(hit) if has_previous => {
                        self.cursor_link(hit, CursorDirection::Prev, &ordering, links)?
                    }
                    _ => None,
                };
                Ok(Page {
                    count: None,
                    next,
                    previous,
                    hits,
                })
            }
        }
    }

    fn codec(&self) -> Result<&'a CursorCodec> {
        self.codec.ok_or_else(|| {
            QueryError::InvalidFieldConfig("cursor pagination requires a cursor secret".into())
        })
    }

    fn check_window(&self, from: usize, size: usize, what: impl FnOnce() -> String) -> Result<()> {
        match from.checked_add(size) {
            Some(end) if end <= self.settings.max_result_window => Ok(()),
            _ => Err(QueryError::PageOutOfRange(what())),
        }
    }

    /// The request's sort with the tiebreaker moved to the end.
    fn cursor_sort(&self, search: &SearchRequest) -> Vec<SortKey> {
        let current = search.sort().unwrap_or_default();
        let tiebreaker_order = current
            .iter()
            .find(|key| key.field_name() == self.tiebreaker)
            .map(SortKey::order)
            .unwrap_or(SortOrder::Asc);
        let mut sort: Vec<SortKey> = current
            .iter()
            .filter(|key| key.field_name() != self.tiebreaker)
            .cloned()
            .collect();
        sort.push(SortKey::field(self.tiebreaker, tiebreaker_order));
        sort
    }

    fn fingerprint(&self, sort: &[SortKey]) -> String {
        ordering_fingerprint(
            self.view,
            sort.iter().map(|key| (key.field_name(), key.order().as_str())),
        )
    }

    fn cursor_link(
        &self,
        hit: &Hit,
        direction: CursorDirection,
        ordering: &str,
        links: &LinkBuilder,
    ) -> Result<Option<String>> {
        let Some(values) = hit.sort.as_ref().filter(|v| !v.is_empty()) else {
            tracing::debug!(id = %hit.id, "hit carries no sort values, cursor link omitted");
            return Ok(None);
        };
        let token = self.codec()?.encode(&CursorPosition {
            values: values.clone(),
            direction,
            ordering: ordering.to_string(),
        })?;
        Ok(Some(links.with(CURSOR_PARAM, token)))
    }
}

fn num_pages(total: u64, size: usize) -> u64 {
    let size = size.max(1) as u64;
    total.div_ceil(size).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_support::view;
    use serde_json::{json, Value};

    fn books(mode: &str) -> ViewConfig {
        view(json!({
            "name": "books",
            "index": "books",
            "pagination_class": mode,
            "page_size": 10,
            "max_page_size": 50
        }))
    }

    fn links(query: &str) -> LinkBuilder {
        LinkBuilder::new("http://api.test/books/", QueryParams::from_query(query))
    }

    fn hits(ids: std::ops::RangeInclusive<u32>) -> Vec<Hit> {
        ids.map(|i| Hit {
            index: "books".into(),
            id: i.to_string(),
            sort: Some(vec![json!(i), json!(i.to_string())]),
            ..Hit::default()
        })
        .collect()
    }

    fn ids(page: &Page) -> Vec<String> {
        page.hits.iter().map(|h| h.id.clone()).collect()
    }

    #[test]
    fn page_number_links_and_window() {
        let view = books("page_number");
        let paginator = Paginator::new(&view, &PaginationSettings::default(), None);
        let query = "title__prefix=har&ordering=-published&page=2&page_size=10";
        let request = paginator.parse(&QueryParams::from_query(query)).unwrap();
        assert_eq!(
            request,
            PageRequest::PageNumber {
                page: PageNumber::Number(2),
                size: 10
            }
        );

        let body = paginator
            .slice(&SearchRequest::new("books"), &request)
            .unwrap()
            .to_body();
        assert_eq!((body["from"].clone(), body["size"].clone()), (json!(10), json!(10)));

        let page = paginator.page(&request, &SearchRequest::new("books"), hits(11..=20), 23, &links(query)).unwrap();
        assert_eq!(page.count, Some(23));
        assert_eq!(
            page.next.as_deref(),
            Some("http://api.test/books/?title__prefix=har&ordering=-published&page=3&page_size=10")
        );
        assert_eq!(
            page.previous.as_deref(),
            Some("http://api.test/books/?title__prefix=har&ordering=-published&page=1&page_size=10")
        );
    }

    #[test]
    fn page_number_bounds() {
        let view = books("page_number");
        let paginator = Paginator::new(&view, &PaginationSettings::default(), None);
        for bad in ["page=0", "page=abc", "page=-1"] {
            assert!(matches!(
                paginator.parse(&QueryParams::from_query(bad)),
                Err(QueryError::PageOutOfRange(_))
            ));
        }

        let request = paginator.parse(&QueryParams::from_query("page=4")).unwrap();
        assert!(matches!(
            paginator.page(&request, &SearchRequest::new("books"), Vec::new(), 23, &links("page=4")),
            Err(QueryError::PageOutOfRange(_))
        ));

        let first = paginator.parse(&QueryParams::default()).unwrap();
        let empty = paginator.page(&first, &SearchRequest::new("books"), Vec::new(), 0, &links("")).unwrap();
        assert_eq!((empty.count, empty.next, empty.previous), (Some(0), None, None));
    }

    #[test]
    fn page_size_falls_back_and_clamps() {
        let view = books("page_number");
        let paginator = Paginator::new(&view, &PaginationSettings::default(), None);
        let size = |q: &str| paginator.parse(&QueryParams::from_query(q)).unwrap().size();
        assert_eq!(size(""), 10);
        assert_eq!(size("page_size=0"), 10);
        assert_eq!(size("page_size=x"), 10);
        assert_eq!(size("page_size=500"), 50);
    }

    #[test]
    fn last_page_resolves_from_total() {
        let view = books("page_number");
        let paginator = Paginator::new(&view, &PaginationSettings::default(), None);
        let request = paginator.parse(&QueryParams::from_query("page=last")).unwrap();
        assert!(request.needs_total());
        let resolved = paginator.resolve_last(request, 23);
        assert_eq!(
            resolved,
            PageRequest::PageNumber {
                page: PageNumber::Number(3),
                size: 10
            }
        );
    }

    #[test]
    fn result_window_is_enforced() {
        let view = books("page_number");
        let settings = PaginationSettings {
            max_result_window: 100,
            ..PaginationSettings::default()
        };
        let paginator = Paginator::new(&view, &settings, None);
        let ok = paginator.parse(&QueryParams::from_query("page=10")).unwrap();
        assert!(paginator.slice(&SearchRequest::new("books"), &ok).is_ok());
        let too_deep = paginator.parse(&QueryParams::from_query("page=11")).unwrap();
        assert!(matches!(
            paginator.slice(&SearchRequest::new("books"), &too_deep),
            Err(QueryError::PageOutOfRange(_))
        ));
    }

    #[test]
    fn limit_offset_links() {
        let view = books("limit_offset");
        let paginator = Paginator::new(&view, &PaginationSettings::default(), None);
        let request = paginator
            .parse(&QueryParams::from_query("state=published&limit=5&offset=5"))
            .unwrap();
        assert_eq!(request, PageRequest::LimitOffset { limit: 5, offset: 5 });
        let page = paginator
            .page(
                &request,
                &SearchRequest::new("books"),
                hits(6..=10),
                12,
                &links("state=published&limit=5&offset=5"),
            )
            .unwrap();
        assert_eq!(
            page.next.as_deref(),
            Some("http://api.test/books/?state=published&limit=5&offset=10")
        );
        assert_eq!(
            page.previous.as_deref(),
            Some("http://api.test/books/?state=published&limit=5&offset=0")
        );

        let fallback = paginator
            .parse(&QueryParams::from_query("limit=nope&offset="))
            .unwrap();
        assert_eq!(fallback, PageRequest::LimitOffset { limit: 10, offset: 0 });
    }

    #[test]
    fn malformed_offset_is_rejected_like_a_malformed_page() {
        let view = books("limit_offset");
        let paginator = Paginator::new(&view, &PaginationSettings::default(), None);
        for query in ["offset=nope", "offset=-5", "offset=2.5"] {
            assert!(
                matches!(
                    paginator.parse(&QueryParams::from_query(query)),
                    Err(QueryError::PageOutOfRange(_))
                ),
                "{query}"
            );
        }
    }

    #[test]
    fn cursor_slice_appends_tiebreaker_and_lookahead() {
        let view = books("cursor");
        let codec = CursorCodec::new(b"secret").unwrap();
        let paginator = Paginator::new(&view, &PaginationSettings::default(), Some(&codec));
        let search = SearchRequest::new("books").with_sort(vec![
            SortKey::field("_id", SortOrder::Desc),
            SortKey::field("published", SortOrder::Desc),
        ]);
        let request = paginator.parse(&QueryParams::from_query("page_size=2")).unwrap();
        let body = paginator.slice(&search, &request).unwrap().to_body();
        assert_eq!(body["size"], json!(3));
        assert_eq!(
            body["sort"],
            json!([{"published": {"order": "desc"}}, {"_id": {"order": "desc"}}])
        );
        assert!(body.get("search_after").is_none());
    }

    #[test]
    fn cursor_round_trip_returns_the_same_page() {
        let view = books("cursor");
        let codec = CursorCodec::new(b"secret").unwrap();
        let paginator = Paginator::new(&view, &PaginationSettings::default(), Some(&codec));
        let search = SearchRequest::new("books")
            .with_sort(vec![SortKey::field("published", SortOrder::Asc)]);

        // First page: hits 1..=3 plus the lookahead hit 4.
        let first_req = paginator.parse(&QueryParams::from_query("page_size=3")).unwrap();
        let first = paginator
            .page(&first_req, &search, hits(1..=4), 10, &links("page_size=3"))
            .unwrap();
        assert_eq!(ids(&first), ["1", "2", "3"]);
        assert_eq!(first.count, None);
        assert!(first.previous.is_none());
        let next = first.next.clone().unwrap();
        let next_query = next.split_once('?').unwrap().1;

        // Second page, forward from hit 3.
        let second_req = paginator.parse(&QueryParams::from_query(next_query)).unwrap();
        let sliced = paginator.slice(&search, &second_req).unwrap().to_body();
        assert_eq!(sliced["search_after"], json!([3, "3"]));
        assert_eq!(sliced["sort"][0], json!({"published": {"order": "asc"}}));
        let second = paginator
            .page(&second_req, &search, hits(4..=7), 10, &links(next_query))
            .unwrap();
        assert_eq!(ids(&second), ["4", "5", "6"]);
        let previous = second.previous.clone().unwrap();
        let previous_query = previous.split_once('?').unwrap().1;

        // Back again: reversed sort from hit 4 yields 3, 2, 1 and no lookahead.
        let back_req = paginator
            .parse(&QueryParams::from_query(previous_query))
            .unwrap();
        let sliced = paginator.slice(&search, &back_req).unwrap().to_body();
        assert_eq!(sliced["search_after"], json!([4, "4"]));
        assert_eq!(
            sliced["sort"],
            json!([{"published": {"order": "desc"}}, {"_id": {"order": "desc"}}])
        );
        let mut reversed = hits(1..=3);
        reversed.reverse();
        let back = paginator
            .page(&back_req, &search, reversed, 10, &links(previous_query))
            .unwrap();
        assert_eq!(ids(&back), ids(&first));
        assert!(back.previous.is_none());
        assert!(back.next.is_some());
    }

    #[test]
    fn cursor_with_wrong_arity_or_tampering_is_rejected() {
        let view = books("cursor");
        let codec = CursorCodec::new(b"secret").unwrap();
        let paginator = Paginator::new(&view, &PaginationSettings::default(), Some(&codec));
        let search = SearchRequest::new("books")
            .with_sort(vec![SortKey::field("published", SortOrder::Asc)]);
        let token = codec
            .encode(&CursorPosition {
                values: vec![Value::from(1)],
                direction: CursorDirection::Next,
                ordering: ordering_fingerprint("books", [("published", "asc"), ("_id", "asc")]),
            })
            .unwrap();
        let request = paginator
            .parse(&QueryParams::from_items(&[("cursor".into(), token.clone())]))
            .unwrap();
        assert_eq!(paginator.slice(&search, &request), Err(QueryError::InvalidCursor));

        let tampered = format!("{}x", token);
        assert_eq!(
            paginator.parse(&QueryParams::from_items(&[("cursor".into(), tampered)])),
            Err(QueryError::InvalidCursor)
        );
    }

    #[test]
    fn cursor_is_bound_to_the_ordering_it_was_issued_for() {
        let view = books("cursor");
        let codec = CursorCodec::new(b"secret").unwrap();
        let paginator = Paginator::new(&view, &PaginationSettings::default(), Some(&codec));
        let newest_first = SearchRequest::new("books")
            .with_sort(vec![SortKey::field("published", SortOrder::Desc)]);
        let page_req = paginator.parse(&QueryParams::from_query("page_size=3")).unwrap();
        let page = paginator
            .page(&page_req, &newest_first, hits(1..=4), 10, &links("page_size=3"))
            .unwrap();
        let next = page.next.unwrap();
        let next_req = paginator
            .parse(&QueryParams::from_query(next.split_once('?').unwrap().1))
            .unwrap();

        assert!(paginator.slice(&newest_first, &next_req).is_ok());
        let oldest_first = SearchRequest::new("books")
            .with_sort(vec![SortKey::field("published", SortOrder::Asc)]);
        assert_eq!(
            paginator.slice(&oldest_first, &next_req),
            Err(QueryError::InvalidCursor)
        );
        let by_title = SearchRequest::new("books")
            .with_sort(vec![SortKey::field("title", SortOrder::Desc)]);
        assert_eq!(
            paginator.slice(&by_title, &next_req),
            Err(QueryError::InvalidCursor)
        );
    }

    #[test]
    fn cursor_mode_without_secret_is_a_config_error() {
        let view = books("cursor");
        let paginator = Paginator::new(&view, &PaginationSettings::default(), None);
        assert!(matches!(
            paginator.parse(&QueryParams::from_query("cursor=abc.def")),
            Err(QueryError::InvalidFieldConfig(_))
        ));
    }
}
