//! View routes
//!
//! Every registered view is served under its own prefix. Both the trailing-slash
//! and the bare form of each path are accepted.
//!
//! The list-level actions (`count`, `suggest`, `functional_suggest`) are static
//! segments and take priority over a document id in the same position.

use crate::api::handlers::views;
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn view_routes() -> Router<AppState> {
    Router::new()
        // List-level actions first (more specific)
        .route("/:view/count/", get(views::count))
        .route("/:view/count", get(views::count))
        .route("/:view/suggest/", get(views::suggest))
        .route("/:view/suggest", get(views::suggest))
        .route("/:view/functional_suggest/", get(views::functional_suggest))
        .route("/:view/functional_suggest", get(views::functional_suggest))
        // Object-level actions
        .route("/:view/:id/more_like_this/", get(views::more_like_this))
        .route("/:view/:id/more_like_this", get(views::more_like_this))
        .route("/:view/:id/", get(views::retrieve))
        .route("/:view/:id", get(views::retrieve))
        // List
        .route("/:view/", get(views::list))
        .route("/:view", get(views::list))
}
