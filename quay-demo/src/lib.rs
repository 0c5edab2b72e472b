//! A small notes API served by quay.
//!
//! [`create_app`] is the application factory: binaries call it with the
//! configuration read from the environment, test suites hand it to
//! [`quay::testing::client`].

pub mod handlers;
pub mod store;

use std::sync::Arc;

use quay::prelude::*;

use crate::store::NoteStore;

/// Assembles the notes application for `config`.
pub fn create_app(config: AppConfig) -> Quay {
    Quay::with_config(config)
        .state(Arc::new(NoteStore::new()))
        .middleware(TraceIdMiddleware::new())
        .middleware(RequestLogMiddleware::new())
        .router(routes())
}

pub fn routes() -> Router {
    Router::new()
        .get("/", |_, _, state| handlers::index(state))
        .get("/api/notes", |_, _, state| handlers::list_notes(state))
        .post("/api/notes", handlers::create_note)
        .get("/api/notes/:id", handlers::get_note)
        .delete("/api/notes/:id", handlers::delete_note)
}
