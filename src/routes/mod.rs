use axum::Router;

use crate::state::SharedState;

pub mod action;
pub mod catalog;
pub mod deck;
pub mod docs;
pub mod health;
pub mod session;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(action::router())
        .merge(catalog::router())
        .merge(deck::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
