use axum::{Json, Router, extract::State, routing::get};

use crate::state::{SharedState, catalog::CardDefinition};

/// Routes exposing the static card catalog.
pub fn router() -> Router<SharedState> {
    Router::new().route("/catalog", get(list_cards))
}

/// List every card definition in catalog order.
#[utoipa::path(
    get,
    path = "/catalog",
    tag = "cards",
    responses((status = 200, description = "All card definitions", body = [CardDefinition]))
)]
pub async fn list_cards(State(state): State<SharedState>) -> Json<Vec<CardDefinition>> {
    Json(state.catalog().all().cloned().collect())
}
