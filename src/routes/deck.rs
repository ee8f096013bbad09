use axum::{Json, Router, extract::State, routing::get};
use validator::Validate;

use crate::{
    dto::deck::{DeckResponse, SaveDeckRequest},
    error::AppError,
    routes::session::SessionUser,
    services::deck_service,
    state::SharedState,
};

/// Routes managing the caller's saved deck.
pub fn router() -> Router<SharedState> {
    Router::new().route("/decks/me", get(get_my_deck).put(put_my_deck))
}

/// Return the caller's saved deck.
#[utoipa::path(
    get,
    path = "/decks/me",
    tag = "cards",
    params(("x-user-id" = String, Header, description = "Authenticated user id")),
    responses(
        (status = 200, description = "Saved deck", body = DeckResponse),
        (status = 401, description = "Missing identity"),
        (status = 404, description = "No deck saved yet")
    )
)]
pub async fn get_my_deck(
    State(state): State<SharedState>,
    SessionUser(user): SessionUser,
) -> Result<Json<DeckResponse>, AppError> {
    Ok(Json(deck_service::get_deck(&state, &user.id).await?))
}

/// Validate and store the caller's deck, replacing any previous one.
#[utoipa::path(
    put,
    path = "/decks/me",
    tag = "cards",
    params(("x-user-id" = String, Header, description = "Authenticated user id")),
    request_body = SaveDeckRequest,
    responses(
        (status = 200, description = "Deck saved", body = DeckResponse),
        (status = 400, description = "Deck refers to unknown or misplaced cards"),
        (status = 401, description = "Missing identity")
    )
)]
pub async fn put_my_deck(
    State(state): State<SharedState>,
    SessionUser(user): SessionUser,
    Json(payload): Json<SaveDeckRequest>,
) -> Result<Json<DeckResponse>, AppError> {
    payload.validate()?;
    Ok(Json(
        deck_service::save_deck(&state, &user.id, payload).await?,
    ))
}
