use axum::{
    Form, Json, Router,
    body::Bytes,
    extract::{FromRequest, Request, State},
    http::{
        HeaderMap,
        header::{CONTENT_TYPE, REFERER},
    },
    routing::post,
};
use validator::Validate;

use crate::{
    dto::action::{ActionRequest, ActionResponse},
    error::AppError,
    routes::session::SessionUser,
    services::room_service,
    state::{SharedState, room::RoomCode},
};

/// Path segments that precede a room code in front-end URLs.
const ROOM_PATH_MARKERS: [&str; 3] = ["room", "rooms", "play"];
const ROOM_QUERY_KEYS: [&str; 2] = ["room", "roomId"];
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Routes exposing the single action endpoint.
pub fn router() -> Router<SharedState> {
    Router::new().route("/api/game", post(handle_action))
}

/// Action body decoded from form fields when sent as
/// `application/x-www-form-urlencoded`, and from JSON otherwise. The JSON path
/// does not insist on a `Content-Type` header.
#[derive(Debug)]
pub struct ActionPayload(pub ActionRequest);

impl<S> FromRequest<S> for ActionPayload
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with(FORM_CONTENT_TYPE));

        let payload = if is_form {
            Form::<ActionRequest>::from_request(req, state)
                .await
                .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?
                .0
        } else {
            let body = Bytes::from_request(req, state)
                .await
                .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
            serde_json::from_slice(&body)
                .map_err(|err| AppError::BadRequest(format!("invalid action body: {err}")))?
        };
        Ok(Self(payload))
    }
}

/// Apply one action to a room and return the caller's projection of it.
#[utoipa::path(
    post,
    path = "/api/game",
    tag = "game",
    request_body(
        content = ActionRequest,
        content_type = "application/json",
        description = "Also accepted as application/x-www-form-urlencoded"
    ),
    params(
        ("x-user-id" = String, Header, description = "Authenticated user id"),
        ("x-user-name" = Option<String>, Header, description = "Display name"),
        ("x-user-avatar" = Option<String>, Header, description = "Avatar reference"),
    ),
    responses(
        (status = 200, description = "Action applied", body = ActionResponse),
        (status = 400, description = "Malformed action"),
        (status = 401, description = "Missing identity"),
        (status = 403, description = "Caller is not seated in the room"),
        (status = 404, description = "Room does not exist"),
        (status = 409, description = "Room full or concurrent update"),
        (status = 422, description = "Action refused by the game rules"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn handle_action(
    State(state): State<SharedState>,
    SessionUser(user): SessionUser,
    headers: HeaderMap,
    ActionPayload(payload): ActionPayload,
) -> Result<Json<ActionResponse>, AppError> {
    payload.validate()?;
    let action = payload.to_action()?;

    let code = match payload.room_id() {
        Some(raw) => Some(RoomCode::parse(raw).map_err(|err| AppError::BadRequest(err.to_string()))?),
        None => headers
            .get(REFERER)
            .and_then(|value| value.to_str().ok())
            .and_then(room_code_from_referer),
    };

    let response = room_service::dispatch(&state, &user, action, code).await?;
    Ok(Json(response))
}

/// Recover a room code from the page URL the request was sent from, either
/// `/room/<code>`-style paths or a `room`/`roomId` query parameter.
pub fn room_code_from_referer(referer: &str) -> Option<RoomCode> {
    let location = match referer.split_once("://") {
        Some((_, rest)) => rest.find('/').map_or("", |start| &rest[start..]),
        None => referer,
    };
    let location = location.split('#').next().unwrap_or_default();
    let (path, query) = location.split_once('?').unwrap_or((location, ""));

    let mut segments = path.split('/').filter(|segment| !segment.is_empty());
    while let Some(segment) = segments.next() {
        if ROOM_PATH_MARKERS
            .iter()
            .any(|marker| segment.eq_ignore_ascii_case(marker))
        {
            if let Some(code) = segments.next().and_then(|raw| RoomCode::parse(raw).ok()) {
                return Some(code);
            }
        }
    }

    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| ROOM_QUERY_KEYS.contains(key))
        .and_then(|(_, value)| RoomCode::parse(value).ok())
}
