use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use duel_back::{config::AppConfig, routes, state::AppState};
use serde_json::{Value, json};
use tower::ServiceExt;

fn app() -> Router {
    routes::router(AppState::new(AppConfig::default()))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn action(user: &str, body: Value) -> Request<Body> {
    Request::post("/api/game")
        .header("x-user-id", user)
        .header("x-user-name", user.to_uppercase())
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn hello_echoes_identity() {
    let app = app();
    let (status, body) = send(&app, action("alice", json!({"action": "hello"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["user"]["id"], "alice");
    assert_eq!(body["user"]["name"], "ALICE");
}

#[tokio::test]
async fn missing_identity_is_rejected() {
    let app = app();
    let request = Request::post("/api/game")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"action": "hello"}).to_string()))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].as_str().unwrap().contains("x-user-id"));
}

#[tokio::test]
async fn form_bodies_are_accepted() {
    let app = app();
    let request = Request::post("/api/game")
        .header("x-user-id", "alice")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("action=createRoom&roomId=form1"))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"]["id"], "FORM1");
    assert_eq!(body["state"]["you"], "a");
    assert_eq!(body["state"]["version"], 2);
}

#[tokio::test]
async fn json_without_content_type_is_accepted() {
    let app = app();
    let request = Request::post("/api/game")
        .header("x-user-id", "alice")
        .body(Body::from(json!({"action": "createRoom", "roomId": "bare1"}).to_string()))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"]["id"], "BARE1");
    assert_eq!(body["state"]["you"], "a");

    let garbage = Request::post("/api/game")
        .header("x-user-id", "alice")
        .body(Body::from("action=createRoom"))
        .unwrap();
    let (status, body) = send(&app, garbage).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn room_code_falls_back_to_referer() {
    let app = app();
    let request = Request::post("/api/game")
        .header("x-user-id", "alice")
        .header(header::REFERER, "https://duel.example/room/ref01")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"action": "getState"}).to_string()))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"]["id"], "REF01");
    assert_eq!(body["state"]["mode"], "lobby");
}

#[tokio::test]
async fn malformed_requests_are_bad_requests() {
    let app = app();
    let (status, _) = send(&app, action("alice", json!({"action": "getState", "roomId": "no!"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, action("alice", json!({"action": "gacha", "roomId": "abc"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, action("alice", json!({"action": "getState"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn play_actions_need_an_existing_room() {
    let app = app();
    let (status, body) = send(&app, action("alice", json!({"action": "ready", "roomId": "ghost"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn lobby_to_play_flow() {
    let app = app();
    let room = "duel7";

    let (status, _) = send(&app, action("alice", json!({"action": "createRoom", "roomId": room}))).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = send(&app, action("bob", json!({"action": "joinRoom", "roomId": room}))).await;
    assert_eq!(body["state"]["you"], "b");

    let (status, _) = send(&app, action("alice", json!({"action": "endPhase", "roomId": room}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    send(&app, action("alice", json!({"action": "ready", "roomId": room}))).await;
    let (status, body) = send(&app, action("bob", json!({"action": "ready", "roomId": room}))).await;
    assert_eq!(status, StatusCode::OK);

    let state = &body["state"];
    assert_eq!(state["mode"], "play");
    assert_eq!(state["coin"]["decided"], true);
    assert_eq!(state["seats"]["b"]["hand"].as_array().unwrap().len(), 5);
    assert!(state["seats"]["a"]["hand"].is_null());
    assert_eq!(state["seats"]["a"]["handCount"], 5);
    assert_eq!(state["seats"]["a"]["board"].as_array().unwrap().len(), 3);
    assert_eq!(state["seats"]["a"]["hero"], 30);

    let (status, _) = send(&app, action("carol", json!({"action": "joinRoom", "roomId": room}))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(&app, action("carol", json!({"action": "getState", "roomId": room}))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["state"]["you"].is_null());
    assert!(body["state"]["seats"]["a"]["hand"].is_null());
    assert!(body["state"]["seats"]["b"]["hand"].is_null());

    let (status, _) = send(&app, action("carol", json!({"action": "endPhase", "roomId": room}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn catalog_and_deck_endpoints() {
    let app = app();

    let (status, catalog) = send(&app, Request::get("/catalog").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(catalog.as_array().unwrap().iter().any(|card| card["code"] == "CH-EMBER"));

    let get = || {
        Request::get("/decks/me")
            .header("x-user-id", "alice")
            .body(Body::empty())
            .unwrap()
    };
    let (status, _) = send(&app, get()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let put = Request::put("/decks/me")
        .header("x-user-id", "alice")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({"characters": ["CH-EMBER", "CH-TIDE", "CH-VOLT"], "cards": ["EV-RALLY"]})
                .to_string(),
        ))
        .unwrap();
    let (status, _) = send(&app, put).await;
    assert_eq!(status, StatusCode::OK);

    let (status, deck) = send(&app, get()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deck["characters"][2], "CH-VOLT");
}

#[tokio::test]
async fn healthcheck_reports_memory_storage() {
    let app = app();
    let (status, body) = send(&app, Request::get("/healthcheck").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["storage"], "memory");
}
