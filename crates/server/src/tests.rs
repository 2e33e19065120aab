use super::*;
use axum::body::Body;
use axum::http::{HeaderValue, Request, StatusCode};
use tower::ServiceExt;
use vocanvas_engine::VoiceConfig;
use vocanvas_protocol::Swap;

fn test_engine() -> Engine {
    Engine::new(VoiceConfig::builtin().expect("builtin config")).expect("engine")
}

fn test_state() -> Arc<AppState> {
    Arc::new(AppState::new(test_engine()))
}

fn host_headers(host: &'static str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::HOST, HeaderValue::from_static(host));
    headers
}

async fn post_json(app: Router, path: &str, body: String) -> (StatusCode, Vec<u8>) {
    let resp = app
        .oneshot(
            Request::post(path)
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::HOST, "canvas.example.com")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

#[tokio::test]
async fn webhook_show_color_sends_scene_and_speech() {
    let req = WebhookRequest::new("Action.showColor").with_parameter("color", "blue");
    let Json(resp) = webhook(
        State(test_state()),
        host_headers("canvas.example.com"),
        Json(req),
    )
    .await;

    assert!(resp.utterance.contains("blue"));
    assert!(resp
        .utterance
        .ends_with(" What color next, or would you like to talk about numbers?"));
    assert!(resp.ssml.starts_with("<speak><mark name=\"START\"/>"));
    assert_eq!(resp.canvas.swap, Swap::Replace);
    assert_eq!(
        Value::Object(resp.canvas.data[0].clone()),
        json!({"scene": "color", "color": "blue"})
    );
    assert_eq!(
        resp.canvas.url.as_deref(),
        Some("https://canvas.example.com/index.html?session=")
    );
}

#[tokio::test]
async fn public_host_overrides_request_host() {
    let mut state = AppState::new(test_engine());
    state.public_host = Some("public.example.org".to_string());
    let Json(resp) = webhook(
        State(Arc::new(state)),
        host_headers("10.0.0.5:39333"),
        Json(WebhookRequest::new("Action.welcome")),
    )
    .await;
    assert!(resp
        .canvas
        .url
        .as_deref()
        .is_some_and(|u| u.starts_with("https://public.example.org/")));
    assert_eq!(resp.canvas.data[0]["scene"], "welcome");
}

#[tokio::test]
async fn router_round_trip_counts_numbers() {
    let app = build_router(AppState::new(test_engine()), &[]);
    let body = json!({
        "locale": "en-US",
        "action": "Action.showNumber",
        "parameters": {"number": 3},
        "consecutive": 1
    })
    .to_string();

    let (status, bytes) = post_json(app, "/webhook", body).await;
    assert_eq!(status, StatusCode::OK);
    let resp: WebhookResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(
        resp.utterance,
        "Here we go. 1 2 3 What number next, or should we talk about colors?"
    );
    assert!(resp.ssml.contains("<mark name=\"number-3\"/>3"));
    assert_eq!(resp.canvas.data[0]["number"], 3);
}

#[tokio::test]
async fn huge_number_is_refused_not_expanded() {
    let app = build_router(AppState::new(test_engine()), &[]);
    let body = json!({"action": "Action.showNumber", "parameters": {"number": 2_000_000_000u64}})
        .to_string();
    let (status, bytes) = post_json(app, "/webhook", body).await;
    assert_eq!(status, StatusCode::OK);
    let resp: WebhookResponse = serde_json::from_slice(&bytes).unwrap();
    assert!(resp.utterance.contains("up to 100"));
    assert!(resp.canvas.data.is_empty());
}

#[tokio::test]
async fn unknown_locale_and_action_still_answer() {
    let app = build_router(AppState::new(test_engine()), &[]);
    let body = json!({"locale": "xx-YY", "action": "Action.dance"}).to_string();
    let (status, bytes) = post_json(app, "/webhook", body).await;
    assert_eq!(status, StatusCode::OK);
    let resp: WebhookResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(resp.utterance, "What next?");
}

#[tokio::test]
async fn malformed_body_is_a_client_error() {
    let app = build_router(AppState::new(test_engine()), &[]);
    let (status, _) = post_json(app, "/webhook", "{\"locale\":".to_string()).await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn health_lists_config_sources() {
    let Json(body) = health(State(test_state())).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["sources"], json!(["index", "action", "color", "number"]));
}

#[tokio::test]
async fn serve_listener_stops_on_shutdown() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let expected = listener.local_addr().unwrap();
    let addr = serve_listener(listener, AppState::new(test_engine()), &[], async {})
        .await
        .unwrap();
    assert_eq!(addr, expected);
}

#[test]
fn cors_allows_local_and_configured_origins() {
    let allowed = vec!["https://canvas.example.com/".to_string()];
    let check = |o: &'static str| is_allowed_origin(&HeaderValue::from_static(o), &allowed);

    assert!(check("http://localhost:3000"));
    assert!(check("http://127.0.0.1"));
    assert!(check("https://canvas.example.com"));
    assert!(!check("https://localhost.evil.com"));
    assert!(!check("https://evil.example.com"));
}
