//! Both tools against local stand-ins for the search, page and IGDB endpoints.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use gamedex_core::config::{IgdbConfig, SearchConfig};
use gamedex_tools::html::html_to_text;
use gamedex_tools::{DocsTool, GameInfoTool, Tool, ToolError};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

const FAST_PAGE: &str =
    "<html><body><h1>Chroma</h1><script>track()</script><p>Use the Chroma vector store.</p></body></html>";

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind local listener");
    let address = listener.local_addr().expect("local address");
    (listener, format!("http://{address}"))
}

fn serve(listener: TcpListener, router: Router) {
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
}

#[derive(Default)]
struct FakeSearch {
    links: Vec<String>,
    requests: Mutex<Vec<(Option<String>, Value)>>,
}

async fn search(
    State(state): State<Arc<FakeSearch>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    let api_key =
        headers.get("X-API-KEY").and_then(|value| value.to_str().ok()).map(str::to_string);
    state.requests.lock().await.push((api_key, body));
    let organic = state.links.iter().map(|link| json!({ "link": link })).collect::<Vec<_>>();
    Json(json!({ "organic": organic }))
}

async fn slow_page() -> Html<&'static str> {
    tokio::time::sleep(Duration::from_secs(5)).await;
    Html("<p>too late</p>")
}

async fn fast_page() -> Html<&'static str> {
    Html(FAST_PAGE)
}

async fn docs_upstream(link_paths: &[&str]) -> (DocsTool, Arc<FakeSearch>) {
    let (listener, base) = bind().await;
    let state = Arc::new(FakeSearch {
        links: link_paths.iter().map(|path| format!("{base}{path}")).collect(),
        ..FakeSearch::default()
    });
    let router = Router::new()
        .route("/search", post(search))
        .with_state(state.clone())
        .route("/slow", get(slow_page))
        .route("/fast", get(fast_page));
    serve(listener, router);

    let tool = DocsTool::from_config(&SearchConfig {
        api_key: Some("serper-test".to_string().into()),
        endpoint: format!("{base}/search"),
        results_per_query: 2,
        timeout_secs: 1,
    })
    .expect("docs tool builds");
    (tool, state)
}

#[tokio::test]
async fn docs_search_without_hits_reports_no_results() {
    let (tool, upstream) = docs_upstream(&[]).await;

    let text = tool
        .call(json!({"query": "Chroma DB", "library": "langchain"}))
        .await
        .expect("empty search is not an error");

    assert_eq!(text, "No results found");
    let requests = upstream.requests.lock().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0.as_deref(), Some("serper-test"));
    assert_eq!(requests[0].1, json!({"q": "site:python.langchain.com/docs Chroma DB", "num": 2}));
}

#[tokio::test]
async fn slow_page_contributes_timeout_text_next_to_fetched_pages() {
    let (tool, _upstream) = docs_upstream(&["/slow", "/fast"]).await;

    let text = tool
        .call(json!({"query": "Chroma DB", "library": "langchain"}))
        .await
        .expect("page timeouts are absorbed");

    assert_eq!(text, format!("Timeout error\n\n{}", html_to_text(FAST_PAGE)));
    assert!(text.contains("Use the Chroma vector store."));
    assert!(!text.contains("track()"));
}

#[derive(Default)]
struct FakeIgdb {
    games: Value,
    reject_next: AtomicBool,
    token_requests: AtomicUsize,
    authorizations: Mutex<Vec<String>>,
    bodies: Mutex<Vec<String>>,
}

async fn issue_token(State(state): State<Arc<FakeIgdb>>) -> Json<Value> {
    let issued = state.token_requests.fetch_add(1, Ordering::SeqCst) + 1;
    Json(json!({
        "access_token": format!("tok-{issued}"),
        "expires_in": 5_000_000,
        "token_type": "bearer"
    }))
}

async fn game_search(State(state): State<Arc<FakeIgdb>>, headers: HeaderMap, body: String) -> Response {
    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    state.authorizations.lock().await.push(authorization);
    state.bodies.lock().await.push(body);

    if state.reject_next.swap(false, Ordering::SeqCst) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(state.games.clone()).into_response()
}

async fn igdb_upstream(games: Value, reject_first: bool) -> (GameInfoTool, Arc<FakeIgdb>) {
    let (listener, base) = bind().await;
    let state = Arc::new(FakeIgdb {
        games,
        reject_next: AtomicBool::new(reject_first),
        ..FakeIgdb::default()
    });
    let router = Router::new()
        .route("/oauth2/token", post(issue_token))
        .route("/v4/games", post(game_search))
        .with_state(state.clone());
    serve(listener, router);

    let tool = GameInfoTool::from_config(&IgdbConfig {
        client_id: "igdb-client".to_string(),
        client_secret: "igdb-secret".to_string().into(),
        token_url: format!("{base}/oauth2/token"),
        api_url: format!("{base}/v4"),
        timeout_secs: 5,
    })
    .expect("game tool builds");
    (tool, state)
}

fn hades() -> Value {
    json!([{
        "name": "Hades",
        "first_release_date": 1600300800,
        "genres": [{"name": "Role-playing (RPG)"}, {"name": "Indie"}],
        "rating": 93.456,
        "involved_companies": [{"company": {"name": "Supergiant Games"}}]
    }])
}

#[tokio::test]
async fn access_token_is_fetched_once_and_reused() {
    let (tool, upstream) = igdb_upstream(hades(), false).await;

    let first = tool.call(json!({"game_name": "Hades"})).await.expect("first lookup");
    let second = tool.call(json!({"game_name": "Hades"})).await.expect("second lookup");

    assert!(first.starts_with("🎮 **Hades**\n📅 Released: 2020-09-17"));
    assert!(first.contains("⭐ Rating: 93.5"));
    assert_eq!(first, second);
    assert_eq!(upstream.token_requests.load(Ordering::SeqCst), 1);
    assert_eq!(upstream.authorizations.lock().await.as_slice(), &["Bearer tok-1", "Bearer tok-1"]);
    assert!(upstream.bodies.lock().await[0].starts_with("search \"Hades\"; fields name,"));
}

#[tokio::test]
async fn rejected_token_is_dropped_and_refetched() {
    let (tool, upstream) = igdb_upstream(hades(), true).await;

    let error = tool.call(json!({"game_name": "Hades"})).await.expect_err("token rejected");
    assert!(matches!(error, ToolError::Upstream(_)));

    let summary = tool.call(json!({"game_name": "Hades"})).await.expect("retry with fresh token");
    assert!(summary.starts_with("🎮 **Hades**"));
    assert_eq!(upstream.token_requests.load(Ordering::SeqCst), 2);
    assert_eq!(upstream.authorizations.lock().await.as_slice(), &["Bearer tok-1", "Bearer tok-2"]);
}

#[tokio::test]
async fn unknown_game_reports_no_game_found() {
    let (tool, _upstream) = igdb_upstream(json!([]), false).await;

    let text = tool.call(json!({"game_name": "Nonexistent Quest"})).await.expect("lookup");
    assert_eq!(text, "No game found.");
}
