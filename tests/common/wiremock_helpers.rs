use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the mock store serves searches on
pub const SEARCH_PATH: &str = "/api/storesearch/";

pub fn search_endpoint(server: &MockServer) -> String {
    format!("{}{}", server.uri(), SEARCH_PATH)
}

/// One item in the store search wire format
pub fn store_item(name: &str, id: u64, price: u64) -> serde_json::Value {
    serde_json::json!({
        "type": "app",
        "name": name,
        "id": id,
        "price": { "currency": "UAH", "initial": price, "final": price },
        "tiny_image": format!("https://cdn.example.invalid/apps/{}/capsule_231x87.jpg", id),
    })
}

pub fn search_body(items: Vec<serde_json::Value>) -> serde_json::Value {
    serde_json::json!({ "total": items.len(), "items": items })
}

/// Starts a mock store whose search returns no matches for any term that has
/// no dedicated mock.
pub async fn mock_store_server() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "total": 0, "items": [] })))
        .with_priority(10)
        .mount(&server)
        .await;

    server
}

/// Answer searches for `term` with the given JSON body.
pub async fn mount_search(server: &MockServer, term: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("term", term))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Answer searches for `term` with the given JSON body, exactly `times` times.
pub async fn mount_search_expect(server: &MockServer, term: &str, body: serde_json::Value, times: u64) {
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("term", term))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(times)
        .mount(server)
        .await;
}

/// Fail searches for `term` with an HTTP status code.
pub async fn mount_status(server: &MockServer, term: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("term", term))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Answer searches for `term` with a raw, possibly malformed, body.
pub async fn mount_raw(server: &MockServer, term: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("term", term))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body.to_string())
                .insert_header("content-type", "application/json"),
        )
        .mount(server)
        .await;
}

/// Creates a mock store that delays every response to simulate a network timeout.
pub async fn mock_timeout_server(delay_ms: u64) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "total": 0, "items": [] }))
                .set_delay(Duration::from_millis(delay_ms)),
        )
        .mount(&server)
        .await;

    server
}
