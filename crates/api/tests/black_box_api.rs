use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{Value, json};

use stockflow_api::app::{build_app, services::AppServices};
use stockflow_core::ActorId;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-memory store, ephemeral port.
        let app = build_app(Arc::new(AppServices::in_memory()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Client that sends a fixed actor header on every request.
fn client(actor: ActorId) -> reqwest::Client {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        "x-actor-id",
        reqwest::header::HeaderValue::from_str(&actor.to_string()).unwrap(),
    );
    reqwest::Client::builder()
        .default_headers(headers)
        .build()
        .unwrap()
}

async fn create_item(client: &reqwest::Client, srv: &TestServer, name: &str, opening: i64) -> String {
    let res = client
        .post(srv.url("/items"))
        .json(&json!({ "name": name, "description": "test stock", "opening_quantity": opening }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    body["item"]["item_id"].as_str().unwrap().to_string()
}

async fn balance(client: &reqwest::Client, srv: &TestServer, item_id: &str) -> i64 {
    let res = client
        .get(srv.url(&format!("/items/{item_id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    body["balance"].as_i64().unwrap()
}

fn balance_in(receipt: &Value, item_id: &str) -> i64 {
    receipt["balances"]
        .as_array()
        .unwrap()
        .iter()
        .find(|b| b["item_id"] == item_id)
        .and_then(|b| b["balance"].as_i64())
        .unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn actor_header_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;
    let plain = reqwest::Client::new();

    let res = plain.get(srv.url("/items")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = plain
        .get(srv.url("/items"))
        .header("x-actor-id", "not-a-uuid")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn outbound_lifecycle_returns_authoritative_balances() {
    let srv = TestServer::spawn().await;
    let client = client(ActorId::new());
    let item = create_item(&client, &srv, "Kabel", 10).await;

    let res = client
        .post(srv.url("/outbound"))
        .json(&json!({ "item_id": item, "date": "2024-03-01", "quantity": 4, "recipient": "Toko Sinar" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let receipt: Value = res.json().await.unwrap();
    assert_eq!(balance_in(&receipt, &item), 6);
    let movement_id = receipt["movement_id"].as_str().unwrap().to_string();

    let res = client
        .post(srv.url("/outbound"))
        .json(&json!({ "item_id": item, "date": "2024-03-01", "quantity": 10, "recipient": "Toko Sinar" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "insufficient_stock");
    assert_eq!(body["available"], 6);
    assert_eq!(balance(&client, &srv, &item).await, 6);

    let res = client
        .put(srv.url(&format!("/movements/{movement_id}")))
        .json(&json!({ "item_id": item, "date": "2024-03-02", "quantity": 9 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let receipt: Value = res.json().await.unwrap();
    assert_eq!(balance_in(&receipt, &item), 1);

    let res = client
        .delete(srv.url(&format!("/movements/{movement_id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let receipt: Value = res.json().await.unwrap();
    assert_eq!(balance_in(&receipt, &item), 10);

    let res = client
        .delete(srv.url(&format!("/movements/{movement_id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn listings_and_invoices_carry_item_names() {
    let srv = TestServer::spawn().await;
    let client = client(ActorId::new());
    let item = create_item(&client, &srv, "Semen 50kg", 5).await;

    let res = client
        .post(srv.url("/outbound"))
        .json(&json!({ "item_id": item, "date": "2024-04-10", "quantity": 2, "recipient": "Proyek A" }))
        .send()
        .await
        .unwrap();
    let receipt: Value = res.json().await.unwrap();
    let movement_id = receipt["movement_id"].as_str().unwrap().to_string();

    let listed: Value = client
        .get(srv.url("/outbound"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed["items"][0]["item_name"], "Semen 50kg");
    assert_eq!(listed["items"][0]["recipient"], "Proyek A");

    let inbound: Value = client
        .get(srv.url("/inbound"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(inbound["items"][0]["note"], "opening balance");

    let res = client
        .get(srv.url(&format!("/invoices/{movement_id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let invoice: Value = res.json().await.unwrap();
    assert_eq!(invoice["item_name"], "Semen 50kg");
    assert_eq!(invoice["quantity"], 2);
    assert_eq!(invoice["date"], "2024-04-10");

    let per_item: Value = client
        .get(srv.url(&format!("/items/{item}/movements")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let rows = per_item["items"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["kind"], "outbound");
}

#[tokio::test]
async fn invalid_requests_map_to_error_codes() {
    let srv = TestServer::spawn().await;
    let client = client(ActorId::new());
    let item = create_item(&client, &srv, "Paku", 3).await;

    let res = client
        .post(srv.url("/inbound"))
        .json(&json!({ "item_id": item, "date": "2024-03-01", "quantity": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");

    let res = client.get(srv.url("/items/not-an-id")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_id");

    let res = client
        .post(srv.url("/inbound"))
        .json(&json!({ "item_id": item, "date": "yesterday", "quantity": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .post(srv.url("/outbound"))
        .json(&json!({ "item_id": item, "date": "2024-03-01", "quantity": 1, "recipient": "Site" }))
        .send()
        .await
        .unwrap();
    let receipt: Value = res.json().await.unwrap();
    let movement_id = receipt["movement_id"].as_str().unwrap().to_string();

    // Misspelled "recipient" must not be ignored on edit.
    let res = client
        .put(srv.url(&format!("/movements/{movement_id}")))
        .json(&json!({ "item_id": item, "date": "2024-03-01", "quantity": 1, "recipent": "Other" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");

    let missing = ActorId::new().to_string();
    let res = client
        .get(srv.url(&format!("/movements/{missing}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn item_with_movements_cannot_be_deleted() {
    let srv = TestServer::spawn().await;
    let client = client(ActorId::new());
    let used = create_item(&client, &srv, "Used", 1).await;
    let unused = create_item(&client, &srv, "Unused", 0).await;

    let res = client.delete(srv.url(&format!("/items/{used}"))).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "item_in_use");

    let res = client.delete(srv.url(&format!("/items/{unused}"))).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let choices: Value = client
        .get(srv.url("/items/choices"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(choices["items"].as_array().unwrap().len(), 1);
    assert_eq!(choices["items"][0]["name"], "Used");
}

#[tokio::test]
async fn supplier_directory_crud() {
    let srv = TestServer::spawn().await;
    let client = client(ActorId::new());

    let res = client
        .post(srv.url("/suppliers"))
        .json(&json!({ "name": "CV Maju", "phone": "0812-555" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: Value = res.json().await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    let res = client
        .put(srv.url(&format!("/suppliers/{id}")))
        .json(&json!({ "name": "CV Maju Jaya" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let listed: Value = client
        .get(srv.url("/suppliers"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed["items"][0]["name"], "CV Maju Jaya");

    let res = client.delete(srv.url(&format!("/suppliers/{id}"))).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    let res = client.delete(srv.url(&format!("/suppliers/{id}"))).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn consistency_report_is_clean_after_mixed_traffic() {
    let srv = TestServer::spawn().await;
    let client = client(ActorId::new());
    let x = create_item(&client, &srv, "X", 5).await;
    let y = create_item(&client, &srv, "Y", 5).await;

    let receipt: Value = client
        .post(srv.url("/outbound"))
        .json(&json!({ "item_id": x, "date": "2024-05-01", "quantity": 3, "recipient": "Site" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let movement_id = receipt["movement_id"].as_str().unwrap().to_string();

    let res = client
        .put(srv.url(&format!("/movements/{movement_id}")))
        .json(&json!({ "item_id": y, "date": "2024-05-01", "quantity": 3 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(balance(&client, &srv, &x).await, 5);
    assert_eq!(balance(&client, &srv, &y).await, 2);

    let report: Value = client
        .get(srv.url("/consistency"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(report["discrepancies"].as_array().unwrap().len(), 0);
    assert_eq!(report["items_checked"], 2);
}
