use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::json;
use stockwise_core::{ProductId, TenantId, UserId};
use stockwise_infra::alerts::InMemoryNotifier;
use stockwise_infra::Engine;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-memory stores, ephemeral port.
        let (engine, _memory) = Engine::in_memory(Arc::new(InMemoryNotifier::new()));
        let app = stockwise_api::app::build_app(Arc::new(engine));
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
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

struct Client {
    http: reqwest::Client,
    base_url: String,
    tenant: TenantId,
    actor: UserId,
}

impl Client {
    fn new(srv: &TestServer, tenant: TenantId) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: srv.base_url.clone(),
            tenant,
            actor: UserId::new(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header("x-tenant-id", self.tenant.to_string())
            .header("x-actor-id", self.actor.to_string())
    }

    async fn register(&self, name: &str) -> ProductId {
        let id = ProductId::new();
        let res = self
            .request(reqwest::Method::POST, &format!("/products/{id}"))
            .json(&json!({ "name": name, "category": "Ferretería" }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        id
    }

    async fn move_stock(&self, id: ProductId, movement_type: &str, quantity: i64) -> reqwest::Response {
        self.request(reqwest::Method::POST, &format!("/products/{id}/movements"))
            .json(&json!({
                "movement_type": movement_type,
                "quantity": quantity,
                "reason": "Conteo físico",
            }))
            .send()
            .await
            .unwrap()
    }

    async fn stock(&self, id: ProductId) -> serde_json::Value {
        let res = self
            .request(reqwest::Method::GET, &format!("/products/{id}/stock"))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        res.json().await.unwrap()
    }
}

#[tokio::test]
async fn health_needs_no_context() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(format!("{}/health", srv.base_url)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn tenant_header_is_required() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/alerts/dashboard", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "missing_tenant");

    let res = client
        .get(format!("{}/alerts/dashboard", srv.base_url))
        .header("x-tenant-id", "not-a-uuid")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn movement_lifecycle_and_error_mapping() {
    let srv = TestServer::spawn().await;
    let c = Client::new(&srv, TenantId::new());
    let id = c.register("Martillo").await;

    let res = c.move_stock(id, "ENTRADA", 10).await;
    assert_eq!(res.status(), StatusCode::OK);
    let outcome: serde_json::Value = res.json().await.unwrap();
    assert_eq!(outcome["new_qty"], 10);

    let res = c.move_stock(id, "SALIDA", 11).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "conflict");

    let res = c.move_stock(id, "ENTRADA", 0).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = c.move_stock(ProductId::new(), "ENTRADA", 1).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let stock = c.stock(id).await;
    assert_eq!(stock["quantity"], 10);
    assert_eq!(stock["available"], 10);

    let res = c
        .request(reqwest::Method::GET, &format!("/products/{id}/history?limit=10"))
        .send()
        .await
        .unwrap();
    let history: Vec<serde_json::Value> = res.json().await.unwrap();
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn sale_sync_applies_and_rejected_reservation_reports_lines() {
    let srv = TestServer::spawn().await;
    let c = Client::new(&srv, TenantId::new());
    let id = c.register("Taladro").await;
    c.move_stock(id, "ENTRADA", 10).await;

    let res = c
        .request(reqwest::Method::POST, "/sync/sales")
        .json(&json!({
            "event_id": "V-100",
            "operation": "CONFIRMAR",
            "items": [{ "product_id": id, "quantity": 5, "price": 1500 }],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let result: serde_json::Value = res.json().await.unwrap();
    assert_eq!(result["success"], true);
    assert_eq!(c.stock(id).await["quantity"], 5);

    let res = c
        .request(reqwest::Method::POST, "/sync/reservations")
        .json(&json!({
            "event_id": "C-7",
            "operation": "RESERVAR",
            "items": [{ "product_id": id, "quantity": 6 }],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let result: serde_json::Value = res.json().await.unwrap();
    assert_eq!(result["success"], false);
    assert_eq!(result["errors"].as_array().unwrap().len(), 1);
    assert_eq!(c.stock(id).await["available"], 5);
}

#[tokio::test]
async fn alerts_config_dashboard_and_scan() {
    let srv = TestServer::spawn().await;
    let c = Client::new(&srv, TenantId::new());
    c.register("Vacío").await;

    let res = c
        .request(reqwest::Method::PUT, "/alerts/config")
        .json(&json!({
            "stock_minimo": 20,
            "stock_critico": 30,
            "enabled": true,
            "channels": ["in_app"],
            "frequency_minutes": 60,
            "recipient_ids": [],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = c
        .request(reqwest::Method::GET, "/alerts/dashboard")
        .send()
        .await
        .unwrap();
    let dashboard: serde_json::Value = res.json().await.unwrap();
    assert_eq!(dashboard["total"], 1);
    assert_eq!(dashboard["alerts"][0]["alert_type"], "SIN_STOCK");

    let res = c
        .request(reqwest::Method::POST, "/alerts/scan")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let outcome: serde_json::Value = res.json().await.unwrap();
    assert_eq!(outcome["status"], "completed");
    assert_eq!(outcome["scan"]["critical"], 1);
}

#[tokio::test]
async fn audit_routes_and_reconciliation() {
    let srv = TestServer::spawn().await;
    let tenant = TenantId::new();
    let c = Client::new(&srv, tenant);
    let id = c.register("Clavos").await;
    c.move_stock(id, "ENTRADA", 40).await;
    c.move_stock(id, "SALIDA", 15).await;

    let res = c
        .request(reqwest::Method::GET, "/audit?movement_type=SALIDA&page=1&limit=10")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let page: serde_json::Value = res.json().await.unwrap();
    assert_eq!(page["total"], 1);

    let res = c
        .request(reqwest::Method::GET, "/audit?limit=0")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let stats: serde_json::Value = c
        .request(reqwest::Method::GET, "/audit/statistics")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["units_in"], 40);
    assert_eq!(stats["units_out"], 15);

    let consistency: serde_json::Value = c
        .request(reqwest::Method::GET, "/audit/consistency")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(consistency["checked"], 1);
    assert_eq!(consistency["violations"].as_array().unwrap().len(), 0);

    let report: serde_json::Value = c
        .request(reqwest::Method::GET, &format!("/audit/report?product_id={id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(report["rows"].as_array().unwrap().len(), 3);

    let res = c
        .request(reqwest::Method::POST, "/reconciliation")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let reconciliation: serde_json::Value = res.json().await.unwrap();
    assert_eq!(reconciliation["corrected"], 0);

    // Another tenant sees none of it.
    let other = Client::new(&srv, TenantId::new());
    let res = other
        .request(reqwest::Method::GET, &format!("/products/{id}/stock"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unregister_removes_the_record() {
    let srv = TestServer::spawn().await;
    let c = Client::new(&srv, TenantId::new());
    let id = c.register("Pala").await;

    let res = c
        .request(reqwest::Method::DELETE, &format!("/products/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = c
        .request(reqwest::Method::GET, &format!("/products/{id}/stock"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
