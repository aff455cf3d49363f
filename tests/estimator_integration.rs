use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use pro_estimate_rust::api::handlers::AppState;
use pro_estimate_rust::api::routes::build_app;
use pro_estimate_rust::logic::QuoteStyle;
use pro_estimate_rust::model::Table;
use pro_estimate_rust::seed::load_seed_data;
use pro_estimate_rust::store::{EstimateCache, MemoryStore, StaticAuth};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

// In-process client wrapper for driving the router
struct TestClient {
    app: Router,
    token: Option<String>,
}

struct TestResponse {
    status: StatusCode,
    content_type: Option<String>,
    body: Vec<u8>,
}

impl TestResponse {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }
}

impl TestClient {
    async fn new(seeded: bool) -> (Self, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        if seeded {
            load_seed_data(&*store).await.unwrap();
        }
        let auth = Arc::new(StaticAuth::new("admin@agency.test", "secret"));
        let state = Arc::new(AppState::new(
            Arc::clone(&store),
            auth,
            EstimateCache::new(),
            QuoteStyle::default(),
        ));
        let client = Self {
            app: build_app(state, None),
            token: None,
        };
        (client, store)
    }

    async fn request(&self, method: Method, path: &str, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = &self.token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        TestResponse {
            status,
            content_type,
            body: body.to_vec(),
        }
    }

    async fn get(&self, path: &str) -> TestResponse {
        self.request(Method::GET, path, None).await
    }

    async fn post(&self, path: &str, json: Value) -> TestResponse {
        self.request(Method::POST, path, Some(json)).await
    }

    async fn patch(&self, path: &str, json: Value) -> TestResponse {
        self.request(Method::PATCH, path, Some(json)).await
    }

    async fn delete(&self, path: &str) -> TestResponse {
        self.request(Method::DELETE, path, None).await
    }

    async fn login(&mut self) {
        let response = self
            .post(
                "/auth/login",
                json!({ "email": "admin@agency.test", "password": "secret" }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK);
        self.token = response.json()["access_token"].as_str().map(str::to_string);
        assert!(self.token.is_some());
    }
}

fn find_id(items: &Value, field: &str, value: &str) -> String {
    items["items"]
        .as_array()
        .unwrap()
        .iter()
        .find(|item| item[field] == value)
        .and_then(|item| item["id"].as_str())
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_health() {
    let (client, _) = TestClient::new(false).await;
    let response = client.get("/health").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["status"], "healthy");
}

#[tokio::test]
async fn test_admin_routes_require_session() {
    let (mut client, _) = TestClient::new(false).await;

    let response = client.post("/admin/categories", json!({ "name": "Web" })).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.json()["kind"], "unauthorized");

    let response = client
        .post(
            "/auth/login",
            json!({ "email": "admin@agency.test", "password": "wrong" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.json()["kind"], "invalid_credentials");

    // A token that is not the active session's is refused
    client.token = Some("forged".to_string());
    let response = client.post("/admin/categories", json!({ "name": "Web" })).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    client.login().await;
    let session = client.get("/auth/session").await.json();
    assert_eq!(session["authenticated"], true);
    assert_eq!(session["user"]["email"], "admin@agency.test");
    assert!(session.get("access_token").is_none());

    let response = client.post("/admin/categories", json!({ "name": "Web" })).await;
    assert_eq!(response.status, StatusCode::CREATED);

    let response = client.post("/auth/logout", json!({})).await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);
    let response = client.post("/admin/categories", json!({ "name": "Other" })).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_active_session_is_not_handed_to_other_callers() {
    let (mut admin, _) = TestClient::new(false).await;
    admin.login().await;
    let admin_token = admin.token.clone().unwrap();

    let visitor = TestClient {
        app: admin.app.clone(),
        token: None,
    };
    let response = visitor
        .post(
            "/auth/login",
            json!({ "email": "visitor@elsewhere.test", "password": "nope" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert!(response.json().get("access_token").is_none());

    let response = visitor.post("/auth/logout", json!({})).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    // The admin's session survived both attempts
    let response = admin.post("/admin/categories", json!({ "name": "Web" })).await;
    assert_eq!(response.status, StatusCode::CREATED);

    // Holding the token, the admin gets the same session back
    let response = admin
        .post("/auth/login", json!({ "email": "", "password": "" }))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["access_token"], admin_token.as_str());
}

#[tokio::test]
async fn test_admin_builds_catalog_and_cascade_deletes() {
    let (mut client, store) = TestClient::new(false).await;
    client.login().await;

    let category = client
        .post("/admin/categories", json!({ "name": "Web", "icon": "code" }))
        .await
        .json();
    assert_eq!(category["icon"], "Code");
    let category_id = category["id"].as_str().unwrap().to_string();

    let phase = client
        .post(
            &format!("/admin/categories/{}/phases", category_id),
            json!({ "title": "Design", "description": "Layouts" }),
        )
        .await
        .json();
    let phase_id = phase["id"].as_str().unwrap().to_string();

    let response = client
        .post(
            &format!("/admin/phases/{}/tiers", phase_id),
            json!({ "tier_type": "PRO", "price": 900, "unit_name": "Projet" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    let tier_id = response.json()["id"].as_str().unwrap().to_string();

    let response = client
        .post(
            &format!("/admin/phases/{}/tiers", phase_id),
            json!({ "tier_type": "PRO", "price": 100 }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);

    let response = client
        .patch(&format!("/admin/tiers/{}", tier_id), json!({ "price": -5 }))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    for text in ["Mockups", "Style guide"] {
        let response = client
            .post(
                &format!("/admin/tiers/{}/features", tier_id),
                json!({ "feature_text": text }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED);
    }

    let response = client
        .post(
            &format!("/admin/tiers/{}/features", "4f8a3c1e-0000-4000-8000-000000000000"),
            json!({ "feature_text": "Orphan" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.json()["kind"], "not_found");

    let tiers = client.get(&format!("/phases/{}/tiers", phase_id)).await.json();
    assert_eq!(tiers["total"], 1);
    assert_eq!(tiers["items"][0]["features"][1]["feature_text"], "Style guide");

    // Row-level security hides the category row from writes
    store.deny_writes(Table::ServiceCategories);
    let response = client
        .delete(&format!("/admin/categories/{}", category_id))
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    let body = response.json();
    assert_eq!(body["kind"], "permission_denied");
    assert_eq!(body["step"], "delete_target");
    assert_eq!(body["completed"]["features"], 2);

    store.clear_policies();
    let response = client
        .delete(&format!("/admin/categories/{}", category_id))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["target"], true);
    let counts = store.row_counts().await;
    assert_eq!((counts.categories, counts.phases, counts.tiers, counts.features), (0, 0, 0, 0));
}

#[tokio::test]
async fn test_estimate_flow_and_quote() {
    let (client, _) = TestClient::new(true).await;

    let categories = client.get("/categories").await.json();
    assert_eq!(categories["total"], 2);
    let web_id = find_id(&categories, "name", "Web Development");

    let phases = client.get(&format!("/categories/{}/phases", web_id)).await.json();
    let design_id = find_id(&phases, "title", "Design");
    let hosting_id = find_id(&phases, "title", "Hosting");
    let design_tiers = client.get(&format!("/phases/{}/tiers", design_id)).await.json();
    let standard_id = find_id(&design_tiers, "tier_type", "STANDARD_PLUS");
    let hosting_tiers = client.get(&format!("/phases/{}/tiers", hosting_id)).await.json();
    let pro_id = find_id(&hosting_tiers, "tier_type", "PRO");

    let response = client.post("/estimates", json!({})).await;
    assert_eq!(response.status, StatusCode::CREATED);
    let estimate_id = response.json()["id"].as_str().unwrap().to_string();

    // Nothing selected: no quote
    let response = client.get(&format!("/estimates/{}/quote", estimate_id)).await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    client
        .post(
            &format!("/estimates/{}/select", estimate_id),
            json!({ "phase_id": design_id, "tier_id": standard_id }),
        )
        .await;
    let estimate = client
        .post(
            &format!("/estimates/{}/select", estimate_id),
            json!({ "phase_id": hosting_id, "tier_id": pro_id }),
        )
        .await
        .json();
    assert_eq!(estimate["summary"]["total"], 56000.0);

    let estimate = client
        .post(
            &format!("/estimates/{}/quantity", estimate_id),
            json!({ "phase_id": hosting_id, "quantity": "abc" }),
        )
        .await
        .json();
    assert_eq!(estimate["summary"]["total"], 52000.0);

    // Tier from another phase is refused
    let response = client
        .post(
            &format!("/estimates/{}/select", estimate_id),
            json!({ "phase_id": design_id, "tier_id": pro_id }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = client.get(&format!("/estimates/{}/quote.txt", estimate_id)).await;
    assert_eq!(response.status, StatusCode::OK);
    let text = String::from_utf8(response.body.clone()).unwrap();
    assert!(text.contains("Total: DZD 52,000"));

    let response = client.get(&format!("/estimates/{}/quote", estimate_id)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.content_type.as_deref(), Some("application/pdf"));
    assert!(response.body.starts_with(b"%PDF-"));

    let response = client.get("/estimates/unknown").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}
