use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use delivery_lifecycle::api::rest::router;
use delivery_lifecycle::engine::retry::RetryPolicy;
use delivery_lifecycle::state::AppState;
use delivery_lifecycle::store::MemoryStore;
use delivery_lifecycle::store::blob::MemoryBlobStore;
use serde_json::{Value, json};
use tower::ServiceExt;

fn setup() -> axum::Router {
    let state = AppState::new(
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryBlobStore::new("memory://blobs")),
        Vec::new(),
        RetryPolicy::default(),
        64,
    );
    router(Arc::new(state))
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn order_body(buyer_id: &str) -> Value {
    json!({
        "buyer_id": buyer_id,
        "items": [
            {
                "product_id": "7b0c2a7e-4f7e-4f59-9d0a-1f6a3d0b2c11",
                "name": "Rice 5kg",
                "unit_price": 12.5,
                "quantity": 2
            }
        ],
        "delivery_address": {
            "street": "12 Marina Road",
            "city": "Lagos",
            "state": "Lagos",
            "zip_code": "101001",
            "country": "NG"
        },
        "current_location": { "lat": 6.45, "lng": 3.39 }
    })
}

async fn create_order(app: &axum::Router, buyer_id: &str) -> Value {
    let res = app
        .clone()
        .oneshot(json_request("POST", "/orders", order_body(buyer_id)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    body_json(res).await
}

async fn create_verified_agent(app: &axum::Router, name: &str) -> String {
    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/agents",
            json!({ "name": name, "location": { "lat": 6.46, "lng": 3.40 } }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let agent = body_json(res).await;
    let id = agent["id"].as_str().unwrap().to_string();

    let upload = Request::builder()
        .method("PUT")
        .uri(format!("/agents/{id}/documents/license.png"))
        .header("content-type", "application/octet-stream")
        .body(Body::from(&b"png-bytes"[..]))
        .unwrap();
    let res = app.clone().oneshot(upload).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/agents/{id}/verification"),
            json!({ "approved": true }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    id
}

#[tokio::test]
async fn health_returns_ok() {
    let app = setup();
    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["orders"], 0);
    assert_eq!(body["agents"], 0);
    assert_eq!(body["profiles"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let app = setup();
    let response = app.oneshot(get_request("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("active_location_trackers"));
}

#[tokio::test]
async fn create_agent_starts_unverified_and_available() {
    let app = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/agents",
            json!({ "name": "Ada", "location": { "lat": 6.5, "lng": 3.4 } }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["name"], "Ada");
    assert_eq!(body["status"], "AVAILABLE");
    assert_eq!(body["verification"], "PENDING");
    assert!(body["active_order"].is_null());
    assert_eq!(body["version"], 1);
}

#[tokio::test]
async fn create_agent_empty_name_returns_400() {
    let app = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/agents",
            json!({ "name": "   ", "location": { "lat": 6.5, "lng": 3.4 } }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn list_agents_filters_by_status() {
    let app = setup();
    let id = create_verified_agent(&app, "Bola").await;
    create_verified_agent(&app, "Chidi").await;

    let res = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/agents/{id}/status"),
            json!({ "status": "UNAVAILABLE" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .clone()
        .oneshot(get_request("/agents?status=AVAILABLE"))
        .await
        .unwrap();
    let available = body_json(res).await;
    assert_eq!(available.as_array().unwrap().len(), 1);
    assert_eq!(available[0]["name"], "Chidi");

    let res = app.oneshot(get_request("/agents")).await.unwrap();
    assert_eq!(body_json(res).await.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn illegal_agent_transition_returns_422() {
    let app = setup();
    let id = create_verified_agent(&app, "Dayo").await;

    let res = app
        .oneshot(json_request(
            "PATCH",
            &format!("/agents/{id}/status"),
            json!({ "status": "IN_TRANSIT" }),
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(res).await;
    assert_eq!(body["code"], "INVALID_TRANSITION");
    assert_eq!(body["detail"], "invalid transition AVAILABLE -> IN_TRANSIT");
}

#[tokio::test]
async fn get_nonexistent_order_returns_404() {
    let app = setup();
    let fake_id = "00000000-0000-0000-0000-000000000000";
    let response = app
        .oneshot(get_request(&format!("/orders/{fake_id}")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["code"], "ORDER_NOT_FOUND");
    assert!(!body["message"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn create_order_returns_pending() {
    let app = setup();
    let buyer_id = "2f1d8c3a-6b0e-4c8e-9a51-0c1b7f4e9d20";
    let order = create_order(&app, buyer_id).await;

    assert_eq!(order["tracking"]["status"], "PENDING");
    assert_eq!(order["payment_status"], "PENDING");
    assert_eq!(order["total_price"], 25.0);
    assert_eq!(order["delivery_format"], "standard");
    assert!(order["agent_id"].is_null());

    let res = app
        .oneshot(get_request(&format!("/buyers/{buyer_id}/orders")))
        .await
        .unwrap();
    let orders = body_json(res).await;
    assert_eq!(orders.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn create_order_without_items_returns_400() {
    let app = setup();
    let mut body = order_body("2f1d8c3a-6b0e-4c8e-9a51-0c1b7f4e9d20");
    body["items"] = json!([]);

    let res = app
        .oneshot(json_request("POST", "/orders", body))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unverified_agent_cannot_be_assigned() {
    let app = setup();
    let order = create_order(&app, "2f1d8c3a-6b0e-4c8e-9a51-0c1b7f4e9d20").await;
    let order_id = order["id"].as_str().unwrap();

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/agents",
            json!({ "name": "Emeka", "location": { "lat": 6.5, "lng": 3.4 } }),
        ))
        .await
        .unwrap();
    let agent_id = body_json(res).await["id"].as_str().unwrap().to_string();

    let res = app
        .oneshot(json_request(
            "POST",
            &format!("/orders/{order_id}/assign"),
            json!({ "agent_id": agent_id }),
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(res).await["code"], "AGENT_NOT_AVAILABLE");
}

#[tokio::test]
async fn full_delivery_flow() {
    let app = setup();
    let agent_id = create_verified_agent(&app, "Funmi").await;
    let order = create_order(&app, "2f1d8c3a-6b0e-4c8e-9a51-0c1b7f4e9d20").await;
    let order_id = order["id"].as_str().unwrap().to_string();

    let res = app
        .clone()
        .oneshot(get_request(&format!("/orders/{order_id}/candidates?max_km=5")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let candidates = body_json(res).await;
    assert_eq!(candidates[0]["agent_id"], agent_id);
    assert!(candidates[0]["score"].as_f64().unwrap() > 0.0);

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/orders/{order_id}/assign"),
            json!({ "agent_id": agent_id }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let assignment = body_json(res).await;
    assert_eq!(assignment["replayed"], false);

    let res = app
        .clone()
        .oneshot(get_request(&format!("/orders/{order_id}")))
        .await
        .unwrap();
    let assigned = body_json(res).await;
    assert_eq!(assigned["tracking"]["status"], "IN_TRANSIT");
    assert_eq!(assigned["agent_id"], agent_id);

    let res = app
        .clone()
        .oneshot(get_request(&format!("/agents/{agent_id}")))
        .await
        .unwrap();
    let agent = body_json(res).await;
    assert_eq!(agent["status"], "ASSIGNED");
    assert_eq!(agent["active_order"], order_id);

    // Repeating the assignment returns the existing one.
    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/orders/{order_id}/assign"),
            json!({ "agent_id": agent_id }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["replayed"], true);

    let res = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/orders/{order_id}/status"),
            json!({ "status": "DELIVERED" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["tracking"]["status"], "DELIVERED");

    let res = app
        .clone()
        .oneshot(get_request(&format!("/agents/{agent_id}")))
        .await
        .unwrap();
    let agent = body_json(res).await;
    assert_eq!(agent["status"], "DELIVERED");
    assert!(agent["active_order"].is_null());

    let res = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/agents/{agent_id}/status"),
            json!({ "status": "AVAILABLE" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .oneshot(get_request(&format!("/agents/{agent_id}/orders")))
        .await
        .unwrap();
    let history = body_json(res).await;
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["id"], order_id);
}

#[tokio::test]
async fn assigning_a_delivered_order_elsewhere_returns_409() {
    let app = setup();
    let first = create_verified_agent(&app, "Gbenga").await;
    let second = create_verified_agent(&app, "Hauwa").await;
    let order = create_order(&app, "2f1d8c3a-6b0e-4c8e-9a51-0c1b7f4e9d20").await;
    let order_id = order["id"].as_str().unwrap().to_string();

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/orders/{order_id}/assign"),
            json!({ "agent_id": first }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .oneshot(json_request(
            "POST",
            &format!("/orders/{order_id}/assign"),
            json!({ "agent_id": second }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(res).await["code"], "ORDER_NOT_PENDING");
}

#[tokio::test]
async fn nearby_agents_sorted_by_distance() {
    let app = setup();
    let near = create_verified_agent(&app, "Ife").await;

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/agents",
            json!({ "name": "Far", "location": { "lat": 9.07, "lng": 7.49 } }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .oneshot(get_request("/agents/nearby?lat=6.45&lng=3.39&max_km=20"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let nearby = body_json(res).await;
    let list = nearby.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["agent"]["id"], near);
    assert!(list[0]["distance_km"].as_f64().unwrap() < 5.0);
}

#[tokio::test]
async fn reviews_and_reports_accumulate() {
    let app = setup();
    let agent_id = create_verified_agent(&app, "Jide").await;
    let customer = "5a6b7c8d-1e2f-4a3b-8c9d-0e1f2a3b4c5d";

    for rating in [4, 5] {
        let res = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/agents/{agent_id}/reviews"),
                json!({ "customer_id": customer, "rating": rating, "comment": "on time" }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/agents/{agent_id}/reviews"),
            json!({ "customer_id": customer, "rating": 9 }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = app
        .oneshot(json_request(
            "POST",
            &format!("/agents/{agent_id}/reports"),
            json!({ "kind": "negligence" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let agent = body_json(res).await;
    assert_eq!(agent["rating"]["review_count"], 2);
    assert_eq!(agent["rating"]["total_score"], 9);
    assert_eq!(agent["negligence_reports"], 1);
    assert_eq!(agent["fraud_reports"], 0);
}

#[tokio::test]
async fn profile_role_switch_registers_agent() {
    let app = setup();
    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/profiles",
            json!({
                "name": "Kemi",
                "email": "kemi@example.com",
                "phone": "+2348000000000",
                "location": { "lat": 6.45, "lng": 3.39 },
                "role": "buyer"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let profile = body_json(res).await;
    assert_eq!(profile["role"], "buyer");
    let id = profile["id"].as_str().unwrap().to_string();

    let res = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/profiles/{id}/role"),
            json!({ "role": "agent" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let switched = body_json(res).await;
    assert_eq!(switched["role"], "agent");
    let agent_id = switched["agent_id"].as_str().unwrap().to_string();

    let res = app
        .clone()
        .oneshot(get_request(&format!("/agents/{agent_id}")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .oneshot(json_request(
            "PATCH",
            &format!("/profiles/{id}/role"),
            json!({ "role": "vendor" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn nearby_with_out_of_range_point_returns_400() {
    let app = setup();
    let res = app
        .oneshot(get_request("/agents/nearby?lat=200&lng=3.39&max_km=20"))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["code"], "BAD_REQUEST");
}
