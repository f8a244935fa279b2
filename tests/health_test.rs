use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use frontpage_scorer::health;

#[tokio::test]
async fn health_reports_healthy() {
    let request = Request::get("/health").body(Body::empty()).unwrap();
    let response = health::router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json, serde_json::json!({ "status": "healthy" }));
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let request = Request::get("/metrics").body(Body::empty()).unwrap();
    let response = health::router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
