// libs/appointment-cell/tests/handlers_test.rs

mod common;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use appointment_cell::appointment_routes;
use common::World;

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(match body {
            Some(json) => Body::from(json.to_string()),
            None => Body::empty(),
        })
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

struct Setup {
    app: Router,
    world: World,
    patient_id: Uuid,
    doctor_id: Uuid,
}

async fn setup() -> Setup {
    let world = World::new();
    let patient_id = world.patient("Jane", "jane@example.com").await;
    let doctor_id = world.doctor("house@example.com").await;
    world.open(doctor_id, 0, 9, 17).await;
    let app = appointment_routes(world.services());

    Setup {
        app,
        world,
        patient_id,
        doctor_id,
    }
}

fn booking(s: &Setup, start: &str, end: &str) -> Value {
    json!({
        "patient_id": s.patient_id,
        "doctor_id": s.doctor_id,
        "start_time": start,
        "end_time": end,
        "notes": "first visit"
    })
}

#[tokio::test]
async fn book_fetch_and_cancel() {
    let s = setup().await;

    let (status, created) = send(
        &s.app,
        "POST",
        "/",
        Some(booking(&s, "2024-01-01T10:00:00", "2024-01-01T10:30:00")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "scheduled");
    let id = created["id"].as_str().unwrap().to_string();

    let (status, fetched) = send(&s.app, "GET", &format!("/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["patient_name"], "Jane Doe");
    assert_eq!(fetched["doctor_name"], "Gregory House");
    assert_eq!(fetched["start_time"], "2024-01-01T10:00:00");

    let (status, cancelled) = send(&s.app, "POST", &format!("/{}/cancel", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["appointment"]["status"], "cancelled");

    let (status, listed) = send(&s.app, "GET", &format!("/doctors/{}", s.doctor_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["total"], 0);

    assert_eq!(s.world.queue.pending_len().await, 2);
}

#[tokio::test]
async fn scheduling_errors_map_to_http_statuses() {
    let s = setup().await;

    let (status, _) = send(
        &s.app,
        "POST",
        "/",
        Some(booking(&s, "2024-01-01T10:00:00", "2024-01-01T10:30:00")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &s.app,
        "POST",
        "/",
        Some(booking(&s, "2024-01-01T10:15:00", "2024-01-01T10:45:00")),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("conflicts"));

    let (status, _) = send(
        &s.app,
        "POST",
        "/",
        Some(booking(&s, "2024-01-01T18:00:00", "2024-01-01T18:30:00")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &s.app,
        "POST",
        "/",
        Some(booking(&s, "2024-01-01T11:00:00", "2024-01-01T10:00:00")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&s.app, "GET", &format!("/{}", Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn status_update_then_terminal_rejection() {
    let s = setup().await;

    let (_, created) = send(
        &s.app,
        "POST",
        "/",
        Some(booking(&s, "2024-01-01T10:00:00", "2024-01-01T10:30:00")),
    )
    .await;
    let id = created["id"].as_str().unwrap().to_string();

    let (status, updated) = send(
        &s.app,
        "PUT",
        &format!("/{}/status", id),
        Some(json!({"status": "no_show"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "no_show");

    let (status, body) = send(
        &s.app,
        "PUT",
        &format!("/{}", id),
        Some(json!({"status": "confirmed"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("no_show"));

    let (status, _) = send(&s.app, "DELETE", &format!("/{}", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn available_slots_endpoint() {
    let s = setup().await;

    send(
        &s.app,
        "POST",
        "/",
        Some(booking(&s, "2024-01-01T10:00:00", "2024-01-01T10:30:00")),
    )
    .await;

    let (status, all) = send(
        &s.app,
        "GET",
        &format!("/doctors/{}/available-slots?date=2024-01-01", s.doctor_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all["total"], 16);

    let (status, free) = send(
        &s.app,
        "GET",
        &format!(
            "/doctors/{}/available-slots?date=2024-01-01&duration_minutes=60&available_only=true",
            s.doctor_id
        ),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(free["total"], 7);
    assert!(free["slots"]
        .as_array()
        .unwrap()
        .iter()
        .all(|slot| slot["is_available"] == true));
}

#[tokio::test]
async fn patient_listing_with_date_filter() {
    let s = setup().await;

    for (start, end) in [
        ("2024-01-01T09:00:00", "2024-01-01T09:30:00"),
        ("2024-01-01T15:00:00", "2024-01-01T15:30:00"),
    ] {
        let (status, _) = send(&s.app, "POST", "/", Some(booking(&s, start, end))).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = send(
        &s.app,
        "GET",
        &format!(
            "/patients/{}?start_date=2024-01-01T12:00:00&end_date=2024-01-01T23:59:00",
            s.patient_id
        ),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["appointments"][0]["start_time"], "2024-01-01T15:00:00");
}
