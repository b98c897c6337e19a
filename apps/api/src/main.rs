use std::net::SocketAddr;

use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{error, info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;
mod state;

use shared_config::AppConfig;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting clinic scheduling API server");

    let config = AppConfig::from_env();
    let state = AppState::build(&config).await?;

    if let Some(consumer) = state.consumer.clone() {
        tokio::spawn(async move {
            if let Err(e) = consumer.start().await {
                error!("In-process notification consumer stopped: {}", e);
            }
        });
    }

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router::create_router(&state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new()
                    .level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new()
                    .level(Level::INFO)),
        )
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(consumer) = state.consumer {
        consumer.shutdown().await;
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use shared_utils::test_utils::TestConfig;
    use tower::ServiceExt;

    async fn call(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn in_memory_stack_books_through_every_cell() {
        let state = AppState::build(&TestConfig::in_memory()).await.unwrap();
        assert!(state.consumer.is_some());
        let app = router::create_router(&state);

        let (status, patient) = call(
            &app,
            "POST",
            "/patients",
            Some(json!({"first_name": "Jane", "last_name": "Doe", "email": "jane@example.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, doctor) = call(
            &app,
            "POST",
            "/doctors",
            Some(json!({
                "first_name": "Gregory",
                "last_name": "House",
                "email": "house@example.com",
                "specialization": "Diagnostics"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let doctor_id = doctor["id"].as_str().unwrap();

        let (status, _) = call(
            &app,
            "POST",
            &format!("/doctors/{}/availability", doctor_id),
            Some(json!({"day_of_week": 1, "start_time": "09:00:00", "end_time": "17:00:00"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, appointment) = call(
            &app,
            "POST",
            "/appointments",
            Some(json!({
                "patient_id": patient["id"],
                "doctor_id": doctor_id,
                "start_time": "2024-01-02T10:00:00",
                "end_time": "2024-01-02T10:30:00"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(appointment["status"], "scheduled");

        let (status, health) = call(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(health["status"], "ok");
    }
}
