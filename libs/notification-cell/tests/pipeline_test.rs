// libs/notification-cell/tests/pipeline_test.rs

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use notification_cell::*;
use shared_config::AppConfig;

fn event(kind: NotificationType, email: &str) -> NotificationEvent {
    NotificationEvent {
        kind,
        appointment_id: Uuid::new_v4(),
        patient_id: Some(Uuid::new_v4()),
        provider_id: Some(Uuid::new_v4()),
        patient_email: Some(email.to_string()),
        patient_name: "Jane Doe".to_string(),
        provider_name: "Gregory House".to_string(),
        appointment_time: NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap(),
        status: None,
    }
}

fn fast_config() -> ConsumerConfig {
    ConsumerConfig {
        poll_timeout: Duration::from_millis(20),
        handler_timeout: Duration::from_secs(2),
        error_backoff: Duration::from_millis(10),
    }
}

fn transport_for(server: &MockServer) -> Arc<dyn EmailTransport> {
    Arc::new(HttpEmailTransport::new(&AppConfig {
        email_api_url: format!("{}/emails", server.uri()),
        email_api_key: "email-key".to_string(),
        ..AppConfig::default()
    }))
}

async fn wait_for_received(consumer: &NotificationConsumerService, expected: u64) {
    for _ in 0..200 {
        if consumer.stats().await.received >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("consumer did not receive {} messages in time", expected);
}

#[tokio::test]
async fn published_events_reach_the_email_api() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/emails"))
        .and(body_partial_json(json!({"to": "jane@example.com", "subject": "Appointment Cancellation"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let queue = Arc::new(InMemoryNotificationQueue::new());
    let dispatcher = NotificationDispatcher::new(queue.clone());
    let consumer = Arc::new(NotificationConsumerService::new(queue.clone(), transport_for(&server), fast_config()));

    let running = {
        let consumer = consumer.clone();
        tokio::spawn(async move { consumer.start().await })
    };

    dispatcher.publish(event(NotificationType::Cancelled, "jane@example.com")).await;
    wait_for_received(&consumer, 1).await;

    consumer.shutdown().await;
    running.await.unwrap().unwrap();

    assert_eq!(consumer.stats().await.delivered, 1);
    assert_eq!(queue.pending_len().await, 0);
    assert_eq!(queue.in_flight_len().await, 0);
}

#[tokio::test]
async fn email_outage_dead_letters_instead_of_dropping() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let queue = Arc::new(InMemoryNotificationQueue::new());
    let dispatcher = NotificationDispatcher::new(queue.clone());
    let consumer = NotificationConsumerService::new(queue.clone(), transport_for(&server), fast_config());

    dispatcher.publish(event(NotificationType::Created, "jane@example.com")).await;
    let outcome = consumer.process_next().await.unwrap();

    assert!(matches!(outcome, Some(MessageOutcome::DeadLettered { .. })));
    let dead = queue.dead_letters().await;
    assert_eq!(dead.len(), 1);
    assert!(dead[0].reason.contains("503"));
    let original: NotificationEvent = serde_json::from_str(&dead[0].payload).unwrap();
    assert_eq!(original.kind, NotificationType::Created);
}

#[tokio::test]
async fn slow_delivery_hits_handler_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let queue = Arc::new(InMemoryNotificationQueue::new());
    let config = ConsumerConfig {
        handler_timeout: Duration::from_millis(50),
        ..fast_config()
    };
    let consumer = NotificationConsumerService::new(queue.clone(), transport_for(&server), config);

    NotificationDispatcher::new(queue.clone())
        .publish(event(NotificationType::Updated, "jane@example.com"))
        .await;
    let outcome = consumer.process_next().await.unwrap();

    assert!(matches!(
        outcome,
        Some(MessageOutcome::DeadLettered { ref reason }) if reason.contains("timeout")
    ));
    assert_eq!(queue.in_flight_len().await, 0);
}

#[tokio::test]
async fn restart_redelivers_unacknowledged_messages() {
    let queue = Arc::new(InMemoryNotificationQueue::new());
    NotificationDispatcher::new(queue.clone())
        .publish(event(NotificationType::Created, "jane@example.com"))
        .await;

    // A consumer that crashed after reserving leaves the message in flight.
    queue.reserve(Duration::from_millis(10)).await.unwrap();
    assert_eq!(queue.in_flight_len().await, 1);

    let consumer = Arc::new(NotificationConsumerService::new(
        queue.clone(),
        Arc::new(LoggingEmailTransport),
        fast_config(),
    ));
    let running = {
        let consumer = consumer.clone();
        tokio::spawn(async move { consumer.start().await })
    };

    wait_for_received(&consumer, 1).await;
    consumer.shutdown().await;
    running.await.unwrap().unwrap();

    assert_eq!(consumer.stats().await.delivered, 1);
    assert_eq!(queue.in_flight_len().await, 0);
}

#[test]
fn unknown_wire_type_still_decodes() {
    let wire = json!({
        "type": "reminder",
        "appointment_id": Uuid::new_v4(),
        "patient_email": "jane@example.com",
        "patient_name": "Jane Doe",
        "doctor_name": "Gregory House",
        "appointment_time": "2024-01-02T10:00:00"
    });

    let event: NotificationEvent = serde_json::from_value(wire).unwrap();

    assert_eq!(event.kind, NotificationType::Unknown);
    assert_eq!(event.provider_name, "Gregory House");
    assert_eq!(render(&event).subject, "Healthcare Appointment Notification");
}
