use std::num::NonZeroUsize;
use std::sync::Arc;

use chrono::{TimeDelta, TimeZone, Utc};
use serde_json::{Value, json};

use super::{Delivery, Publisher, Sample, TopicTemplate};
use crate::link::{LinkError, LinkEvent, MockLink};
use crate::queue::DrainOutcome;
use crate::session::SessionManager;
use crate::utils::Error;

fn t0() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 8, 30, 0).unwrap()
}

fn publisher_with(
    capacity: usize,
    ttl: TimeDelta,
    session_id: &str,
) -> (
    Publisher<MockLink>,
    Arc<MockLink>,
    tokio::sync::mpsc::UnboundedReceiver<LinkEvent>,
) {
    let (link, events) = MockLink::new();
    let link = Arc::new(link);
    let session = SessionManager::starting_at("dev-1", ttl, Some(session_id.to_string()), t0());
    let publisher = Publisher::from_parts(
        session,
        TopicTemplate::default(),
        NonZeroUsize::new(capacity).unwrap(),
        link.clone(),
    );
    (publisher, link, events)
}

fn decode(payload: &[u8]) -> Value {
    serde_json::from_slice(payload).unwrap()
}

#[test]
fn test_payload_has_exactly_six_keys() {
    let sample = Sample::new(59.3293, 18.0686)
        .with_elevation(10.5)
        .with_speed(1.2)
        .with_activity("walking")
        .at(t0());

    let value = decode(&sample.encode().unwrap());
    assert_eq!(
        value,
        json!({
            "lat": 59.3293,
            "lon": 18.0686,
            "elevation": 10.5,
            "speed": 1.2,
            "activity": "walking",
            "timestamp": "2025-06-01T08:30:00Z",
        })
    );
    assert_eq!(value.as_object().unwrap().len(), 6);
}

#[test]
fn test_missing_fields_are_null_not_omitted() {
    let encoded = Sample::new(1.0, 2.0).at(t0()).encode().unwrap();
    let text = String::from_utf8(encoded).unwrap();

    assert!(text.contains("\"elevation\":null"));
    assert!(text.contains("\"speed\":null"));
    assert!(text.contains("\"activity\":null"));
    assert!(!text.contains(' '), "payload should be compact: {text}");
}

#[test]
fn test_payload_coercions() {
    let sample = Sample::new(1.0, 2.0)
        .with_elevation(f64::NAN)
        .with_speed(f64::INFINITY)
        .with_activity("")
        .at(t0() + TimeDelta::milliseconds(250));

    let value = decode(&sample.encode().unwrap());
    assert_eq!(value["elevation"], Value::Null);
    assert_eq!(value["speed"], Value::Null);
    assert_eq!(value["activity"], Value::Null);
    assert_eq!(value["timestamp"], "2025-06-01T08:30:00.250Z");
}

#[test]
fn test_non_finite_position_is_rejected() {
    for (lat, lon) in [(f64::NAN, 18.0), (59.0, f64::INFINITY), (f64::NAN, f64::NEG_INFINITY)] {
        let err = Sample::new(lat, lon).at(t0()).encode().unwrap_err();
        assert!(matches!(err, Error::InvalidSample(_)), "got {err:?}");
    }
}

#[tokio::test]
async fn test_non_finite_position_is_dropped_not_queued() {
    let (mut publisher, link, _events) = publisher_with(10, TimeDelta::hours(1), "A");
    link.connect();

    let outcome = publisher
        .publish_point_at(Sample::new(f64::NAN, f64::INFINITY), t0())
        .await;

    assert_eq!(outcome, Delivery::Dropped);
    assert!(publisher.queue().is_empty());
    assert_eq!(link.attempts(), 0);
}

#[test]
fn test_topic_template_normalizes_trailing_slash() {
    let template = TopicTemplate::new("fleet/{client_id}/s/{session_id}///").unwrap();
    assert_eq!(template.as_str(), "fleet/{client_id}/s/{session_id}/");
    assert_eq!(template.render("c1", "s1"), "fleet/c1/s/s1/");

    let bare = TopicTemplate::new("fleet/{client_id}/{session_id}").unwrap();
    assert_eq!(bare.render("c1", "s1"), "fleet/c1/s1/");
}

#[test]
fn test_default_topic_shape() {
    let topic = TopicTemplate::default().render("cli-1", "abc");
    assert_eq!(topic, "client/cli-1/session/abc/");
}

#[test]
fn test_topic_template_rejects_bad_templates() {
    assert!(TopicTemplate::new("client/{client_id}/").is_err());
    assert!(TopicTemplate::new("session/{session_id}/").is_err());
    assert!(TopicTemplate::new("c/{client_id}/{session_id}/#").is_err());
}

#[tokio::test]
async fn test_live_publish_when_connected() {
    let (mut publisher, link, _events) = publisher_with(10, TimeDelta::hours(1), "A");
    link.connect();

    let outcome = publisher
        .publish_point_at(Sample::new(1.0, 2.0).at(t0()), t0())
        .await;

    assert_eq!(outcome, Delivery::Delivered);
    assert!(publisher.queue().is_empty());
    let sent = link.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].topic, "client/dev-1/session/A/");
    assert_eq!(sent[0].json().unwrap()["lat"], 1.0);
}

#[tokio::test]
async fn test_failed_send_is_queued_with_topic() {
    let (mut publisher, link, _events) = publisher_with(10, TimeDelta::hours(1), "A");
    link.connect();
    link.fail_nth(1, LinkError::Publish("rc=4".into()));

    let outcome = publisher
        .publish_point_at(Sample::new(1.0, 2.0).at(t0()), t0())
        .await;

    assert_eq!(outcome, Delivery::Queued);
    let queued = publisher.queue().snapshot();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].topic, "client/dev-1/session/A/");
    assert_eq!(decode(&queued[0].payload)["lon"], 2.0);
}

#[tokio::test]
async fn test_disconnected_publish_never_reaches_transport_output() {
    let (mut publisher, link, _events) = publisher_with(10, TimeDelta::hours(1), "A");

    for i in 0..3 {
        let outcome = publisher
            .publish_point_at(Sample::new(f64::from(i), 0.0).at(t0()), t0())
            .await;
        assert_eq!(outcome, Delivery::Queued);
    }

    assert_eq!(publisher.queue().len(), 3);
    assert!(link.sent().is_empty());
}

#[tokio::test]
async fn test_new_sample_waits_behind_backlog_after_connect() {
    let (mut publisher, link, _events) = publisher_with(10, TimeDelta::hours(1), "A");
    publisher.publish_point_at(Sample::new(1.0, 0.0), t0()).await;

    // connected, but the Connected event has not been handled yet
    link.connect();
    let outcome = publisher.publish_point_at(Sample::new(2.0, 0.0), t0()).await;

    assert_eq!(outcome, Delivery::Queued);
    assert!(publisher.queue().is_empty());
    let lats: Vec<_> = link
        .sent()
        .iter()
        .map(|m| m.json().unwrap()["lat"].as_f64().unwrap())
        .collect();
    assert_eq!(lats, vec![1.0, 2.0]);
}

#[tokio::test]
async fn test_backlog_stays_queued_while_link_is_down() {
    let (mut publisher, link, _events) = publisher_with(10, TimeDelta::hours(1), "A");
    publisher.publish_point_at(Sample::new(1.0, 0.0), t0()).await;
    publisher.publish_point_at(Sample::new(2.0, 0.0), t0()).await;

    assert_eq!(publisher.queue().len(), 2);
    // only the first sample tried the link; the second queued behind it
    assert_eq!(link.attempts(), 1);
}

#[tokio::test]
async fn test_not_connected_send_is_flushed_once_link_is_up() {
    let (mut publisher, link, _events) = publisher_with(10, TimeDelta::hours(1), "A");
    // the link reports up, but this send raced the connection coming up
    link.connect();
    link.fail_nth(1, LinkError::NotConnected);

    let outcome = publisher
        .publish_point_at(Sample::new(7.0, 0.0), t0())
        .await;

    assert_eq!(outcome, Delivery::Queued);
    assert!(publisher.queue().is_empty());
    assert_eq!(link.sent().len(), 1);
    assert_eq!(link.sent()[0].json().unwrap()["lat"], 7.0);
}

#[tokio::test]
async fn test_rotation_applies_to_next_sample_only() {
    let (mut publisher, link, _events) = publisher_with(10, TimeDelta::hours(1), "A");

    publisher
        .publish_point_at(Sample::new(1.0, 0.0), t0())
        .await;
    publisher
        .publish_point_at(Sample::new(2.0, 0.0), t0() + TimeDelta::seconds(3601))
        .await;

    let rotated = publisher.session().current_id().to_string();
    assert_ne!(rotated, "A");

    let topics: Vec<_> = publisher
        .queue()
        .snapshot()
        .into_iter()
        .map(|m| m.topic)
        .collect();
    assert_eq!(
        topics,
        vec![
            "client/dev-1/session/A/".to_string(),
            format!("client/dev-1/session/{rotated}/"),
        ]
    );

    link.connect();
    let outcome = publisher.drainer().drain().await;
    assert_eq!(outcome, DrainOutcome::Completed { drained: 2 });
    assert_eq!(link.sent()[0].topic, "client/dev-1/session/A/");
}

#[tokio::test]
async fn test_drainer_reacts_to_connect_only() {
    let (mut publisher, link, _events) = publisher_with(10, TimeDelta::hours(1), "A");
    publisher.publish_point_at(Sample::new(1.0, 0.0), t0()).await;
    let drainer = publisher.drainer();

    let on_disconnect = drainer
        .handle(LinkEvent::Disconnected {
            reason: "keepalive timeout".into(),
        })
        .await;
    assert_eq!(on_disconnect, None);
    assert_eq!(publisher.queue().len(), 1);

    link.connect();
    let on_connect = drainer.handle(LinkEvent::Connected).await;
    assert_eq!(on_connect, Some(DrainOutcome::Completed { drained: 1 }));
    assert!(publisher.queue().is_empty());
}

#[tokio::test]
async fn test_drain_failure_keeps_the_rest_for_next_connect() {
    let (mut publisher, link, _events) = publisher_with(10, TimeDelta::hours(1), "A");
    for i in 1..=4 {
        publisher
            .publish_point_at(Sample::new(f64::from(i), 0.0), t0())
            .await;
    }

    link.connect();
    link.fail_nth(2, LinkError::NotConnected);
    let drainer = publisher.drainer();

    let first = drainer.drain().await;
    assert_eq!(
        first,
        DrainOutcome::Halted {
            drained: 1,
            error: LinkError::NotConnected
        }
    );
    assert_eq!(link.attempts(), 4 + 2);
    assert_eq!(publisher.queue().len(), 2);

    let second = drainer.drain().await;
    assert_eq!(second, DrainOutcome::Completed { drained: 2 });

    let lats: Vec<_> = link
        .sent()
        .iter()
        .map(|m| m.json().unwrap()["lat"].as_f64().unwrap())
        .collect();
    // sample 2 was lost with the failed drain send
    assert_eq!(lats, vec![1.0, 3.0, 4.0]);
}
