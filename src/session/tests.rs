use super::SessionManager;
use chrono::{TimeDelta, TimeZone, Utc};

fn epoch() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

#[test]
fn test_session_new_has_opaque_id() {
    let session = SessionManager::new("cli-abc", TimeDelta::hours(26));
    assert_eq!(session.client_id(), "cli-abc");
    assert!(!session.current_id().is_empty());
    assert!(!session.current_id().contains("cli-abc"));
    assert!(uuid::Uuid::parse_str(session.current_id()).is_ok());
}

#[test]
fn test_session_ids_are_unique() {
    let a = SessionManager::new("c", TimeDelta::hours(1));
    let b = SessionManager::new("c", TimeDelta::hours(1));
    assert_ne!(a.current_id(), b.current_id());
}

#[test]
fn test_rotation_after_ttl() {
    let t0 = epoch();
    let mut session = SessionManager::starting_at("c", TimeDelta::hours(1), None, t0);
    let before = session.current_id().to_string();

    assert!(!session.tick(t0));
    assert!(session.tick(t0 + TimeDelta::seconds(3601)));
    assert_ne!(session.current_id(), before);
    assert_eq!(session.started_at(), t0 + TimeDelta::seconds(3601));
}

#[test]
fn test_no_rotation_before_ttl() {
    let t0 = epoch();
    let mut session = SessionManager::starting_at("c", TimeDelta::hours(1), None, t0);
    let before = session.current_id().to_string();

    assert!(!session.tick(t0));
    assert!(!session.tick(t0 + TimeDelta::seconds(3599)));
    assert_eq!(session.current_id(), before);
    assert_eq!(session.started_at(), t0);
}

#[test]
fn test_rotation_exactly_at_ttl() {
    let t0 = epoch();
    let mut session = SessionManager::starting_at("c", TimeDelta::hours(1), None, t0);
    assert!(session.tick(t0 + TimeDelta::hours(1)));
}

#[test]
fn test_rotation_resets_window() {
    let t0 = epoch();
    let mut session = SessionManager::starting_at("c", TimeDelta::hours(1), None, t0);
    let t1 = t0 + TimeDelta::seconds(3700);
    assert!(session.tick(t1));
    let rotated = session.current_id().to_string();

    assert!(!session.tick(t1 + TimeDelta::seconds(1800)));
    assert_eq!(session.current_id(), rotated);
}

#[test]
fn test_clock_skew_does_not_rotate() {
    let t0 = epoch();
    let mut session = SessionManager::starting_at("c", TimeDelta::hours(1), None, t0);
    assert!(!session.tick(t0 - TimeDelta::hours(5)));
}

#[test]
fn test_zero_ttl_disables_rotation() {
    let t0 = epoch();
    let mut session = SessionManager::starting_at("c", TimeDelta::zero(), None, t0);
    let before = session.current_id().to_string();
    assert!(!session.tick(t0 + TimeDelta::days(365)));
    assert_eq!(session.current_id(), before);
}

#[test]
fn test_fixed_session_id_then_rotates() {
    let t0 = epoch();
    let mut session =
        SessionManager::starting_at("c", TimeDelta::hours(1), Some("field-trial-7".into()), t0);
    assert_eq!(session.current_id(), "field-trial-7");

    assert!(session.tick(t0 + TimeDelta::hours(2)));
    assert_ne!(session.current_id(), "field-trial-7");
}

#[test]
fn test_blank_fixed_session_id_is_ignored() {
    let session = SessionManager::starting_at("c", TimeDelta::hours(1), Some("  ".into()), epoch());
    assert!(uuid::Uuid::parse_str(session.current_id()).is_ok());
}
