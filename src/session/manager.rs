use chrono::{DateTime, TimeDelta, Utc};
use tracing::info;
use uuid::Uuid;

/// Stable session identity with time-based rotation.
///
/// `client_id` lives as long as the process. `session_id` is an opaque
/// UUID v4 string that only changes through [`SessionManager::tick`] once
/// `ttl` has elapsed since `started_at`. A zero TTL disables rotation.
#[derive(Debug, Clone)]
pub struct SessionManager {
    client_id: String,
    session_id: String,
    started_at: DateTime<Utc>,
    ttl: TimeDelta,
}

impl SessionManager {
    pub fn new(client_id: impl Into<String>, ttl: TimeDelta) -> Self {
        Self::starting_at(client_id, ttl, None, Utc::now())
    }

    /// Builds a session that began at `started_at`, optionally with a
    /// caller-chosen first session id.
    pub fn starting_at(
        client_id: impl Into<String>,
        ttl: TimeDelta,
        fixed_session_id: Option<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let session_id = fixed_session_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(new_session_id);

        Self {
            client_id: client_id.into(),
            session_id,
            started_at,
            ttl,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn current_id(&self) -> &str {
        &self.session_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Rotates the session id when `now - started_at >= ttl`.
    ///
    /// Returns `true` if a rotation happened. Clock skew that puts `now`
    /// before `started_at` never rotates.
    pub fn tick(&mut self, now: DateTime<Utc>) -> bool {
        if self.ttl <= TimeDelta::zero() {
            return false;
        }

        if now.signed_duration_since(self.started_at) < self.ttl {
            return false;
        }

        let previous = std::mem::replace(&mut self.session_id, new_session_id());
        self.started_at = now;
        info!(
            client_id = %self.client_id,
            previous = %previous,
            current = %self.session_id,
            "Rotated session_id after TTL"
        );
        true
    }
}

fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}
