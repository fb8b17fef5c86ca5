// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One user's conversational scope. Live while the gap since last access is
/// below the configured timeout; a stale session is replaced, never revived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub last_access: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: format!("session-{}-{}", user_id, now.timestamp()),
            last_access: now,
        }
    }

    pub fn is_live(&self, now: DateTime<Utc>, timeout_secs: u64) -> bool {
        now - self.last_access < Duration::seconds(timeout_secs as i64)
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_access = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_embeds_user_and_timestamp() {
        let now = Utc::now();
        let session = Session::new("u1", now);
        assert_eq!(session.id, format!("session-u1-{}", now.timestamp()));
    }

    #[test]
    fn liveness_window_is_strict() {
        let now = Utc::now();
        let session = Session::new("u1", now);
        assert!(session.is_live(now + Duration::seconds(3599), 3600));
        assert!(!session.is_live(now + Duration::seconds(3600), 3600));
    }
}
