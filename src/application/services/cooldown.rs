//! Per-user, per-command cooldowns

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use crate::domain::entities::UserId;

/// Remembers when each user last ran each command
pub struct CooldownTracker {
    last_used: Mutex<HashMap<(UserId, String), Instant>>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self {
            last_used: Mutex::new(HashMap::new()),
        }
    }

    /// Record a use if the cooldown has passed, otherwise return the time left
    pub fn check(&self, user: &UserId, command: &str, cooldown: Duration) -> Result<(), Duration> {
        if cooldown.is_zero() {
            return Ok(());
        }
        let mut last_used = self.last_used.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        let key = (user.clone(), command.to_string());

        if let Some(&at) = last_used.get(&key) {
            let elapsed = now.saturating_duration_since(at);
            if elapsed < cooldown {
                return Err(cooldown - elapsed);
            }
        }
        last_used.insert(key, now);
        Ok(())
    }

    /// Forget entries older than `max_age`
    pub fn prune(&self, max_age: Duration) {
        let now = Instant::now();
        self.last_used
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|_, at| now.saturating_duration_since(*at) < max_age);
    }
}

impl Default for CooldownTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_window() {
        let tracker = CooldownTracker::new();
        let user = UserId::new("u1");
        let window = Duration::from_secs(5);

        assert!(tracker.check(&user, "admin", window).is_ok());
        let left = tracker.check(&user, "admin", window).unwrap_err();
        assert_eq!(left, window);

        // Other commands and other users are independent
        assert!(tracker.check(&user, "help", window).is_ok());
        assert!(tracker.check(&UserId::new("u2"), "admin", window).is_ok());

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(tracker.check(&user, "admin", window).is_ok());
    }

    #[test]
    fn test_zero_cooldown_never_blocks() {
        let tracker = CooldownTracker::new();
        let user = UserId::new("u1");
        assert!(tracker.check(&user, "ping", Duration::ZERO).is_ok());
        assert!(tracker.check(&user, "ping", Duration::ZERO).is_ok());
    }
}
