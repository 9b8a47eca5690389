use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Session tokens live for seven days from issue.
pub const TOKEN_TTL_DAYS: i64 = 7;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TokenRecord {
    pub value: String,
    pub expiry: DateTime<Utc>,
}

impl TokenRecord {
    pub fn issue(value: &str, now: DateTime<Utc>) -> Self {
        Self {
            value: value.to_string(),
            expiry: now + Duration::days(TOKEN_TTL_DAYS),
        }
    }

    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        now <= self.expiry
    }
}

pub fn store_token(path: &Path, value: &str, now: DateTime<Utc>) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("failed to create token directory: {e}"))?;
    }
    let record = TokenRecord::issue(value, now);
    let contents = serde_json::to_string(&record)
        .map_err(|e| format!("failed to encode token record: {e}"))?;
    std::fs::write(path, contents)
        .map_err(|e| format!("failed to write token file '{}': {e}", path.display()))
}

/// Loads the stored token if it is still current. An expired record is
/// deleted on sight so a later check does not see it again.
pub fn load_valid_token(path: &Path, now: DateTime<Utc>) -> Option<TokenRecord> {
    let contents = std::fs::read_to_string(path).ok()?;
    let record: TokenRecord = serde_json::from_str(&contents).ok()?;
    if record.is_valid(now) {
        Some(record)
    } else {
        let _ = std::fs::remove_file(path);
        None
    }
}

pub fn token_valid(path: &Path, now: DateTime<Utc>) -> bool {
    load_valid_token(path, now).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn scratch_path(name: &str) -> std::path::PathBuf {
        env::temp_dir().join(format!("asphaleia-token-{name}-{}", std::process::id()))
    }

    #[test]
    fn token_expires_after_seven_days() {
        let issued = Utc::now();
        let record = TokenRecord::issue("abc123", issued);
        assert!(record.is_valid(issued));
        assert!(record.is_valid(issued + Duration::days(7)));
        assert!(!record.is_valid(issued + Duration::days(7) + Duration::seconds(1)));
    }

    #[test]
    fn expired_token_file_is_removed_on_check() {
        let path = scratch_path("expired");
        let issued = Utc::now() - Duration::days(30);
        store_token(&path, "stale", issued).unwrap();

        assert!(!token_valid(&path, Utc::now()));
        assert!(!path.exists());
    }

    #[test]
    fn current_token_round_trips() {
        let path = scratch_path("fresh");
        let now = Utc::now();
        store_token(&path, "tok-1", now).unwrap();

        let loaded = load_valid_token(&path, now).unwrap();
        assert_eq!(loaded.value, "tok-1");
        let _ = std::fs::remove_file(&path);
    }
}
