use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// Attendance settings. The only tunable today is the cutoff after
/// which an entry counts as late.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    pub late_threshold: String,
}

/// Normalizes a threshold to zero-padded `HH:MM`. Accepts the sloppy
/// values the server has been known to hand back ("8:5", "08:05:00").
pub fn normalize_threshold(value: &str) -> Option<String> {
    let raw = value.trim();
    let candidate = raw.splitn(3, ':').take(2).collect::<Vec<_>>().join(":");
    let parsed = NaiveTime::parse_from_str(&candidate, "%H:%M").ok()?;
    Some(parsed.format("%H:%M").to_string())
}

impl Settings {
    pub fn new(late_threshold: &str) -> Option<Self> {
        Some(Self {
            late_threshold: normalize_threshold(late_threshold)?,
        })
    }

    /// Reads the settings payload off the envelope. The server has
    /// shipped both `{late_threshold}` and a name/value array with a
    /// `late_time_threshold` entry; accept either.
    pub fn from_wire(value: &serde_json::Value) -> Option<Self> {
        if let Some(threshold) = value.get("late_threshold").and_then(|v| v.as_str()) {
            return Self::new(threshold);
        }
        if let Some(entries) = value.as_array() {
            for entry in entries {
                let name = entry.get("name").and_then(|v| v.as_str());
                if name == Some("late_time_threshold") {
                    let threshold = entry.get("value").and_then(|v| v.as_str())?;
                    return Self::new(threshold);
                }
            }
        }
        None
    }

    pub fn to_wire(&self) -> serde_json::Value {
        serde_json::json!({ "late_threshold": self.late_threshold })
    }
}
