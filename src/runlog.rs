//! Run log of build and check outcomes
//!
//! Appends JSON lines to `<state dir>/kiln/runs.log`. Disabled with
//! `general.run_log = false`. A failing write never fails the run.

use crate::config::{Config, ConfigManager};
use chrono::Utc;
use serde::Serialize;
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// Appends run events as JSON lines
pub struct RunLog {
    enabled: bool,
    path: PathBuf,
}

impl RunLog {
    /// Create a run log from config
    pub fn new(config: &Config) -> Self {
        Self {
            enabled: config.general.run_log,
            path: ConfigManager::run_log_path(),
        }
    }

    /// Record one event with a serializable payload
    pub async fn record<T: Serialize>(&self, event: &str, data: &T) {
        if !self.enabled {
            return;
        }

        let entry = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "event": event,
            "data": data,
        });

        let mut line = match serde_json::to_string(&entry) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to serialize run event {}: {}", event, e);
                return;
            }
        };
        line.push('\n');

        if let Err(e) = self.append(&line).await {
            warn!("Failed to write run log {}: {}", self.path.display(), e);
        }
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn run_log(dir: &TempDir, enabled: bool) -> RunLog {
        RunLog {
            enabled,
            path: dir.path().join("state").join("runs.log"),
        }
    }

    #[tokio::test]
    async fn records_events_as_json_lines() {
        let dir = TempDir::new().unwrap();
        let log = run_log(&dir, true);

        log.record("build.completed", &serde_json::json!({"package": "mjl", "cache_hit": false}))
            .await;
        log.record("check.completed", &serde_json::json!({"check": "fmt", "passed": true}))
            .await;

        let content = tokio::fs::read_to_string(&log.path).await.unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "build.completed");
        assert_eq!(lines[0]["data"]["package"], "mjl");
        assert_eq!(lines[1]["data"]["check"], "fmt");
        assert!(lines[1]["timestamp"].is_string());
    }

    #[tokio::test]
    async fn disabled_log_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let log = run_log(&dir, false);

        log.record("check.completed", &serde_json::json!({})).await;

        assert!(!log.path.exists());
    }
}
