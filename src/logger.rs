use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;

/// How refresh results are written to the message log.
#[derive(Debug, Clone, Copy)]
pub enum MessageLogMode {
    /// Every successful refresh logs the full snapshot.
    Full,
    /// First refresh per kind logs the full snapshot, later ones only the
    /// fields that changed.
    Diffed,
}

/// Append-only NDJSON log of gateway traffic: refresh outcomes per device
/// kind and the commands forwarded to the gateway. One logger is shared by
/// all coordinators of an integration instance.
pub struct MessageLogger {
    mode: MessageLogMode,
    file: File,
    previous: HashMap<String, Value>,
}

impl MessageLogger {
    pub fn new(mode: MessageLogMode, path: &str) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            mode,
            file,
            previous: HashMap::new(),
        })
    }

    pub fn log_refresh(&mut self, kind: &str, body: &Value) {
        match self.mode {
            MessageLogMode::Full => {
                let entry = json!({
                    "ts": Utc::now().to_rfc3339(),
                    "dir": "refresh",
                    "kind": kind,
                    "body": body,
                });
                self.write_line(&entry);
            }
            MessageLogMode::Diffed => {
                let entry = match self.previous.get(kind) {
                    None => json!({
                        "ts": Utc::now().to_rfc3339(),
                        "dir": "refresh",
                        "kind": kind,
                        "full": true,
                        "body": body,
                    }),
                    Some(previous) => {
                        let changes: Vec<Value> = diff_snapshots(previous, body)
                            .into_iter()
                            .map(|c| json!({ "path": c.path, "old": c.old, "new": c.new }))
                            .collect();
                        json!({
                            "ts": Utc::now().to_rfc3339(),
                            "dir": "refresh",
                            "kind": kind,
                            "changes": changes,
                        })
                    }
                };
                self.write_line(&entry);
                self.previous.insert(kind.to_string(), body.clone());
            }
        }
    }

    pub fn log_refresh_error(&mut self, kind: &str, error: &str) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "refresh",
            "kind": kind,
            "error": error,
        });
        self.write_line(&entry);
    }

    pub fn log_command(&mut self, action: &str, device_id: &str, body: &Value) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "cmd",
            "action": action,
            "device": device_id,
            "body": body,
        });
        self.write_line(&entry);
    }

    fn write_line(&mut self, entry: &Value) {
        if let Ok(line) = serde_json::to_string(entry)
            && let Err(e) = writeln!(self.file, "{line}")
        {
            warn!("failed to write log entry: {e}");
        }
    }
}

#[derive(Debug, PartialEq)]
pub(crate) struct Change {
    pub path: String,
    pub old: Value,
    pub new: Value,
}

/// Leaf-level differences between two JSON-encoded snapshots, as dotted
/// paths. Keys only present in `previous` are ignored; device ids never
/// leave a snapshot mid-run.
pub(crate) fn diff_snapshots(previous: &Value, current: &Value) -> Vec<Change> {
    let mut changes = Vec::new();
    walk(previous, current, "", &mut changes);
    changes
}

fn walk(previous: &Value, current: &Value, prefix: &str, changes: &mut Vec<Change>) {
    match (previous, current) {
        (Value::Object(prev_map), Value::Object(curr_map)) => {
            for (key, curr_val) in curr_map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                let prev_val = prev_map.get(key).unwrap_or(&Value::Null);
                walk(prev_val, curr_val, &path, changes);
            }
        }
        (prev, curr) if prev != curr => changes.push(Change {
            path: prefix.to_string(),
            old: prev.clone(),
            new: curr.clone(),
        }),
        _ => {}
    }
}
