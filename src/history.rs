use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::RunError;

pub const DEFAULT_HISTORY_FILE: &str = "alert_history.json";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertHistory {
    entries: BTreeMap<String, DateTime<Utc>>,
}

impl AlertHistory {
    pub fn last_alert(&self, id: &str) -> Option<DateTime<Utc>> {
        self.entries.get(id).copied()
    }

    pub fn insert(&mut self, id: &str, at: DateTime<Utc>) {
        self.entries.insert(id.to_string(), at);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .entries
            .iter()
            .map(|(id, at)| {
                let stamp = at
                    .with_timezone(&Local)
                    .to_rfc3339_opts(SecondsFormat::AutoSi, false);
                (id.clone(), Value::String(stamp))
            })
            .collect();
        Value::Object(map)
    }

    fn from_json(value: Value) -> Result<Self, String> {
        let Value::Object(map) = value else {
            return Err("top-level value is not an object".to_string());
        };

        let mut entries = BTreeMap::new();
        for (id, raw) in map {
            let Value::String(stamp) = raw else {
                return Err(format!("entry {id:?} is not a timestamp string"));
            };
            let at = parse_timestamp(&stamp)
                .ok_or_else(|| format!("entry {id:?} has unreadable timestamp {stamp:?}"))?;
            entries.insert(id, at);
        }
        Ok(Self { entries })
    }
}

/// Accepts RFC 3339 with any offset, or a naive timestamp taken as host-local
/// time (the format older history files use).
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|at| at.with_timezone(&Utc))
}

#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file means no alerts were ever sent.
    pub fn load(&self) -> Result<AlertHistory, RunError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No alert history at {:?}, starting empty", self.path);
                return Ok(AlertHistory::default());
            }
            Err(source) => {
                return Err(RunError::HistoryReadError {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let value: Value =
            serde_json::from_str(&contents).map_err(|e| self.corrupt(e.to_string()))?;
        AlertHistory::from_json(value).map_err(|reason| self.corrupt(reason))
    }

    /// Write-to-temp then rename, so readers never see a half-written file.
    pub fn save(&self, history: &AlertHistory) -> Result<(), RunError> {
        let json = serde_json::to_string_pretty(&history.to_json())
            .map_err(|e| self.write_error(std::io::Error::new(ErrorKind::InvalidData, e)))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.write_error(e))?;
            }
        }

        let temp_path = self.temp_path();
        let mut temp_file = File::create(&temp_path).map_err(|e| self.write_error(e))?;
        let written = temp_file
            .write_all(json.as_bytes())
            .and_then(|()| temp_file.sync_all())
            .and_then(|()| fs::rename(&temp_path, &self.path));
        if let Err(e) = written {
            drop(temp_file);
            if let Err(cleanup) = fs::remove_file(&temp_path) {
                debug!("Could not remove {:?}: {}", temp_path, cleanup);
            }
            return Err(self.write_error(e));
        }

        debug!("Saved {} history entries to {:?}", history.len(), self.path);
        Ok(())
    }

    /// Sibling of the target with `.tmp` appended to the whole file name.
    fn temp_path(&self) -> PathBuf {
        let mut name: OsString = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn corrupt(&self, reason: String) -> RunError {
        RunError::HistoryCorrupt {
            path: self.path.clone(),
            reason,
        }
    }

    fn write_error(&self, source: std::io::Error) -> RunError {
        RunError::HistoryWriteError {
            path: self.path.clone(),
            source,
        }
    }
}
