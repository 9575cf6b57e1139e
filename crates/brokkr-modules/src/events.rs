//! Installation journal
//!
//! Append-only JSONL record of module lifecycle events, one envelope per
//! line. Appends take an exclusive file lock and fsync so concurrent
//! writers and crashes cannot interleave or lose lines. Journal writes are
//! observability only: the installer treats failures as warnings and never
//! lets them affect reconciliation.

use anyhow::{Context, Result};
use brokkr_core::ModuleVersionId;
use chrono::{DateTime, Utc};
use fs4::fs_std::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use uuid::Uuid;

/// One module lifecycle event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModuleEvent {
    InstallCompleted {
        restart_required: bool,
    },
    InstallFailed {
        error: String,
    },
    UpdateCompleted {
        previous_version: String,
        restart_required: bool,
    },
    UpdateFailed {
        previous_version: String,
        error: String,
    },
    UninstallCompleted,
    UninstallFailed {
        error: String,
    },
    /// A finish action failed and was left for the next pass
    FinishActionDeferred {
        action: String,
        error: String,
    },
    /// The module's token was destroyed by a token reset
    TokenReset,
}

/// Journal line: an event plus identity and timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: Uuid,
    pub module_name: String,
    pub module_version: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: ModuleEvent,
}

impl EventEnvelope {
    pub fn new(module: &ModuleVersionId, event: ModuleEvent) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            module_name: module.name.clone(),
            module_version: module.version.to_string(),
            timestamp: Utc::now(),
            event,
        }
    }
}

/// Append-only journal backed by a JSONL file
pub struct InstallationJournal {
    journal_path: PathBuf,
}

impl InstallationJournal {
    pub fn new(journal_path: PathBuf) -> Self {
        Self { journal_path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.journal_path
    }

    /// Append an event (atomic, file-locked, fsynced)
    pub fn record(&self, envelope: EventEnvelope) -> Result<()> {
        if let Some(parent) = self.journal_path.parent() {
            fs::create_dir_all(parent).context("Failed to create journal parent directory")?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.journal_path)
            .context("Failed to open journal file")?;

        // Exclusive lock, released on drop
        file.lock_exclusive()
            .context("Failed to acquire exclusive lock on journal")?;

        let line = serde_json::to_string(&envelope).context("Failed to serialize event")?;
        writeln!(file, "{}", line).context("Failed to write event to journal")?;
        file.sync_all().context("Failed to sync journal file")?;

        Ok(())
    }

    /// All events in append order
    pub fn events(&self) -> Result<Vec<EventEnvelope>> {
        if !self.journal_path.exists() {
            return Ok(Vec::new());
        }

        let file = fs::File::open(&self.journal_path).context("Failed to open journal file")?;
        let reader = BufReader::new(file);

        let mut events = Vec::new();
        for line in reader.lines() {
            let line = line.context("Failed to read line from journal")?;
            if line.trim().is_empty() {
                continue;
            }
            let envelope: EventEnvelope =
                serde_json::from_str(&line).context("Failed to deserialize journal event")?;
            events.push(envelope);
        }

        Ok(events)
    }

    /// Events for one module name, in append order
    pub fn module_history(&self, name: &str) -> Result<Vec<EventEnvelope>> {
        Ok(self
            .events()?
            .into_iter()
            .filter(|e| e.module_name == name)
            .collect())
    }
}
