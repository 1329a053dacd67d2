//! CSV persistence of the generated task list.
//!
//! Writes `pending_simulated_list.csv` (columns `type,settings,regular`,
//! settings cell holding the JSON-serialized settings object) plus a
//! `manifest.json` run summary next to it.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::task::AlphaTask;

/// CSV file name consumed by the downstream submitter.
const PENDING_TASKS_FILE: &str = "pending_simulated_list.csv";

/// Run summary written next to the CSV.
const MANIFEST_FILE: &str = "manifest.json";

/// Run information recorded in the manifest.
pub struct ManifestInfo {
    pub generated_at: DateTime<Utc>,
    pub dataset: Option<String>,
    pub search: Option<String>,
    pub field_count: usize,
}

/// JSON structure written to manifest.json.
#[derive(Serialize)]
struct ManifestJson {
    generated_at: String,
    dataset: Option<String>,
    search: Option<String>,
    field_count: usize,
    task_count: usize,
    output_file: String,
}

/// Writes the generated task list and run manifest.
pub struct TaskWriter {
    output_dir: PathBuf,
}

impl TaskWriter {
    /// Creates a writer, creating the output directory if needed.
    pub fn new(output_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&output_dir)
            .with_context(|| format!("Failed to create output directory: {:?}", output_dir))?;
        Ok(Self { output_dir })
    }

    /// Writes the task list; returns the CSV path.
    pub fn write_tasks(&self, tasks: &[AlphaTask]) -> Result<PathBuf> {
        let path = self.output_dir.join(PENDING_TASKS_FILE);
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("Failed to open CSV file: {:?}", path))?;

        writer.write_record(["type", "settings", "regular"])?;
        for task in tasks {
            let settings = serde_json::to_string(&task.settings)
                .context("Failed to serialize task settings")?;
            writer.write_record([task.task_type.as_str(), settings.as_str(), task.regular.as_str()])?;
        }
        writer.flush()?;

        info!(tasks = tasks.len(), path = %path.display(), "wrote pending task list");
        Ok(path)
    }

    /// Writes the run manifest; returns its path.
    pub fn write_manifest(&self, run: &ManifestInfo, task_count: usize) -> Result<PathBuf> {
        let manifest = ManifestJson {
            generated_at: run.generated_at.to_rfc3339(),
            dataset: run.dataset.clone(),
            search: run.search.clone(),
            field_count: run.field_count,
            task_count,
            output_file: PENDING_TASKS_FILE.to_string(),
        };

        let path = self.output_dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(&manifest)?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write manifest: {:?}", path))?;
        Ok(path)
    }
}
