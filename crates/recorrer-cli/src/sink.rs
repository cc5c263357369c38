//! JSON-file snapshot sink.
//!
//! One results file per snapshot plus the raw coverage artifact in a
//! sibling file, laid out so an external report tool can pick the artifacts
//! up per run.

use chrono::Local;
use recorrer::{RecorrerResult, RunReport, Snapshot, SnapshotSink, Strategy};
use std::fs;
use std::path::{Path, PathBuf};

/// Run identifier: `YYYYmmdd-HHMMSS_<target>_<strategy>`
pub fn make_run_id(target: &str, strategy: Strategy) -> String {
    format!(
        "{}_{}_{}",
        Local::now().format("%Y%m%d-%H%M%S"),
        target,
        strategy
    )
}

/// Sink writing each snapshot into its own JSON file under one run directory
#[derive(Debug)]
pub struct JsonDirSink {
    dir: PathBuf,
    strategy: Strategy,
}

impl JsonDirSink {
    /// Create the run directory and the sink writing into it
    pub fn new(dir: PathBuf, strategy: Strategy) -> RecorrerResult<Self> {
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, strategy })
    }

    /// Directory the records land in
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the end-of-run report next to the snapshot records
    pub fn write_report(&self, report: &RunReport) -> RecorrerResult<()> {
        let path = self.dir.join("report.json");
        fs::write(&path, serde_json::to_vec_pretty(report)?)?;
        Ok(())
    }
}

impl SnapshotSink for JsonDirSink {
    fn record(&self, snapshot: &Snapshot) -> RecorrerResult<()> {
        let id = format!("snapshot_{:03}", snapshot.sequence);

        if let Some(artifact) = &snapshot.coverage_artifact {
            let path = self.dir.join(format!("{}_coverage_{id}.json", self.strategy));
            fs::write(&path, serde_json::to_vec_pretty(artifact)?)?;
        }

        // the artifact goes to its own file; keep the results record small
        let mut value = serde_json::to_value(snapshot)?;
        if let Some(record) = value.as_object_mut() {
            record.remove("coverageArtifact");
        }
        let path = self.dir.join(format!("{}_results_{id}.json", self.strategy));
        fs::write(&path, serde_json::to_vec_pretty(&value)?)?;
        Ok(())
    }
}
