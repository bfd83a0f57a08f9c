//! CSV export of session results.
//!
//! Two shapes: a one-row-per-session summary log that accumulates across
//! sessions (header written only when the file is new), and a full
//! per-repetition table written per session. Persistence of results is the
//! caller's business; these helpers exist for the CLI and for hosts that
//! want a flat file.

use std::fs::OpenOptions;
use std::path::Path;

use chrono::Local;

use crate::metrics::{PerRepMetrics, SessionSummary};

/// Append one summary row, emitting the header on first write.
pub fn append_summary<P: AsRef<Path>>(path: P, summary: &SessionSummary) -> csv::Result<()> {
    let path = path.as_ref();
    let needs_header = !path.exists();

    let file = OpenOptions::new().append(true).create(true).open(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);

    if needs_header {
        writer.write_record([
            "date",
            "exercise_id",
            "hand",
            "duration_secs",
            "rep_count",
            "reps_per_minute",
            "avg_rep_secs",
            "min_rep_secs",
            "max_rep_secs",
            "rep_time_std_dev_secs",
            "time_to_target_secs",
        ])?;
    }

    writer.write_record([
        Local::now().format("%c").to_string(),
        summary.exercise_id.clone(),
        summary.hand.to_string(),
        format!("{:.2}", summary.duration_secs),
        summary.rep_count.to_string(),
        format!("{:.2}", summary.reps_per_minute),
        format!("{:.2}", summary.avg_rep_secs),
        format!("{:.2}", summary.min_rep_secs),
        format!("{:.2}", summary.max_rep_secs),
        format!("{:.2}", summary.rep_time_std_dev_secs),
        summary
            .time_to_target_reps_secs
            .map_or(String::new(), |s| format!("{:.2}", s)),
    ])?;
    writer.flush()?;
    Ok(())
}

/// Write the per-repetition table for one session, replacing the file.
pub fn write_rep_details<P: AsRef<Path>>(path: P, reps: &[PerRepMetrics]) -> csv::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "index",
        "started_at_ms",
        "completed_at_ms",
        "duration_ms",
        "max_elbow_extension_deg",
        "avg_elbow_extension_deg",
        "max_shoulder_flexion_deg",
        "max_shoulder_abduction_deg",
    ])?;
    for rep in reps {
        writer.write_record([
            rep.index.to_string(),
            rep.started_at_ms.to_string(),
            rep.completed_at_ms.to_string(),
            rep.duration_ms.to_string(),
            format!("{:.1}", rep.max_elbow_extension_deg),
            format!("{:.1}", rep.avg_elbow_extension_deg),
            format!("{:.1}", rep.max_shoulder_flexion_deg),
            format!("{:.1}", rep.max_shoulder_abduction_deg),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
