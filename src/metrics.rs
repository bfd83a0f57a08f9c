//! Per-repetition kinematic samples and session-level statistics.
//!
//! The collector is driven synchronously by the session state machine and
//! takes every timestamp as an argument, so it stays deterministic under a
//! manual clock. All the division-by-zero paths default to 0 rather than
//! producing NaN.

use chrono::{DateTime, Local};
use itertools::Itertools;
use serde::Serialize;

use crate::config::{ExerciseConfig, ExerciseMode, Hand};
use crate::features::FrameFeatures;
use crate::util::{mean, std_dev};

/// Samples taken earlier than this after a rep starts are discarded; the
/// pickup transition itself is too noisy to score.
pub const SAMPLE_SETTLE_MS: u64 = 50;

#[derive(Debug, Clone, Copy)]
struct AngleSample {
    elbow_deg: f32,
    shoulder_flexion_deg: f32,
    shoulder_abduction_deg: f32,
}

/// Kinematics of one counted repetition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PerRepMetrics {
    /// 1-based repetition index.
    pub index: u32,
    pub started_at_ms: u64,
    pub completed_at_ms: u64,
    pub duration_ms: u64,
    pub max_elbow_extension_deg: f32,
    pub avg_elbow_extension_deg: f32,
    pub max_shoulder_flexion_deg: f32,
    pub max_shoulder_abduction_deg: f32,
}

/// Aggregate range of motion for one angle category across the session.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct RangeOfMotion {
    pub max_deg: f32,
    pub avg_deg: f32,
}

/// Everything the caller needs to persist about a finished (or stopped)
/// session. Produced on demand; elapsed time runs from session start to the
/// moment of the call, not to the last repetition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub exercise_id: String,
    pub hand: Hand,
    pub duration_secs: f64,
    pub rep_count: u32,
    pub reps_per_minute: f64,
    pub avg_rep_secs: f64,
    pub min_rep_secs: f64,
    pub max_rep_secs: f64,
    pub rep_time_std_dev_secs: f64,
    /// Set once, the first time the target count is reached; never
    /// overwritten. Absent in timed mode.
    pub time_to_target_reps_secs: Option<f64>,
    pub elbow_extension: RangeOfMotion,
    pub shoulder_flexion: RangeOfMotion,
    pub shoulder_abduction: RangeOfMotion,
    pub recorded_at: DateTime<Local>,
}

#[derive(Debug)]
pub struct MetricsCollector {
    exercise_id: String,
    hand: Hand,
    target_reps: Option<u32>,
    session_start_ms: Option<u64>,
    rep_start_ms: Option<u64>,
    samples: Vec<AngleSample>,
    reps: Vec<PerRepMetrics>,
    time_to_target_reps_secs: Option<f64>,
}

impl MetricsCollector {
    pub fn new(config: &ExerciseConfig) -> Self {
        let target_reps = match config.mode {
            ExerciseMode::TargetReps { target } if target > 0 => Some(target),
            _ => None,
        };
        Self {
            exercise_id: config.exercise_id.clone(),
            hand: config.hand,
            target_reps,
            session_start_ms: None,
            rep_start_ms: None,
            samples: Vec::new(),
            reps: Vec::new(),
            time_to_target_reps_secs: None,
        }
    }

    /// Reset all counters and record the session start time.
    pub fn start(&mut self, now_ms: u64) {
        self.session_start_ms = Some(now_ms);
        self.rep_start_ms = None;
        self.samples.clear();
        self.reps.clear();
        self.time_to_target_reps_secs = None;
    }

    pub fn record_rep_start(&mut self, now_ms: u64) {
        self.rep_start_ms = Some(now_ms);
        self.samples.clear();
    }

    /// Buffer one angle sample, unless the repetition just started.
    pub fn add_angle_sample(&mut self, features: &FrameFeatures, now_ms: u64) {
        let started = match self.rep_start_ms {
            Some(t) => t,
            None => return,
        };
        if now_ms.saturating_sub(started) < SAMPLE_SETTLE_MS {
            return;
        }
        self.samples.push(AngleSample {
            elbow_deg: features.angles.elbow_deg,
            shoulder_flexion_deg: features.angles.shoulder_flexion_deg,
            shoulder_abduction_deg: features.angles.shoulder_abduction_deg,
        });
    }

    /// Close out the in-flight repetition and append its record.
    pub fn record_rep_complete(&mut self, now_ms: u64) {
        let started_at_ms = self.rep_start_ms.take().unwrap_or(now_ms);

        let elbow: Vec<f64> = self.samples.iter().map(|s| s.elbow_deg as f64).collect();
        let max_elbow = fold_max(self.samples.iter().map(|s| s.elbow_deg));
        let max_flexion = fold_max(self.samples.iter().map(|s| s.shoulder_flexion_deg));
        let max_abduction = fold_max(self.samples.iter().map(|s| s.shoulder_abduction_deg));

        self.reps.push(PerRepMetrics {
            index: self.reps.len() as u32 + 1,
            started_at_ms,
            completed_at_ms: now_ms,
            duration_ms: now_ms.saturating_sub(started_at_ms),
            max_elbow_extension_deg: max_elbow,
            avg_elbow_extension_deg: mean(&elbow).unwrap_or(0.0) as f32,
            max_shoulder_flexion_deg: max_flexion,
            max_shoulder_abduction_deg: max_abduction,
        });
        self.samples.clear();

        if let Some(target) = self.target_reps {
            if self.reps.len() as u32 >= target && self.time_to_target_reps_secs.is_none() {
                let start = self.session_start_ms.unwrap_or(now_ms);
                self.time_to_target_reps_secs = Some(now_ms.saturating_sub(start) as f64 / 1000.0);
            }
        }
    }

    pub fn rep_count(&self) -> u32 {
        self.reps.len() as u32
    }

    pub fn rep_records(&self) -> &[PerRepMetrics] {
        &self.reps
    }

    pub fn summary(&self, now_ms: u64) -> SessionSummary {
        let start = self.session_start_ms.unwrap_or(now_ms);
        let elapsed_secs = now_ms.saturating_sub(start) as f64 / 1000.0;

        let durations: Vec<f64> = self
            .reps
            .iter()
            .map(|r| r.duration_ms as f64 / 1000.0)
            .collect();
        let (min_rep_secs, max_rep_secs) = durations
            .iter()
            .cloned()
            .minmax()
            .into_option()
            .unwrap_or((0.0, 0.0));

        let reps_per_minute = if elapsed_secs > 0.0 {
            self.reps.len() as f64 / elapsed_secs * 60.0
        } else {
            0.0
        };

        SessionSummary {
            exercise_id: self.exercise_id.clone(),
            hand: self.hand,
            duration_secs: elapsed_secs,
            rep_count: self.reps.len() as u32,
            reps_per_minute,
            avg_rep_secs: mean(&durations).unwrap_or(0.0),
            min_rep_secs,
            max_rep_secs,
            rep_time_std_dev_secs: std_dev(&durations).unwrap_or(0.0),
            time_to_target_reps_secs: self.time_to_target_reps_secs,
            elbow_extension: self.range_of_motion(|r| r.max_elbow_extension_deg),
            shoulder_flexion: self.range_of_motion(|r| r.max_shoulder_flexion_deg),
            shoulder_abduction: self.range_of_motion(|r| r.max_shoulder_abduction_deg),
            recorded_at: Local::now(),
        }
    }

    /// Session max is the peak over per-rep maxima, session avg the mean of
    /// per-rep maxima (the peak reached each rep is the number therapists
    /// track).
    fn range_of_motion<F: Fn(&PerRepMetrics) -> f32>(&self, pick: F) -> RangeOfMotion {
        let peaks: Vec<f64> = self.reps.iter().map(|r| pick(r) as f64).collect();
        RangeOfMotion {
            max_deg: fold_max(self.reps.iter().map(&pick)),
            avg_deg: mean(&peaks).unwrap_or(0.0) as f32,
        }
    }
}

fn fold_max<I: Iterator<Item = f32>>(values: I) -> f32 {
    values.fold(0.0_f32, f32::max)
}
