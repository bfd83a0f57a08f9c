use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::geometry::NormalizedRect;

/// Which hand the perception layer tracks for this exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
pub enum Hand {
    Left,
    Right,
}

/// How a session ends on its own: after a fixed duration, or once a target
/// repetition count is reached.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ExerciseMode {
    Timed { duration_secs: f64 },
    TargetReps { target: u32 },
}

/// Immutable session parameters, except for the zones: the zone editor may
/// rewrite `start_zone`/`end_zone` at any time and the engine reads the live
/// values on every frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseConfig {
    pub exercise_id: String,
    pub hand: Hand,
    pub mode: ExerciseMode,
    pub start_zone: NormalizedRect,
    pub end_zone: NormalizedRect,
    pub min_pose_confidence: f32,
    pub min_hand_confidence: f32,
    /// Minimum time between two counted repetitions.
    pub rep_cooldown_ms: u64,
    /// Pinch distance below this engages the grip signal.
    pub grip_hold_threshold: f32,
    /// Pinch distance above this releases it; the gap is the hysteresis band.
    pub grip_release_threshold: f32,
}

impl Default for ExerciseConfig {
    fn default() -> Self {
        Self {
            exercise_id: "pick-and-place".to_string(),
            hand: Hand::Right,
            mode: ExerciseMode::TargetReps { target: 10 },
            start_zone: NormalizedRect::new(0.05, 0.55, 0.35, 0.95),
            end_zone: NormalizedRect::new(0.65, 0.55, 0.95, 0.95),
            min_pose_confidence: 0.5,
            min_hand_confidence: 0.5,
            rep_cooldown_ms: 800,
            grip_hold_threshold: 0.05,
            grip_release_threshold: 0.09,
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> ExerciseConfig;
    fn save(&self, cfg: &ExerciseConfig) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "reptrack") {
            pd.config_dir().join("exercise.json")
        } else {
            PathBuf::from("reptrack_exercise.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> ExerciseConfig {
        if let Ok(bytes) = fs::read(&self.path) {
            if let Ok(cfg) = serde_json::from_slice::<ExerciseConfig>(&bytes) {
                return cfg;
            }
        }
        ExerciseConfig::default()
    }

    fn save(&self, cfg: &ExerciseConfig) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).unwrap_or_default();
        fs::write(&self.path, data)
    }
}
