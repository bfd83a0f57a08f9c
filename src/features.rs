//! The per-frame contract between the perception layer and the engine.
//!
//! The perception layer owns landmark extraction; everything the engine
//! needs from a video frame arrives as one immutable `FrameFeatures` value.
//! Missing optional fields simply fail the checks that need them, they never
//! error.

use serde::{Deserialize, Serialize};

use crate::config::ExerciseConfig;

/// Joint-angle proxies in degrees, as estimated by the perception layer.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct JointAngles {
    pub elbow_deg: f32,
    pub shoulder_flexion_deg: f32,
    pub shoulder_abduction_deg: f32,
    pub wrist_extension_proxy_deg: f32,
}

/// Detector confidence in [0,1] for the body and hand models.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DetectionConfidence {
    pub pose: f32,
    pub hand: f32,
}

/// One processed video frame's worth of measurements.
///
/// `wrist_x`/`wrist_y` are meaningless when `hand_ok` is false. The zone
/// flags are precomputed upstream against the zones current at capture time;
/// `with_zone_flags` recomputes them against a live config so recorded
/// streams compose with later zone edits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameFeatures {
    pub pose_ok: bool,
    pub hand_ok: bool,
    pub wrist_x: f32,
    pub wrist_y: f32,
    /// Normalized thumb-tip to index-tip distance, the grip proxy.
    pub pinch_dist: f32,
    /// Debounced "is holding an object" signal, see [`GripDebouncer`].
    pub grip: bool,
    pub in_start_zone: bool,
    pub in_end_zone: bool,
    #[serde(default)]
    pub shoulder_center_x: Option<f32>,
    #[serde(default)]
    pub shoulder_width: Option<f32>,
    #[serde(default)]
    pub angles: JointAngles,
    #[serde(default)]
    pub confidence: DetectionConfidence,
}

impl Default for FrameFeatures {
    fn default() -> Self {
        Self {
            pose_ok: false,
            hand_ok: false,
            wrist_x: 0.0,
            wrist_y: 0.0,
            pinch_dist: 1.0,
            grip: false,
            in_start_zone: false,
            in_end_zone: false,
            shoulder_center_x: None,
            shoulder_width: None,
            angles: JointAngles::default(),
            confidence: DetectionConfidence::default(),
        }
    }
}

impl FrameFeatures {
    /// Recompute the zone flags from the wrist point and the live config.
    pub fn with_zone_flags(mut self, config: &ExerciseConfig) -> Self {
        self.in_start_zone = config.start_zone.contains(self.wrist_x, self.wrist_y);
        self.in_end_zone = config.end_zone.contains(self.wrist_x, self.wrist_y);
        self
    }
}

/// Hysteresis debounce for the pinch-distance grip proxy.
///
/// Engages below the hold threshold, releases above the release threshold,
/// and holds its previous value inside the dead band so the signal cannot
/// flicker at a boundary.
#[derive(Debug, Clone, Copy, Default)]
pub struct GripDebouncer {
    engaged: bool,
}

impl GripDebouncer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, pinch_dist: f32, config: &ExerciseConfig) -> bool {
        if pinch_dist < config.grip_hold_threshold {
            self.engaged = true;
        } else if pinch_dist > config.grip_release_threshold {
            self.engaged = false;
        }
        self.engaged
    }

    pub fn engaged(&self) -> bool {
        self.engaged
    }
}
