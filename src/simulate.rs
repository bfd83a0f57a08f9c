//! Synthetic frame-stream generation.
//!
//! Produces the stream a well-behaved patient would generate on camera:
//! an alignment hold, then pickup-carry-drop cycles between the configured
//! zones, with seeded jitter on positions and confidences. Useful for
//! demoing the engine without a camera and for soak-testing the repetition
//! logic from the binary.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::ExerciseConfig;
use crate::features::{DetectionConfidence, FrameFeatures, GripDebouncer, JointAngles};
use crate::geometry;
use crate::session::{ALIGNMENT_FRAMES, ZONE_DWELL_FRAMES};

/// Shape of the synthesized session.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub reps: u32,
    pub seed: u64,
    /// Confirm repetitions purely by zone dwell (no pinch ever closes).
    pub by_dwell: bool,
    /// Frames spent travelling between the zones.
    pub carry_frames: u32,
    /// Idle frames between cycles; keeps cycles longer than the cooldown.
    pub rest_frames: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            reps: 3,
            seed: 7,
            by_dwell: false,
            carry_frames: 10,
            rest_frames: 10,
        }
    }
}

/// Generates one session's worth of `FrameFeatures`.
pub struct SessionSimulator {
    exercise: ExerciseConfig,
    sim: SimulationConfig,
    rng: StdRng,
    grip: GripDebouncer,
}

impl SessionSimulator {
    pub fn new(exercise: ExerciseConfig, sim: SimulationConfig) -> Self {
        let rng = StdRng::seed_from_u64(sim.seed);
        Self {
            exercise,
            sim,
            rng,
            grip: GripDebouncer::new(),
        }
    }

    pub fn generate(&mut self) -> Vec<FrameFeatures> {
        let mut frames = Vec::new();
        self.push_alignment(&mut frames);
        for _ in 0..self.sim.reps {
            self.push_rep_cycle(&mut frames);
        }
        // Trailing idle so the stream does not end mid-gesture.
        for _ in 0..self.sim.rest_frames {
            frames.push(self.frame_at(REST_POINT, self.open_pinch()));
        }
        frames
    }

    fn push_alignment(&mut self, frames: &mut Vec<FrameFeatures>) {
        for _ in 0..ALIGNMENT_FRAMES {
            frames.push(self.frame_at(REST_POINT, self.open_pinch()));
        }
    }

    fn push_rep_cycle(&mut self, frames: &mut Vec<FrameFeatures>) {
        let start = self.exercise.start_zone.center();
        let end = self.exercise.end_zone.center();
        let open = self.open_pinch();
        let closed = self.closed_pinch();

        // Approach the start zone with an open hand.
        for i in 0..4 {
            let t = (i + 1) as f32 / 4.0;
            frames.push(self.frame_at(lerp(REST_POINT, start, t), open));
        }

        if self.sim.by_dwell {
            // Sit in the start zone until dwell confirms the pickup.
            for _ in 0..ZONE_DWELL_FRAMES + 1 {
                frames.push(self.frame_at(start, open));
            }
        } else {
            for _ in 0..6 {
                frames.push(self.frame_at(start, closed));
            }
        }

        // Carry across to the end zone.
        let pinch = if self.sim.by_dwell { open } else { closed };
        let steps = self.sim.carry_frames.max(2);
        for i in 0..steps {
            let t = (i + 1) as f32 / steps as f32;
            frames.push(self.frame_at(lerp(start, end, t), pinch));
        }

        if self.sim.by_dwell {
            // Occupancy plus one more frame for the release-by-dwell check.
            for _ in 0..ZONE_DWELL_FRAMES + 2 {
                frames.push(self.frame_at(end, open));
            }
        } else {
            for _ in 0..3 {
                frames.push(self.frame_at(end, closed));
            }
            for _ in 0..3 {
                frames.push(self.frame_at(end, open));
            }
        }

        for _ in 0..self.sim.rest_frames {
            frames.push(self.frame_at(REST_POINT, open));
        }
    }

    fn frame_at(&mut self, target: (f32, f32), pinch_dist: f32) -> FrameFeatures {
        let wrist = (
            target.0 + self.jitter(0.008),
            target.1 + self.jitter(0.008),
        );
        let grip = self.grip.update(pinch_dist, &self.exercise);

        let left_shoulder = (0.35 + self.jitter(0.01), 0.3 + self.jitter(0.01));
        let right_shoulder = (0.65 + self.jitter(0.01), 0.3 + self.jitter(0.01));

        let frame = FrameFeatures {
            pose_ok: true,
            hand_ok: true,
            wrist_x: wrist.0,
            wrist_y: wrist.1,
            pinch_dist,
            grip,
            in_start_zone: false,
            in_end_zone: false,
            shoulder_center_x: Some((left_shoulder.0 + right_shoulder.0) / 2.0),
            shoulder_width: Some(geometry::distance(left_shoulder, right_shoulder)),
            angles: self.angles_for(wrist),
            confidence: DetectionConfidence {
                pose: 0.92 + self.jitter(0.05),
                hand: 0.9 + self.jitter(0.05),
            },
        };
        frame.with_zone_flags(&self.exercise)
    }

    /// Derive plausible joint proxies from the synthetic wrist path.
    fn angles_for(&mut self, wrist: (f32, f32)) -> JointAngles {
        let elbow = (
            (SHOULDER_POINT.0 + wrist.0) / 2.0 + 0.04,
            (SHOULDER_POINT.1 + wrist.1) / 2.0,
        );
        let elbow_deg = geometry::signed_angle_deg(SHOULDER_POINT, elbow, wrist).abs();
        JointAngles {
            elbow_deg,
            shoulder_flexion_deg: ((0.95 - wrist.1) * 120.0).clamp(0.0, 180.0),
            shoulder_abduction_deg: ((wrist.0 - SHOULDER_POINT.0).abs() * 90.0).clamp(0.0, 90.0),
            wrist_extension_proxy_deg: 8.0 + self.jitter(4.0),
        }
    }

    fn open_pinch(&self) -> f32 {
        self.exercise.grip_release_threshold + 0.06
    }

    fn closed_pinch(&self) -> f32 {
        self.exercise.grip_hold_threshold * 0.5
    }

    fn jitter(&mut self, amount: f32) -> f32 {
        self.rng.gen_range(-amount..amount)
    }
}

const REST_POINT: (f32, f32) = (0.5, 0.45);
const SHOULDER_POINT: (f32, f32) = (0.45, 0.3);

fn lerp(a: (f32, f32), b: (f32, f32), t: f32) -> (f32, f32) {
    (a.0 + (b.0 - a.0) * t, a.1 + (b.1 - a.1) * t)
}
