//! The exercise session state machine.
//!
//! One `ExerciseSession` owns the full lifecycle of a supervised exercise:
//! alignment check, zone setup, countdown, active repetition counting with a
//! nested sub-state-machine, pause/resume, and completion. Events arrive via
//! [`ExerciseSession::dispatch`]; events that are not valid in the current
//! state are silently ignored so the host UI never has to track legality
//! itself.
//!
//! The engine is single-threaded and frame-driven: every mutation happens
//! synchronously inside `dispatch`, and the caller must serialize calls (a
//! session is not re-entrant safe across callback contexts).

use crate::clock::{Clock, SystemClock};
use crate::config::{ExerciseConfig, ExerciseMode};
use crate::features::FrameFeatures;
use crate::geometry::NormalizedRect;
use crate::metrics::{MetricsCollector, PerRepMetrics, SessionSummary};

/// Consecutive qualifying frames required to pass the alignment check.
pub const ALIGNMENT_FRAMES: u32 = 30;
/// Consecutive in-zone frames that confirm zone occupancy by dwell.
pub const ZONE_DWELL_FRAMES: u32 = 12;
/// Seconds counted down before the session goes active.
pub const COUNTDOWN_START: u32 = 3;

// Alignment window: shoulder center near frame center, shoulder width
// neither too close to nor too far from the camera.
const SHOULDER_CENTER_MIN: f32 = 0.4;
const SHOULDER_CENTER_MAX: f32 = 0.6;
const SHOULDER_WIDTH_MIN: f32 = 0.2;
const SHOULDER_WIDTH_MAX: f32 = 0.45;

/// Top-level session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum ExerciseState {
    SetupAlignment,
    SetupZones,
    ReadyGate,
    Countdown,
    Active,
    Paused,
    Completed,
}

/// Repetition sub-state, only advanced while the session is `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum RepState {
    WaitPickup,
    Carrying,
    WaitDrop,
    ConfirmRelease,
}

/// Everything that can be dispatched into a session: discrete commands from
/// the UI layer, self-dispatched internal events, and per-frame features
/// from the perception layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionEvent {
    AlignmentOk,
    ZonesConfirmed,
    ReadyPressed,
    CountdownDone,
    TimeUp,
    TargetRepsReached,
    UserStop,
    Pause,
    Resume,
    RepCounted,
    Frame(FrameFeatures),
}

/// Callbacks invoked synchronously within `dispatch`. All methods default to
/// no-ops so hosts implement only what they render.
pub trait SessionObserver {
    fn on_state_change(&mut self, _state: ExerciseState) {}
    fn on_rep_start(&mut self) {}
    fn on_rep_counted(&mut self) {}
}

/// Copied view of the machine, never a live reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSnapshot {
    pub state: ExerciseState,
    pub rep_state: RepState,
    pub rep_count: u32,
    pub countdown_remaining: u32,
    pub aligned_frames: u32,
}

pub struct ExerciseSession<C: Clock = SystemClock> {
    config: ExerciseConfig,
    clock: C,
    metrics: MetricsCollector,
    observer: Option<Box<dyn SessionObserver>>,

    state: ExerciseState,
    rep_state: RepState,
    rep_count: u32,
    countdown_remaining: u32,
    aligned_frames: u32,
    start_dwell_frames: u32,
    end_dwell_frames: u32,
    entered_carrying_by_dwell: bool,
    last_rep_counted_ms: Option<u64>,
}

impl ExerciseSession<SystemClock> {
    pub fn new(config: ExerciseConfig) -> Self {
        Self::with_clock(config, SystemClock::new())
    }
}

impl<C: Clock> ExerciseSession<C> {
    pub fn with_clock(config: ExerciseConfig, clock: C) -> Self {
        let metrics = MetricsCollector::new(&config);
        Self {
            config,
            clock,
            metrics,
            observer: None,
            state: ExerciseState::SetupAlignment,
            rep_state: RepState::WaitPickup,
            rep_count: 0,
            countdown_remaining: COUNTDOWN_START,
            aligned_frames: 0,
            start_dwell_frames: 0,
            end_dwell_frames: 0,
            entered_carrying_by_dwell: false,
            last_rep_counted_ms: None,
        }
    }

    pub fn set_observer(&mut self, observer: Box<dyn SessionObserver>) {
        self.observer = Some(observer);
    }

    pub fn config(&self) -> &ExerciseConfig {
        &self.config
    }

    /// Zone edits from the host UI; visible to the very next frame.
    pub fn set_zones(&mut self, start_zone: NormalizedRect, end_zone: NormalizedRect) {
        self.config.start_zone = start_zone;
        self.config.end_zone = end_zone;
    }

    pub fn state(&self) -> ExerciseState {
        self.state
    }

    pub fn rep_count(&self) -> u32 {
        self.rep_count
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            rep_state: self.rep_state,
            rep_count: self.rep_count,
            countdown_remaining: self.countdown_remaining,
            aligned_frames: self.aligned_frames,
        }
    }

    pub fn summary(&self) -> SessionSummary {
        self.metrics.summary(self.clock.now_ms())
    }

    pub fn rep_records(&self) -> &[PerRepMetrics] {
        self.metrics.rep_records()
    }

    /// Opt into a user-confirmed start: valid only during zone setup, after
    /// which `ReadyPressed` starts the countdown instead of `ZonesConfirmed`.
    pub fn enter_ready_gate(&mut self) {
        if self.state == ExerciseState::SetupZones {
            self.transition(ExerciseState::ReadyGate);
        }
    }

    /// Called once per second by the host while counting down. Returns
    /// whether the countdown just completed.
    pub fn tick_countdown(&mut self) -> bool {
        if self.state != ExerciseState::Countdown {
            return false;
        }
        if self.countdown_remaining > 0 {
            self.countdown_remaining -= 1;
        }
        if self.countdown_remaining == 0 {
            self.dispatch(SessionEvent::CountdownDone);
            true
        } else {
            false
        }
    }

    pub fn dispatch(&mut self, event: SessionEvent) {
        match (self.state, event) {
            (ExerciseState::SetupAlignment, SessionEvent::AlignmentOk) => {
                self.transition(ExerciseState::SetupZones);
            }
            (ExerciseState::SetupZones, SessionEvent::ZonesConfirmed)
            | (ExerciseState::ReadyGate, SessionEvent::ReadyPressed) => {
                self.countdown_remaining = COUNTDOWN_START;
                self.transition(ExerciseState::Countdown);
            }
            (ExerciseState::Countdown, SessionEvent::CountdownDone) => {
                self.transition(ExerciseState::Active);
                self.metrics.start(self.clock.now_ms());
            }
            (ExerciseState::Active, SessionEvent::TimeUp)
            | (ExerciseState::Active, SessionEvent::TargetRepsReached)
            | (ExerciseState::Active, SessionEvent::UserStop)
            | (ExerciseState::Paused, SessionEvent::UserStop) => {
                self.transition(ExerciseState::Completed);
            }
            (ExerciseState::Active, SessionEvent::Pause) => {
                self.transition(ExerciseState::Paused);
            }
            (ExerciseState::Paused, SessionEvent::Resume) => {
                self.transition(ExerciseState::Active);
            }
            (ExerciseState::Active, SessionEvent::RepCounted) => {
                self.count_repetition();
            }
            (ExerciseState::SetupAlignment, SessionEvent::Frame(features)) => {
                self.process_alignment_frame(&features);
            }
            (ExerciseState::Active, SessionEvent::Frame(features)) => {
                self.process_active_frame(&features);
            }
            // Not valid in the current state: deliberately ignored.
            _ => {}
        }
    }

    fn transition(&mut self, next: ExerciseState) {
        self.state = next;
        if let Some(obs) = self.observer.as_mut() {
            obs.on_state_change(next);
        }
    }

    fn frame_is_aligned(&self, features: &FrameFeatures) -> bool {
        if !(features.pose_ok && features.hand_ok) {
            return false;
        }
        if features.confidence.pose < self.config.min_pose_confidence
            || features.confidence.hand < self.config.min_hand_confidence
        {
            return false;
        }
        match (features.shoulder_center_x, features.shoulder_width) {
            (Some(center), Some(width)) => {
                (SHOULDER_CENTER_MIN..=SHOULDER_CENTER_MAX).contains(&center)
                    && (SHOULDER_WIDTH_MIN..=SHOULDER_WIDTH_MAX).contains(&width)
            }
            _ => false,
        }
    }

    fn process_alignment_frame(&mut self, features: &FrameFeatures) {
        if self.frame_is_aligned(features) {
            self.aligned_frames += 1;
        } else {
            // Strict consecutive-frame requirement, no leaky bucket.
            self.aligned_frames = 0;
        }
        if self.aligned_frames >= ALIGNMENT_FRAMES {
            self.dispatch(SessionEvent::AlignmentOk);
        }
    }

    fn process_active_frame(&mut self, features: &FrameFeatures) {
        match self.rep_state {
            RepState::WaitPickup => self.frame_wait_pickup(features),
            RepState::Carrying => self.frame_carrying(features),
            RepState::WaitDrop => self.frame_wait_drop(features),
            RepState::ConfirmRelease => self.frame_confirm_release(features),
        }
        // Kinematics are only scored while a repetition is in flight.
        if self.rep_state != RepState::WaitPickup {
            self.metrics.add_angle_sample(features, self.clock.now_ms());
        }
    }

    fn frame_wait_pickup(&mut self, features: &FrameFeatures) {
        if features.in_start_zone && features.hand_ok {
            self.start_dwell_frames += 1;
        } else {
            self.start_dwell_frames = 0;
        }

        if features.in_start_zone && features.grip {
            self.begin_carrying(false);
        } else if self.start_dwell_frames >= ZONE_DWELL_FRAMES {
            // Dwell fallback: the tracked object may not register a pinch.
            self.begin_carrying(true);
        }
    }

    fn begin_carrying(&mut self, by_dwell: bool) {
        self.rep_state = RepState::Carrying;
        self.entered_carrying_by_dwell = by_dwell;
        self.start_dwell_frames = 0;
        self.end_dwell_frames = 0;
        self.metrics.record_rep_start(self.clock.now_ms());
        if let Some(obs) = self.observer.as_mut() {
            obs.on_rep_start();
        }
    }

    fn frame_carrying(&mut self, features: &FrameFeatures) {
        // Grip loss while still in the start zone cancels a grip-triggered
        // pickup. Dwell-triggered pickups are grip-agnostic by design.
        if !self.entered_carrying_by_dwell && !features.grip && features.in_start_zone {
            self.abort_repetition();
            return;
        }
        if !features.in_start_zone {
            self.rep_state = RepState::WaitDrop;
            self.end_dwell_frames = 0;
        }
    }

    fn frame_wait_drop(&mut self, features: &FrameFeatures) {
        if !self.entered_carrying_by_dwell && !features.grip && !features.in_end_zone {
            // Dropped the object mid-carry.
            self.abort_repetition();
            return;
        }

        if features.in_end_zone && features.hand_ok {
            self.end_dwell_frames += 1;
        } else {
            self.end_dwell_frames = 0;
        }

        if features.in_end_zone && (self.end_dwell_frames >= ZONE_DWELL_FRAMES || features.grip) {
            self.rep_state = RepState::ConfirmRelease;
        }
    }

    fn frame_confirm_release(&mut self, features: &FrameFeatures) {
        if features.in_end_zone && features.hand_ok {
            self.end_dwell_frames += 1;
        } else {
            self.end_dwell_frames = 0;
        }

        if !features.grip && !features.in_end_zone {
            self.abort_repetition();
            return;
        }

        let released = (!features.grip && features.in_end_zone)
            || self.end_dwell_frames >= ZONE_DWELL_FRAMES;
        if released && self.cooldown_elapsed() {
            self.dispatch(SessionEvent::RepCounted);
        }
    }

    fn abort_repetition(&mut self) {
        self.rep_state = RepState::WaitPickup;
        self.entered_carrying_by_dwell = false;
        self.start_dwell_frames = 0;
        self.end_dwell_frames = 0;
    }

    fn cooldown_elapsed(&self) -> bool {
        match self.last_rep_counted_ms {
            Some(counted) => {
                self.clock.now_ms().saturating_sub(counted) >= self.config.rep_cooldown_ms
            }
            None => true,
        }
    }

    /// The `RepCounted` action: the session counter increments first, then
    /// the collector is notified, so the two can never disagree.
    fn count_repetition(&mut self) {
        let now = self.clock.now_ms();
        self.rep_count += 1;
        self.last_rep_counted_ms = Some(now);
        self.metrics.record_rep_complete(now);
        if let Some(obs) = self.observer.as_mut() {
            obs.on_rep_counted();
        }
        self.abort_repetition();

        if let ExerciseMode::TargetReps { target } = self.config.mode {
            if target > 0 && self.rep_count >= target {
                self.dispatch(SessionEvent::TargetRepsReached);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::Hand;
    use crate::features::{DetectionConfidence, JointAngles};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn test_config(mode: ExerciseMode) -> ExerciseConfig {
        ExerciseConfig {
            mode,
            rep_cooldown_ms: 500,
            ..ExerciseConfig::default()
        }
    }

    fn session(mode: ExerciseMode) -> (ExerciseSession<ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        let session = ExerciseSession::with_clock(test_config(mode), clock.clone());
        (session, clock)
    }

    fn aligned_frame() -> FrameFeatures {
        FrameFeatures {
            pose_ok: true,
            hand_ok: true,
            shoulder_center_x: Some(0.5),
            shoulder_width: Some(0.3),
            confidence: DetectionConfidence { pose: 0.9, hand: 0.9 },
            ..FrameFeatures::default()
        }
    }

    fn active_frame(in_start: bool, in_end: bool, grip: bool) -> FrameFeatures {
        FrameFeatures {
            pose_ok: true,
            hand_ok: true,
            grip,
            in_start_zone: in_start,
            in_end_zone: in_end,
            angles: JointAngles {
                elbow_deg: 160.0,
                shoulder_flexion_deg: 70.0,
                shoulder_abduction_deg: 30.0,
                wrist_extension_proxy_deg: 10.0,
            },
            confidence: DetectionConfidence { pose: 0.9, hand: 0.9 },
            ..FrameFeatures::default()
        }
    }

    /// Walk a fresh session to Active the way a host would.
    fn drive_to_active(session: &mut ExerciseSession<ManualClock>, clock: &ManualClock) {
        for _ in 0..ALIGNMENT_FRAMES {
            session.dispatch(SessionEvent::Frame(aligned_frame()));
            clock.advance(33);
        }
        assert_eq!(session.state(), ExerciseState::SetupZones);
        session.dispatch(SessionEvent::ZonesConfirmed);
        assert_eq!(session.state(), ExerciseState::Countdown);
        for _ in 0..COUNTDOWN_START {
            clock.advance(1000);
            session.tick_countdown();
        }
        assert_eq!(session.state(), ExerciseState::Active);
    }

    /// One full grip-path cycle; leaves the session back in WaitPickup.
    fn grip_cycle(session: &mut ExerciseSession<ManualClock>, clock: &ManualClock) {
        session.dispatch(SessionEvent::Frame(active_frame(true, false, true)));
        clock.advance(33);
        for _ in 0..5 {
            session.dispatch(SessionEvent::Frame(active_frame(false, false, true)));
            clock.advance(33);
        }
        session.dispatch(SessionEvent::Frame(active_frame(false, true, true)));
        clock.advance(33);
        session.dispatch(SessionEvent::Frame(active_frame(false, true, false)));
        clock.advance(33);
    }

    #[derive(Default)]
    struct Recording {
        states: Vec<ExerciseState>,
        rep_starts: u32,
        reps_counted: u32,
    }

    struct RecordingObserver(Rc<RefCell<Recording>>);

    impl SessionObserver for RecordingObserver {
        fn on_state_change(&mut self, state: ExerciseState) {
            self.0.borrow_mut().states.push(state);
        }
        fn on_rep_start(&mut self) {
            self.0.borrow_mut().rep_starts += 1;
        }
        fn on_rep_counted(&mut self) {
            self.0.borrow_mut().reps_counted += 1;
        }
    }

    #[test]
    fn alignment_requires_consecutive_frames() {
        let (mut session, clock) = session(ExerciseMode::TargetReps { target: 3 });

        // 29 good frames, one bad frame, 29 more: still aligning.
        for _ in 0..29 {
            session.dispatch(SessionEvent::Frame(aligned_frame()));
            clock.advance(33);
        }
        assert_eq!(session.snapshot().aligned_frames, 29);
        session.dispatch(SessionEvent::Frame(FrameFeatures::default()));
        assert_eq!(session.snapshot().aligned_frames, 0);
        for _ in 0..29 {
            session.dispatch(SessionEvent::Frame(aligned_frame()));
            clock.advance(33);
        }
        assert_eq!(session.state(), ExerciseState::SetupAlignment);

        session.dispatch(SessionEvent::Frame(aligned_frame()));
        assert_eq!(session.state(), ExerciseState::SetupZones);
    }

    #[test]
    fn alignment_rejects_missing_shoulder_data() {
        let (mut session, _clock) = session(ExerciseMode::TargetReps { target: 3 });
        let mut frame = aligned_frame();
        frame.shoulder_center_x = None;
        for _ in 0..ALIGNMENT_FRAMES + 5 {
            session.dispatch(SessionEvent::Frame(frame));
        }
        assert_eq!(session.state(), ExerciseState::SetupAlignment);
    }

    #[test]
    fn alignment_rejects_low_confidence() {
        let (mut session, _clock) = session(ExerciseMode::TargetReps { target: 3 });
        let mut frame = aligned_frame();
        frame.confidence.hand = 0.2;
        for _ in 0..ALIGNMENT_FRAMES + 5 {
            session.dispatch(SessionEvent::Frame(frame));
        }
        assert_eq!(session.state(), ExerciseState::SetupAlignment);
    }

    #[test]
    fn alignment_rejects_off_center_or_out_of_range_shoulders() {
        let (mut session, _clock) = session(ExerciseMode::TargetReps { target: 3 });

        let mut off_center = aligned_frame();
        off_center.shoulder_center_x = Some(0.7);
        let mut too_close = aligned_frame();
        too_close.shoulder_width = Some(0.6);

        for _ in 0..ALIGNMENT_FRAMES + 5 {
            session.dispatch(SessionEvent::Frame(off_center));
            session.dispatch(SessionEvent::Frame(too_close));
        }
        assert_eq!(session.state(), ExerciseState::SetupAlignment);
    }

    #[test]
    fn countdown_ticks_down_and_reports_completion() {
        let (mut session, clock) = session(ExerciseMode::TargetReps { target: 3 });
        for _ in 0..ALIGNMENT_FRAMES {
            session.dispatch(SessionEvent::Frame(aligned_frame()));
            clock.advance(33);
        }
        session.dispatch(SessionEvent::ZonesConfirmed);

        assert!(!session.tick_countdown());
        assert_eq!(session.snapshot().countdown_remaining, 2);
        assert!(!session.tick_countdown());
        assert!(session.tick_countdown());
        assert_eq!(session.state(), ExerciseState::Active);

        // Further ticks are no-ops once active.
        assert!(!session.tick_countdown());
    }

    #[test]
    fn ready_gate_requires_explicit_entry_and_press() {
        let (mut session, clock) = session(ExerciseMode::TargetReps { target: 3 });

        // ReadyPressed does nothing from the default setup path.
        session.dispatch(SessionEvent::ReadyPressed);
        assert_eq!(session.state(), ExerciseState::SetupAlignment);

        for _ in 0..ALIGNMENT_FRAMES {
            session.dispatch(SessionEvent::Frame(aligned_frame()));
            clock.advance(33);
        }
        session.enter_ready_gate();
        assert_eq!(session.state(), ExerciseState::ReadyGate);

        session.dispatch(SessionEvent::ReadyPressed);
        assert_eq!(session.state(), ExerciseState::Countdown);
    }

    #[test]
    fn grip_path_counts_one_repetition() {
        let (mut session, clock) = session(ExerciseMode::TargetReps { target: 3 });
        drive_to_active(&mut session, &clock);

        // Pickup by grip inside the start zone.
        session.dispatch(SessionEvent::Frame(active_frame(true, false, true)));
        assert_eq!(session.snapshot().rep_state, RepState::Carrying);

        // Leave the start zone, still gripping.
        clock.advance(33);
        session.dispatch(SessionEvent::Frame(active_frame(false, false, true)));
        assert_eq!(session.snapshot().rep_state, RepState::WaitDrop);

        // Arrive in the end zone with grip: release confirmation pending.
        clock.advance(33);
        session.dispatch(SessionEvent::Frame(active_frame(false, true, true)));
        assert_eq!(session.snapshot().rep_state, RepState::ConfirmRelease);

        // Open the hand in the end zone; cooldown has long elapsed.
        clock.advance(600);
        session.dispatch(SessionEvent::Frame(active_frame(false, true, false)));
        assert_eq!(session.rep_count(), 1);
        assert_eq!(session.snapshot().rep_state, RepState::WaitPickup);
    }

    #[test]
    fn dwell_path_counts_without_any_grip() {
        let (mut session, clock) = session(ExerciseMode::TargetReps { target: 3 });
        drive_to_active(&mut session, &clock);

        // 12 consecutive frames in the start zone, never gripping.
        for i in 0..ZONE_DWELL_FRAMES {
            assert_eq!(session.snapshot().rep_state, RepState::WaitPickup, "frame {i}");
            session.dispatch(SessionEvent::Frame(active_frame(true, false, false)));
            clock.advance(33);
        }
        assert_eq!(session.snapshot().rep_state, RepState::Carrying);

        session.dispatch(SessionEvent::Frame(active_frame(false, false, false)));
        clock.advance(33);
        assert_eq!(session.snapshot().rep_state, RepState::WaitDrop);

        // Dwell in the end zone: 12 frames to confirm occupancy, then the
        // accumulated dwell confirms the release as well.
        for _ in 0..ZONE_DWELL_FRAMES {
            session.dispatch(SessionEvent::Frame(active_frame(false, true, false)));
            clock.advance(33);
        }
        assert_eq!(session.snapshot().rep_state, RepState::ConfirmRelease);
        session.dispatch(SessionEvent::Frame(active_frame(false, true, false)));
        assert_eq!(session.rep_count(), 1);
    }

    #[test]
    fn interrupted_dwell_resets_the_counter() {
        let (mut session, clock) = session(ExerciseMode::TargetReps { target: 3 });
        drive_to_active(&mut session, &clock);

        for _ in 0..ZONE_DWELL_FRAMES - 1 {
            session.dispatch(SessionEvent::Frame(active_frame(true, false, false)));
            clock.advance(33);
        }
        // One frame with the hand lost: counter resets.
        let mut lost = active_frame(true, false, false);
        lost.hand_ok = false;
        session.dispatch(SessionEvent::Frame(lost));

        for _ in 0..ZONE_DWELL_FRAMES - 1 {
            session.dispatch(SessionEvent::Frame(active_frame(true, false, false)));
            clock.advance(33);
        }
        assert_eq!(session.snapshot().rep_state, RepState::WaitPickup);
    }

    #[test]
    fn grip_loss_in_start_zone_cancels_grip_pickup() {
        let (mut session, clock) = session(ExerciseMode::TargetReps { target: 3 });
        drive_to_active(&mut session, &clock);

        session.dispatch(SessionEvent::Frame(active_frame(true, false, true)));
        assert_eq!(session.snapshot().rep_state, RepState::Carrying);

        clock.advance(33);
        session.dispatch(SessionEvent::Frame(active_frame(true, false, false)));
        assert_eq!(session.snapshot().rep_state, RepState::WaitPickup);
        assert_eq!(session.rep_count(), 0);
    }

    #[test]
    fn grip_loss_does_not_cancel_dwell_pickup() {
        let (mut session, clock) = session(ExerciseMode::TargetReps { target: 3 });
        drive_to_active(&mut session, &clock);

        for _ in 0..ZONE_DWELL_FRAMES {
            session.dispatch(SessionEvent::Frame(active_frame(true, false, false)));
            clock.advance(33);
        }
        assert_eq!(session.snapshot().rep_state, RepState::Carrying);

        // Still in the start zone with no grip: a dwell-triggered carry
        // survives this.
        session.dispatch(SessionEvent::Frame(active_frame(true, false, false)));
        assert_eq!(session.snapshot().rep_state, RepState::Carrying);
    }

    #[test]
    fn mid_carry_drop_aborts_grip_triggered_rep() {
        let (mut session, clock) = session(ExerciseMode::TargetReps { target: 3 });
        drive_to_active(&mut session, &clock);

        session.dispatch(SessionEvent::Frame(active_frame(true, false, true)));
        clock.advance(33);
        session.dispatch(SessionEvent::Frame(active_frame(false, false, true)));
        assert_eq!(session.snapshot().rep_state, RepState::WaitDrop);

        // Grip lost before reaching the end zone.
        clock.advance(33);
        session.dispatch(SessionEvent::Frame(active_frame(false, false, false)));
        assert_eq!(session.snapshot().rep_state, RepState::WaitPickup);
        assert_eq!(session.rep_count(), 0);
    }

    #[test]
    fn release_outside_end_zone_aborts_without_counting() {
        let (mut session, clock) = session(ExerciseMode::TargetReps { target: 3 });
        drive_to_active(&mut session, &clock);

        session.dispatch(SessionEvent::Frame(active_frame(true, false, true)));
        clock.advance(33);
        session.dispatch(SessionEvent::Frame(active_frame(false, false, true)));
        clock.advance(33);
        session.dispatch(SessionEvent::Frame(active_frame(false, true, true)));
        assert_eq!(session.snapshot().rep_state, RepState::ConfirmRelease);

        // Hand wanders out of the end zone and opens.
        clock.advance(33);
        session.dispatch(SessionEvent::Frame(active_frame(false, false, false)));
        assert_eq!(session.snapshot().rep_state, RepState::WaitPickup);
        assert_eq!(session.rep_count(), 0);
    }

    #[test]
    fn cooldown_rejects_rapid_double_count() {
        let (mut session, clock) = session(ExerciseMode::TargetReps { target: 5 });
        drive_to_active(&mut session, &clock);

        grip_cycle(&mut session, &clock);
        assert_eq!(session.rep_count(), 1);

        // A second full cycle lands within the 500ms cooldown: the release
        // is held, not counted.
        session.dispatch(SessionEvent::Frame(active_frame(true, false, true)));
        clock.advance(33);
        session.dispatch(SessionEvent::Frame(active_frame(false, false, true)));
        clock.advance(33);
        session.dispatch(SessionEvent::Frame(active_frame(false, true, true)));
        clock.advance(33);
        session.dispatch(SessionEvent::Frame(active_frame(false, true, false)));
        assert_eq!(session.rep_count(), 1);

        // Once the cooldown elapses the held release goes through.
        clock.advance(session.config().rep_cooldown_ms);
        session.dispatch(SessionEvent::Frame(active_frame(false, true, false)));
        assert_eq!(session.rep_count(), 2);
    }

    #[test]
    fn target_reps_completes_on_the_last_count() {
        let (mut session, clock) = session(ExerciseMode::TargetReps { target: 3 });
        drive_to_active(&mut session, &clock);

        for expected in 1..=3u32 {
            clock.advance(600);
            grip_cycle(&mut session, &clock);
            assert_eq!(session.rep_count(), expected);
        }
        assert_eq!(session.state(), ExerciseState::Completed);

        let summary = session.summary();
        assert_eq!(summary.rep_count, 3);
        assert!(summary.time_to_target_reps_secs.is_some());
    }

    #[test]
    fn timed_session_completes_on_time_up() {
        let (mut session, clock) =
            session(ExerciseMode::Timed { duration_secs: 10.0 });
        drive_to_active(&mut session, &clock);

        // Ten seconds pass with no repetitions performed.
        clock.advance(10_000);
        session.dispatch(SessionEvent::TimeUp);
        assert_eq!(session.state(), ExerciseState::Completed);

        let summary = session.summary();
        assert_eq!(summary.rep_count, 0);
        assert!((summary.duration_secs - 10.0).abs() < 0.2);
    }

    #[test]
    fn pause_freezes_frames_and_resume_continues() {
        let (mut session, clock) = session(ExerciseMode::TargetReps { target: 3 });
        drive_to_active(&mut session, &clock);

        session.dispatch(SessionEvent::Frame(active_frame(true, false, true)));
        assert_eq!(session.snapshot().rep_state, RepState::Carrying);

        session.dispatch(SessionEvent::Pause);
        assert_eq!(session.state(), ExerciseState::Paused);

        // Frames while paused are ignored; the sub-state survives.
        session.dispatch(SessionEvent::Frame(active_frame(false, true, false)));
        assert_eq!(session.snapshot().rep_state, RepState::Carrying);
        assert_eq!(session.rep_count(), 0);

        session.dispatch(SessionEvent::Resume);
        assert_eq!(session.state(), ExerciseState::Active);
        clock.advance(600);
        session.dispatch(SessionEvent::Frame(active_frame(false, false, true)));
        session.dispatch(SessionEvent::Frame(active_frame(false, true, true)));
        session.dispatch(SessionEvent::Frame(active_frame(false, true, false)));
        assert_eq!(session.rep_count(), 1);
    }

    #[test]
    fn user_stop_is_terminal_from_active_and_paused() {
        let (mut session, clock) = session(ExerciseMode::TargetReps { target: 3 });
        drive_to_active(&mut session, &clock);
        session.dispatch(SessionEvent::Pause);
        session.dispatch(SessionEvent::UserStop);
        assert_eq!(session.state(), ExerciseState::Completed);

        // Terminal: nothing moves the machine out of Completed.
        session.dispatch(SessionEvent::Resume);
        session.dispatch(SessionEvent::Frame(active_frame(true, false, true)));
        assert_eq!(session.state(), ExerciseState::Completed);
    }

    #[test]
    fn invalid_events_are_silently_ignored() {
        let (mut session, _clock) = session(ExerciseMode::TargetReps { target: 3 });
        session.dispatch(SessionEvent::Pause);
        session.dispatch(SessionEvent::Resume);
        session.dispatch(SessionEvent::TimeUp);
        session.dispatch(SessionEvent::CountdownDone);
        session.dispatch(SessionEvent::RepCounted);
        assert_eq!(session.state(), ExerciseState::SetupAlignment);
        assert_eq!(session.rep_count(), 0);
    }

    #[test]
    fn zone_edits_take_effect_immediately() {
        let (mut session, _clock) = session(ExerciseMode::TargetReps { target: 3 });
        let start = NormalizedRect::new(0.0, 0.0, 0.2, 0.2);
        let end = NormalizedRect::new(0.8, 0.8, 1.0, 1.0);
        session.set_zones(start, end);
        assert_eq!(session.config().start_zone, start);
        assert_eq!(session.config().end_zone, end);
    }

    #[test]
    fn observer_sees_states_and_rep_events() {
        let recording = Rc::new(RefCell::new(Recording::default()));
        let (mut session, clock) = session(ExerciseMode::TargetReps { target: 1 });
        session.set_observer(Box::new(RecordingObserver(recording.clone())));

        drive_to_active(&mut session, &clock);
        clock.advance(600);
        grip_cycle(&mut session, &clock);

        let recording = recording.borrow();
        assert_eq!(
            recording.states,
            vec![
                ExerciseState::SetupZones,
                ExerciseState::Countdown,
                ExerciseState::Active,
                ExerciseState::Completed,
            ]
        );
        assert_eq!(recording.rep_starts, 1);
        assert_eq!(recording.reps_counted, 1);
    }

    #[test]
    fn session_and_collector_counts_agree() {
        let (mut session, clock) = session(ExerciseMode::TargetReps { target: 5 });
        drive_to_active(&mut session, &clock);
        for _ in 0..3 {
            clock.advance(600);
            grip_cycle(&mut session, &clock);
        }
        assert_eq!(session.rep_count(), 3);
        assert_eq!(session.summary().rep_count, 3);
        assert_eq!(session.rep_records().len(), 3);
    }

    #[test]
    fn summary_reports_hand_and_exercise() {
        let (session, _clock) = session(ExerciseMode::TargetReps { target: 3 });
        let summary = session.summary();
        assert_eq!(summary.exercise_id, "pick-and-place");
        assert_eq!(summary.hand, Hand::Right);
    }

    #[test]
    fn production_constructor_starts_in_alignment() {
        let session = ExerciseSession::new(ExerciseConfig::default());
        let snapshot = session.snapshot();
        assert_eq!(snapshot.state, ExerciseState::SetupAlignment);
        assert_eq!(snapshot.rep_state, RepState::WaitPickup);
        assert_eq!(snapshot.rep_count, 0);
        assert_eq!(snapshot.countdown_remaining, COUNTDOWN_START);
    }
}
