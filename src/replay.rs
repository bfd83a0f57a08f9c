//! Headless session driving for recorded or synthesized frame streams.
//!
//! The driver plays the role the host app plays in production: it feeds
//! frames at a fixed interval on a manual clock, confirms zones as soon as
//! setup completes, runs the countdown, and raises `TimeUp` in timed mode.
//! Recorded streams are JSON lines, one `FrameFeatures` object per line.

use std::cell::RefCell;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::rc::Rc;

use crate::clock::{Clock, ManualClock};
use crate::config::{ExerciseConfig, ExerciseMode};
use crate::features::FrameFeatures;
use crate::metrics::SessionSummary;
use crate::session::{ExerciseSession, ExerciseState, SessionEvent, SessionObserver};

/// Read a JSONL frame recording. Blank lines are skipped; a malformed line
/// is an error, not a silently dropped frame.
pub fn read_frames<P: AsRef<Path>>(path: P) -> io::Result<Vec<FrameFeatures>> {
    let file = File::open(path)?;
    let mut frames = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let frame: FrameFeatures = serde_json::from_str(&line)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        frames.push(frame);
    }
    Ok(frames)
}

/// Write a frame recording as JSONL for later replay.
pub fn write_frames<P: AsRef<Path>>(path: P, frames: &[FrameFeatures]) -> io::Result<()> {
    let mut file = File::create(path)?;
    for frame in frames {
        let line = serde_json::to_string(frame)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        writeln!(file, "{}", line)?;
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct ReplayOptions {
    /// Simulated time between frames; 33ms matches a 30fps camera.
    pub frame_interval_ms: u64,
    /// Recompute the zone flags of each frame against the live config
    /// instead of trusting the flags captured at recording time.
    pub recompute_zones: bool,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            frame_interval_ms: 33,
            recompute_zones: true,
        }
    }
}

/// What a replay produced, for printing and export.
#[derive(Debug)]
pub struct ReplayReport {
    pub transitions: Vec<String>,
    pub rep_count: u32,
    pub summary: SessionSummary,
    pub rep_records: Vec<crate::metrics::PerRepMetrics>,
}

#[derive(Default)]
struct TransitionLog {
    lines: Vec<String>,
}

struct LogObserver(Rc<RefCell<TransitionLog>>);

impl SessionObserver for LogObserver {
    fn on_state_change(&mut self, state: ExerciseState) {
        self.0.borrow_mut().lines.push(format!("state -> {}", state));
    }
    fn on_rep_start(&mut self) {
        self.0.borrow_mut().lines.push("rep started".to_string());
    }
    fn on_rep_counted(&mut self) {
        self.0.borrow_mut().lines.push("rep counted".to_string());
    }
}

/// Feed a frame stream through a fresh session and report the outcome.
pub fn drive(
    config: ExerciseConfig,
    frames: &[FrameFeatures],
    opts: &ReplayOptions,
) -> ReplayReport {
    let clock = ManualClock::new();
    let mode = config.mode;
    let mut session = ExerciseSession::with_clock(config, clock.clone());

    let log = Rc::new(RefCell::new(TransitionLog::default()));
    session.set_observer(Box::new(LogObserver(log.clone())));

    let mut active_since_ms: Option<u64> = None;

    for frame in frames {
        if session.state() == ExerciseState::Completed {
            break;
        }

        // Timed sessions end on the host's clock, not on a frame guard.
        if let ExerciseMode::Timed { duration_secs } = mode {
            if let Some(started) = active_since_ms {
                let elapsed = clock.now_ms().saturating_sub(started);
                if elapsed as f64 / 1000.0 >= duration_secs {
                    session.dispatch(SessionEvent::TimeUp);
                    break;
                }
            }
        }

        let frame = if opts.recompute_zones {
            frame.with_zone_flags(session.config())
        } else {
            *frame
        };
        session.dispatch(SessionEvent::Frame(frame));
        clock.advance(opts.frame_interval_ms);

        // Stand in for the host UI on the setup path.
        if session.state() == ExerciseState::SetupZones {
            session.dispatch(SessionEvent::ZonesConfirmed);
        }
        while session.state() == ExerciseState::Countdown {
            clock.advance(1000);
            session.tick_countdown();
        }
        if session.state() == ExerciseState::Active && active_since_ms.is_none() {
            active_since_ms = Some(clock.now_ms());
        }
    }

    if session.state() != ExerciseState::Completed {
        session.dispatch(SessionEvent::UserStop);
    }

    let transitions = log.borrow().lines.clone();
    ReplayReport {
        transitions,
        rep_count: session.rep_count(),
        summary: session.summary(),
        rep_records: session.rep_records().to_vec(),
    }
}
