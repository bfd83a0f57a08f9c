use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::{Path, PathBuf};

use reptrack::config::{ConfigStore, ExerciseConfig, FileConfigStore};
use reptrack::export;
use reptrack::replay::{self, ReplayOptions, ReplayReport};
use reptrack::simulate::{SessionSimulator, SimulationConfig};

/// camera-guided exercise repetition tracking, replayed off-camera
#[derive(Parser, Debug)]
#[clap(
    version,
    about,
    long_about = "Replays recorded perception frame streams (or synthesizes them) through the exercise repetition-tracking engine and reports the session summary. The live camera pipeline is a separate host; this tool drives the same engine headlessly."
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// replay a recorded frame stream (one FrameFeatures JSON object per line)
    Replay {
        /// path to the recorded frames
        #[clap(short, long)]
        frames: PathBuf,

        /// exercise config to run against; defaults to the saved config
        #[clap(short, long)]
        config: Option<PathBuf>,

        /// simulated milliseconds between frames
        #[clap(long, default_value_t = 33)]
        frame_interval_ms: u64,

        /// trust the zone flags captured at recording time instead of
        /// recomputing them from the config zones
        #[clap(long)]
        keep_recorded_zones: bool,

        /// append the session summary row to this CSV log
        #[clap(long)]
        summary_log: Option<PathBuf>,

        /// write the per-repetition table to this CSV
        #[clap(long)]
        rep_csv: Option<PathBuf>,
    },
    /// synthesize a session and run it through the engine
    Simulate {
        /// number of repetitions to perform
        #[clap(short, long, default_value_t = 3)]
        reps: u32,

        /// rng seed for positional jitter
        #[clap(long, default_value_t = 7)]
        seed: u64,

        /// confirm repetitions by zone dwell instead of grip
        #[clap(long)]
        dwell: bool,

        /// exercise config to run against; defaults to the saved config
        #[clap(short, long)]
        config: Option<PathBuf>,

        /// simulated milliseconds between frames
        #[clap(long, default_value_t = 33)]
        frame_interval_ms: u64,

        /// record the generated frames to this JSONL path for later replay
        #[clap(long)]
        record: Option<PathBuf>,

        /// append the session summary row to this CSV log
        #[clap(long)]
        summary_log: Option<PathBuf>,

        /// write the per-repetition table to this CSV
        #[clap(long)]
        rep_csv: Option<PathBuf>,
    },
}

fn load_config(path: &Option<PathBuf>) -> ExerciseConfig {
    match path {
        Some(p) => FileConfigStore::with_path(p).load(),
        None => FileConfigStore::new().load(),
    }
}

fn print_report(report: &ReplayReport) {
    for line in &report.transitions {
        println!("{}", line);
    }

    let s = &report.summary;
    println!();
    println!("exercise:        {} ({} hand)", s.exercise_id, s.hand);
    println!("duration:        {:.1}s", s.duration_secs);
    println!("repetitions:     {}", s.rep_count);
    println!("reps/minute:     {:.2}", s.reps_per_minute);
    println!(
        "rep time:        avg {:.2}s  min {:.2}s  max {:.2}s  sd {:.2}s",
        s.avg_rep_secs, s.min_rep_secs, s.max_rep_secs, s.rep_time_std_dev_secs
    );
    if let Some(tt) = s.time_to_target_reps_secs {
        println!("time to target:  {:.1}s", tt);
    }
    println!(
        "elbow extension: max {:.1}°  avg {:.1}°",
        s.elbow_extension.max_deg, s.elbow_extension.avg_deg
    );
    println!(
        "shoulder flex:   max {:.1}°  avg {:.1}°",
        s.shoulder_flexion.max_deg, s.shoulder_flexion.avg_deg
    );
    println!(
        "shoulder abd:    max {:.1}°  avg {:.1}°",
        s.shoulder_abduction.max_deg, s.shoulder_abduction.avg_deg
    );
}

fn export_outputs(
    report: &ReplayReport,
    summary_log: &Option<PathBuf>,
    rep_csv: &Option<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    if let Some(path) = summary_log {
        export::append_summary(path, &report.summary)?;
        println!("summary appended to {}", display(path));
    }
    if let Some(path) = rep_csv {
        export::write_rep_details(path, &report.rep_records)?;
        println!("rep table written to {}", display(path));
    }
    Ok(())
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Replay {
            frames,
            config,
            frame_interval_ms,
            keep_recorded_zones,
            summary_log,
            rep_csv,
        } => {
            let exercise = load_config(&config);
            let stream = replay::read_frames(&frames)?;
            println!("replaying {} frames from {}", stream.len(), display(&frames));

            let opts = ReplayOptions {
                frame_interval_ms,
                recompute_zones: !keep_recorded_zones,
            };
            let report = replay::drive(exercise, &stream, &opts);
            print_report(&report);
            export_outputs(&report, &summary_log, &rep_csv)?;
        }
        Command::Simulate {
            reps,
            seed,
            dwell,
            config,
            frame_interval_ms,
            record,
            summary_log,
            rep_csv,
        } => {
            let exercise = load_config(&config);
            let mut simulator = SessionSimulator::new(
                exercise.clone(),
                SimulationConfig {
                    reps,
                    seed,
                    by_dwell: dwell,
                    ..SimulationConfig::default()
                },
            );
            let stream = simulator.generate();
            println!(
                "simulating {} repetitions over {} frames ({})",
                reps,
                stream.len(),
                if dwell { "dwell path" } else { "grip path" }
            );

            if let Some(path) = &record {
                replay::write_frames(path, &stream)?;
                println!("frames recorded to {}", display(path));
            }

            let opts = ReplayOptions {
                frame_interval_ms,
                recompute_zones: true,
            };
            let report = replay::drive(exercise, &stream, &opts);
            print_report(&report);
            export_outputs(&report, &summary_log, &rep_csv)?;
        }
    }

    Ok(())
}
