use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sentrycam::archive::{ArchivePipeline, FfmpegRemuxer, SysinfoProbe, VolumeProbe};
use sentrycam::labels::{load_labels, WatchList};
use sentrycam::shutdown::TimedatectlClock;
use sentrycam::testing::{
    CopyTranscoder, CountingPower, FileSinkEncoder, PulseDetector, SyntheticSource,
};
use sentrycam::{Agent, AgentConfig, AgentError, CameraTuning};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    sentrycam::init_logging();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: sentrycam-cli <command> [args]");
        eprintln!("Commands: run, sweep, volumes, resolve-labels");
        std::process::exit(1);
    }

    let command = &args[1];
    match command.as_str() {
        "run" => cmd_run(&args),
        "sweep" => cmd_sweep(&args),
        "volumes" => cmd_volumes(&args),
        "resolve-labels" => cmd_resolve_labels(&args),
        _ => {
            eprintln!("Unknown command: {}", command);
            std::process::exit(1);
        }
    }
}

fn load_config(args: &[String]) -> Result<AgentConfig, Box<dyn std::error::Error>> {
    let mut path = AgentConfig::default_path();
    let mut i = 2;
    while i < args.len() {
        if args[i] == "--config" {
            i += 1;
            path = PathBuf::from(&args[i]);
        }
        i += 1;
    }
    Ok(AgentConfig::load_from_file(path)?)
}

/// Run the control loop with synthetic camera/accelerator/encoder stand-ins.
/// A real appliance wires hardware implementations of the same seams.
fn cmd_run(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(args)?;

    // Parse args: run [--config <path>] [-m <model>] [-l <labels>] [-s <thresh>]
    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "-m" | "--model" => {
                i += 1;
                config.detection.model_path = args[i].clone();
            }
            "-l" | "--labels" => {
                i += 1;
                config.detection.labels_path = args[i].clone();
            }
            "-s" | "--score-thresh" => {
                i += 1;
                config.detection.score_threshold = args[i].parse()?;
            }
            _ => {}
        }
        i += 1;
    }

    config.validate().map_err(AgentError::ConfigError)?;

    let labels = load_labels(Path::new(&config.detection.labels_path))?;
    let watch = WatchList::resolve(&labels, &config.detection.watch)?;
    log::info!(
        "watching {} classes from {} labels (threshold {:.2})",
        watch.entries().len(),
        labels.len(),
        config.detection.score_threshold
    );

    let tuning = CameraTuning::load_or_create(&config.recording.tuning_path)?;
    log::info!(
        "camera tuning: mode {} speed {} gain {}",
        tuning.mode_name(),
        tuning.speed,
        tuning.gain
    );

    let trigger_class = watch.entries()[0].class_id;
    let fps = config.recording.fps.max(1);
    let source = SyntheticSource::new(config.recording.width, config.recording.height)
        .with_interval(Duration::from_millis(1000 / fps as u64));
    // A burst long enough to start and extend a recording, roughly every
    // 30 seconds of synthetic footage.
    let detector = PulseDetector::new(trigger_class, labels.len(), 0.8, 30 * fps as u64, 3);

    log::info!("synthetic collaborators in use (no camera backend compiled in)");
    let mut agent = Agent::new(
        &config,
        watch,
        Box::new(source),
        Box::new(detector),
        Box::new(FileSinkEncoder::new()),
        Box::new(CopyTranscoder),
        Box::new(SysinfoProbe),
        Box::new(TimedatectlClock),
        Box::new(CountingPower::new()),
    );

    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))?;

    agent.run(&stop)?;
    Ok(())
}

/// One-shot archive sweep over the configured storage tree.
fn cmd_sweep(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(args)?;
    config.validate().map_err(AgentError::ConfigError)?;

    let mut pipeline = ArchivePipeline::new(
        &config,
        Box::new(FfmpegRemuxer::new(config.recording.fps)),
        Box::new(SysinfoProbe),
    );
    let report = pipeline.sweep(&HashSet::new())?;

    if args.contains(&"--json".to_string()) {
        println!("{}", serde_json::to_string(&report)?);
    } else {
        println!(
            "{} transcoded, {} relocated, {} offloaded, {} failures",
            report.transcoded, report.relocated, report.offloaded, report.failures
        );
    }
    Ok(())
}

fn cmd_volumes(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(args)?;
    let mut media_root = config.storage.media_root.clone();
    let mut i = 2;
    while i < args.len() {
        if args[i] == "--media-root" {
            i += 1;
            media_root = PathBuf::from(&args[i]);
        }
        i += 1;
    }

    let probe = SysinfoProbe;
    let volumes = probe.removable_volumes(&media_root);
    let json = args.contains(&"--json".to_string());

    let mut rows = Vec::new();
    for volume in &volumes {
        let used = probe.used_percent(volume).ok();
        if json {
            rows.push(serde_json::json!({
                "mount": volume,
                "used_percent": used,
            }));
        } else {
            match used {
                Some(pct) => println!("{}: {:.1}% used", volume.display(), pct),
                None => println!("{}: capacity unknown", volume.display()),
            }
        }
    }
    if json {
        println!("{}", serde_json::to_string(&rows)?);
    } else if volumes.is_empty() {
        println!("no removable volumes under {}", media_root.display());
    }
    Ok(())
}

fn cmd_resolve_labels(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    if args.len() < 4 {
        eprintln!("Usage: sentrycam-cli resolve-labels <labels-file> <name>... [--json]");
        std::process::exit(1);
    }

    let labels = load_labels(Path::new(&args[2]))?;
    let names: Vec<String> = args[3..]
        .iter()
        .filter(|a| *a != "--json")
        .cloned()
        .collect();
    let watch = WatchList::resolve(&labels, &names)?;

    if args.contains(&"--json".to_string()) {
        println!("{}", serde_json::to_string(watch.entries())?);
    } else {
        for entry in watch.entries() {
            println!("{}: {}", entry.class_id, entry.name);
        }
    }
    Ok(())
}
