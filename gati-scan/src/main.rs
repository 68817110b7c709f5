//! gati-scan-node - laser scan odometry over a recorded session
//!
//! Reads a JSON-lines session (scans, clouds, odometry, inertial and
//! velocity samples, frame tree updates), runs keyframe scan odometry and
//! writes the resulting poses as JSON lines.
//!
//! # Usage
//!
//! ```bash
//! # Offline, as fast as possible, poses to stdout
//! gati-scan-node --input session.jsonl
//!
//! # Paced by recorded timestamps, newest scan wins
//! gati-scan-node --config gati-scan.toml --input session.jsonl --output poses.jsonl --realtime
//! ```

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;

use gati_scan::io::replay::{Pacer, ReplayReader, ReplayRouter};
use gati_scan::state::LatestSlot;
use gati_scan::threads::MatcherThread;
use gati_scan::{
    CycleOutcome, JsonLinesSink, MotionInputs, NodeConfig, PointToLineIcp, PosePublisher,
    PoseSink, ScanOdometry, TransformBuffer,
};

#[derive(Parser, Debug)]
#[command(name = "gati-scan-node", version, about = "Keyframe laser scan odometry")]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Recorded session (JSON lines)
    #[arg(short, long)]
    input: PathBuf,

    /// Pose output file (JSON lines), stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pace records by their timestamps and match on a worker thread
    #[arg(long)]
    realtime: bool,
}

fn load_config(path: Option<&Path>) -> NodeConfig {
    let Some(path) = path else {
        log::info!("No config file given, using defaults");
        return NodeConfig::default();
    };
    match NodeConfig::load(path) {
        Ok(config) => {
            log::info!("Loaded config from {}", path.display());
            config
        }
        Err(e) => {
            log::warn!("Failed to load config {}: {}", path.display(), e);
            NodeConfig::default()
        }
    }
}

fn open_sink(path: Option<&Path>) -> gati_scan::Result<Box<dyn PoseSink + Send>> {
    Ok(match path {
        Some(path) => Box::new(JsonLinesSink::new(BufWriter::new(File::create(path)?))),
        None => Box::new(JsonLinesSink::new(std::io::stdout())),
    })
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {} - {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_deref());

    log::info!("gati-scan-node starting");
    log::info!("  Input: {}", args.input.display());
    log::info!(
        "  Frames: {} -> {}",
        config.frames.fixed_frame,
        config.frames.base_frame
    );
    log::info!(
        "  Mode: {}",
        if args.realtime { "realtime" } else { "offline" }
    );

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    }) {
        log::warn!("Could not install Ctrl-C handler: {}", e);
    }

    if let Err(e) = run(&config, &args, running) {
        log::error!("gati-scan-node failed: {}", e);
        std::process::exit(1);
    }

    log::info!("gati-scan-node shutdown complete");
}

fn run(config: &NodeConfig, args: &Args, running: Arc<AtomicBool>) -> gati_scan::Result<()> {
    let tf = Arc::new(TransformBuffer::new());
    let inputs = MotionInputs::new(config.prediction.velocity_format());
    let mut odometry = ScanOdometry::new(
        config.scan_odometry(),
        PointToLineIcp::new(config.matcher.clone()),
        inputs.clone(),
        tf.clone(),
    );
    let publisher = PosePublisher::new(
        config.output.flags(),
        &config.frames.base_frame,
        &config.frames.fixed_frame,
    );
    let mut sink = open_sink(args.output.as_deref())?;

    let reader = ReplayReader::open(&args.input)?;
    let mut router = ReplayRouter::new(inputs, tf, config.input.use_cloud_input);

    if !args.realtime {
        for record in reader {
            if !running.load(Ordering::Relaxed) {
                break;
            }
            if let Some(scan) = router.route(record?)
                && let CycleOutcome::Estimated(estimate) = odometry.process(scan)
            {
                publisher.publish(&mut sink, &estimate)?;
            }
        }
        log::info!("Finished: {:?}", odometry.stats());
        return Ok(());
    }

    let slot = Arc::new(LatestSlot::new());
    let matcher = MatcherThread::spawn(odometry, publisher, sink, slot.clone(), running.clone())?;
    let mut pacer = Pacer::new();

    let mut result = Ok(());
    for record in reader {
        if !running.load(Ordering::Relaxed) {
            break;
        }
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                result = Err(e);
                break;
            }
        };
        if let Some(stamp_us) = record.stamp_us() {
            pacer.wait(stamp_us);
        }
        if let Some(scan) = router.route(record) {
            slot.put(scan);
        }
    }

    running.store(false, Ordering::SeqCst);
    match matcher.join() {
        Ok(stats) => log::info!("Finished: {:?}", stats),
        Err(_) => log::error!("Matcher thread panicked"),
    }
    result
}
