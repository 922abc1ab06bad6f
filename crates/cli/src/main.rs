use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{ArgAction, Parser};

use facecam_core::capture::domain::frame_source::FrameSource;
use facecam_core::capture::infrastructure::image_sequence_source::ImageSequenceSource;
use facecam_core::capture::infrastructure::synthetic_camera::SyntheticCamera;
use facecam_core::detection::domain::capabilities::Capability;
use facecam_core::detection::domain::face_detector::FaceDetector;
use facecam_core::detection::domain::face_detector_mode::FaceDetectorMode;
use facecam_core::detection::infrastructure::replay_face_detector::ReplayFaceDetector;
use facecam_core::output::infrastructure::csv_metrics_sink::CsvMetricsSink;
use facecam_core::output::infrastructure::image_overlay_renderer::ImageOverlayRenderer;
use facecam_core::pipeline::consumer_loop::{ConsumerLoop, PollStrategy};
use facecam_core::pipeline::detection_session::DetectionSession;
use facecam_core::pipeline::listeners::PipelineHandles;
use facecam_core::pipeline::pipeline_logger::LogPipelineLogger;
use facecam_core::pipeline::result_channel::OverflowPolicy;
use facecam_core::pipeline::session_config::SessionConfig;
use facecam_core::shared::constants::{DEFAULT_OUTPUT_PATH, DEFAULT_SNAPSHOT_EVERY};

/// Live face and expression metrics from a camera.
///
/// Settings not given on the command line come from the config file, then
/// from built-in defaults.
#[derive(Parser)]
#[command(name = "facecam")]
struct Cli {
    /// Folder holding the detector's classifier data [default: data].
    #[arg(short = 'd', long = "data")]
    data: Option<PathBuf>,

    /// License file [default: test.license].
    #[arg(short = 'l', long)]
    license: Option<PathBuf>,

    /// Target processing framerate [default: 30].
    #[arg(long)]
    pfps: Option<f64>,

    /// Camera capture framerate [default: 30].
    #[arg(long)]
    cfps: Option<f64>,

    /// Camera id [default: 0].
    #[arg(long)]
    cid: Option<u32>,

    /// Face detector mode: large or small [default: large].
    #[arg(long)]
    face_mode: Option<FaceDetectorMode>,

    /// Number of faces to track [default: 1].
    #[arg(long)]
    num_faces: Option<usize>,

    /// Draw face boxes on each processed frame.
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    draw: bool,

    /// Metrics CSV file.
    #[arg(long, default_value = DEFAULT_OUTPUT_PATH)]
    output: PathBuf,

    /// JSON settings file (defaults to the platform config folder).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Replay frames from a folder of images instead of the camera.
    #[arg(long)]
    frames_dir: Option<PathBuf>,

    /// Recorded detections (JSON, keyed by frame index) to replay.
    #[arg(long)]
    detections: Option<PathBuf>,

    /// Stop after this many seconds (Ctrl-C also stops cleanly).
    #[arg(long)]
    duration: Option<f64>,

    /// Stop the synthetic camera after this many frames.
    #[arg(long)]
    max_frames: Option<usize>,

    /// Result buffer size before the overflow policy applies [default: 64].
    #[arg(long)]
    capacity: Option<usize>,

    /// Overflow policy: drop-oldest, drop-newest or unbounded.
    #[arg(long)]
    overflow: Option<OverflowPolicy>,

    /// Comma-separated capabilities to detect [default: all].
    #[arg(long, value_delimiter = ',')]
    detect: Option<Vec<Capability>>,

    /// Save an annotated snapshot to this directory (requires --draw).
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,

    /// Rendered frames between snapshots.
    #[arg(long, default_value_t = DEFAULT_SNAPSHOT_EVERY)]
    snapshot_every: usize,

    /// Poll the result buffer without sleeping.
    #[arg(long)]
    busy_spin: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let config = build_config(&cli)?;
    // Opened before the camera.
    let sink = CsvMetricsSink::create(&cli.output, config.capabilities)?;

    let cancelled = Arc::new(AtomicBool::new(false));
    let on_interrupt = cancelled.clone();
    ctrlc::set_handler(move || {
        log::info!("Interrupted, stopping");
        on_interrupt.store(true, Ordering::Relaxed);
    })?;

    let handles = PipelineHandles::new(config.overflow);
    let listener = Arc::new(handles.clone());
    let mut session = DetectionSession::new(
        config,
        build_source(&cli),
        build_detector(&cli)?,
        listener.clone(),
        listener,
    );
    session.start()?;

    if let Some(secs) = cli.duration {
        spawn_timer(Duration::from_secs_f64(secs), cancelled.clone());
    }

    let poll = if cli.busy_spin {
        PollStrategy::BusySpin
    } else {
        PollStrategy::default()
    };
    let mut consumer = ConsumerLoop::new(
        handles.clone(),
        Box::new(sink),
        Box::new(LogPipelineLogger::new()),
    )
    .with_cancel(cancelled)
    .with_poll(poll);
    if cli.draw {
        let mut renderer = ImageOverlayRenderer::new();
        if let Some(dir) = &cli.snapshot_dir {
            renderer = renderer.with_snapshots(dir, cli.snapshot_every);
        }
        consumer = consumer.with_renderer(Box::new(renderer));
    }

    let report = consumer.run();
    session.stop();

    if let Some(reason) = handles.status.stop_reason() {
        log::info!("Session stopped: {reason}");
    }
    log::info!(
        "Processed {} results ({} dropped, {} render failures, {} write failures)",
        report.processed,
        report.channel.dropped(),
        report.render_failures,
        report.sink_failures
    );
    log::info!("Metrics written to {}", cli.output.display());
    Ok(())
}

fn build_config(cli: &Cli) -> Result<SessionConfig, Box<dyn std::error::Error>> {
    let mut config = SessionConfig::load_or_default(cli.config.as_deref())?;
    if let Some(data) = &cli.data {
        config.data_dir = data.clone();
    }
    if let Some(license) = &cli.license {
        config.license_path = license.clone();
    }
    if let Some(fps) = cli.pfps {
        config.processing_fps = fps;
    }
    if let Some(fps) = cli.cfps {
        config.camera_fps = fps;
    }
    if let Some(id) = cli.cid {
        config.camera_id = id;
    }
    if let Some(mode) = cli.face_mode {
        config.face_mode = mode;
    }
    if let Some(n) = cli.num_faces {
        config.max_faces = n;
    }
    if let Some(list) = &cli.detect {
        config.capabilities = list.iter().copied().collect();
    }
    if let Some(policy) = cli.overflow {
        config.overflow = policy;
    }
    if let Some(capacity) = cli.capacity {
        config.overflow = config.overflow.with_capacity(capacity);
    }
    Ok(config)
}

fn build_source(cli: &Cli) -> Box<dyn FrameSource> {
    if let Some(dir) = &cli.frames_dir {
        return Box::new(ImageSequenceSource::new(dir));
    }
    let camera = SyntheticCamera::new();
    match cli.max_frames {
        Some(n) => Box::new(camera.with_max_frames(n)),
        None => Box::new(camera),
    }
}

fn build_detector(cli: &Cli) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
    match &cli.detections {
        Some(path) => Ok(Box::new(ReplayFaceDetector::load(path)?)),
        None => {
            log::warn!("No recorded detections given; no faces will be reported");
            Ok(Box::new(ReplayFaceDetector::empty()))
        }
    }
}

fn spawn_timer(after: Duration, cancelled: Arc<AtomicBool>) {
    std::thread::spawn(move || {
        std::thread::sleep(after);
        log::info!("Run time of {:.1}s reached, stopping", after.as_secs_f64());
        cancelled.store(true, Ordering::Relaxed);
    });
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(secs) = cli.duration {
        if !(secs.is_finite() && secs > 0.0) {
            return Err(format!("Duration must be a positive number of seconds, got {secs}").into());
        }
    }
    if cli.capacity == Some(0) {
        return Err("Capacity must be at least 1".into());
    }
    if cli.snapshot_every == 0 {
        return Err("Snapshot interval must be at least 1".into());
    }
    if cli.snapshot_dir.is_some() && !cli.draw {
        return Err("--snapshot-dir requires --draw".into());
    }
    if let Some(dir) = &cli.frames_dir {
        if !dir.is_dir() {
            return Err(format!("Frames folder not found: {}", dir.display()).into());
        }
        if cli.max_frames.is_some() {
            return Err("--max-frames only applies to the camera, not --frames-dir".into());
        }
    }
    Ok(())
}
