//! Capture raw frames from /dev/video0 into the current directory.

use std::process::ExitCode;

use log::{error, info, warn};
use v4l2_frame_dump::{CaptureConfig, CaptureReport, CaptureSession, FrameWriter};

fn main() -> ExitCode {
    init_logging();

    match run() {
        Ok(report) => {
            summarize(&report);
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err}");
            err.exit_code()
        }
    }
}

fn run() -> v4l2_frame_dump::Result<CaptureReport> {
    let config = CaptureConfig::default();
    config.validate()?;

    let writer = FrameWriter::new(&config.output_dir);
    let mut session = CaptureSession::open(config)?;
    let report = session.capture(&writer);
    session.close();

    Ok(report)
}

fn summarize(report: &CaptureReport) {
    info!(
        "Saved {} of {} frames",
        report.saved.len(),
        report.requested
    );
    if report.save_failures > 0 {
        warn!("{} frames could not be written", report.save_failures);
    }
    if let Some(err) = &report.stopped {
        warn!("Capture ended early: {err}");
    }
    let dropped = report.dropped_frames();
    if dropped > 0 {
        warn!("Driver dropped {dropped} frames during capture");
    }
}

/// Initialize env_logger, defaulting to info unless RUST_LOG says otherwise
fn init_logging() {
    let env = env_logger::Env::default().default_filter_or("info");

    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_target(false)
        .init();
}
