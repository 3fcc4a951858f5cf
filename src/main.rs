// src/main.rs

mod binary_mask;
mod calibration;
mod centroids;
mod config;
mod fitting;
mod overlay;
mod tracking;
mod types;
mod video_processor;
mod warp;

use anyhow::Result;
use calibration::Undistorter;
use centroids::CentroidDetector;
use fitting::GeometryParams;
use opencv::prelude::*;
use std::io::Write;
use std::path::Path;
use std::time::Instant;
use tracking::{LaneSession, RocReading};
use tracing::{error, info};
use warp::Warper;

fn main() -> Result<()> {
    let config = types::Config::load("config.yaml")?;

    tracing_subscriber::fmt()
        .with_env_filter(format!("lane_finder={}", config.logging.level))
        .init();

    info!("🛣️ Lane Finder Starting");
    info!("✓ Configuration loaded and validated");
    info!(
        "Tracking config: window={}, z_max={:.1}, straight above {:.0} m",
        config.tracking.smooth_window, config.tracking.z_max, config.tracking.roc_straight_threshold
    );

    let undistorter = Undistorter::new(&config.camera)?;
    let warper = Warper::new(&config.warp)?;
    let detector = CentroidDetector::new(config.centroids.clone());
    let video_processor = video_processor::VideoProcessor::new(config.video.clone());

    let video_files = video_processor.find_video_files()?;
    if video_files.is_empty() {
        error!("No video files found in {}", config.video.input_dir);
        return Ok(());
    }

    info!("Found {} video file(s) to process", video_files.len());

    for (idx, video_path) in video_files.iter().enumerate() {
        info!("\n========================================");
        info!(
            "Processing video {}/{}: {}",
            idx + 1,
            video_files.len(),
            video_path.display()
        );
        info!("========================================\n");

        match process_video(
            video_path,
            &config,
            &video_processor,
            &undistorter,
            &warper,
            &detector,
        ) {
            Ok(stats) => {
                info!("\n✓ Video processed successfully!");
                info!("  Total frames: {}", stats.total_frames);
                info!(
                    "  Frames with lane lock: {} ({:.1}%)",
                    stats.accepted_frames,
                    100.0 * stats.accepted_frames as f64 / stats.total_frames.max(1) as f64
                );
                info!("  Processing Speed: {:.1} FPS", stats.avg_fps);
            }
            Err(e) => {
                error!("Failed to process video: {}", e);
            }
        }
    }

    Ok(())
}

struct ProcessingStats {
    total_frames: u64,
    accepted_frames: u64,
    avg_fps: f64,
}

fn process_video(
    video_path: &Path,
    config: &types::Config,
    video_processor: &video_processor::VideoProcessor,
    undistorter: &Undistorter,
    warper: &Warper,
    detector: &CentroidDetector,
) -> Result<ProcessingStats> {
    let start_time = Instant::now();

    let mut reader = video_processor.open_video(video_path)?;
    let mut writer =
        video_processor.create_writer(video_path, reader.width, reader.height, reader.fps)?;

    // One session per video: the histories must never leak across sources.
    let mut session = LaneSession::new(
        config.tracking.clone(),
        GeometryParams::from_frame_dims(reader.width, reader.height),
    );

    let mut estimates_file = if config.video.save_estimates {
        std::fs::create_dir_all(&config.video.output_dir)?;
        let video_name = video_path.file_stem().unwrap().to_str().unwrap();
        let jsonl_path = Path::new(&config.video.output_dir)
            .join(format!("{}_estimates.jsonl", video_name));
        info!("💾 Estimates will be written to: {}", jsonl_path.display());
        Some(std::fs::File::create(&jsonl_path)?)
    } else {
        None
    };

    while let Some(frame) = reader.read_frame()? {
        // A frame that fails before the estimator leaves the session
        // untouched; the next frame picks up where this one left off.
        let (undistorted, left_obs, right_obs) =
            match detect_observations(&frame, config, undistorter, warper, detector) {
                Ok(detected) => detected,
                Err(e) => {
                    error!("Frame {} failed: {}", reader.current_frame, e);
                    continue;
                }
            };

        let estimate = session.process_frame(left_obs, right_obs);

        if session.frame_count() % 50 == 0 {
            info!(
                "Progress: {:.1}% ({}/{}) | Evidence: {} | Lock: {}/{}",
                reader.progress(),
                reader.current_frame,
                reader.total_frames,
                estimate.evidence.as_str(),
                session.accepted_frames(),
                session.frame_count(),
            );
        }

        if let Some(ref mut file) = estimates_file {
            let roc_m = match estimate.roc {
                RocReading::Meters(roc) => Some(roc),
                RocReading::Straight | RocReading::Acquiring => None,
            };
            let line = serde_json::json!({
                "frame": estimate.frame,
                "evidence": estimate.evidence.as_str(),
                "roc_m": roc_m,
                "straight": estimate.roc == RocReading::Straight,
                "offset_m": estimate.offset_m,
            });
            writeln!(file, "{}", line)?;
        }

        if let Some(ref mut w) = writer {
            let annotated = overlay::render(&undistorted, warper, &estimate)?;
            use opencv::videoio::VideoWriterTrait;
            w.write(&annotated)?;
        }
    }

    let duration = start_time.elapsed();
    let total_frames = session.frame_count();
    let avg_fps = total_frames as f64 / duration.as_secs_f64();

    info!("\n📊 Final Report:");
    info!("  Frames processed: {}", total_frames);
    info!(
        "  Frames with lane lock: {} ({:.1}%)",
        session.accepted_frames(),
        100.0 * session.accepted_frames() as f64 / total_frames.max(1) as f64
    );
    if total_frames > 0 && session.accepted_frames() == 0 {
        info!("  ⚠️ Lane was never acquired in this video");
    }
    info!("  Processing Speed: {:.1} FPS", avg_fps);

    Ok(ProcessingStats {
        total_frames,
        accepted_frames: session.accepted_frames(),
        avg_fps,
    })
}

/// Per-frame stateless pipeline: undistort, threshold, warp, scan for
/// centroids. Returns the corrected frame alongside both observations.
fn detect_observations(
    frame: &opencv::core::Mat,
    config: &types::Config,
    undistorter: &Undistorter,
    warper: &Warper,
    detector: &CentroidDetector,
) -> Result<(opencv::core::Mat, types::CentroidObservation, types::CentroidObservation)> {
    let undistorted = undistorter.undistort(frame)?;
    let mask = binary_mask::extract_binary_mask(&undistorted, &config.mask)?;
    let warped_mask = warper.warp(&mask)?;

    let (left_obs, right_obs) = detector.detect(
        warped_mask.data_bytes()?,
        warped_mask.cols() as usize,
        warped_mask.rows() as usize,
    );

    Ok((undistorted, left_obs, right_obs))
}
