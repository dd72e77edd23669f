//! recognize - run the object recognizer on an image, a video file or a camera
//!
//! Exactly one of `--image`, `--video` or `--camera` selects the input.
//! Detections are printed to stdout as JSON; `--write` persists the
//! annotated result as `DETECTED_{name}` in the artifacts directory.

use anyhow::Result;
use clap::{CommandFactory, Parser};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use object_recognizer::config::RecognizerConfig;
use object_recognizer::detect::{Detection, Recognizer};
use object_recognizer::ingest::CameraConfig;
use object_recognizer::media::{
    artifact_name, CaptureSession, MediaController, Preview, CAMERA_OUTPUT_NAME,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Image file to process.
    #[arg(short = 'i', long, value_name = "PATH")]
    image: Option<PathBuf>,
    /// Video file to process.
    #[arg(short = 'v', long, value_name = "PATH")]
    video: Option<PathBuf>,
    /// Capture from a camera instead of a file.
    #[arg(long)]
    camera: bool,
    /// Camera index used with --camera.
    #[arg(long, env = "RECOGNIZER_CAMERA_INDEX", default_value_t = 0)]
    camera_index: u32,
    /// Explicit camera device, overriding --camera-index.
    #[arg(long, env = "RECOGNIZER_CAMERA_DEVICE", value_name = "DEVICE")]
    device: Option<String>,
    /// Persist the annotated output to the artifacts directory.
    #[arg(long)]
    write: bool,
    /// Keep a local preview of the annotated output (debug only).
    #[arg(long)]
    show: bool,
    /// Plain stderr progress even on a terminal.
    #[arg(long)]
    plain: bool,
}

impl Args {
    fn input_modes(&self) -> usize {
        [self.image.is_some(), self.video.is_some(), self.camera]
            .into_iter()
            .filter(|selected| *selected)
            .count()
    }

    fn camera_config(&self) -> CameraConfig {
        match &self.device {
            Some(device) => CameraConfig {
                device: device.clone(),
                ..CameraConfig::default()
            },
            None => CameraConfig::for_index(self.camera_index),
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if args.input_modes() != 1 {
        Args::command().print_help()?;
        println!();
        return Ok(());
    }

    let ui = ui::Ui::new(std::io::stderr().is_terminal(), args.plain);
    let cfg = RecognizerConfig::load()?;
    let recognizer = {
        let _stage = ui.stage("Load model");
        Recognizer::from_config(&cfg)?
    };
    let controller = MediaController::from_config(Arc::new(recognizer), &cfg);

    let detections = if let Some(path) = &args.image {
        let report = {
            let _stage = ui.stage("Detect objects");
            controller.detect_image_file(path, args.write)?
        };
        if let Some(saved) = &report.saved_to {
            log::info!("annotated image written to {}", saved.display());
        }
        if args.show {
            let preview = Preview::new(&path.to_string_lossy());
            preview.update(&report.image)?;
            preview.wait_for_quit()?;
        }
        report.detections
    } else if let Some(path) = &args.video {
        let name = artifact_name(&path.to_string_lossy())?;
        let session = controller.open_video_file(path, args.write.then_some(name.as_str()))?;
        run_frames(&controller, &ui, session, args.show)?
    } else {
        let session = controller.open_camera(
            args.camera_config(),
            args.write.then_some(CAMERA_OUTPUT_NAME),
        )?;
        run_frames(&controller, &ui, session, args.show)?
    };

    println!("{}", serde_json::to_string_pretty(&detections)?);
    Ok(())
}

fn run_frames(
    controller: &MediaController,
    ui: &ui::Ui,
    session: CaptureSession,
    show: bool,
) -> Result<Vec<Detection>> {
    let origin = session.describe();
    let preview = show.then(|| Preview::new(&origin));
    if let Some(preview) = &preview {
        log::info!("preview frames go to {}", preview.path().display());
    }
    let mut progress = ui.frames(&origin, controller.video_settings().frame_cap);
    controller.run_session(session, |index, frame, found| {
        progress.frame_done(index, found.len());
        match &preview {
            Some(preview) => preview.update(frame),
            None => Ok(()),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_index_selects_device() {
        let args = Args::try_parse_from(["recognize", "--camera", "--camera-index", "2"]).unwrap();
        assert_eq!(args.input_modes(), 1);
        assert_eq!(args.camera_config().device, "/dev/video2");
    }

    #[test]
    fn explicit_device_wins_over_index() {
        let args = Args::try_parse_from([
            "recognize",
            "--camera",
            "--camera-index",
            "3",
            "--device",
            "stub://camera",
        ])
        .unwrap();
        assert_eq!(args.camera_config().device, "stub://camera");
    }

    #[test]
    fn two_modes_are_rejected() {
        let args = Args::try_parse_from(["recognize", "-i", "a.png", "--camera"]).unwrap();
        assert_eq!(args.input_modes(), 2);
    }
}
