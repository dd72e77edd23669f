use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use tempfile::TempDir;

use object_recognizer::config::{RecognizerConfig, Thresholds, VideoSettings};
use object_recognizer::detect::{Annotator, Palette, Recognizer};
use object_recognizer::ingest::{CameraConfig, CameraSource, FileConfig, FileSource, FrameSource};
use object_recognizer::error::classify;
use object_recognizer::media::MediaController;
use object_recognizer::model::{ModelHandle, ModelSpec, StubBackend};
use object_recognizer::RecognizerError;

/// One confident "person" in the middle of the frame.
fn person_rows() -> Vec<Vec<f32>> {
    vec![vec![0.5, 0.5, 0.2, 0.2, 1.0, 0.95, 0.1]]
}

fn controller(rows: &[Vec<f32>], artifacts: &Path, frame_cap: u32) -> MediaController {
    let model = ModelHandle::new(
        Box::new(StubBackend::from_rows(rows)),
        vec!["person".to_string(), "car".to_string()],
        ModelSpec::default(),
    )
    .expect("stub model");
    let recognizer = Recognizer::new(
        Arc::new(model),
        Thresholds::default(),
        Annotator::without_text(Palette::ByClass),
    );
    MediaController::new(
        Arc::new(recognizer),
        artifacts.to_path_buf(),
        VideoSettings {
            frame_cap,
            ..VideoSettings::default()
        },
    )
}

fn png_bytes(image: &RgbImage) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(image.clone())
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("encode png");
    buf
}

/// Camera wrapper that records whether it was released.
struct TrackedCamera {
    inner: CameraSource,
    released: Arc<AtomicBool>,
}

impl FrameSource for TrackedCamera {
    fn describe(&self) -> String {
        self.inner.describe()
    }

    fn frame_size(&self) -> Option<(u32, u32)> {
        self.inner.frame_size()
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        self.inner.next_frame()
    }

    fn release(&mut self) -> Result<()> {
        self.released.store(true, Ordering::SeqCst);
        self.inner.release()
    }

    fn is_released(&self) -> bool {
        self.inner.is_released()
    }
}

fn stub_camera() -> CameraSource {
    CameraSource::open(CameraConfig {
        device: "stub://camera".to_string(),
        ..CameraConfig::default()
    })
    .expect("stub camera")
}

#[test]
fn single_object_image_yields_one_detection() -> Result<()> {
    let dir = TempDir::new()?;
    let controller = controller(&person_rows(), dir.path(), 20);
    let image = RgbImage::from_pixel(320, 320, Rgb([90, 90, 90]));

    let report = controller.detect_image_bytes(&png_bytes(&image), None)?;

    assert_eq!(report.detections.len(), 1);
    let json = serde_json::to_value(&report.detections)?;
    assert_eq!(
        json,
        serde_json::json!([{ "label": "person", "confidence": "0.95", "center": [160, 160] }])
    );
    assert_ne!(report.image, image, "box should be drawn");
    assert!(report.saved_to.is_none());
    Ok(())
}

#[test]
fn identical_bytes_give_identical_detections() -> Result<()> {
    let dir = TempDir::new()?;
    let controller = controller(
        &[
            vec![0.3, 0.4, 0.2, 0.3, 1.0, 0.8, 0.1],
            vec![0.7, 0.6, 0.1, 0.1, 1.0, 0.1, 0.66],
        ],
        dir.path(),
        20,
    );
    let bytes = png_bytes(&RgbImage::from_pixel(640, 480, Rgb([10, 200, 30])));

    let first = controller.detect_image_bytes(&bytes, None)?;
    let second = controller.detect_image_bytes(&bytes, None)?;

    assert_eq!(first.detections, second.detections);
    assert_eq!(first.image, second.image);
    assert_eq!(first.detections.len(), 2);
    for detection in &first.detections {
        assert!(detection.confidence >= 0.5 && detection.confidence <= 1.0);
        assert!((0..640).contains(&detection.center[0]));
        assert!((0..480).contains(&detection.center[1]));
    }
    Ok(())
}

#[test]
fn no_confident_rows_leave_image_unchanged() -> Result<()> {
    let dir = TempDir::new()?;
    let controller = controller(&[vec![0.5, 0.5, 0.2, 0.2, 1.0, 0.4, 0.3]], dir.path(), 20);
    let image = RgbImage::from_pixel(320, 240, Rgb([5, 6, 7]));

    let report = controller.detect_image(image.clone(), None)?;

    assert!(report.detections.is_empty());
    assert_eq!(report.image, image);
    Ok(())
}

#[test]
fn persisted_image_lands_in_artifacts_dir() -> Result<()> {
    let dir = TempDir::new()?;
    let controller = controller(&person_rows(), dir.path(), 20);
    let bytes = png_bytes(&RgbImage::from_pixel(320, 320, Rgb([0, 0, 0])));

    let report = controller.detect_image_bytes(&bytes, Some("../street.png"))?;

    let expected = dir.path().join("DETECTED_street.png");
    assert_eq!(report.saved_to.as_deref(), Some(expected.as_path()));
    let saved = image::open(&expected)?.to_rgb8();
    assert_eq!(saved, report.image);
    Ok(())
}

#[test]
fn image_file_is_read_and_written_under_its_name() -> Result<()> {
    let dir = TempDir::new()?;
    let controller = controller(&person_rows(), dir.path(), 20);
    let input = dir.path().join("desk.png");
    std::fs::write(&input, png_bytes(&RgbImage::from_pixel(200, 100, Rgb([1, 1, 1]))))?;

    let report = controller.detect_image_file(&input, true)?;

    assert_eq!(report.detections.len(), 1);
    assert!(dir.path().join("DETECTED_desk.png").exists());
    Ok(())
}

#[test]
fn camera_run_stops_at_cap_and_releases() -> Result<()> {
    let dir = TempDir::new()?;
    let controller = controller(&person_rows(), dir.path(), 20);
    let released = Arc::new(AtomicBool::new(false));
    let camera = TrackedCamera {
        inner: stub_camera(),
        released: Arc::clone(&released),
    };

    let session = controller.open_session(Box::new(camera), None)?;
    let mut seen = Vec::new();
    let detections = controller.run_session(session, |index, frame, found| {
        assert_eq!(frame.dimensions(), (640, 480));
        assert_eq!(found.len(), 1);
        seen.push(index);
        Ok(())
    })?;

    assert_eq!(seen, (1..=20).collect::<Vec<u32>>());
    assert_eq!(detections.len(), 20);
    assert!(detections.iter().all(|d| matches!(d.frame, Some(1..=20))));
    assert!(released.load(Ordering::SeqCst));
    Ok(())
}

#[test]
fn callback_error_still_releases_capture() {
    let dir = TempDir::new().unwrap();
    let controller = controller(&person_rows(), dir.path(), 20);
    let released = Arc::new(AtomicBool::new(false));
    let camera = TrackedCamera {
        inner: stub_camera(),
        released: Arc::clone(&released),
    };

    let session = controller.open_session(Box::new(camera), None).unwrap();
    let result = controller.run_session(session, |index, _, _| {
        if index == 3 {
            anyhow::bail!("viewer closed");
        }
        Ok(())
    });

    assert!(result.is_err());
    assert!(released.load(Ordering::SeqCst));
}

#[test]
fn video_file_ends_when_source_runs_dry() -> Result<()> {
    let dir = TempDir::new()?;
    let controller = controller(&person_rows(), dir.path(), 20);

    let detections = controller.detect_video_file(Path::new("stub://clip.mp4"), None)?;

    let frames: Vec<u32> = detections.iter().filter_map(|d| d.frame).collect();
    assert_eq!(frames, (1..=12).collect::<Vec<u32>>());
    let json = serde_json::to_value(&detections[0])?;
    assert_eq!(json["frame"], 1);
    Ok(())
}

#[test]
fn frame_cap_is_configurable() -> Result<()> {
    let dir = TempDir::new()?;
    let controller = controller(&person_rows(), dir.path(), 4);

    let detections = controller.detect_camera(
        CameraConfig {
            device: "stub://camera".to_string(),
            ..CameraConfig::default()
        },
        false,
    )?;

    assert_eq!(detections.len(), 4);
    assert_eq!(detections.last().and_then(|d| d.frame), Some(4));
    Ok(())
}

#[test]
fn file_source_can_be_wrapped_directly() -> Result<()> {
    let dir = TempDir::new()?;
    let controller = controller(&[vec![0.5, 0.5, 0.2, 0.2, 1.0, 0.1, 0.2]], dir.path(), 20);
    let source = FileSource::open(FileConfig::new("stub://empty-scene"))?;

    let session = controller.open_session(Box::new(source), None)?;
    let detections = controller.run_session(session, |_, _, _| Ok(()))?;

    assert!(detections.is_empty());
    Ok(())
}

#[cfg(not(feature = "ingest-file-ffmpeg"))]
#[test]
fn persisting_video_needs_ffmpeg() {
    let dir = TempDir::new().unwrap();
    let controller = controller(&person_rows(), dir.path(), 20);

    let err = controller
        .detect_video_file(Path::new("stub://clip.mp4"), Some("clip.mp4"))
        .unwrap_err();

    assert!(matches!(
        classify(&err),
        Some(RecognizerError::Configuration(_))
    ));
}

#[test]
fn recognizer_from_incomplete_model_dir_is_configuration_error() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("coco.names"), "person\ncar\n").unwrap();
    std::fs::write(dir.path().join("yolov3.json"), r#"{"num_classes": 2}"#).unwrap();
    let mut cfg = RecognizerConfig::default();
    cfg.model.dir = dir.path().to_path_buf();

    let err = Recognizer::from_config(&cfg).err().expect("weights are missing");
    assert!(matches!(classify(&err), Some(RecognizerError::Configuration(_))));

    std::fs::write(dir.path().join("yolov3.onnx"), b"not an onnx graph").unwrap();
    let err = Recognizer::from_config(&cfg).err().expect("weights are garbage");
    assert!(matches!(classify(&err), Some(RecognizerError::Configuration(_))));
}
