//! Camera frame source.
//!
//! `CameraSource` captures frames from a local V4L2 device node (feature:
//! ingest-v4l2). Camera index `n` maps to `/dev/video{n}`. `stub://` devices
//! produce an endless synthetic stream, so only the frame cap ends a run.

use anyhow::Result;
use image::RgbImage;

use super::synthetic::{synthetic_frame, SYNTHETIC_HEIGHT, SYNTHETIC_WIDTH};
use super::{is_stub, FrameSource};
use crate::error::RecognizerError;

/// Configuration for a camera source.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Device path (e.g., "/dev/video0").
    pub device: String,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
}

impl CameraConfig {
    /// Config for the numbered camera, the way capture libraries address them.
    pub fn for_index(index: u32) -> Self {
        Self {
            device: format!("/dev/video{index}"),
            ..Self::default()
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            width: 640,
            height: 480,
        }
    }
}

/// Camera frame source.
pub struct CameraSource {
    device: String,
    backend: Option<CameraBackend>,
    frames_read: u64,
}

enum CameraBackend {
    Synthetic { frame_count: u64 },
    #[cfg(feature = "ingest-v4l2")]
    Device(device::DeviceCamera),
}

impl CameraSource {
    /// Open and start streaming from the device.
    pub fn open(config: CameraConfig) -> Result<Self> {
        let backend = if is_stub(&config.device) {
            CameraBackend::Synthetic { frame_count: 0 }
        } else {
            #[cfg(feature = "ingest-v4l2")]
            {
                CameraBackend::Device(device::DeviceCamera::open(&config)?)
            }
            #[cfg(not(feature = "ingest-v4l2"))]
            {
                return Err(RecognizerError::configuration(
                    "camera capture requires the ingest-v4l2 feature",
                ));
            }
        };
        log::info!("CameraSource: connected to {}", config.device);
        Ok(Self {
            device: config.device,
            backend: Some(backend),
            frames_read: 0,
        })
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }
}

impl FrameSource for CameraSource {
    fn describe(&self) -> String {
        self.device.clone()
    }

    fn frame_size(&self) -> Option<(u32, u32)> {
        match self.backend.as_ref()? {
            CameraBackend::Synthetic { .. } => Some((SYNTHETIC_WIDTH, SYNTHETIC_HEIGHT)),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(camera) => Some(camera.frame_size()),
        }
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        let frame = match self.backend.as_mut() {
            None => return Ok(None),
            Some(CameraBackend::Synthetic { frame_count }) => {
                *frame_count += 1;
                synthetic_frame(*frame_count)
            }
            #[cfg(feature = "ingest-v4l2")]
            Some(CameraBackend::Device(camera)) => camera.next_frame()?,
        };
        self.frames_read += 1;
        Ok(Some(frame))
    }

    fn release(&mut self) -> Result<()> {
        if self.backend.take().is_some() {
            log::info!(
                "CameraSource: released {} after {} frames",
                self.device,
                self.frames_read
            );
        }
        Ok(())
    }

    fn is_released(&self) -> bool {
        self.backend.is_none()
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

// ----------------------------------------------------------------------------
// Production V4L2 capture using libv4l
// ----------------------------------------------------------------------------

#[cfg(feature = "ingest-v4l2")]
mod device {
    use anyhow::{Context, Result};
    use image::RgbImage;
    use ouroboros::self_referencing;

    use super::CameraConfig;
    use crate::error::RecognizerError;

    pub(super) struct DeviceCamera {
        state: DeviceState,
        width: u32,
        height: u32,
    }

    #[self_referencing]
    struct DeviceState {
        device: v4l::Device,
        #[borrows(mut device)]
        #[covariant]
        stream: v4l::prelude::MmapStream<'this, v4l::Device>,
    }

    impl DeviceCamera {
        pub(super) fn open(config: &CameraConfig) -> Result<Self> {
            use v4l::buffer::Type;
            use v4l::video::Capture;

            let mut device = v4l::Device::with_path(&config.device).map_err(|e| {
                RecognizerError::configuration(format!(
                    "failed to open camera {}: {}",
                    config.device, e
                ))
            })?;
            let mut format = device.format().context("read v4l2 format")?;
            format.width = config.width;
            format.height = config.height;
            format.fourcc = v4l::FourCC::new(b"RGB3");

            let format = match device.set_format(&format) {
                Ok(format) => format,
                Err(err) => {
                    log::warn!(
                        "CameraSource: failed to set format on {}: {}",
                        config.device,
                        err
                    );
                    device
                        .format()
                        .context("read v4l2 format after set failure")?
                }
            };
            if format.fourcc != v4l::FourCC::new(b"RGB3") {
                return Err(RecognizerError::configuration(format!(
                    "camera {} does not deliver RGB3 frames (got {})",
                    config.device, format.fourcc
                )));
            }

            let state = DeviceStateBuilder {
                device,
                stream_builder: |device| {
                    v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                        .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
                },
            }
            .try_build()?;

            log::info!(
                "CameraSource: streaming {} at {}x{}",
                config.device,
                format.width,
                format.height
            );
            Ok(Self {
                state,
                width: format.width,
                height: format.height,
            })
        }

        pub(super) fn frame_size(&self) -> (u32, u32) {
            (self.width, self.height)
        }

        pub(super) fn next_frame(&mut self) -> Result<RgbImage> {
            use v4l::io::traits::CaptureStream;

            let pixels = self.state.with_mut(|fields| {
                fields
                    .stream
                    .next()
                    .map(|(buf, _meta)| buf.to_vec())
                    .context("capture v4l2 frame")
            })?;
            let expected = (self.width as usize) * (self.height as usize) * 3;
            let pixels = pixels.get(..expected).map(<[u8]>::to_vec).ok_or_else(|| {
                RecognizerError::decode(format!(
                    "camera frame has {} bytes, expected {}",
                    pixels.len(),
                    expected
                ))
            })?;
            RgbImage::from_raw(self.width, self.height, pixels)
                .ok_or_else(|| RecognizerError::decode("camera frame does not match its size"))
        }
    }
}
