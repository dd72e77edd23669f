use anyhow::Result;
use image::RgbImage;

use super::writer::FrameSink;
use crate::ingest::FrameSource;

/// One capture run: a frame source, an optional sink and the frame budget.
///
/// The session owns both handles. They are released writer first, then
/// capture, either explicitly through `release` or when the session drops,
/// so an early return or a failed frame still closes them.
pub struct CaptureSession {
    source: Box<dyn FrameSource>,
    sink: Option<Box<dyn FrameSink>>,
    frame_cap: u32,
    frames_read: u32,
}

impl CaptureSession {
    pub fn new(
        source: Box<dyn FrameSource>,
        sink: Option<Box<dyn FrameSink>>,
        frame_cap: u32,
    ) -> Self {
        Self {
            source,
            sink,
            frame_cap,
            frames_read: 0,
        }
    }

    pub fn describe(&self) -> String {
        self.source.describe()
    }

    pub fn is_writing(&self) -> bool {
        self.sink.is_some()
    }

    pub fn frames_read(&self) -> u32 {
        self.frames_read
    }

    /// Next frame with its 1-based index, or `None` once the source is
    /// exhausted or the frame cap is reached.
    pub fn next_frame(&mut self) -> Result<Option<(u32, RgbImage)>> {
        if self.frames_read >= self.frame_cap {
            return Ok(None);
        }
        match self.source.next_frame()? {
            Some(frame) => {
                self.frames_read += 1;
                Ok(Some((self.frames_read, frame)))
            }
            None => Ok(None),
        }
    }

    /// Append a processed frame to the sink, if the session has one.
    pub fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        match self.sink.as_mut() {
            Some(sink) => sink.write_frame(frame),
            None => Ok(()),
        }
    }

    /// Close the writer, then the capture. Both are attempted; the first
    /// failure is returned.
    pub fn release(&mut self) -> Result<()> {
        let sink_result = match self.sink.as_mut() {
            Some(sink) => sink.release(),
            None => Ok(()),
        };
        let source_result = self.source.release();
        sink_result.and(source_result)
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            log::warn!(
                "CaptureSession: release of {} failed: {}",
                self.source.describe(),
                err
            );
        }
    }
}
