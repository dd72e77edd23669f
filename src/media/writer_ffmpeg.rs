//! Video encoding using FFmpeg.
//!
//! Frames arrive as RGB, are converted to YUV420P and encoded with the codec
//! named by the four character tag. The container is picked from the output
//! file extension.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use ffmpeg_next as ffmpeg;
use image::RgbImage;

use super::writer::WriterSettings;
use crate::error::RecognizerError;

pub(crate) struct FfmpegVideoWriter {
    output: ffmpeg::format::context::Output,
    encoder: ffmpeg::encoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    stream_index: usize,
    encoder_time_base: ffmpeg::Rational,
    stream_time_base: ffmpeg::Rational,
    width: u32,
    height: u32,
    next_pts: i64,
}

impl FfmpegVideoWriter {
    pub(crate) fn create(path: &Path, settings: &WriterSettings) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let codec_id = codec_for_tag(&settings.codec)?;
        let codec = ffmpeg::encoder::find(codec_id).ok_or_else(|| {
            RecognizerError::configuration(format!(
                "ffmpeg has no encoder for codec tag '{}'",
                settings.codec
            ))
        })?;

        let mut output = ffmpeg::format::output(&path)
            .with_context(|| format!("failed to create video output {}", path.display()))?;
        let global_header = output
            .format()
            .flags()
            .contains(ffmpeg::format::Flags::GLOBAL_HEADER);

        let fps = settings.fps as i32;
        let encoder_time_base = ffmpeg::Rational::new(1, fps);

        let mut video = ffmpeg::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .context("create ffmpeg video encoder")?;
        video.set_width(settings.width);
        video.set_height(settings.height);
        video.set_format(ffmpeg::format::Pixel::YUV420P);
        video.set_time_base(encoder_time_base);
        video.set_frame_rate(Some(ffmpeg::Rational::new(fps, 1)));
        if global_header {
            video.set_flags(ffmpeg::codec::Flags::GLOBAL_HEADER);
        }
        let encoder = video.open_as(codec).context("open ffmpeg video encoder")?;

        let stream_index = {
            let mut stream = output.add_stream(codec).context("add video stream")?;
            stream.set_parameters(&encoder);
            stream.set_time_base(encoder_time_base);
            stream.index()
        };
        output.write_header().context("write video header")?;
        let stream_time_base = output
            .stream(stream_index)
            .map(|stream| stream.time_base())
            .ok_or_else(|| anyhow!("video stream vanished after writing header"))?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            ffmpeg::format::Pixel::RGB24,
            settings.width,
            settings.height,
            ffmpeg::format::Pixel::YUV420P,
            settings.width,
            settings.height,
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        Ok(Self {
            output,
            encoder,
            scaler,
            stream_index,
            encoder_time_base,
            stream_time_base,
            width: settings.width,
            height: settings.height,
            next_pts: 0,
        })
    }

    pub(crate) fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        let mut rgb =
            ffmpeg::frame::Video::new(ffmpeg::format::Pixel::RGB24, self.width, self.height);
        let row_bytes = self.width as usize * 3;
        let stride = rgb.stride(0);
        let data = rgb.data_mut(0);
        for (row, pixels) in frame.as_raw().chunks_exact(row_bytes).enumerate() {
            let start = row * stride;
            data.get_mut(start..start + row_bytes)
                .context("ffmpeg frame row is out of bounds")?
                .copy_from_slice(pixels);
        }

        let mut yuv = ffmpeg::frame::Video::empty();
        self.scaler
            .run(&rgb, &mut yuv)
            .context("convert frame to YUV420P")?;
        yuv.set_pts(Some(self.next_pts));
        self.next_pts += 1;

        self.encoder
            .send_frame(&yuv)
            .context("send frame to ffmpeg encoder")?;
        self.drain()
    }

    pub(crate) fn finish(mut self) -> Result<()> {
        self.encoder.send_eof().context("flush ffmpeg encoder")?;
        self.drain()?;
        self.output.write_trailer().context("write video trailer")?;
        Ok(())
    }

    fn drain(&mut self) -> Result<()> {
        let mut packet = ffmpeg::Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            packet.rescale_ts(self.encoder_time_base, self.stream_time_base);
            packet
                .write_interleaved(&mut self.output)
                .context("write encoded packet")?;
        }
        Ok(())
    }
}

fn codec_for_tag(tag: &str) -> Result<ffmpeg::codec::Id> {
    match tag.to_ascii_lowercase().as_str() {
        "mp4v" | "fmp4" | "divx" | "xvid" => Ok(ffmpeg::codec::Id::MPEG4),
        "avc1" | "h264" | "x264" => Ok(ffmpeg::codec::Id::H264),
        "mjpg" => Ok(ffmpeg::codec::Id::MJPEG),
        "vp80" => Ok(ffmpeg::codec::Id::VP8),
        _ => Err(RecognizerError::configuration(format!(
            "unsupported codec tag '{tag}'"
        ))),
    }
}
