use std::path::Path;
use std::time::Instant;

use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame::video::Video;
use ffmpeg_next::Rational;

use crate::shared::dimensions::Dimensions;
use crate::shared::frame::Frame;

/// Millisecond time base; timestamps follow frame capture times.
const TIME_BASE: Rational = Rational(1, 1000);

/// MPEG-4 Part 2 encoder writing an MP4 container.
///
/// Frames must all share the dimensions given to `open`; the caller drops
/// mismatched frames. Presentation timestamps are taken from each frame's
/// capture time relative to the first frame, so a camera delivering fewer
/// frames than the nominal rate still plays back in real time.
pub(super) struct Mp4Encoder {
    octx: ffmpeg_next::format::context::Output,
    encoder: ffmpeg_next::codec::encoder::video::Encoder,
    scaler: scaling::Context,
    dimensions: Dimensions,
    origin: Option<Instant>,
    last_pts: Option<i64>,
    frame_count: i64,
}

// Safety: the encoder lives on the recorder thread that created it.
unsafe impl Send for Mp4Encoder {}

impl Mp4Encoder {
    pub fn open(
        path: &Path,
        dimensions: Dimensions,
        fps: u32,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        let fps = if fps == 0 { 30 } else { fps as i32 };
        let mut octx = ffmpeg_next::format::output(path)?;
        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4)
            .ok_or("MPEG4 encoder not found")?;
        let mut ost = octx.add_stream(Some(codec))?;

        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()?;
        encoder_ctx.set_width(dimensions.width);
        encoder_ctx.set_height(dimensions.height);
        encoder_ctx.set_format(Pixel::YUV420P);
        encoder_ctx.set_time_base(TIME_BASE);
        encoder_ctx.set_frame_rate(Some(Rational(fps, 1)));
        if global_header {
            encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let encoder = encoder_ctx.open_with(ffmpeg_next::Dictionary::new())?;
        ost.set_parameters(&encoder);
        octx.write_header()?;

        let scaler = scaling::Context::get(
            Pixel::RGB24,
            dimensions.width,
            dimensions.height,
            Pixel::YUV420P,
            dimensions.width,
            dimensions.height,
            scaling::Flags::BILINEAR,
        )?;

        Ok(Self {
            octx,
            encoder,
            scaler,
            dimensions,
            origin: None,
            last_pts: None,
            frame_count: 0,
        })
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub fn frame_count(&self) -> i64 {
        self.frame_count
    }

    pub fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        if frame.dimensions() != self.dimensions {
            return Err(format!(
                "frame is {} but the encoder was opened at {}",
                frame.dimensions(),
                self.dimensions
            )
            .into());
        }

        let (width, height) = (self.dimensions.width, self.dimensions.height);
        let mut rgb = Video::new(Pixel::RGB24, width, height);
        let stride = rgb.stride(0);
        let row_bytes = width as usize * 3;
        let dst = rgb.data_mut(0);
        for (row, src) in frame.data().chunks_exact(row_bytes).enumerate() {
            dst[row * stride..row * stride + row_bytes].copy_from_slice(src);
        }

        let mut yuv = Video::empty();
        self.scaler.run(&rgb, &mut yuv)?;
        yuv.set_pts(Some(self.pts_for(frame.captured_at())));

        self.encoder.send_frame(&yuv)?;
        self.drain()?;
        self.frame_count += 1;
        Ok(())
    }

    /// Milliseconds since the first frame, strictly increasing.
    fn pts_for(&mut self, captured_at: Instant) -> i64 {
        let origin = *self.origin.get_or_insert(captured_at);
        let millis = captured_at.saturating_duration_since(origin).as_millis() as i64;
        let pts = match self.last_pts {
            Some(last) if millis <= last => last + 1,
            _ => millis,
        };
        self.last_pts = Some(pts);
        pts
    }

    /// Flushes the encoder and writes the container trailer.
    pub fn finish(mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.encoder.send_eof()?;
        self.drain()?;
        self.octx.write_trailer()?;
        Ok(())
    }

    fn drain(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let ost_time_base = self
            .octx
            .stream(0)
            .ok_or("output stream missing")?
            .time_base();
        let mut packet = ffmpeg_next::Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(0);
            packet.rescale_ts(TIME_BASE, ost_time_base);
            packet.write_interleaved(&mut self.octx)?;
        }
        Ok(())
    }
}
