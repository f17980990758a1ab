use std::path::{Path, PathBuf};

use engine::{CaptureError, FrameImage, FrameSink};
use image::{ImageBuffer, Rgba};

/// Writes each captured frame as `<stem>_<frame:05>.png` next to the
/// requested output path.
#[derive(Debug, Default)]
pub struct PngSequenceSink {
    target: Option<SequenceTarget>,
    written: Vec<PathBuf>,
}

#[derive(Debug)]
struct SequenceTarget {
    directory: PathBuf,
    stem: String,
}

impl PngSequenceSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Files written by the most recent job, in frame order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn frame_path(&self, frame: u32) -> Option<PathBuf> {
        self.target
            .as_ref()
            .map(|target| target.directory.join(sequence_file_name(&target.stem, frame)))
    }
}

pub(crate) fn sequence_file_name(stem: &str, frame: u32) -> String {
    format!("{stem}_{frame:05}.png")
}

impl FrameSink for PngSequenceSink {
    fn begin(&mut self, path: &Path) -> Result<(), CaptureError> {
        let stem = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
            .unwrap_or("frame")
            .to_string();
        self.target = Some(SequenceTarget {
            directory: engine::capture::output_directory(path),
            stem,
        });
        self.written.clear();
        Ok(())
    }

    fn persist(&mut self, frame: u32, image: &FrameImage<'_>) -> Result<(), CaptureError> {
        let path = self
            .frame_path(frame)
            .ok_or_else(|| CaptureError::Sink("frame persisted before the sequence began".into()))?;
        write_png(&path, image)?;
        tracing::debug!(frame, path = %path.display(), "wrote capture frame");
        self.written.push(path);
        Ok(())
    }

    fn end(&mut self) -> Result<(), CaptureError> {
        if let Some(target) = self.target.take() {
            tracing::info!(
                frames = self.written.len(),
                directory = %target.directory.display(),
                "capture sequence complete"
            );
        }
        Ok(())
    }
}

/// Encodes one RGBA8 frame to `path`.
pub fn write_png(path: &Path, image: &FrameImage<'_>) -> Result<(), CaptureError> {
    let buffer: ImageBuffer<Rgba<u8>, &[u8]> =
        ImageBuffer::from_raw(image.width, image.height, image.pixels).ok_or_else(|| {
            CaptureError::Sink(format!(
                "frame buffer does not match {}x{}",
                image.width, image.height
            ))
        })?;
    buffer
        .save_with_format(path, image::ImageFormat::Png)
        .map_err(|err| CaptureError::Sink(format!("failed to write {}: {err}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PIXELS: [u8; 8] = [255, 0, 0, 255, 0, 0, 255, 255];

    fn frame() -> FrameImage<'static> {
        FrameImage {
            width: 2,
            height: 1,
            pixels: &PIXELS,
        }
    }

    #[test]
    fn numbers_frames_after_the_stem() {
        let dir = TempDir::new().unwrap();
        let mut sink = PngSequenceSink::new();
        sink.begin(&dir.path().join("fly.png")).unwrap();
        sink.persist(0, &frame()).unwrap();
        sink.persist(12, &frame()).unwrap();
        sink.end().unwrap();

        let first = dir.path().join("fly_00000.png");
        let second = dir.path().join("fly_00012.png");
        assert_eq!(sink.written(), &[first.clone(), second.clone()]);
        assert!(first.is_file());
        assert!(second.is_file());

        let decoded = image::open(&first).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (2, 1));
        assert_eq!(decoded.get_pixel(1, 0).0, [0, 0, 255, 255]);
    }

    #[test]
    fn persist_without_begin_is_a_sink_error() {
        let mut sink = PngSequenceSink::new();
        let err = sink.persist(0, &frame()).unwrap_err();
        assert!(matches!(err, CaptureError::Sink(_)));
    }

    #[test]
    fn mismatched_buffer_is_rejected() {
        let dir = TempDir::new().unwrap();
        let image = FrameImage {
            width: 4,
            height: 4,
            pixels: &PIXELS,
        };
        let err = write_png(&dir.path().join("bad.png"), &image).unwrap_err();
        assert!(matches!(err, CaptureError::Sink(_)));
    }

    #[test]
    fn file_names_are_zero_padded() {
        assert_eq!(sequence_file_name("render", 7), "render_00007.png");
        assert_eq!(sequence_file_name("render", 123456), "render_123456.png");
    }
}
