use glam::Vec3;
use rayon::prelude::*;

/// Per-pixel running sums for progressive refinement.
///
/// One writer (the frame evaluation) and one reader (resolve) that never
/// overlap: a frame is fully accumulated before it is resolved.
#[derive(Debug, Clone)]
pub struct AccumulationBuffer {
    width: u32,
    height: u32,
    sums: Vec<[f32; 4]>,
    sample_count: u32,
    /// Set while the current frame overwrites instead of adding.
    fresh: bool,
}

impl AccumulationBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        let len = (width as usize) * (height as usize);
        Self {
            width,
            height,
            sums: vec![[0.0; 4]; len],
            sample_count: 0,
            fresh: true,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    /// Reallocates for a new resolution. A resize always restarts accumulation.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == self.width && height == self.height {
            return;
        }
        *self = Self::new(width, height);
    }

    /// Starts a frame and returns how many samples it will hold.
    ///
    /// When `moved` is set (or nothing has been accumulated yet) the frame
    /// replaces the stored sums and the count becomes 1; otherwise the count
    /// is incremented and samples add onto the existing sums.
    pub fn begin_frame(&mut self, moved: bool) -> u32 {
        if moved || self.sample_count == 0 {
            self.sample_count = 1;
            self.fresh = true;
        } else {
            self.sample_count = self.sample_count.saturating_add(1);
            self.fresh = false;
        }
        self.sample_count
    }

    pub fn accumulate(&mut self, pixel: usize, color: Vec3) {
        let fresh = self.fresh;
        if let Some(slot) = self.sums.get_mut(pixel) {
            write_slot(slot, color, fresh);
        }
    }

    /// Accumulates a whole frame, evaluating rows in parallel.
    ///
    /// `shade_row(y, row_out)` fills one colour per pixel of row `y`.
    pub fn accumulate_rows<F>(&mut self, shade_row: F)
    where
        F: Fn(u32, &mut [Vec3]) + Sync,
    {
        let width = self.width as usize;
        if width == 0 {
            return;
        }
        let fresh = self.fresh;
        self.sums
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| {
                let mut colors = vec![Vec3::ZERO; width];
                shade_row(y as u32, &mut colors);
                for (slot, color) in row.iter_mut().zip(colors) {
                    write_slot(slot, color, fresh);
                }
            });
    }

    /// Average colour at `pixel` over the accumulated samples.
    pub fn resolve(&self, pixel: usize) -> Vec3 {
        let Some(sum) = self.sums.get(pixel) else {
            return Vec3::ZERO;
        };
        let count = self.sample_count.max(1) as f32;
        Vec3::new(sum[0], sum[1], sum[2]) / count
    }

    /// Gamma-encoded RGBA8 image of the resolved buffer.
    pub fn resolve_rgba8(&self) -> Vec<u8> {
        let count = self.sample_count.max(1) as f32;
        let mut pixels = vec![0u8; self.sums.len() * 4];
        pixels
            .par_chunks_mut(4)
            .zip(self.sums.par_iter())
            .for_each(|(out, sum)| {
                for channel in 0..3 {
                    out[channel] = encode_channel(sum[channel] / count);
                }
                out[3] = 255;
            });
        pixels
    }
}

fn write_slot(slot: &mut [f32; 4], color: Vec3, fresh: bool) {
    let color = if color.is_finite() { color } else { Vec3::ZERO };
    if fresh {
        *slot = [color.x, color.y, color.z, 1.0];
    } else {
        slot[0] += color.x;
        slot[1] += color.y;
        slot[2] += color.z;
        slot[3] += 1.0;
    }
}

fn encode_channel(linear: f32) -> u8 {
    let gamma = linear.clamp(0.0, 1.0).powf(1.0 / 2.2);
    (gamma * 255.0 + 0.5) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_frames_increase_sample_count() {
        let mut buffer = AccumulationBuffer::new(2, 2);
        assert_eq!(buffer.begin_frame(false), 1);
        assert_eq!(buffer.begin_frame(false), 2);
        assert_eq!(buffer.begin_frame(false), 3);
    }

    #[test]
    fn moved_frame_resets_to_one() {
        let mut buffer = AccumulationBuffer::new(2, 2);
        buffer.begin_frame(false);
        buffer.accumulate(0, Vec3::ONE);
        buffer.begin_frame(false);
        buffer.accumulate(0, Vec3::ONE);
        assert_eq!(buffer.begin_frame(true), 1);
        buffer.accumulate(0, Vec3::splat(0.25));
        assert!(buffer.resolve(0).abs_diff_eq(Vec3::splat(0.25), 1e-6));
    }

    #[test]
    fn resolve_averages_samples() {
        let mut buffer = AccumulationBuffer::new(1, 1);
        buffer.begin_frame(true);
        buffer.accumulate(0, Vec3::new(1.0, 0.0, 0.0));
        buffer.begin_frame(false);
        buffer.accumulate(0, Vec3::new(0.0, 1.0, 0.0));
        assert!(buffer
            .resolve(0)
            .abs_diff_eq(Vec3::new(0.5, 0.5, 0.0), 1e-6));
    }

    #[test]
    fn parallel_rows_match_serial_writes() {
        let mut buffer = AccumulationBuffer::new(4, 3);
        buffer.begin_frame(true);
        buffer.accumulate_rows(|y, row| {
            for (x, color) in row.iter_mut().enumerate() {
                *color = Vec3::new(x as f32, y as f32, 0.0);
            }
        });
        assert_eq!(buffer.resolve(4 * 2 + 3), Vec3::new(3.0, 2.0, 0.0));
    }

    #[test]
    fn non_finite_samples_are_dropped() {
        let mut buffer = AccumulationBuffer::new(1, 1);
        buffer.begin_frame(true);
        buffer.accumulate(0, Vec3::splat(f32::NAN));
        assert_eq!(buffer.resolve(0), Vec3::ZERO);
    }

    #[test]
    fn resize_restarts_accumulation() {
        let mut buffer = AccumulationBuffer::new(2, 2);
        buffer.begin_frame(false);
        buffer.begin_frame(false);
        buffer.resize(3, 2);
        assert_eq!(buffer.sample_count(), 0);
        assert_eq!(buffer.begin_frame(false), 1);
        assert_eq!(buffer.resolve_rgba8().len(), 3 * 2 * 4);
    }

    #[test]
    fn rgba8_is_gamma_encoded_and_opaque() {
        let mut buffer = AccumulationBuffer::new(1, 1);
        buffer.begin_frame(true);
        buffer.accumulate(0, Vec3::new(1.0, 0.0, 0.218));
        let pixels = buffer.resolve_rgba8();
        assert_eq!(pixels[0], 255);
        assert_eq!(pixels[1], 0);
        assert!((pixels[2] as i32 - 128).abs() <= 2);
        assert_eq!(pixels[3], 255);
    }
}
