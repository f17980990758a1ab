use crate::options::NavigationOptions;

/// Lower bound applied to every feedback distance before it is used.
pub const FEEDBACK_EPSILON: f32 = 1e-4;

/// A device-produced distance tagged with the frame that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedbackSample {
    pub distance: f32,
    pub frame_index: u64,
}

/// Host side of the one-scalar readback path.
///
/// The device publishes the camera-to-surface distance after each frame
/// completes; navigation for the next frame reads the latest published
/// value. Values are tagged with their frame so callers can tell how stale
/// they are.
#[derive(Debug, Clone, Default)]
pub struct FeedbackChannel {
    latest: Option<FeedbackSample>,
}

impl FeedbackChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the readback for `frame_index`. Older frames never replace
    /// newer ones.
    pub fn publish(&mut self, distance: f32, frame_index: u64) {
        if let Some(current) = self.latest {
            if current.frame_index > frame_index {
                tracing::debug!(
                    current = current.frame_index,
                    incoming = frame_index,
                    "ignoring out-of-order feedback"
                );
                return;
            }
        }
        self.latest = Some(FeedbackSample {
            distance: clamp_distance(distance),
            frame_index,
        });
    }

    pub fn latest(&self) -> Option<FeedbackSample> {
        self.latest
    }

    /// Clamped distance, or 1.0 before the first readback.
    pub fn distance(&self) -> f32 {
        self.latest.map(|sample| sample.distance).unwrap_or(1.0)
    }

    /// Frames elapsed between the latest readback and `current_frame`.
    pub fn staleness(&self, current_frame: u64) -> Option<u64> {
        self.latest
            .map(|sample| current_frame.saturating_sub(sample.frame_index))
    }

    /// Navigation speed multiplier; fixed at 1 when auto speed is off.
    pub fn speed_scale(&self, navigation: &NavigationOptions) -> f32 {
        if navigation.auto_speed {
            self.distance()
        } else {
            1.0
        }
    }

    /// Focus distance that tracks proximity to the surface, when enabled.
    pub fn focus_distance(&self, navigation: &NavigationOptions) -> Option<f32> {
        if !navigation.auto_focus {
            return None;
        }
        let latest = self.latest?;
        Some(clamp_distance(latest.distance * navigation.focus_scale))
    }
}

fn clamp_distance(distance: f32) -> f32 {
    if distance.is_finite() {
        distance.max(FEEDBACK_EPSILON)
    } else if distance == f32::INFINITY {
        f32::MAX
    } else {
        FEEDBACK_EPSILON
    }
}
