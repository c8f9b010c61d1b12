//! Building blocks of the per-frame render callback.
//!
//! The callback itself lives in [`crate::viewer::Viewer::frame`]; this module
//! holds the clock and the canvas size synchronisation it relies on.

use instant::{Duration, Instant};

use crate::backend::{Backend, Rect, Surface};

/// Measures the time between two frames.
///
/// Reads a monotonic clock on every call instead of accumulating fixed steps,
/// so frames that never happen (paused loop, hidden tab) leave no drift behind:
/// the next delta is simply the wall time since the last one.
#[derive(Debug, Clone, Copy)]
pub struct FrameClock {
    last: Instant,
    elapsed: Duration,
}

impl FrameClock {
    pub fn start() -> Self {
        Self::start_at(Instant::now())
    }

    pub fn start_at(now: Instant) -> Self {
        Self {
            last: now,
            elapsed: Duration::ZERO,
        }
    }

    /// Seconds between the previous reading (or the start) and `now`.
    pub fn delta_at(&mut self, now: Instant) -> f64 {
        // a reading from before `last` is not a step
        if now <= self.last {
            return 0.0;
        }
        let dt = now.duration_since(self.last);
        self.last = now;
        self.elapsed += dt;
        dt.as_secs_f64()
    }

    /// Total time handed out through [`FrameClock::delta_at`].
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

/// Backing store size for a parent box of `rect` CSS pixels.
pub fn backing_size(rect: Rect, device_pixel_ratio: f64) -> (f64, f64) {
    (
        rect.width() * device_pixel_ratio,
        rect.height() * device_pixel_ratio,
    )
}

/// Result of a canvas resize.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resized {
    pub backing_width: f64,
    pub backing_height: f64,
    pub aspect: f64,
}

/// Keep the canvas backing store in sync with its displayed size.
///
/// Does nothing unless the backing height is zero (no layout yet) or
/// `invalidated` is set (a window resize happened). Otherwise the backing
/// size is derived from the parent's bounding box and the device pixel ratio,
/// and the camera aspect from the canvas' CSS size.
#[must_use]
pub fn sync_canvas_size<B: Backend>(surface: &mut B::Surface, invalidated: bool) -> Option<Resized> {
    if surface.backing_height() != 0 && !invalidated {
        return None;
    }
    let rect = surface.parent_rect();
    let (backing_width, backing_height) = backing_size(rect, surface.device_pixel_ratio());
    surface.set_backing_size(backing_width, backing_height);

    let (client_width, client_height) = surface.client_size();
    if client_width <= 0.0 || client_height <= 0.0 {
        log::warn!(
            "Canvas has no displayed size ({}x{}), keeping the camera aspect.",
            client_width,
            client_height
        );
        return Some(Resized {
            backing_width,
            backing_height,
            aspect: 0.0,
        });
    }
    let aspect = client_width / client_height;
    surface.set_camera_aspect(aspect);
    Some(Resized {
        backing_width,
        backing_height,
        aspect,
    })
}
