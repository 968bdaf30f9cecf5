//! Animated snap-to-neighbours.
//!
//! The snapped geometry is computed up front by [`geometry::shake_feature`].
//! The animation then walks every vertex from its original to its snapped
//! position over a fixed number of interval ticks, publishing each frame on a
//! `watch` channel the map view renders from. Intermediate frames wobble
//! each vertex by a random pixel offset that shrinks to zero at the last frame.
//!
//! The last frame is always exactly the snapped feature. A cancel signal
//! received before then republishes the original and resolves to `None`, so
//! the view never keeps a half-moved polygon.

#[cfg(test)]
#[path = "shake_test.rs"]
mod shake_test;

use std::time::Duration;

use geometry::{Feature, Geometry, Pixel, Position, Projector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::config::EditorConfig;

/// Largest wobble applied to a vertex, at the first frame.
pub const JITTER_PX: f64 = 2.0;

/// Shortest frame interval; `tokio::time::interval` rejects a zero period.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// One run of the shake animation.
#[derive(Debug)]
pub struct ShakeAnimation {
    steps: u32,
    interval: Duration,
    jitter_px: f64,
    rng: StdRng,
}

impl ShakeAnimation {
    /// An animation of `steps` frames (at least one), `interval` apart
    /// (at least [`MIN_INTERVAL`]).
    #[must_use]
    pub fn new(steps: u32, interval: Duration) -> Self {
        Self {
            steps: steps.max(1),
            interval: interval.max(MIN_INTERVAL),
            jitter_px: JITTER_PX,
            rng: StdRng::from_rng(&mut rand::rng()),
        }
    }

    #[must_use]
    pub fn from_config(config: &EditorConfig) -> Self {
        Self::new(config.shake_steps, Duration::from_millis(config.shake_interval_ms))
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter_px: f64) -> Self {
        self.jitter_px = jitter_px.max(0.0);
        self
    }

    /// Use a deterministic jitter sequence.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Animate `original` into `snapped`, publishing every frame on `preview`.
    ///
    /// Resolves to `Some(snapped)` after the last frame, or to `None` once
    /// `cancel` turns `true`, with `original` published again. A dropped
    /// cancel sender means the run can no longer be cancelled.
    pub async fn run<P: Projector + ?Sized>(
        mut self,
        projector: &P,
        original: &Feature,
        snapped: &Feature,
        preview: &watch::Sender<Feature>,
        cancel: &mut watch::Receiver<bool>,
    ) -> Option<Feature> {
        if *cancel.borrow_and_update() {
            return restore(original, preview);
        }
        let (Some(from), Some(to)) = (original.geometry.as_ref(), snapped.geometry.as_ref()) else {
            publish(preview, snapped.clone());
            return Some(snapped.clone());
        };

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cancellable = true;
        let mut step = 0;

        while step < self.steps {
            tokio::select! {
                biased;
                changed = cancel.changed(), if cancellable => {
                    match changed {
                        Ok(()) if *cancel.borrow_and_update() => {
                            debug!(id = %original.id, step, "shake cancelled");
                            return restore(original, preview);
                        }
                        Ok(()) => {}
                        Err(_) => cancellable = false,
                    }
                }
                _ = ticker.tick() => {
                    step += 1;
                    if step < self.steps {
                        let fraction = f64::from(step) / f64::from(self.steps);
                        let frame = self.frame(projector, from, to, fraction);
                        publish(preview, original.with_geometry(frame));
                    }
                }
            }
        }

        debug!(id = %original.id, steps = self.steps, "shake finished");
        publish(preview, snapped.clone());
        Some(snapped.clone())
    }

    fn frame<P: Projector + ?Sized>(&mut self, projector: &P, from: &Geometry, to: &Geometry, fraction: f64) -> Geometry {
        let wobble = self.jitter_px * (1.0 - fraction);
        let coordinates = from
            .coordinates
            .iter()
            .zip(&to.coordinates)
            .map(|(from_polygon, to_polygon)| {
                from_polygon
                    .iter()
                    .zip(to_polygon)
                    .map(|(from_ring, to_ring)| {
                        from_ring
                            .iter()
                            .zip(to_ring)
                            .map(|(&a, &b)| self.wobble(projector, lerp(a, b, fraction), wobble))
                            .collect()
                    })
                    .collect()
            })
            .collect();
        Geometry::new(coordinates)
    }

    fn wobble<P: Projector + ?Sized>(&mut self, projector: &P, position: Position, radius_px: f64) -> Position {
        if radius_px <= 0.0 {
            return position;
        }
        let pixel = projector.to_pixel(position);
        let dx = self.rng.random_range(-radius_px..=radius_px);
        let dy = self.rng.random_range(-radius_px..=radius_px);
        projector.to_lnglat(Pixel::new(pixel.x + dx, pixel.y + dy))
    }
}

fn lerp(a: Position, b: Position, fraction: f64) -> Position {
    [a[0] + (b[0] - a[0]) * fraction, a[1] + (b[1] - a[1]) * fraction]
}

fn publish(preview: &watch::Sender<Feature>, feature: Feature) {
    preview.send_modify(|current| *current = feature);
}

fn restore(original: &Feature, preview: &watch::Sender<Feature>) -> Option<Feature> {
    publish(preview, original.clone());
    None
}
