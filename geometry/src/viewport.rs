#[cfg(test)]
#[path = "viewport_test.rs"]
mod viewport_test;

use crate::feature::Position;

/// A point in container pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pixel {
    pub x: f64,
    pub y: f64,
}

impl Pixel {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another pixel.
    #[must_use]
    pub fn distance(self, other: Pixel) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Bidirectional lnglat ↔ pixel conversion supplied by the map view.
pub trait Projector {
    /// Convert a `[lng, lat]` position to container pixels.
    fn to_pixel(&self, lnglat: Position) -> Pixel;

    /// Convert container pixels back to a `[lng, lat]` position.
    fn to_lnglat(&self, pixel: Pixel) -> Position;
}

/// Planar pan/zoom viewport over lnglat space.
///
/// `pan_x` / `pan_y` are the pixel coordinates of lnglat `[0, 0]`.
/// `zoom` is pixels per degree. Latitude grows upward, pixel y grows downward.
#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    pub pan_x: f64,
    pub pan_y: f64,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { pan_x: 0.0, pan_y: 0.0, zoom: 1.0 }
    }
}

impl Viewport {
    /// A viewport of `width` × `height` pixels centred on `center`.
    #[must_use]
    pub fn centered(center: Position, zoom: f64, width: f64, height: f64) -> Self {
        Self {
            pan_x: width / 2.0 - center[0] * zoom,
            pan_y: height / 2.0 + center[1] * zoom,
            zoom,
        }
    }

    /// Convert a pixel distance to a distance in degrees.
    #[must_use]
    pub fn pixels_to_degrees(&self, pixels: f64) -> f64 {
        pixels / self.zoom
    }
}

impl Projector for Viewport {
    fn to_pixel(&self, lnglat: Position) -> Pixel {
        Pixel {
            x: lnglat[0] * self.zoom + self.pan_x,
            y: -lnglat[1] * self.zoom + self.pan_y,
        }
    }

    fn to_lnglat(&self, pixel: Pixel) -> Position {
        [(pixel.x - self.pan_x) / self.zoom, -(pixel.y - self.pan_y) / self.zoom]
    }
}
