//! Conversions between pointer pixels and the normalized `[0,1]` space that
//! hotspots are stored in.
//!
//! Everything here is pure. Malformed input (zero-sized canvas, NaN pointer)
//! is clamped rather than rejected.

use serde::{Deserialize, Serialize};

/// Keeps placed centres off the exact canvas edge.
pub const EDGE_EPSILON: f64 = 0.001;

/// Smallest normalized hotspot side.
pub const MIN_HOTSPOT_SIZE: f64 = 0.01;

/// Default normalized side of a freshly placed hotspot (14% of the canvas).
pub const DEFAULT_HOTSPOT_SIZE: f64 = 0.14;

/// Pointer position in the same pixel space as the canvas bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerPosition {
    pub x: f64,
    pub y: f64,
}

impl PointerPosition {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// On-screen rectangle of the worksheet image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasBounds {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl CanvasBounds {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    fn is_degenerate(&self) -> bool {
        !(self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPoint {
    pub x: f64,
    pub y: f64,
}

impl NormalizedPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x: clamp_unit(x),
            y: clamp_unit(y),
        }
    }

    pub fn center() -> Self {
        Self { x: 0.5, y: 0.5 }
    }

    /// Moves by the given delta and re-clamps to the placeable area.
    pub fn offset(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Normalized hotspot box, addressed by its centre.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl NormalizedRect {
    pub fn new(center: NormalizedPoint, width: f64, height: f64) -> Self {
        Self {
            x: center.x,
            y: center.y,
            width: clamp_size(width),
            height: clamp_size(height),
        }
    }

    pub fn contains(&self, point: NormalizedPoint) -> bool {
        let half_w = self.width / 2.0;
        let half_h = self.height / 2.0;
        point.x >= self.x - half_w
            && point.x <= self.x + half_w
            && point.y >= self.y - half_h
            && point.y <= self.y + half_h
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// Overlay box in pixels, top-left anchored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelRect {
    pub fn center(&self) -> PointerPosition {
        PointerPosition::new(self.left + self.width / 2.0, self.top + self.height / 2.0)
    }
}

pub fn to_normalized(pointer: PointerPosition, bounds: CanvasBounds) -> NormalizedPoint {
    if bounds.is_degenerate() {
        return NormalizedPoint::center();
    }
    NormalizedPoint::new(
        (pointer.x - bounds.left) / bounds.width,
        (pointer.y - bounds.top) / bounds.height,
    )
}

/// Pixel position of a normalized point; inverse of [`to_normalized`] for
/// pointers inside the placeable area.
pub fn point_to_pixels(point: NormalizedPoint, bounds: CanvasBounds) -> PointerPosition {
    PointerPosition::new(
        bounds.left + point.x * bounds.width,
        bounds.top + point.y * bounds.height,
    )
}

pub fn to_pixels(rect: NormalizedRect, bounds: CanvasBounds) -> PixelRect {
    let width = rect.width * bounds.width;
    let height = rect.height * bounds.height;
    let center = point_to_pixels(NormalizedPoint { x: rect.x, y: rect.y }, bounds);
    PixelRect {
        left: center.x - width / 2.0,
        top: center.y - height / 2.0,
        width,
        height,
    }
}

pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.5;
    }
    value.clamp(EDGE_EPSILON, 1.0 - EDGE_EPSILON)
}

pub fn clamp_size(value: f64) -> f64 {
    if !value.is_finite() {
        return DEFAULT_HOTSPOT_SIZE;
    }
    value.clamp(MIN_HOTSPOT_SIZE, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-9;

    fn canvas() -> CanvasBounds {
        CanvasBounds::new(40.0, 120.0, 800.0, 600.0)
    }

    #[test]
    fn pointer_round_trips_through_normalized_space() {
        let bounds = canvas();
        for step_x in 1..20 {
            for step_y in 1..20 {
                let pointer = PointerPosition::new(
                    bounds.left + bounds.width * step_x as f64 / 20.0,
                    bounds.top + bounds.height * step_y as f64 / 20.0,
                );
                let back = point_to_pixels(to_normalized(pointer, bounds), bounds);
                assert!((back.x - pointer.x).abs() < TOLERANCE);
                assert!((back.y - pointer.y).abs() < TOLERANCE);
            }
        }
    }

    #[test]
    fn overlay_is_centred_on_the_pointer() {
        let bounds = canvas();
        let pointer = PointerPosition::new(440.0, 420.0);
        let rect = NormalizedRect::new(to_normalized(pointer, bounds), 0.1, 0.2);
        let pixels = to_pixels(rect, bounds);

        assert!((pixels.width - 80.0).abs() < TOLERANCE);
        assert!((pixels.height - 120.0).abs() < TOLERANCE);
        let center = pixels.center();
        assert!((center.x - pointer.x).abs() < TOLERANCE);
        assert!((center.y - pointer.y).abs() < TOLERANCE);
    }

    #[test]
    fn edges_and_outside_points_are_clamped() {
        let bounds = canvas();
        let corner = to_normalized(PointerPosition::new(bounds.left, bounds.top), bounds);
        assert_eq!(corner, NormalizedPoint { x: EDGE_EPSILON, y: EDGE_EPSILON });

        let outside = to_normalized(PointerPosition::new(5_000.0, -5_000.0), bounds);
        assert_eq!(outside.x, 1.0 - EDGE_EPSILON);
        assert_eq!(outside.y, EDGE_EPSILON);
    }

    #[test]
    fn malformed_input_never_panics() {
        let zero = CanvasBounds::new(0.0, 0.0, 0.0, 0.0);
        assert_eq!(to_normalized(PointerPosition::new(3.0, 4.0), zero), NormalizedPoint::center());

        let nan = to_normalized(PointerPosition::new(f64::NAN, 10.0), canvas());
        assert_eq!(nan.x, 0.5);

        assert_eq!(clamp_size(f64::INFINITY), DEFAULT_HOTSPOT_SIZE);
        assert_eq!(clamp_size(0.0), MIN_HOTSPOT_SIZE);
        assert_eq!(clamp_size(3.0), 1.0);
    }

    #[test]
    fn containment_uses_the_centred_box() {
        let rect = NormalizedRect::new(NormalizedPoint::new(0.5, 0.5), 0.2, 0.2);
        assert!(rect.contains(NormalizedPoint::new(0.59, 0.41)));
        assert!(!rect.contains(NormalizedPoint::new(0.61, 0.5)));
    }
}
