//! Page-space geometry.
//!
//! PDF page coordinates are bottom-up: the origin is the lower-left corner of
//! the page and y grows upward. Signature boxes arrive from callers as
//! `[llx, lly, urx, ury]` corner tuples and are normalized here.

/// An axis-aligned rectangle in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    /// X coordinate of the lower-left corner
    pub llx: f32,
    /// Y coordinate of the lower-left corner
    pub lly: f32,
    /// X coordinate of the upper-right corner
    pub urx: f32,
    /// Y coordinate of the upper-right corner
    pub ury: f32,
}

impl Rect {
    /// Create a rectangle from its two corners, normalizing corner order.
    pub fn new(llx: f32, lly: f32, urx: f32, ury: f32) -> Self {
        Self {
            llx: llx.min(urx),
            lly: lly.min(ury),
            urx: llx.max(urx),
            ury: lly.max(ury),
        }
    }

    /// Build a rectangle from a `[llx, lly, urx, ury]` coordinate tuple.
    pub fn from_coords(coord: [i32; 4]) -> Self {
        Self::new(coord[0] as f32, coord[1] as f32, coord[2] as f32, coord[3] as f32)
    }

    /// Rectangle width.
    pub fn width(&self) -> f32 {
        self.urx - self.llx
    }

    /// Rectangle height.
    pub fn height(&self) -> f32 {
        self.ury - self.lly
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_normalizes_corners() {
        let rect = Rect::new(200.0, 150.0, 100.0, 50.0);
        assert_eq!(rect.llx, 100.0);
        assert_eq!(rect.lly, 50.0);
        assert_eq!(rect.width(), 100.0);
        assert_eq!(rect.height(), 100.0);
    }

    #[test]
    fn test_rect_from_coords() {
        let rect = Rect::from_coords([36, 36, 236, 106]);
        assert_eq!(rect.width(), 200.0);
        assert_eq!(rect.height(), 70.0);
    }
}
