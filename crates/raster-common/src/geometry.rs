//! Integer and floating point raster geometry.
//!
//! Image space follows the usual raster convention: x grows to the right,
//! y grows downward, and a rectangle's lower-right corner is inclusive.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};

/// An integer pixel position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct IntPoint {
    pub x: i32,
    pub y: i32,
}

impl IntPoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl Add for IntPoint {
    type Output = IntPoint;
    fn add(self, rhs: IntPoint) -> IntPoint {
        IntPoint::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for IntPoint {
    type Output = IntPoint;
    fn sub(self, rhs: IntPoint) -> IntPoint {
        IntPoint::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl fmt::Display for IntPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A double precision point, used for sub-pixel positions and U/V grid
/// coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DPoint {
    pub x: f64,
    pub y: f64,
}

impl DPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Round to the nearest integer pixel.
    pub fn round(&self) -> IntPoint {
        IntPoint::new(self.x.round() as i32, self.y.round() as i32)
    }

    pub fn has_nan(&self) -> bool {
        self.x.is_nan() || self.y.is_nan()
    }

    /// Euclidean length of the point treated as a vector.
    pub fn length(&self) -> f64 {
        self.x.hypot(self.y)
    }
}

impl From<IntPoint> for DPoint {
    fn from(p: IntPoint) -> Self {
        DPoint::new(p.x as f64, p.y as f64)
    }
}

impl Add for DPoint {
    type Output = DPoint;
    fn add(self, rhs: DPoint) -> DPoint {
        DPoint::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for DPoint {
    type Output = DPoint;
    fn sub(self, rhs: DPoint) -> DPoint {
        DPoint::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for DPoint {
    type Output = DPoint;
    fn mul(self, rhs: f64) -> DPoint {
        DPoint::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<f64> for DPoint {
    type Output = DPoint;
    fn div(self, rhs: f64) -> DPoint {
        DPoint::new(self.x / rhs, self.y / rhs)
    }
}

impl fmt::Display for DPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// An axis-aligned pixel rectangle: upper-left corner plus size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct IntRect {
    ul: IntPoint,
    width: u32,
    height: u32,
}

impl IntRect {
    /// Create a rectangle from its upper-left corner and size.
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            ul: IntPoint::new(x, y),
            width,
            height,
        }
    }

    /// Create a rectangle from inclusive corners. Corners given in the wrong
    /// order are swapped.
    pub fn from_corners(a: IntPoint, b: IntPoint) -> Self {
        let min_x = a.x.min(b.x);
        let min_y = a.y.min(b.y);
        let max_x = a.x.max(b.x);
        let max_y = a.y.max(b.y);
        Self::new(
            min_x,
            min_y,
            (max_x - min_x + 1) as u32,
            (max_y - min_y + 1) as u32,
        )
    }

    pub fn ul(&self) -> IntPoint {
        self.ul
    }

    /// Inclusive lower-right corner.
    pub fn lr(&self) -> IntPoint {
        IntPoint::new(
            self.ul.x + self.width as i32 - 1,
            self.ul.y + self.height as i32 - 1,
        )
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of pixels covered.
    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn contains(&self, p: IntPoint) -> bool {
        !self.is_empty()
            && p.x >= self.ul.x
            && p.y >= self.ul.y
            && p.x <= self.lr().x
            && p.y <= self.lr().y
    }

    pub fn intersects(&self, other: &IntRect) -> bool {
        self.intersection(other).is_some()
    }

    /// The overlapping part of two rectangles, if any.
    pub fn intersection(&self, other: &IntRect) -> Option<IntRect> {
        if self.is_empty() || other.is_empty() {
            return None;
        }
        let ul = IntPoint::new(self.ul.x.max(other.ul.x), self.ul.y.max(other.ul.y));
        let lr = IntPoint::new(
            self.lr().x.min(other.lr().x),
            self.lr().y.min(other.lr().y),
        );
        if ul.x > lr.x || ul.y > lr.y {
            return None;
        }
        Some(IntRect::from_corners(ul, lr))
    }

    /// True when every pixel of `self` lies inside `other`.
    pub fn completely_within(&self, other: &IntRect) -> bool {
        !self.is_empty() && other.contains(self.ul) && other.contains(self.lr())
    }

    /// Grow the rectangle outward so both corners land on whole tile
    /// boundaries of the given tile size. A zero tile dimension is treated
    /// as one.
    pub fn stretch_to_tile_boundary(&self, tile_width: u32, tile_height: u32) -> IntRect {
        let tw = tile_width.max(1) as i32;
        let th = tile_height.max(1) as i32;
        let lr = self.lr();

        let ul_x = self.ul.x.div_euclid(tw) * tw;
        let ul_y = self.ul.y.div_euclid(th) * th;
        let lr_x = (lr.x.div_euclid(tw) + 1) * tw - 1;
        let lr_y = (lr.y.div_euclid(th) + 1) * th - 1;

        IntRect::from_corners(IntPoint::new(ul_x, ul_y), IntPoint::new(lr_x, lr_y))
    }

    /// Same rectangle moved so its upper-left corner is `ul`.
    pub fn with_origin(&self, ul: IntPoint) -> IntRect {
        IntRect::new(ul.x, ul.y, self.width, self.height)
    }
}

impl fmt::Display for IntRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {}x{}]", self.ul, self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_corners() {
        let r = IntRect::new(10, 20, 5, 4);
        assert_eq!(r.ul(), IntPoint::new(10, 20));
        assert_eq!(r.lr(), IntPoint::new(14, 23));
        assert_eq!(r.area(), 20);
    }

    #[test]
    fn test_from_corners_swaps() {
        let r = IntRect::from_corners(IntPoint::new(5, 5), IntPoint::new(0, 0));
        assert_eq!(r, IntRect::new(0, 0, 6, 6));
    }

    #[test]
    fn test_intersection() {
        let a = IntRect::new(0, 0, 10, 10);
        let b = IntRect::new(5, 5, 10, 10);
        let c = IntRect::new(20, 20, 2, 2);

        assert_eq!(a.intersection(&b), Some(IntRect::new(5, 5, 5, 5)));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert!(IntRect::new(6, 6, 2, 2).completely_within(&a));
        assert!(!b.completely_within(&a));
    }

    #[test]
    fn test_stretch_to_tile_boundary() {
        let r = IntRect::new(3, 5, 10, 3);
        let s = r.stretch_to_tile_boundary(4, 4);
        assert_eq!(s.ul(), IntPoint::new(0, 4));
        assert_eq!(s.lr(), IntPoint::new(15, 7));

        // Negative origins floor toward negative infinity
        let n = IntRect::new(-3, -1, 2, 2).stretch_to_tile_boundary(4, 4);
        assert_eq!(n.ul(), IntPoint::new(-4, -4));
        assert_eq!(n.lr(), IntPoint::new(-1, 3));
    }

    #[test]
    fn test_dpoint_ops() {
        let p = DPoint::new(1.0, 2.0) + DPoint::new(0.5, 0.5);
        assert_eq!(p, DPoint::new(1.5, 2.5));
        assert_eq!((p * 2.0).round(), IntPoint::new(3, 5));
        assert!(DPoint::new(f64::NAN, 0.0).has_nan());
    }
}
