//! Integer pixel rectangles

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle in image pixel space.
///
/// `x`/`y` locate the upper-left pixel and may be negative (a request can
/// start outside an image). Width and height are counted in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct IRect {
    pub x: i64,
    pub y: i64,
    pub width: usize,
    pub height: usize,
}

impl IRect {
    /// Create a rectangle from its upper-left corner and size
    pub fn new(x: i64, y: i64, width: usize, height: usize) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle anchored at the image origin
    pub fn from_size(width: usize, height: usize) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Number of pixels covered
    pub fn size(&self) -> usize {
        self.width * self.height
    }

    /// Whether the rectangle covers no pixels
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Exclusive lower-right corner
    pub fn lower_right(&self) -> (i64, i64) {
        (self.x + self.width as i64, self.y + self.height as i64)
    }

    /// Same size, moved by (dx, dy). Fails when an edge would leave the
    /// `i64` pixel space.
    pub fn translated(&self, dx: i64, dy: i64) -> Result<Self> {
        let (Some(x), Some(y)) = (self.x.checked_add(dx), self.y.checked_add(dy)) else {
            return Err(out_of_range("offset", format!("({dx}, {dy})")));
        };
        Self::new(x, y, self.width, self.height).checked()
    }

    /// Grown by `left`/`top` before the origin and `right`/`bottom` after
    /// the far edge.
    pub fn grown(&self, left: usize, top: usize, right: usize, bottom: usize) -> Result<Self> {
        let x = i64::try_from(left).ok().and_then(|l| self.x.checked_sub(l));
        let y = i64::try_from(top).ok().and_then(|t| self.y.checked_sub(t));
        let width = self.width.checked_add(left).and_then(|w| w.checked_add(right));
        let height = self.height.checked_add(top).and_then(|h| h.checked_add(bottom));
        let (Some(x), Some(y), Some(width), Some(height)) = (x, y, width, height) else {
            return Err(out_of_range(
                "margin",
                format!("({left}, {top}, {right}, {bottom})"),
            ));
        };
        Self::new(x, y, width, height).checked()
    }

    /// `self` when its far edge is representable
    fn checked(self) -> Result<Self> {
        let right = i64::try_from(self.width).ok().and_then(|w| self.x.checked_add(w));
        let bottom = i64::try_from(self.height).ok().and_then(|h| self.y.checked_add(h));
        match (right, bottom) {
            (Some(_), Some(_)) => Ok(self),
            _ => Err(out_of_range("rect", format!("{self:?}"))),
        }
    }

    /// Whether the pixel (x, y) lies inside
    pub fn contains(&self, x: i64, y: i64) -> bool {
        let (x1, y1) = self.lower_right();
        x >= self.x && x < x1 && y >= self.y && y < y1
    }

    /// Overlap of two rectangles, `None` when they are disjoint
    pub fn intersection(&self, other: &IRect) -> Option<IRect> {
        let (ax1, ay1) = self.lower_right();
        let (bx1, by1) = other.lower_right();
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = ax1.min(bx1);
        let y1 = ay1.min(by1);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(IRect::new(x0, y0, (x1 - x0) as usize, (y1 - y0) as usize))
    }
}

fn out_of_range(name: &'static str, value: String) -> Error {
    Error::InvalidParameter {
        name,
        value,
        reason: "rectangle leaves the pixel coordinate range".into(),
    }
}
