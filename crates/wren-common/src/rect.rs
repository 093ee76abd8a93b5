//! Integer-pixel layout rectangles and partial-rectangle merging.

use serde::{Deserialize, Serialize};

/// A rectangle in integer pixels, as applied to a surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// A partial rectangle. Present fields override the base on `apply_to`;
/// fractional values round to the nearest pixel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RectPatch {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
}

impl RectPatch {
    pub fn is_empty(&self) -> bool {
        self.x.is_none() && self.y.is_none() && self.width.is_none() && self.height.is_none()
    }

    /// Merge this patch over `base`, rounding each overridden field.
    pub fn apply_to(&self, base: Rect) -> Rect {
        Rect {
            x: round_or(self.x, base.x),
            y: round_or(self.y, base.y),
            width: round_or(self.width, base.width),
            height: round_or(self.height, base.height),
        }
    }

    /// Layer `other` over `self`; fields present in `other` win.
    pub fn merge(self, other: RectPatch) -> RectPatch {
        RectPatch {
            x: other.x.or(self.x),
            y: other.y.or(self.y),
            width: other.width.or(self.width),
            height: other.height.or(self.height),
        }
    }
}

impl From<Rect> for RectPatch {
    fn from(rect: Rect) -> Self {
        RectPatch {
            x: Some(rect.x as f64),
            y: Some(rect.y as f64),
            width: Some(rect.width as f64),
            height: Some(rect.height as f64),
        }
    }
}

fn round_or(value: Option<f64>, fallback: i32) -> i32 {
    match value {
        Some(v) if v.is_finite() => v.round() as i32,
        _ => fallback,
    }
}
