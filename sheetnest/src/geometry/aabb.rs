use crate::entities::{Part, Rotation};

/// Axis-aligned box, anchored at its minimum corner
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AABB {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl AABB {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        AABB { x, y, w, h }
    }

    pub fn x_max(&self) -> f64 {
        self.x + self.w
    }

    pub fn y_max(&self) -> f64 {
        self.y + self.h
    }

    pub fn area(&self) -> f64 {
        self.w * self.h
    }
}

/// Anything occupying an axis-aligned rectangle on a sheet.
pub trait Footprint {
    fn position(&self) -> (f64, f64);

    /// Width and height before the rotation is applied
    fn dimensions(&self) -> (f64, f64);

    fn rotation(&self) -> Rotation;
}

/// The box actually occupied on the sheet: base dimensions, swapped under a 90° or 270° rotation.
pub fn effective_box<F: Footprint>(footprint: &F) -> AABB {
    let (x, y) = footprint.position();
    let (w, h) = footprint.dimensions();
    match footprint.rotation().swaps_axes() {
        true => AABB::new(x, y, h, w),
        false => AABB::new(x, y, w, h),
    }
}

/// A [`Part`] posed at a position and rotation, before it is committed as a placement
#[derive(Clone, Copy, Debug)]
pub struct PartPose<'a> {
    pub part: &'a Part,
    pub x: f64,
    pub y: f64,
    pub rotation: Rotation,
}

impl Footprint for PartPose<'_> {
    fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    fn dimensions(&self) -> (f64, f64) {
        (self.part.width, self.part.height)
    }

    fn rotation(&self) -> Rotation {
        self.rotation
    }
}
