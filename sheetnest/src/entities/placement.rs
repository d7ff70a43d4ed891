use std::fmt::{Display, Formatter};

use serde::de::Error;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::geometry::Footprint;

/// Angles within this many degrees of a quarter turn are snapped to it
pub const ROTATION_TOLERANCE_DEG: f64 = 1.0;

/// Orientation of a placed unit. Only quarter turns are representable.
/// Serialized as the integer number of degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub const ALL: [Rotation; 4] = [
        Rotation::Deg0,
        Rotation::Deg90,
        Rotation::Deg180,
        Rotation::Deg270,
    ];

    pub fn degrees(self) -> u16 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// Snaps an arbitrary angle (in degrees) to a quarter turn, if it is within [`ROTATION_TOLERANCE_DEG`] of one.
    pub fn from_degrees(deg: f64) -> Option<Self> {
        if !deg.is_finite() {
            return None;
        }
        let normalized = deg.rem_euclid(360.0);
        Rotation::ALL.into_iter().find(|r| {
            let diff = (normalized - r.degrees() as f64).abs();
            diff <= ROTATION_TOLERANCE_DEG || (360.0 - diff) <= ROTATION_TOLERANCE_DEG
        })
    }

    /// Whether this rotation swaps the width and height of the footprint
    pub fn swaps_axes(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }
}

impl Display for Rotation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

impl Serialize for Rotation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.degrees())
    }
}

impl<'de> Deserialize<'de> for Rotation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let deg = f64::deserialize(deserializer)?;
        Rotation::from_degrees(deg)
            .ok_or_else(|| D::Error::custom(format!("rotation must be a quarter turn, got {deg}")))
    }
}

/// Final position of one unit on one sheet.
/// `width` and `height` are the effective (post-rotation) footprint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub part_id: String,
    pub sheet_index: u32,
    pub x: f64,
    pub y: f64,
    pub rotation: Rotation,
    pub width: f64,
    pub height: f64,
}

impl Footprint for Placement {
    fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    fn dimensions(&self) -> (f64, f64) {
        // stored dimensions are already rotated, undo the swap
        match self.rotation.swaps_axes() {
            true => (self.height, self.width),
            false => (self.width, self.height),
        }
    }

    fn rotation(&self) -> Rotation {
        self.rotation
    }
}
