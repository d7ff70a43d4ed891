use std::fmt::{Display, Formatter};
use std::str::FromStr;

use anyhow::{Context, Result, ensure};
use serde::de::Error;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use svg::node::element::Path;
use svg::node::element::path::Data;

use crate::geometry::AABB;

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize, Copy)]
pub struct SvgDrawOptions {
    ///The theme to use for the svg
    #[serde(default)]
    pub theme: SvgTheme,
    ///Write the part id on top of every placement
    #[serde(default)]
    pub label_parts: bool,
    ///Draw dashed lines between overlapping placements
    #[serde(default)]
    pub highlight_collisions: bool,
}

impl Default for SvgDrawOptions {
    fn default() -> Self {
        Self {
            theme: SvgTheme::default(),
            label_parts: true,
            highlight_collisions: true,
        }
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize, Copy)]
pub struct SvgTheme {
    pub stroke_width_multiplier: f64,
    pub sheet_fill: Color,
    pub part_fill: Color,
    pub rotated_part_fill: Color,
    pub collision_highlight_color: Color,
}

impl Default for SvgTheme {
    fn default() -> Self {
        SvgTheme::EARTH_TONES
    }
}

impl SvgTheme {
    pub const EARTH_TONES: SvgTheme = SvgTheme {
        stroke_width_multiplier: 2.0,
        sheet_fill: Color(0xCC, 0x82, 0x4A),
        part_fill: Color(0xFF, 0xC8, 0x79),
        rotated_part_fill: Color(0xFF, 0xA5, 0x00), // LIGHT ORANGE
        collision_highlight_color: Color(0x00, 0xFF, 0x00), // LIME
    };

    pub const GRAY: SvgTheme = SvgTheme {
        stroke_width_multiplier: 2.5,
        sheet_fill: Color(0xD3, 0xD3, 0xD3),
        part_fill: Color(0x7A, 0x7A, 0x7A),
        rotated_part_fill: Color(0x63, 0x63, 0x63),
        collision_highlight_color: Color(0xD0, 0x00, 0x00),
    };
}

#[derive(Copy, Clone, PartialEq, Debug)]
pub struct Color(u8, u8, u8);

impl Display for Color {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }
}

impl FromStr for Color {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        ensure!(hex.len() == 6 && hex.is_ascii(), "invalid color: {s}");
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16).with_context(|| format!("invalid color: {s}"))
        };
        Ok(Color(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl Serialize for Color {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{self}"))
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Color::from_str(&s).map_err(D::Error::custom)
    }
}

/// svg path data is single precision
fn pt(x: f64, y: f64) -> (f32, f32) {
    (x as f32, y as f32)
}

pub fn aabb_data(bx: &AABB) -> Data {
    Data::new()
        .move_to(pt(bx.x, bx.y))
        .line_to(pt(bx.x_max(), bx.y))
        .line_to(pt(bx.x_max(), bx.y_max()))
        .line_to(pt(bx.x, bx.y_max()))
        .close()
}

pub fn line_data((x1, y1): (f64, f64), (x2, y2): (f64, f64)) -> Data {
    Data::new().move_to(pt(x1, y1)).line_to(pt(x2, y2))
}

pub fn data_to_path(data: Data, params: &[(&str, &str)]) -> Path {
    let mut path = Path::new();
    for param in params {
        path = path.set(param.0, param.1)
    }
    path.set("d", data)
}
