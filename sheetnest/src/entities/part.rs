use anyhow::{Result, ensure};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::geometry::Polygon;

/// A flat part to be cut, `quantity` times, out of a sheet.
/// Dimensions are the axis-aligned footprint in millimeters, in the part's own (unrotated) frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    pub id: String,
    pub width: f64,
    pub height: f64,
    pub quantity: u32,
    /// True outline of the part, if the geometry extraction produced one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polygon: Option<Polygon>,
}

impl Part {
    pub fn new(id: impl Into<String>, width: f64, height: f64, quantity: u32) -> Self {
        Part {
            id: id.into(),
            width,
            height,
            quantity,
            polygon: None,
        }
    }

    pub fn with_polygon(mut self, polygon: Polygon) -> Self {
        self.polygon = Some(polygon);
        self
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(!self.id.is_empty(), "part id must not be empty");
        ensure!(
            self.width.is_finite() && self.width >= 0.0,
            "invalid width for part {}: {}",
            self.id,
            self.width
        );
        ensure!(
            self.height.is_finite() && self.height >= 0.0,
            "invalid height for part {}: {}",
            self.id,
            self.height
        );
        if let Some(polygon) = &self.polygon {
            polygon.validate()?;
            let bbox = polygon.bbox();
            ensure!(
                dims_agree(bbox.w, self.width) && dims_agree(bbox.h, self.height),
                "polygon of part {} spans {}x{}, its declared footprint is {}x{}",
                self.id,
                bbox.w,
                bbox.h,
                self.width,
                self.height
            );
        }
        Ok(())
    }

    /// The outline handed to advanced optimizers: the true polygon if present, the footprint rectangle otherwise.
    pub fn outline(&self) -> Polygon {
        self.polygon
            .clone()
            .unwrap_or_else(|| Polygon::rectangle(self.width, self.height))
    }

    pub fn footprint_area(&self) -> f64 {
        self.width * self.height
    }
}

/// Relative slack when comparing a polygon's extent with the declared footprint
const FOOTPRINT_TOLERANCE: f64 = 1e-6;

fn dims_agree(a: f64, b: f64) -> bool {
    (a - b).abs() <= FOOTPRINT_TOLERANCE * a.abs().max(b.abs()).max(1.0)
}

/// Validates every part and checks that no two parts share an id
pub fn validate_parts(parts: &[Part]) -> Result<()> {
    for part in parts {
        part.validate()?;
    }
    let duplicates = parts.iter().map(|p| p.id.as_str()).duplicates().collect_vec();
    ensure!(
        duplicates.is_empty(),
        "part ids must be unique, duplicated: {}",
        duplicates.join(", ")
    );
    Ok(())
}

/// A single placeable unit of a [`Part`], after quantity expansion.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UnitItem<'a> {
    pub part_id: &'a str,
    pub width: f64,
    pub height: f64,
}

/// Expands every part into `quantity` independent units, preserving input order.
pub fn expand_units(parts: &[Part]) -> Vec<UnitItem<'_>> {
    parts
        .iter()
        .flat_map(|p| {
            (0..p.quantity).map(move |_| UnitItem {
                part_id: &p.id,
                width: p.width,
                height: p.height,
            })
        })
        .collect()
}
