use anyhow::{Result, ensure};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::geometry::AABB;

/// Simple polygon outline, stored as a flat coordinate list `[x0, y0, x1, y1, ...]`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Polygon {
    coords: Vec<f64>,
}

impl Polygon {
    pub fn try_new(coords: Vec<f64>) -> Result<Self> {
        let polygon = Polygon { coords };
        polygon.validate()?;
        Ok(polygon)
    }

    /// Axis-aligned rectangle with its minimum corner at the origin
    pub fn rectangle(width: f64, height: f64) -> Self {
        Polygon {
            coords: vec![0.0, 0.0, width, 0.0, width, height, 0.0, height],
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.coords.len() % 2 == 0,
            "polygon has an odd number of coordinates: {}",
            self.coords.len()
        );
        ensure!(
            self.coords.len() >= 6,
            "polygon needs at least 3 points, got {}",
            self.coords.len() / 2
        );
        ensure!(
            self.coords.iter().all(|c| c.is_finite()),
            "polygon contains non-finite coordinates"
        );
        Ok(())
    }

    pub fn coords(&self) -> &[f64] {
        &self.coords
    }

    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.coords.iter().copied().tuples()
    }

    pub fn n_points(&self) -> usize {
        self.coords.len() / 2
    }

    pub fn bbox(&self) -> AABB {
        let (x_min, y_min, x_max, y_max) = self.points().fold(
            (f64::MAX, f64::MAX, f64::MIN, f64::MIN),
            |(x_min, y_min, x_max, y_max), (x, y)| {
                (x_min.min(x), y_min.min(y), x_max.max(x), y_max.max(y))
            },
        );
        match self.n_points() {
            0 => AABB::new(0.0, 0.0, 0.0, 0.0),
            _ => AABB::new(x_min, y_min, x_max - x_min, y_max - y_min),
        }
    }

    /// Enclosed area (shoelace formula)
    pub fn area(&self) -> f64 {
        let points = self.points().collect_vec();
        let signed: f64 = points
            .iter()
            .circular_tuple_windows()
            .map(|(&(x1, y1), &(x2, y2))| x1 * y2 - x2 * y1)
            .sum();
        signed.abs() / 2.0
    }
}
