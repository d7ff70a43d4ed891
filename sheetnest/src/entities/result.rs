use serde::{Deserialize, Serialize};

use crate::entities::{Part, Placement, Sheet};
use crate::geometry::{effective_box, utilization};

/// Outcome of a nesting run, regardless of which backend produced it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NestingResult {
    pub placements: Vec<Placement>,
    pub sheets_used: u32,
    /// Fraction of each used sheet's area covered by placed footprints, indexed by sheet
    pub utilization: Vec<f64>,
}

impl NestingResult {
    /// Builds a result from placements, deriving the per-sheet utilization from their footprints.
    pub fn from_placements(placements: Vec<Placement>, sheets_used: u32, sheet: &Sheet) -> Self {
        let utilization = (0..sheets_used)
            .map(|i| {
                let boxes = placements
                    .iter()
                    .filter(|p| p.sheet_index == i)
                    .map(effective_box);
                utilization(boxes, sheet.width, sheet.height)
            })
            .collect();
        NestingResult {
            placements,
            sheets_used,
            utilization,
        }
    }

    pub fn placements_on(&self, sheet_index: u32) -> impl Iterator<Item = &Placement> {
        self.placements
            .iter()
            .filter(move |p| p.sheet_index == sheet_index)
    }

    /// Units requested in `parts` which did not receive a placement, in input order.
    pub fn unplaced(&self, parts: &[Part]) -> Vec<UnplacedPart> {
        parts
            .iter()
            .filter_map(|part| {
                let placed = self
                    .placements
                    .iter()
                    .filter(|p| p.part_id == part.id)
                    .count() as u32;
                let missing = part.quantity.saturating_sub(placed);
                (missing > 0).then(|| UnplacedPart {
                    part_id: part.id.clone(),
                    quantity: missing,
                })
            })
            .collect()
    }

    pub fn mean_utilization(&self) -> f64 {
        match self.utilization.is_empty() {
            true => 0.0,
            false => self.utilization.iter().sum::<f64>() / self.utilization.len() as f64,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnplacedPart {
    pub part_id: String,
    pub quantity: u32,
}

/// Snapshot emitted by long-running optimizers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NestingProgress {
    pub iteration: u32,
    pub total_iterations: u32,
    pub utilization: f64,
}
