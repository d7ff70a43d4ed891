use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::config::{NestingConfig, allowed_rotations};
use crate::entities::{NestingProgress, Part, Rotation, Sheet};
use crate::geometry::Polygon;

/// A part as seen by an advanced optimizer: its true outline instead of a footprint rectangle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizerPart {
    pub id: String,
    pub polygon: Polygon,
    pub quantity: u32,
}

/// Everything an [`Optimizer`] needs to run one job
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizerRequest {
    pub parts: Vec<OptimizerPart>,
    pub sheet: Sheet,
    pub spacing: f64,
    pub rotation_steps: u32,
    pub iterations: u32,
    pub population_size: u32,
    pub mutation_rate: f64,
}

impl OptimizerRequest {
    pub fn new(parts: &[Part], sheet: Sheet, config: &NestingConfig) -> Self {
        let parts = parts
            .iter()
            .map(|p| OptimizerPart {
                id: p.id.clone(),
                polygon: p.outline(),
                quantity: p.quantity,
            })
            .collect();
        OptimizerRequest {
            parts,
            sheet,
            spacing: config.spacing,
            rotation_steps: config.rotation_steps,
            iterations: config.iterations,
            population_size: config.population_size,
            mutation_rate: config.mutation_rate,
        }
    }

    pub fn total_units(&self) -> usize {
        self.parts.iter().map(|p| p.quantity as usize).sum()
    }

    pub fn allowed_rotations(&self) -> Vec<Rotation> {
        allowed_rotations(self.rotation_steps)
    }
}

/// A placement as reported by an optimizer.
/// The rotation is in degrees and not yet checked to be a quarter turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizerPlacement {
    pub part_id: String,
    pub sheet_index: u32,
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizerOutput {
    pub placements: Vec<OptimizerPlacement>,
    pub sheets_used: u32,
    pub utilization: Vec<f64>,
    pub iterations_run: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum OptimizeOutcome {
    Finished(OptimizerOutput),
    /// The observer requested cancellation before the search finished
    Cancelled { iterations_run: u32 },
}

/// Receives progress from a running [`Optimizer`] and decides whether it should stop.
pub trait OptimizerObserver {
    fn on_progress(&mut self, progress: NestingProgress);

    /// Polled at least once per generation
    fn cancel_requested(&mut self) -> bool;
}

/// Observer which ignores progress and never cancels, for synchronous callers
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl OptimizerObserver for NoopObserver {
    fn on_progress(&mut self, _progress: NestingProgress) {}

    fn cancel_requested(&mut self) -> bool {
        false
    }
}

/// An advanced nesting backend, interchangeable with the shelf heuristic.
///
/// Implementations must keep every placement inside the sheet and keep at least
/// `spacing` between the footprints of two placements on the same sheet.
pub trait Optimizer: Send {
    /// Reported as the `algorithm` of the result
    fn name(&self) -> &str;

    fn optimize(
        &self,
        request: &OptimizerRequest,
        observer: &mut dyn OptimizerObserver,
    ) -> Result<OptimizeOutcome>;
}
