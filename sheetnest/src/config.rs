use std::ops::RangeInclusive;

use anyhow::{Result, ensure};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::entities::Rotation;

pub const DEFAULT_SPACING: f64 = 2.0;
pub const DEFAULT_ROTATION_STEPS: u32 = 4;
pub const DEFAULT_ITERATIONS: u32 = 100;
pub const DEFAULT_POPULATION_SIZE: u32 = 50;
pub const DEFAULT_MUTATION_RATE: f64 = 0.1;

const ROTATION_STEPS_RANGE: RangeInclusive<u32> = 1..=360;
const ITERATIONS_RANGE: RangeInclusive<u32> = 1..=100_000;
const POPULATION_SIZE_RANGE: RangeInclusive<u32> = 2..=10_000;

/// Fully resolved configuration of a nesting run
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NestingConfig {
    /// Minimum gap (kerf) between two parts, in millimeters
    pub spacing: f64,
    /// Number of evenly spaced rotations (`k * 360 / rotation_steps`) a part may take
    pub rotation_steps: u32,
    /// Generation budget of advanced optimizers
    pub iterations: u32,
    pub population_size: u32,
    pub mutation_rate: f64,
}

impl Default for NestingConfig {
    fn default() -> Self {
        Self {
            spacing: DEFAULT_SPACING,
            rotation_steps: DEFAULT_ROTATION_STEPS,
            iterations: DEFAULT_ITERATIONS,
            population_size: DEFAULT_POPULATION_SIZE,
            mutation_rate: DEFAULT_MUTATION_RATE,
        }
    }
}

impl NestingConfig {
    /// Merges caller supplied overrides with the defaults.
    /// Unusable numeric values fall back to their default, a negative spacing is an error.
    pub fn resolve(overrides: &NestingConfigOverrides) -> Result<Self> {
        let default = Self::default();

        let spacing = match overrides.spacing {
            Some(s) if s.is_nan() || s == f64::INFINITY => {
                warn!("ignoring spacing {s}, using default {}", default.spacing);
                default.spacing
            }
            Some(s) => {
                ensure!(s >= 0.0, "spacing must be non-negative, got {s}");
                s
            }
            None => default.spacing,
        };

        Ok(NestingConfig {
            spacing,
            rotation_steps: resolve_count(
                "rotationSteps",
                overrides.rotation_steps,
                ROTATION_STEPS_RANGE,
                default.rotation_steps,
            ),
            iterations: resolve_count(
                "iterations",
                overrides.iterations,
                ITERATIONS_RANGE,
                default.iterations,
            ),
            population_size: resolve_count(
                "populationSize",
                overrides.population_size,
                POPULATION_SIZE_RANGE,
                default.population_size,
            ),
            mutation_rate: match overrides.mutation_rate {
                Some(m) if (0.0..=1.0).contains(&m) => m,
                Some(m) => {
                    warn!(
                        "ignoring mutationRate {m} outside [0, 1], using default {}",
                        default.mutation_rate
                    );
                    default.mutation_rate
                }
                None => default.mutation_rate,
            },
        })
    }

    /// Whether 90° (and thus 270°) is among the allowed rotations
    pub fn allows_quarter_turn(&self) -> bool {
        self.rotation_steps % 4 == 0
    }

    /// The quarter turns contained in `{k * 360 / rotation_steps}`. Always contains [`Rotation::Deg0`].
    pub fn allowed_rotations(&self) -> Vec<Rotation> {
        allowed_rotations(self.rotation_steps)
    }
}

/// The quarter turns contained in `{k * 360 / rotation_steps}`. Always contains [`Rotation::Deg0`].
pub fn allowed_rotations(rotation_steps: u32) -> Vec<Rotation> {
    let steps = rotation_steps.max(1) as u64;
    Rotation::ALL
        .into_iter()
        .filter(|r| (r.degrees() as u64 * steps) % 360 == 0)
        .collect()
}

fn resolve_count(name: &str, value: Option<f64>, range: RangeInclusive<u32>, default: u32) -> u32 {
    match value {
        None => default,
        Some(v) if v.fract() == 0.0 && v >= *range.start() as f64 && v <= *range.end() as f64 => {
            v as u32
        }
        Some(v) => {
            warn!("ignoring {name} {v} (expected an integer in {range:?}), using default {default}");
            default
        }
    }
}

/// Configuration as supplied by a caller: every field optional, numbers not yet checked
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NestingConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spacing: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation_steps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iterations: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub population_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mutation_rate: Option<f64>,
}

impl NestingConfigOverrides {
    pub fn with_spacing(mut self, spacing: f64) -> Self {
        self.spacing = Some(spacing);
        self
    }

    pub fn with_rotation_steps(mut self, rotation_steps: u32) -> Self {
        self.rotation_steps = Some(rotation_steps as f64);
        self
    }

    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = Some(iterations as f64);
        self
    }

    pub fn with_population_size(mut self, population_size: u32) -> Self {
        self.population_size = Some(population_size as f64);
        self
    }

    pub fn with_mutation_rate(mut self, mutation_rate: f64) -> Self {
        self.mutation_rate = Some(mutation_rate);
        self
    }
}
