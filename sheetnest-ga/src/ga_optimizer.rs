use std::cmp::Reverse;
use std::time::Instant;

use anyhow::{Result, ensure};
use itertools::Itertools;
use log::{debug, info};
use ordered_float::OrderedFloat;
use rand::prelude::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use sheetnest::entities::{NestingProgress, Rotation};
use sheetnest::optimizer::{
    OptimizeOutcome, Optimizer, OptimizerObserver, OptimizerOutput, OptimizerPlacement,
    OptimizerRequest,
};
use thousands::Separable;

use crate::chromosome::Chromosome;
use crate::config::GAConfig;
use crate::decoder::{DecodeUnit, Decoded, SkylineDecoder};

/// Lexicographic fitness, higher is better: placed units, then fewer sheets, then packing quality
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Score {
    n_placed: usize,
    sheets_used: Reverse<u32>,
    quality: OrderedFloat<f64>,
}

impl Score {
    fn of(decoded: &Decoded) -> Self {
        Score {
            n_placed: decoded.n_placed(),
            sheets_used: Reverse(decoded.sheets_used),
            quality: OrderedFloat(decoded.packing_quality()),
        }
    }
}

#[derive(Clone, Debug)]
struct Individual {
    chromosome: Chromosome,
    score: Score,
    utilization: f64,
}

/// Genetic search over unit order and rotations, decoded by a bottom-left skyline placer.
pub struct GAOptimizer {
    pub config: GAConfig,
}

impl GAOptimizer {
    pub fn new(config: GAConfig) -> Self {
        Self { config }
    }
}

impl Default for GAOptimizer {
    fn default() -> Self {
        Self::new(GAConfig::default())
    }
}

/// Everything needed to evaluate a chromosome, shared by all rayon workers
struct Problem<'a> {
    units: &'a [DecodeUnit],
    rotations: &'a [Rotation],
    decoder: SkylineDecoder,
}

impl Problem<'_> {
    fn decode(&self, chromosome: &Chromosome) -> Decoded {
        self.decoder.decode(self.units, chromosome, self.rotations)
    }

    fn evaluate(&self, chromosome: Chromosome) -> Individual {
        let decoded = self.decode(&chromosome);
        Individual {
            score: Score::of(&decoded),
            utilization: decoded.overall_utilization(),
            chromosome,
        }
    }

    fn evaluate_all(&self, chromosomes: Vec<Chromosome>) -> Vec<Individual> {
        chromosomes
            .into_par_iter()
            .map(|c| self.evaluate(c))
            .collect()
    }
}

impl Optimizer for GAOptimizer {
    fn name(&self) -> &str {
        "genetic"
    }

    fn optimize(
        &self,
        request: &OptimizerRequest,
        observer: &mut dyn OptimizerObserver,
    ) -> Result<OptimizeOutcome> {
        request.sheet.validate()?;
        ensure!(
            request.spacing.is_finite() && request.spacing >= 0.0,
            "spacing must be a finite, non-negative number, got {}",
            request.spacing
        );
        for part in &request.parts {
            part.polygon.validate()?;
        }
        let duplicates = request.parts.iter().map(|p| p.id.as_str()).duplicates().collect_vec();
        ensure!(
            duplicates.is_empty(),
            "part ids must be unique, duplicated: {}",
            duplicates.join(", ")
        );
        let start = Instant::now();

        let units = request
            .parts
            .iter()
            .enumerate()
            .flat_map(|(i, part)| {
                let bbox = part.polygon.bbox();
                (0..part.quantity).map(move |_| DecodeUnit {
                    part: i,
                    width: bbox.w,
                    height: bbox.h,
                })
            })
            .collect_vec();
        let rotations = request.allowed_rotations();
        let problem = Problem {
            units: &units,
            rotations: &rotations,
            decoder: SkylineDecoder::new(request.sheet.width, request.sheet.height, request.spacing),
        };

        if units.is_empty() {
            info!("[GA] nothing to nest");
            return Ok(OptimizeOutcome::Finished(OptimizerOutput::default()));
        }

        let mut rng = match self.config.prng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };

        let pop_size = (request.population_size as usize).max(2);
        let elite_count = self.config.elite_count.min(pop_size - 1);
        let tournament_size = self.config.tournament_size.max(1);
        let n_generations = request.iterations;

        info!(
            "[GA] nesting {} units of {} parts, population: {}, generations: {}, rotations: [{}]",
            units.len(),
            request.parts.len(),
            pop_size,
            n_generations,
            rotations.iter().join(", ")
        );

        //first individual: tallest units first, nothing rotated
        let seeded = Chromosome::from_order(
            (0..units.len())
                .sorted_by_key(|&u| Reverse(OrderedFloat(units[u].height)))
                .collect(),
        );
        let initial = std::iter::once(seeded)
            .chain((1..pop_size).map(|_| Chromosome::random(units.len(), rotations.len(), &mut rng)))
            .collect_vec();
        let mut population = problem.evaluate_all(initial);
        sort_population(&mut population);
        let mut n_evaluations = population.len();

        let mut iterations_run = 0;
        for generation in 1..=n_generations {
            if observer.cancel_requested() {
                info!("[GA] cancelled after {} generations", iterations_run);
                return Ok(OptimizeOutcome::Cancelled { iterations_run });
            }

            let children = (elite_count..pop_size)
                .map(|_| {
                    let p1 = tournament_select(&population, tournament_size, &mut rng);
                    let p2 = tournament_select(&population, tournament_size, &mut rng);
                    let mut child = match rng.random::<f64>() < self.config.crossover_rate {
                        true => p1.chromosome.order_crossover(&p2.chromosome, &mut rng),
                        false => p1.chromosome.clone(),
                    };
                    mutate(&mut child, request.mutation_rate, rotations.len(), &mut rng);
                    child
                })
                .collect_vec();
            n_evaluations += children.len();

            population.truncate(elite_count);
            population.extend(problem.evaluate_all(children));
            sort_population(&mut population);
            iterations_run = generation;

            let best = &population[0];
            debug!(
                "[GA] generation {}/{}: placed {}/{}, sheets: {}, utilization: {:.3}",
                generation,
                n_generations,
                best.score.n_placed,
                units.len(),
                best.score.sheets_used.0,
                best.utilization
            );
            observer.on_progress(NestingProgress {
                iteration: generation,
                total_iterations: n_generations,
                utilization: best.utilization,
            });
        }

        let best = problem.decode(&population[0].chromosome);
        let placements = best
            .placements
            .iter()
            .map(|p| OptimizerPlacement {
                part_id: request.parts[units[p.unit].part].id.clone(),
                sheet_index: p.sheet_index,
                x: p.x,
                y: p.y,
                rotation: p.rotation.degrees() as f64,
            })
            .collect_vec();

        info!(
            "[GA] finished in {:.3}ms ({} evaluations), placed {}/{} units on {} sheet(s)",
            start.elapsed().as_secs_f64() * 1000.0,
            n_evaluations.separate_with_commas(),
            placements.len(),
            units.len(),
            best.sheets_used
        );

        Ok(OptimizeOutcome::Finished(OptimizerOutput {
            placements,
            sheets_used: best.sheets_used,
            utilization: best.utilization,
            iterations_run,
        }))
    }
}

/// Best first. Ties keep their order, so elites are stable between generations.
fn sort_population(population: &mut [Individual]) {
    population.sort_by_key(|i| Reverse(i.score));
}

fn tournament_select<'a>(population: &'a [Individual], size: usize, rng: &mut impl Rng) -> &'a Individual {
    (0..size)
        .map(|_| &population[rng.random_range(0..population.len())])
        .max_by_key(|i| i.score)
        .unwrap_or(&population[0])
}

fn mutate(chromosome: &mut Chromosome, rate: f64, n_rotations: usize, rng: &mut impl Rng) {
    if rng.random::<f64>() < rate {
        chromosome.swap_mutate(rng);
    }
    if rng.random::<f64>() < rate {
        chromosome.inversion_mutate(rng);
    }
    if rng.random::<f64>() < rate {
        chromosome.rotation_mutate(n_rotations, rng);
    }
}
