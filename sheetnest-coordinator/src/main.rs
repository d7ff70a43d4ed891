use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::Parser as ClapParser;
use log::{info, warn};
use sheetnest::io::ext_repr::{ExtInstance, ExtSolution};
use sheetnest::io::svg::{SvgDrawOptions, result_to_svg};
use sheetnest::optimizer::Optimizer;
use sheetnest_coordinator::cli::Cli;
use sheetnest_coordinator::{Coordinator, NestingSession, io};
use sheetnest_ga::{GAConfig, GAOptimizer};

pub static EPOCH: LazyLock<Instant> = LazyLock::new(Instant::now);

const HEURISTIC_ALGORITHM: &str = "shelf";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    io::init_logger(args.log_level, *EPOCH)?;

    let config: GAConfig = match &args.config_file {
        None => {
            warn!("[MAIN] No config file provided, use --config-file to provide a custom config");
            GAConfig::default()
        }
        Some(config_file) => io::read_json(config_file).context("incorrect config file format")?,
    };
    info!("[MAIN] Successfully parsed GAConfig: {config:?}");

    let input_stem = args
        .input_file
        .file_stem()
        .and_then(|s| s.to_str())
        .context("input file has no usable name")?
        .to_string();

    if !args.solution_folder.exists() {
        fs::create_dir_all(&args.solution_folder)
            .with_context(|| format!("could not create solution folder: {:?}", args.solution_folder))?;
    }

    let instance: ExtInstance = io::read_json(&args.input_file)?;
    info!(
        "[MAIN] instance {} loaded: {} part types on {}x{} sheets",
        instance.name.as_deref().unwrap_or(&input_stem),
        instance.parts.len(),
        instance.sheet.width,
        instance.sheet.height
    );

    let optimizer = GAOptimizer::new(config);
    let optimizer_name = optimizer.name().to_string();
    let coordinator = match args.heuristic {
        true => Coordinator::heuristic(),
        false => Coordinator::with_optimizer(move || Ok(Box::new(optimizer) as Box<dyn Optimizer>)).await,
    };

    let ExtInstance {
        sheet, parts, config, ..
    } = instance;
    let mut session = NestingSession::new(parts, sheet, config);
    session.run(&coordinator).await?;

    let Some(result) = session.result() else {
        bail!(
            "nesting did not complete: {}",
            session.error().unwrap_or("cancelled")
        );
    };
    let algorithm = match coordinator.advanced_available() {
        true => optimizer_name.as_str(),
        false => HEURISTIC_ALGORITHM,
    };

    {
        let solution = ExtSolution::new(result.clone(), &session.parts, algorithm, coordinator.advanced_available());
        if !solution.unplaced.is_empty() {
            warn!("[MAIN] {} part types could not be (fully) placed", solution.unplaced.len());
        }
        let solution_path = args.solution_folder.join(format!("sol_{input_stem}.json"));
        io::write_json(&solution, Path::new(&solution_path))?;
    }

    {
        for i in 0..result.sheets_used {
            let svg_path = args.solution_folder.join(format!("sol_{input_stem}_{i}.svg"));
            let svg = result_to_svg(result, &session.sheet, i, SvgDrawOptions::default());
            io::write_svg(&svg, Path::new(&svg_path))?;
        }
    }

    Ok(())
}
