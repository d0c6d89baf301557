//! bandcalc CLI - band algebra over GeoTIFF rasters

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use bandcalc_core::io::{read_geotiff, write_geotiff};
use bandcalc_core::{IRect, MemorySource, ScalarType, Tile, TileSource};
use bandcalc_equation::{EquationParams, Function, Keywordlist};
use bandcalc_parallel::{ProcessingMode, TiledEvaluator, DEFAULT_TILE_SIZE};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "bandcalc")]
#[command(author, version, about = "Band algebra over GeoTIFF rasters", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate an equation over one or more input rasters
    Eval {
        /// Input rasters, referenced as im[0], im[1], ... in order
        inputs: Vec<PathBuf>,
        /// Equation, e.g. "(im[0] - im[1]) / (im[0] + im[1])"
        #[arg(short, long)]
        equation: Option<String>,
        /// Keyword-list file with saved engine state
        #[arg(short, long)]
        state: Option<PathBuf>,
        /// Output file; multi-band results get one file per band
        #[arg(short, long)]
        output: PathBuf,
        /// Output scalar type (uint8, sint16, float32, ...)
        #[arg(short = 't', long)]
        output_type: Option<String>,
        /// Force the number of output bands
        #[arg(short, long)]
        bands: Option<usize>,
        /// Work tile edge length in pixels
        #[arg(long, default_value_t = DEFAULT_TILE_SIZE)]
        tile_size: usize,
        /// Worker threads (0 = all cores, 1 = sequential)
        #[arg(short = 'j', long, default_value = "0")]
        threads: usize,
        /// Write the effective engine state to this keyword-list file
        #[arg(long)]
        save_state: Option<PathBuf>,
    },
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// List the functions an equation can call
    Functions,
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")
}

fn spinner(msg: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    Ok(pb)
}

fn read_input(path: &Path) -> Result<MemorySource> {
    let pb = spinner(&format!("Reading {}...", path.display()))?;
    let source = read_geotiff(path)
        .with_context(|| format!("Failed to read raster {}", path.display()))?;
    pb.finish_and_clear();
    info!(
        "Input: {} ({} x {}, {} bands)",
        path.display(),
        source.width(),
        source.height(),
        source.number_of_output_bands()
    );
    Ok(source)
}

/// `out.tif` for one band, `out_b1.tif`, `out_b2.tif`, ... otherwise
fn band_path(output: &Path, band: usize, bands: usize) -> PathBuf {
    if bands == 1 {
        return output.to_path_buf();
    }
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match output.extension() {
        Some(ext) => format!("{}_b{}.{}", stem, band + 1, ext.to_string_lossy()),
        None => format!("{}_b{}", stem, band + 1),
    };
    output.with_file_name(name)
}

fn load_params(
    equation: Option<String>,
    state: Option<&Path>,
    output_type: Option<&str>,
) -> Result<EquationParams> {
    let mut params = EquationParams::default();
    if let Some(path) = state {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read state {}", path.display()))?;
        params.load_state(&Keywordlist::parse(&text), "");
    }
    if let Some(equation) = equation {
        params.equation = equation;
    }
    if let Some(name) = output_type {
        params.output_scalar_type = ScalarType::from_name(name).with_context(|| {
            format!("Unknown output type: {name}. Use uint8, sint16, float32, float64, ...")
        })?;
    }
    Ok(params)
}

fn write_output(tile: &Tile, output: &Path, first: &MemorySource) -> Result<()> {
    let pb = spinner("Writing output...")?;
    let bands = tile.number_of_bands();
    for band in 0..bands {
        let path = band_path(output, band, bands);
        write_geotiff(tile, band, &path, first.geotags())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Band {} saved to: {}", band + 1, path.display());
    }
    pb.finish_and_clear();
    Ok(())
}

fn print_statistics(tile: &Tile) -> Result<()> {
    for band in 0..tile.number_of_bands() {
        let stats = tile.statistics(band)?;
        println!("Band {}:", band + 1);
        if let (Some(min), Some(max), Some(mean)) = (stats.min, stats.max, stats.mean) {
            println!("  Min: {:.4}  Max: {:.4}  Mean: {:.4}", min, max, mean);
        }
        println!(
            "  Valid cells: {} ({:.1}%)",
            stats.valid_count,
            100.0 * stats.valid_count as f64 / tile.size_per_band().max(1) as f64
        );
    }
    Ok(())
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Eval {
            inputs,
            equation,
            state,
            output,
            output_type,
            bands,
            tile_size,
            threads,
            save_state,
        } => {
            anyhow::ensure!(!inputs.is_empty(), "At least one input raster is required");
            let params = load_params(equation, state.as_deref(), output_type.as_deref())?;

            let sources = inputs
                .iter()
                .map(|p| read_input(p))
                .collect::<Result<Vec<_>>>()?;
            let first = &sources[0];
            let extent = IRect::from_size(first.width(), first.height());
            for (path, source) in inputs.iter().zip(&sources).skip(1) {
                if source.width() != first.width() || source.height() != first.height() {
                    tracing::warn!(
                        "{} is {} x {}; pixels outside it read as null",
                        path.display(),
                        source.width(),
                        source.height()
                    );
                }
            }

            if let Some(path) = save_state {
                let mut kwl = Keywordlist::new();
                params.save_state(&mut kwl, "");
                std::fs::write(&path, kwl.to_string())
                    .with_context(|| format!("Failed to write state {}", path.display()))?;
            }

            let mut evaluator = TiledEvaluator::new(params)
                .with_tile_size(tile_size)
                .with_mode(ProcessingMode::from_threads(threads));
            if let Some(bands) = bands {
                evaluator = evaluator.with_output_bands(bands);
            }
            for source in &sources {
                evaluator.connect(Arc::new(source.clone()));
            }

            let start = Instant::now();
            let pb = spinner("Evaluating equation...")?;
            let tile = evaluator
                .evaluate(&extent, 0)
                .with_context(|| format!("Failed to evaluate '{}'", evaluator.params().equation))?;
            pb.finish_and_clear();
            let elapsed = start.elapsed();

            write_output(&tile, &output, first)?;
            println!("  Status: {:?}", tile.status());
            println!("  Processing time: {:.2?}", elapsed);
        }

        Commands::Info { input } => {
            let source = read_input(&input)?;
            let extent = IRect::from_size(source.width(), source.height());
            let tile = source
                .get_tile(&extent, 0)?
                .context("Raster has no pixels")?;

            println!("File: {}", input.display());
            println!(
                "Dimensions: {} x {} ({} cells)",
                source.width(),
                source.height(),
                extent.size()
            );
            println!("Bands: {}", source.number_of_output_bands());
            println!("Scalar type: {}", source.output_scalar_type().name());
            println!("NoData: {}", source.null_pixel_value(0));
            if let Some(tags) = source.geotags() {
                if let [sx, sy, ..] = tags.pixel_scale[..] {
                    println!("Cell size: {} x {}", sx, sy);
                }
                if let [_, _, _, x, y, ..] = tags.tiepoint[..] {
                    println!("Origin: ({:.6}, {:.6})", x, y);
                }
            }
            println!("\nStatistics:");
            print_statistics(&tile)?;
        }

        Commands::Functions => {
            for (name, function) in Function::TABLE {
                let usage = match function {
                    Function::AssignBand => "assign_band(image, band, value[, value_band])",
                    Function::Band => "band(image, band)",
                    Function::Blurr => "blurr(input, rows, cols)",
                    Function::Clamp => "clamp(image, min, max)",
                    Function::Conv => "conv(input, rows, cols, weights...)",
                    Function::Max | Function::Min => "(a, b, ...)",
                    Function::Shift => "shift(input, dx, dy)",
                    Function::Unary(_) => "(x)",
                };
                if usage.starts_with('(') {
                    println!("  {name}{usage}");
                } else {
                    println!("  {usage}");
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_path() {
        let out = Path::new("/tmp/ndvi.tif");
        assert_eq!(band_path(out, 0, 1), PathBuf::from("/tmp/ndvi.tif"));
        assert_eq!(band_path(out, 1, 3), PathBuf::from("/tmp/ndvi_b2.tif"));
        assert_eq!(band_path(Path::new("out"), 0, 2), PathBuf::from("out_b1"));
    }

    #[test]
    fn test_load_params_overrides_state() {
        let params = load_params(Some("im[0] * 2".into()), None, Some("uint8")).unwrap();
        assert_eq!(params.equation, "im[0] * 2");
        assert_eq!(params.output_scalar_type, ScalarType::UInt8);
        assert!(load_params(None, None, Some("complex")).is_err());
    }
}
