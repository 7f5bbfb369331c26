use std::fs::{create_dir_all, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use kp_anonymity::loss::{global_pattern_loss, global_value_loss};
use kp_anonymity::output::{output_path_for, write_anonymized};
use kp_anonymity::{load_dataset, run, Algorithm, AnonymityParams, Dataset};

#[derive(Parser, Debug)]
#[command(name = "kp-anonymity", about = "(k,P)-anonymity for time-series tables")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Anonymize one dataset with one strategy.
    Run {
        /// Strategy to run.
        #[arg(value_enum)]
        algorithm: Algorithm,
        /// Input CSV: id column first, sensitive attribute last.
        dataset: PathBuf,
        /// k-anonymity requirement.
        #[arg(long, default_value_t = 4)]
        k: usize,
        /// P-anonymity requirement.
        #[arg(long, default_value_t = 2)]
        p: usize,
        /// PAA word length of the pattern representation.
        #[arg(long, default_value_t = 4)]
        paa: usize,
        /// l-diversity bound.
        #[arg(long, default_value_t = 2)]
        l: usize,
        /// Initial l-diversity perturbation range.
        #[arg(long, default_value_t = 1)]
        epsilon: i64,
        /// Maximum SAX granularity.
        #[arg(long, default_value_t = 5)]
        max_level: usize,
        /// JSON file overriding the parameter flags.
        #[arg(long)]
        params: Option<PathBuf>,
        /// Seed the random source for a reproducible run.
        #[arg(long)]
        seed: Option<u64>,
        /// Output path (default: anonymized/<stem>_anon.csv next to the input).
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Run a grid of (algorithm, k, P) combinations over one dataset.
    Sweep {
        /// Input CSV: id column first, sensitive attribute last.
        dataset: PathBuf,
        /// k values to try.
        #[arg(long, value_delimiter = ',', default_value = "4,8")]
        k_values: Vec<usize>,
        /// P values to try.
        #[arg(long, value_delimiter = ',', default_value = "2,4")]
        p_values: Vec<usize>,
        /// PAA word length of the pattern representation.
        #[arg(long, default_value_t = 4)]
        paa: usize,
        /// l-diversity bound.
        #[arg(long, default_value_t = 2)]
        l: usize,
        /// Maximum SAX granularity.
        #[arg(long, default_value_t = 5)]
        max_level: usize,
        /// Base seed; combination i runs with seed + i.
        #[arg(long)]
        seed: Option<u64>,
        /// Directory for the sweep summary.
        #[arg(long, default_value = "results")]
        out_dir: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            algorithm,
            dataset,
            k,
            p,
            paa,
            l,
            epsilon,
            max_level,
            params,
            seed,
            out,
        } => {
            let run_params = match params {
                Some(path) => {
                    let text = std::fs::read_to_string(&path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    serde_json::from_str(&text)
                        .with_context(|| format!("parsing {}", path.display()))?
                }
                None => AnonymityParams {
                    k,
                    p,
                    paa,
                    l,
                    epsilon,
                    max_level,
                },
            };
            cmd_run(algorithm, &dataset, &run_params, seed, out)
        }
        Commands::Sweep {
            dataset,
            k_values,
            p_values,
            paa,
            l,
            max_level,
            seed,
            out_dir,
        } => cmd_sweep(&dataset, &k_values, &p_values, paa, l, max_level, seed, &out_dir),
    }
}

fn cmd_run(
    algorithm: Algorithm,
    dataset_path: &Path,
    params: &AnonymityParams,
    seed: Option<u64>,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let dataset = load_dataset(dataset_path)?;
    let mut rng = rng_for(seed);

    let start = Instant::now();
    let result = run(algorithm, &dataset, params, &mut rng)?;
    let elapsed = start.elapsed().as_secs_f64();

    let out_path = out.unwrap_or_else(|| output_path_for(dataset_path));
    write_anonymized(&out_path, &dataset.columns, &result)?;

    let (pattern_total, pattern_mean) = global_pattern_loss(&dataset, &result);
    let (value_total, value_mean) = global_value_loss(&result);

    println!("Elapsed time in seconds: {elapsed}");
    println!("Surviving records: {}", result.surviving_records());
    if !result.suppressed.is_empty() {
        let suppressed: usize = result.suppressed.iter().map(|g| g.len()).sum();
        println!("Suppressed records: {suppressed}");
    }
    if result.unresolved_classes > 0 {
        println!(
            "Unresolved l-diversity classes: {}",
            result.unresolved_classes
        );
    }
    println!("Global pattern loss: {pattern_total} (mean {pattern_mean})");
    println!("Global value loss: {value_total} (mean {value_mean})");

    let results_dir = Path::new("results");
    create_dir_all(results_dir)?;
    let stem = dataset_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("dataset");
    let summary = results_dir.join(format!(
        "{stem}_{algorithm}_k{}_p{}_paa{}_l{}.csv",
        params.k, params.p, params.paa, params.l
    ));
    let mut file = File::create(&summary)?;
    writeln!(
        file,
        "ElapsedTime\tGlobalPatternLoss\tAveragePatternLoss\tGlobalValueLoss\tMeanValueLoss"
    )?;
    writeln!(
        file,
        "{elapsed}\t{pattern_total}\t{pattern_mean}\t{value_total}\t{value_mean}"
    )?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_sweep(
    dataset_path: &Path,
    k_values: &[usize],
    p_values: &[usize],
    paa: usize,
    l: usize,
    max_level: usize,
    seed: Option<u64>,
    out_dir: &Path,
) -> anyhow::Result<()> {
    let dataset = load_dataset(dataset_path)?;

    let mut combos: Vec<(Algorithm, usize, usize)> = Vec::new();
    for algorithm in [Algorithm::Naive, Algorithm::Kapra] {
        for &k in k_values {
            for &p in p_values {
                if k >= p {
                    combos.push((algorithm, k, p));
                }
            }
        }
    }
    if combos.is_empty() {
        bail!("no valid (k, P) combination: every k is below every P");
    }

    // Independent parameter combinations are the only parallelism: each
    // worker gets its own copy of the table and its own random source.
    let rows: Vec<String> = combos
        .par_iter()
        .enumerate()
        .map(|(index, &(algorithm, k, p))| {
            let params = AnonymityParams {
                k,
                p,
                paa,
                l,
                epsilon: 1,
                max_level,
            };
            let local: Dataset = dataset.clone();
            let mut rng = rng_for(seed.map(|s| s + index as u64));
            let start = Instant::now();
            match run(algorithm, &local, &params, &mut rng) {
                Ok(result) => {
                    let elapsed = start.elapsed().as_secs_f64();
                    let (pattern_total, pattern_mean) = global_pattern_loss(&local, &result);
                    let (value_total, value_mean) = global_value_loss(&result);
                    format!(
                        "{algorithm},{k},{p},{elapsed},{pattern_total},{pattern_mean},{value_total},{value_mean}"
                    )
                }
                Err(err) => format!("{algorithm},{k},{p},failed: {err},,,"),
            }
        })
        .collect();

    create_dir_all(out_dir)?;
    let stem = dataset_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("dataset");
    let summary = out_dir.join(format!("{stem}_sweep.csv"));
    let mut file = File::create(&summary)?;
    writeln!(
        file,
        "algorithm,k,p,elapsed_s,global_pattern_loss,mean_pattern_loss,global_value_loss,mean_value_loss"
    )?;
    for row in rows {
        writeln!(file, "{row}")?;
    }
    println!("Sweep summary written to {}", summary.display());
    Ok(())
}

fn rng_for(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}
