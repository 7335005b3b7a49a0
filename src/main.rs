use std::{error::Error, path::PathBuf, time::Instant};

use clap::{Parser, Subcommand};
use csv::Writer;
use log::info;

use dataset_preprocess::{
    csv_iterator::{write_batch, CsvDataSetIterator},
    persist::{load_normalizer, save_normalizer},
    DistributionStats, NormalizerConfig, NormalizerStandardize, StandardizeStrategy,
};

#[derive(Parser)]
#[command(name = "dataset_preprocess")]
#[command(about = "Standardize numeric CSV datasets with per-feature z-scores")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit mean/std statistics over a CSV file, streaming it in batches
    Fit {
        /// Input CSV file with a header row
        #[arg(default_value = "data/train.csv")]
        input: PathBuf,

        /// Number of trailing label columns
        #[arg(short, long, default_value = "0")]
        labels: usize,

        /// Rows per batch
        #[arg(short, long, default_value = "1024")]
        batch_size: usize,

        /// Also standardize the label columns
        #[arg(long)]
        fit_labels: bool,

        /// Where to write the fitted normalizer
        #[arg(short, long, default_value = "normalizer.pkl")]
        output: PathBuf,
    },

    /// Standardize a CSV file with a fitted normalizer
    Transform {
        input: PathBuf,

        #[arg(short, long, default_value = "normalizer.pkl")]
        stats: PathBuf,

        #[arg(short, long, default_value = "0")]
        labels: usize,

        #[arg(short, long, default_value = "1024")]
        batch_size: usize,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Undo the standardization of a CSV file
    Revert {
        input: PathBuf,

        #[arg(short, long, default_value = "normalizer.pkl")]
        stats: PathBuf,

        #[arg(short, long, default_value = "0")]
        labels: usize,

        #[arg(short, long, default_value = "1024")]
        batch_size: usize,

        #[arg(short, long)]
        output: PathBuf,
    },
}

fn print_stats(title: &str, names: &[String], stats: &DistributionStats<f64>) {
    println!("{title}");
    for (i, (mean, std)) in stats.mean().iter().zip(stats.std().iter()).enumerate() {
        let name = names.get(i).cloned().unwrap_or_else(|| format!("#{i}"));
        println!("  {name:>16}  mean {mean:>14.6}  std {std:>14.6}");
    }
}

fn fit(
    input: PathBuf,
    labels: usize,
    batch_size: usize,
    fit_labels: bool,
    output: PathBuf,
) -> Result<(), Box<dyn Error>> {
    let mut iterator = CsvDataSetIterator::<f64>::new(&input, batch_size, labels)?;
    let headers = iterator.headers()?.unwrap_or_default();
    let split = headers.len().saturating_sub(labels);

    let config = NormalizerConfig::default().with_fit_labels(fit_labels);
    let mut normalizer = NormalizerStandardize::with_config(StandardizeStrategy, config);
    normalizer.fit_iter(&mut iterator)?;

    print_stats("features:", &headers[..split], normalizer.feature_stats()?);
    if fit_labels {
        print_stats("labels:", &headers[split..], normalizer.label_stats()?);
    }
    save_normalizer(&output, &normalizer)?;
    Ok(())
}

fn apply(
    input: PathBuf,
    stats: PathBuf,
    labels: usize,
    batch_size: usize,
    output: PathBuf,
    inverse: bool,
) -> Result<(), Box<dyn Error>> {
    let normalizer: NormalizerStandardize<f64> = load_normalizer(&stats, StandardizeStrategy)?;
    let mut iterator = CsvDataSetIterator::<f64>::new(&input, batch_size, labels)?;
    let mut writer = Writer::from_path(&output)?;
    if let Some(headers) = iterator.headers()? {
        writer.write_record(&headers)?;
    }

    let mut rows = 0;
    for batch in iterator {
        let mut batch = batch?;
        if inverse {
            normalizer.revert(&mut batch)?;
        } else {
            normalizer.pre_process(&mut batch)?;
        }
        write_batch(&mut writer, &batch)?;
        rows += batch.num_examples();
    }
    writer.flush()?;
    info!("Wrote {rows} rows to {}", output.display());
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let now = Instant::now();
    match cli.command {
        Commands::Fit {
            input,
            labels,
            batch_size,
            fit_labels,
            output,
        } => fit(input, labels, batch_size, fit_labels, output)?,
        Commands::Transform {
            input,
            stats,
            labels,
            batch_size,
            output,
        } => apply(input, stats, labels, batch_size, output, false)?,
        Commands::Revert {
            input,
            stats,
            labels,
            batch_size,
            output,
        } => apply(input, stats, labels, batch_size, output, true)?,
    }

    let elapsed = now.elapsed();
    println!("Elapsed: {:.2?}", elapsed);
    Ok(())
}
