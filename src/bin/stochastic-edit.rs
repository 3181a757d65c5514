//! Trainer/scorer CLI for stochastic string-edit models.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;

use stochastic_edit::prelude::*;

#[derive(Parser)]
#[command(name = "stochastic-edit")]
#[command(about = "Train and score stochastic string-edit models for name matching")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a model on an alias corpus
    Train {
        /// Training data: one entity per line, tab-separated names,
        /// canonical name first
        #[arg(short, long)]
        train: PathBuf,

        /// Development data for early stopping
        #[arg(short, long)]
        dev: Option<PathBuf>,

        /// Aligned phonetic dictionary
        #[arg(short = 'a', long)]
        dict: Option<PathBuf>,

        /// Model type
        #[arg(short, long, default_value = "backoff")]
        model: String,

        /// Use the untrained always-edit baseline parameterization
        #[arg(long)]
        baseline: bool,

        /// Flip inputs and outputs when creating pairs
        #[arg(short, long)]
        flip: bool,

        /// Use every alias of each entity (instead of one at random)
        #[arg(short = 'e', long)]
        all_aliases: bool,

        /// Random seed for alias selection
        #[arg(long, default_value = "1")]
        seed: u64,

        /// Where to save the trained model snapshot
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Snapshot format
        #[arg(short = 'F', long, value_enum, default_value = "bincode")]
        format: SnapshotFormat,
    },

    /// Score a string pair under a saved model
    Score {
        /// Saved model snapshot
        #[arg(short, long)]
        input: PathBuf,

        /// Snapshot format
        #[arg(short = 'F', long, value_enum, default_value = "bincode")]
        format: SnapshotFormat,

        /// Canonical string; omit to score the surface string with no
        /// conditioning input
        #[arg(short, long)]
        canonical: Option<String>,

        /// Surface string to score
        #[arg(short, long)]
        surface: String,
    },

    /// Dump clean name tokens (for building a phonetic dictionary)
    Dump {
        /// Alias corpus to read names from
        #[arg(short, long)]
        train: PathBuf,

        /// Where to write the token list
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SnapshotFormat {
    /// Compact binary
    Bincode,
    /// Human-readable JSON
    Json,
}

fn write_snapshot(
    snapshot: &ModelSnapshot,
    path: &PathBuf,
    format: SnapshotFormat,
) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let writer = BufWriter::new(file);
    match format {
        SnapshotFormat::Bincode => BincodeSerializer::serialize(snapshot, writer)?,
        SnapshotFormat::Json => JsonSerializer::serialize(snapshot, writer)?,
    }
    Ok(())
}

fn read_snapshot(path: &PathBuf, format: SnapshotFormat) -> Result<ModelSnapshot> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let snapshot = match format {
        SnapshotFormat::Bincode => BincodeSerializer::deserialize(file)?,
        SnapshotFormat::Json => JsonSerializer::deserialize(file)?,
    };
    Ok(snapshot)
}

#[allow(clippy::too_many_arguments)]
fn run_train(
    train: PathBuf,
    dev: Option<PathBuf>,
    dict: Option<PathBuf>,
    model_type: String,
    baseline: bool,
    flip: bool,
    all_aliases: bool,
    seed: u64,
    output: Option<PathBuf>,
    format: SnapshotFormat,
) -> Result<()> {
    if model_type != "backoff" {
        return Err(ModelError::UnknownModelType(model_type).into());
    }

    let mut arpabet = ArpabetDictionary::new();
    if let Some(path) = dict {
        arpabet.load(&path)?;
        eprintln!(
            "loaded phonetic dictionary: {} words, {} phones",
            arpabet.num_words(),
            arpabet.num_phones()
        );
    }

    let mut alphabet = CharacterAlphabet::new();
    let mut rng = StdRng::seed_from_u64(seed);

    let corpus = AliasCorpus::load(&train)?;
    let train_pairs =
        corpus.training_pairs(&mut alphabet, &arpabet, flip, all_aliases, &mut rng)?;
    let dev_pairs = match dev {
        Some(path) => Some(AliasCorpus::load(&path)?.training_pairs(
            &mut alphabet,
            &arpabet,
            flip,
            all_aliases,
            &mut rng,
        )?),
        None => None,
    };
    alphabet.freeze();
    if train_pairs.is_empty() {
        anyhow::bail!("no training pairs survived corpus filtering");
    }
    eprintln!(
        "{} training pairs, alphabet size {}",
        train_pairs.len(),
        alphabet.len()
    );

    let mut model = if baseline {
        BackoffEditModel::baseline(alphabet.len(), alphabet.len())
    } else {
        BackoffEditModel::for_alphabet(&alphabet)
    };
    match &dev_pairs {
        Some(dev_pairs) => model.train_with_dev(&train_pairs, dev_pairs),
        None => model.train(&train_pairs),
    }
    eprintln!(
        "final log-likelihood: {:.4}",
        model.calc_log_likelihood(&train_pairs)
    );

    if let Some(path) = output {
        write_snapshot(&ModelSnapshot::new(&alphabet, model), &path, format)?;
        eprintln!("model saved to {}", path.display());
    }
    Ok(())
}

fn run_score(
    input: PathBuf,
    format: SnapshotFormat,
    canonical: Option<String>,
    surface: String,
) -> Result<()> {
    let (mut alphabet, model) = read_snapshot(&input, format)?.restore();

    let canonical = canonical
        .map(|s| AlignedString::new(&s, &mut alphabet))
        .transpose()?;
    let surface = AlignedString::new(&surface, &mut alphabet)?;

    let lp = model.logp(canonical.as_ref(), &surface);
    println!("{:.6}", lp);
    Ok(())
}

fn run_dump(train: PathBuf, output: PathBuf) -> Result<()> {
    let corpus = AliasCorpus::load(&train)?;
    let tokens = corpus.dump_tokens();
    let file =
        File::create(&output).with_context(|| format!("creating {}", output.display()))?;
    let mut writer = BufWriter::new(file);
    for token in &tokens {
        writeln!(writer, "{}", token)?;
    }
    eprintln!("wrote {} tokens to {}", tokens.len(), output.display());
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Train {
            train,
            dev,
            dict,
            model,
            baseline,
            flip,
            all_aliases,
            seed,
            output,
            format,
        } => run_train(
            train, dev, dict, model, baseline, flip, all_aliases, seed, output, format,
        ),
        Commands::Score {
            input,
            format,
            canonical,
            surface,
        } => run_score(input, format, canonical, surface),
        Commands::Dump { train, output } => run_dump(train, output),
    }
}
