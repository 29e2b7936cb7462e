//! gpt2-predict: run one forward pass over a token sequence and report the
//! argmax next-token id.
//!
//! Weights are randomly initialized from a fixed seed; the tool exists to
//! exercise and time the forward-compute engine, not to produce meaningful
//! text.

use std::path::PathBuf;
use std::process;
use std::time::Instant;

use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use gpt2_inference::cli;
use gpt2_inference::{Gpt2Model, ModelConfig, ModelWeights};

#[derive(Parser)]
#[command(
    name = "gpt2-predict",
    about = "Run one transformer forward pass with random weights"
)]
struct Args {
    /// Pre-tokenized input: comma-separated token IDs
    #[arg(long, conflicts_with = "seq_len")]
    tokens: Option<String>,

    /// Length of the random token sequence to generate
    #[arg(short = 'n', long, default_value = "16")]
    seq_len: usize,

    /// Seed for weight initialization and random tokens
    #[arg(short = 's', long, default_value = "42")]
    seed: u64,

    /// JSON file overriding the GPT-2 base configuration
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Suppress all logging
    #[arg(long)]
    log_disable: bool,
}

fn main() {
    let args = Args::parse();
    cli::init_logging(args.log_disable);

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            serde_json::from_str::<ModelConfig>(&text)?
        }
        None => ModelConfig::gpt2_base(),
    };

    let init_start = Instant::now();
    let weights = ModelWeights::random(&config, args.seed);
    let model = Gpt2Model::new(config, weights)?;
    info!(
        elapsed_ms = init_start.elapsed().as_millis() as u64,
        "Weight initialization complete"
    );

    let tokens = match &args.tokens {
        Some(ids_str) => ids_str
            .split(',')
            .map(|s| s.trim().parse::<u32>())
            .collect::<Result<Vec<u32>, _>>()?,
        None => {
            let mut rng = StdRng::seed_from_u64(args.seed);
            let upper = model.config().vocab_size.min(10_000) as u32;
            (0..args.seq_len).map(|_| rng.gen_range(0..upper)).collect()
        }
    };
    info!(seq_len = tokens.len(), "Running forward pass");

    let start = Instant::now();
    let logits = model.forward(&tokens)?;
    let elapsed = start.elapsed();

    let (best_token, _) = logits
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .expect("logits are never empty");

    println!("Predicted next token ID: {}", best_token);
    println!("Prediction completed in {:.4} seconds.", elapsed.as_secs_f64());

    Ok(())
}
