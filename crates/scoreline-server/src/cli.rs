use clap::Parser;
use scoreline_model::MODEL_DIR_ENV;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "scoreline-server")]
#[command(author, version, about = "Scoreline classifier scoring server", long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "scoreline.yaml")]
    pub config: String,

    /// Base directory holding the model artifacts
    #[arg(short, long, env = MODEL_DIR_ENV)]
    pub model_dir: Option<PathBuf>,

    /// Listen address
    #[arg(short = 'l', long, default_value = "0.0.0.0")]
    pub listen: String,

    /// Listen port
    #[arg(short = 'P', long, default_value = "5001")]
    pub port: u16,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
