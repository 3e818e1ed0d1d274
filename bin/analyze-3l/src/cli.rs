use std::path::PathBuf;

use clap::Parser;

/// Fills the 3ℓ event-level histograms from a stream of selected events.
#[derive(Clone, Debug, Parser)]
#[command(about)]
pub struct Cli {
    /// Path to the YAML configuration file.
    ///
    /// Must provide `era`, `process` and `category`, and may provide `central_or_shift`. Any of these can be
    /// overridden with an `ANALYZE_`-prefixed environment variable, such as `ANALYZE_ERA`.
    #[arg(short, long)]
    pub config: PathBuf,

    /// Path to the selected events, one JSON object per line.
    #[arg(short, long)]
    pub input: PathBuf,

    /// Path to write the histogram file to.
    #[arg(short, long)]
    pub output: PathBuf,

    /// Directory, inside the histogram file, to book histograms below.
    #[arg(long, default_value = "")]
    pub directory: String,
}
