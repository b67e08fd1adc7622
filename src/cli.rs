pub use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "tabgpt", about = "Ask questions about a CSV dataset in plain language", version)]
pub struct Cli {
    /// Path to the CSV file to analyze.
    #[arg(value_name = "CSV_FILE")]
    pub csv_path: String,

    /// The question to answer about the dataset.
    #[arg(value_name = "QUESTION")]
    pub question: String,

    /// Large language model to use.
    #[arg(long)]
    pub model: Option<String>,

    /// Randomness of generated output.
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Directory where generated charts are written.
    #[arg(long = "output-dir")]
    pub output_dir: Option<String>,

    /// Wall-clock limit for one analysis, in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Print the result as JSON instead of formatted text.
    #[arg(long)]
    pub json: bool,
}
