use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "booking-revenue")]
#[command(about = "Booking calendar revenue reports and forecasts", long_about = None)]
pub struct Cli {
    /// Config file (default: ./BookingRevenue.toml if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Merge captured calendar responses into the store, then rebuild the report
    Import {
        /// JSON dumps of calendar API responses
        #[arg(required = true)]
        captures: Vec<PathBuf>,

        /// Only update the store
        #[arg(long)]
        no_report: bool,
    },
    /// Rebuild every report table from the store
    Report,
    /// Show the category a service name is classified into
    Classify {
        name: String,
    },
    /// List recorded import runs (sqlite backend)
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}
