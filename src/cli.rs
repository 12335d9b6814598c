use clap::{Parser, Subcommand};

/// travel-core — email intake, MRZ extraction, and pricing for travel insurance
#[derive(Parser)]
#[command(name = "travel-core", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to bind
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Inspect or validate the tariff/rules knowledge base
    Tariff {
        #[command(subcommand)]
        command: TariffCommands,
    },

    /// Inspect a persisted case
    Case {
        #[command(subcommand)]
        command: CaseCommands,
    },
}

#[derive(Subcommand)]
pub enum TariffCommands {
    /// Load the tariff CSV and rules YAML and report any errors
    Validate {
        #[arg(long)]
        csv: Option<String>,
        #[arg(long)]
        yaml: Option<String>,
    },

    /// Re-price spec.md's golden scenarios against a candidate tariff/rules
    /// file, without touching the running server's in-memory snapshot
    Reload {
        #[arg(long)]
        csv: Option<String>,
        #[arg(long)]
        yaml: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum CaseCommands {
    /// Print a case and its travellers
    Show {
        case_id: String,
    },
}
