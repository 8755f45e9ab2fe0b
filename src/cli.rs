use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "warden")]
#[command(version = "0.1.0")]
#[command(about = "Self-healing service supervisor", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config directory path
    #[arg(short, long, default_value = "config")]
    pub config: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the supervision loop
    Run,
    /// Load and validate the configuration, then exit
    CheckConfig,
    /// Probe one configured service once and print the result
    Check {
        /// Service name as configured
        service: String,
    },
}
