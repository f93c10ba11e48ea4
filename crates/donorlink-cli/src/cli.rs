//! Command-line interface definition using clap.

use clap::{Parser, Subcommand};

/// DonorLink - WhatsApp integration tools
#[derive(Parser, Debug)]
#[command(name = "donorlink")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check the WhatsApp credential store and related settings
    Diagnose {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show how phone numbers will be addressed
    Normalize {
        /// Phone numbers as entered by staff
        #[arg(required = true)]
        numbers: Vec<String>,
    },

    /// Render a pairing payload as a terminal QR code
    Qr {
        /// Raw QR payload reported by WhatsApp Web
        #[arg(required = true)]
        payload: String,
    },
}
