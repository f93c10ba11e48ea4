//! DonorLink command-line tool.
//!
//! ```bash
//! cargo run -p donorlink-cli -- diagnose
//! cargo run -p donorlink-cli -- normalize "+91 98765-43210"
//! ```

mod cli;

use clap::Parser;
use donorlink_core::DiagnosticsReport;
use donorlink_whatsapp::{QrEncoder, SvgQrEncoder, WhatsAppConfig};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let loaded = donorlink_core::load_env_files();

    let filter = match cli.verbose {
        0 => "donorlink=warn,donorlink_core=warn,donorlink_whatsapp=warn",
        1 => "donorlink=info,donorlink_core=info,donorlink_whatsapp=info",
        2 => "donorlink=debug,donorlink_core=debug,donorlink_whatsapp=debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    for path in &loaded {
        tracing::info!(path = %path.display(), "Loaded env file");
    }

    match cli.command {
        Commands::Diagnose { json } => {
            let report = donorlink_core::collect_diagnostics();
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
        Commands::Normalize { numbers } => {
            let config = WhatsAppConfig::from_env()?;
            config.validate()?;
            let policy = &config.address_policy;
            for raw in &numbers {
                match policy.chat_id_for(raw) {
                    Some(chat) => println!("{raw} -> {chat}"),
                    None => println!("{raw} -> invalid ({})", policy.normalize(raw)),
                }
            }
        }
        Commands::Qr { payload } => {
            let text = SvgQrEncoder::default().render_text(&payload)?;
            println!("{text}");
        }
    }

    Ok(())
}

fn print_report(report: &DiagnosticsReport) {
    let dir = &report.credential_dir;
    println!("DonorLink {} diagnostics ({})", report.version, report.time);
    println!();
    println!("Credential store");
    println!("   Configured: {}", dir.configured.display());
    println!("   Resolved:   {}", dir.resolved.display());
    println!("   Exists:     {}", yes_no(dir.exists));
    if let Some(is_directory) = dir.is_directory {
        println!("   Directory:  {}", yes_no(is_directory));
    }
    if let Some(writable) = dir.writable {
        println!("   Writable:   {}", yes_no(writable));
    }
    if let Some(e) = dir.write_error.as_deref().or(dir.fs_error.as_deref()) {
        println!("   Error:      {e}");
    }

    println!();
    println!("Environment");
    for (key, value) in &report.env {
        println!("   {key}={}", value.as_deref().unwrap_or("(unset)"));
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
