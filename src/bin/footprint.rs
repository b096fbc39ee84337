//! footprint: carbon assistant CLI
//!
//! Talks to the generation service through the same gateway the backend
//! uses, so cache, spacing and retry behaviour can be observed from a
//! terminal (`RUST_LOG=footprint=debug`).

use std::collections::BTreeMap;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use footprint::{
    BillExtraction, CarbonAssistant, ChatReply, Config, GatewayBuilder, HistoryLimits, Secrets,
};

/// Footprint CLI
#[derive(Parser)]
#[command(name = "footprint")]
#[command(version = footprint::PKG_VERSION)]
#[command(about = "Carbon footprint assistant")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Caller id used in cache keys.
    #[arg(short, long, env = "FOOTPRINT_USER", default_value = "cli")]
    user: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ask the assistant a question
    Chat {
        /// Message (or omit to read from stdin)
        message: Option<String>,
    },

    /// Suggestions for a weekly total
    Suggest {
        /// Weekly emissions in kg CO2
        total: f64,
        /// Category breakdown as `Category=kg` pairs
        #[arg(short, long, value_parser = parse_breakdown_entry)]
        breakdown: Vec<(String, f64)>,
    },

    /// Read consumption units off an electricity bill photo
    Bill {
        /// Image file
        image: PathBuf,
        /// MIME type of the image
        #[arg(short, long, default_value = "image/jpeg")]
        mime: String,
    },

    /// List reward tiers
    Tiers,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();

    match args.command {
        Command::Chat { message } => {
            let message = resolve_text(message, "chat")?;
            let assistant = build_assistant(args.config.as_deref())?;
            match assistant.reply(&args.user, &message, &[]).await {
                ChatReply::Text(text) => println!("{text}"),
                ChatReply::QuotaExceeded => {
                    return Err("AI service temporarily unavailable (quota exceeded)".into());
                }
                ChatReply::Failed(e) => return Err(e.into()),
            }
        }

        Command::Suggest { total, breakdown } => {
            let breakdown: BTreeMap<String, f64> = breakdown.into_iter().collect();
            let assistant = build_assistant(args.config.as_deref())?;
            for (i, s) in assistant
                .suggestions(&args.user, total, &breakdown)
                .await
                .iter()
                .enumerate()
            {
                println!("{}. {s}", i + 1);
            }
        }

        Command::Bill { image, mime } => {
            let bytes = std::fs::read(&image)?;
            let assistant = build_assistant(args.config.as_deref())?;
            match assistant.extract_bill_units(&bytes, &mime).await {
                BillExtraction::Units(units) => println!("{units} units"),
                BillExtraction::Failed(message) => return Err(message.into()),
            }
        }

        Command::Tiers => {
            for tier in footprint::rewards::REWARD_TIERS {
                println!(
                    "{:<14} <= {:>5} kg  {:>3} pts  {}",
                    tier.name, tier.max_emissions, tier.points, tier.badge
                );
            }
        }
    }

    Ok(())
}

/// Build the assistant from configuration, preferring a key from the secrets file.
fn build_assistant(config_path: Option<&Path>) -> footprint::Result<CarbonAssistant> {
    let config = Config::load_or_default(config_path)?;
    let secrets = Secrets::load()?;
    let gateway = GatewayBuilder::from_config(&config)
        .api_key_source(secrets.api_key_source(&config.gemini.api_key_env))
        .build()?;
    Ok(CarbonAssistant::new(Arc::new(gateway))
        .with_history_limits(HistoryLimits::from(&config.history)))
}

/// Resolve text input from an optional CLI argument and/or stdin.
///
/// - arg only → arg
/// - stdin only → stdin
/// - both → `"{arg}\n\n{stdin}"`
/// - neither → error
fn resolve_text(arg: Option<String>, command: &str) -> Result<String, Box<dyn std::error::Error>> {
    let stdin_text = if io::stdin().is_terminal() {
        None
    } else {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        Some(buf.trim().to_string()).filter(|s| !s.is_empty())
    };

    match (arg, stdin_text) {
        (Some(a), Some(s)) => Ok(format!("{a}\n\n{s}")),
        (Some(a), None) => Ok(a),
        (None, Some(s)) => Ok(s),
        (None, None) => {
            Err(format!("{command}: no input provided (pass text as argument or via stdin)").into())
        }
    }
}

fn parse_breakdown_entry(s: &str) -> Result<(String, f64), String> {
    let (category, kg) = s
        .split_once('=')
        .ok_or_else(|| format!("expected Category=kg, got {s:?}"))?;
    let kg = kg
        .parse()
        .map_err(|e| format!("invalid amount in {s:?}: {e}"))?;
    Ok((category.to_string(), kg))
}
