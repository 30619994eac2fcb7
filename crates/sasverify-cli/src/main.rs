use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

use sasverify_cli::commands::{self, PartyArgs};
use sasverify_core::config::load_config;
use sasverify_core::tracing_init::{default_filter, init_tracing};
use sasverify_core::{Config, DisplayMethod};

/// Short authentication string key verification.
#[derive(Debug, Parser)]
#[command(name = "sasverify", version, about)]
struct Cli {
    /// Configuration file (overrides the global settings file)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MethodArg {
    Emoji,
    Decimal,
}

impl From<MethodArg> for DisplayMethod {
    fn from(method: MethodArg) -> Self {
        match method {
            MethodArg::Emoji => Self::Emoji,
            MethodArg::Decimal => Self::Decimal,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the public key for the given randomness
    Pubkey {
        /// 32 bytes of creation randomness, hex-encoded
        #[arg(long, env = "SASVERIFY_RANDOM", hide_env_values = true)]
        random: String,
    },
    /// Print the short authentication string
    Sas {
        #[command(flatten)]
        party: PartyArgs,
        /// Info label (defaults to one built from both public keys)
        #[arg(long)]
        info: Option<String>,
        #[arg(long, value_enum)]
        method: Option<MethodArg>,
    },
    /// Print a MAC over the input
    Mac {
        #[command(flatten)]
        party: PartyArgs,
        #[arg(long)]
        info: Option<String>,
        #[arg(long)]
        input: String,
    },
    /// Check a MAC received from the peer
    VerifyMac {
        #[command(flatten)]
        party: PartyArgs,
        #[arg(long)]
        info: Option<String>,
        #[arg(long)]
        input: String,
        /// Hex-encoded tag
        #[arg(long)]
        tag: String,
    },
    /// Run a full verification between two in-process parties
    Demo {
        #[arg(long, value_enum)]
        method: Option<MethodArg>,
    },
}

fn with_method(mut config: Config, method: Option<MethodArg>) -> Config {
    if let Some(method) = method {
        config.display.method = method.into();
    }
    config
}

#[allow(clippy::print_stdout, clippy::print_stderr)]
fn run(cli: Cli, config: Config) -> Result<ExitCode> {
    match cli.command {
        Commands::Pubkey { random } => println!("{}", commands::pubkey(&random)?),
        Commands::Sas {
            party,
            info,
            method,
        } => {
            let config = with_method(config, method);
            println!("{}", commands::sas(&party, info.as_deref(), &config)?);
        }
        Commands::Mac { party, info, input } => {
            println!("{}", commands::mac(&party, info.as_deref(), &input, &config)?);
        }
        Commands::VerifyMac {
            party,
            info,
            input,
            tag,
        } => {
            if let Err(e) = commands::verify_mac(&party, info.as_deref(), &input, &tag, &config) {
                eprintln!("{e:#}");
                return Ok(ExitCode::FAILURE);
            }
            println!("MAC OK");
        }
        Commands::Demo { method } => {
            let config = with_method(config, method);
            println!("{}", commands::demo(&config)?);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    let filter = default_filter("sasverify_cli", &config.logging.level);
    init_tracing(&filter, cli.log_json || config.logging.json);

    run(cli, config)
}
