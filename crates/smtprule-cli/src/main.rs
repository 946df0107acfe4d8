//! smtprule - check a rule set and run envelopes through it

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use smtprule_common::config::LoggingConfig;
use smtprule_common::{Config, Envelope, MailAddress, Origin};
use smtprule_core::{MatchOutcome, Record, Ruleset, TableRegistry};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Exit status when no record matched
const EXIT_NO_MATCH: u8 = 1;
/// Exit status for a temporary failure (EX_TEMPFAIL)
const EXIT_TEMPFAIL: u8 = 75;

#[derive(Debug, Parser)]
#[command(name = "smtprule", version, about = "SMTP rule set checker")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load the configuration and print the compiled rule set
    Check,
    /// Run one envelope through the rule set
    Match(MatchArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Engine {
    /// Fixed-predicate rules
    Rules,
    /// Predicate-chain match entries
    Matches,
}

#[derive(Debug, Args)]
struct MatchArgs {
    /// Which rule list to run
    #[arg(long, value_enum, default_value_t = Engine::Rules)]
    engine: Engine,

    /// MAIL FROM address, empty for the null sender
    #[arg(long, default_value = "")]
    sender: String,

    /// RCPT TO address
    #[arg(long)]
    rcpt: String,

    /// Client IP address, or "local" for the local socket
    #[arg(long, default_value = "local")]
    source: String,

    /// Listener tag
    #[arg(long, default_value = "")]
    tag: String,

    /// HELO/EHLO name
    #[arg(long, default_value = "")]
    helo: String,

    /// Session is authenticated
    #[arg(long)]
    authenticated: bool,

    /// Message was injected locally
    #[arg(long)]
    internal: bool,

    /// Whether STARTTLS was negotiated; left unknown when omitted
    #[arg(long)]
    tls: Option<bool>,

    /// Authenticated username
    #[arg(long, value_name = "NAME")]
    user: Option<String>,

    /// Print the outcome as JSON
    #[arg(long)]
    json: bool,
}

impl MatchArgs {
    fn envelope(&self) -> Result<Envelope> {
        let mut envelope = Envelope::new(
            MailAddress::parse(&self.sender),
            MailAddress::parse(&self.rcpt),
            parse_origin(&self.source)?,
        )
        .with_tag(self.tag.as_str())
        .with_helo(self.helo.as_str());

        if self.authenticated || self.user.is_some() {
            envelope = envelope.authenticated(self.user.clone());
        }
        if self.internal {
            envelope = envelope.internal();
        }
        if let Some(tls) = self.tls {
            envelope = envelope.with_tls(tls);
        }

        Ok(envelope)
    }
}

fn parse_origin(source: &str) -> Result<Origin> {
    if source.eq_ignore_ascii_case("local") {
        return Ok(Origin::Local);
    }

    let addr = source
        .strip_prefix("IPv6:")
        .unwrap_or(source)
        .parse::<std::net::IpAddr>()
        .with_context(|| format!("invalid source address: {}", source))?;
    Ok(Origin::Inet(addr))
}

/// Outcome as printed by `smtprule match`
#[derive(Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
enum Report {
    Selected {
        /// 1-based, as in log output
        rule: usize,
        action: String,
        record: String,
    },
    NoMatch,
    Indeterminate {
        reason: String,
    },
}

impl Report {
    fn from_outcome<R: Record>(outcome: MatchOutcome<'_, R>) -> Self {
        match outcome {
            MatchOutcome::Selected(selection) => Report::Selected {
                rule: selection.index + 1,
                action: selection.record.action().to_string(),
                record: selection.record.to_string(),
            },
            MatchOutcome::NoMatch => Report::NoMatch,
            MatchOutcome::Indeterminate(cause) => Report::Indeterminate {
                reason: cause.to_string(),
            },
        }
    }

    fn status(&self) -> u8 {
        match self {
            Report::Selected { .. } => 0,
            Report::NoMatch => EXIT_NO_MATCH,
            Report::Indeterminate { .. } => EXIT_TEMPFAIL,
        }
    }

    fn to_text(&self) -> String {
        match self {
            Report::Selected { rule, action, record } => {
                format!("rule #{} matched, action \"{}\": {}", rule, action, record)
            }
            Report::NoMatch => "no rule matched".to_string(),
            Report::Indeterminate { reason } => {
                format!("temporary failure: {}", reason)
            }
        }
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };

    init_logging(&config.logging);

    let tables = TableRegistry::from_config(&config.tables)?;
    let ruleset = Ruleset::from_config(&config, &tables)?;

    match cli.command {
        Command::Check => {
            info!(tables = tables.len(), "configuration is valid");
            println!("{}", describe(&ruleset));
            Ok(ExitCode::SUCCESS)
        }
        Command::Match(args) => {
            let envelope = args.envelope()?;
            let report = match args.engine {
                Engine::Rules => Report::from_outcome(ruleset.match_rule(&envelope)),
                Engine::Matches => Report::from_outcome(ruleset.match_entry(&envelope)),
            };

            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report.to_text());
            }
            Ok(ExitCode::from(report.status()))
        }
    }
}

fn describe(ruleset: &Ruleset) -> String {
    let mut out = Vec::new();
    out.push(format!("{} rule(s)", ruleset.rules().len()));
    for (i, rule) in ruleset.rules().iter().enumerate() {
        out.push(format!("  #{} {}", i + 1, rule));
    }
    out.push(format!("{} match entries", ruleset.matches().len()));
    for (i, entry) in ruleset.matches().iter().enumerate() {
        out.push(format!("  #{} {}", i + 1, entry));
    }
    out.join("\n")
}

/// Initialize logging
///
/// Output goes to stderr so that stdout carries only the report.
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
