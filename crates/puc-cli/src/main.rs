//! puc - Pull-Up Club earnings ledger
//!
//! Operator interface for weekly pools, approval earnings and monthly payouts.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use puc_core::{MonthKey, SubmissionId, UserId};
use std::path::PathBuf;

mod commands;

/// Pull-Up Club earnings ledger.
///
/// Approved submissions earn a flat credit from the week's pool; earnings roll up into
/// one payout request per user per month.
#[derive(Parser)]
#[command(name = "puc")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path (JSON)
    #[arg(short, long, global = true, env = "PUC_CONFIG")]
    config: Option<PathBuf>,

    /// Ledger file path
    #[arg(short, long, global = true, env = "PUC_LEDGER_PATH", default_value = "puc-ledger.json")]
    ledger: PathBuf,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty ledger file
    Init,

    /// Manage user profiles
    User {
        #[command(subcommand)]
        action: UserCommands,
    },

    /// Manage weekly pools
    Pool {
        #[command(subcommand)]
        action: PoolCommands,
    },

    /// Record earnings for approved submissions
    Approve {
        /// Submission id
        #[arg(long, required_unless_present = "feed")]
        submission: Option<SubmissionId>,

        /// Submitting user
        #[arg(long)]
        user: Option<UserId>,

        /// Verified pull-up count
        #[arg(long)]
        verified_count: Option<u32>,

        /// Approval time (RFC 3339), defaults to now
        #[arg(long)]
        approved_at: Option<DateTime<Utc>>,

        /// Approved-submission feed (JSON array) to record in one run
        #[arg(long, conflicts_with = "submission")]
        feed: Option<PathBuf>,
    },

    /// Reverse the earning of a previously approved submission
    Unapprove {
        /// Submission id
        submission: SubmissionId,
    },

    /// Monthly payout requests
    Payout {
        #[command(subcommand)]
        action: PayoutCommands,
    },

    /// Check ledger consistency against the approved-submission feed
    Audit {
        /// Approved-submission feed (JSON array)
        #[arg(short, long)]
        submissions: PathBuf,

        /// Fix what the audit finds
        #[arg(long)]
        repair: bool,

        /// With --repair, report what would change without writing
        #[arg(long, requires = "repair")]
        dry_run: bool,

        /// Output format (json, human)
        #[arg(short, long, default_value = "human")]
        format: String,
    },

    /// Print ledger metrics in Prometheus text format
    Metrics,
}

#[derive(Subcommand)]
enum UserCommands {
    /// Add or update a user profile
    Add {
        /// Display name
        #[arg(short, long)]
        name: String,

        /// PayPal address for payouts
        #[arg(short, long)]
        paypal_email: Option<String>,

        /// Existing user id (a new one is generated otherwise)
        #[arg(long)]
        id: Option<UserId>,

        /// Staff or influencer account that never earns
        #[arg(long)]
        excluded: bool,
    },
}

#[derive(Subcommand)]
enum PoolCommands {
    /// Create the pool for the week containing a date
    Provision {
        /// Any date in the week (YYYY-MM-DD)
        week: NaiveDate,
    },

    /// Create pools for the current week and the next N weeks
    Ensure {
        #[arg(short, long, default_value_t = 1)]
        weeks_ahead: u32,
    },

    /// Show the pool covering a time
    Current {
        /// RFC 3339 time, defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// List all pools
    List {
        /// Output format (json, table)
        #[arg(short, long, default_value = "table")]
        format: String,
    },
}

#[derive(Subcommand)]
enum PayoutCommands {
    /// Recompute one user's request for a month
    Recompute {
        #[arg(long)]
        user: UserId,

        /// Month (YYYY-MM)
        #[arg(long)]
        month: MonthKey,
    },

    /// Recompute every user's request for a month
    RecomputeMonth {
        /// Month (YYYY-MM)
        month: MonthKey,
    },

    /// Mark a pending request as paid
    MarkPaid {
        #[arg(long)]
        user: UserId,

        /// Month (YYYY-MM)
        #[arg(long)]
        month: MonthKey,
    },

    /// List payout requests
    List {
        /// Only this month (YYYY-MM)
        #[arg(long)]
        month: Option<MonthKey>,

        /// Output format (json, table)
        #[arg(short, long, default_value = "table")]
        format: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref())?;

    // Initialize logging
    let filter = if cli.verbose {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };
    if cli.json_logs || config.logging.json_output {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let ledger = cli.ledger;
    match cli.command {
        Commands::Init => commands::init::run(&ledger),
        Commands::User { action } => match action {
            UserCommands::Add {
                name,
                paypal_email,
                id,
                excluded,
            } => commands::user::add(&ledger, config, name, paypal_email, id, excluded),
        },
        Commands::Pool { action } => match action {
            PoolCommands::Provision { week } => commands::pool::provision(&ledger, config, week),
            PoolCommands::Ensure { weeks_ahead } => {
                commands::pool::ensure(&ledger, config, weeks_ahead)
            }
            PoolCommands::Current { at } => commands::pool::current(&ledger, config, at),
            PoolCommands::List { format } => commands::pool::list(&ledger, config, &format),
        },
        Commands::Approve {
            submission,
            user,
            verified_count,
            approved_at,
            feed,
        } => match (feed, submission, user, verified_count) {
            (Some(feed), _, _, _) => commands::approval::approve_feed(&ledger, config, &feed),
            (None, Some(submission), Some(user), Some(verified_count)) => {
                commands::approval::approve(
                    &ledger,
                    config,
                    submission,
                    user,
                    verified_count,
                    approved_at.unwrap_or_else(Utc::now),
                )
            }
            _ => anyhow::bail!("--submission, --user and --verified-count are required"),
        },
        Commands::Unapprove { submission } => {
            commands::approval::unapprove(&ledger, config, submission)
        }
        Commands::Payout { action } => match action {
            PayoutCommands::Recompute { user, month } => {
                commands::payout::recompute(&ledger, config, user, month)
            }
            PayoutCommands::RecomputeMonth { month } => {
                commands::payout::recompute_month(&ledger, config, month)
            }
            PayoutCommands::MarkPaid { user, month } => {
                commands::payout::mark_paid(&ledger, config, user, month)
            }
            PayoutCommands::List { month, format } => {
                commands::payout::list(&ledger, config, month, &format)
            }
        },
        Commands::Audit {
            submissions,
            repair,
            dry_run,
            format,
        } => commands::audit::run(&ledger, config, &submissions, repair, dry_run, &format),
        Commands::Metrics => commands::metrics::run(&ledger, config),
    }
}
