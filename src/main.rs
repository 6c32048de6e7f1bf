// Recognition Ledger - CLI
// Thin front end over the library: every subcommand is one ledger call.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use recognition_ledger::{
    import_roster, AppConfig, Ledger, Period, RecognitionFilter, DEFAULT_LEADERBOARD_LIMIT,
};

#[derive(Parser, Debug)]
#[command(
    name = "recognition-ledger",
    about = "Peer-recognition credit ledger",
    version,
    propagate_version = true
)]
struct Cli {
    /// SQLite database file (overrides config)
    #[arg(long, short = 'd', env = "LEDGER_DB")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the database schema
    Init,
    /// Register a student
    AddStudent { name: String },
    /// Register every student listed in a CSV roster (column: name)
    ImportRoster { path: PathBuf },
    /// Show one student (applies a pending monthly reset)
    Student { id: i64 },
    /// List all students as stored
    Students,
    /// Send credits from one student to another
    Recognize {
        sender_id: i64,
        recipient_id: i64,
        amount: i64,
        #[arg(long, short = 'm')]
        message: Option<String>,
    },
    /// List recognitions, newest first
    Recognitions {
        #[arg(long)]
        sender: Option<i64>,
        #[arg(long)]
        recipient: Option<i64>,
    },
    /// Endorse a recognition
    Endorse { recognition_id: i64, endorser_id: i64 },
    /// Redeem received credits for a voucher
    Redeem { student_id: i64, amount: i64 },
    /// Top students by credits received
    Leaderboard {
        #[arg(long, short = 'n', default_value_t = DEFAULT_LEADERBOARD_LIMIT)]
        limit: i64,
    },
    /// Apply the monthly reset to every student (idempotent)
    ResetMonth {
        /// Target period YYYY-MM, not before the current month (defaults to it)
        #[arg(long)]
        period: Option<Period>,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recognition_ledger=warn".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut app = AppConfig::load().context("Failed to load configuration")?;
    if let Some(db) = &cli.db {
        app.database.path = db.to_string_lossy().into_owned();
    }

    let mut ledger = Ledger::from_app_config(&app)
        .with_context(|| format!("Failed to open ledger at {}", app.database.path))?;

    run(&mut ledger, cli.command)
}

fn run(ledger: &mut Ledger, command: Commands) -> Result<()> {
    let config = *ledger.config();

    match command {
        Commands::Init => {
            println!("✓ Database ready (period {})", ledger.current_period());
        }
        Commands::AddStudent { name } => {
            let s = ledger.create_student(&name)?;
            println!("✓ Registered #{} {} with {} credits", s.id, s.name, s.available_credits);
        }
        Commands::ImportRoster { path } => {
            println!("📂 Importing roster {}...", path.display());
            let summary = import_roster(ledger, &path)?;
            println!("✓ Registered: {} students", summary.created);
            println!("✓ Skipped duplicates: {}", summary.duplicates);
        }
        Commands::Student { id } => {
            let s = ledger.get_student(id)?;
            println!("🎓 #{} {}", s.id, s.name);
            println!("   Period:            {}", s.last_reset_period);
            println!("   Available credits: {}", s.available_credits);
            println!(
                "   Sent this month:   {} / {} ({} left)",
                s.monthly_sent,
                config.monthly_sending_limit,
                s.remaining_monthly_limit(&config)
            );
            println!(
                "   Received balance:  {} (voucher value {})",
                s.received_balance,
                s.redeemable_value(&config)
            );
        }
        Commands::Students => {
            for s in ledger.list_students()? {
                println!(
                    "#{:<4} {:<24} available {:>4}  sent {:>4}  received {:>5}  [{}]",
                    s.id, s.name, s.available_credits, s.monthly_sent, s.received_balance,
                    s.last_reset_period
                );
            }
        }
        Commands::Recognize {
            sender_id,
            recipient_id,
            amount,
            message,
        } => {
            let receipt = ledger.recognize(sender_id, recipient_id, amount, message.as_deref())?;
            println!(
                "🙌 {} → {}: {} credits (recognition #{})",
                receipt.sender.name, receipt.recipient.name, amount, receipt.recognition.id
            );
            println!(
                "   {} has {} credits left this month",
                receipt.sender.name, receipt.sender.available_credits
            );
        }
        Commands::Recognitions { sender, recipient } => {
            let filter = RecognitionFilter {
                sender_id: sender,
                recipient_id: recipient,
            };
            for entry in ledger.list_recognitions(filter)? {
                let r = &entry.recognition;
                println!(
                    "#{:<5} {} → {}  {:>4} credits  👍 {}  {}  {}",
                    r.id,
                    r.sender_id,
                    r.recipient_id,
                    r.amount,
                    entry.endorsements,
                    r.created_at.format("%Y-%m-%d %H:%M"),
                    r.message.as_deref().unwrap_or("")
                );
            }
        }
        Commands::Endorse {
            recognition_id,
            endorser_id,
        } => {
            let receipt = ledger.endorse(recognition_id, endorser_id)?;
            println!(
                "👍 Recognition #{} now has {} endorsements",
                recognition_id, receipt.total_endorsements
            );
        }
        Commands::Redeem { student_id, amount } => {
            let redemption = ledger.redeem(student_id, amount)?;
            println!(
                "🎟️  Redeemed {} credits for a voucher worth {}",
                redemption.amount, redemption.voucher_value
            );
        }
        Commands::Leaderboard { limit } => {
            println!("🏆 Leaderboard");
            for (rank, entry) in ledger.leaderboard(limit)?.iter().enumerate() {
                println!(
                    "{:>3}. {:<24} {:>5} credits  {:>3} recognitions  {:>3} endorsements",
                    rank + 1,
                    entry.name,
                    entry.total_received,
                    entry.recognition_count,
                    entry.endorsement_count
                );
            }
        }
        Commands::ResetMonth { period } => {
            let period = period.unwrap_or_else(|| ledger.current_period());
            let summary = ledger.admin_reset_all(period)?;
            println!("🔄 Reset to {}", summary.period);
            println!("✓ Processed: {}", summary.processed_count);
            println!("✓ Updated:   {} {:?}", summary.updated_ids.len(), summary.updated_ids);
        }
    }

    Ok(())
}
