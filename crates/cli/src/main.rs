//! ownershipctl - operator commands for the ownership transfer engine
//! Talks to the engine database directly; the daemon picks up queued tasks.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::{ColoredString, Colorize};
use tabled::{Table, Tabled};

use ownership_core::application::{CreateInviteRequest, InviteDetails};
use ownership_core::domain::{Invite, InviteStatus, TransferState, TransferStatus};
use ownership_core::port::{TaskQueue, TransferRepository};
use ownership_daemon::{Engine, Settings};

#[derive(Parser)]
#[command(name = "ownershipctl")]
#[command(about = "Project ownership transfer engine CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (TOML); OWNERSHIP_* environment variables still apply
    #[arg(long, env = "OWNERSHIP_CONFIG")]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage invites
    Invite {
        #[command(subcommand)]
        action: InviteCommand,
    },

    /// Inspect transfers
    Transfer {
        #[command(subcommand)]
        action: TransferCommand,
    },

    /// Run every watchdog sweep once
    Watchdog,

    /// Show queued task count
    Queue,
}

#[derive(Subcommand)]
enum InviteCommand {
    /// Offer projects to another user
    Create {
        /// Current owner of the projects
        #[arg(short, long)]
        sender: String,

        /// User receiving the projects
        #[arg(short, long)]
        recipient: String,

        /// Asset uid (repeatable)
        #[arg(short, long = "asset", required = true)]
        assets: Vec<String>,
    },

    /// Accept an invite (recipient only) and start its transfers
    Accept {
        invite_uid: String,
        #[arg(long)]
        actor: String,
    },

    /// Decline a pending invite (recipient only)
    Decline {
        invite_uid: String,
        #[arg(long)]
        actor: String,
    },

    /// Cancel a pending invite (sender only)
    Cancel {
        invite_uid: String,
        #[arg(long)]
        actor: String,
    },

    /// Show an invite and its transfers
    Show { invite_uid: String },
}

#[derive(Subcommand)]
enum TransferCommand {
    /// Show the status rows of a transfer
    Show { transfer_id: i64 },
}

#[derive(Tabled)]
struct TransferRow {
    id: i64,
    uid: String,
    asset: String,
    global: String,
}

#[derive(Tabled)]
struct StatusRow {
    task: String,
    status: String,
    modified: String,
    error: String,
}

fn color_state(state: TransferState) -> ColoredString {
    match state {
        TransferState::Pending => state.as_str().yellow(),
        TransferState::InProgress => state.as_str().cyan(),
        TransferState::Success => state.as_str().green(),
        TransferState::Failed => state.as_str().red(),
    }
}

fn color_invite(status: InviteStatus) -> ColoredString {
    match status {
        InviteStatus::Pending => status.as_str().yellow(),
        InviteStatus::InProgress => status.as_str().cyan(),
        InviteStatus::Complete => status.as_str().green(),
        InviteStatus::Failed => status.as_str().red(),
        InviteStatus::Declined | InviteStatus::Cancelled | InviteStatus::Expired => {
            status.as_str().dimmed()
        }
    }
}

fn format_millis(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| millis.to_string())
}

fn print_invite(invite: &Invite) {
    println!("  {} {}", "Invite:".bold(), invite.uid);
    println!("  {} {}", "Sender:".bold(), invite.sender);
    println!("  {} {}", "Recipient:".bold(), invite.recipient);
    println!("  {} {}", "Status:".bold(), color_invite(invite.status));
    println!("  {} {}", "Created:".bold(), format_millis(invite.created_at));
}

async fn print_details(engine: &Engine, details: &InviteDetails) -> Result<()> {
    print_invite(&details.invite);
    println!();

    let mut rows = Vec::with_capacity(details.transfers.len());
    for transfer in &details.transfers {
        let global = engine.transfers.status(transfer.id).await?;
        rows.push(TransferRow {
            id: transfer.id,
            uid: transfer.uid.clone(),
            asset: transfer.asset_uid.clone(),
            global: color_state(global).to_string(),
        });
    }
    println!("{}", Table::new(rows));
    Ok(())
}

fn status_rows(statuses: Vec<TransferStatus>) -> Vec<StatusRow> {
    statuses
        .into_iter()
        .map(|s| StatusRow {
            task: s.status_type.to_string(),
            status: color_state(s.status).to_string(),
            modified: format_millis(s.modified_at),
            error: s.error.unwrap_or_default(),
        })
        .collect()
}

async fn run_invite(engine: &Engine, action: InviteCommand) -> Result<()> {
    match action {
        InviteCommand::Create {
            sender,
            recipient,
            assets,
        } => {
            let details = engine
                .invites
                .create_invite(CreateInviteRequest {
                    sender,
                    recipient,
                    asset_uids: assets,
                })
                .await
                .context("Failed to create invite")?;

            println!("{}", "✓ Invite created".green().bold());
            println!();
            print_details(engine, &details).await?;
        }

        InviteCommand::Accept { invite_uid, actor } => {
            let details = engine
                .invites
                .accept(&invite_uid, &actor)
                .await
                .context("Failed to accept invite")?;

            println!("{}", format!("✓ Invite {} accepted", invite_uid).green().bold());
            println!();
            print_details(engine, &details).await?;
        }

        InviteCommand::Decline { invite_uid, actor } => {
            let invite = engine
                .invites
                .decline(&invite_uid, &actor)
                .await
                .context("Failed to decline invite")?;

            println!("{}", format!("✓ Invite {} declined", invite.uid).green().bold());
        }

        InviteCommand::Cancel { invite_uid, actor } => {
            let invite = engine
                .invites
                .cancel(&invite_uid, &actor)
                .await
                .context("Failed to cancel invite")?;

            println!("{}", format!("✓ Invite {} cancelled", invite.uid).green().bold());
        }

        InviteCommand::Show { invite_uid } => {
            let details = engine.invites.details(&invite_uid).await?;
            print_details(engine, &details).await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load_from(cli.config.as_deref())?;
    let engine = Engine::connect(settings).await?;

    match cli.command {
        Commands::Invite { action } => run_invite(&engine, action).await?,

        Commands::Transfer {
            action: TransferCommand::Show { transfer_id },
        } => {
            let transfer = engine
                .repo
                .find_transfer(transfer_id)
                .await?
                .with_context(|| format!("Transfer {} not found", transfer_id))?;
            let statuses = engine.repo.list_statuses(transfer_id).await?;

            println!("{}", format!("Transfer {}", transfer).cyan().bold());
            println!("  {} {}", "Invite:".bold(), transfer.invite_uid);
            println!("  {} {}", "Created:".bold(), format_millis(transfer.created_at));
            println!();
            println!("{}", Table::new(status_rows(statuses)));
        }

        Commands::Watchdog => {
            println!("{}", "Running watchdog sweeps...".cyan().bold());
            let report = engine.watchdog.run_once().await;

            println!("  {} {} tasks resumed", "✓".green(), report.resumed);
            println!("  {} {} lost attachment tasks resumed", "✓".green(), report.orphans_resumed);
            println!("  {} {} stuck tasks failed", "✓".green(), report.failed);
            println!("  {} {} invites expired", "✓".green(), report.invites_expired);
        }

        Commands::Queue => {
            let pending = engine.queue.pending_count().await?;
            println!("  {} {}", "Queued tasks:".bold(), pending);
        }
    }

    engine.pool.close().await;
    Ok(())
}
