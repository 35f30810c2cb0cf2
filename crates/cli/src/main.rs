//! Command-line client for stock opname sessions.
//!
//! Each invocation resumes the session recorded in the local state file,
//! runs one command against the opname API and prints the outcome.
//! Scanned assets only survive between invocations once they have been
//! confirmed or edited, because the server keeps nothing else.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use opname_client::OpnameApi;
use opname_core::asset::AssetStatus;
use opname_core::directory;
use opname_core::reconciliation::ProcessingStatus;
use opname_core::scan_session::EntryFilter;
use opname_core::session::LocationKind;
use opname_core::types::DbId;
use opname_scanner::{drain_notices, Notice, NoticeLevel, Scanner};
use opname_store::StateStore;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::CliConfig;

#[derive(Parser)]
#[command(name = "opname", about = "IT asset stock opname client", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an opname for a site or department.
    Start(StartArgs),
    /// Look up assets and show how they compare with the register.
    Scan(ScanArgs),
    /// Confirm assets as unchanged.
    AllGood(TagsArgs),
    /// Submit corrections for one asset.
    Edit(EditArgs),
    /// Remove assets from the session.
    Remove(TagsArgs),
    /// Show the session and its scanned assets.
    Status(StatusArgs),
    /// Finish scanning and submit the session for review.
    Finish,
    /// Abandon the session.
    Cancel,
    /// Approve a submitted session as the current user.
    Approve(ReviewArgs),
    /// Reject a submitted session as the current user.
    Reject(RejectArgs),
}

#[derive(Args)]
struct StartArgs {
    #[arg(long, help = "Site or department id")]
    location: DbId,
    #[arg(long, value_enum, default_value_t = KindArg::Site)]
    kind: KindArg,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Site,
    Department,
}

impl From<KindArg> for LocationKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Site => LocationKind::Site,
            KindArg::Department => LocationKind::Department,
        }
    }
}

#[derive(Args)]
struct ScanArgs {
    #[arg(required = true, help = "Asset tags, or serial numbers with --serial")]
    queries: Vec<String>,
    #[arg(long, action = ArgAction::SetTrue, help = "Look assets up by serial number")]
    serial: bool,
}

#[derive(Args)]
struct TagsArgs {
    #[arg(required = true)]
    tags: Vec<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ConditionArg {
    Good,
    Bad,
}

#[derive(Args)]
struct EditArgs {
    tag: String,
    #[arg(long, help = "Why the register is being corrected")]
    reason: String,
    #[arg(long, help = "New asset status, e.g. \"In Repair\"")]
    status: Option<String>,
    #[arg(long)]
    status_reason: Option<String>,
    #[arg(long)]
    serial: Option<String>,
    #[arg(long, value_enum)]
    condition: Option<ConditionArg>,
    #[arg(long)]
    notes: Option<String>,
    #[arg(long, help = "Condition photo to upload")]
    photo: Option<PathBuf>,
    #[arg(long, help = "Sub-site id within the asset's site")]
    sub_site: Option<DbId>,
    #[arg(long)]
    room: Option<String>,
    #[arg(long, help = "User id of the new owner")]
    owner: Option<DbId>,
    #[arg(long = "toggle-equipment", help = "Equipment to add or remove (repeatable)")]
    toggle_equipment: Vec<String>,
    #[arg(long, help = "Serial number used when adding the adaptor")]
    adaptor_serial: Option<String>,
}

#[derive(Args)]
struct StatusArgs {
    #[arg(long, value_enum, help = "Only show assets in this state")]
    only: Option<ProcessingArg>,
    #[arg(long, help = "Search tag, serial, owner or location")]
    search: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProcessingArg {
    Pending,
    AllGood,
    Edited,
}

impl From<ProcessingArg> for ProcessingStatus {
    fn from(arg: ProcessingArg) -> Self {
        match arg {
            ProcessingArg::Pending => ProcessingStatus::Pending,
            ProcessingArg::AllGood => ProcessingStatus::AllGood,
            ProcessingArg::Edited => ProcessingStatus::Edited,
        }
    }
}

#[derive(Args)]
struct ReviewArgs {
    session: DbId,
}

#[derive(Args)]
struct RejectArgs {
    session: DbId,
    #[arg(long)]
    reason: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "opname=info,opname_scanner=info,opname_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = CliConfig::from_env().context("invalid configuration")?;
    tracing::debug!(api_url = %config.api_url, state = %config.state_path.display(), "Configuration loaded");

    let api = OpnameApi::new(config.api_url.clone(), config.request_timeout)
        .context("failed to build HTTP client")?;
    let mut scanner = Scanner::new(Arc::new(api), StateStore::new(&config.state_path));
    let mut notices = scanner.subscribe();

    let result = run(&mut scanner, &config, cli.command, cli.json).await;
    print_notices(&mut notices);
    result
}

async fn run(scanner: &mut Scanner, config: &CliConfig, command: Commands, json: bool) -> Result<()> {
    scanner.resume().await.context("failed to resume the saved session")?;

    match command {
        Commands::Start(args) => {
            let session = scanner
                .start_session(config.user_id, args.location, args.kind.into())
                .await?;
            output(json, session, || {
                format!(
                    "Opname {} started for {} {}",
                    session.id, session.location_kind, session.location_id
                )
            })
        }
        Commands::Scan(args) => {
            for query in &args.queries {
                let entry = if args.serial {
                    scanner.scan_by_serial(query).await
                } else {
                    scanner.scan_by_tag(query).await
                };
                // One bad tag should not stop the rest of the batch.
                let Ok(entry) = entry else { continue };
                let comparison = entry.field_comparison();
                output(json, &comparison, || {
                    let mut text = format!("{}\n", entry.asset_tag());
                    for row in &comparison {
                        let marker = if row.changed { "*" } else { " " };
                        text.push_str(&format!(
                            "{marker} {:<22} {:<30} {}\n",
                            row.label, row.existing, row.pending
                        ));
                    }
                    text
                })?;
            }
            Ok(())
        }
        Commands::AllGood(args) => {
            for tag in &args.tags {
                ensure_scanned(scanner, tag).await?;
                scanner.mark_all_good(tag).await?;
            }
            print_counts(scanner, json)
        }
        Commands::Edit(args) => {
            edit(scanner, args).await?;
            print_counts(scanner, json)
        }
        Commands::Remove(args) => {
            for tag in &args.tags {
                let outcome = scanner.remove(tag).await?;
                tracing::debug!(asset_tag = %tag, ?outcome, "Removed");
            }
            print_counts(scanner, json)
        }
        Commands::Status(args) => {
            let Some(session) = scanner.session().cloned() else {
                bail!("no opname session is in progress");
            };
            scanner.scan_session_mut().filter = EntryFilter {
                processing_status: args.only.map(Into::into),
                query: args.search,
            };
            let view = StatusView {
                session: &session,
                counts: scanner.scan_session().counts(),
                assets: scanner.scan_session().table_rows(),
            };
            output(json, &view, || {
                let mut text = format!(
                    "Opname {} ({}) scanned {} pending {} edited {} all good {}\n",
                    session.id,
                    session.status,
                    view.counts.scanned,
                    view.counts.pending,
                    view.counts.edited,
                    view.counts.all_good
                );
                for row in &view.assets {
                    text.push_str(&format!(
                        "{:<14} {:<16} {:<12} {:<24} {}\n",
                        row.asset_tag,
                        row.serial_number,
                        row.processing_status.as_str(),
                        row.owner_name,
                        row.location
                    ));
                }
                text
            })
        }
        Commands::Finish => {
            let session = scanner.finish_session().await?;
            output(json, &session, || {
                format!("Opname {} submitted for review", session.id)
            })
        }
        Commands::Cancel => {
            scanner.cancel_session().await?;
            Ok(())
        }
        Commands::Approve(args) => {
            let session = scanner
                .approve_session(args.session, config.user_id)
                .await?;
            output(json, &session, || {
                format!("Opname {} is now {}", session.id, session.status)
            })
        }
        Commands::Reject(args) => {
            let session = scanner
                .reject_session(args.session, config.user_id, &args.reason)
                .await?;
            output(json, &session, || {
                format!("Opname {} is now {}", session.id, session.status)
            })
        }
    }
}

/// Make sure `tag` is in the session, scanning it if it is not.
async fn ensure_scanned(scanner: &mut Scanner, tag: &str) -> Result<()> {
    if scanner.scan_session().get(tag).is_none() {
        scanner.scan_by_tag(tag).await?;
    }
    Ok(())
}

async fn edit(scanner: &mut Scanner, args: EditArgs) -> Result<()> {
    ensure_scanned(scanner, &args.tag).await?;

    let owner = match args.owner {
        Some(id) => {
            let users = scanner.users().await?;
            let user = users.into_iter().find(|u| u.id == id);
            Some(user.with_context(|| format!("user {id} not found"))?)
        }
        None => None,
    };
    let sub_site = match args.sub_site {
        Some(id) => {
            let site_id = scanner
                .scan_session()
                .get(&args.tag)
                .and_then(|e| owner.as_ref().and_then(|u| u.site_id).or(e.pending.site_id))
                .context("asset has no site to pick a sub-site from")?;
            let sub_sites = scanner.sub_sites(site_id).await?;
            let sub_site = sub_sites.into_iter().find(|s| s.id == id);
            Some(sub_site.with_context(|| format!("sub-site {id} not found in site {site_id}"))?)
        }
        None => None,
    };
    let photo = match &args.photo {
        Some(path) => {
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "photo.jpg".to_string());
            Some(scanner.upload_condition_photo(&args.tag, &file_name, bytes).await?)
        }
        None => None,
    };
    let status = args.status.as_deref().map(AssetStatus::parse).transpose()?;

    let entry = scanner.scan_session_mut().entry_mut(&args.tag)?;
    if let Some(status) = status {
        entry.pending.asset_status = status;
    }
    if let Some(reason) = args.status_reason {
        entry.pending.status_reason = reason;
    }
    if let Some(serial) = args.serial {
        entry.pending.serial_number = serial.trim().to_string();
    }
    if let Some(condition) = args.condition {
        entry.pending.condition = matches!(condition, ConditionArg::Good);
    }
    if let Some(notes) = args.notes {
        entry.pending.condition_notes = notes;
    }
    if photo.is_some() {
        entry.pending.condition_photo = photo;
    }
    if let Some(user) = &owner {
        directory::assign_owner(&mut entry.pending, user);
    }
    match &sub_site {
        Some(sub_site) => directory::relocate(&mut entry.pending, sub_site, args.room.as_deref()),
        None => {
            if let Some(room) = &args.room {
                entry.pending.room = room.trim().to_string();
            }
        }
    }
    if let Some(serial) = args.adaptor_serial {
        entry.adaptor_serial = serial;
    }
    for name in &args.toggle_equipment {
        entry.toggle_equipment(name);
    }
    entry.change_reason = args.reason;

    scanner.submit_changes(&args.tag).await?;
    Ok(())
}

#[derive(Serialize)]
struct StatusView<'a> {
    session: &'a opname_core::session::OpnameSession,
    counts: opname_core::scan_session::SessionCounts,
    assets: Vec<opname_core::scan_session::TableRow>,
}

fn print_counts(scanner: &Scanner, json: bool) -> Result<()> {
    let counts = scanner.scan_session().counts();
    output(json, &counts, || {
        format!(
            "scanned {} pending {} edited {} all good {}",
            counts.scanned, counts.pending, counts.edited, counts.all_good
        )
    })
}

fn output<T: Serialize>(json: bool, value: T, text: impl FnOnce() -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{}", text().trim_end());
    }
    Ok(())
}

fn print_notices(rx: &mut broadcast::Receiver<Notice>) {
    for notice in drain_notices(rx) {
        let level = match notice.level {
            NoticeLevel::Success => "ok",
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        eprintln!("[{level}] {}", notice.message);
    }
}
