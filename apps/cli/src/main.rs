use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use dialoguer::Select;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use instancesync::{
    ConsoleProgressReporter, DownloadConfig, IntoProgressCallback, SideFilter, SyncOptions,
    SyncSummary, UpdateOptions, UpdateSummary, run_sync, run_update,
};

#[derive(Parser, Debug)]
#[command(name = "instancesync", version, about = "Keep a modpack instance in sync with its modlist.json")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Log and report in more detail
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download, delete and rename files to match the manifest (default)
    Sync(SyncArgs),
    /// Rebuild the manifest from package records
    #[command(alias = "dev")]
    Update(UpdateArgs),
}

#[derive(Args, Debug, Default)]
struct SyncArgs {
    /// Instance root containing mods/, shaderpacks/, resourcepacks/ and datapacks/
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Manifest path [default: <DIR>/modlist.json]
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Which sides to fetch: all, client, server, client-only, server-only, both-only
    #[arg(long, conflicts_with = "option")]
    side: Option<String>,

    /// Menu number of the side selection (1-6)
    #[arg(long)]
    option: Option<String>,

    /// Launcher pack file to pair the loader with [default: ../mmc-pack.json]
    #[arg(long)]
    instance_pack: Option<PathBuf>,

    /// Fail instead of prompting when no side is given
    #[arg(long)]
    non_interactive: bool,
}

#[derive(Args, Debug)]
struct UpdateArgs {
    /// Instance root
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Manifest path [default: <DIR>/modlist.json]
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Directory of mod package records [default: <DIR>/mods/.index]
    #[arg(long)]
    index_dir: Option<PathBuf>,

    /// Launcher pack file to read the loader from [default: ../mmc-pack.json]
    #[arg(long)]
    instance_pack: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command.unwrap_or_else(|| Command::Sync(SyncArgs::default_for_cli())) {
        Command::Sync(args) => sync(args, cli.verbose).await,
        Command::Update(args) => update(args),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

impl SyncArgs {
    fn default_for_cli() -> Self {
        Self {
            dir: PathBuf::from("."),
            ..Self::default()
        }
    }
}

async fn sync(args: SyncArgs, verbose: bool) -> Result<()> {
    println!("{} {}", "InstanceSync".bold(), env!("CARGO_PKG_VERSION"));

    let side_filter = select_side(&args)?;

    let mut options = SyncOptions::new(&args.dir, side_filter);
    if let Some(manifest) = args.manifest {
        options.manifest_path = manifest;
    }
    if let Some(pack) = args.instance_pack {
        options.instance_pack = Some(pack);
    }
    options.download = DownloadConfig::from_env();
    debug!("{:?}", options);

    let progress = ConsoleProgressReporter::new(verbose).into_callback();
    let summary = run_sync(&options, Some(progress))
        .await
        .context("Sync aborted")?;

    print_sync_summary(&summary);
    Ok(())
}

fn select_side(args: &SyncArgs) -> Result<SideFilter> {
    if let Some(raw) = args.side.as_deref().or(args.option.as_deref()) {
        return Ok(raw.parse::<SideFilter>()?);
    }

    if args.non_interactive || !std::io::stdin().is_terminal() {
        bail!("No side selection given; pass --side <filter> or --option <1-6>");
    }

    let labels: Vec<&str> = SideFilter::MENU.iter().map(|(_, label)| *label).collect();
    let choice = Select::new()
        .with_prompt("Choose files to download")
        .items(&labels)
        .default(0)
        .interact()
        .context("Side selection prompt failed")?;

    Ok(SideFilter::MENU[choice].0)
}

fn print_sync_summary(summary: &SyncSummary) {
    println!();
    for category in &summary.categories {
        let report = &category.report;
        let mut line = format!(
            "{:<14} {} downloaded, {} skipped, {} present, {} deleted, {} renamed",
            category.key,
            report.downloaded.to_string().green(),
            report.skipped,
            report.already_present,
            report.deleted.to_string().yellow(),
            report.renamed,
        );
        if report.downloaded_via_fallback > 0 {
            line.push_str(&format!(" ({} via fallback)", report.downloaded_via_fallback));
        }
        println!("{}", line);

        for failed in &report.failed {
            println!("  {} {}: {}", "failed".red(), failed.filename, failed.reason);
        }
        for unresolvable in &report.unresolvable {
            println!("  {} {}: {}", "no source".red(), unresolvable.filename, unresolvable.reason);
        }
        for rejected in &category.rejected {
            println!(
                "  {} row {} ({}): {}",
                "invalid".red(),
                rejected.index,
                rejected.filename.as_deref().unwrap_or("?"),
                rejected.error
            );
        }
        if report.deadline_exceeded {
            println!(
                "  {} {} transfer(s) were still running at the deadline",
                "warning".yellow(),
                report.pending
            );
        }
    }
    for key in &summary.absent {
        println!("{:<14} {}", key, "not in manifest".dimmed());
    }

    println!("\n{} Took {:.2}s", "Done!".green().bold(), summary.elapsed.as_secs_f32());
}

fn update(args: UpdateArgs) -> Result<()> {
    let mut options = UpdateOptions::new(&args.dir);
    if let Some(manifest) = args.manifest {
        options.manifest_path = manifest;
    }
    if let Some(index_dir) = args.index_dir {
        options.index_dir = index_dir;
    }
    if let Some(pack) = args.instance_pack {
        options.instance_pack = Some(pack);
    }
    debug!("{:?}", options);

    let summary = run_update(&options).context("Update aborted")?;
    print_update_summary(&summary, &options);
    Ok(())
}

fn print_update_summary(summary: &UpdateSummary, options: &UpdateOptions) {
    if summary.regenerated {
        println!("{} existing manifest was unreadable and has been regenerated", "note:".yellow());
    }
    match &summary.loader {
        Some(loader) => println!("Loader: {}", loader),
        None => println!("Loader: {}", "unknown".dimmed()),
    }

    for category in &summary.categories {
        println!(
            "{:<14} {} entries ({} updated, {} added, {} removed)",
            category.key,
            category.entries,
            category.merge.updated.to_string().green(),
            category.merge.added.to_string().green(),
            category.merge.removed.to_string().yellow(),
        );
        for rejected in &category.rejected {
            println!(
                "  {} row {} ({}): {}",
                "dropped".red(),
                rejected.index,
                rejected.filename.as_deref().unwrap_or("?"),
                rejected.error
            );
        }
    }

    println!("\nWrote {} (Took {:.2}s)", options.manifest_path.display(), summary.elapsed.as_secs_f32());

    if !summary.defects.is_empty() {
        println!("\n{}", "Entries missing ids (skipped):".red().bold());
        for defect in &summary.defects {
            println!("{}", defect);
        }
    }
}
