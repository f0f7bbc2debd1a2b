mod commands;
mod logging;
mod reporter;

use std::fs;
use std::io;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use colored::*;
use console::{style, Term};
use commands::{Cli, Commands, RemoveArgs, ScanArgs, UnusedArgs};
use dotenv::dotenv;
use drive_sweep::analysis::{self, PathStatus};
use drive_sweep::engine::ScanAborter;
use drive_sweep::{
    dupes, AppConfig, DuplicateSearch, FileRecord, ScanController, ScanEvent, ScanRequest,
    ScanStatus, SizeCategory,
};
use indicatif::HumanBytes;
use parking_lot::Mutex;
use reporter::CliReporter;
use tracing::{error, info, warn};

/// What Ctrl-C stops: the running scan, if any, and every cancellable step after it.
#[derive(Clone, Default)]
struct Interrupt {
    cancel: Arc<AtomicBool>,
    scan: Arc<Mutex<Option<ScanAborter>>>,
}

impl Interrupt {
    fn install(&self) -> Result<()> {
        let interrupt = self.clone();
        ctrlc::set_handler(move || {
            // A second Ctrl-C gives up on a graceful stop.
            if interrupt.cancel.swap(true, Ordering::AcqRel) {
                process::exit(130);
            }
            if let Some(aborter) = interrupt.scan.lock().as_ref() {
                aborter.abort();
            }
        })
        .context("installing Ctrl-C handler")
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }
}

fn main() -> Result<()> {
    dotenv().ok();

    let _guard = logging::init_logger();

    let config = match drive_sweep::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();
    let interrupt = Interrupt::default();
    interrupt.install()?;

    match args.command {
        Some(Commands::Scan(scan_args)) => {
            if let Err(err) = run_scan(&config, scan_args, &interrupt) {
                error!("Error: {:#}", err);
            }
        }
        Some(Commands::Unused(unused_args)) => {
            if let Err(err) = run_unused(&config, unused_args, &interrupt) {
                error!("Error: {:#}", err);
            }
        }
        Some(Commands::Remove(remove_args)) => {
            if let Err(err) = run_remove(remove_args, &interrupt) {
                error!("Error: {:#}", err);
            }
        }
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:?}", config);
        }
        None => {
            let _ = Cli::command().print_long_help();
        }
    }

    Ok(())
}

fn build_request(config: &AppConfig, args: &ScanArgs) -> ScanRequest {
    let mut request = ScanRequest::new(&args.root)
        .with_min_age_years(args.min_age_years)
        .with_extensions(&args.extensions)
        .with_size_category(args.size.map(SizeCategory::from))
        .with_max_files(args.max_files.unwrap_or(config.max_files))
        .with_workers(args.workers.unwrap_or(config.workers))
        .with_ignore_patterns(config.ignore_patterns.clone());
    if let Some(owner) = &args.owner {
        request = request.with_owner_filter(owner.as_str());
    }
    request
}

/// Run one scan to the end, rendering progress, and return every matching record.
fn collect_scan(
    config: &AppConfig,
    request: ScanRequest,
    interrupt: &Interrupt,
    reporter: &CliReporter,
) -> Result<(Vec<FileRecord>, ScanStatus)> {
    let controller = ScanController::new().with_tuning(config.tuning());
    let handle = controller
        .start(request)
        .context("starting scan")?;
    *interrupt.scan.lock() = Some(handle.aborter());

    reporter.on_scan_start();
    let mut records = Vec::new();
    for event in handle.events().iter() {
        match event {
            ScanEvent::FileDiscovered(record) => records.push(record),
            other => reporter.on_scan_event(&other),
        }
    }

    let outcome = handle.wait();
    interrupt.scan.lock().take();
    reporter.finish_bar();

    info!(
        "Scan {:?} in {}: {} files ({} GB), {} directories skipped",
        outcome.status,
        format!("{:.2}s", outcome.elapsed.as_secs_f64()).green(),
        format!("{}", outcome.totals.file_count).cyan(),
        format!("{:.2}", drive_sweep::model::bytes_to_gib(outcome.totals.total_bytes)).cyan(),
        outcome.skipped_dirs,
    );
    if outcome.status == ScanStatus::Truncated {
        warn!(
            "Stopped collecting at {} files; raise max_files to see more",
            outcome.discovered
        );
    }
    Ok((records, outcome.status))
}

fn run_scan(config: &AppConfig, args: ScanArgs, interrupt: &Interrupt) -> Result<()> {
    let reporter = CliReporter::new();
    let request = build_request(config, &args);
    let (records, status) = collect_scan(config, request, interrupt, &reporter)?;

    if args.list {
        for record in &records {
            println!(
                "{}\t{}\t{}\t{}",
                record.path.display(),
                HumanBytes(record.size),
                record.modified.format("%Y-%m-%d"),
                record.owner
            );
        }
    }

    if !args.duplicates || status == ScanStatus::Aborted {
        return Ok(());
    }

    let paths: Vec<PathBuf> = records.into_iter().map(|record| record.path).collect();
    let search = dupes::find_duplicates(&paths, &config.sampling(), &interrupt.cancel, &reporter);
    let search = match search {
        DuplicateSearch::Found(groups) if args.verify => {
            info!("Verifying sampled groups with a full content hash...");
            dupes::verify_groups(groups, &interrupt.cancel)
        }
        other => other,
    };
    let groups = match search {
        DuplicateSearch::Found(groups) => groups,
        DuplicateSearch::Cancelled => {
            warn!("Duplicate search cancelled");
            return Ok(());
        }
    };

    let wasted: u64 = groups.iter().map(|group| group.wasted_bytes()).sum();
    for group in &groups {
        let marker = if group.sampled { " (sampled)" } else { "" };
        println!(
            "{} x {}{}",
            group.paths.len(),
            HumanBytes(group.size),
            marker.yellow()
        );
        for path in &group.paths {
            println!("    {}", path.display());
        }
    }
    info!(
        "{} duplicate groups, {} wasted",
        format!("{}", groups.len()).red(),
        format!("{}", HumanBytes(wasted)).red(),
    );
    if groups.iter().any(|group| group.sampled) {
        warn!("Groups marked (sampled) were matched on head and tail only; use --verify to confirm");
    }

    if args.delete_duplicates && !groups.is_empty() {
        let prompt = format!(
            "Delete {} duplicate files, keeping the first of each group?",
            groups.iter().map(|g| g.paths.len() - 1).sum::<usize>()
        );
        if prompt_confirm(&prompt, false)? {
            let report = dupes::delete_all_but_first_with(&groups, &reporter, |path| {
                fs::remove_file(path)
            });
            info!(
                "{} deleted, {} failed",
                format!("{}", report.deleted).green(),
                format!("{}", report.failed).red(),
            );
        }
    }

    Ok(())
}

fn run_unused(config: &AppConfig, args: UnusedArgs, interrupt: &Interrupt) -> Result<()> {
    let reporter = CliReporter::new();
    let request = ScanRequest::new(&args.root)
        .with_max_files(config.max_files)
        .with_workers(config.workers)
        .with_ignore_patterns(config.ignore_patterns.clone());
    let (records, status) = collect_scan(config, request, interrupt, &reporter)?;
    if status == ScanStatus::Aborted {
        return Ok(());
    }

    let paths: Vec<PathBuf> = records.into_iter().map(|record| record.path).collect();
    let unused = analysis::find_unused(&paths, args.days, SystemTime::now());
    let total: u64 = unused.iter().map(|file| file.size).sum();
    for file in &unused {
        println!(
            "{}\t{}\t{}",
            file.last_used.format("%Y-%m-%d"),
            HumanBytes(file.size),
            file.path.display()
        );
    }
    info!(
        "{} files unused for {} days, {} total",
        format!("{}", unused.len()).cyan(),
        args.days,
        format!("{}", HumanBytes(total)).cyan(),
    );
    Ok(())
}

fn run_remove(args: RemoveArgs, interrupt: &Interrupt) -> Result<()> {
    let text = fs::read_to_string(&args.list)
        .with_context(|| format!("reading {}", args.list.display()))?;
    let paths = analysis::parse_path_list(&text);

    let mut files = Vec::new();
    for (path, status) in analysis::validate_paths(&paths) {
        match status {
            PathStatus::File => files.push(path),
            PathStatus::Directory => println!("{} {}", "dir ".yellow(), path.display()),
            PathStatus::Missing => println!("{} {}", "gone".red(), path.display()),
        }
    }
    info!(
        "{} of {} listed paths are files",
        format!("{}", files.len()).cyan(),
        paths.len()
    );

    if args.dry_run || files.is_empty() {
        for path in &files {
            println!("{} {}", "file".green(), path.display());
        }
        return Ok(());
    }

    if prompt_confirm(&format!("Delete {} files?", files.len()), false)? {
        let reporter = CliReporter::new();
        let report = analysis::remove_files(&files, &interrupt.cancel, &reporter);
        reporter.finish_bar();
        if interrupt.is_cancelled() {
            warn!("Removal cancelled");
        }
        info!(
            "{} deleted, {} failed",
            format!("{}", report.deleted).green(),
            format!("{}", report.failed).red(),
        );
    }
    Ok(())
}

/// Ask a yes/no question on the terminal. Anything but a terminal answers `default`.
fn prompt_confirm(prompt: &str, default: bool) -> io::Result<bool> {
    let term = Term::stdout();
    let hint = if default { "Y/n" } else { "y/N" };

    loop {
        term.write_str(&format!("{} ({}): ", prompt, hint))?;
        match term.read_line()?.trim().to_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            "" => return Ok(default),
            other => term.write_line(&format!(
                "{} is not an answer, type y or n",
                style(other).yellow()
            ))?,
        }
    }
}
