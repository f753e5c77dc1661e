use std::error::Error;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use log::{error, info, warn};

use job_agent_lib::cli::{Cli, Command, RunArgs};
use job_agent_lib::config::Renderer;
use job_agent_lib::{extractor, logger, review};
use job_agent_lib::{AppConfig, Browser, ChromeBrowser, HttpBrowser, Ledger, OllamaWriter, Pipeline};

fn main() -> Result<(), Box<dyn Error>> {
    logger::init();
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).map_err(|e| {
        error!("{}", e);
        e
    })?;

    match cli.command {
        Command::Run(args) => run(&config, &args),
        Command::Mark {
            link,
            title,
            company,
            notes,
        } => {
            let link = extractor::canonical_url(&link).map_err(|e| {
                error!("{}", e);
                e
            })?;
            let mut ledger = Ledger::open(&config.paths.ledger)?;
            if !ledger.mark_applied(&link, &title, &company, &notes)? {
                info!("{} was already recorded", link);
            }
            Ok(())
        }
        Command::Report { out } => {
            let ledger = Ledger::open(&config.paths.ledger)?;
            ledger.export_report(out.as_deref().unwrap_or(&config.paths.report))?;
            Ok(())
        }
        Command::Status => {
            let ledger = Ledger::open(&config.paths.ledger)?;
            info!("{} applications recorded in {}", ledger.count(), ledger.path().display());
            Ok(())
        }
    }
}

fn run(config: &AppConfig, args: &RunArgs) -> Result<(), Box<dyn Error>> {
    let stop = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        if handler_flag.swap(true, Ordering::SeqCst) {
            // Second Ctrl-C: ledger and checkpoints are written by rename, so exiting is safe.
            std::process::exit(130);
        }
        warn!("Stop requested; finishing the current step (Ctrl-C again to quit now)");
    })?;

    info!("Starting job agent...");
    let timeout = config.site.load_timeout();
    match args.renderer.unwrap_or(config.site.renderer) {
        Renderer::Chrome => {
            let browser = ChromeBrowser::new(timeout).wait_for(config.site.card_selector.as_str());
            run_with(config, args, &browser, stop)
        }
        Renderer::Http => run_with(config, args, &HttpBrowser::new(timeout), stop),
    }
}

fn run_with<B: Browser>(
    config: &AppConfig,
    args: &RunArgs,
    browser: &B,
    stop: Arc<AtomicBool>,
) -> Result<(), Box<dyn Error>> {
    let writer = OllamaWriter::new(&config.llm)?;
    let ledger = Ledger::open(&config.paths.ledger)?;

    let mut pipeline = Pipeline::new(config, browser, &writer, ledger)?.with_stop_flag(Arc::clone(&stop));
    let report = pipeline.run(&args.options()).map_err(|e| {
        error!("Pipeline failed: {}", e);
        e
    })?;
    report.log_summary();

    if args.review && !stop.load(Ordering::SeqCst) && !pipeline.results().is_empty() {
        let (mut ledger, results) = pipeline.into_parts();
        let stdin = io::stdin();
        let summary = review::confirm_applications(&results, &mut ledger, stdin.lock(), io::stdout())?;
        info!(
            "Review finished: {} marked, {} already applied, {} declined, {} skipped",
            summary.marked, summary.already, summary.declined, summary.skipped
        );
    } else if !pipeline.results().is_empty() {
        info!("Once applied, record it with: job_agent mark <link> --title <title> --company <company>");
    }
    Ok(())
}
