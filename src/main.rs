//! Tagwalk main entry point
//!
//! This is the command-line interface for the Tagwalk tag auditor.

use anyhow::Context;
use chrono::Local;
use clap::Parser;
use reqwest::Url;
use std::path::PathBuf;
use std::sync::Arc;
use tagwalk::browser::{build_http_client, CookieJar, HttpBrowser};
use tagwalk::config::{load_config_with_hash, Config};
use tagwalk::crawler::{Collaborators, Coordinator, RunEvent};
use tagwalk::output::{print_statistics, write_report, SITE_TAG_REPORT, TAG_REPORT};
use tagwalk::tags::{FloodlightIdResolver, HttpFloodlightResolver};
use tagwalk::url::{construct_url, scrub_url, UrlPatternSet};
use tracing_subscriber::EnvFilter;

/// Tagwalk: a single-site tag auditor
///
/// Tagwalk walks one web site, classifies the advertising and analytics
/// calls each page makes, and writes a per-page tag report. Optionally it
/// verifies global site tag containers against first-party click cookies.
#[derive(Parser, Debug)]
#[command(name = "tagwalk")]
#[command(version)]
#[command(about = "A single-site tag auditor", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be audited without crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    handle_run(config).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("tagwalk=info,warn"),
            1 => EnvFilter::new("tagwalk=debug,info"),
            2 => EnvFilter::new("tagwalk=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the run the configuration describes
fn handle_dry_run(config: &Config) {
    println!("=== Tagwalk Dry Run ===\n");

    println!("Crawl:");
    println!("  Domain: {}", config.domain());
    println!("  Mode: {}", if config.crawler.manual { "passive" } else { "active" });
    println!("  Settle time: {}ms", config.crawler.settle_time);
    if config.discovery_enabled() {
        let start = construct_url(
            &scrub_url(&config.crawler.start_url),
            true,
            config.site_tag.click_id.as_deref().unwrap_or("<generated>"),
            &config.site_tag.click_source,
            &config.crawler.url_suffix,
        );
        println!("  Start: {}", start);
    } else {
        println!("  Pages ({}):", config.crawler.urls.len());
        for url in &config.crawler.urls {
            println!("    * {}", url);
        }
    }
    for pattern in &config.crawler.exclude {
        println!("  Exclude: {}", pattern);
    }

    println!("\nTags:");
    println!("  Record key: {:?}", config.tags.record_key);
    println!("  Show empty pages: {}", config.tags.show_empty_pages);
    if !config.tags.floodlight_config_ids.is_empty() {
        println!(
            "  Floodlight configs: {}",
            config.tags.floodlight_config_ids.join(", ")
        );
    }
    match &config.tags.profile_id {
        Some(profile) => println!("  Floodlight ID lookups via profile {}", profile),
        None => println!("  Floodlight ID lookups disabled"),
    }

    println!("\nSite tag verification: {}", config.site_tag.enabled);
    println!("\nOutput: {}", config.output.directory.display());
    println!("\n✓ Configuration is valid");
}

/// Handles the main run: wires the HTTP browser to a coordinator, runs it
/// until done or Ctrl-C, and writes the reports
async fn handle_run(config: Config) -> anyhow::Result<()> {
    let jar = Arc::new(CookieJar::new());
    let client = build_http_client(&config.crawler.user_agent, &jar)?;

    let mut observed = match &config.tags.monitor {
        Some(patterns) => UrlPatternSet::parse_all(patterns.as_slice())?,
        None => UrlPatternSet::monitored()?,
    };
    observed.extend(UrlPatternSet::site_tag()?);

    let (browser, events) = HttpBrowser::new(client.clone(), Arc::clone(&jar), observed);

    let resolver: Option<Arc<dyn FloodlightIdResolver>> = match &config.tags.profile_id {
        Some(_) => {
            let api_base = Url::parse(&config.enrichment.api_base)?;
            Some(Arc::new(HttpFloodlightResolver::new(
                client,
                api_base,
                config.enrichment.access_token.clone(),
            )))
        }
        None => None,
    };

    let (sink, mut run_events) = tokio::sync::mpsc::unbounded_channel();
    let coordinator = Coordinator::new(
        &config,
        Collaborators {
            browser: Arc::new(browser),
            cookies: jar,
            events,
            resolver,
        },
    )?
    .with_event_sink(sink);

    let handle = coordinator.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, finishing run");
            handle.stop();
        }
    });

    let printer = tokio::spawn(async move {
        while let Some(event) = run_events.recv().await {
            log_event(&event);
        }
    });

    let report = coordinator.run().await;
    let _ = printer.await;

    let at = Local::now();
    let domain = config.domain();
    write_report(
        &config.output.directory,
        &domain,
        TAG_REPORT,
        &at,
        &report.tag_report()?,
    )?;
    if let Some(site_tags) = report.site_tag_report() {
        write_report(
            &config.output.directory,
            &domain,
            SITE_TAG_REPORT,
            &at,
            &site_tags?,
        )?;
    }

    print_statistics(&report.statistics);
    Ok(())
}

fn log_event(event: &RunEvent) {
    match event {
        RunEvent::TagRecordAdded(record) => match record.kind {
            Some(kind) => tracing::info!(
                "{} tag {} on {}",
                kind,
                record.fields.advertiser.as_deref().unwrap_or("?"),
                record.page
            ),
            None => tracing::info!("No tags on {}", record.page),
        },
        RunEvent::TagRecordUpdated(record) => tracing::info!(
            "Floodlight ID {} resolved on {}",
            record.floodlight_id.as_deref().unwrap_or("?"),
            record.page
        ),
        RunEvent::SiteTagUpdated(entry) => tracing::info!(
            "Site tags on {}: [{}] cookies [{}]",
            entry.page,
            entry.tags.join(", "),
            entry.cookies.join(", ")
        ),
        RunEvent::StatisticsUpdated(stats) => tracing::debug!(
            "{} found, {} visited, {} tags",
            stats.pages_found,
            stats.pages_visited,
            stats.tags_found
        ),
    }
}
