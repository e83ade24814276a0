//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use docsagent_sections::{SectionExtractor, SectionLimits, SectionLocator, SectionOutcome};
use docsagent_shared::{
    AppConfig, DocumentFetcher, HttpFetcher, UrlScope, init_config, load_config, load_config_from,
};
use docsagent_sitemap::{ResolveOptions, SitemapResolver};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// docsagent — scoped sitemap and section retrieval for a documentation site.
#[derive(Parser)]
#[command(
    name = "docsagent",
    version,
    about = "Resolve a documentation sitemap and extract citable page sections.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file to use instead of ~/.docsagent/docsagent.toml.
    #[arg(long, global = true, env = "DOCSAGENT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// List in-scope pages from the documentation sitemap.
    Sitemap {
        /// Sitemap or sitemap index URL (defaults to sitemap.root_url).
        #[arg(long)]
        root: Option<String>,

        /// Keep only pages whose URL contains one of these substrings.
        #[arg(long)]
        include: Vec<String>,

        /// Drop pages whose URL contains any of these substrings.
        #[arg(long)]
        exclude: Vec<String>,

        /// Return at most this many pages.
        #[arg(long)]
        limit: Option<usize>,

        /// Print JSON instead of one URL per line.
        #[arg(long)]
        json: bool,
    },

    /// Extract the section under a heading of a documentation page.
    Section {
        /// Page URL (must be in scope).
        url: String,

        /// Heading identifier (the `id` or nested anchor).
        #[arg(long)]
        anchor: Option<String>,

        /// Heading text, matched case-insensitively.
        #[arg(long)]
        heading: Option<String>,

        /// Markup budget in characters (clamped to sections.max_size_limit).
        #[arg(long)]
        max_chars: Option<usize>,

        /// Print JSON instead of plain text.
        #[arg(long)]
        json: bool,
    },

    /// List the headings of a documentation page.
    Outline {
        /// Page URL (must be in scope).
        url: String,

        /// Print JSON instead of an indented list.
        #[arg(long)]
        json: bool,
    },

    /// Check whether a URL falls inside the configured scope.
    Scope {
        /// URL to check.
        url: String,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "docsagent=info",
        1 => "docsagent=debug",
        _ => "docsagent=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    match cli.command {
        Command::Sitemap {
            root,
            include,
            exclude,
            limit,
            json,
        } => {
            let opts = ResolveOptions {
                include,
                exclude,
                limit,
            };
            cmd_sitemap(&config, root.as_deref(), &opts, json).await
        }
        Command::Section {
            url,
            anchor,
            heading,
            max_chars,
            json,
        } => {
            let locator = SectionLocator {
                anchor_id: anchor,
                heading_text: heading,
            };
            cmd_section(&config, &url, &locator, max_chars, json).await
        }
        Command::Outline { url, json } => cmd_outline(&config, &url, json).await,
        Command::Scope { url } => cmd_scope(&config, &url),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&config),
        },
    }
}

fn build_fetcher(config: &AppConfig) -> Result<Arc<dyn DocumentFetcher>> {
    Ok(Arc::new(HttpFetcher::new(&config.fetch)?))
}

/// Page fetches only follow redirects that stay inside the configured scope.
fn build_extractor(config: &AppConfig) -> Result<SectionExtractor> {
    let scope = UrlScope::from(&config.scope);
    let fetcher = HttpFetcher::scoped(&config.fetch, scope.clone())?;
    Ok(SectionExtractor::new(
        Arc::new(fetcher),
        scope,
        SectionLimits::from(&config.sections),
    ))
}

// ---------------------------------------------------------------------------
// Progress spinner
// ---------------------------------------------------------------------------

/// Spinner on stderr while a network call is pending.
fn spinner(message: impl Into<String>) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.set_message(message.into());
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_sitemap(
    config: &AppConfig,
    root: Option<&str>,
    opts: &ResolveOptions,
    json: bool,
) -> Result<()> {
    let root_url = root.unwrap_or(&config.sitemap.root_url);

    let mut resolver = SitemapResolver::new(build_fetcher(config)?, UrlScope::from(&config.scope));
    if let Some(limit) = config.sitemap.max_concurrent_fetches {
        resolver = resolver.with_max_concurrent_fetches(limit);
    }

    info!(
        root_url,
        include = opts.include.len(),
        exclude = opts.exclude.len(),
        "resolving sitemap"
    );

    let progress = spinner(format!("Resolving {root_url}"));
    let result = resolver.resolve(root_url, opts).await;
    progress.finish_and_clear();
    let entries = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for entry in &entries {
        match &entry.last_modified {
            Some(lastmod) => println!("{}\t{lastmod}", entry.location),
            None => println!("{}", entry.location),
        }
    }
    eprintln!("{} page(s)", entries.len());

    Ok(())
}

async fn cmd_section(
    config: &AppConfig,
    url: &str,
    locator: &SectionLocator,
    max_chars: Option<usize>,
    json: bool,
) -> Result<()> {
    if locator.is_empty() {
        return Err(eyre!("pass --anchor and/or --heading to locate a section"));
    }

    let extractor = build_extractor(config)?;

    let progress = spinner(format!("Fetching {url}"));
    let result = extractor.extract_section(url, locator, max_chars).await;
    progress.finish_and_clear();
    let outcome = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    match outcome {
        SectionOutcome::Found(section) => {
            let anchor = section
                .resolved_anchor_id
                .as_deref()
                .map(|id| format!("#{id}"))
                .unwrap_or_default();
            println!("{} {}", "#".repeat(section.heading_level as usize), section.heading_text);
            println!("Source: {}{anchor}", section.source_url);
            println!();
            println!("{}", section.plain_text);
            if section.truncated {
                println!();
                println!("[truncated at {} characters of markup]", section.raw_markup.chars().count());
            }
        }
        SectionOutcome::NotFound { source_url, reason } => {
            println!("Section not found on {source_url}: {reason}");
        }
    }

    Ok(())
}

async fn cmd_outline(config: &AppConfig, url: &str, json: bool) -> Result<()> {
    let extractor = build_extractor(config)?;

    let progress = spinner(format!("Fetching {url}"));
    let result = extractor.outline(url).await;
    progress.finish_and_clear();
    let headings = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&headings)?);
        return Ok(());
    }

    for heading in &headings {
        let indent = "  ".repeat(heading.level.saturating_sub(1) as usize);
        match &heading.id {
            Some(id) => println!("{indent}{} (#{id})", heading.text),
            None => println!("{indent}{}", heading.text),
        }
    }

    Ok(())
}

fn cmd_scope(config: &AppConfig, url: &str) -> Result<()> {
    let scope = UrlScope::from(&config.scope);
    let verdict = if scope.is_in_scope(url) { "in scope" } else { "out of scope" };
    println!("{url}: {verdict} ({}{})", scope.domain(), scope.path());
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}
