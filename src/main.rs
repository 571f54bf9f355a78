//! layered-prefs
//!
//! Command-line front end for inspecting and editing layered preferences.

use anyhow::{Result, bail};
use clap::Parser;
use layered_prefs::cli::edit::{SetArgs, UnsetArgs};
use layered_prefs::cli::query::{DumpArgs, EvalArgs, GetArgs};
use layered_prefs::cli::{Cli, Command};
use layered_prefs::config::SettingsLoader;
use layered_prefs::error::{ErrorCode, PrefsError};
use layered_prefs::overrides::{DEFAULT_PREFIX, StartupArgs};
use layered_prefs::remote::{FetchHooks, RequestOptions, RetryDecision, RetryPolicy};
use layered_prefs::source::{Source, SourceKind};
use layered_prefs::PrefsContext;
use std::fs::OpenOptions;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Fetch hooks for the CLI: the configured retry policy plus progress logs.
struct ReportingHooks {
    policy: RetryPolicy,
}

impl FetchHooks for ReportingHooks {
    fn on_started(&mut self, uri: &str) {
        info!(uri = %uri, max_attempts = self.policy.max_attempts, "Fetching remote preferences");
    }

    fn on_request(&mut self, attempt: u32, options: &mut RequestOptions) {
        self.policy.on_request(attempt, options);
    }

    fn on_retry(&mut self, attempt: u32, error: &PrefsError) -> RetryDecision {
        let decision = self.policy.on_retry(attempt, error);
        if decision.retry {
            let delay_ms = decision.delay.map(|d| d.as_millis() as u64).unwrap_or(0);
            warn!(attempt, delay_ms, error = %error, "Retrying remote fetch");
        }
        decision
    }

    fn on_failed(&mut self, error: &PrefsError) {
        error!(error = %error, "Remote fetch failed");
    }
}

fn init_logging(cli: &Cli) -> Result<()> {
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    match cli.log.as_str() {
        "0" | "off" => {
            // No logging
        }
        "1" | "stdout" => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stdout)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        "2" | "stderr" => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        filename => {
            // Log to file (append mode)
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(filename)?;
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(file)
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Override tokens use the reserved prefix, which may come from the
    // environment; split them off so clap never sees them.
    let prefix = std::env::var("LAYERED_PREFS_PREFIX")
        .ok()
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| DEFAULT_PREFIX.to_string());
    let (startup_args, argv) = StartupArgs::partition(std::env::args().collect(), &prefix);
    let cli = Cli::parse_from(argv);

    init_logging(&cli)?;

    // SAFETY: This is safe at program startup before any other threads are spawned
    if let Some(settings_path) = &cli.settings {
        unsafe {
            std::env::set_var("LAYERED_PREFS_SETTINGS_PATH", settings_path);
        }
    }
    let loader = SettingsLoader::load()?;
    for (tier, path) in loader.loaded_files() {
        debug!(tier = %tier, path = %path.display(), "Loaded settings");
    }

    let mut settings = loader.into_settings();
    if let Some(mode) = cli.mode {
        settings.mode = mode.into();
    }
    if cli.insecure {
        settings.insecure = true;
    }
    if settings.prefix != prefix {
        warn!(
            configured = %settings.prefix,
            argv_prefix = %prefix,
            "Settings prefix differs from LAYERED_PREFS_PREFIX; overrides were split with the latter"
        );
    }

    let layers = cli.layers();
    let mut ctx = PrefsContext::new(settings, &startup_args);
    debug!(mode = %ctx.mode(), overrides = ctx.overrides().entries().len(), "Context ready");

    let reads_remote = layers.contains(&SourceKind::Remote)
        && matches!(
            cli.command,
            Command::Get(_) | Command::Eval(_) | Command::Dump(_) | Command::Status
        );
    if reads_remote && !ctx.remote().location().is_empty() {
        // Best effort: resolution falls through to the other layers
        let mut hooks = reporting_hooks(&ctx);
        if let Err(e) = ctx.fetch_remote(&mut hooks).await {
            warn!(error = %e, "Continuing without remote preferences");
        }
    }

    match cli.command {
        Command::Get(args) => run_get(&ctx, &layers, &args)?,
        Command::Set(args) => run_set(&mut ctx, &args)?,
        Command::Unset(args) => run_unset(&mut ctx, &args)?,
        Command::Eval(args) => run_eval(&ctx, &layers, &args),
        Command::Dump(args) => run_dump(&ctx, &layers, &args)?,
        Command::Status => {
            let _ = ctx.sources(&layers);
            println!("{}", serde_json::to_string_pretty(&ctx.status())?);
        }
        Command::Fetch => run_fetch(&mut ctx).await?,
    }

    Ok(())
}

fn reporting_hooks(ctx: &PrefsContext) -> ReportingHooks {
    ReportingHooks {
        policy: RetryPolicy::from_settings(&ctx.settings().remote),
    }
}

fn run_get(ctx: &PrefsContext, layers: &[SourceKind], args: &GetArgs) -> Result<()> {
    let sources = ctx.sources(layers);
    let value = ctx
        .resolver()
        .source_of(args.root_key(), &sources)
        .and_then(|source| source.lookup(&args.key));

    match (value, &args.default) {
        (Some(value), _) => println!("{}", args.render(value)),
        (None, Some(default)) => println!("{}", default),
        (None, None) => bail!("Key not found: {}", args.key),
    }
    Ok(())
}

/// Refuse to write over content that failed to load for a reason other
/// than the file not existing yet.
fn ensure_safe_to_write(source: &Source) -> Result<()> {
    if let Some(err) = source.error()
        && err.code != ErrorCode::FileNotFound
    {
        bail!(
            "Refusing to modify {} preferences that failed to load: {}",
            source.kind(),
            err
        );
    }
    if !source.is_writable() {
        bail!("{} preferences are read-only in this mode", source.kind());
    }
    Ok(())
}

fn run_set(ctx: &mut PrefsContext, args: &SetArgs) -> Result<()> {
    let value = args.parsed_value()?;
    let save = ctx.settings().save;
    let source = ctx.source_mut(args.source.into());
    ensure_safe_to_write(source)?;

    if !source.set_path(&args.key, value) {
        println!("{} unchanged", args.key);
        return Ok(());
    }
    source.try_save(save.pretty, save.sort)?;
    println!("{} saved to {}", args.key, source.location());
    Ok(())
}

fn run_unset(ctx: &mut PrefsContext, args: &UnsetArgs) -> Result<()> {
    let save = ctx.settings().save;
    let source = ctx.source_mut(args.source.into());
    ensure_safe_to_write(source)?;

    if !source.unset(&args.key) {
        println!("{} not present", args.key);
        return Ok(());
    }
    source.try_save(save.pretty, save.sort)?;
    println!("{} removed from {}", args.key, source.location());
    Ok(())
}

fn run_eval(ctx: &PrefsContext, layers: &[SourceKind], args: &EvalArgs) {
    println!("{}", ctx.eval(&args.text, layers));
}

fn run_dump(ctx: &PrefsContext, layers: &[SourceKind], args: &DumpArgs) -> Result<()> {
    let mut doc = match args.source {
        Some(source) => ctx.source(source.into()).document().clone(),
        None => ctx.resolver().effective(&ctx.sources(layers)),
    };
    args.transform(&mut doc);
    println!("{}", doc.encode(!args.compact, !args.unsorted)?);
    Ok(())
}

async fn run_fetch(ctx: &mut PrefsContext) -> Result<()> {
    let mut hooks = reporting_hooks(ctx);
    ctx.fetch_remote(&mut hooks).await?;
    let remote = ctx.remote();
    println!(
        "Fetched {} key(s) from {}",
        remote.document().len(),
        remote.location()
    );
    Ok(())
}
