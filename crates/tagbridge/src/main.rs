mod cli;
mod error;

use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tagbridge_config::{
    Config, DriverKind, IndicatorSettings, Settings, SinkKind, SinkSettings, load_config,
};
use tagbridge_core::{
    AnyDriver, AnyIndicator, AnySink, Bridge, CommandIndicator, GatewayDriver, LogIndicator,
    LogSink, RestSink, ScanLink, SimulatedDriver,
};

use crate::cli::{CheckConfigArgs, Cli, Command, GlobalOpts, LogFormat};
use crate::error::AppError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose, cli.global.log_format);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8, format: LogFormat) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let config = load_effective_config(&cli.global)?;

    match cli.command.unwrap_or(Command::Run) {
        Command::CheckConfig(args) => check_config(&config, &args),
        Command::Run => run_bridge(&config).await,
    }
}

/// Load file + env configuration and apply the CLI overrides.
fn load_effective_config(global: &GlobalOpts) -> Result<Config, AppError> {
    let mut config = load_config(global.config.as_deref())?;
    if global.dry_run {
        config.sink.kind = SinkKind::Log;
    }
    if global.simulate {
        config.controller.driver = DriverKind::Simulated;
    }
    Ok(config)
}

// ── check-config ─────────────────────────────────────────────────────

fn check_config(config: &Config, args: &CheckConfigArgs) -> Result<(), AppError> {
    let settings = config.resolve()?;

    if args.print {
        print!("{}", config.to_redacted_toml()?);
        return Ok(());
    }

    let bridge = &settings.bridge;
    println!("controller   {} (slot {})", bridge.address, bridge.slot);
    println!("driver       {:?}", settings.driver);
    println!("scan         {:?}", bridge.scan_interval);
    println!(
        "retry        {} attempts, first delay {:?}",
        bridge.retry.max_attempts, bridge.retry.initial_delay
    );
    println!("sweep        every {:?}", bridge.sweep_interval);
    match &settings.sink {
        SinkSettings::Rest { url, table, .. } => println!("sink         {url} table {table}"),
        SinkSettings::Log => println!("sink         log (dry run)"),
    }
    println!();
    println!("{} tags:", settings.catalog.len());
    for tag in &settings.catalog {
        println!("  {:<12} {}", tag.name(), tag.display_name());
    }
    Ok(())
}

// ── run ──────────────────────────────────────────────────────────────

async fn run_bridge(config: &Config) -> Result<(), AppError> {
    let Settings {
        bridge: bridge_config,
        catalog,
        driver,
        transport,
        sink,
        indicator,
    } = config.resolve()?;

    let sink = match sink {
        SinkSettings::Rest {
            url,
            table,
            api_key,
        } => AnySink::Rest(RestSink::new(&url, &table, &api_key, &transport)?),
        SinkSettings::Log => AnySink::Log(LogSink),
    };
    let indicator = match indicator {
        IndicatorSettings::Log => AnyIndicator::Log(LogIndicator),
        IndicatorSettings::Command { program, args } => {
            AnyIndicator::Command(CommandIndicator::new(program, args))
        }
    };
    let driver = match driver {
        DriverKind::Gateway => AnyDriver::Gateway(GatewayDriver::new(transport)),
        DriverKind::Simulated => AnyDriver::Simulated(SimulatedDriver::new()),
    };

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone())?;

    info!(
        address = %bridge_config.address,
        slot = bridge_config.slot,
        tags = catalog.len(),
        "starting tagbridge"
    );

    let (link, events) = ScanLink::new(driver, bridge_config.scan_interval);
    let bridge = Bridge::new(Arc::new(link), catalog, sink, indicator, bridge_config)?;
    bridge.run(events, shutdown).await?;

    info!("tagbridge stopped");
    Ok(())
}

/// Cancel `shutdown` on Ctrl-C or SIGTERM.
fn spawn_signal_handler(shutdown: CancellationToken) -> Result<(), AppError> {
    #[cfg(unix)]
    let mut term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::spawn(async move {
        #[cfg(unix)]
        let terminated = term.recv();
        #[cfg(not(unix))]
        let terminated = std::future::pending::<Option<()>>();

        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                if let Err(e) = res {
                    warn!(error = %e, "cannot listen for Ctrl-C");
                    return;
                }
                info!("interrupt received, shutting down");
            }
            _ = terminated => info!("SIGTERM received, shutting down"),
        }
        shutdown.cancel();
    });
    Ok(())
}
