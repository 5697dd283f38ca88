mod cli;

use std::future::Future;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use ngb_protocol::{start, BotConfig, SessionFactory, Transport};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: cli::Cli) -> anyhow::Result<()> {
    let config = cli.into_config().context("invalid configuration")?;
    tracing::info!("ngb-bot v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("state file: {}", config.state_path.display());
    run_backend(config).await
}

#[cfg(feature = "toxcore")]
async fn run_backend(config: BotConfig) -> anyhow::Result<()> {
    let factory = ngb_protocol::toxcore::ToxFactory::default();
    serve(&factory, &config, shutdown_signal()).await
}

#[cfg(not(feature = "toxcore"))]
async fn run_backend(_config: BotConfig) -> anyhow::Result<()> {
    Err(ngb_protocol::NgbError::NoBackend.into())
}

/// Start a session, print our address, and relay until `shutdown`.
#[cfg_attr(not(feature = "toxcore"), allow(dead_code))]
async fn serve<F, S>(factory: &F, config: &BotConfig, shutdown: S) -> anyhow::Result<()>
where
    F: SessionFactory,
    S: Future<Output = ()>,
{
    let runtime = start(factory, config).context("startup failed")?;
    println!("{}", runtime.transport().address());
    runtime.run(shutdown).await.context("relay loop stopped")?;
    Ok(())
}

/// Resolve on ctrl-c or, on unix, SIGTERM.
#[cfg_attr(not(feature = "toxcore"), allow(dead_code))]
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("can't listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("can't listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let which = first_signal(ctrl_c, terminate).await;
    tracing::info!("{which} received");
}

/// Wait for whichever stop signal comes first and name it.
#[cfg_attr(not(feature = "toxcore"), allow(dead_code))]
async fn first_signal<C, T>(ctrl_c: C, terminate: T) -> &'static str
where
    C: Future<Output = ()>,
    T: Future<Output = ()>,
{
    tokio::select! {
        () = ctrl_c => "ctrl-c",
        () = terminate => "SIGTERM",
    }
}
