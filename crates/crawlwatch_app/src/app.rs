use anyhow::{bail, Context};
use crawlwatch_core::{BatchAction, InvalidationPlan, Msg};
use crawlwatch_engine::{AuthStatus, SessionContext, StreamEvent, SyncEngine};
use crawlwatch_logging::{cw_info, cw_warn};
use tokio::sync::broadcast::error::RecvError;

use crate::cli::{ActionArgs, Cli, Command, ListingArgs};
use crate::config::{AppConfig, ConfigSource};
use crate::dashboard::Dashboard;
use crate::render;

pub const TOKEN_ENV: &str = "CRAWLWATCH_TOKEN";

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let (config, source) = AppConfig::load(&cli.config)?;
    crawlwatch_logging::init(&config.log_settings());
    match source {
        ConfigSource::File => cw_info!("Loaded config from {:?}", cli.config),
        ConfigSource::Defaults => cw_info!("No config at {:?}; using defaults", cli.config),
    }

    let session = match std::env::var(TOKEN_ENV) {
        Ok(token) if !token.trim().is_empty() => SessionContext::with_token(token),
        _ => {
            cw_warn!("{} is not set; requests carry no credentials", TOKEN_ENV);
            SessionContext::new()
        }
    };
    let engine = SyncEngine::new(config.engine_config(), session)
        .context("could not set up the backend client")?;

    match cli.command {
        Command::List(args) => list(engine, &config, &args).await,
        Command::Watch(args) => watch(engine, &config, &args).await,
        Command::Start(args) => run_action(engine, &config, BatchAction::Start, &args).await,
        Command::Stop(args) => run_action(engine, &config, BatchAction::Stop, &args).await,
        Command::Delete(args) => run_action(engine, &config, BatchAction::Delete, &args).await,
        Command::Add { url } => {
            let sent = engine.commands().create_target(&url).await?;
            println!("Added {sent}");
            Ok(())
        }
    }
}

async fn list(engine: SyncEngine, config: &AppConfig, args: &ListingArgs) -> anyhow::Result<()> {
    let mut dashboard = Dashboard::new(engine, args.apply(config.initial_filter()));
    dashboard.reload().await?;
    if let Some(text) = dashboard.render(None) {
        print!("{text}");
    }
    Ok(())
}

async fn run_action(
    engine: SyncEngine,
    config: &AppConfig,
    action: BatchAction,
    args: &ActionArgs,
) -> anyhow::Result<()> {
    if args.visible {
        let mut dashboard = Dashboard::new(engine, args.listing.apply(config.initial_filter()));
        dashboard.reload().await?;
        dashboard.dispatch(Msg::SelectAllToggled(true)).await?;
        let reports = dashboard.dispatch(Msg::BatchRequested(action)).await?;
        if reports.is_empty() {
            println!("No targets on this page.");
        }
        return report_batches(&reports);
    }

    let ids = args.target_ids();
    if let [target_id] = ids.as_slice() {
        let commands = engine.commands();
        match action {
            BatchAction::Start => commands.start_crawl(target_id).await?,
            BatchAction::Stop => commands.stop_crawl(target_id).await?,
            BatchAction::Delete => commands.delete_target(target_id).await?,
        }
        println!("{action} {target_id}: ok");
        return Ok(());
    }

    let result = engine.run_batch(action, &ids).await;
    report_batches(&[result])
}

fn report_batches(reports: &[crawlwatch_core::BatchOperationResult]) -> anyhow::Result<()> {
    let mut failed = 0;
    for result in reports {
        print!("{}", render::render_batch(result));
        failed += result.failed_count;
    }
    if failed > 0 {
        bail!("{failed} target(s) failed");
    }
    Ok(())
}

/// Keeps the push channel open and reprints the page after every change
/// notification until Ctrl-C or until the backend rejects the session.
async fn watch(engine: SyncEngine, config: &AppConfig, args: &ListingArgs) -> anyhow::Result<()> {
    let mut dashboard = Dashboard::new(engine, args.apply(config.initial_filter()));
    let mut events = dashboard.engine().subscribe();
    let mut auth = dashboard.engine().session().subscribe();
    dashboard.engine().start_live_updates();

    refresh(&mut dashboard).await;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = auth.changed() => {
                if changed.is_err() || *auth.borrow() == AuthStatus::Expired {
                    eprintln!("Session rejected by the server; sign in again.");
                    break;
                }
            }
            event = events.recv() => match event {
                Ok(StreamEvent::Notification(notification)) => {
                    if !InvalidationPlan::for_notification(&notification).is_empty() {
                        refresh(&mut dashboard).await;
                    }
                }
                Ok(StreamEvent::StateChanged(state)) => {
                    println!("-- {}", render::connection_label(state));
                }
                Err(RecvError::Lagged(skipped)) => {
                    cw_warn!("missed {} push events; reloading", skipped);
                    refresh(&mut dashboard).await;
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    dashboard.engine().end_session();
    cw_info!("watch finished");
    Ok(())
}

async fn refresh(dashboard: &mut Dashboard) {
    if let Err(err) = dashboard.reload().await {
        cw_warn!("listing reload failed: {}", err);
    }
    let connection = dashboard.engine().connection_state();
    if let Some(text) = dashboard.render(Some(connection)) {
        print!("{text}");
    }
}
