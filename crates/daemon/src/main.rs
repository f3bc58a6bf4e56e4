// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! dmd entry point: wire up the Redis-backed cache and broker, the
//! scheduler adapter, and the worker pool controllers, then reconcile on
//! a timer until told to stop.

use std::sync::Arc;
use std::time::Duration;

use dm_cache::{KeyStore, RedisStore};
use dm_cluster::manager_for;
use dm_core::{DaemonSettings, SystemClock, WorkerClass};
use dm_daemon::args::USAGE;
use dm_daemon::{
    Args, BrokerCheck, CacheCheck, ClusterCheck, ConfigWatcher, HealthRegistry,
};
use dm_remote::{ShellExecutor, TokioExecutor};
use dm_tasks::{MessageBroker, RedisBroker};
use dm_workers::{PoolController, SingularityLauncher, TickOutcome, WorkerSpawner};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = match Args::parse(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(error) => {
            eprintln!("error: {error}");
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    };

    let (mut watcher, _shared) = ConfigWatcher::load(args.config.clone(), args.secrets.clone())?;
    let settings = watcher.current();

    let _log_guard = setup_logging(&settings.daemon)?;
    info!(config = %args.config.display(), "starting dmd");

    let store: Arc<dyn KeyStore> =
        Arc::new(RedisStore::connect(&settings.cache.redis_url).await?);
    let broker: Arc<dyn MessageBroker> =
        Arc::new(RedisBroker::connect(&settings.cache.redis_url, SystemClock).await?);
    let executor: Arc<dyn ShellExecutor> = Arc::new(TokioExecutor);
    let manager = manager_for(
        settings.cluster.workload_manager,
        Arc::clone(&executor),
        settings.cluster.clone(),
    );
    let spawner: Arc<dyn WorkerSpawner> = Arc::new(SingularityLauncher::new(
        Arc::clone(&manager),
        executor,
        settings.cluster.clone(),
        args.config.clone(),
        args.secrets.clone(),
    ));

    let mut registry = HealthRegistry::new();
    registry.register(Arc::new(CacheCheck::new(Arc::clone(&store))));
    registry.register(Arc::new(BrokerCheck::new(Arc::clone(&broker))));
    registry.register(Arc::new(ClusterCheck::new(
        Arc::clone(&manager),
        settings.cluster.job_prefix.clone(),
    )));
    let reports = registry.run_all().await;
    if reports.iter().all(|report| report.healthy) {
        info!("all health checks passed");
    }

    let mut tick =
        tokio::time::interval(Duration::from_secs(settings.daemon.tick_interval_secs));
    let mut reload =
        tokio::time::interval(Duration::from_secs(settings.daemon.config_reload_secs));
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!("dmd ready");
    loop {
        tokio::select! {
            _ = tick.tick() => {
                // Settings are re-read each tick so a reload takes effect
                // at the next tick boundary.
                let current = watcher.current();
                let controller = PoolController::new(
                    Arc::clone(&manager),
                    Arc::clone(&broker),
                    Arc::clone(&store),
                    Arc::clone(&spawner),
                    current.workers.clone(),
                    current.cluster.job_prefix.clone(),
                    SystemClock,
                );
                for class in [WorkerClass::Datamover, WorkerClass::Vm] {
                    match controller.reconcile(class).await {
                        Ok(TickOutcome::Skipped) => {}
                        Ok(TickOutcome::Completed(report)) => {
                            info!(
                                %class,
                                spawned = ?report.spawned,
                                killed_duplicates = report.killed_duplicates.len(),
                                shutdown = ?report.shutdown,
                                "reconciled",
                            );
                        }
                        Err(error) => error!(%class, %error, "reconciliation failed"),
                    }
                }
            }
            _ = reload.tick() => {
                watcher.poll_once();
            }
            _ = sigterm.recv() => {
                info!("SIGTERM received; stopping");
                break;
            }
            _ = sigint.recv() => {
                info!("interrupt received; stopping");
                break;
            }
        }
    }
    info!("dmd stopped");
    Ok(())
}

fn setup_logging(
    settings: &DaemonSettings,
) -> Result<tracing_appender::non_blocking::WorkerGuard, std::io::Error> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    std::fs::create_dir_all(&settings.log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&settings.log_dir, "dmd.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
