//! warden: matches runtime-security alerts against response rules and runs
//! the resulting actions once per dedup window across all replicas.
//!
//! # Usage
//!
//! ```bash
//! warden --config config.yaml --rules rules.yaml --rules extra-rules.yaml
//!
//! # Via environment variables
//! WARDEN_LISTEN_PORT=2803 WARDEN_DEDUPLICATION_LEADER_ELECTION=true warden
//! ```

mod api;
mod cli;
mod consumer;
mod metrics;
mod pipeline;
mod router;
mod state;
#[cfg(test)]
mod testing;

use std::net::{IpAddr, UdpSocket};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use warden_actionners::{ActionnerRegistry, Dispatcher};
use warden_bus::{
    spawn_retargeter, BrokerConfig, EventBroker, LeaseWatcher, RetargetablePublisher, RoutingState,
    Transport, ZmqSubscriber,
};
use warden_core::{ClusterClient, Config, KubeClient, LogFormat};
use warden_notify::{build_sinks, SinkFanout, DEFAULT_CAPACITY, DEFAULT_SINK_TIMEOUT};
use warden_rules::{Reloader, RuleSet, RuleStore, RuleWatcher, RELOAD_COOLDOWN};

use crate::cli::Cli;
use crate::consumer::Consumer;
use crate::metrics::PipelineMetrics;
use crate::state::AppState;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Json => tracing_subscriber::fmt().with_env_filter(filter).json().init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init(),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.validate()?;
    Ok(config)
}

/// Outbound address of this host, found by routing a UDP socket (no packet is sent).
fn detect_local_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    socket.local_addr().ok().map(|addr| addr.ip())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_tracing(config.log_format);
    config.log_summary();

    let grace = Duration::from_secs(cli.shutdown_grace);
    let started = Instant::now();

    // ── Actionners and rules ──────────────────────────────────────
    let cluster: Arc<dyn ClusterClient> = Arc::new(
        KubeClient::from_config(&config.kubernetes).context("cannot configure the kubernetes client")?,
    );
    let registry = Arc::new(ActionnerRegistry::with_defaults(cluster.clone()));
    info!(actionners = ?registry.ids().collect::<Vec<_>>(), "actionners registered");

    let rules = RuleSet::load(&config.rules_files, registry.as_ref()).context("invalid rules")?;
    let store = Arc::new(RuleStore::new(rules));

    let _watcher = if config.watch_rules {
        let reloader = Arc::new(Reloader::new(
            config.rules_files.clone(),
            store.clone(),
            registry.clone(),
        ));
        match RuleWatcher::spawn(reloader, RELOAD_COOLDOWN) {
            Ok(watcher) => {
                info!("watch of rules enabled");
                Some(watcher)
            }
            Err(e) => {
                error!(error = %e, "cannot watch rules files, hot reload disabled");
                None
            }
        }
    } else {
        None
    };

    // ── Broker ────────────────────────────────────────────────────
    let window = Duration::from_secs(config.deduplication.time_window_seconds);
    let broker = EventBroker::bind(BrokerConfig::replica(
        config.broker.port,
        config.broker.delivery_port,
        window,
    ))
    .await
    .context("cannot start the broker")?;
    let broker_metrics = broker.metrics();
    let broker_shutdown = broker.shutdown_handle();
    let broker_task = tokio::spawn(async move {
        if let Err(e) = broker.run().await {
            error!(error = %e, "broker stopped with an error");
        }
    });

    // ── Publisher and leader routing ──────────────────────────────
    let publisher = Arc::new(
        RetargetablePublisher::connect(&Transport::loopback(config.broker.port))
            .await
            .context("cannot connect to the local broker")?,
    );

    let mut background = Vec::new();
    let routing = if config.deduplication.leader_election {
        let self_identity = match &config.self_identity {
            Some(identity) => identity.clone(),
            None => detect_local_ip()
                .map(|ip| ip.to_string())
                .context("cannot detect the local IP, set self_identity")?,
        };
        info!(
            self_identity = %self_identity,
            lease = %config.deduplication.lease_name,
            namespace = %config.deduplication.lease_namespace,
            "leader election enabled"
        );
        let (leader, lease_task) = LeaseWatcher::new(
            cluster.clone(),
            config.deduplication.lease_namespace.clone(),
            config.deduplication.lease_name.clone(),
            Duration::from_secs(config.deduplication.lease_poll_seconds),
        )
        .spawn();
        let (routing, retarget_task) =
            spawn_retargeter(leader, publisher.clone(), self_identity, config.broker.port);
        background.push(lease_task);
        background.push(retarget_task);
        routing
    } else {
        watch::channel(RoutingState::Unset).1
    };

    // ── Consumer and sinks ────────────────────────────────────────
    let metrics = Arc::new(PipelineMetrics::default());
    let sinks = build_sinks(&config, cluster.clone()).context("invalid notifiers")?;
    let (fanout, sinks_task) = SinkFanout::spawn(sinks, DEFAULT_CAPACITY, DEFAULT_SINK_TIMEOUT);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer_task = match ZmqSubscriber::connect(&Transport::loopback(config.broker.delivery_port)).await {
        Ok(subscriber) => {
            let consumer = Consumer::new(
                subscriber,
                Arc::new(Dispatcher::new(registry.clone())),
                fanout,
                metrics.clone(),
            );
            Some(tokio::spawn(consumer.run(shutdown_rx, grace)))
        }
        Err(e) => {
            error!(error = %e, "cannot attach to the local broker, dispatching disabled");
            drop(fanout);
            None
        }
    };

    // ── HTTP ──────────────────────────────────────────────────────
    let state = Arc::new(AppState {
        rules: store,
        publisher,
        metrics,
        broker: broker_metrics,
        routing,
        started,
    });
    let app = router::build_router(state);

    let addr = format!("{}:{}", config.listen_address, config.listen_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("cannot listen on {addr}"))?;
    info!(address = %addr, "warden is up and listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // ── Shutdown ──────────────────────────────────────────────────
    info!(grace_seconds = grace.as_secs(), "shutting down");
    let _ = shutdown_tx.send(true);
    if let Some(task) = consumer_task {
        if tokio::time::timeout(grace, task).await.is_err() {
            warn!("consumer did not stop within the grace period");
        }
    }
    broker_shutdown.shutdown();
    if tokio::time::timeout(grace, broker_task).await.is_err() {
        warn!("broker did not stop within the grace period");
    }
    if tokio::time::timeout(grace, sinks_task).await.is_err() {
        warn!("result sinks did not drain within the grace period");
    }
    for task in background {
        task.abort();
    }

    info!("warden exited cleanly");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "cannot listen for ctrl_c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "cannot register SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
