// Application lifecycle: connect, seed, run the hub, drain events, stop.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use crate::{
    arguments::Arguments,
    config::{load_config_from_path, Config},
    dashboard::{self, describe_health, EventFeed},
    errors::HubError,
    hub::{EventReceiver, Hub},
    logger::{LogTag, Logger},
    node::{seed_snapshot, LndClient, NodeClient},
    shutdown::Shutdown,
    store::{Applied, ModelStore},
};

/// How often pubsub mode checks whether every topic has given up
const EXHAUSTION_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Process entry: load config, build the logger and dispatch on the mode.
pub async fn run(args: Arguments) -> Result<()> {
    let config_path = args.config_path();
    let config = load_config_from_path(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    config.validate().context("invalid configuration")?;

    // The dashboard owns the terminal, so it only logs to file.
    let logger_config = config
        .logger
        .to_logger_config(args.verbose, &args.debug, args.is_pubsub())
        .context("invalid logger configuration")?;
    let logger = Logger::new(logger_config).context("opening log file")?;

    logger.info(
        LogTag::Config,
        &format!("Configuration loaded from {}", config_path.display()),
    );

    let client = LndClient::connect(&config.network, logger.clone())
        .await
        .with_context(|| format!("connecting to {}", config.network.base_url()))?;
    let client: Arc<dyn NodeClient> = Arc::new(client);

    let shutdown = Shutdown::new();
    spawn_signal_listener(shutdown.clone(), logger.clone());

    let result = if args.is_pubsub() {
        run_pubsub(client, &config, logger.clone(), shutdown).await
    } else {
        run_dashboard(client, &config, logger.clone(), shutdown).await
    };

    if let Err(e) = &result {
        logger.error(LogTag::System, &format!("{:#}", e));
    }
    logger.info(LogTag::System, "lntop exiting");
    logger.flush();
    result
}

/// Store seeded from the node, plus a hub that is not yet running.
async fn prepare(
    client: Arc<dyn NodeClient>,
    config: &Config,
    logger: &Logger,
) -> Result<(Arc<ModelStore>, Arc<Hub>)> {
    let snapshot = seed_snapshot(client.as_ref())
        .await
        .context("loading initial node state")?;

    logger.info(
        LogTag::Store,
        &format!(
            "Seeded {} channels for {} at block {}",
            snapshot.channels.len(),
            if snapshot.node.alias.is_empty() {
                snapshot.node.pubkey.as_str()
            } else {
                snapshot.node.alias.as_str()
            },
            snapshot.node.block_height
        ),
    );

    let store = Arc::new(ModelStore::new(logger.clone()));
    store.seed(snapshot)?;

    let hub = Arc::new(Hub::new(client, config.hub.clone(), logger.clone()));
    Ok((store, hub))
}

/// Apply one event and record it in the feed.
fn consume(
    store: &ModelStore,
    feed: Option<&EventFeed>,
    logger: &Logger,
    event: &crate::events::Event,
) -> Option<Applied> {
    match store.apply(event) {
        Ok(applied) => {
            if let Some(feed) = feed {
                feed.push(event, applied);
            }
            Some(applied)
        }
        Err(e) => {
            logger.error(
                LogTag::Store,
                &format!("Failed to apply {}: {}", event.summary(), e),
            );
            None
        }
    }
}

/// Hub + terminal dashboard. Returns after the user quits or a signal
/// arrives, with every worker joined.
pub async fn run_dashboard(
    client: Arc<dyn NodeClient>,
    config: &Config,
    logger: Logger,
    shutdown: Shutdown,
) -> Result<()> {
    let (store, hub) = prepare(client, config, &logger).await?;
    let feed = EventFeed::new(config.views.recent_events);

    let (queue, mut events) = hub.new_queue();
    hub.run(shutdown.clone(), queue)?;

    let consumer = {
        let store = store.clone();
        let feed = feed.clone();
        let logger = logger.clone();
        tokio::spawn(async move {
            let mut applied = 0usize;
            while let Some(event) = events.recv().await {
                if consume(&store, Some(&feed), &logger, &event) == Some(Applied::Updated) {
                    applied += 1;
                }
            }
            applied
        })
    };

    let result = dashboard::run_dashboard(
        store,
        hub.clone(),
        feed,
        config.views.clone(),
        logger.clone(),
        shutdown.clone(),
    )
    .await;

    shutdown.trigger();
    hub.stop().await;

    match consumer.await {
        Ok(applied) => logger.info(
            LogTag::System,
            &format!("Event consumer finished ({} events applied)", applied),
        ),
        Err(e) => logger.error(LogTag::System, &format!("Event consumer panicked: {}", e)),
    }

    result.context("dashboard failed")
}

/// Headless mode: run the hub and log every event until a signal arrives.
///
/// With probing disabled, losing every topic is fatal.
pub async fn run_pubsub(
    client: Arc<dyn NodeClient>,
    config: &Config,
    logger: Logger,
    shutdown: Shutdown,
) -> Result<()> {
    let (store, hub) = prepare(client, config, &logger).await?;
    let (queue, events) = hub.new_queue();
    hub.run(shutdown.clone(), queue)?;

    let outcome = pump_events(&hub, &store, events, &logger, &shutdown).await;
    hub.stop().await;

    let metrics = hub.metrics();
    logger.info(
        LogTag::Hub,
        &format!(
            "Published {} events, discarded {}, reconnects {}, degradations {}",
            metrics.events_published,
            metrics.events_discarded,
            metrics.reconnects,
            metrics.degradations
        ),
    );

    outcome.map_err(Into::into)
}

async fn pump_events(
    hub: &Hub,
    store: &ModelStore,
    mut events: EventReceiver,
    logger: &Logger,
    shutdown: &Shutdown,
) -> Result<(), HubError> {
    let mut check = tokio::time::interval(EXHAUSTION_CHECK_INTERVAL);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.wait() => return Ok(()),
            event = events.recv() => {
                let Some(event) = event else {
                    return Ok(());
                };
                match describe_health(&event) {
                    Some(health) => logger.warning(LogTag::Hub, &health),
                    None => logger.info(LogTag::Hub, &event.summary()),
                }
                consume(store, None, logger, &event);
            }
            _ = check.tick() => {
                if hub.gives_up_when_degraded() && hub.is_exhausted() {
                    return Err(HubError::Exhausted(hub.failed_topics()));
                }
            }
        }
    }
}

/// Trigger `shutdown` on SIGINT/SIGTERM/SIGHUP/SIGQUIT. A second Ctrl+C
/// exits immediately.
fn spawn_signal_listener(shutdown: Shutdown, logger: Logger) {
    tokio::spawn(async move {
        let signal_name = match wait_for_shutdown_signal().await {
            Ok(name) => name,
            Err(e) => {
                logger.error(LogTag::System, &e);
                return;
            }
        };

        logger.warning(
            LogTag::System,
            &format!(
                "Shutdown signal received ({}). Press Ctrl+C again to force kill.",
                signal_name
            ),
        );
        shutdown.trigger();

        if tokio::signal::ctrl_c().await.is_ok() {
            logger.error(LogTag::System, "Second Ctrl+C detected, forcing exit");
            logger.flush();
            // 130 is the conventional exit code for SIGINT
            std::process::exit(130);
        }
    });
}

async fn wait_for_shutdown_signal() -> Result<&'static str, String> {
    #[cfg(unix)]
    let signal_name = {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint =
            signal(SignalKind::interrupt()).map_err(|e| format!("Failed to bind SIGINT: {}", e))?;
        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|e| format!("Failed to bind SIGTERM: {}", e))?;
        let mut sighup =
            signal(SignalKind::hangup()).map_err(|e| format!("Failed to bind SIGHUP: {}", e))?;
        let mut sigquit =
            signal(SignalKind::quit()).map_err(|e| format!("Failed to bind SIGQUIT: {}", e))?;

        tokio::select! {
            _ = sigint.recv() => "SIGINT",
            _ = sigterm.recv() => "SIGTERM",
            _ = sighup.recv() => "SIGHUP",
            _ = sigquit.recv() => "SIGQUIT",
        }
    };

    #[cfg(not(unix))]
    let signal_name = {
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| format!("Failed to listen for shutdown signal: {}", e))?;
        "CTRL_C"
    };

    Ok(signal_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HubConfig;
    use crate::errors::NodeError;
    use crate::events::Topic;
    use crate::node::testing::{ScriptedNode, Session};
    use crate::store::{Channel, ChannelId};
    use serde_json::json;

    fn config(topics: &[Topic], retry_degraded: bool) -> Config {
        Config {
            hub: HubConfig {
                topics: topics.iter().map(|t| t.code().to_string()).collect(),
                queue_capacity: 16,
                reserved_slots: 2,
                max_retries: 2,
                backoff_base_ms: 10,
                backoff_max_ms: 50,
                backoff_jitter: false,
                probe_after_degraded: retry_degraded,
                degraded_probe_secs: 1,
            },
            ..Config::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_pubsub_fails_when_every_topic_is_exhausted() {
        let node = Arc::new(ScriptedNode::new());
        node.script_failures(Topic::Invoices, 10);

        let result = run_pubsub(
            node.clone(),
            &config(&[Topic::Invoices], false),
            Logger::silent(),
            Shutdown::new(),
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(
            err.downcast_ref::<HubError>(),
            Some(&HubError::Exhausted(vec![Topic::Invoices]))
        );
        // max_retries + 1 attempts, then silence
        assert_eq!(node.subscribe_calls(Topic::Invoices), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pubsub_applies_events_until_shutdown() {
        let node = Arc::new(ScriptedNode::new());
        let mut channel = Channel::unknown(ChannelId::new("aa", 0));
        channel.capacity = 1000;
        channel.local_balance = 400;
        node.set_channels(vec![channel]);
        node.script(
            Topic::ChannelState,
            Session::Open(vec![json!({
                "type": "INACTIVE_CHANNEL",
                "inactive_channel": {"funding_txid_str": "aa", "output_index": 0}
            })]),
        );

        let shutdown = Shutdown::new();
        let cfg = config(&[Topic::ChannelState], false);
        let task = {
            let shutdown = shutdown.clone();
            let node = node.clone();
            tokio::spawn(async move { run_pubsub(node, &cfg, Logger::silent(), shutdown).await })
        };

        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown.trigger();
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_seeding_failure_is_fatal() {
        let node = Arc::new(ScriptedNode::new());
        node.fail_queries(NodeError::Auth("bad macaroon".to_string()));

        let result = run_pubsub(
            node,
            &config(&[Topic::Invoices], false),
            Logger::silent(),
            Shutdown::new(),
        )
        .await;

        let err = result.unwrap_err();
        assert!(format!("{:#}", err).contains("bad macaroon"));
    }

    #[test]
    fn test_consume_records_feed_entries() {
        let store = ModelStore::new(Logger::silent());
        store.seed(Default::default()).unwrap();
        let feed = EventFeed::new(4);
        let event = crate::events::Event {
            topic: Topic::Transactions,
            sequence: 1,
            kind: crate::events::EventKind::TransactionSeen {
                tx_hash: "ff".to_string(),
                amount_sat: 1000,
                confirmations: 1,
                block_height: 800_000,
            },
        };

        assert_eq!(
            consume(&store, Some(&feed), &Logger::silent(), &event),
            Some(Applied::Updated)
        );
        assert_eq!(
            consume(&store, Some(&feed), &Logger::silent(), &event),
            Some(Applied::Stale)
        );
        assert_eq!(feed.len(), 2);
        assert_eq!(store.current().activity.transactions_seen, 1);
    }
}
