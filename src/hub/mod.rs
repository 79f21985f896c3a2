//! Aggregation hub
//!
//! Runs one worker task per topic. Workers pull from their node
//! subscription, normalize, and publish into one bounded queue owned by the
//! caller. The hub owns the worker handles and the lifecycle:
//!
//! ```text
//! Idle --run--> Running --stop--> Stopping --> Stopped
//! ```
//!
//! `stop` cancels every worker, joins them all, then closes the queue.

mod backoff;
mod metrics;
mod queue;
mod subscription;
mod worker;

pub use backoff::RetryPolicy;
pub use metrics::{HubMetrics, HubMetricsSnapshot};
pub use queue::{event_queue, EventReceiver, EventSender, PublishError};
pub use subscription::{Subscription, SubscriptionState};
pub use worker::WorkerExit;

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::config::HubConfig;
use crate::errors::HubError;
use crate::events::Topic;
use crate::logger::{LogTag, Logger};
use crate::node::NodeClient;
use crate::normalizer::Normalizer;
use crate::shutdown::Shutdown;
use subscription::SubscriptionTable;
use worker::Worker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

impl HubState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HubState::Idle => "idle",
            HubState::Running => "running",
            HubState::Stopping => "stopping",
            HubState::Stopped => "stopped",
        }
    }
}

struct RunningWorkers {
    shutdown: Shutdown,
    queue: EventSender,
    handles: Vec<(Topic, JoinHandle<WorkerExit>)>,
}

pub struct Hub {
    client: Arc<dyn NodeClient>,
    config: HubConfig,
    topics: Vec<Topic>,
    logger: Logger,
    state: Mutex<HubState>,
    running: Mutex<Option<RunningWorkers>>,
    /// Serializes `stop` callers so every one of them returns after the join
    stop_lock: tokio::sync::Mutex<()>,
    subscriptions: SubscriptionTable,
    metrics: Arc<HubMetrics>,
}

impl Hub {
    pub fn new(client: Arc<dyn NodeClient>, config: HubConfig, logger: Logger) -> Self {
        // Validated at startup; an invalid list leaves the hub without topics
        // and `run` reports NoTopics.
        let topics = config.parsed_topics().unwrap_or_else(|e| {
            logger.error(LogTag::Hub, &e.to_string());
            Vec::new()
        });

        Self {
            client,
            subscriptions: SubscriptionTable::new(&topics),
            topics,
            config,
            logger,
            state: Mutex::new(HubState::Idle),
            running: Mutex::new(None),
            stop_lock: tokio::sync::Mutex::new(()),
            metrics: HubMetrics::new(),
        }
    }

    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    /// A queue sized for this hub: `queue_capacity` data slots plus
    /// `reserved_slots` per topic for health events.
    pub fn new_queue(&self) -> (EventSender, EventReceiver) {
        event_queue(
            self.config.queue_capacity,
            self.config.reserved_slots * self.topics.len().max(1),
        )
    }

    /// Start one worker per topic and return. Workers observe `ctx` and the
    /// hub's own stop signal.
    pub fn run(&self, ctx: Shutdown, queue: EventSender) -> Result<(), HubError> {
        {
            let mut state = self.state.lock();
            if *state != HubState::Idle {
                return Err(HubError::AlreadyStarted(state.as_str()));
            }
            if self.topics.is_empty() {
                return Err(HubError::NoTopics);
            }
            *state = HubState::Running;
        }

        let shutdown = ctx.child();
        let policy = RetryPolicy::from_config(&self.config);
        let handles = self
            .topics
            .iter()
            .map(|&topic| {
                let worker = Worker {
                    topic,
                    client: self.client.clone(),
                    queue: queue.clone(),
                    shutdown: shutdown.clone(),
                    policy: policy.clone(),
                    table: self.subscriptions.clone(),
                    metrics: self.metrics.clone(),
                    logger: self.logger.clone(),
                    normalizer: Normalizer::for_topic(topic, self.logger.clone()),
                };
                (topic, tokio::spawn(worker.run()))
            })
            .collect();

        *self.running.lock() = Some(RunningWorkers {
            shutdown,
            queue,
            handles,
        });

        self.logger.info(
            LogTag::Hub,
            &format!(
                "Hub running with {} topics: {}",
                self.topics.len(),
                self.topics
                    .iter()
                    .map(Topic::code)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        );
        Ok(())
    }

    /// Cancel and join every worker, then close the queue.
    ///
    /// Idempotent. Concurrent callers all return once the join is complete.
    pub async fn stop(&self) {
        let _serialized = self.stop_lock.lock().await;

        let running = {
            let mut state = self.state.lock();
            match *state {
                HubState::Stopped => return,
                HubState::Idle => {
                    *state = HubState::Stopped;
                    return;
                }
                HubState::Running | HubState::Stopping => *state = HubState::Stopping,
            }
            self.running.lock().take()
        };

        if let Some(running) = running {
            self.logger.info(LogTag::Hub, "Stopping hub workers");
            running.shutdown.trigger();

            for (topic, handle) in running.handles {
                match handle.await {
                    Ok(exit) => self
                        .logger
                        .debug(LogTag::Hub, &format!("Worker {} exited: {:?}", topic, exit)),
                    Err(e) => self
                        .logger
                        .error(LogTag::Hub, &format!("Worker {} panicked: {}", topic, e)),
                }
            }

            running.queue.close();
        }

        *self.state.lock() = HubState::Stopped;
        self.logger.info(LogTag::Hub, "Hub stopped");
    }

    pub fn state(&self) -> HubState {
        *self.state.lock()
    }

    /// Running, and every topic has failed.
    pub fn is_exhausted(&self) -> bool {
        self.state() == HubState::Running && self.subscriptions.all_failed()
    }

    /// Topics currently in the Failed state
    pub fn failed_topics(&self) -> Vec<Topic> {
        self.subscriptions
            .all()
            .into_iter()
            .filter(|s| s.state == SubscriptionState::Failed)
            .map(|s| s.topic)
            .collect()
    }

    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.subscriptions.all()
    }

    pub fn metrics(&self) -> HubMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Whether workers give up after degrading
    pub fn gives_up_when_degraded(&self) -> bool {
        !self.config.probe_after_degraded
    }
}
