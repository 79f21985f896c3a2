/// One worker per topic
///
/// State machine: Connecting -> Streaming -> (stream ends) -> Backoff ->
/// Connecting ... Once consecutive failures pass the retry cap the topic is
/// Failed: exactly one `StreamDegraded` is published, then the worker either
/// exits or keeps probing at the degraded interval. A successful open after
/// that publishes `StreamRecovered` ahead of any data.
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;

use super::backoff::RetryPolicy;
use super::metrics::HubMetrics;
use super::queue::{EventSender, PublishError};
use super::subscription::{SubscriptionState, SubscriptionTable};
use crate::errors::NodeError;
use crate::events::{EventKind, Topic};
use crate::logger::{LogTag, Logger};
use crate::node::{NodeClient, NotificationStream};
use crate::normalizer::Normalizer;
use crate::shutdown::Shutdown;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Cancellation observed
    Shutdown,
    /// Degraded with probing disabled
    Failed,
}

enum SessionEnd {
    Shutdown,
    Terminated,
}

pub(crate) struct Worker {
    pub topic: Topic,
    pub client: Arc<dyn NodeClient>,
    pub queue: EventSender,
    pub shutdown: Shutdown,
    pub policy: RetryPolicy,
    pub table: SubscriptionTable,
    pub metrics: Arc<HubMetrics>,
    pub logger: Logger,
    pub normalizer: Normalizer,
}

impl Worker {
    pub async fn run(mut self) -> WorkerExit {
        let topic = self.topic;
        // Consecutive failed sessions since the last one that delivered data
        let mut failures: u32 = 0;
        let mut degraded = false;
        let mut attempts: u64 = 0;

        loop {
            if self.shutdown.is_triggered() {
                return WorkerExit::Shutdown;
            }
            if !degraded {
                self.table
                    .update(topic, SubscriptionState::Connecting, failures);
            }
            if attempts > 0 {
                self.metrics.inc_reconnects();
            }
            attempts += 1;

            let opened = tokio::select! {
                biased;
                _ = self.shutdown.wait() => return WorkerExit::Shutdown,
                opened = self.client.subscribe(topic) => opened,
            };

            let reason = match opened {
                Ok(stream) => {
                    if degraded {
                        degraded = false;
                        self.logger.info(
                            LogTag::Hub,
                            &format!("Topic {} recovered after {} failures", topic, failures),
                        );
                        if self.signal(EventKind::StreamRecovered).await.is_err() {
                            return WorkerExit::Shutdown;
                        }
                        self.metrics.inc_recoveries();
                    }
                    self.table
                        .update(topic, SubscriptionState::Streaming, failures);
                    self.logger
                        .debug(LogTag::Hub, &format!("Topic {} streaming", topic));

                    match self.pump(stream, &mut failures).await {
                        SessionEnd::Shutdown => return WorkerExit::Shutdown,
                        SessionEnd::Terminated => "stream ended".to_string(),
                    }
                }
                Err(NodeError::Auth(message)) => {
                    // Credentials do not heal by retrying
                    failures = failures.max(self.policy.max_retries);
                    format!("authentication failed: {}", message)
                }
                Err(e) => e.to_string(),
            };

            failures = failures.saturating_add(1);

            if self.policy.exhausted(failures) {
                if !degraded {
                    degraded = true;
                    self.table.update(topic, SubscriptionState::Failed, failures);
                    self.logger.warning(
                        LogTag::Hub,
                        &format!(
                            "Topic {} degraded after {} failures: {}",
                            topic, failures, reason
                        ),
                    );
                    let signal = EventKind::StreamDegraded {
                        retries: failures,
                        reason,
                    };
                    if self.signal(signal).await.is_err() {
                        return WorkerExit::Shutdown;
                    }
                    self.metrics.inc_degradations();
                } else {
                    self.table.update(topic, SubscriptionState::Failed, failures);
                    self.logger.debug(
                        LogTag::Hub,
                        &format!("Probe of degraded topic {} failed: {}", topic, reason),
                    );
                }

                match self.policy.probe_interval {
                    Some(interval) => {
                        if !self.sleep(interval).await {
                            return WorkerExit::Shutdown;
                        }
                    }
                    None => return WorkerExit::Failed,
                }
            } else {
                let delay = self.policy.next_delay(failures);
                self.table.update(topic, SubscriptionState::Backoff, failures);
                self.logger.warning(
                    LogTag::Hub,
                    &format!(
                        "Topic {} interrupted ({}), retry {}/{} in {}ms",
                        topic,
                        reason,
                        failures,
                        self.policy.max_retries,
                        delay.as_millis()
                    ),
                );
                if !self.sleep(delay).await {
                    return WorkerExit::Shutdown;
                }
            }
        }
    }

    /// Pull, normalize and publish until the stream ends or shutdown fires.
    async fn pump(&mut self, mut stream: NotificationStream, failures: &mut u32) -> SessionEnd {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.shutdown.wait() => return SessionEnd::Shutdown,
                next = stream.next() => next,
            };
            let Some(raw) = next else {
                return SessionEnd::Terminated;
            };

            if *failures > 0 {
                *failures = 0;
                self.table.update(self.topic, SubscriptionState::Streaming, 0);
            }

            self.logger.verbose(
                LogTag::Normalizer,
                &format!("{} raw: {}", self.topic, raw.payload),
            );
            let Some(event) = self.normalizer.normalize(raw) else {
                self.metrics.inc_discarded();
                continue;
            };

            match self.queue.publish(event, &self.shutdown).await {
                Ok(()) => self.metrics.inc_published(),
                Err(PublishError::Cancelled) | Err(PublishError::Closed) => {
                    return SessionEnd::Shutdown
                }
            }
        }
    }

    async fn signal(&mut self, kind: EventKind) -> Result<(), PublishError> {
        let event = self.normalizer.signal(kind);
        self.queue.publish_signal(event, &self.shutdown).await?;
        self.metrics.inc_published();
        Ok(())
    }

    /// Returns false if shutdown fired first.
    async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.shutdown.wait() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}
