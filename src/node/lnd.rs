/// LND REST adapter
///
/// Queries are plain GETs with a per-request timeout. Subscriptions are
/// long-lived GETs whose bodies are newline-delimited JSON; they have no
/// request timeout. Every request carries the macaroon in the
/// `Grpc-Metadata-macaroon` header.
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Certificate, Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::error::Error as _;
use std::time::Duration;

use super::stream::{frames, Frame};
use super::{NodeClient, NotificationStream, Query, RawNotification};
use crate::config::NetworkConfig;
use crate::errors::{NodeError, NodeResult};
use crate::events::Topic;
use crate::logger::{LogTag, Logger};
use crate::normalizer::{decode_channel, decode_channel_balance};
use crate::store::{NodeInfo, Snapshot};

const MACAROON_HEADER: &str = "Grpc-Metadata-macaroon";

#[derive(Clone)]
pub struct LndClient {
    http: Client,
    base_url: String,
    request_timeout: Duration,
    poll_interval: Duration,
    logger: Logger,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GetInfoResponse {
    identity_pubkey: String,
    alias: String,
    block_height: u32,
    synced_to_chain: bool,
    version: String,
}

impl From<GetInfoResponse> for NodeInfo {
    fn from(info: GetInfoResponse) -> Self {
        NodeInfo {
            alias: info.alias,
            pubkey: info.identity_pubkey,
            block_height: info.block_height,
            synced_to_chain: info.synced_to_chain,
            version: info.version,
        }
    }
}

impl LndClient {
    /// Read credentials, build the HTTPS client and verify the session with
    /// `getinfo`.
    pub async fn connect(config: &NetworkConfig, logger: Logger) -> NodeResult<Self> {
        let cert_path = config.tls_cert();
        let pem = std::fs::read(&cert_path).map_err(|e| {
            NodeError::Auth(format!("cannot read TLS certificate {}: {}", cert_path.display(), e))
        })?;
        let certificate = Certificate::from_pem(&pem)
            .map_err(|e| NodeError::Auth(format!("invalid TLS certificate: {}", e)))?;

        let macaroon_path = config.macaroon();
        let macaroon = std::fs::read(&macaroon_path).map_err(|e| {
            NodeError::Auth(format!("cannot read macaroon {}: {}", macaroon_path.display(), e))
        })?;
        if macaroon.is_empty() {
            return Err(NodeError::Auth("macaroon file is empty".to_string()));
        }
        let mut macaroon_value = HeaderValue::from_str(&hex::encode(macaroon))
            .map_err(|e| NodeError::Auth(format!("invalid macaroon: {}", e)))?;
        macaroon_value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(MACAROON_HEADER, macaroon_value);

        let http = Client::builder()
            .add_root_certificate(certificate)
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| NodeError::Auth(format!("cannot build TLS client: {}", e)))?;

        let client = Self {
            http,
            base_url: config.base_url().to_string(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            logger,
        };

        let info = client.get_info().await?;
        client.logger.info(
            LogTag::Node,
            &format!(
                "Connected to {} ({}) at {}, lnd {}",
                info.alias, info.pubkey, client.base_url, info.version
            ),
        );
        Ok(client)
    }

    async fn get_json(&self, path: &str) -> NodeResult<Value> {
        let url = format!("{}{}", self.base_url, path);
        self.logger.verbose(LogTag::Node, &format!("GET {}", url));
        let response = self
            .http
            .get(&url)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(map_request_error)?;
        let response = check_status(response).await?;
        response
            .json::<Value>()
            .await
            .map_err(|e| NodeError::Protocol(format!("{}: {}", path, e)))
    }

    async fn get_info(&self) -> NodeResult<NodeInfo> {
        let body = self.get_json("/v1/getinfo").await?;
        let info: GetInfoResponse = serde_json::from_value(body)
            .map_err(|e| NodeError::Protocol(format!("getinfo: {}", e)))?;
        Ok(info.into())
    }

    async fn list_channels(&self) -> NodeResult<Vec<Value>> {
        let mut body = self.get_json("/v1/channels").await?;
        match body.get_mut("channels").map(Value::take) {
            Some(Value::Array(channels)) => Ok(channels),
            // Empty lists may be omitted entirely
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(other) => Err(NodeError::Protocol(format!(
                "channels: expected array, got {}",
                other
            ))),
        }
    }

    async fn open_stream(&self, topic: Topic, path: &str) -> NodeResult<NotificationStream> {
        let url = format!("{}{}", self.base_url, path);
        self.logger
            .debug(LogTag::Node, &format!("Subscribing to {} via {}", topic, url));
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(map_request_error)?;
        let response = check_status(response).await?;

        let logger = self.logger.clone();
        let notifications = frames(Box::pin(response.bytes_stream()))
            .flat_map(move |frame| stream::iter(expand_frame(topic, frame, &logger)));
        Ok(notifications.boxed())
    }

    /// The channel list, re-fetched every `poll_interval`. The first fetch
    /// happens before returning so credential problems surface immediately.
    async fn poll_balances(&self) -> NodeResult<NotificationStream> {
        let first = self.list_channels().await?;
        let client = self.clone();

        let refreshes = stream::unfold(client, |client| async move {
            tokio::time::sleep(client.poll_interval).await;
            match client.list_channels().await {
                Ok(channels) => Some((channels, client)),
                Err(e) => {
                    client
                        .logger
                        .warning(LogTag::Node, &format!("Balance refresh failed: {}", e));
                    None
                }
            }
        });

        let notifications = stream::once(async move { first })
            .chain(refreshes)
            .flat_map(|channels| {
                stream::iter(
                    channels
                        .into_iter()
                        .map(|channel| RawNotification::new(Topic::ChannelBalances, channel)),
                )
            });
        Ok(notifications.boxed())
    }
}

#[async_trait]
impl NodeClient for LndClient {
    async fn query(&self, query: Query) -> NodeResult<Snapshot> {
        match query {
            Query::NodeInfo => Ok(Snapshot {
                node: self.get_info().await?,
                ..Default::default()
            }),
            Query::Channels => {
                let mut channels = Vec::new();
                for raw in self.list_channels().await? {
                    match decode_channel(&raw) {
                        Ok(channel) => channels.push(channel),
                        Err(reason) => self
                            .logger
                            .warning(LogTag::Node, &format!("Skipping channel: {}", reason)),
                    }
                }
                Ok(Snapshot::with_channels(channels))
            }
            Query::ChannelBalance => {
                let body = self.get_json("/v1/balance/channels").await?;
                let balance = decode_channel_balance(&body)
                    .map_err(|reason| NodeError::Protocol(format!("balance: {}", reason)))?;
                Ok(Snapshot {
                    balance,
                    ..Default::default()
                })
            }
        }
    }

    async fn subscribe(&self, topic: Topic) -> NodeResult<NotificationStream> {
        match topic {
            Topic::ChannelState => self.open_stream(topic, "/v1/channels/subscribe").await,
            Topic::ChannelGraph => self.open_stream(topic, "/v1/graph/subscribe").await,
            Topic::Invoices => self.open_stream(topic, "/v1/invoices/subscribe").await,
            Topic::Transactions => self.open_stream(topic, "/v1/transactions/subscribe").await,
            Topic::Htlcs => self.open_stream(topic, "/v2/router/htlcevents").await,
            Topic::ChannelBalances => self.poll_balances().await,
        }
    }
}

/// One frame becomes zero or more notifications. Graph updates carry lists
/// and are flattened to one notification per closed channel or edge update.
fn expand_frame(topic: Topic, frame: Frame, logger: &Logger) -> Vec<RawNotification> {
    match frame {
        Frame::Result(value) if topic == Topic::ChannelGraph => flatten_graph_update(value)
            .into_iter()
            .map(|payload| RawNotification::new(topic, payload))
            .collect(),
        Frame::Result(value) => vec![RawNotification::new(topic, value)],
        Frame::Malformed(line) => vec![RawNotification::new(topic, Value::String(line))],
        Frame::Error(message) => {
            logger.warning(
                LogTag::Node,
                &format!("{} stream closed by node: {}", topic, message),
            );
            Vec::new()
        }
    }
}

fn flatten_graph_update(mut update: Value) -> Vec<Value> {
    let mut payloads = Vec::new();
    if let Some(Value::Array(closed)) = update.get_mut("closed_chans").map(Value::take) {
        payloads.extend(closed.into_iter().map(|c| json!({ "closed_chan": c })));
    }
    if let Some(Value::Array(edges)) = update.get_mut("channel_updates").map(Value::take) {
        payloads.extend(edges.into_iter().map(|u| json!({ "channel_update": u })));
    }
    payloads
}

async fn check_status(response: Response) -> NodeResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = format!("HTTP {}: {}", status, body.trim());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(NodeError::Auth(message)),
        s if s.is_server_error() => Err(NodeError::Connection(message)),
        _ => Err(NodeError::Protocol(message)),
    }
}

fn map_request_error(error: reqwest::Error) -> NodeError {
    let mut chain = error.to_string();
    let mut source = error.source();
    while let Some(inner) = source {
        chain.push_str(": ");
        chain.push_str(&inner.to_string());
        source = inner.source();
    }

    if chain.to_lowercase().contains("certificate") {
        NodeError::Auth(chain)
    } else if error.is_decode() {
        NodeError::Protocol(chain)
    } else {
        NodeError::Connection(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_graph_update() {
        let update = json!({
            "node_updates": [{"alias": "carol"}],
            "channel_updates": [{"chan_id": "1"}],
            "closed_chans": [
                {"chan_id": "2", "chan_point": {"funding_txid_str": "aa", "output_index": 0}},
                {"chan_id": "3", "chan_point": {"funding_txid_str": "bb", "output_index": 1}}
            ]
        });
        let payloads = flatten_graph_update(update);
        assert_eq!(payloads.len(), 3);
        assert_eq!(payloads[0]["closed_chan"]["chan_id"], "2");
        assert_eq!(payloads[2]["channel_update"]["chan_id"], "1");
    }

    #[test]
    fn test_expand_frame() {
        let logger = Logger::silent();
        let raw = expand_frame(
            Topic::Invoices,
            Frame::Result(json!({"r_hash": "AA=="})),
            &logger,
        );
        assert_eq!(raw, vec![RawNotification::new(Topic::Invoices, json!({"r_hash": "AA=="}))]);

        let malformed = expand_frame(Topic::Htlcs, Frame::Malformed("oops".to_string()), &logger);
        assert_eq!(malformed[0].payload, Value::String("oops".to_string()));

        assert!(expand_frame(Topic::Htlcs, Frame::Error("EOF".to_string()), &logger).is_empty());
    }

    #[tokio::test]
    async fn test_connect_rejects_missing_certificate() {
        let dir = tempfile::tempdir().unwrap();
        let config = NetworkConfig {
            tls_cert_path: dir.path().join("tls.cert").display().to_string(),
            macaroon_path: dir.path().join("admin.macaroon").display().to_string(),
            ..Default::default()
        };
        match LndClient::connect(&config, Logger::silent()).await {
            Err(NodeError::Auth(message)) => assert!(message.contains("TLS certificate")),
            Err(other) => panic!("unexpected error {:?}", other),
            Ok(_) => panic!("connect should fail"),
        }
    }
}
