/// Scripted in-memory node for tests
///
/// Every `subscribe(topic)` consumes the next scripted session for that
/// topic. With nothing scripted, subscribing fails with a connection error.
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use tokio::sync::mpsc;

use super::{NodeClient, NotificationStream, Query, RawNotification};
use crate::errors::{NodeError, NodeResult};
use crate::events::Topic;
use crate::store::{Channel, ChannelBalance, NodeInfo, Snapshot};

pub enum Session {
    /// `subscribe` returns this error
    Fail(NodeError),
    /// Yields the payloads, then ends (transport dropped)
    Finite(Vec<Value>),
    /// Yields the payloads, then stays open forever
    Open(Vec<Value>),
    /// Yields whatever is sent; ends when the sender is dropped
    Live(mpsc::UnboundedReceiver<Value>),
}

#[derive(Default)]
struct ScriptState {
    channels: Vec<Channel>,
    node_info: NodeInfo,
    balance: ChannelBalance,
    query_error: Option<NodeError>,
    sessions: HashMap<Topic, VecDeque<Session>>,
    subscribe_calls: HashMap<Topic, usize>,
}

#[derive(Default)]
pub struct ScriptedNode {
    state: Mutex<ScriptState>,
}

impl ScriptedNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_channels(&self, channels: Vec<Channel>) {
        self.state.lock().channels = channels;
    }

    pub fn set_node_info(&self, info: NodeInfo) {
        self.state.lock().node_info = info;
    }

    pub fn set_channel_balance(&self, balance: ChannelBalance) {
        self.state.lock().balance = balance;
    }

    pub fn fail_queries(&self, error: NodeError) {
        self.state.lock().query_error = Some(error);
    }

    pub fn script(&self, topic: Topic, session: Session) {
        self.state
            .lock()
            .sessions
            .entry(topic)
            .or_default()
            .push_back(session);
    }

    /// Script `count` consecutive failed subscribe attempts.
    pub fn script_failures(&self, topic: Topic, count: usize) {
        for _ in 0..count {
            self.script(
                topic,
                Session::Fail(NodeError::Connection("connection refused".to_string())),
            );
        }
    }

    /// Script a live session and return its feeding end.
    pub fn script_live(&self, topic: Topic) -> mpsc::UnboundedSender<Value> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.script(topic, Session::Live(rx));
        tx
    }

    pub fn subscribe_calls(&self, topic: Topic) -> usize {
        self.state
            .lock()
            .subscribe_calls
            .get(&topic)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl NodeClient for ScriptedNode {
    async fn query(&self, query: Query) -> NodeResult<Snapshot> {
        let state = self.state.lock();
        if let Some(error) = &state.query_error {
            return Err(error.clone());
        }
        Ok(match query {
            Query::Channels => Snapshot::with_channels(state.channels.clone()),
            Query::NodeInfo => Snapshot {
                node: state.node_info.clone(),
                ..Default::default()
            },
            Query::ChannelBalance => Snapshot {
                balance: state.balance,
                ..Default::default()
            },
        })
    }

    async fn subscribe(&self, topic: Topic) -> NodeResult<NotificationStream> {
        let session = {
            let mut state = self.state.lock();
            *state.subscribe_calls.entry(topic).or_insert(0) += 1;
            state.sessions.get_mut(&topic).and_then(VecDeque::pop_front)
        };

        let wrap = move |payload: Value| RawNotification::new(topic, payload);
        match session {
            None => Err(NodeError::Connection("no scripted session".to_string())),
            Some(Session::Fail(error)) => Err(error),
            Some(Session::Finite(payloads)) => Ok(stream::iter(payloads).map(wrap).boxed()),
            Some(Session::Open(payloads)) => Ok(stream::iter(payloads)
                .chain(stream::pending())
                .map(wrap)
                .boxed()),
            Some(Session::Live(mut rx)) => Ok(stream::poll_fn(move |cx| rx.poll_recv(cx))
                .map(wrap)
                .boxed()),
        }
    }
}
