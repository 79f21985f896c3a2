/// Subscription topics
///
/// Every node subscription is addressed by one `Topic`. Codes are the
/// strings used in the config file and the `--debug`/log output.
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Topic {
    ChannelState,
    ChannelGraph,
    Invoices,
    /// On-chain wallet transactions
    Transactions,
    /// Forwarding settlements
    Htlcs,
    /// Periodic refresh of the channel list
    ChannelBalances,
}

impl Topic {
    pub const ALL: [Topic; 6] = [
        Topic::ChannelState,
        Topic::ChannelGraph,
        Topic::Invoices,
        Topic::Transactions,
        Topic::Htlcs,
        Topic::ChannelBalances,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Topic::ChannelState => "channel-state",
            Topic::ChannelGraph => "channel-graph",
            Topic::Invoices => "invoices",
            Topic::Transactions => "transactions",
            Topic::Htlcs => "htlcs",
            Topic::ChannelBalances => "channel-balances",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "channel-state" => Some(Topic::ChannelState),
            "channel-graph" => Some(Topic::ChannelGraph),
            "invoices" => Some(Topic::Invoices),
            "transactions" | "on-chain" => Some(Topic::Transactions),
            "htlcs" => Some(Topic::Htlcs),
            "channel-balances" => Some(Topic::ChannelBalances),
            _ => None,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
