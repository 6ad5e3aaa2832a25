//! Connection lifecycle: endpoint validation and the connected/subscribed
//! state machine (§4.3 "Lifecycle", §4.4).

use std::sync::Arc;

use broker_store::CommandClient;
use broker_types::{AdapterError, AdapterResult, ConnectionDescriptor};
use tokio_util::sync::CancellationToken;

use crate::events::ListenerRegistry;

/// An endpoint string's parsed parts, captured at connect-time for
/// diagnostics and for building the keyspace-subscription pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Endpoint {
    pub host: String,
    pub port: u16,
    pub db_index: u8,
}

/// Validates `raw` is a well-formed broker URL (`redis://host:port[/db]`)
/// and extracts its parts. Does not attempt to resolve or connect.
pub(crate) fn parse_endpoint(raw: &str) -> AdapterResult<Endpoint> {
    let bad = |reason: &str| AdapterError::InvalidArgument(format!("endpoint {raw:?}: {reason}"));

    let rest = raw
        .strip_prefix("redis://")
        .ok_or_else(|| bad("missing redis:// scheme"))?;
    let rest = rest.rsplit_once('@').map(|(_, after)| after).unwrap_or(rest);
    let (host_port, db_part) = rest.split_once('/').unwrap_or((rest, ""));
    let (host, port) = host_port
        .rsplit_once(':')
        .ok_or_else(|| bad("missing host:port"))?;
    if host.is_empty() {
        return Err(bad("empty host"));
    }
    let port: u16 = port.parse().map_err(|_| bad("port is not a valid u16"))?;
    let db_index: u8 = if db_part.is_empty() {
        0
    } else {
        db_part.parse().map_err(|_| bad("db index is not a valid u8"))?
    };

    Ok(Endpoint {
        host: host.to_string(),
        port,
        db_index,
    })
}

/// An active subscription: the delivery task's handle, its cancellation
/// token, and the listener registry it dispatches to.
pub(crate) struct Subscription {
    pub registry: Arc<ListenerRegistry>,
    pub cancel: CancellationToken,
    pub task: tokio::task::JoinHandle<()>,
}

/// State held while `connected` (§4.4). `subscription` is `Some` only in
/// the `connected+subscribed` sub-state.
pub(crate) struct Connected {
    pub command: Arc<dyn CommandClient>,
    pub descriptor: ConnectionDescriptor,
    pub db_index: u8,
    /// Kept so `Subscribe` can lazily open the subscriber connection against
    /// the same endpoint without the caller repeating it.
    pub raw_endpoint: String,
    pub subscription: Option<Subscription>,
}
