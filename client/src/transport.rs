//! One-shot server-push channel.

use crate::error::Error;
use eventsource_client::{self as es, Client};
use events::{AnalysisEvent, DecodeError, Frame};
use futures_util::stream::StreamExt;
use log::*;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Idle period after which a silent connection is treated as lost. The
/// reference server sends a keep-alive comment every 15 seconds.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// One item handed to the channel's handler, in wire order.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Event(AnalysisEvent),
    /// A frame arrived that could not be decoded. Terminal.
    Malformed(DecodeError),
    /// The connection failed, ended or went idle before a terminal event.
    /// Carries a diagnostic reason for logs. Terminal.
    ConnectionLost(String),
}

impl Delivery {
    pub fn is_terminal(&self) -> bool {
        match self {
            Delivery::Event(event) => event.is_terminal(),
            Delivery::Malformed(_) | Delivery::ConnectionLost(_) => true,
        }
    }
}

/// The single consumer registered on a channel.
pub type Handler = Box<dyn FnMut(Delivery) + Send + 'static>;

/// Opens channels. Implementations must never reconnect on their own.
pub trait Transport: Send + Sync {
    fn open(&self, url: &str, handler: Handler) -> Result<ChannelHandle, Error>;
}

/// Ownership of one open channel.
///
/// Closing aborts the task that drives the connection, which drops the
/// handler with it. Closing twice is a no-op, and dropping the handle closes it.
#[derive(Debug)]
pub struct ChannelHandle {
    task: Option<JoinHandle<()>>,
}

impl ChannelHandle {
    pub fn new(task: JoinHandle<()>) -> Self {
        Self { task: Some(task) }
    }

    /// A handle with nothing behind it, for transports that deliver inline.
    pub fn detached() -> Self {
        Self { task: None }
    }

    pub fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.close();
    }
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub idle_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

/// Channel transport over `eventsource-client` with reconnection disabled.
///
/// `open` spawns onto the current tokio runtime and fails outside of one.
#[derive(Debug, Clone, Default)]
pub struct EventSourceTransport {
    config: TransportConfig,
}

impl EventSourceTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }
}

impl Transport for EventSourceTransport {
    fn open(&self, url: &str, handler: Handler) -> Result<ChannelHandle, Error> {
        let client = es::ClientBuilder::for_url(url)
            .map_err(|e| Error::invalid_url(url, e))?
            // Never retry: the observed run is not idempotent.
            .reconnect(es::ReconnectOptions::reconnect(false).build())
            .build();

        let runtime = tokio::runtime::Handle::try_current().map_err(Error::transport)?;

        debug!("Opening analysis stream {url}");

        let task = runtime.spawn(pump(
            client,
            url.to_string(),
            self.config.idle_timeout,
            handler,
        ));

        Ok(ChannelHandle::new(task))
    }
}

/// Read the connection until a terminal delivery has been handed over.
async fn pump(client: impl Client, url: String, idle_timeout: Duration, mut handler: Handler) {
    let mut stream = client.stream();

    loop {
        let next = match tokio::time::timeout(idle_timeout, stream.next()).await {
            Ok(next) => next,
            Err(_) => {
                warn!("No data on {url} for {idle_timeout:?}, giving up");
                handler(Delivery::ConnectionLost(format!(
                    "idle for {idle_timeout:?}"
                )));
                break;
            }
        };

        match next {
            Some(Ok(es::SSE::Event(event))) => {
                let frame = Frame::new(event.event_type, event.data);
                let delivery = match events::decode(&frame) {
                    Ok(event) => Delivery::Event(event),
                    Err(e) => {
                        warn!("Undecodable frame on {url}: {e}");
                        Delivery::Malformed(e)
                    }
                };

                let terminal = delivery.is_terminal();
                handler(delivery);
                if terminal {
                    debug!("Terminal event received, closing {url}");
                    break;
                }
            }
            Some(Ok(_)) => {
                // Keep-alive comments only reset the idle timer
                trace!("Keep-alive on {url}");
            }
            Some(Err(e)) => {
                warn!("Analysis stream {url} failed: {e}");
                handler(Delivery::ConnectionLost(e.to_string()));
                break;
            }
            None => {
                warn!("Analysis stream {url} ended before a terminal event");
                handler(Delivery::ConnectionLost(
                    "stream ended before a terminal event".to_string(),
                ));
                break;
            }
        }
    }
}
