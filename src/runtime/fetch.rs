pub mod request;
pub mod response;

use super::{CallbackMessage, SchedulerMessage};
use futures_util::StreamExt;
use response::LineDecoder;
use std::fmt;
use tokio::sync::mpsc;

/// HTTP method of a request, always rendered uppercase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    Other(String),
}

impl HttpMethod {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "GET" => Self::Get,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "DELETE" => Self::Delete,
            "PATCH" => Self::Patch,
            "HEAD" => Self::Head,
            "OPTIONS" => Self::Options,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Other(method) => method,
        }
    }

    /// GET and HEAD never send a body.
    pub fn carries_body(&self) -> bool {
        !matches!(self, Self::Get | Self::Head)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Loads a descriptor URL out of band.
///
/// Whatever the loaded resource does must come back through
/// [`Runtime::deliver`](crate::Runtime::deliver); `open` itself never reports
/// a result.
pub trait ChannelOpener {
    fn open(&self, url: &str);
}

/// Default opener: hands the URL to the event loop, which fetches it and
/// streams the relay's instructions back as callbacks.
pub struct RelayChannel {
    scheduler_tx: mpsc::UnboundedSender<SchedulerMessage>,
}

impl RelayChannel {
    pub fn new(scheduler_tx: mpsc::UnboundedSender<SchedulerMessage>) -> Self {
        Self { scheduler_tx }
    }
}

impl ChannelOpener for RelayChannel {
    fn open(&self, url: &str) {
        if self
            .scheduler_tx
            .send(SchedulerMessage::OpenChannel(url.to_string()))
            .is_err()
        {
            log::error!("Event loop is gone, relay channel not opened");
        }
    }
}

/// Fetch a descriptor URL and forward every instruction in the reply.
///
/// Transport failures are only logged: the affected requests stay open and
/// are failed by their timeout.
pub async fn stream_relay(
    client: reqwest::Client,
    url: String,
    callback_tx: mpsc::UnboundedSender<CallbackMessage>,
) {
    let response = match client.get(&url).send().await {
        Ok(response) => response,
        Err(e) => {
            log::error!("Relay request failed: {}", e);
            return;
        }
    };

    if !response.status().is_success() {
        log::error!("Relay answered {}", response.status());
        return;
    }

    let mut decoder = LineDecoder::new();
    let mut byte_stream = response.bytes_stream();

    while let Some(chunk_result) = byte_stream.next().await {
        match chunk_result {
            Ok(chunk) => {
                for (token, event) in decoder.push(&chunk) {
                    if callback_tx
                        .send(CallbackMessage::Deliver(token, event))
                        .is_err()
                    {
                        return;
                    }
                }
            }
            Err(e) => {
                log::error!("Relay stream read error: {}", e);
                return;
            }
        }
    }

    if let Some((token, event)) = decoder.finish() {
        let _ = callback_tx.send(CallbackMessage::Deliver(token, event));
    }
}
