use serde::Deserialize;
use std::collections::BTreeMap;

/// Observable state of a request, numbered like the standard interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadyState {
    Unsent = 0,
    Opened = 1,
    HeadersReceived = 2,
    Loading = 3,
    Done = 4,
}

impl ReadyState {
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

/// One step the relay can apply to a registered request.
///
/// This is the whole relay-to-client vocabulary: anything else the relay
/// wants to express has to be a sequence of these.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RelayEvent {
    /// Status line and headers of the upstream response.
    HeadersReceived {
        status: u16,
        #[serde(rename = "statusText", default)]
        status_text: String,
        #[serde(default)]
        headers: BTreeMap<String, String>,
    },
    /// A piece of the response body, appended in arrival order.
    BodyChunk { text: String },
    /// Upstream response is complete.
    Done,
    /// Nothing new yet, the upstream fetch is still running.
    Liveness,
}

impl RelayEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            RelayEvent::HeadersReceived { .. } => "headers_received",
            RelayEvent::BodyChunk { .. } => "body_chunk",
            RelayEvent::Done => "done",
            RelayEvent::Liveness => "liveness",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_state_numbers() {
        assert_eq!(ReadyState::Unsent.as_u16(), 0);
        assert_eq!(ReadyState::Opened.as_u16(), 1);
        assert_eq!(ReadyState::HeadersReceived.as_u16(), 2);
        assert_eq!(ReadyState::Loading.as_u16(), 3);
        assert_eq!(ReadyState::Done.as_u16(), 4);
    }

    #[test]
    fn test_headers_event_defaults() {
        let event: RelayEvent =
            serde_json::from_str(r#"{"event":"headers_received","status":204}"#).unwrap();
        assert_eq!(
            event,
            RelayEvent::HeadersReceived {
                status: 204,
                status_text: String::new(),
                headers: BTreeMap::new(),
            }
        );
    }

    #[test]
    fn test_unknown_event_rejected() {
        let result = serde_json::from_str::<RelayEvent>(r#"{"event":"redirect"}"#);
        assert!(result.is_err());
    }
}
