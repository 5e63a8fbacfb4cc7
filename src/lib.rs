pub mod config;
pub mod document;
pub mod error;
pub mod event;
pub mod runtime;
pub mod xhr;

// Core API
pub use runtime::{CallbackMessage, Runtime, SchedulerMessage, run_event_loop};
pub use xhr::{OpenOptions, XmlHttpRequest};

// Relay protocol
pub use event::{ReadyState, RelayEvent};
pub use runtime::fetch::request::SendBody;
pub use runtime::fetch::{ChannelOpener, HttpMethod, RelayChannel};
pub use runtime::registry::Token;

// Configuration, errors and capabilities
pub use config::RelayConfig;
pub use document::{Document, DocumentParser, ResponseXml};
pub use error::{ConfigError, XhrError};
