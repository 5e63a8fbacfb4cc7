#![allow(dead_code)]

use relay_xhr::{ChannelOpener, RelayConfig, Runtime, Token, run_event_loop};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;
use url::Url;

pub const ENDPOINT: &str = "https://relay.test/proxy.js";
pub const BASE_URL: &str = "https://app.test/pages/index.html";

/// Opener that only records the URLs it was asked to load.
#[derive(Default)]
pub struct RecordingOpener {
    pub urls: RefCell<Vec<String>>,
}

impl ChannelOpener for RecordingOpener {
    fn open(&self, url: &str) {
        self.urls.borrow_mut().push(url.to_string());
    }
}

impl RecordingOpener {
    pub fn count(&self) -> usize {
        self.urls.borrow().len()
    }

    /// Query parameters of the most recent descriptor.
    pub fn last_params(&self) -> HashMap<String, String> {
        let urls = self.urls.borrow();
        let last = urls.last().expect("no channel was opened");
        Url::parse(last)
            .expect("descriptor should be a valid url")
            .query_pairs()
            .into_owned()
            .collect()
    }

    /// Token named by the `object` parameter of the most recent descriptor.
    pub fn last_token(&self) -> Token {
        let params = self.last_params();
        Token::from_object_ref(&params["object"]).expect("object should reference the registry")
    }
}

pub fn config() -> RelayConfig {
    RelayConfig::new(Url::parse(ENDPOINT).unwrap()).with_base_url(Url::parse(BASE_URL).unwrap())
}

/// Helper owning a runtime, its event loop and a recording opener
pub struct TestRunner {
    pub runtime: Runtime,
    pub opener: Rc<RecordingOpener>,
    event_loop_handle: Option<tokio::task::JoinHandle<()>>,
}

impl TestRunner {
    pub fn new() -> Self {
        Self::with_config(config())
    }

    pub fn with_config(config: RelayConfig) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let opener = Rc::new(RecordingOpener::default());
        let (runtime, scheduler_rx, callback_tx) = Runtime::with_opener(config, opener.clone());

        // Spawn event loop
        let event_loop_handle = tokio::spawn(async move {
            run_event_loop(scheduler_rx, callback_tx).await;
        });

        Self {
            runtime,
            opener,
            event_loop_handle: Some(event_loop_handle),
        }
    }

    /// Process callbacks for a duration
    pub async fn process_for(&mut self, duration: Duration) {
        let iterations = (duration.as_millis() / 10) as usize;
        for _ in 0..iterations {
            self.runtime.process_callbacks();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        // Final drain
        self.runtime.process_callbacks();
    }

    /// Shutdown the runtime
    pub async fn shutdown(mut self) {
        drop(self.runtime);
        if let Some(handle) = self.event_loop_handle.take() {
            let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;
        }
    }
}
