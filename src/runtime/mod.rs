pub mod fetch;
pub mod headers;
pub mod registry;
pub mod timer;
pub mod url;

use crate::config::RelayConfig;
use crate::document::DocumentParser;
use crate::event::RelayEvent;
use crate::xhr::{RequestState, XmlHttpRequest};
use fetch::{ChannelOpener, RelayChannel};
use registry::{Registry, Token};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;
use timer::{TimeoutGuard, TimerId};
use tokio::sync::mpsc;

/// Work for the background event loop.
#[derive(Debug)]
pub enum SchedulerMessage {
    ScheduleTimeout(TimerId, Token, Duration),
    ClearTimer(TimerId),
    /// Fetch a descriptor URL from the relay.
    OpenChannel(String),
    Shutdown,
}

/// Results the event loop hands back to the runtime's thread.
#[derive(Debug)]
pub enum CallbackMessage {
    Deliver(Token, RelayEvent),
    TimerFired(TimerId, Token),
}

/// State shared by a runtime and every request it created.
pub(crate) struct Dispatcher {
    pub(crate) config: RelayConfig,
    pub(crate) registry: RefCell<Registry<RefCell<RequestState>>>,
    pub(crate) opener: Rc<dyn ChannelOpener>,
    parser: RefCell<Option<Rc<dyn DocumentParser>>>,
    scheduler_tx: mpsc::UnboundedSender<SchedulerMessage>,
    next_timer_id: Cell<TimerId>,
}

impl Dispatcher {
    /// Start the timeout for `token`, or nothing if timeouts are disabled.
    pub(crate) fn arm_timeout(&self, token: Token) -> Option<TimeoutGuard> {
        let delay = self.config.timeout?;

        let id = self.next_timer_id.get();
        self.next_timer_id.set(id + 1);

        Some(TimeoutGuard::arm(
            id,
            token,
            delay,
            self.scheduler_tx.clone(),
        ))
    }

    pub(crate) fn document_parser(&self) -> Option<Rc<dyn DocumentParser>> {
        self.parser.borrow().clone()
    }
}

/// Owns the request registry and dispatches relay callbacks to requests.
///
/// Requests and callbacks live on the thread that owns the runtime; the
/// event loop only runs timers and channel fetches and reports back through
/// [`process_callbacks`](Self::process_callbacks).
pub struct Runtime {
    dispatcher: Rc<Dispatcher>,
    callback_rx: mpsc::UnboundedReceiver<CallbackMessage>,
}

impl Runtime {
    /// Runtime whose channels are fetched from the relay by the event loop.
    pub fn new(
        config: RelayConfig,
    ) -> (
        Self,
        mpsc::UnboundedReceiver<SchedulerMessage>,
        mpsc::UnboundedSender<CallbackMessage>,
    ) {
        Self::build(config, |scheduler_tx| {
            let opener: Rc<dyn ChannelOpener> = Rc::new(RelayChannel::new(scheduler_tx.clone()));
            opener
        })
    }

    /// Runtime with a custom channel opener.
    pub fn with_opener(
        config: RelayConfig,
        opener: Rc<dyn ChannelOpener>,
    ) -> (
        Self,
        mpsc::UnboundedReceiver<SchedulerMessage>,
        mpsc::UnboundedSender<CallbackMessage>,
    ) {
        Self::build(config, |_| opener)
    }

    fn build(
        config: RelayConfig,
        make_opener: impl FnOnce(&mpsc::UnboundedSender<SchedulerMessage>) -> Rc<dyn ChannelOpener>,
    ) -> (
        Self,
        mpsc::UnboundedReceiver<SchedulerMessage>,
        mpsc::UnboundedSender<CallbackMessage>,
    ) {
        let (scheduler_tx, scheduler_rx) = mpsc::unbounded_channel();
        let (callback_tx, callback_rx) = mpsc::unbounded_channel();

        let dispatcher = Rc::new(Dispatcher {
            opener: make_opener(&scheduler_tx),
            config,
            registry: RefCell::new(Registry::new()),
            parser: RefCell::new(None),
            scheduler_tx,
            next_timer_id: Cell::new(1),
        });

        (
            Self {
                dispatcher,
                callback_rx,
            },
            scheduler_rx,
            callback_tx,
        )
    }

    pub fn config(&self) -> &RelayConfig {
        &self.dispatcher.config
    }

    /// Create a new request in the UNSENT state.
    pub fn request(&self) -> XmlHttpRequest {
        XmlHttpRequest::new(self.dispatcher.clone())
    }

    pub fn set_document_parser(&self, parser: Rc<dyn DocumentParser>) {
        *self.dispatcher.parser.borrow_mut() = Some(parser);
    }

    /// Apply a relay event to the request registered under `token`.
    ///
    /// Returns false, without doing anything, when no live request holds the
    /// token (never sent, already finished, aborted or dropped).
    pub fn deliver(&self, token: Token, event: RelayEvent) -> bool {
        match XmlHttpRequest::registered(&self.dispatcher, token) {
            Some(request) => {
                log::debug!("deliver {} to request {}", event.kind(), token);
                request.apply(event);
                true
            }
            None => {
                log::debug!("dropping {} for unknown request {}", event.kind(), token);
                false
            }
        }
    }

    /// Drain everything the event loop has reported so far.
    pub fn process_callbacks(&mut self) -> usize {
        let mut processed = 0;

        while let Ok(msg) = self.callback_rx.try_recv() {
            match msg {
                CallbackMessage::Deliver(token, event) => {
                    self.deliver(token, event);
                }
                CallbackMessage::TimerFired(timer_id, token) => {
                    if let Some(request) = XmlHttpRequest::registered(&self.dispatcher, token) {
                        request.expire(timer_id);
                    }
                }
            }
            processed += 1;
        }

        processed
    }

    pub fn is_registered(&self, token: Token) -> bool {
        self.dispatcher.registry.borrow().contains(token)
    }

    /// Number of requests currently waiting on the relay.
    pub fn open_requests(&self) -> usize {
        self.dispatcher.registry.borrow_mut().prune();
        self.dispatcher.registry.borrow().len()
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        let _ = self
            .dispatcher
            .scheduler_tx
            .send(SchedulerMessage::Shutdown);
    }
}

/// Run timers and relay fetches until the runtime shuts down.
pub async fn run_event_loop(
    mut scheduler_rx: mpsc::UnboundedReceiver<SchedulerMessage>,
    callback_tx: mpsc::UnboundedSender<CallbackMessage>,
) {
    let client = reqwest::Client::new();
    let mut timers: HashMap<TimerId, tokio::task::JoinHandle<()>> = HashMap::new();

    while let Some(msg) = scheduler_rx.recv().await {
        match msg {
            SchedulerMessage::ScheduleTimeout(timer_id, token, delay) => {
                let tx = callback_tx.clone();
                let handle = tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(CallbackMessage::TimerFired(timer_id, token));
                });
                timers.insert(timer_id, handle);
            }
            SchedulerMessage::ClearTimer(timer_id) => {
                if let Some(handle) = timers.remove(&timer_id) {
                    handle.abort();
                }
            }
            SchedulerMessage::OpenChannel(url) => {
                log::debug!("opening relay channel {}", url);
                tokio::spawn(fetch::stream_relay(
                    client.clone(),
                    url,
                    callback_tx.clone(),
                ));
            }
            SchedulerMessage::Shutdown => {
                log::info!("Shutting down event loop");
                break;
            }
        }
    }

    for (_, handle) in timers {
        handle.abort();
    }
}
