//! The request object: a client that looks like the standard request
//! interface but travels through the relay.
//!
//! `open`, `set_request_header`, `send` and `abort` are called by the owner.
//! Everything after `send` is driven by relay events arriving through
//! [`Runtime::deliver`](crate::Runtime::deliver) or by the request's timeout.

use crate::document::ResponseXml;
use crate::error::XhrError;
use crate::event::{ReadyState, RelayEvent};
use crate::runtime::Dispatcher;
use crate::runtime::fetch::HttpMethod;
use crate::runtime::fetch::request::{Descriptor, SendBody, normalize_body};
use crate::runtime::headers::{RequestHeaders, ResponseHeaders};
use crate::runtime::registry::{Token, random_candidate};
use crate::runtime::timer::{TimeoutGuard, TimerId};
use crate::runtime::url::resolve_url;
use std::cell::RefCell;
use std::rc::Rc;
use url::Url;

pub const TIMEOUT_STATUS: u16 = 504;
pub const TIMEOUT_STATUS_TEXT: &str = "Gateway Timeout";

type Handler = Rc<dyn Fn(&XmlHttpRequest)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Unsent,
    OpenedUnsent,
    OpenedSent,
    HeadersReceived,
    Loading,
    Done,
}

impl Phase {
    fn ready_state(self) -> ReadyState {
        match self {
            Phase::Unsent => ReadyState::Unsent,
            Phase::OpenedUnsent | Phase::OpenedSent => ReadyState::Opened,
            Phase::HeadersReceived => ReadyState::HeadersReceived,
            Phase::Loading => ReadyState::Loading,
            Phase::Done => ReadyState::Done,
        }
    }

    /// Sent and waiting on the relay.
    fn in_flight(self) -> bool {
        matches!(
            self,
            Phase::OpenedSent | Phase::HeadersReceived | Phase::Loading
        )
    }
}

/// Options for [`XmlHttpRequest::open_with`].
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    /// `Some(false)` asks for synchronous mode, which is refused.
    pub asynchronous: Option<bool>,
    /// Kept with the request, never transmitted.
    pub user: Option<String>,
    /// Kept with the request, never transmitted.
    pub password: Option<String>,
}

pub(crate) struct RequestState {
    phase: Phase,
    method: Option<HttpMethod>,
    url: Option<Url>,
    user: Option<String>,
    password: Option<String>,
    request_headers: RequestHeaders,
    token: Option<Token>,
    status: Option<u16>,
    status_text: Option<String>,
    response_text: Option<String>,
    response_xml: ResponseXml,
    response_headers: Option<ResponseHeaders>,
    timeout: Option<TimeoutGuard>,
    handler: Option<Handler>,
}

impl RequestState {
    fn new() -> Self {
        Self {
            phase: Phase::Unsent,
            method: None,
            url: None,
            user: None,
            password: None,
            request_headers: RequestHeaders::new(),
            token: None,
            status: None,
            status_text: None,
            response_text: None,
            response_xml: ResponseXml::NotAttempted,
            response_headers: None,
            timeout: None,
            handler: None,
        }
    }

    fn clear_request(&mut self) {
        self.method = None;
        self.url = None;
        self.user = None;
        self.password = None;
        self.request_headers = RequestHeaders::new();
    }

    fn clear_response(&mut self) {
        self.status = None;
        self.status_text = None;
        self.response_text = None;
        self.response_xml = ResponseXml::NotAttempted;
        self.response_headers = None;
    }
}

/// A relayed request. Cloning yields another handle to the same request.
#[derive(Clone)]
pub struct XmlHttpRequest {
    state: Rc<RefCell<RequestState>>,
    dispatcher: Rc<Dispatcher>,
}

impl XmlHttpRequest {
    pub(crate) fn new(dispatcher: Rc<Dispatcher>) -> Self {
        Self {
            state: Rc::new(RefCell::new(RequestState::new())),
            dispatcher,
        }
    }

    /// Handle to the live request registered under `token`, if any.
    pub(crate) fn registered(dispatcher: &Rc<Dispatcher>, token: Token) -> Option<Self> {
        let entry = dispatcher.registry.borrow().get(token).cloned()?;

        match entry.upgrade() {
            Some(state) => Some(Self {
                state,
                dispatcher: dispatcher.clone(),
            }),
            None => {
                // Owner dropped the request without aborting it
                dispatcher.registry.borrow_mut().remove(token);
                None
            }
        }
    }

    // ============================================================================
    // Caller-facing operations
    // ============================================================================

    /// Configure an asynchronous request. See [`open_with`](Self::open_with).
    pub fn open(&self, method: &str, url: &str) -> Result<(), XhrError> {
        self.open_with(method, url, OpenOptions::default())
    }

    /// Set method and target, forgetting any previous request or response.
    ///
    /// Relative targets are resolved against the configured base location.
    /// Always moves to OPENED and fires the state-change handler.
    pub fn open_with(&self, method: &str, url: &str, options: OpenOptions) -> Result<(), XhrError> {
        if options.asynchronous == Some(false) {
            return Err(XhrError::UnsupportedMode);
        }

        let target = resolve_url(url, self.dispatcher.config.base_url.as_ref())?;
        let method = HttpMethod::parse(method);

        log::debug!("open {} {}", method, target);

        {
            let mut state = self.state.borrow_mut();
            self.release(&mut state);
            state.clear_response();
            state.method = Some(method);
            state.url = Some(target);
            state.user = options.user;
            state.password = options.password;
            state.request_headers = RequestHeaders::new();
            state.phase = Phase::OpenedUnsent;
        }

        self.notify();
        Ok(())
    }

    /// Add a request header. Repeating a name appends with `", "`.
    pub fn set_request_header(&self, name: &str, value: &str) -> Result<(), XhrError> {
        let mut state = self.state.borrow_mut();
        if state.phase != Phase::OpenedUnsent {
            return Err(XhrError::InvalidState(
                "request headers can only be set after open and before send",
            ));
        }
        state.request_headers.append(name, value);
        Ok(())
    }

    /// Send without a body.
    pub fn send(&self) -> Result<(), XhrError> {
        self.dispatch(None)
    }

    /// Send with a body. GET and HEAD drop it.
    pub fn send_body(&self, body: impl Into<SendBody>) -> Result<(), XhrError> {
        self.dispatch(Some(body.into()))
    }

    fn dispatch(&self, body: Option<SendBody>) -> Result<(), XhrError> {
        let (token, descriptor_url) = {
            let mut state = self.state.borrow_mut();
            if state.phase != Phase::OpenedUnsent {
                return Err(XhrError::InvalidState("send requires an opened, unsent request"));
            }
            let (Some(method), Some(target)) = (state.method.clone(), state.url.clone()) else {
                return Err(XhrError::InvalidState("send requires an opened, unsent request"));
            };

            let body = normalize_body(&method, body, &mut state.request_headers);

            let token = {
                let mut registry = self.dispatcher.registry.borrow_mut();
                let token = registry.allocate(random_candidate);
                registry.insert(token, Rc::downgrade(&self.state));
                token
            };

            let object = token.object_ref();
            let descriptor_url = Descriptor {
                target: &target,
                object: &object,
                method: &method,
                headers: &state.request_headers,
                body: body.as_deref(),
            }
            .to_url(&self.dispatcher.config.endpoint);

            state.token = Some(token);
            state.phase = Phase::OpenedSent;
            state.timeout = self.dispatcher.arm_timeout(token);

            log::debug!("send {} {} as request {}", method, target, token);

            (token, descriptor_url)
        };

        self.notify();

        // The handler may have aborted or reopened us
        if self.state.borrow().token != Some(token) {
            log::debug!("request {} cancelled before the channel opened", token);
            return Ok(());
        }

        self.dispatcher.opener.open(&descriptor_url);
        Ok(())
    }

    /// Cancel the request and return to UNSENT.
    ///
    /// A request that was waiting on the relay passes through DONE first,
    /// firing the handler once. Later relay events for it are ignored.
    pub fn abort(&self) {
        let was_in_flight = {
            let mut state = self.state.borrow_mut();
            let in_flight = state.phase.in_flight();

            self.release(&mut state);
            state.clear_request();
            state.clear_response();
            state.phase = if in_flight { Phase::Done } else { Phase::Unsent };

            in_flight
        };

        if was_in_flight {
            log::debug!("request aborted");
            self.notify();

            let mut state = self.state.borrow_mut();
            if state.phase == Phase::Done {
                state.phase = Phase::Unsent;
            }
        }
    }

    /// Install the state-change handler. The handler receives a handle to
    /// this request and may call any method on it.
    pub fn set_onreadystatechange(&self, handler: impl Fn(&XmlHttpRequest) + 'static) {
        self.state.borrow_mut().handler = Some(Rc::new(handler));
    }

    // ============================================================================
    // Accessors
    // ============================================================================

    pub fn ready_state(&self) -> ReadyState {
        self.state.borrow().phase.ready_state()
    }

    /// True between `send` and DONE.
    pub fn is_sent(&self) -> bool {
        self.state.borrow().phase.in_flight()
    }

    pub fn method(&self) -> Option<String> {
        self.state
            .borrow()
            .method
            .as_ref()
            .map(|m| m.as_str().to_string())
    }

    pub fn url(&self) -> Option<Url> {
        self.state.borrow().url.clone()
    }

    pub fn user(&self) -> Option<String> {
        self.state.borrow().user.clone()
    }

    pub fn password(&self) -> Option<String> {
        self.state.borrow().password.clone()
    }

    /// Token the request is registered under while it waits on the relay.
    pub fn token(&self) -> Option<Token> {
        self.state.borrow().token
    }

    pub fn request_header(&self, name: &str) -> Option<String> {
        self.state
            .borrow()
            .request_headers
            .get(name)
            .map(str::to_string)
    }

    pub fn request_headers(&self) -> RequestHeaders {
        self.state.borrow().request_headers.clone()
    }

    pub fn status(&self) -> Option<u16> {
        self.state.borrow().status
    }

    pub fn status_text(&self) -> Option<String> {
        self.state.borrow().status_text.clone()
    }

    pub fn response_text(&self) -> Option<String> {
        self.state.borrow().response_text.clone()
    }

    pub fn response_xml(&self) -> ResponseXml {
        self.state.borrow().response_xml.clone()
    }

    pub fn get_response_header(&self, name: &str) -> Option<String> {
        self.state
            .borrow()
            .response_headers
            .as_ref()?
            .get(name)
            .map(str::to_string)
    }

    /// Response headers as `name: value` lines, or `None` before headers arrive.
    pub fn get_all_response_headers(&self) -> Option<String> {
        self.state
            .borrow()
            .response_headers
            .as_ref()
            .map(ResponseHeaders::to_header_block)
    }

    // ============================================================================
    // Relay side
    // ============================================================================

    /// Apply one relay event. Only called for registered requests.
    pub(crate) fn apply(&self, event: RelayEvent) {
        {
            let mut state = self.state.borrow_mut();
            if !state.phase.in_flight() {
                log::warn!("ignoring {} for a request that is not in flight", event.kind());
                return;
            }

            match event {
                RelayEvent::Liveness => {
                    self.rearm(&mut state);
                    return;
                }
                RelayEvent::HeadersReceived {
                    status,
                    status_text,
                    headers,
                } => {
                    state.status = Some(status);
                    state.status_text = Some(status_text);
                    state.response_headers = Some(ResponseHeaders::from(headers));
                    state.phase = Phase::HeadersReceived;
                    self.rearm(&mut state);
                }
                RelayEvent::BodyChunk { text } => {
                    if state.phase != Phase::Loading {
                        state.phase = Phase::Loading;
                        state.response_text = Some(String::new());
                    }
                    state
                        .response_text
                        .get_or_insert_with(String::new)
                        .push_str(&text);
                    self.parse_response(&mut state);
                    self.rearm(&mut state);
                }
                RelayEvent::Done => {
                    state.phase = Phase::Done;
                }
            }
        }

        self.notify();
    }

    /// Fail the request with 504 if `timer_id` is still its current timeout.
    pub(crate) fn expire(&self, timer_id: TimerId) {
        {
            let mut state = self.state.borrow_mut();
            let current = state.timeout.as_ref().map(TimeoutGuard::id);
            if current != Some(timer_id) || !state.phase.in_flight() {
                log::debug!("ignoring stale timeout {}", timer_id);
                return;
            }

            if let Some(token) = state.token {
                log::warn!("request {} timed out waiting for the relay", token);
            }

            state.status = Some(TIMEOUT_STATUS);
            state.status_text = Some(TIMEOUT_STATUS_TEXT.to_string());
            state.phase = Phase::Done;
        }

        self.notify();
    }

    fn rearm(&self, state: &mut RequestState) {
        state.timeout = None;
        if let Some(token) = state.token {
            state.timeout = self.dispatcher.arm_timeout(token);
        }
    }

    fn parse_response(&self, state: &mut RequestState) {
        let Some(parser) = self.dispatcher.document_parser() else {
            return;
        };
        let Some(text) = state.response_text.as_deref() else {
            return;
        };

        state.response_xml = match parser.parse(text) {
            Ok(document) => ResponseXml::Document(document),
            Err(e) => {
                log::debug!("response is not a document: {}", e);
                ResponseXml::Unavailable
            }
        };
    }

    /// Drop the registry entry and cancel the timeout. Safe to repeat.
    fn release(&self, state: &mut RequestState) {
        state.timeout = None;
        if let Some(token) = state.token.take() {
            self.dispatcher.registry.borrow_mut().remove(token);
        }
    }

    /// Finalize if DONE, then run the state-change handler.
    fn notify(&self) {
        let handler = {
            let mut state = self.state.borrow_mut();
            if state.phase == Phase::Done {
                self.release(&mut state);
            }
            state.handler.clone()
        };

        if let Some(handler) = handler {
            handler(self);
        }
    }
}

impl Drop for XmlHttpRequest {
    fn drop(&mut self) {
        // Last handle gone: nobody can observe the request anymore
        if Rc::strong_count(&self.state) != 1 {
            return;
        }
        if let Ok(mut state) = self.state.try_borrow_mut() {
            state.timeout = None;
            if let Some(token) = state.token.take() {
                log::debug!("request {} dropped while in flight", token);
                if let Ok(mut registry) = self.dispatcher.registry.try_borrow_mut() {
                    registry.remove(token);
                }
            }
        }
    }
}

impl std::fmt::Debug for XmlHttpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("XmlHttpRequest")
            .field("phase", &state.phase)
            .field("method", &state.method)
            .field("url", &state.url.as_ref().map(Url::as_str))
            .field("token", &state.token)
            .field("status", &state.status)
            .finish()
    }
}
