// Copyright 2019 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
//! The public engine: request construction, sending, and resource
//! registration.
//!
//! [`CoapEngine::init`] is a two-phase lifecycle like the rest of this
//! crate's singletons: construction returns an `Arc` immediately, and the
//! dispatch task that actually drives the socket is spawned separately so
//! that [`CoapEngine::register_listener`] can still run beforehand without
//! racing the first inbound datagram.

use crate::message::MsgCode;
use crate::message::MsgType;
use crate::message::VecMessageEncoder;
use crate::message::MsgToken;
use crate::message::MessageWrite;
use crate::option::OptionInsertExt;
use crate::packet::Packet;
use crate::resource::{HandlerRef, Listener};
use crate::transaction::{MemoHandle, TransactionOutcome, TransactionTable};
use crate::trans_params::{EngineConfig, StandardCoapConstants, TransParams};
use crate::transport::Transport;
use crate::{observe, ContentFormat, Error};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, Mutex};

/// The response an application's [`ResourceHandler`] produces for a request.
#[derive(Debug, Clone)]
pub struct HandlerResponse {
    pub code: MsgCode,
    pub content_format: Option<ContentFormat>,
    pub payload: Vec<u8>,
}

impl HandlerResponse {
    /// A successful `2.05 Content` response carrying `payload`.
    pub fn content(content_format: ContentFormat, payload: Vec<u8>) -> Self {
        HandlerResponse {
            code: MsgCode::SuccessContent,
            content_format: Some(content_format),
            payload,
        }
    }

    /// An empty response with the given (typically error) code.
    pub fn error(code: MsgCode) -> Self {
        HandlerResponse {
            code,
            content_format: None,
            payload: Vec::new(),
        }
    }
}

/// The capability a registered [`crate::resource::Resource`] exposes to the
/// dispatch loop.
///
/// Implementations are looked up by [`HandlerRef`] and invoked once per
/// matching request; an implementation that serves several paths can
/// branch on [`Packet::path`] itself, or the application can register one
/// handler per path if it prefers a 1:1 mapping.
pub trait ResourceHandler<Addr>: Send + Sync {
    /// Handles a single request, producing the response to send back.
    fn handle<'a>(
        &'a self,
        request: &'a Packet<Addr>,
    ) -> Pin<Box<dyn Future<Output = HandlerResponse> + Send + 'a>>;
}

pub(crate) struct EngineState<Addr, C: EngineConfig> {
    pub(crate) transactions: TransactionTable<Addr, C>,
    pub(crate) responders: Vec<Option<oneshot::Sender<TransactionOutcome>>>,
    pub(crate) observe: observe::ObserveRegistry<Addr, C>,
}

/// A request/response CoAP engine with Observe support.
///
/// Every table inside a `CoapEngine` is a fixed-capacity arena sized by
/// `C`; there is no point at which the engine grows a table at runtime; a
/// caller that exceeds a table's capacity gets [`Error::NoSlot`] or
/// [`Error::ObserveFull`] back rather than an allocation.
pub struct CoapEngine<T: Transport, C: EngineConfig = StandardCoapConstants> {
    pub(crate) transport: T,
    pub(crate) state: Mutex<EngineState<T::Addr, C>>,
    pub(crate) listeners: Mutex<Vec<&'static Listener>>,
    handlers: Mutex<Vec<Arc<dyn ResourceHandler<T::Addr>>>>,
    mailbox_tx: mpsc::UnboundedSender<crate::dispatch::Signal>,
    mailbox_rx: Mutex<Option<mpsc::UnboundedReceiver<crate::dispatch::Signal>>>,
    next_msg_id: AtomicU16,
    start: Instant,
    params: C,
}

impl<T: Transport + 'static, C: EngineConfig + 'static> CoapEngine<T, C> {
    /// Creates a new engine over `transport` and spawns its dispatch task.
    ///
    /// The sentinel listener serving `/.well-known/core` is registered
    /// automatically; further listeners can be added with
    /// [`CoapEngine::register_listener`].
    pub fn init(transport: T) -> Arc<Self> {
        let (mailbox_tx, mailbox_rx) = mpsc::unbounded_channel();

        let state = EngineState {
            transactions: TransactionTable::new(),
            responders: {
                let mut v = Vec::with_capacity(C::REQ_WAITING_MAX);
                v.resize_with(C::REQ_WAITING_MAX, || None);
                v
            },
            observe: observe::ObserveRegistry::new(),
        };

        let engine = Arc::new(CoapEngine {
            transport,
            state: Mutex::new(state),
            listeners: Mutex::new(Vec::new()),
            handlers: Mutex::new(Vec::new()),
            mailbox_tx,
            mailbox_rx: Mutex::new(Some(mailbox_rx)),
            next_msg_id: AtomicU16::new(rand::random::<u16>()),
            start: Instant::now(),
            params: C::default(),
        });

        tokio::spawn(crate::dispatch::run(engine.clone()));

        engine
    }

    /// Adds a listener to the resource chain, searched before any listener
    /// registered earlier.
    pub async fn register_listener(&self, listener: &'static Listener) {
        self.listeners.lock().await.insert(0, listener);
    }

    /// Registers `handler` and returns the [`HandlerRef`] to use when
    /// building a [`crate::resource::Resource`] for it.
    pub async fn register_handler(&self, handler: Arc<dyn ResourceHandler<T::Addr>>) -> HandlerRef {
        let mut handlers = self.handlers.lock().await;
        handlers.push(handler);
        (handlers.len() - 1) as HandlerRef
    }

    pub(crate) async fn handler_for(&self, handler: HandlerRef) -> Option<Arc<dyn ResourceHandler<T::Addr>>> {
        self.handlers.lock().await.get(handler as usize).cloned()
    }

    pub(crate) fn take_mailbox_receiver(
        &self,
    ) -> mpsc::UnboundedReceiver<crate::dispatch::Signal> {
        self.mailbox_rx
            .try_lock()
            .ok()
            .and_then(|mut g| g.take())
            .expect("dispatch task may only take the mailbox receiver once")
    }

    pub(crate) fn trans_params(&self) -> &C {
        &self.params
    }

    pub(crate) fn next_msg_id(&self) -> u16 {
        self.next_msg_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn next_observe_value(&self) -> u32 {
        let micros = observe::micros_since(self.start, Instant::now());
        observe::observe_value_from_micros(micros, C::OBS_TICK_EXPONENT)
    }

    pub(crate) fn schedule_timeout(self: &Arc<Self>, handle: MemoHandle, delay: Duration) {
        let engine = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = engine
                .mailbox_tx
                .send(crate::dispatch::Signal::Timeout(handle));
        });
    }

    /// Sends a request built from `method`/`path`/`payload` to `remote` and
    /// waits for the resolution: a response, a reset, or a timeout.
    ///
    /// `confirmable` selects `CON` (retried per [`TransParams::calc_retransmit_duration`])
    /// versus `NON` (sent once, timing out after [`TransParams::coap_non_lifetime`]).
    /// Setting `observe` appends `Observe: 0`, requesting a notification
    /// stream instead of a single reply; subsequent notifications are not
    /// returned from this call, which resolves on the first response only,
    /// matching a plain request/response's `.await` semantics.
    pub async fn req_send(
        self: &Arc<Self>,
        method: MsgCode,
        path: &str,
        query: &[(&str, &str)],
        payload: &[u8],
        confirmable: bool,
        observe: bool,
        remote: T::Addr,
    ) -> Result<Vec<u8>, Error> {
        if !path.starts_with('/') {
            return Err(Error::PathFormat);
        }

        let mut encoder = VecMessageEncoder::new();
        encoder.set_msg_type(if confirmable { MsgType::Con } else { MsgType::Non });
        encoder.set_msg_code(method);

        let msg_id = self.next_msg_id();
        encoder.set_msg_id(msg_id);

        let mut token = [0u8; 8];
        let token_len = C::TOKEN_LEN.min(token.len());
        {
            use rand::Rng;
            rand::thread_rng().fill(&mut token[..token_len]);
        }
        encoder.set_msg_token(MsgToken::new(&token[..token_len]));

        for segment in path.trim_start_matches('/').split('/') {
            if !segment.is_empty() {
                encoder
                    .insert_option(crate::option::URI_PATH, segment)
                    .map_err(|_| Error::PathFormat)?;
            }
        }
        for (key, value) in query {
            let item = format!("{}={}", key, value);
            encoder
                .insert_option(crate::option::URI_QUERY, item.as_str())
                .map_err(|_| Error::PathFormat)?;
        }
        if observe {
            encoder
                .insert_option(crate::option::OBSERVE, crate::consts::OBSERVE_REGISTER)
                .map_err(|_| Error::InvalidArgument)?;
        }
        if !payload.is_empty() {
            encoder.append_payload_bytes(payload)?;
        }

        let (tx, rx) = oneshot::channel();

        let handle = {
            let mut state = self.state.lock().await;
            let handle = state.transactions.claim(
                msg_id,
                &token[..token_len],
                remote,
                confirmable,
                encoder.as_bytes(),
            )?;
            state.responders[handle] = Some(tx);
            handle
        };

        if let Err(err) = self.transport.send_to(encoder.as_bytes(), &remote).await {
            // The memo was already claimed above; release it so a transport
            // failure doesn't permanently burn a table slot.
            let mut state = self.state.lock().await;
            state.transactions.release(handle);
            state.responders[handle] = None;
            return Err(err);
        }

        if confirmable {
            self.schedule_timeout(handle, self.params.calc_retransmit_duration(1));
        } else {
            self.schedule_timeout(handle, self.params.coap_non_lifetime());
        }

        match rx.await {
            Ok(TransactionOutcome::Response(bytes)) => Ok(bytes),
            Ok(TransactionOutcome::Reset) => Err(Error::Reset),
            Ok(TransactionOutcome::Timeout) => Err(Error::Timeout),
            Err(_) => Err(Error::Cancelled),
        }
    }

    /// Pushes a notification to every live observer of `resource`.
    ///
    /// This is how an application reports that a resource's representation
    /// changed; it never blocks waiting for delivery, since Observe
    /// notifications are sent `NON` and are not individually acknowledged
    /// by this API (a client that wants reliability re-registers).
    pub fn obs_send(self: &Arc<Self>, resource: HandlerRef, response: HandlerResponse) {
        let _ = self
            .mailbox_tx
            .send(crate::dispatch::Signal::Notify { resource, response });
    }

    /// Renders the current resource chain as an [IETF-RFC6690] link-format
    /// document, suitable for serving `/.well-known/core`.
    ///
    /// [IETF-RFC6690]: https://tools.ietf.org/html/rfc6690
    pub async fn get_resource_list(&self) -> String {
        use crate::link_format::LinkFormatWrite;
        use crate::uri::RelRefBuf;

        let mut buffer = String::new();
        let mut write = LinkFormatWrite::new(&mut buffer);

        for listener in self.listeners.lock().await.iter() {
            for resource in listener.resources() {
                if let Ok(rel) = RelRefBuf::from_str(resource.path()) {
                    let link = write.link(rel.as_rel_ref());
                    let _ = if resource.observable() {
                        link.attr(crate::link_format::LINK_ATTR_OBSERVABLE, "").finish()
                    } else {
                        link.finish()
                    };
                }
            }
        }

        let _ = write.finish();
        buffer
    }
}
