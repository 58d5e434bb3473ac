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
//! The engine's single dispatch task.
//!
//! Every piece of mutable engine state is touched from exactly one place:
//! the loop in [`run`]. Public API calls on [`crate::engine::CoapEngine`]
//! never mutate the transaction table or observe registry directly; they
//! take the allocation mutex just long enough to claim a slot, build the
//! outgoing datagram, and hand it to the transport, while inbound
//! processing and timer expiry are handled exclusively here.

use crate::engine::{CoapEngine, HandlerResponse, ResourceHandler};
use crate::message::MsgCode;
use crate::message::MsgType;
use crate::message::VecMessageEncoder;
use crate::message::MessageWrite;
use crate::option::{OptionInsertExt, OBSERVE};
use crate::packet::Packet;
use crate::resource::{lookup_chain, LookupResult};
use crate::transaction::{MemoHandle, TransactionOutcome};
use crate::trans_params::EngineConfig;
use crate::transport::Transport;
use std::sync::Arc;

/// A message sent through the dispatch task's own mailbox, distinct from
/// inbound network traffic.
pub(crate) enum Signal {
    /// A retransmit timer for the named memo has fired.
    Timeout(MemoHandle),
    /// A notification should be sent for the named resource; carries the
    /// handler-supplied response to avoid re-invoking the handler from the
    /// dispatch task.
    Notify {
        resource: crate::resource::HandlerRef,
        response: HandlerResponse,
    },
    /// Asks the dispatch loop to exit.
    #[allow(dead_code)]
    Shutdown,
}

/// Runs the dispatch loop until [`Signal::Shutdown`] is received.
///
/// This is the only task that ever calls [`Transport::recv_from`], ever
/// resends a `CON` message, and ever completes a transaction; every other
/// part of the engine communicates with it through the mailbox or through
/// the allocation mutex.
pub(crate) async fn run<T: Transport + 'static, C: EngineConfig + 'static>(
    engine: Arc<CoapEngine<T, C>>,
) {
    let mut buf = vec![0u8; C::PDU_BUF_SIZE];
    let mut mailbox = engine.take_mailbox_receiver();

    loop {
        tokio::select! {
            recv_result = engine.transport.recv_from(&mut buf) => {
                match recv_result {
                    Ok((len, from)) => handle_datagram(&engine, &buf[..len], from).await,
                    Err(_) => continue,
                }
            }
            signal = mailbox.recv() => {
                match signal {
                    Some(Signal::Timeout(handle)) => handle_timeout(&engine, handle).await,
                    Some(Signal::Notify { resource, response }) => {
                        send_notifications(&engine, resource, response).await
                    }
                    Some(Signal::Shutdown) | None => break,
                }
            }
        }
    }
}

async fn handle_datagram<T: Transport + 'static, C: EngineConfig + 'static>(
    engine: &Arc<CoapEngine<T, C>>,
    bytes: &[u8],
    from: T::Addr,
) {
    let packet = match Packet::parse(bytes, from) {
        Ok(p) => p,
        Err(err) => {
            debug!("dropping malformed datagram: {:?}", err);
            return;
        }
    };

    if packet.is_empty_message() {
        return;
    }

    if packet.is_request() {
        handle_request(engine, packet).await;
    } else {
        handle_response(engine, packet).await;
    }
}

async fn handle_response<T: Transport + 'static, C: EngineConfig + 'static>(
    engine: &Arc<CoapEngine<T, C>>,
    packet: Packet<T::Addr>,
) {
    let is_reset = packet.msg_type() == MsgType::Res;

    let mut state = engine.state.lock().await;
    let handle = state
        .transactions
        .find(packet.msg_id(), packet.token(), packet.remote());

    let handle = match handle {
        Some(h) => h,
        None => return,
    };

    if packet.msg_type() == MsgType::Con {
        // A separate (non-piggybacked) response: the remote sent its own new
        // CON carrying the answer instead of piggybacking it on the ACK. We
        // still deliver it by token match below, but we don't yet send the
        // empty ACK RFC7252 Section 5.2.2 says this response is itself owed.
        warn!("separate CON response for memo {} is not ACKed (unsupported)", handle);
    }

    state.transactions.complete(handle);
    let responder = state.responders[handle].take();
    drop(state);

    if let Some(tx) = responder {
        let outcome = if is_reset {
            TransactionOutcome::Reset
        } else {
            TransactionOutcome::Response(packet.message_bytes())
        };
        let _ = tx.send(outcome);
    }
}

async fn handle_request<T: Transport + 'static, C: EngineConfig + 'static>(
    engine: &Arc<CoapEngine<T, C>>,
    packet: Packet<T::Addr>,
) {
    let path = packet.path().to_string();
    let code = packet.msg_code();

    let lookup = {
        let listeners = engine.listeners.lock().await;
        lookup_chain(listeners.iter().copied(), &path, code)
    };

    let mut observe_value = None;

    let response = match lookup {
        LookupResult::NoMatch => {
            debug!("no resource registered for {:?}", path);
            HandlerResponse::error(MsgCode::ClientErrorNotFound)
        }
        LookupResult::WrongMethod => {
            debug!("{:?} does not accept {:?}", path, code);
            HandlerResponse::error(MsgCode::ClientErrorMethodNotAllowed)
        }
        LookupResult::Found(resource) => {
            let observe_request = code == MsgCode::MethodGet && packet.observe().is_some();

            let handler = engine.handler_for(resource.handler());
            let response = match handler {
                Some(handler) => handler.handle(&packet).await,
                None => HandlerResponse::error(MsgCode::ServerErrorInternalServerError),
            };

            if resource.observable() && observe_request && response.code.is_success() {
                observe_value =
                    register_or_deregister_observe(engine, resource.handler(), &packet).await;
            }

            response
        }
    };

    send_response(engine, &packet, response, observe_value).await;
}

/// Registers or deregisters the Observe relationship implied by `packet`,
/// returning the counter value to echo in the response -- present on a
/// successful registration, absent on deregistration or when the observer
/// table is full (per [`Error::ObserveFull`]'s handling in spec §7: the
/// Observe option is simply omitted from an otherwise normal response).
async fn register_or_deregister_observe<T: Transport + 'static, C: EngineConfig + 'static>(
    engine: &Arc<CoapEngine<T, C>>,
    resource: crate::resource::HandlerRef,
    packet: &Packet<T::Addr>,
) -> Option<u32> {
    let deregister = packet.observe() == Some(crate::consts::OBSERVE_DEREGISTER);
    let mut state = engine.state.lock().await;

    if deregister {
        if let Some(handle) = state.observe.find(resource, packet.remote(), packet.token()) {
            state.observe.deregister(handle);
            debug!("observe: deregistered {:?} for token {:?}", resource, packet.token());
        }
        None
    } else {
        match state
            .observe
            .register(resource, *packet.remote(), packet.token())
        {
            Ok(_) => {
                drop(state);
                debug!("observe: registered {:?} for token {:?}", resource, packet.token());
                Some(engine.next_observe_value())
            }
            Err(err) => {
                warn!("observe: registration rejected ({:?}), falling back to a plain response", err);
                None
            }
        }
    }
}

async fn send_response<T: Transport + 'static, C: EngineConfig + 'static>(
    engine: &Arc<CoapEngine<T, C>>,
    request: &Packet<T::Addr>,
    response: HandlerResponse,
    observe_value: Option<u32>,
) {
    let mut encoder = VecMessageEncoder::new();
    let ack_type = if request.msg_type() == MsgType::Con {
        MsgType::Ack
    } else {
        MsgType::Non
    };
    encoder.set_msg_type(ack_type);
    encoder.set_msg_id(request.msg_id());
    encoder.set_msg_code(response.code);
    encoder.set_msg_token(crate::message::MsgToken::new(request.token()));

    if let Some(value) = observe_value {
        let _ = encoder.insert_option(OBSERVE, value);
    }
    if let Some(cf) = response.content_format {
        let _ = encoder.insert_option(crate::option::CONTENT_FORMAT, cf);
    }
    if !response.payload.is_empty() {
        let _ = encoder.append_payload_bytes(&response.payload);
    }

    let _ = engine
        .transport
        .send_to(encoder.as_bytes(), request.remote())
        .await;
}

async fn handle_timeout<T: Transport + 'static, C: EngineConfig + 'static>(
    engine: &Arc<CoapEngine<T, C>>,
    handle: MemoHandle,
) {
    let mut state = engine.state.lock().await;
    let result = state.transactions.on_retransmit_timer(handle, &engine.trans_params());

    match result {
        Ok(Some((bytes, delay))) => {
            let remote = state.transactions.remote(handle);
            drop(state);
            debug!("retransmitting memo {} in {:?}", handle, delay);
            if let Some(remote) = remote {
                let _ = engine.transport.send_to(&bytes, &remote).await;
            }
            engine.schedule_timeout(handle, delay);
        }
        Ok(None) | Err(_) => {
            debug!("memo {} timed out", handle);
            state.transactions.release(handle);
            let responder = state.responders[handle].take();
            drop(state);
            if let Some(tx) = responder {
                let _ = tx.send(TransactionOutcome::Timeout);
            }
        }
    }
}

async fn send_notifications<T: Transport + 'static, C: EngineConfig + 'static>(
    engine: &Arc<CoapEngine<T, C>>,
    resource: crate::resource::HandlerRef,
    response: HandlerResponse,
) {
    let targets: Vec<(T::Addr, Vec<u8>)> = {
        let state = engine.state.lock().await;
        state
            .observe
            .observers_of(resource)
            .map(|(addr, token)| (addr, token.to_vec()))
            .collect()
    };

    let seq = engine.next_observe_value();

    for (remote, token) in targets {
        let mut encoder = VecMessageEncoder::new();
        encoder.set_msg_type(MsgType::Non);
        encoder.set_msg_id(engine.next_msg_id());
        encoder.set_msg_code(response.code);
        encoder.set_msg_token(crate::message::MsgToken::new(&token));
        let _ = encoder.insert_option(OBSERVE, seq);
        if let Some(cf) = response.content_format {
            let _ = encoder.insert_option(crate::option::CONTENT_FORMAT, cf);
        }
        if !response.payload.is_empty() {
            let _ = encoder.append_payload_bytes(&response.payload);
        }
        let _ = engine.transport.send_to(encoder.as_bytes(), &remote).await;
    }
}
