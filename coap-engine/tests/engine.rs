//! End-to-end exercises of [`CoapEngine`] over the in-process loopback
//! transport: registration, Observe, and the unknown-path fallback.

use coap_engine::engine::{CoapEngine, HandlerResponse, ResourceHandler};
use coap_engine::message::MsgCode;
use coap_engine::packet::Packet;
use coap_engine::resource::{method, HandlerRef, Listener, Resource};
use coap_engine::transport::loopback::{LoopbackAddr, LoopbackNetwork, LoopbackTransport};
use coap_engine::ContentFormat;
use coap_engine::EngineConfig;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

static PING_RESOURCES: &[Resource] = &[Resource::new("/ping", method::GET, false, 0)];
static PING_LISTENER: Listener = Listener::new(PING_RESOURCES);

static TEMP_RESOURCES: &[Resource] = &[Resource::new("/t", method::GET, true, 0)];
static TEMP_LISTENER: Listener = Listener::new(TEMP_RESOURCES);

struct Pong;

impl ResourceHandler<LoopbackAddr> for Pong {
    fn handle<'a>(
        &'a self,
        _request: &'a Packet<LoopbackAddr>,
    ) -> Pin<Box<dyn Future<Output = HandlerResponse> + Send + 'a>> {
        Box::pin(async move { HandlerResponse::content(ContentFormat::TEXT_PLAIN_UTF8, Vec::new()) })
    }
}

/// A handler whose response payload increments on every invocation, used to
/// check the value an `obs_send` notification carries.
struct Counter(AtomicU32);

impl ResourceHandler<LoopbackAddr> for Counter {
    fn handle<'a>(
        &'a self,
        _request: &'a Packet<LoopbackAddr>,
    ) -> Pin<Box<dyn Future<Output = HandlerResponse> + Send + 'a>> {
        Box::pin(async move {
            let n = self.0.fetch_add(1, Ordering::SeqCst);
            HandlerResponse::content(ContentFormat::TEXT_PLAIN_UTF8, vec![n as u8])
        })
    }
}

fn bind_pair() -> (LoopbackTransport, LoopbackTransport) {
    let network = LoopbackNetwork::new();
    (network.bind(1), network.bind(2))
}

/// S1: a plain `GET` to a registered resource gets a `2.05 Content` reply.
#[tokio::test]
async fn registered_resource_responds_with_content() {
    let (server_transport, client_transport) = bind_pair();

    let server = CoapEngine::init(server_transport);
    server.register_listener(&PING_LISTENER).await;
    let handler: HandlerRef = server.register_handler(Arc::new(Pong)).await;
    assert_eq!(handler, 0);

    let client = CoapEngine::init(client_transport);
    let response = client
        .req_send(MsgCode::MethodGet, "/ping", &[], &[], true, false, LoopbackAddr(1))
        .await
        .expect("request should succeed");

    let parsed = Packet::parse(&response, LoopbackAddr(1)).expect("valid response");
    assert_eq!(parsed.msg_code(), MsgCode::SuccessContent);
}

/// S5: a request for an unregistered path gets a `4.04 Not Found` reply.
#[tokio::test]
async fn unknown_path_returns_not_found() {
    let (server_transport, client_transport) = bind_pair();

    let server = CoapEngine::init(server_transport);
    server.register_listener(&PING_LISTENER).await;
    server.register_handler(Arc::new(Pong)).await;

    let client = CoapEngine::init(client_transport);
    let response = client
        .req_send(MsgCode::MethodGet, "/nope", &[], &[], true, false, LoopbackAddr(1))
        .await
        .expect("server still replies, just with an error code");

    let parsed = Packet::parse(&response, LoopbackAddr(1)).expect("valid response");
    assert_eq!(parsed.msg_code(), MsgCode::ClientErrorNotFound);
}

/// A request for a registered path with the wrong method gets `4.05`.
#[tokio::test]
async fn wrong_method_returns_method_not_allowed() {
    let (server_transport, client_transport) = bind_pair();

    let server = CoapEngine::init(server_transport);
    server.register_listener(&PING_LISTENER).await;
    server.register_handler(Arc::new(Pong)).await;

    let client = CoapEngine::init(client_transport);
    let response = client
        .req_send(MsgCode::MethodPut, "/ping", &[], &[], true, false, LoopbackAddr(1))
        .await
        .expect("server still replies, just with an error code");

    let parsed = Packet::parse(&response, LoopbackAddr(1)).expect("valid response");
    assert_eq!(parsed.msg_code(), MsgCode::ClientErrorMethodNotAllowed);
}

/// Requests must target an absolute path.
#[tokio::test]
async fn relative_path_is_rejected_before_any_send() {
    let (server_transport, client_transport) = bind_pair();
    let _server = CoapEngine::init(server_transport);
    let client = CoapEngine::init(client_transport);

    let err = client
        .req_send(MsgCode::MethodGet, "ping", &[], &[], true, false, LoopbackAddr(1))
        .await
        .unwrap_err();

    assert_eq!(err, coap_engine::Error::PathFormat);
}

/// S2: a confirmable request over a transport that accepts every send but
/// never delivers a reply eventually times out with exactly one
/// [`coap_engine::Error::Timeout`], after exhausting its retransmit budget.
#[tokio::test]
async fn send_over_unresponsive_transport_times_out() {
    use coap_engine::transport::NullTransport;

    let client = CoapEngine::init(NullTransport::<LoopbackAddr>::new());

    let err = client
        .req_send(MsgCode::MethodGet, "/x", &[], &[], true, false, LoopbackAddr(99))
        .await
        .unwrap_err();

    assert_eq!(err, coap_engine::Error::Timeout);
}

/// A failed send (nobody bound to the destination address) releases the
/// transaction slot it had claimed rather than leaking it -- sending
/// `REQ_WAITING_MAX` further requests to the same dead address must keep
/// succeeding (at the transport-failure level) instead of eventually
/// failing with `Error::NoSlot`.
#[tokio::test]
async fn failed_send_does_not_leak_its_transaction_slot() {
    let network = LoopbackNetwork::new();
    let client_transport = network.bind(1);
    let client = CoapEngine::init(client_transport);

    for _ in 0..(coap_engine::StandardCoapConstants::REQ_WAITING_MAX as u32 + 2) {
        let err = client
            .req_send(MsgCode::MethodGet, "/x", &[], &[], true, false, LoopbackAddr(99))
            .await
            .unwrap_err();
        assert_eq!(err, coap_engine::Error::HostNotFound);
    }
}

/// S3/S4: registering and then cancelling an Observe relationship, with the
/// observing side built directly on a raw [`Transport`] (rather than a
/// second [`CoapEngine`]) so the test can read the notification datagram
/// itself instead of racing the engine's own dispatch task for it.
#[tokio::test]
async fn observe_register_then_notify_then_deregister() {
    use coap_engine::message::MsgType;
    use coap_engine::message::VecMessageEncoder;
    use coap_engine::message::MsgToken;
    use coap_engine::message::MessageWrite;
    use coap_engine::option::OptionInsertExt;
    use coap_engine::transport::Transport;

    let network = LoopbackNetwork::new();
    let server_transport = network.bind(1);
    let observer_transport = network.bind(2);

    let server = CoapEngine::init(server_transport);
    server.register_listener(&TEMP_LISTENER).await;
    let handler: HandlerRef = server.register_handler(Arc::new(Counter(AtomicU32::new(0)))).await;

    let token = [0xF0, 0x0D];
    let mut encoder = VecMessageEncoder::new();
    encoder.set_msg_type(MsgType::Con);
    encoder.set_msg_code(MsgCode::MethodGet);
    encoder.set_msg_id(1);
    encoder.set_msg_token(MsgToken::new(&token));
    encoder.insert_option(coap_engine::option::URI_PATH, "t").unwrap();
    encoder
        .insert_option(coap_engine::option::OBSERVE, coap_engine::OBSERVE_REGISTER)
        .unwrap();

    observer_transport
        .send_to(encoder.as_bytes(), &LoopbackAddr(1))
        .await
        .expect("send to server");

    let mut buf = vec![0u8; 1152];
    let (len, _) = observer_transport.recv_from(&mut buf).await.expect("recv ack");
    let ack = Packet::parse(&buf[..len], LoopbackAddr(1)).expect("valid ack");
    assert_eq!(ack.msg_type(), MsgType::Ack);
    assert_eq!(ack.token(), &token[..]);
    assert!(ack.observe().is_some(), "registration ack should carry an Observe value");

    server.obs_send(
        handler,
        HandlerResponse::content(ContentFormat::TEXT_PLAIN_UTF8, vec![7]),
    );

    let (len, _) = tokio::time::timeout(std::time::Duration::from_secs(1), observer_transport.recv_from(&mut buf))
        .await
        .expect("notification should arrive")
        .expect("recv notification");
    let notice = Packet::parse(&buf[..len], LoopbackAddr(1)).expect("valid notification");
    assert_eq!(notice.msg_type(), MsgType::Non);
    assert_eq!(notice.token(), &token[..]);
    assert_eq!(notice.payload(), &[7]);
    assert!(notice.observe().is_some());

    // S4: deregister with `Observe: 1`, then confirm no further notification
    // is delivered.
    let mut dereg = VecMessageEncoder::new();
    dereg.set_msg_type(MsgType::Con);
    dereg.set_msg_code(MsgCode::MethodGet);
    dereg.set_msg_id(2);
    dereg.set_msg_token(MsgToken::new(&token));
    dereg.insert_option(coap_engine::option::URI_PATH, "t").unwrap();
    dereg
        .insert_option(coap_engine::option::OBSERVE, coap_engine::OBSERVE_DEREGISTER)
        .unwrap();

    observer_transport
        .send_to(dereg.as_bytes(), &LoopbackAddr(1))
        .await
        .expect("send deregister");

    let (len, _) = observer_transport.recv_from(&mut buf).await.expect("recv dereg ack");
    let dereg_ack = Packet::parse(&buf[..len], LoopbackAddr(1)).expect("valid ack");
    assert!(dereg_ack.observe().is_none(), "deregister response must not carry Observe");

    server.obs_send(
        handler,
        HandlerResponse::content(ContentFormat::TEXT_PLAIN_UTF8, vec![9]),
    );

    let timed_out = tokio::time::timeout(std::time::Duration::from_millis(200), observer_transport.recv_from(&mut buf))
        .await
        .is_err();
    assert!(timed_out, "no notification should be delivered after deregistering");
}
