use coap_engine::engine::{CoapEngine, HandlerResponse, ResourceHandler};
use coap_engine::message::MsgCode;
use coap_engine::packet::Packet;
use coap_engine::resource::{method, HandlerRef, Listener, Resource};
use coap_engine::ContentFormat;
use coap_engine_tokio::TokioUdpTransport;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;

static RESOURCES: &[Resource] = &[Resource::new("/test", method::GET, false, 0)];
static LISTENER: Listener = Listener::new(RESOURCES);

struct Echo;

impl ResourceHandler<SocketAddr> for Echo {
    fn handle<'a>(
        &'a self,
        _request: &'a Packet<SocketAddr>,
    ) -> Pin<Box<dyn Future<Output = HandlerResponse> + Send + 'a>> {
        Box::pin(async move { HandlerResponse::content(ContentFormat::TEXT_PLAIN_UTF8, b"hello".to_vec()) })
    }
}

#[tokio::test]
async fn test_tokio_round_trip() {
    let server_transport = TokioUdpTransport::bind("127.0.0.1:0").await.expect("bind failed");
    let server_addr = server_transport.local_addr().expect("local_addr failed");
    let server = CoapEngine::init(server_transport);
    server.register_listener(&LISTENER).await;
    let handler_ref: HandlerRef = server.register_handler(std::sync::Arc::new(Echo)).await;
    assert_eq!(handler_ref, 0);

    let client_transport = TokioUdpTransport::bind("127.0.0.1:0").await.expect("bind failed");
    let client = CoapEngine::init(client_transport);

    let response = client
        .req_send(MsgCode::MethodGet, "/test", &[], &[], true, false, server_addr)
        .await
        .expect("request failed");

    assert!(!response.is_empty());
}
