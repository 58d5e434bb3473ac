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

use coap_engine::transport::Transport;
use coap_engine::Error;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use tokio::net::UdpSocket;

/// A [`Transport`] backed by a [`tokio::net::UdpSocket`].
///
/// Unlike the mio/`PollEvented`-based socket this crate shipped in earlier
/// versions, this wraps `tokio::net::UdpSocket` directly: `send_to`/`recv_from`
/// are already `async fn`s on the socket itself, so there is no readiness
/// polling to hand-roll here.
#[derive(Debug)]
pub struct TokioUdpTransport {
    socket: UdpSocket,
}

impl TokioUdpTransport {
    /// Binds a new UDP socket to `addr` and wraps it as a [`Transport`].
    pub async fn bind<A: tokio::net::ToSocketAddrs>(addr: A) -> std::io::Result<Self> {
        Ok(TokioUdpTransport {
            socket: UdpSocket::bind(addr).await?,
        })
    }

    /// Wraps an already-bound [`tokio::net::UdpSocket`].
    pub fn from_tokio(socket: UdpSocket) -> Self {
        TokioUdpTransport { socket }
    }

    /// The local address this transport is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl Transport for TokioUdpTransport {
    type Addr = SocketAddr;

    fn send_to<'a>(
        &'a self,
        bytes: &'a [u8],
        dest: &'a Self::Addr,
    ) -> Pin<Box<dyn Future<Output = Result<(), Error>> + Send + 'a>> {
        Box::pin(async move {
            self.socket
                .send_to(bytes, dest)
                .await
                .map(|_| ())
                .map_err(|_| Error::IOError)
        })
    }

    fn recv_from<'a>(
        &'a self,
        buf: &'a mut [u8],
    ) -> Pin<Box<dyn Future<Output = Result<(usize, Self::Addr), Error>> + Send + 'a>> {
        Box::pin(async move { self.socket.recv_from(buf).await.map_err(|_| Error::IOError) })
    }
}
