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
//! The datagram transport seam.
//!
//! [`Transport`] is deliberately thin: two async methods and an address
//! type. A DTLS-secured transport is expected to implement this same trait
//! over an already-established session, so no security material appears
//! here -- see the design notes for the PSK/cipher-suite parameters such a
//! transport would need out of band.

use crate::socketaddr::SocketAddrExt;
use crate::Error;
use std::future::Future;
use std::pin::Pin;

/// A datagram transport capable of sending to, and receiving from, peers
/// addressed by `Self::Addr`.
///
/// Implementations are not required to be `Clone`; [`crate::engine::CoapEngine`]
/// holds a single instance for the lifetime of the dispatch task.
pub trait Transport: Send {
    /// The address type used to identify peers, e.g. `std::net::SocketAddr`.
    type Addr: SocketAddrExt;

    /// Sends `bytes` to `dest`.
    fn send_to<'a>(
        &'a self,
        bytes: &'a [u8],
        dest: &'a Self::Addr,
    ) -> Pin<Box<dyn Future<Output = Result<(), Error>> + Send + 'a>>;

    /// Waits for the next inbound datagram, writing it into `buf` and
    /// returning the number of bytes written along with the sender.
    fn recv_from<'a>(
        &'a self,
        buf: &'a mut [u8],
    ) -> Pin<Box<dyn Future<Output = Result<(usize, Self::Addr), Error>> + Send + 'a>>;
}

/// An in-process transport that loops packets sent to one endpoint back to
/// whichever other [`LoopbackTransport`] (sharing the same underlying
/// channel set) is addressed as that endpoint. Used by the engine's own
/// tests and available to applications for unit-testing resource handlers
/// without opening a real socket.
pub mod loopback {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    /// An address within a [`LoopbackNetwork`]: just a small integer naming
    /// one endpoint.
    #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
    pub struct LoopbackAddr(pub u32);

    impl std::fmt::Display for LoopbackAddr {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "loop:{}", self.0)
        }
    }

    impl crate::socketaddr::ToSocketAddrs for LoopbackAddr {
        type Iter = std::iter::Once<LoopbackAddr>;
        type SocketAddr = LoopbackAddr;
        type Error = Error;

        fn to_socket_addrs(&self) -> Result<Self::Iter, Self::Error> {
            Ok(std::iter::once(*self))
        }
    }

    impl SocketAddrExt for LoopbackAddr {
        fn is_multicast(&self) -> bool {
            false
        }

        fn port(&self) -> u16 {
            0
        }

        fn addr_to_string(&self) -> String {
            self.to_string()
        }
    }

    type Mailbox = Mutex<HashMap<u32, mpsc::UnboundedSender<(Vec<u8>, LoopbackAddr)>>>;

    /// A shared rendezvous point for a set of [`LoopbackTransport`] endpoints.
    pub struct LoopbackNetwork {
        mailboxes: Mailbox,
    }

    impl LoopbackNetwork {
        pub fn new() -> std::sync::Arc<LoopbackNetwork> {
            std::sync::Arc::new(LoopbackNetwork {
                mailboxes: Mutex::new(HashMap::new()),
            })
        }

        /// Creates a new endpoint bound to `addr` on this network.
        pub fn bind(
            self: &std::sync::Arc<Self>,
            addr: u32,
        ) -> LoopbackTransport {
            let (tx, rx) = mpsc::unbounded_channel();
            self.mailboxes.lock().unwrap().insert(addr, tx);
            LoopbackTransport {
                network: self.clone(),
                local: LoopbackAddr(addr),
                inbox: tokio::sync::Mutex::new(rx),
            }
        }
    }

    /// A [`Transport`] bound to one address on a [`LoopbackNetwork`].
    pub struct LoopbackTransport {
        network: std::sync::Arc<LoopbackNetwork>,
        local: LoopbackAddr,
        inbox: tokio::sync::Mutex<mpsc::UnboundedReceiver<(Vec<u8>, LoopbackAddr)>>,
    }

    impl LoopbackTransport {
        pub fn local_addr(&self) -> LoopbackAddr {
            self.local
        }
    }

    impl Transport for LoopbackTransport {
        type Addr = LoopbackAddr;

        fn send_to<'a>(
            &'a self,
            bytes: &'a [u8],
            dest: &'a Self::Addr,
        ) -> Pin<Box<dyn Future<Output = Result<(), Error>> + Send + 'a>> {
            Box::pin(async move {
                let sender = self
                    .network
                    .mailboxes
                    .lock()
                    .unwrap()
                    .get(&dest.0)
                    .cloned();
                match sender {
                    Some(sender) => sender
                        .send((bytes.to_vec(), self.local))
                        .map_err(|_| Error::IOError),
                    None => Err(Error::HostNotFound),
                }
            })
        }

        fn recv_from<'a>(
            &'a self,
            buf: &'a mut [u8],
        ) -> Pin<Box<dyn Future<Output = Result<(usize, Self::Addr), Error>> + Send + 'a>> {
            Box::pin(async move {
                let mut inbox = self.inbox.lock().await;
                match inbox.recv().await {
                    Some((bytes, from)) => {
                        let len = bytes.len().min(buf.len());
                        buf[..len].copy_from_slice(&bytes[..len]);
                        Ok((len, from))
                    }
                    None => Err(Error::Cancelled),
                }
            })
        }
    }
}

/// A transport that accepts every send but never delivers anything, useful
/// for exercising timeout paths deterministically in tests (see testable
/// property S2).
pub struct NullTransport<Addr>(std::marker::PhantomData<Addr>);

impl<Addr> NullTransport<Addr> {
    pub fn new() -> Self {
        NullTransport(std::marker::PhantomData)
    }
}

impl<Addr: SocketAddrExt> Transport for NullTransport<Addr> {
    type Addr = Addr;

    fn send_to<'a>(
        &'a self,
        _bytes: &'a [u8],
        _dest: &'a Self::Addr,
    ) -> Pin<Box<dyn Future<Output = Result<(), Error>> + Send + 'a>> {
        Box::pin(async move { Ok(()) })
    }

    fn recv_from<'a>(
        &'a self,
        _buf: &'a mut [u8],
    ) -> Pin<Box<dyn Future<Output = Result<(usize, Self::Addr), Error>> + Send + 'a>> {
        Box::pin(std::future::pending())
    }
}
