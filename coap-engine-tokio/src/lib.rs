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

//! This crate provides [`TokioUdpTransport`]: a [`coap_engine::transport::Transport`]
//! implementation backed by [Tokio][]'s asynchronous `UdpSocket`.
//!
//! # Example
//!
//! ```no_run
//! use coap_engine::engine::CoapEngine;
//! use coap_engine_tokio::TokioUdpTransport;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let transport = TokioUdpTransport::bind("[::]:0").await?;
//!     let engine = CoapEngine::init(transport);
//!     let _ = engine;
//!     Ok(())
//! }
//! ```
//!
//! [Tokio]: https://tokio.rs/

mod tokio_udp_transport;
pub use tokio_udp_transport::TokioUdpTransport;
