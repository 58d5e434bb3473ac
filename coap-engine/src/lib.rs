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
//! A request/response [Constrained Application Protocol (CoAP)][IETF-RFC7252]
//! engine with support for the [Observe extension][IETF-RFC7641].
//!
//! The engine owns a single dispatch task per [`CoapEngine`] instance, built
//! around a [`Transport`] supplied at construction time. Every table the
//! dispatch task consults -- outstanding transactions, Observe registrations,
//! registered resources -- is a fixed-capacity arena sized by the
//! [`EngineConfig`] type parameter, so a long-running engine never grows an
//! allocation past what its configuration declared up front.
//!
//! ```no_run
//! use std::sync::Arc;
//! use coap_engine::engine::CoapEngine;
//! use coap_engine::transport::loopback::LoopbackNetwork;
//! use coap_engine::message::MsgCode;
//!
//! # async fn example() -> Result<(), coap_engine::Error> {
//! let network = LoopbackNetwork::new();
//! let transport = network.bind(1);
//! let engine = CoapEngine::init(transport);
//!
//! let response = engine
//!     .req_send(MsgCode::MethodGet, "/sensors/temp", &[], &[], true, false, coap_engine::transport::loopback::LoopbackAddr(2))
//!     .await?;
//! # let _ = response;
//! # Ok(())
//! # }
//! ```
//!
//! [IETF-RFC7252]: https://tools.ietf.org/html/rfc7252
//! [IETF-RFC7641]: https://tools.ietf.org/html/rfc7641

#![warn(rust_2018_idioms)]
#![warn(missing_debug_implementations)]
#![warn(clippy::all)]

#[macro_use]
extern crate log;

pub mod uri {
    //! A limited subset of items from the URI-handling [`coap-engine-uri`] crate.
    //!
    //! [`coap-engine-uri`]: ../coap_engine_uri/index.html
    pub use coap_engine_uri::escape;

    pub use coap_engine_uri::{rel_ref, uri, uri_ref};
    pub use coap_engine_uri::{RelRef, Uri, UriRef};
    pub use coap_engine_uri::{RelRefBuf, UriBuf, UriRefBuf};

    pub use coap_engine_uri::{AnyUriRef, UriDisplay, UriType};

    pub use coap_engine_uri::{ParseError, ResolveError};

    pub use coap_engine_uri::UriRawComponents;

    #[doc(hidden)]
    pub(super) use coap_engine_uri::prelude;

    #[doc(hidden)]
    pub use coap_engine_uri::{assert_rel_ref_literal, assert_uri_literal, assert_uri_ref_literal};
}

pub mod message;
pub mod option;

mod content_format;
pub use content_format::ContentFormat;

mod socketaddr;
pub use socketaddr::SocketAddrExt;
pub use socketaddr::ToSocketAddrs;

mod block;
pub use block::BlockInfo;

mod trans_params;
pub use trans_params::*;

pub mod consts;
#[doc(hidden)]
pub use consts::*;

mod error;
pub use error::*;

mod util;
#[allow(unused_imports)]
use util::*;

pub mod link_format;
#[doc(hidden)]
pub use link_format::*;

mod etag;
pub use etag::ETag;

pub mod packet;
pub mod resource;
pub mod transaction;
pub mod observe;
pub mod transport;
mod dispatch;
pub mod engine;

#[doc(hidden)]
pub mod prelude {
    pub use super::uri::prelude::*;

    pub use super::ContentFormat;

    pub use super::message::MsgCode;
    pub use super::message::MsgCodeClass;
    pub use super::message::MsgId;
    pub use super::message::MsgToken;
    pub use super::message::MsgType;

    pub use super::option;
    pub use option::OptionInsert;
    pub use option::OptionInsertExt;
    pub use option::OptionIterator;
    pub use option::OptionIteratorExt;
    pub use option::OptionKey;
    pub use option::OptionNumber;

    pub use super::engine::{CoapEngine, HandlerResponse, ResourceHandler};
    pub use super::resource::{method, HandlerRef, Listener, LookupResult, Resource};
    pub use super::trans_params::{EngineConfig, StandardCoapConstants, TransParams};
    pub use super::transport::Transport;

    pub use super::SocketAddrExt;
}
