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
//! The transient, stack-resident view of one inbound datagram.

use crate::message::MsgCode;
use crate::message::MsgType;
use crate::message::{MessageRead, MsgId};
use crate::option::OBSERVE;
use crate::uri::RelRefBuf;
use crate::Error;

/// A fully parsed inbound datagram, paired with the remote endpoint it
/// arrived from and the URI path/query decoded from its options.
///
/// A `Packet` is never stored past the handler call or dispatch step that
/// received it: resource handlers, the transaction table, and the observe
/// registry each copy out whatever subset of its fields they need to retain
/// (token, message id, a parsed Observe value) rather than holding the
/// packet itself.
pub struct Packet<Addr> {
    message: crate::message::OwnedImmutableMessage,
    uri: RelRefBuf,
    remote: Addr,
}

impl<Addr> Packet<Addr> {
    /// Parses `bytes` as a CoAP message received from `remote`.
    pub fn parse(bytes: &[u8], remote: Addr) -> Result<Packet<Addr>, Error> {
        let message = crate::message::OwnedImmutableMessage::new(bytes.to_vec())?;
        let uri = message.options().extract_uri()?;
        Ok(Packet {
            message,
            uri,
            remote,
        })
    }

    /// The remote endpoint this packet arrived from.
    pub fn remote(&self) -> &Addr {
        &self.remote
    }

    /// The decoded URI path and query, e.g. `/sensors/temp?units=c`.
    pub fn uri(&self) -> &RelRefBuf {
        &self.uri
    }

    /// The raw path component, always starting with `/`.
    pub fn path(&self) -> &str {
        self.uri.raw_path()
    }

    pub fn msg_type(&self) -> MsgType {
        self.message.msg_type()
    }

    pub fn msg_code(&self) -> MsgCode {
        self.message.msg_code()
    }

    pub fn msg_id(&self) -> MsgId {
        self.message.msg_id()
    }

    pub fn token(&self) -> &[u8] {
        self.message.msg_token()
    }

    pub fn payload(&self) -> &[u8] {
        self.message.payload()
    }

    /// The numeric value of the Observe option, if present.
    pub fn observe(&self) -> Option<u32> {
        use crate::option::OptionIteratorExt;
        let mut iter = self.message.options();
        match iter.find_next_of(OBSERVE) {
            Some(Ok(value)) => Some(value),
            _ => None,
        }
    }

    /// Whether this packet is empty, per RFC7252 Section 4.1 (a `CON`/`NON`
    /// message with code `0.00` and no payload).
    pub fn is_empty_message(&self) -> bool {
        self.msg_code() == MsgCode::Empty
    }

    /// Whether `code` is a request method, i.e. this packet is a request
    /// and not a response.
    pub fn is_request(&self) -> bool {
        self.msg_code().is_method()
    }

    /// The underlying parsed message, for code that needs the full
    /// [`MessageRead`] surface (e.g. to re-serialize a piggybacked ack).
    pub fn message(&self) -> &dyn MessageRead {
        &self.message
    }

    /// A copy of the raw datagram bytes this packet was parsed from.
    pub fn message_bytes(&self) -> Vec<u8> {
        self.message.as_bytes().to_vec()
    }
}
