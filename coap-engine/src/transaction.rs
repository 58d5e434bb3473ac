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
//! The fixed-capacity table of outstanding requests.
//!
//! Every request the engine has sent and not yet resolved occupies one slot
//! -- a "memo" -- in a fixed-size array. There is no heap allocation here:
//! a [`MemoHandle`] is a stable index into that array, playing the role a
//! `Rc`/`Weak` pair would in a heap-backed design. The memo's pdu bytes, if
//! it is a confirmable transaction that may need to be resent, live in a
//! companion pool of fixed-size buffers with the same capacity.

use crate::socketaddr::SocketAddrExt;
use crate::trans_params::{EngineConfig, LIMIT_NON};
use crate::Error;
use std::time::Duration;

/// A stable index into the transaction table. Remains valid only until the
/// memo it names is released; reusing a handle after release observes an
/// unrelated, later transaction, so callers must treat release as
/// consuming the handle.
pub type MemoHandle = usize;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum MemoState {
    Unused,
    Wait,
    Resp,
    TimedOut,
}

/// The outcome delivered to whatever is waiting on a transaction.
#[derive(Debug)]
pub enum TransactionOutcome {
    /// A matching response arrived. Carries the raw datagram bytes so the
    /// caller can parse it with whatever lifetime it needs.
    Response(Vec<u8>),
    /// The remote endpoint sent an RST in reply to our message id.
    Reset,
    /// No response arrived before the retransmission budget (for `CON`) or
    /// lifetime (for `NON`) was exhausted.
    Timeout,
}

struct Memo<Addr> {
    state: MemoState,
    /// Remaining retransmissions for a `CON` memo, or [`LIMIT_NON`] for a
    /// `NON` memo, which is never resent.
    send_limit: u8,
    attempt: u32,
    msg_id: u16,
    token_len: u8,
    token: [u8; 8],
    remote: Option<Addr>,
    /// Index into the resend pool, for `CON` memos only.
    resend_buf: Option<usize>,
    pdu_len: usize,
}

impl<Addr: Copy> Memo<Addr> {
    const fn new() -> Self {
        Memo {
            state: MemoState::Unused,
            send_limit: 0,
            attempt: 0,
            msg_id: 0,
            token_len: 0,
            token: [0; 8],
            remote: None,
            resend_buf: None,
            pdu_len: 0,
        }
    }

    fn token(&self) -> &[u8] {
        &self.token[..self.token_len as usize]
    }
}

/// A pool of fixed-size buffers used to hold the exact bytes of a
/// confirmable request so it can be resent verbatim on timeout.
///
/// A buffer is free precisely when its first byte is zero -- which can
/// never be a valid leading byte of a CoAP message, since the version
/// field occupies the top two bits and RFC7252 requires it be `1`. This
/// lets release happen by zeroing rather than by tracking a separate
/// free-list, which keeps release infallible and lock-free with respect to
/// the allocation mutex (see [`crate::transaction`] module docs).
struct ResendPool<C: EngineConfig> {
    storage: Box<[u8]>,
    _marker: std::marker::PhantomData<C>,
}

impl<C: EngineConfig> ResendPool<C> {
    fn new() -> Self {
        ResendPool {
            storage: vec![0u8; C::RESEND_BUFS_MAX * C::PDU_BUF_SIZE].into_boxed_slice(),
            _marker: std::marker::PhantomData,
        }
    }

    fn slot(&mut self, index: usize) -> &mut [u8] {
        let start = index * C::PDU_BUF_SIZE;
        &mut self.storage[start..start + C::PDU_BUF_SIZE]
    }

    fn claim(&mut self) -> Option<usize> {
        for i in 0..C::RESEND_BUFS_MAX {
            if self.slot(i)[0] == 0 {
                return Some(i);
            }
        }
        None
    }

    fn release(&mut self, index: usize) {
        self.slot(index).iter_mut().for_each(|b| *b = 0);
    }
}

/// The fixed-capacity table of outstanding requests.
///
/// Allocation (claiming a free slot) and matching inbound datagrams against
/// existing slots both happen under the caller-supplied allocation mutex;
/// this type itself does no locking, leaving that to
/// [`crate::dispatch::Dispatcher`], which owns the single mutable reference
/// to the table for the lifetime of the dispatch task.
pub struct TransactionTable<Addr, C: EngineConfig> {
    memos: Vec<Memo<Addr>>,
    resend: ResendPool<C>,
}

impl<Addr: SocketAddrExt, C: EngineConfig> TransactionTable<Addr, C> {
    pub fn new() -> Self {
        let mut memos = Vec::with_capacity(C::REQ_WAITING_MAX);
        memos.resize_with(C::REQ_WAITING_MAX, Memo::new);
        TransactionTable {
            memos,
            resend: ResendPool::new(),
        }
    }

    /// Claims a free slot for a new outgoing request.
    ///
    /// `confirmable` selects whether the memo counts down
    /// [`EngineConfig::REQ_WAITING_MAX`]-bounded retransmissions (`CON`) or
    /// is marked with the [`LIMIT_NON`] sentinel and never resent (`NON`).
    /// For `CON`, a resend buffer is also claimed and `pdu` copied into it;
    /// running out of either table slots or resend buffers is reported as
    /// [`Error::NoSlot`].
    pub fn claim(
        &mut self,
        msg_id: u16,
        token: &[u8],
        remote: Addr,
        confirmable: bool,
        pdu: &[u8],
    ) -> Result<MemoHandle, Error> {
        let index = self
            .memos
            .iter()
            .position(|m| m.state == MemoState::Unused)
            .ok_or(Error::NoSlot)?;

        let resend_buf = if confirmable {
            let slot = self.resend.claim().ok_or(Error::NoSlot)?;
            if pdu.len() > C::PDU_BUF_SIZE {
                self.resend.release(slot);
                return Err(Error::OutOfSpace);
            }
            self.resend.slot(slot)[..pdu.len()].copy_from_slice(pdu);
            Some(slot)
        } else {
            None
        };

        let mut token_buf = [0u8; 8];
        let token_len = token.len().min(token_buf.len());
        token_buf[..token_len].copy_from_slice(&token[..token_len]);

        let memo = &mut self.memos[index];
        memo.state = MemoState::Wait;
        memo.send_limit = if confirmable { C::COAP_MAX_RETRANSMIT as u8 } else { LIMIT_NON };
        memo.attempt = 1;
        memo.msg_id = msg_id;
        memo.token_len = token_len as u8;
        memo.token = token_buf;
        memo.remote = Some(remote);
        memo.resend_buf = resend_buf;
        memo.pdu_len = pdu.len();

        Ok(index)
    }

    /// Looks up the live memo matching an inbound message id and token from
    /// `remote`, per RFC7252 Section 4.2's matching rule (message id for
    /// piggybacked responses and resets, token for separate responses).
    pub fn find(&self, msg_id: u16, token: &[u8], remote: &Addr) -> Option<MemoHandle> {
        self.memos.iter().position(|m| {
            m.state == MemoState::Wait
                && m.remote.as_ref() == Some(remote)
                && (m.msg_id == msg_id || m.token() == token)
        })
    }

    /// Marks a memo as resolved by a response, returning the bytes that had
    /// been staged for resend (if any) so the caller can hand ownership of
    /// the transaction's buffer back to the pool exactly once.
    pub fn complete(&mut self, handle: MemoHandle) {
        let memo = &mut self.memos[handle];
        if let Some(buf) = memo.resend_buf.take() {
            self.resend.release(buf);
        }
        memo.state = MemoState::Unused;
        memo.remote = None;
    }

    /// Whether `handle` should be resent now that its retransmit timer has
    /// fired, and if so, for how long to wait next.
    ///
    /// Returns `Ok(None)` when the memo is `NON` (never resent; the caller
    /// should treat the timer firing as an outright timeout), `Ok(Some(_))`
    /// with the bytes to resend when attempts remain, and `Err(Error::Timeout)`
    /// when the retransmission budget for a `CON` memo has been exhausted.
    pub fn on_retransmit_timer<P: crate::trans_params::TransParams>(
        &mut self,
        handle: MemoHandle,
        params: &P,
    ) -> Result<Option<(Vec<u8>, Duration)>, Error> {
        let memo = &mut self.memos[handle];

        if memo.send_limit == LIMIT_NON {
            memo.state = MemoState::TimedOut;
            return Err(Error::Timeout);
        }

        if memo.attempt > memo.send_limit as u32 {
            memo.state = MemoState::TimedOut;
            return Err(Error::Timeout);
        }

        let buf = memo
            .resend_buf
            .map(|slot| self.resend.slot(slot)[..memo.pdu_len].to_vec())
            .ok_or(Error::Unspecified)?;

        memo.attempt += 1;
        let delay = params.calc_retransmit_duration(memo.attempt);

        Ok(Some((buf, delay)))
    }

    /// Releases a memo that timed out or was cancelled without ever being
    /// completed by a response.
    pub fn release(&mut self, handle: MemoHandle) {
        self.complete(handle);
    }

    /// The remote endpoint a still-live memo was sent to.
    pub fn remote(&self, handle: MemoHandle) -> Option<Addr> {
        self.memos[handle].remote
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trans_params::StandardCoapConstants;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }

    #[test]
    fn claim_and_find_round_trip() {
        let mut table: TransactionTable<SocketAddr, StandardCoapConstants> = TransactionTable::new();
        let token = [1, 2, 3, 4];
        let handle = table.claim(42, &token, addr(1000), true, b"hello").unwrap();
        assert_eq!(table.find(42, &token, &addr(1000)), Some(handle));
        assert_eq!(table.find(99, &token, &addr(1000)), Some(handle));
        assert_eq!(table.find(42, &[9, 9, 9, 9], &addr(2000)), None);
    }

    #[test]
    fn complete_frees_resend_buffer_for_reuse() {
        let mut table: TransactionTable<SocketAddr, StandardCoapConstants> = TransactionTable::new();
        let token = [1, 2, 3, 4];
        let handle = table.claim(1, &token, addr(1), true, b"abc").unwrap();
        table.complete(handle);
        // The slot should be reusable now.
        let _ = table.claim(2, &token, addr(1), true, b"def").unwrap();
    }

    #[test]
    fn table_reports_no_slot_when_full() {
        let mut table: TransactionTable<SocketAddr, StandardCoapConstants> = TransactionTable::new();
        let token = [0u8; 4];
        for i in 0..StandardCoapConstants::REQ_WAITING_MAX {
            table
                .claim(i as u16, &token, addr(i as u16), true, b"x")
                .expect("slot available");
        }
        assert_eq!(
            table.claim(999, &token, addr(999), true, b"x"),
            Err(Error::NoSlot)
        );
    }

    #[test]
    fn non_confirmable_memo_times_out_without_resend() {
        let mut table: TransactionTable<SocketAddr, StandardCoapConstants> = TransactionTable::new();
        let token = [0u8; 4];
        let handle = table.claim(7, &token, addr(7), false, b"x").unwrap();
        let result = table.on_retransmit_timer(handle, &StandardCoapConstants);
        assert_eq!(result, Err(Error::Timeout));
    }
}
