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
//! [IETF-RFC7641] Observe registrations.
//!
//! Two fixed tables work together here: an `Observers` table deduplicates
//! remote endpoints (so the same endpoint observing three resources costs
//! one slot, not three), and an `ObserveRegistry` table holds one memo per
//! (observer, resource) pair. A resource may have at most one observer
//! registration outstanding at a time per the one-memo-per-resource
//! simplification recorded in the accompanying design notes: a second
//! `GET` with `Observe: 0` from a different client on an already-observed
//! resource displaces the previous registration rather than adding a
//! second one.
//!
//! [IETF-RFC7641]: https://tools.ietf.org/html/rfc7641

use crate::resource::HandlerRef;
use crate::socketaddr::SocketAddrExt;
use crate::trans_params::EngineConfig;
use crate::Error;

/// A stable index into the observer table.
pub type ObserverHandle = usize;

/// A stable index into the observe-registration table.
pub type ObserveHandle = usize;

struct Observer<Addr> {
    remote: Option<Addr>,
    refcount: u32,
}

/// Deduplicated table of remote endpoints holding at least one Observe
/// registration. A slot is free when `remote` is `None`, which stands in
/// for the "family UNSPEC" free marker a C implementation would use on a
/// raw `sockaddr`.
struct Observers<Addr> {
    slots: Vec<Observer<Addr>>,
}

impl<Addr: SocketAddrExt> Observers<Addr> {
    fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || Observer {
            remote: None,
            refcount: 0,
        });
        Observers { slots }
    }

    fn find_or_insert(&mut self, remote: Addr) -> Result<ObserverHandle, Error> {
        if let Some(index) = self.slots.iter().position(|s| s.remote == Some(remote)) {
            self.slots[index].refcount += 1;
            return Ok(index);
        }

        let index = self
            .slots
            .iter()
            .position(|s| s.remote.is_none())
            .ok_or(Error::ObserveFull)?;

        self.slots[index].remote = Some(remote);
        self.slots[index].refcount = 1;
        Ok(index)
    }

    fn release(&mut self, handle: ObserverHandle) {
        let slot = &mut self.slots[handle];
        slot.refcount -= 1;
        if slot.refcount == 0 {
            slot.remote = None;
        }
    }

    fn remote(&self, handle: ObserverHandle) -> Addr {
        self.slots[handle].remote.expect("observer handle must be live")
    }
}

struct Registration {
    observer: Option<ObserverHandle>,
    resource: HandlerRef,
    token_len: u8,
    token: [u8; 8],
}

impl Registration {
    fn token(&self) -> &[u8] {
        &self.token[..self.token_len as usize]
    }
}

/// The engine's Observe registration table.
///
/// `monotonic_micros` is supplied by the caller (typically a dispatch-loop
/// clock read) rather than read internally, so that [`notify_value`] stays
/// free of any particular clock source and is straightforward to drive from
/// tests with synthetic timestamps.
pub struct ObserveRegistry<Addr, C: EngineConfig> {
    observers: Observers<Addr>,
    registrations: Vec<Registration>,
    _marker: std::marker::PhantomData<C>,
}

impl<Addr: SocketAddrExt, C: EngineConfig> ObserveRegistry<Addr, C> {
    pub fn new() -> Self {
        let mut registrations = Vec::with_capacity(C::OBS_REGISTRATIONS_MAX);
        registrations.resize_with(C::OBS_REGISTRATIONS_MAX, || Registration {
            observer: None,
            resource: 0,
            token_len: 0,
            token: [0; 8],
        });
        ObserveRegistry {
            observers: Observers::new(C::OBS_CLIENTS_MAX),
            registrations,
            _marker: std::marker::PhantomData,
        }
    }

    /// Registers `remote` as an observer of `resource`, replacing any
    /// existing registration for that resource (see module docs). Returns
    /// [`Error::ObserveFull`] if both tables are full and `remote` is not
    /// already present in the observer table.
    pub fn register(
        &mut self,
        resource: HandlerRef,
        remote: Addr,
        token: &[u8],
    ) -> Result<ObserveHandle, Error> {
        if let Some(existing) = self
            .registrations
            .iter()
            .position(|r| r.observer.is_some() && r.resource == resource)
        {
            self.deregister(existing);
        }

        let slot = self
            .registrations
            .iter()
            .position(|r| r.observer.is_none())
            .ok_or(Error::ObserveFull)?;

        let observer = self.observers.find_or_insert(remote)?;

        let mut token_buf = [0u8; 8];
        let token_len = token.len().min(token_buf.len());
        token_buf[..token_len].copy_from_slice(&token[..token_len]);

        self.registrations[slot] = Registration {
            observer: Some(observer),
            resource,
            token_len: token_len as u8,
            token: token_buf,
        };

        Ok(slot)
    }

    /// Removes a registration, dropping the observer table entry too if
    /// this was its last registration.
    pub fn deregister(&mut self, handle: ObserveHandle) {
        if let Some(observer) = self.registrations[handle].observer.take() {
            self.observers.release(observer);
        }
    }

    /// Finds the live registration for `resource` held by `remote` with a
    /// matching token, used to recognize a `GET` carrying
    /// `Observe: 1` (deregister) as referring to an existing relationship.
    pub fn find(&self, resource: HandlerRef, remote: &Addr, token: &[u8]) -> Option<ObserveHandle> {
        self.registrations.iter().position(|r| {
            r.observer
                .map_or(false, |o| self.observers.remote(o) == *remote)
                && r.resource == resource
                && r.token() == token
        })
    }

    /// Every live registration for `resource`, as `(remote, token)` pairs,
    /// used to fan a notification out.
    pub fn observers_of(&self, resource: HandlerRef) -> impl Iterator<Item = (Addr, &[u8])> + '_ {
        self.registrations.iter().filter_map(move |r| {
            if r.resource == resource {
                r.observer.map(|o| (self.observers.remote(o), r.token()))
            } else {
                None
            }
        })
    }
}

/// Derives the 24-bit Observe option value for the current instant.
///
/// Per [IETF-RFC7641 Section 3.2], the counter need only increase "fast
/// enough" to let clients detect reordering, not on every notification; we
/// derive it directly from a monotonic microsecond clock right-shifted by
/// [`EngineConfig::OBS_TICK_EXPONENT`], which keeps the value free-running
/// and avoids any shared mutable counter state.
///
/// [IETF-RFC7641 Section 3.2]: https://tools.ietf.org/html/rfc7641#section-3.2
pub fn observe_value_from_micros(monotonic_micros: u64, tick_exponent: u32) -> u32 {
    ((monotonic_micros >> tick_exponent) & 0x00ff_ffff) as u32
}

/// Converts a [`std::time::Duration`]-based monotonic instant into the
/// microsecond count [`observe_value_from_micros`] expects.
pub fn micros_since(base: std::time::Instant, now: std::time::Instant) -> u64 {
    now.duration_since(base).as_micros() as u64
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
    fn register_then_find() {
        let mut reg: ObserveRegistry<SocketAddr, StandardCoapConstants> = ObserveRegistry::new();
        let handle = reg.register(1, addr(1000), &[1, 2, 3]).unwrap();
        assert_eq!(reg.find(1, &addr(1000), &[1, 2, 3]), Some(handle));
    }

    #[test]
    fn second_observer_on_same_remote_shares_observer_slot() {
        let mut reg: ObserveRegistry<SocketAddr, StandardCoapConstants> = ObserveRegistry::new();
        reg.register(1, addr(1000), &[1]).unwrap();
        reg.register(2, addr(1000), &[2]).unwrap();
        assert_eq!(reg.observers.slots.iter().filter(|s| s.remote.is_some()).count(), 1);
    }

    #[test]
    fn re_registering_same_resource_replaces_prior_observer() {
        let mut reg: ObserveRegistry<SocketAddr, StandardCoapConstants> = ObserveRegistry::new();
        reg.register(1, addr(1000), &[1]).unwrap();
        reg.register(1, addr(2000), &[2]).unwrap();
        assert_eq!(reg.find(1, &addr(1000), &[1]), None);
        assert!(reg.find(1, &addr(2000), &[2]).is_some());
    }

    #[test]
    fn deregister_frees_observer_when_last_registration() {
        let mut reg: ObserveRegistry<SocketAddr, StandardCoapConstants> = ObserveRegistry::new();
        let handle = reg.register(1, addr(1000), &[1]).unwrap();
        reg.deregister(handle);
        assert_eq!(reg.observers.slots.iter().filter(|s| s.remote.is_some()).count(), 0);
    }

    /// S6: two distinct resources observed by the same remote share one
    /// observer slot; clearing one registration must not free that slot
    /// until the other is cleared too.
    #[test]
    fn freeing_one_of_two_registrations_keeps_observer_slot_alive() {
        let mut reg: ObserveRegistry<SocketAddr, StandardCoapConstants> = ObserveRegistry::new();
        let first = reg.register(1, addr(1000), &[1]).unwrap();
        let second = reg.register(2, addr(1000), &[2]).unwrap();

        reg.deregister(first);
        assert_eq!(
            reg.observers.slots.iter().filter(|s| s.remote.is_some()).count(),
            1,
            "observer slot must survive while the other resource is still observed"
        );
        assert!(reg.find(2, &addr(1000), &[2]).is_some());

        reg.deregister(second);
        assert_eq!(reg.observers.slots.iter().filter(|s| s.remote.is_some()).count(), 0);
    }

    #[test]
    fn observe_value_wraps_into_24_bits() {
        let v = observe_value_from_micros(u64::MAX, 0);
        assert!(v <= 0x00ff_ffff);
    }
}
