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
//! Static resource registry.
//!
//! A [`Listener`] owns an ASCII-ordered slice of [`Resource`] records; an
//! application registers one or more listeners, and the engine chains them
//! together, searching each in turn. Lookup is a single linear scan per
//! listener that terminates as soon as the ordering guarantees no later
//! entry can match, so registering resources out of order is a logic error
//! caught by a debug assertion rather than a silent misbehavior.

use crate::message::MsgCode;

/// Bitmask of the methods a [`Resource`] accepts, and the capability that
/// method exercises on the resource.
pub mod method {
    /// `GET`: read the current representation.
    pub const GET: u8 = 1 << 0;
    /// `POST`: create a new sub-resource, or invoke an action.
    pub const POST: u8 = 1 << 1;
    /// `PUT`: replace the representation.
    pub const PUT: u8 = 1 << 2;
    /// `DELETE`: remove the resource.
    pub const DELETE: u8 = 1 << 3;
    /// `FETCH`: conditional/partial read.
    pub const FETCH: u8 = 1 << 4;
    /// `PATCH`: unconditional partial write.
    pub const PATCH: u8 = 1 << 5;
    /// `iPATCH`: conditional partial write.
    pub const IPATCH: u8 = 1 << 6;
    /// Every method this registry knows how to route.
    pub const ALL: u8 = GET | POST | PUT | DELETE | FETCH | PATCH | IPATCH;
}

/// Returns the [`method`] bit corresponding to `code`, or `None` if `code`
/// is not a request method this registry can route.
pub fn method_bit(code: MsgCode) -> Option<u8> {
    match code {
        MsgCode::MethodGet => Some(method::GET),
        MsgCode::MethodPost => Some(method::POST),
        MsgCode::MethodPut => Some(method::PUT),
        MsgCode::MethodDelete => Some(method::DELETE),
        MsgCode::MethodFetch => Some(method::FETCH),
        MsgCode::MethodPatch => Some(method::PATCH),
        MsgCode::MethodIPatch => Some(method::IPATCH),
        _ => None,
    }
}

/// A stable index into a [`Resource`] handler table, interpreted by whatever
/// code owns the table the index refers into. The registry itself never
/// dereferences a `HandlerRef`; it is opaque routing data handed back to the
/// caller that looked the resource up.
pub type HandlerRef = u32;

/// One routable path entry.
///
/// `path` must begin with `/` and must be ASCII-sorted relative to its
/// siblings within the owning [`Listener`] -- lookup correctness depends on
/// this invariant, which [`Listener::new`] checks with a debug assertion
/// rather than re-sorting, since resource tables are expected to be `const`
/// or built once at startup.
#[derive(Debug, Clone, Copy)]
pub struct Resource {
    path: &'static str,
    methods: u8,
    observable: bool,
    handler: HandlerRef,
}

impl Resource {
    /// Creates a new resource entry. `path` must start with `/`.
    pub const fn new(path: &'static str, methods: u8, observable: bool, handler: HandlerRef) -> Resource {
        Resource {
            path,
            methods,
            observable,
            handler,
        }
    }

    /// The resource's absolute path, e.g. `/sensors/temp`.
    pub fn path(&self) -> &'static str {
        self.path
    }

    /// The set of [`method`] bits this resource accepts.
    pub fn methods(&self) -> u8 {
        self.methods
    }

    /// Whether GET requests to this resource may carry an Observe option.
    pub fn observable(&self) -> bool {
        self.observable
    }

    /// Opaque handler reference, meaningful only to the application.
    pub fn handler(&self) -> HandlerRef {
        self.handler
    }

    fn accepts(&self, code: MsgCode) -> bool {
        method_bit(code).map_or(false, |bit| self.methods & bit != 0)
    }
}

/// Outcome of [`Listener::lookup`].
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum LookupResult {
    /// No resource in any searched listener has this path.
    NoMatch,
    /// A resource has this path, but not for the requested method. Sticky:
    /// once found, later listeners are not searched, since a more specific
    /// match would only ever be a different error.
    WrongMethod,
    /// A resource matched both path and method.
    Found(Resource),
}

/// A single registered group of routable resources, ASCII-ordered by path.
///
/// The engine keeps an ordered sequence of listeners (see
/// [`lookup_chain`]), most-recently-registered first, and searches each in
/// turn. A listener is typically a `'static`/`const` table built once at
/// startup, which is why lookup takes `&self` rather than anything
/// requiring interior mutability -- nothing about a listener's resource set
/// changes after registration.
pub struct Listener {
    resources: &'static [Resource],
}

impl Listener {
    /// Creates a new listener over `resources`, which must already be sorted
    /// by [`Resource::path`] using plain byte-wise (ASCII) ordering.
    pub const fn new(resources: &'static [Resource]) -> Listener {
        Listener { resources }
    }

    /// Returns the resources owned by this listener, in path order.
    pub fn resources(&self) -> &'static [Resource] {
        self.resources
    }

    #[cfg(debug_assertions)]
    fn assert_sorted(&self) {
        for w in self.resources.windows(2) {
            debug_assert!(
                w[0].path < w[1].path,
                "resource listener is not ASCII-sorted: {:?} >= {:?}",
                w[0].path,
                w[1].path
            );
        }
    }

    /// Performs an ASCII-ordered lookup for `path` restricted to the method
    /// encoded by `code`, searching only this listener.
    ///
    /// Because resources are sorted, the scan stops as soon as it reaches an
    /// entry whose path is greater than `path` -- no later entry in this
    /// listener could still match.
    pub fn lookup(&self, path: &str, code: MsgCode) -> LookupResult {
        #[cfg(debug_assertions)]
        self.assert_sorted();

        let mut wrong_method = false;

        for resource in self.resources {
            if resource.path > path {
                break;
            }
            if resource.path == path {
                if resource.accepts(code) {
                    return LookupResult::Found(*resource);
                }
                wrong_method = true;
            }
        }

        if wrong_method {
            LookupResult::WrongMethod
        } else {
            LookupResult::NoMatch
        }
    }
}

/// Searches `listeners` in order, returning the first listener's verdict
/// that is not [`LookupResult::NoMatch`].
///
/// A `WrongMethod` verdict is sticky and returned immediately rather than
/// continuing to search later listeners, since a later listener could only
/// ever narrow an already-identified path collision into a different error,
/// never into success.
pub fn lookup_chain<'a>(
    listeners: impl Iterator<Item = &'a Listener>,
    path: &str,
    code: MsgCode,
) -> LookupResult {
    for listener in listeners {
        match listener.lookup(path, code) {
            LookupResult::NoMatch => continue,
            other => return other,
        }
    }
    LookupResult::NoMatch
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESOURCES: &[Resource] = &[
        Resource::new("/a", method::GET, false, 1),
        Resource::new("/b", method::GET | method::PUT, false, 2),
        Resource::new("/c", method::GET, true, 3),
    ];

    #[test]
    fn lookup_found() {
        let listener = Listener::new(RESOURCES);
        match listener.lookup("/b", MsgCode::MethodPut) {
            LookupResult::Found(r) => assert_eq!(r.handler(), 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn lookup_wrong_method() {
        let listener = Listener::new(RESOURCES);
        assert_eq!(
            listener.lookup("/a", MsgCode::MethodPut),
            LookupResult::WrongMethod
        );
    }

    #[test]
    fn lookup_no_match_short_circuits() {
        let listener = Listener::new(RESOURCES);
        // "/aa" sorts between "/a" and "/b"; the scan must stop at "/b"
        // without visiting "/c".
        assert_eq!(listener.lookup("/aa", MsgCode::MethodGet), LookupResult::NoMatch);
    }

    #[test]
    fn lookup_observable() {
        let listener = Listener::new(RESOURCES);
        match listener.lookup("/c", MsgCode::MethodGet) {
            LookupResult::Found(r) => assert!(r.observable()),
            other => panic!("unexpected {:?}", other),
        }
    }
}
