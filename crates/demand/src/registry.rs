//! Identity registry of request kinds.
//!
//! Every request kind owns a stable [`RequestKindId`], a `(zone, local id)`
//! pair, plus a display name used in statistics and debug output. A zone
//! groups the request kinds declared by one component (the type checker,
//! name lookup, ...), and the local id distinguishes kinds within a zone.
//!
//! Identities are declared statically through [`Identifiable`], usually with
//! `#[derive(Identifiable)]`:
//!
//! ```rust
//! use demand::{Identifiable, Registry, RequestKind};
//!
//! #[derive(Identifiable)]
//! #[request_kind(zone = 10, local_id = 0)]
//! struct SuperclassTypeRequest;
//!
//! #[derive(Identifiable)]
//! #[request_kind(zone = 10, local_id = 1, name = "IsFinal")]
//! struct IsFinalRequest;
//!
//! const TYPE_CHECKER_REQUESTS: &[RequestKind] =
//!     demand::request_table![SuperclassTypeRequest, IsFinalRequest];
//!
//! let registry = Registry::from_tables([TYPE_CHECKER_REQUESTS]);
//!
//! assert_eq!(
//!     registry.display_name(IsFinalRequest::REQUEST_KIND.id()),
//!     Some("IsFinal")
//! );
//! ```

use std::{
    any::TypeId,
    collections::hash_map::Entry,
    fmt,
    hash::{Hash, Hasher},
};

use fxhash::FxHashMap;

/// A namespace of request kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Zone(u8);

impl Zone {
    /// The zone of the type checker's requests.
    pub const TYPE_CHECKER: Self = Self(10);

    /// Creates a zone from its number.
    #[must_use]
    pub const fn new(zone: u8) -> Self { Self(zone) }

    /// Returns the zone number.
    #[must_use]
    pub const fn get(self) -> u8 { self.0 }
}

/// The stable identity of a request kind: a zone and an id local to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestKindId {
    zone: Zone,
    local_id: u8,
}

impl RequestKindId {
    /// Creates the identity of the `local_id`-th kind of `zone`.
    #[must_use]
    pub const fn new(zone: Zone, local_id: u8) -> Self {
        Self { zone, local_id }
    }

    /// Returns the zone of the request kind.
    #[must_use]
    pub const fn zone(self) -> Zone { self.zone }

    /// Returns the id of the request kind within its zone.
    #[must_use]
    pub const fn local_id(self) -> u8 { self.local_id }

    /// Packs the identity into a compact index, `zone << 8 | local_id`.
    ///
    /// The index is unique per identity and ordered like the identity
    /// itself.
    #[must_use]
    pub const fn index(self) -> u16 {
        ((self.zone.0 as u16) << 8) | self.local_id as u16
    }
}

impl fmt::Display for RequestKindId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.zone.0, self.local_id)
    }
}

/// A registry entry: the identity and display name of a request kind, plus
/// the Rust type implementing it.
///
/// Two entries are equal only if they name the same type. The registry
/// relies on it to reject distinct types claiming one identity, even when
/// their display names coincide.
#[derive(Clone, Copy)]
pub struct RequestKind {
    id: RequestKindId,
    name: &'static str,
    type_id: fn() -> TypeId,
    type_name: fn() -> &'static str,
}

impl RequestKind {
    /// Creates the registry entry of the request type `T`.
    #[must_use]
    pub const fn new<T: ?Sized + 'static>(
        zone: Zone,
        local_id: u8,
        name: &'static str,
    ) -> Self {
        Self {
            id: RequestKindId::new(zone, local_id),
            name,
            type_id: TypeId::of::<T>,
            type_name: std::any::type_name::<T>,
        }
    }

    /// Returns the identity of the request kind.
    #[must_use]
    pub const fn id(&self) -> RequestKindId { self.id }

    /// Returns the display name of the request kind.
    #[must_use]
    pub const fn name(&self) -> &'static str { self.name }

    /// Returns the [`TypeId`] of the request type.
    #[must_use]
    pub fn request_type_id(&self) -> TypeId { (self.type_id)() }

    /// Returns the path of the request type, for diagnostics.
    #[must_use]
    pub fn request_type_name(&self) -> &'static str { (self.type_name)() }
}

impl PartialEq for RequestKind {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.request_type_id() == other.request_type_id()
    }
}

impl Eq for RequestKind {}

impl Hash for RequestKind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.name.hash(state);
    }
}

impl fmt::Debug for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestKind")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("type", &self.request_type_name())
            .finish()
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// A type that names a request kind.
///
/// Prefer `#[derive(Identifiable)]`, which reads the identity from a
/// `#[request_kind(zone = .., local_id = ..)]` attribute and defaults the
/// display name to the type name.
#[diagnostic::on_unimplemented(
    message = "The type `{Self}` does not implement `Identifiable`",
    note = "You can derive `Identifiable` using `#[derive(Identifiable)]` and \
            `#[request_kind(zone = .., local_id = ..)]`",
    label = "`Identifiable` is required to register the request kind"
)]
pub trait Identifiable {
    /// The registry entry of this request kind.
    const REQUEST_KIND: RequestKind;
}

/// Builds a static table of registry entries from request types.
///
/// The table is the configuration a [`Registry`] is loaded from at startup.
///
/// ```rust
/// use demand::{Identifiable, RequestKind};
///
/// #[derive(Identifiable)]
/// #[request_kind(zone = 3, local_id = 7)]
/// struct NameLookup;
///
/// const NAME_LOOKUP_REQUESTS: &[RequestKind] =
///     demand::request_table![NameLookup];
///
/// assert_eq!(NAME_LOOKUP_REQUESTS[0].name(), "NameLookup");
/// ```
#[macro_export]
macro_rules! request_table {
    ($($request:ty),* $(,)?) => {
        &[$(<$request as $crate::registry::Identifiable>::REQUEST_KIND),*]
    };
}

/// Maps request kind identities to their registry entries.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    kinds: FxHashMap<RequestKindId, RequestKind>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Creates a registry from static tables, typically built with
    /// [`request_table!`](crate::request_table).
    ///
    /// # Panics
    ///
    /// Panics if two different entries claim the same identity.
    pub fn from_tables<'a>(
        tables: impl IntoIterator<Item = &'a [RequestKind]>,
    ) -> Self {
        let mut registry = Self::new();

        for kind in tables.into_iter().flatten() {
            registry.register(*kind);
        }

        registry
    }

    /// Registers a request kind and returns its identity.
    ///
    /// Registering the same entry again is a no-op.
    ///
    /// # Panics
    ///
    /// Panics if a different kind, either another type or another display
    /// name, is already registered under the same identity. Two kinds
    /// sharing an identity would share statistics counters and generic cache
    /// tags, so the collision must be fixed in the declarations.
    pub fn register(&mut self, kind: RequestKind) -> RequestKindId {
        match self.kinds.entry(kind.id) {
            Entry::Vacant(entry) => {
                tracing::trace!(kind = %kind, "registered request kind");
                entry.insert(kind);
            }

            Entry::Occupied(entry) => {
                let existing = entry.get();

                assert!(
                    *existing == kind,
                    "request kinds `{}` ({}) and `{}` ({}) both claim the \
                     identity {}",
                    existing.name,
                    existing.request_type_name(),
                    kind.name,
                    kind.request_type_name(),
                    kind.id,
                );
            }
        }

        kind.id
    }

    /// Returns whether a kind is registered under `id`.
    #[must_use]
    pub fn is_registered(&self, id: RequestKindId) -> bool {
        self.kinds.contains_key(&id)
    }

    /// Returns the registry entry of `id`.
    #[must_use]
    pub fn get(&self, id: RequestKindId) -> Option<&RequestKind> {
        self.kinds.get(&id)
    }

    /// Returns the display name of `id`.
    #[must_use]
    pub fn display_name(&self, id: RequestKindId) -> Option<&'static str> {
        self.kinds.get(&id).map(RequestKind::name)
    }

    /// Iterates over the registered kinds ordered by identity.
    pub fn iter(&self) -> impl Iterator<Item = &RequestKind> {
        let mut kinds = self.kinds.values().collect::<Vec<_>>();
        kinds.sort_unstable_by_key(|kind| kind.id);

        kinds.into_iter()
    }

    /// Returns the number of registered kinds.
    #[must_use]
    pub fn len(&self) -> usize { self.kinds.len() }

    /// Returns whether no kind is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.kinds.is_empty() }
}

#[cfg(test)]
mod test;
