use std::collections::{HashMap, hash_map::Entry};

use crate::{
    config::Config,
    registry::RequestKindId,
    request::{DynRequest, Request},
    value::AnyValue,
};

struct CachedValue<C: Config> {
    kind: RequestKindId,
    value: AnyValue<C>,
}

/// The generic cache shared by every engine-cached request kind.
///
/// Each value is tagged with the kind that produced it and the tag is
/// checked on every read.
pub(super) struct Cache<C: Config> {
    entries: HashMap<Box<dyn DynRequest>, CachedValue<C>, C::BuildHasher>,
}

impl<C: Config> Default for Cache<C> {
    fn default() -> Self { Self { entries: HashMap::default() } }
}

impl<C: Config> Cache<C> {
    pub(super) fn get<R: Request>(&self, request: &R) -> Option<R::Value> {
        let key: &(dyn DynRequest + 'static) = request;
        let entry = self.entries.get(key)?;

        assert!(
            entry.kind == R::REQUEST_KIND.id(),
            "generic cache entry of `{request:?}` is tagged {} but was read \
             as {}",
            entry.kind,
            R::REQUEST_KIND.id(),
        );

        Some(entry.value.cloned::<R::Value>())
    }

    pub(super) fn contains<R: Request>(&self, request: &R) -> bool {
        let key: &(dyn DynRequest + 'static) = request;

        self.entries.contains_key(key)
    }

    pub(super) fn insert<R: Request>(&mut self, request: &R, value: R::Value) {
        let key: Box<dyn DynRequest> = Box::new(request.clone());

        match self.entries.entry(key) {
            Entry::Vacant(entry) => {
                entry.insert(CachedValue {
                    kind: R::REQUEST_KIND.id(),
                    value: AnyValue::wrap(value),
                });
            }

            Entry::Occupied(entry) => {
                debug_assert!(
                    entry.get().value.downcast_ref::<R::Value>()
                        == Some(&value),
                    "`{request:?}` was evaluated twice with different results",
                );
            }
        }
    }

    pub(super) fn len(&self) -> usize { self.entries.len() }

    pub(super) fn clear(&mut self) { self.entries.clear(); }
}
