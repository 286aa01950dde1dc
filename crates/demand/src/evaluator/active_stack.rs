use std::{collections::HashMap, fmt::Write, hash::BuildHasher, sync::Arc};

use smallbox::SmallBox;

use crate::{
    config::Config,
    diagnostics::SourceLoc,
    request::{DynRequest, Request},
};

struct ActiveEntry<C: Config> {
    request: SmallBox<dyn DynRequest, C::Storage>,
    location: SourceLoc,
    fingerprint: u64,
}

/// The chain of requests currently being evaluated, bottom first.
///
/// Mirrors the request-relevant part of the native call stack. The
/// fingerprint counts answer most membership checks without scanning.
pub(super) struct ActiveStack<C: Config> {
    entries: Vec<ActiveEntry<C>>,
    fingerprints: HashMap<u64, usize, C::BuildHasher>,
    hasher: C::BuildHasher,
}

impl<C: Config> Default for ActiveStack<C> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            fingerprints: HashMap::default(),
            hasher: C::BuildHasher::default(),
        }
    }
}

impl<C: Config> ActiveStack<C> {
    fn fingerprint(&self, request: &dyn DynRequest) -> u64 {
        self.hasher.hash_one(request)
    }

    pub(super) fn len(&self) -> usize { self.entries.len() }

    pub(super) fn top(&self) -> Option<&(dyn DynRequest + 'static)> {
        self.entries.last().map(|entry| &*entry.request)
    }

    /// The location of the innermost active request, the fallback for
    /// requests that don't know their own.
    pub(super) fn top_location(&self) -> SourceLoc {
        self.entries.last().map_or(SourceLoc::INVALID, |entry| entry.location)
    }

    pub(super) fn push<R: Request>(&mut self, request: &R) {
        let fingerprint = self.fingerprint(request);
        let location =
            request.nearest_source_location().or(self.top_location());
        let request: SmallBox<dyn DynRequest, C::Storage> =
            smallbox::smallbox!(request.clone());

        *self.fingerprints.entry(fingerprint).or_default() += 1;
        self.entries.push(ActiveEntry { request, location, fingerprint });
    }

    pub(super) fn pop(&mut self) {
        let Some(entry) = self.entries.pop() else {
            panic!("popped an empty active stack");
        };

        if let Some(count) = self.fingerprints.get_mut(&entry.fingerprint) {
            *count -= 1;

            if *count == 0 {
                self.fingerprints.remove(&entry.fingerprint);
            }
        }
    }

    /// Returns the position of the first active entry equal to `request`.
    pub(super) fn position<R: Request>(&self, request: &R) -> Option<usize> {
        let fingerprint = self.fingerprint(request);

        if !self.fingerprints.contains_key(&fingerprint) {
            return None;
        }

        self.entries.iter().position(|entry| {
            entry.fingerprint == fingerprint && entry.request.eq_dyn(request)
        })
    }

    /// Returns the entries from `position` to the top, bottom first.
    pub(super) fn cycle_from(
        &self,
        position: usize,
    ) -> Vec<(Arc<dyn DynRequest>, SourceLoc)> {
        self.entries[position..]
            .iter()
            .map(|entry| (entry.request.clone_shared(), entry.location))
            .collect()
    }

    /// Renders one line per entry, innermost first.
    pub(super) fn describe(&self) -> String {
        let mut out = String::new();

        for (depth, entry) in self.entries.iter().enumerate().rev() {
            let _ = writeln!(
                out,
                "  #{depth} {}: {:?} at {}",
                entry.request.request_kind().name(),
                &*entry.request,
                entry.location
            );
        }

        out
    }
}
