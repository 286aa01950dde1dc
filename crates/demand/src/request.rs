//! Request definitions.
//!
//! A request is an immutable value naming a question about the program. Its
//! fields are the input key; two requests of the same kind are the same
//! question exactly when their fields compare equal. Constructing a request
//! is cheap and never evaluates anything.
//!
//! # Defining Requests
//!
//! 1. Create a struct whose fields are the input key. Key declarations by
//!    [`Id`](crate::Id), never by address.
//! 2. Derive `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash` and
//!    [`Identifiable`](crate::Identifiable).
//! 3. Implement [`Request`], choosing a [`CacheDiscipline`].
//!
//! ```rust
//! use demand::{
//!     CacheDiscipline, Config, CyclicError, Evaluator, Identifiable, Request,
//! };
//!
//! /// Counts the characters of a name. Cheap enough to never cache.
//! #[derive(Debug, Clone, PartialEq, Eq, Hash, Identifiable)]
//! #[request_kind(zone = 2, local_id = 0)]
//! struct NameLength(String);
//!
//! impl Request for NameLength {
//!     type Value = usize;
//!     type Error = CyclicError;
//!
//!     const CACHE_DISCIPLINE: CacheDiscipline = CacheDiscipline::NotCached;
//!
//!     fn evaluate<C: Config>(
//!         &self,
//!         _: &Evaluator<C>,
//!     ) -> Result<usize, CyclicError> {
//!         Ok(self.0.chars().count())
//!     }
//! }
//!
//! let evaluator = Evaluator::<demand::DefaultConfig>::default();
//!
//! assert_eq!(evaluator.get_result(&NameLength("Ünïcode".into())), Ok(7));
//! ```

use std::{
    any::Any,
    fmt::Debug,
    hash::{Hash, Hasher},
    sync::Arc,
};

use enum_as_inner::EnumAsInner;

use crate::{
    config::Config,
    diagnostics::{Diagnostic, DiagnosticSink, SourceLoc},
    evaluator::{CyclicError, Evaluator},
    registry::{Identifiable, RequestKind},
};

/// Where, if anywhere, the result of a request is memoized.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumAsInner,
)]
pub enum CacheDiscipline {
    /// Every call re-runs the evaluation. Only cycle detection applies.
    NotCached,

    /// The evaluator keeps the result in its generic cache, keyed by the
    /// request itself.
    EngineCached,

    /// The request owns its storage, typically a slot on the queried
    /// declaration, and the evaluator goes through [`Request::cache_read`]
    /// and [`Request::cache_write`].
    SelfCached,
}

/// A question about the program, answered by [`Evaluator::get_result`].
///
/// # Required Traits
///
/// - [`Identifiable`]: the registry identity of the request kind
/// - [`Eq`] + [`Hash`]: structural over the input key; the generic cache and
///   the cycle check rely on the two being consistent
/// - [`Clone`]: the evaluator keeps a copy while the request is active
/// - [`Debug`]: cycle logs and dependency dumps print requests
/// - [`Send`] + [`Sync`]: a [`CyclicError`] may cross threads
///
/// # Cycle Hooks
///
/// When a request reenters itself, the evaluator calls
/// [`diagnose_cycle`](Request::diagnose_cycle) once on the reentering
/// request, then [`note_cycle_step`](Request::note_cycle_step) on every
/// other request of the cycle, from the most recent back toward the one
/// that started it. The defaults emit a generic error and generic notes.
pub trait Request:
    Identifiable + Any + Eq + Hash + Clone + Debug + Send + Sync + 'static
{
    /// The result of a successful evaluation.
    type Value: 'static + Send + Sync + Clone + Debug + PartialEq;

    /// The failure of an evaluation.
    ///
    /// Must be constructible from [`CyclicError`] so that a cycle detected
    /// in a nested request propagates with `?`.
    type Error: From<CyclicError> + Debug;

    /// How the result of this request kind is memoized.
    const CACHE_DISCIPLINE: CacheDiscipline;

    /// Computes the result.
    ///
    /// Nested questions must go through `evaluator.get_result`, which is how
    /// transitive cycles are detected.
    ///
    /// # Errors
    ///
    /// Returns the request's own failure, or a propagated [`CyclicError`].
    fn evaluate<C: Config>(
        &self,
        evaluator: &Evaluator<C>,
    ) -> Result<Self::Value, Self::Error>;

    /// Whether this particular instance is memoized.
    ///
    /// Returning `false` makes a cacheable request behave as
    /// [`CacheDiscipline::NotCached`] for this input.
    fn is_cached(&self) -> bool { true }

    /// Reads the self-managed cache slot.
    ///
    /// Only called for [`CacheDiscipline::SelfCached`] kinds.
    ///
    /// # Panics
    ///
    /// The default panics. Self-cached kinds must implement it.
    fn cache_read(&self) -> Option<Self::Value> {
        panic!(
            "request kind `{}` is self-cached but doesn't implement \
             `cache_read`",
            Self::REQUEST_KIND.name()
        )
    }

    /// Writes the self-managed cache slot.
    ///
    /// Only called for [`CacheDiscipline::SelfCached`] kinds, after a
    /// successful evaluation.
    ///
    /// # Panics
    ///
    /// The default panics. Self-cached kinds must implement it.
    fn cache_write(&self, value: Self::Value) {
        let _ = value;

        panic!(
            "request kind `{}` is self-cached but doesn't implement \
             `cache_write`",
            Self::REQUEST_KIND.name()
        )
    }

    /// Reports the cycle that this request closed.
    fn diagnose_cycle(&self, sink: &dyn DiagnosticSink, location: SourceLoc) {
        sink.emit(Diagnostic::error(location, "circular reference"));
    }

    /// Reports this request as one step of a cycle closed by another one.
    fn note_cycle_step(&self, sink: &dyn DiagnosticSink, location: SourceLoc) {
        sink.emit(Diagnostic::note(location, "through reference here"));
    }

    /// A location to point at when nothing better is known.
    fn nearest_source_location(&self) -> SourceLoc { SourceLoc::INVALID }
}

/// Type-erased interface of requests.
///
/// Used by the active stack, the generic cache keys and [`CyclicError`].
/// Automatically implemented for every [`Request`].
pub trait DynRequest: Any + Debug + Send + Sync {
    /// Returns the registry entry of the request kind.
    fn request_kind(&self) -> RequestKind;

    /// Compares with another erased request. Requests of different kinds
    /// are never equal.
    fn eq_dyn(&self, other: &dyn DynRequest) -> bool;

    /// Hashes the kind identity followed by the input key.
    fn hash_dyn(&self, state: &mut dyn Hasher);

    /// Clones into a box.
    fn clone_boxed(&self) -> Box<dyn DynRequest>;

    /// Clones into a shared pointer.
    fn clone_shared(&self) -> Arc<dyn DynRequest>;

    /// See [`Request::nearest_source_location`].
    fn nearest_source_location_dyn(&self) -> SourceLoc;

    /// See [`Request::diagnose_cycle`].
    fn diagnose_cycle_dyn(
        &self,
        sink: &dyn DiagnosticSink,
        location: SourceLoc,
    );

    /// See [`Request::note_cycle_step`].
    fn note_cycle_step_dyn(
        &self,
        sink: &dyn DiagnosticSink,
        location: SourceLoc,
    );

    /// Returns `self` as [`Any`] for downcasting.
    fn as_any(&self) -> &dyn Any;
}

impl<R: Request> DynRequest for R {
    fn request_kind(&self) -> RequestKind { R::REQUEST_KIND }

    fn eq_dyn(&self, other: &dyn DynRequest) -> bool {
        other.downcast_request::<R>().is_some_and(|other| self == other)
    }

    fn hash_dyn(&self, mut state: &mut dyn Hasher) {
        R::REQUEST_KIND.id().hash(&mut state);
        self.hash(&mut state);
    }

    fn clone_boxed(&self) -> Box<dyn DynRequest> { Box::new(self.clone()) }

    fn clone_shared(&self) -> Arc<dyn DynRequest> { Arc::new(self.clone()) }

    fn nearest_source_location_dyn(&self) -> SourceLoc {
        self.nearest_source_location()
    }

    fn diagnose_cycle_dyn(
        &self,
        sink: &dyn DiagnosticSink,
        location: SourceLoc,
    ) {
        self.diagnose_cycle(sink, location);
    }

    fn note_cycle_step_dyn(
        &self,
        sink: &dyn DiagnosticSink,
        location: SourceLoc,
    ) {
        self.note_cycle_step(sink, location);
    }

    fn as_any(&self) -> &dyn Any { self }
}

impl dyn DynRequest + '_ {
    /// Attempts to downcast to a concrete request type.
    pub fn downcast_request<R: Request>(&self) -> Option<&R> {
        self.as_any().downcast_ref::<R>()
    }
}

impl PartialEq for dyn DynRequest + '_ {
    fn eq(&self, other: &Self) -> bool { self.eq_dyn(other) }
}

impl Eq for dyn DynRequest + '_ {}

impl Hash for dyn DynRequest + '_ {
    fn hash<H: Hasher>(&self, state: &mut H) { self.hash_dyn(state); }
}

#[cfg(test)]
mod test {
    use std::hash::BuildHasher;

    use super::{CacheDiscipline, DynRequest, Request};
    use crate::{
        Config, CyclicError, Evaluator, Identifiable,
        diagnostics::{DiagnosticCollector, Severity, SourceLoc},
    };

    #[derive(Debug, Clone, PartialEq, Eq, Hash, Identifiable)]
    #[request_kind(zone = 10, local_id = 0)]
    struct Superclass(u32);

    #[derive(Debug, Clone, PartialEq, Eq, Hash, Identifiable)]
    #[request_kind(zone = 10, local_id = 1)]
    struct IsFinal(u32);

    impl Request for Superclass {
        type Value = Option<u32>;
        type Error = CyclicError;

        const CACHE_DISCIPLINE: CacheDiscipline = CacheDiscipline::EngineCached;

        fn evaluate<C: Config>(
            &self,
            _: &Evaluator<C>,
        ) -> Result<Option<u32>, CyclicError> {
            Ok(self.0.checked_sub(1))
        }

        fn nearest_source_location(&self) -> SourceLoc {
            SourceLoc::new(self.0 * 10)
        }
    }

    impl Request for IsFinal {
        type Value = bool;
        type Error = CyclicError;

        const CACHE_DISCIPLINE: CacheDiscipline = CacheDiscipline::SelfCached;

        fn evaluate<C: Config>(
            &self,
            _: &Evaluator<C>,
        ) -> Result<bool, CyclicError> {
            Ok(false)
        }
    }

    #[test]
    fn erased_equality_is_structural_and_kind_aware() {
        let a: Box<dyn DynRequest> = Box::new(Superclass(1));
        let b: Box<dyn DynRequest> = Box::new(Superclass(1));
        let c: Box<dyn DynRequest> = Box::new(Superclass(2));
        let d: Box<dyn DynRequest> = Box::new(IsFinal(1));

        assert_eq!(&*a, &*b);
        assert_ne!(&*a, &*c);
        assert_ne!(&*a, &*d);

        let hasher = fxhash::FxBuildHasher::default();
        assert_eq!(hasher.hash_one(&*a), hasher.hash_one(&*b));
    }

    #[test]
    fn downcast_to_the_concrete_request() {
        let erased = Superclass(3).clone_shared();

        assert_eq!(
            erased.downcast_request::<Superclass>(),
            Some(&Superclass(3))
        );
        assert_eq!(erased.downcast_request::<IsFinal>(), None);
        assert_eq!(erased.request_kind(), Superclass::REQUEST_KIND);
        assert_eq!(erased.nearest_source_location_dyn(), SourceLoc::new(30));
    }

    #[test]
    fn default_cycle_hooks() {
        let sink = DiagnosticCollector::new();
        let request = Superclass(1);

        request.diagnose_cycle(&sink, SourceLoc::new(4));
        request.note_cycle_step(&sink, SourceLoc::INVALID);

        let diagnostics = sink.take();

        assert_eq!(diagnostics[0].severity, Severity::Error);
        assert_eq!(diagnostics[0].message, "circular reference");
        assert_eq!(diagnostics[0].location, SourceLoc::new(4));
        assert_eq!(diagnostics[1].severity, Severity::Note);
        assert_eq!(diagnostics[1].message, "through reference here");
    }

    #[test]
    #[should_panic(expected = "doesn't implement `cache_read`")]
    fn self_cached_kind_without_storage() {
        let evaluator = Evaluator::<crate::DefaultConfig>::default();

        let _ = evaluator.get_result(&IsFinal(0));
    }
}
