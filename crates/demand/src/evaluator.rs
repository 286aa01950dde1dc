//! The evaluator: caching dispatch, the active stack and cycle detection.
//!
//! [`Evaluator::get_result`] is the single entry point. For one request it:
//!
//! 1. probes the cache selected by the request's [`CacheDiscipline`] and
//!    returns a hit right away, without counting it;
//! 2. fails with [`CyclicError`] if an equal request is already active,
//!    after running the cycle hooks;
//! 3. pushes the request onto the active stack, evaluates it and pops it on
//!    every exit path;
//! 4. on success, stores the value per discipline and counts one evaluation
//!    of the request kind. Failures are neither cached nor counted.
//!
//! [`CacheDiscipline`]: crate::CacheDiscipline

use std::{
    cell::{Ref, RefCell},
    fmt,
    rc::Rc,
    sync::Arc,
};

use crate::{
    config::{Config, DefaultConfig, Options},
    diagnostics::{DiagnosticSink, SourceLoc, TracingDiagnostics},
    registry::{Registry, RequestKind},
    request::{CacheDiscipline, DynRequest, Request},
    statistics::{Statistics, StatisticsSink},
};

mod active_stack;
mod cache;
mod dependencies;

use active_stack::ActiveStack;
use cache::Cache;
use dependencies::DependencyGraph;

/// The failure returned when a request transitively depends on its own,
/// still incomplete, evaluation.
///
/// Carries the request whose reentry closed the cycle. The cycle hooks
/// have already run by the time the error is returned; callers only need
/// to propagate it.
#[derive(Debug, Clone, thiserror::Error)]
#[error("cyclic evaluation of `{request:?}`")]
pub struct CyclicError {
    request: Arc<dyn DynRequest>,
}

impl CyclicError {
    /// Returns the registry entry of the request that closed the cycle.
    #[must_use]
    pub fn kind(&self) -> RequestKind { self.request.request_kind() }

    /// Returns the request that closed the cycle.
    #[must_use]
    pub fn request(&self) -> &dyn DynRequest { &*self.request }

    /// Returns the request that closed the cycle if it is an `R`.
    #[must_use]
    pub fn downcast_request<R: Request>(&self) -> Option<&R> {
        self.request.downcast_request::<R>()
    }
}

impl PartialEq for CyclicError {
    fn eq(&self, other: &Self) -> bool { *self.request == *other.request }
}

impl Eq for CyclicError {}

static_assertions::assert_impl_all!(CyclicError: Send, Sync);

/// Evaluates requests on demand.
///
/// The evaluator owns the active stack, the generic cache, the registry and
/// the statistics counters. It is single-threaded: evaluation is plain
/// call-stack recursion through [`get_result`](Self::get_result).
///
/// ```rust
/// use std::rc::Rc;
///
/// use demand::{
///     CacheDiscipline, Config, CyclicError, Evaluator, Identifiable, Options,
///     Registry, Request, diagnostics::DiagnosticCollector,
/// };
///
/// /// A request that depends on itself.
/// #[derive(Debug, Clone, PartialEq, Eq, Hash, Identifiable)]
/// #[request_kind(zone = 1, local_id = 0)]
/// struct Ouroboros;
///
/// impl Request for Ouroboros {
///     type Value = ();
///     type Error = CyclicError;
///
///     const CACHE_DISCIPLINE: CacheDiscipline = CacheDiscipline::EngineCached;
///
///     fn evaluate<C: Config>(
///         &self,
///         evaluator: &Evaluator<C>,
///     ) -> Result<(), CyclicError> {
///         evaluator.get_result(self)
///     }
/// }
///
/// let diagnostics = Rc::new(DiagnosticCollector::new());
/// let evaluator = Evaluator::<demand::DefaultConfig>::with_options(
///     Registry::new(),
///     diagnostics.clone(),
///     Options::builder().debug_cycles(true).build(),
/// );
///
/// let error = evaluator.get_result(&Ouroboros).unwrap_err();
///
/// assert_eq!(error.downcast_request::<Ouroboros>(), Some(&Ouroboros));
/// assert_eq!(diagnostics.error_count(), 1);
/// assert_eq!(evaluator.active_depth(), 0);
/// ```
pub struct Evaluator<C: Config = DefaultConfig> {
    active: RefCell<ActiveStack<C>>,
    cache: RefCell<Cache<C>>,
    registry: RefCell<Registry>,
    statistics: Statistics,
    statistics_sinks: Vec<Rc<dyn StatisticsSink>>,
    diagnostics: Rc<dyn DiagnosticSink>,
    dependencies: Option<RefCell<DependencyGraph<C>>>,
    options: Options,
}

static_assertions::assert_not_impl_any!(Evaluator<DefaultConfig>: Sync);

impl<C: Config> Default for Evaluator<C> {
    fn default() -> Self {
        Self::new(Registry::new(), Rc::new(TracingDiagnostics))
    }
}

impl<C: Config> fmt::Debug for Evaluator<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evaluator")
            .field("active_depth", &self.active_depth())
            .field("cached_entries", &self.cached_entry_count())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<C: Config> Evaluator<C> {
    /// Creates an evaluator with default [`Options`].
    ///
    /// Request kinds missing from `registry` are registered the first time
    /// they are evaluated.
    #[must_use]
    pub fn new(
        registry: Registry,
        diagnostics: Rc<dyn DiagnosticSink>,
    ) -> Self {
        Self::with_options(registry, diagnostics, Options::default())
    }

    /// Creates an evaluator with the given [`Options`].
    #[must_use]
    pub fn with_options(
        registry: Registry,
        diagnostics: Rc<dyn DiagnosticSink>,
        options: Options,
    ) -> Self {
        Self {
            active: RefCell::default(),
            cache: RefCell::default(),
            registry: RefCell::new(registry),
            statistics: Statistics::new(),
            statistics_sinks: Vec::new(),
            diagnostics,
            dependencies: options
                .record_dependencies
                .then(|| RefCell::new(DependencyGraph::default())),
            options,
        }
    }

    /// Answers `request`.
    ///
    /// # Errors
    ///
    /// Returns the request's own error, or a [`CyclicError`] converted into
    /// it when the request is already being evaluated further up the call
    /// chain.
    ///
    /// # Panics
    ///
    /// Panics if more than [`Config::max_evaluation_depth`] requests are
    /// active at once, or if two request kinds claim the same registry
    /// identity.
    pub fn get_result<R: Request>(
        &self,
        request: &R,
    ) -> Result<R::Value, R::Error> {
        self.record_dependency(request);

        let cacheable =
            !R::CACHE_DISCIPLINE.is_not_cached() && request.is_cached();

        if cacheable && let Some(value) = self.probe_cache(request) {
            tracing::trace!(kind = R::REQUEST_KIND.name(), "cache hit");

            return Ok(value);
        }

        self.check_reentry(request)?;

        let value = self.evaluate_uncached(request)?;

        if cacheable {
            match R::CACHE_DISCIPLINE {
                CacheDiscipline::SelfCached => {
                    request.cache_write(value.clone());
                }

                CacheDiscipline::EngineCached => {
                    self.cache.borrow_mut().insert(request, value.clone());
                }

                CacheDiscipline::NotCached => {}
            }
        }

        self.record_evaluation(R::REQUEST_KIND);

        Ok(value)
    }

    fn probe_cache<R: Request>(&self, request: &R) -> Option<R::Value> {
        match R::CACHE_DISCIPLINE {
            CacheDiscipline::SelfCached => request.cache_read(),
            CacheDiscipline::EngineCached => self.cache.borrow().get(request),
            CacheDiscipline::NotCached => None,
        }
    }

    fn check_reentry<R: Request>(
        &self,
        request: &R,
    ) -> Result<(), CyclicError> {
        let (cycle, top_location) = {
            let active = self.active.borrow();

            let Some(position) = active.position(request) else {
                return Ok(());
            };

            (active.cycle_from(position), active.top_location())
        };

        let sink = &*self.diagnostics;

        request.diagnose_cycle(
            sink,
            request.nearest_source_location().or(top_location),
        );

        // the bottom entry is the reentered request itself
        for (step, location) in cycle.iter().skip(1).rev() {
            step.note_cycle_step_dyn(sink, *location);
        }

        // the path is only rendered when the event is enabled
        if self.options.debug_cycles {
            tracing::warn!(
                kind = R::REQUEST_KIND.name(),
                path = %cycle_path(&cycle, request),
                "cyclic evaluation detected"
            );
        } else {
            tracing::debug!(
                kind = R::REQUEST_KIND.name(),
                path = %cycle_path(&cycle, request),
                "cyclic evaluation detected"
            );
        }

        Err(CyclicError { request: Arc::new(request.clone()) })
    }

    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(kind = R::REQUEST_KIND.name())
    )]
    fn evaluate_uncached<R: Request>(
        &self,
        request: &R,
    ) -> Result<R::Value, R::Error> {
        let _guard = self.push_active(request);

        request.evaluate(self)
    }

    fn push_active<R: Request>(&self, request: &R) -> ActiveGuard<'_, C> {
        self.registry.borrow_mut().register(R::REQUEST_KIND);

        let mut active = self.active.borrow_mut();

        if active.len() >= C::max_evaluation_depth() {
            let stack = active.describe();
            drop(active);

            panic!(
                "evaluation depth exceeded {} while evaluating `{request:?}`; \
                 active requests, innermost first:\n{stack}",
                C::max_evaluation_depth(),
            );
        }

        active.push(request);

        ActiveGuard { evaluator: self }
    }

    fn record_dependency<R: Request>(&self, request: &R) {
        let Some(dependencies) = &self.dependencies else {
            return;
        };

        let active = self.active.borrow();

        dependencies.borrow_mut().record(active.top(), request);
    }

    fn record_evaluation(&self, kind: RequestKind) {
        self.statistics.record_evaluation(&kind);

        for sink in &self.statistics_sinks {
            sink.record_evaluation(&kind);
        }
    }
}

impl<C: Config> Evaluator<C> {
    /// Returns the number of requests currently being evaluated.
    #[must_use]
    pub fn active_depth(&self) -> usize { self.active.borrow().len() }

    /// Returns whether a request equal to `request` is being evaluated.
    #[must_use]
    pub fn is_active<R: Request>(&self, request: &R) -> bool {
        self.active.borrow().position(request).is_some()
    }

    /// Renders the active stack, innermost request first.
    #[must_use]
    pub fn describe_active_stack(&self) -> String {
        self.active.borrow().describe()
    }

    /// Returns whether the generic cache holds a result for `request`.
    ///
    /// Always `false` for requests that aren't engine-cached.
    #[must_use]
    pub fn is_cached_in_engine<R: Request>(&self, request: &R) -> bool {
        self.cache.borrow().contains(request)
    }

    /// Returns the number of results in the generic cache.
    #[must_use]
    pub fn cached_entry_count(&self) -> usize { self.cache.borrow().len() }

    /// Drops every result of the generic cache.
    ///
    /// Self-managed caches are left alone; they belong to the declarations
    /// that hold them.
    pub fn clear_cache(&mut self) { self.cache.get_mut().clear(); }

    /// Returns the built-in statistics counters.
    #[must_use]
    pub const fn statistics(&self) -> &Statistics { &self.statistics }

    /// Returns the number of evaluations of `R` performed so far.
    #[must_use]
    pub fn evaluation_count<R: Request>(&self) -> usize {
        self.statistics.count(R::REQUEST_KIND.id())
    }

    /// Returns `(display name, evaluations)` pairs ordered by kind identity.
    #[must_use]
    pub fn statistics_report(&self) -> Vec<(&'static str, usize)> {
        let registry = self.registry.borrow();

        self.statistics
            .snapshot()
            .into_iter()
            .map(|(id, count)| {
                (registry.display_name(id).unwrap_or("<unregistered>"), count)
            })
            .collect()
    }

    /// Feeds every future evaluation to `sink` as well.
    pub fn add_statistics_sink(&mut self, sink: Rc<dyn StatisticsSink>) {
        self.statistics_sinks.push(sink);
    }

    /// Returns the registry of request kinds seen so far.
    #[must_use]
    pub fn registry(&self) -> Ref<'_, Registry> { self.registry.borrow() }

    /// Returns the runtime options.
    #[must_use]
    pub const fn options(&self) -> &Options { &self.options }

    /// Returns the sink receiving cycle diagnostics.
    #[must_use]
    pub fn diagnostics(&self) -> &dyn DiagnosticSink { &*self.diagnostics }

    /// Returns the recorded `(requester, requested)` pairs, in the order
    /// they were first seen.
    ///
    /// Empty unless [`Options::record_dependencies`] is set.
    #[must_use]
    pub fn dependency_edges(&self) -> Vec<(String, String)> {
        self.dependencies
            .as_ref()
            .map(|dependencies| dependencies.borrow().edges())
            .unwrap_or_default()
    }

    /// Writes the recorded dependency graph in Graphviz format.
    ///
    /// Writes an empty graph unless [`Options::record_dependencies`] is set.
    ///
    /// # Errors
    ///
    /// Propagates the errors of `out`.
    pub fn write_dependency_graphviz(
        &self,
        out: &mut impl fmt::Write,
    ) -> fmt::Result {
        match &self.dependencies {
            Some(dependencies) => dependencies.borrow().write_graphviz(out),
            None => writeln!(out, "digraph Dependencies {{\n}}"),
        }
    }
}

fn cycle_path(
    cycle: &[(Arc<dyn DynRequest>, SourceLoc)],
    closing: &dyn DynRequest,
) -> String {
    cycle
        .iter()
        .map(|(step, _)| format!("{step:?}"))
        .chain(std::iter::once(format!("{closing:?}")))
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Pops the active stack when an evaluation ends, however it ends.
struct ActiveGuard<'e, C: Config> {
    evaluator: &'e Evaluator<C>,
}

impl<C: Config> Drop for ActiveGuard<'_, C> {
    fn drop(&mut self) { self.evaluator.active.borrow_mut().pop(); }
}
