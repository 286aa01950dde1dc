//! # demand - Demand-Driven Request Evaluation
//!
//! `demand` is the evaluation engine underneath a compiler's semantic
//! analysis. Facts about the program ("is this class final?", "what is the
//! superclass of this class?") are expressed as *requests*: small immutable
//! values that name a question. The [`Evaluator`] answers them lazily,
//! memoizes the answers and detects when a request transitively depends on
//! its own, still incomplete, evaluation.
//!
//! ## Key Features
//!
//! - **Lazy evaluation**: constructing a request never evaluates it; work only
//!   happens when [`Evaluator::get_result`] is called
//! - **Three caching disciplines**: [`CacheDiscipline::NotCached`],
//!   [`CacheDiscipline::EngineCached`] (a type-erased cache owned by the
//!   evaluator) and [`CacheDiscipline::SelfCached`] (storage owned by the
//!   queried declaration)
//! - **Cycle detection**: reentering an active request fails with a
//!   [`CyclicError`] after the request and every step of the cycle had a
//!   chance to diagnose it
//! - **Statistics**: one counter per request kind, incremented only when
//!   work was actually performed
//! - **Dependency recording**: optional Graphviz dump of which requests asked
//!   for which
//!
//! ## Core Concepts
//!
//! ### Requests
//!
//! A **request** implements the [`Request`] trait. Its fields are the input
//! key; equality and hashing are structural over those fields. Every request
//! kind carries a registry identity (a zone and a local id) through the
//! [`Identifiable`] trait, normally derived:
//!
//! ```rust
//! use demand::{
//!     CacheDiscipline, Config, CyclicError, Evaluator, Identifiable, Request,
//! };
//!
//! #[derive(Debug, Clone, PartialEq, Eq, Hash, Identifiable)]
//! #[request_kind(zone = 1, local_id = 0)]
//! struct Fibonacci(u64);
//!
//! impl Request for Fibonacci {
//!     type Value = u64;
//!     type Error = CyclicError;
//!
//!     const CACHE_DISCIPLINE: CacheDiscipline = CacheDiscipline::EngineCached;
//!
//!     fn evaluate<C: Config>(
//!         &self,
//!         evaluator: &Evaluator<C>,
//!     ) -> Result<u64, CyclicError> {
//!         if self.0 < 2 {
//!             return Ok(self.0);
//!         }
//!
//!         Ok(evaluator.get_result(&Fibonacci(self.0 - 1))?
//!             + evaluator.get_result(&Fibonacci(self.0 - 2))?)
//!     }
//! }
//!
//! let evaluator = Evaluator::<demand::DefaultConfig>::default();
//!
//! assert_eq!(evaluator.get_result(&Fibonacci(50)), Ok(12_586_269_025));
//! ```
//!
//! ### Evaluator
//!
//! The [`Evaluator`] owns the active-evaluation stack, the generic cache and
//! the statistics counters. It is single-threaded by contract: evaluation is
//! plain call-stack recursion, and the active stack mirrors the
//! request-relevant part of the native call stack.
//!
//! ### Registry
//!
//! The [`Registry`] maps each request kind to its `(zone, local id)` pair and
//! display name. The evaluator registers every kind it evaluates, so two kinds
//! that claim the same identity fail loudly before their cached values can be
//! confused.

extern crate self as demand;

pub mod config;
pub mod diagnostics;
pub mod evaluator;
pub mod handle;
pub mod registry;
pub mod request;
pub mod statistics;
pub mod value;

pub use config::{Config, DefaultConfig, Options};
pub use demand_derive::Identifiable;
pub use diagnostics::{Diagnostic, DiagnosticSink, Severity, SourceLoc};
pub use evaluator::{CyclicError, Evaluator};
pub use handle::{Arena, Id};
pub use registry::{Identifiable, Registry, RequestKind, RequestKindId, Zone};
pub use request::{CacheDiscipline, Request};
pub use statistics::{Statistics, StatisticsSink};
pub use value::AnyValue;
