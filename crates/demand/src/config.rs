//! Configuration of the evaluator.
//!
//! The evaluator is configured on two levels:
//!
//! - [`Config`] is a compile-time configuration chosen through the
//!   evaluator's type parameter. It decides the inline storage of type-erased
//!   values, the hasher of the internal maps, and the recursion bound.
//! - [`Options`] are runtime switches that turn on debugging aids such as
//!   cycle logging and dependency recording.
//!
//! # Creating Custom Configurations
//!
//! ```rust
//! use demand::{Config, Evaluator};
//!
//! #[derive(
//!     Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
//! )]
//! struct DeepConfig;
//!
//! impl Config for DeepConfig {
//!     // Larger results stay inline in the generic cache
//!     type Storage = demand::config::smallbox_space::S8;
//!     type BuildHasher = fxhash::FxBuildHasher;
//!
//!     // Deeply nested declarations need a deeper active stack
//!     fn max_evaluation_depth() -> usize { 8192 }
//! }
//!
//! let evaluator = Evaluator::<DeepConfig>::default();
//! assert_eq!(evaluator.active_depth(), 0);
//! ```

use std::{
    fmt::Debug,
    hash::{BuildHasher, Hash},
};

use bon::Builder;
#[doc(no_inline)]
pub use smallbox::space as smallbox_space;

/// Compile-time configuration of an [`Evaluator`].
///
/// # Required Associated Types
///
/// ## `Storage`
///
/// The inline storage buffer for type-erased values and active-stack
/// entries. Values that fit are stored without a heap allocation. See the
/// spaces re-exported in [`smallbox_space`].
///
/// ## `BuildHasher`
///
/// The hasher for the generic cache and the active-stack membership set.
/// It doesn't need to be stable across runs since nothing is persisted.
///
/// [`Evaluator`]: crate::Evaluator
pub trait Config:
    Default
    + Debug
    + Clone
    + Copy
    + PartialEq
    + Eq
    + PartialOrd
    + Ord
    + Hash
    + 'static
{
    /// Inline storage used by the type-erased value holder and the
    /// active-stack entries.
    type Storage;

    /// The standard hasher builder used by the evaluator's maps.
    type BuildHasher: BuildHasher + Default + Clone + 'static;

    /// The maximum number of simultaneously active evaluations.
    ///
    /// Exceeding the bound means runaway recursion that is not a cycle
    /// (every active request is distinct). The evaluator treats it as a
    /// programming error and panics with a dump of the active stack instead
    /// of overflowing the native stack.
    ///
    /// # Default Value
    ///
    /// The default is 1024 nested evaluations.
    #[must_use]
    fn max_evaluation_depth() -> usize { 1024 }
}

/// The default configuration: four words of inline storage and `FxHash`
/// maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DefaultConfig;

impl Config for DefaultConfig {
    type Storage = smallbox::space::S4;

    type BuildHasher = fxhash::FxBuildHasher;
}

/// Runtime switches of an [`Evaluator`](crate::Evaluator).
///
/// ```rust
/// use demand::Options;
///
/// let options = Options::builder().debug_cycles(true).build();
///
/// assert!(options.debug_cycles);
/// assert!(!options.record_dependencies);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Builder,
)]
pub struct Options {
    /// Logs the full request path of every detected cycle at `warn` level.
    ///
    /// Without it, cycles are only logged at `debug` level.
    #[builder(default)]
    pub debug_cycles: bool,

    /// Records the request dependency graph for later inspection through
    /// [`Evaluator::dependency_edges`] and
    /// [`Evaluator::write_dependency_graphviz`].
    ///
    /// [`Evaluator::dependency_edges`]: crate::Evaluator::dependency_edges
    /// [`Evaluator::write_dependency_graphviz`]: crate::Evaluator::write_dependency_graphviz
    #[builder(default)]
    pub record_dependencies: bool,
}
