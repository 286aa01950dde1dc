//! The diagnostics contract between the evaluator and the host compiler.
//!
//! The evaluator never formats cycle reports itself. When it detects a cycle
//! it calls [`Request::diagnose_cycle`] on the reentering request and
//! [`Request::note_cycle_step`] on every other participant, and those hooks
//! emit [`Diagnostic`]s into a [`DiagnosticSink`] owned by the host.
//!
//! [`Request::diagnose_cycle`]: crate::Request::diagnose_cycle
//! [`Request::note_cycle_step`]: crate::Request::note_cycle_step

use std::{cell::RefCell, fmt, num::NonZeroU32};

use enum_as_inner::EnumAsInner;

/// A best-effort source location: a byte offset into the host's source
/// buffer, or [`SourceLoc::INVALID`] when nothing better is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SourceLoc(Option<NonZeroU32>);

impl SourceLoc {
    /// The location of nothing in particular.
    pub const INVALID: Self = Self(None);

    /// Creates a location from a byte offset.
    ///
    /// The offset `u32::MAX` is reserved and yields [`SourceLoc::INVALID`].
    #[must_use]
    pub const fn new(offset: u32) -> Self {
        match offset.checked_add(1) {
            Some(raw) => Self(NonZeroU32::new(raw)),
            None => Self::INVALID,
        }
    }

    /// Returns the byte offset, if the location is valid.
    #[must_use]
    pub const fn offset(self) -> Option<u32> {
        match self.0 {
            Some(raw) => Some(raw.get() - 1),
            None => None,
        }
    }

    /// Returns whether the location points somewhere.
    #[must_use]
    pub const fn is_valid(self) -> bool { self.0.is_some() }

    /// Returns `self` if valid, `fallback` otherwise.
    #[must_use]
    pub const fn or(self, fallback: Self) -> Self {
        if self.is_valid() { self } else { fallback }
    }
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.offset() {
            Some(offset) => write!(f, "@{offset}"),
            None => f.write_str("<unknown location>"),
        }
    }
}

/// The severity of a [`Diagnostic`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumAsInner,
)]
pub enum Severity {
    /// A hard error.
    Error,

    /// A warning.
    Warning,

    /// A note attached to the preceding error or warning.
    Note,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Note => "note",
        })
    }
}

/// A message pointing at a source location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Diagnostic {
    /// How serious the diagnostic is.
    pub severity: Severity,

    /// Where the diagnostic points.
    pub location: SourceLoc,

    /// The rendered message.
    pub message: String,
}

impl Diagnostic {
    /// Creates an error.
    pub fn error(location: SourceLoc, message: impl Into<String>) -> Self {
        Self { severity: Severity::Error, location, message: message.into() }
    }

    /// Creates a warning.
    pub fn warning(location: SourceLoc, message: impl Into<String>) -> Self {
        Self { severity: Severity::Warning, location, message: message.into() }
    }

    /// Creates a note.
    pub fn note(location: SourceLoc, message: impl Into<String>) -> Self {
        Self { severity: Severity::Note, location, message: message.into() }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} {}", self.severity, self.message, self.location)
    }
}

/// Receives the diagnostics emitted by cycle hooks.
pub trait DiagnosticSink {
    /// Emits one diagnostic.
    fn emit(&self, diagnostic: Diagnostic);
}

/// A sink that keeps every diagnostic for later inspection.
#[derive(Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: RefCell<Vec<Diagnostic>>,
}

impl DiagnosticCollector {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Returns a copy of the diagnostics emitted so far.
    #[must_use]
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.borrow().clone()
    }

    /// Removes and returns the diagnostics emitted so far.
    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.diagnostics.borrow_mut())
    }

    /// Returns the number of errors emitted so far.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.diagnostics
            .borrow()
            .iter()
            .filter(|diagnostic| diagnostic.severity.is_error())
            .count()
    }
}

impl DiagnosticSink for DiagnosticCollector {
    fn emit(&self, diagnostic: Diagnostic) {
        self.diagnostics.borrow_mut().push(diagnostic);
    }
}

/// A sink that forwards every diagnostic to [`tracing`].
///
/// This is the sink of [`Evaluator::default`](crate::Evaluator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TracingDiagnostics;

impl DiagnosticSink for TracingDiagnostics {
    fn emit(&self, diagnostic: Diagnostic) {
        let Diagnostic { severity, location, message } = diagnostic;

        match severity {
            Severity::Error => tracing::error!(%location, "{message}"),
            Severity::Warning => tracing::warn!(%location, "{message}"),
            Severity::Note => tracing::info!(%location, "{message}"),
        }
    }
}
