//! Shared declaration graph and type-checker requests for the `demand`
//! integration tests.
//!
//! The graph is a module of classes. Each class may name a superclass and
//! may be final. The requests resolve superclasses, walk ancestries and
//! check inheritance, covering every caching discipline along the way.

#![allow(missing_docs)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_const_for_fn)]

use std::{
    fmt,
    hash::{Hash, Hasher},
    rc::Rc,
    sync::Arc,
};

use demand::{
    Arena, CacheDiscipline, Config, CyclicError, DefaultConfig, Diagnostic,
    DiagnosticSink, Evaluator, Id, Identifiable, Options, Registry, Request,
    RequestKind, SourceLoc, Zone, diagnostics::DiagnosticCollector,
};
use parking_lot::RwLock;

pub const SEMA_ZONE: u8 = Zone::TYPE_CHECKER.get();
pub const NAME_LOOKUP_ZONE: u8 = 11;

// ============================================================================
// Declarations
// ============================================================================

/// A class declaration with the slots its self-cached requests write to.
#[derive(Debug)]
pub struct ClassDecl {
    pub name: String,
    pub superclass_name: Option<String>,
    pub is_final: bool,
    pub location: SourceLoc,
    superclass: RwLock<Option<Option<Id<ClassDecl>>>>,
    finality: RwLock<Option<bool>>,
}

impl ClassDecl {
    /// Returns the superclass resolved so far, without evaluating anything.
    pub fn resolved_superclass(&self) -> Option<Option<Id<ClassDecl>>> {
        *self.superclass.read()
    }
}

#[derive(Debug, Default)]
pub struct Module {
    classes: Arena<ClassDecl>,
}

impl Module {
    pub fn new() -> Self { Self::default() }

    /// Declares `class Name: Superclass` at byte offset `offset`.
    pub fn declare(
        &mut self,
        name: &str,
        superclass: Option<&str>,
        offset: u32,
    ) -> Id<ClassDecl> {
        self.declare_class(name, superclass, false, offset)
    }

    /// Declares `final class Name: Superclass` at byte offset `offset`.
    pub fn declare_final(
        &mut self,
        name: &str,
        superclass: Option<&str>,
        offset: u32,
    ) -> Id<ClassDecl> {
        self.declare_class(name, superclass, true, offset)
    }

    fn declare_class(
        &mut self,
        name: &str,
        superclass: Option<&str>,
        is_final: bool,
        offset: u32,
    ) -> Id<ClassDecl> {
        self.classes.alloc(ClassDecl {
            name: name.to_owned(),
            superclass_name: superclass.map(str::to_owned),
            is_final,
            location: SourceLoc::new(offset),
            superclass: RwLock::new(None),
            finality: RwLock::new(None),
        })
    }

    pub fn class(&self, id: Id<ClassDecl>) -> &ClassDecl { &self.classes[id] }

    pub fn classes(&self) -> impl Iterator<Item = (Id<ClassDecl>, &ClassDecl)> {
        self.classes.iter()
    }

    pub fn name_of(&self, id: Id<ClassDecl>) -> &str { &self.class(id).name }

    /// Freezes the module so requests can key on it.
    pub fn finish(self) -> ModuleRef { ModuleRef(Arc::new(self)) }
}

/// A shared module, compared by identity.
#[derive(Clone)]
pub struct ModuleRef(pub Arc<Module>);

impl ModuleRef {
    pub fn class(&self, id: Id<ClassDecl>) -> &ClassDecl { self.0.class(id) }

    pub fn name_of(&self, id: Id<ClassDecl>) -> &str { self.0.name_of(id) }
}

impl PartialEq for ModuleRef {
    fn eq(&self, other: &Self) -> bool { Arc::ptr_eq(&self.0, &other.0) }
}

impl Eq for ModuleRef {}

impl Hash for ModuleRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).hash(state);
    }
}

impl fmt::Debug for ModuleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "module@{:p}", Arc::as_ptr(&self.0))
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SemaError {
    #[error(transparent)]
    Cyclic(#[from] CyclicError),

    #[error("cannot find class '{0}' in scope")]
    UnknownClass(String),
}

// ============================================================================
// Name Lookup
// ============================================================================

/// Finds a class by name. Cheap, so never cached.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Identifiable)]
#[request_kind(zone = NAME_LOOKUP_ZONE, local_id = 0)]
pub struct LookupClass {
    pub module: ModuleRef,
    pub name: String,
}

impl Request for LookupClass {
    type Value = Option<Id<ClassDecl>>;
    type Error = SemaError;

    const CACHE_DISCIPLINE: CacheDiscipline = CacheDiscipline::NotCached;

    fn evaluate<C: Config>(
        &self,
        _: &Evaluator<C>,
    ) -> Result<Option<Id<ClassDecl>>, SemaError> {
        Ok(self
            .module
            .0
            .classes()
            .find(|(_, class)| class.name == self.name)
            .map(|(id, _)| id))
    }
}

// ============================================================================
// Self-Cached Requests
// ============================================================================

/// Resolves the superclass of a class. The result is stored on the class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Identifiable)]
#[request_kind(zone = SEMA_ZONE, local_id = 0)]
pub struct SuperclassRequest {
    pub module: ModuleRef,
    pub class: Id<ClassDecl>,
}

impl Request for SuperclassRequest {
    type Value = Option<Id<ClassDecl>>;
    type Error = SemaError;

    const CACHE_DISCIPLINE: CacheDiscipline = CacheDiscipline::SelfCached;

    fn evaluate<C: Config>(
        &self,
        evaluator: &Evaluator<C>,
    ) -> Result<Option<Id<ClassDecl>>, SemaError> {
        let Some(name) = &self.module.class(self.class).superclass_name else {
            return Ok(None);
        };

        let found = evaluator.get_result(&LookupClass {
            module: self.module.clone(),
            name: name.clone(),
        })?;

        found.map(Some).ok_or_else(|| SemaError::UnknownClass(name.clone()))
    }

    fn cache_read(&self) -> Option<Option<Id<ClassDecl>>> {
        *self.module.class(self.class).superclass.read()
    }

    fn cache_write(&self, value: Option<Id<ClassDecl>>) {
        *self.module.class(self.class).superclass.write() = Some(value);
    }

    fn nearest_source_location(&self) -> SourceLoc {
        self.module.class(self.class).location
    }
}

/// Whether a class is final. The result is stored on the class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Identifiable)]
#[request_kind(zone = SEMA_ZONE, local_id = 1, name = "IsFinal")]
pub struct IsFinalRequest {
    pub module: ModuleRef,
    pub class: Id<ClassDecl>,
}

impl Request for IsFinalRequest {
    type Value = bool;
    type Error = SemaError;

    const CACHE_DISCIPLINE: CacheDiscipline = CacheDiscipline::SelfCached;

    fn evaluate<C: Config>(
        &self,
        _: &Evaluator<C>,
    ) -> Result<bool, SemaError> {
        Ok(self.module.class(self.class).is_final)
    }

    fn cache_read(&self) -> Option<bool> {
        *self.module.class(self.class).finality.read()
    }

    fn cache_write(&self, value: bool) {
        *self.module.class(self.class).finality.write() = Some(value);
    }
}

// ============================================================================
// Engine-Cached Requests
// ============================================================================

/// The superclasses of a class, nearest first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Identifiable)]
#[request_kind(zone = SEMA_ZONE, local_id = 2)]
pub struct AncestryRequest {
    pub module: ModuleRef,
    pub class: Id<ClassDecl>,
}

impl Request for AncestryRequest {
    type Value = Vec<Id<ClassDecl>>;
    type Error = SemaError;

    const CACHE_DISCIPLINE: CacheDiscipline = CacheDiscipline::EngineCached;

    fn evaluate<C: Config>(
        &self,
        evaluator: &Evaluator<C>,
    ) -> Result<Vec<Id<ClassDecl>>, SemaError> {
        let Some(parent) = evaluator.get_result(&SuperclassRequest {
            module: self.module.clone(),
            class: self.class,
        })?
        else {
            return Ok(Vec::new());
        };

        let mut ancestry = vec![parent];
        ancestry.extend(evaluator.get_result(&Self {
            module: self.module.clone(),
            class: parent,
        })?);

        Ok(ancestry)
    }

    fn diagnose_cycle(&self, sink: &dyn DiagnosticSink, location: SourceLoc) {
        let name = self.module.name_of(self.class);

        sink.emit(Diagnostic::error(
            location,
            format!("'{name}' inherits from itself"),
        ));
    }

    fn note_cycle_step(&self, sink: &dyn DiagnosticSink, location: SourceLoc) {
        let name = self.module.name_of(self.class);

        sink.emit(Diagnostic::note(
            location,
            format!("class '{name}' declared here"),
        ));
    }

    fn nearest_source_location(&self) -> SourceLoc {
        self.module.class(self.class).location
    }
}

/// The inheritance problems of one class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Identifiable)]
#[request_kind(zone = SEMA_ZONE, local_id = 3)]
pub struct InheritanceCheck {
    pub module: ModuleRef,
    pub class: Id<ClassDecl>,
}

impl Request for InheritanceCheck {
    type Value = Vec<String>;
    type Error = SemaError;

    const CACHE_DISCIPLINE: CacheDiscipline = CacheDiscipline::EngineCached;

    fn evaluate<C: Config>(
        &self,
        evaluator: &Evaluator<C>,
    ) -> Result<Vec<String>, SemaError> {
        let mut problems = Vec::new();

        // a cyclic hierarchy fails here, before anything else is reported
        evaluator.get_result(&AncestryRequest {
            module: self.module.clone(),
            class: self.class,
        })?;

        let parent = evaluator.get_result(&SuperclassRequest {
            module: self.module.clone(),
            class: self.class,
        })?;

        if let Some(parent) = parent
            && evaluator.get_result(&IsFinalRequest {
                module: self.module.clone(),
                class: parent,
            })?
        {
            problems.push(format!(
                "'{}' cannot inherit from final class '{}'",
                self.module.name_of(self.class),
                self.module.name_of(parent),
            ));
        }

        Ok(problems)
    }
}

// ============================================================================
// Whole-Module Check
// ============================================================================

/// Checks every class of a module, reporting what it can and skipping
/// classes whose hierarchy is cyclic (those were diagnosed already).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Identifiable)]
#[request_kind(zone = SEMA_ZONE, local_id = 4)]
pub struct TypeCheckModule {
    pub module: ModuleRef,
}

impl Request for TypeCheckModule {
    type Value = Vec<String>;
    type Error = SemaError;

    const CACHE_DISCIPLINE: CacheDiscipline = CacheDiscipline::NotCached;

    fn evaluate<C: Config>(
        &self,
        evaluator: &Evaluator<C>,
    ) -> Result<Vec<String>, SemaError> {
        let mut problems = Vec::new();

        for (class, decl) in self.module.0.classes() {
            match evaluator.get_result(&InheritanceCheck {
                module: self.module.clone(),
                class,
            }) {
                Ok(found) => problems.extend(found),

                Err(SemaError::Cyclic(error)) => {
                    tracing::debug!(
                        class = %decl.name,
                        %error,
                        "skipping class with cyclic inheritance"
                    );
                }

                Err(error @ SemaError::UnknownClass(_)) => {
                    problems.push(error.to_string());
                }
            }
        }

        Ok(problems)
    }
}

/// The registry table of every request kind above.
pub const SEMA_REQUESTS: &[RequestKind] = demand::request_table![
    LookupClass,
    SuperclassRequest,
    IsFinalRequest,
    AncestryRequest,
    InheritanceCheck,
    TypeCheckModule,
];

/// Creates an evaluator preloaded with [`SEMA_REQUESTS`] that collects its
/// diagnostics.
pub fn create_evaluator(
    options: Options,
) -> (Evaluator<DefaultConfig>, Rc<DiagnosticCollector>) {
    let diagnostics = Rc::new(DiagnosticCollector::new());
    let evaluator = Evaluator::with_options(
        Registry::from_tables([SEMA_REQUESTS]),
        diagnostics.clone(),
        options,
    );

    (evaluator, diagnostics)
}

/// Renders diagnostics as `severity: message @offset` lines.
pub fn render(diagnostics: &[Diagnostic]) -> Vec<String> {
    diagnostics.iter().map(ToString::to_string).collect()
}
