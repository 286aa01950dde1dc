//! Request failures other than cycles.

use demand::Options;
use demand_integration_test::{
    AncestryRequest, InheritanceCheck, LookupClass, Module, SemaError,
    SuperclassRequest, create_evaluator,
};

#[test]
fn unknown_superclass_propagates() {
    let mut module = Module::new();
    module.declare("Base", Some("Missing"), 0);
    let derived = module.declare("Derived", Some("Base"), 10);
    let module = module.finish();

    let (evaluator, diagnostics) = create_evaluator(Options::default());

    assert_eq!(
        evaluator.get_result(&AncestryRequest { module, class: derived }),
        Err(SemaError::UnknownClass("Missing".to_owned()))
    );

    // failures produce no cycle diagnostics
    assert!(diagnostics.diagnostics().is_empty());
    assert_eq!(evaluator.active_depth(), 0);
}

#[test]
fn failures_are_not_cached() {
    let mut module = Module::new();
    let orphan = module.declare("Orphan", Some("Missing"), 0);
    let module = module.finish();

    let (evaluator, _) = create_evaluator(Options::default());

    let superclass =
        SuperclassRequest { module: module.clone(), class: orphan };
    let check = InheritanceCheck { module: module.clone(), class: orphan };

    for _ in 0..2 {
        assert!(matches!(
            evaluator.get_result(&superclass),
            Err(SemaError::UnknownClass(_))
        ));
        assert!(evaluator.get_result(&check).is_err());
    }

    // every call looked the name up again
    assert_eq!(evaluator.evaluation_count::<LookupClass>(), 4);
    assert_eq!(evaluator.evaluation_count::<SuperclassRequest>(), 0);
    assert_eq!(evaluator.evaluation_count::<InheritanceCheck>(), 0);
    assert_eq!(module.class(orphan).resolved_superclass(), None);
    assert!(!evaluator.is_cached_in_engine(&check));
}

#[test]
fn error_messages() {
    assert_eq!(
        SemaError::UnknownClass("Widget".to_owned()).to_string(),
        "cannot find class 'Widget' in scope"
    );
}
