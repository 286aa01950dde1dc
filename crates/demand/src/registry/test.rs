use super::{Registry, RequestKind, RequestKindId, Zone};
use crate::Identifiable;

#[derive(Identifiable)]
#[request_kind(zone = 10, local_id = 0)]
struct SuperclassType;

#[derive(Identifiable)]
#[request_kind(zone = 10, local_id = 1, name = "IsFinal")]
struct IsFinal;

#[derive(Identifiable)]
#[request_kind(zone = 11, local_id = 0)]
struct LookupName;

const TYPE_CHECKER: &[RequestKind] =
    crate::request_table![SuperclassType, IsFinal];

const NAME_LOOKUP: &[RequestKind] = crate::request_table![LookupName];

#[test]
fn derived_identity() {
    let kind = SuperclassType::REQUEST_KIND;

    assert_eq!(kind.id(), RequestKindId::new(Zone::TYPE_CHECKER, 0));
    assert_eq!(kind.name(), "SuperclassType");
    assert_eq!(IsFinal::REQUEST_KIND.name(), "IsFinal");
}

#[test]
fn index_is_compact_and_ordered() {
    let first = SuperclassType::REQUEST_KIND.id();
    let second = IsFinal::REQUEST_KIND.id();
    let other_zone = LookupName::REQUEST_KIND.id();

    assert_eq!(first.index(), 10 << 8);
    assert_eq!(second.index(), (10 << 8) | 1);
    assert!(first.index() < second.index());
    assert!(second.index() < other_zone.index());
    assert!(second < other_zone);
}

#[test]
fn load_from_tables() {
    let registry = Registry::from_tables([TYPE_CHECKER, NAME_LOOKUP]);

    assert_eq!(registry.len(), 3);
    assert_eq!(
        registry.display_name(LookupName::REQUEST_KIND.id()),
        Some("LookupName")
    );
    assert_eq!(
        registry.iter().map(RequestKind::name).collect::<Vec<_>>(),
        ["SuperclassType", "IsFinal", "LookupName"]
    );
}

#[test]
fn register_is_idempotent() {
    let mut registry = Registry::new();

    let first = registry.register(IsFinal::REQUEST_KIND);
    let second = registry.register(IsFinal::REQUEST_KIND);

    assert_eq!(first, second);
    assert_eq!(registry.len(), 1);
    assert!(registry.is_registered(first));
}

#[test]
fn unknown_identity_has_no_name() {
    let registry = Registry::from_tables([NAME_LOOKUP]);

    assert!(registry.get(IsFinal::REQUEST_KIND.id()).is_none());
    assert_eq!(registry.display_name(IsFinal::REQUEST_KIND.id()), None);
}

#[test]
#[should_panic(expected = "both claim the identity 10:1")]
fn conflicting_registration_is_fatal() {
    struct IsDynamic;

    let mut registry = Registry::from_tables([TYPE_CHECKER]);

    registry.register(RequestKind::new::<IsDynamic>(
        Zone::new(10),
        1,
        "IsDynamic",
    ));
}

mod parser {
    #[derive(crate::Identifiable)]
    #[request_kind(zone = 12, local_id = 0)]
    pub struct Lookup;
}

mod resolver {
    #[derive(crate::Identifiable)]
    #[request_kind(zone = 12, local_id = 0)]
    pub struct Lookup;
}

#[test]
fn entries_of_distinct_types_differ() {
    assert_eq!(parser::Lookup::REQUEST_KIND.name(), "Lookup");
    assert_eq!(resolver::Lookup::REQUEST_KIND.name(), "Lookup");
    assert_ne!(parser::Lookup::REQUEST_KIND, resolver::Lookup::REQUEST_KIND);
    assert_eq!(
        parser::Lookup::REQUEST_KIND.request_type_name(),
        std::any::type_name::<parser::Lookup>()
    );
}

#[test]
#[should_panic(expected = "both claim the identity 12:0")]
fn same_name_in_another_module_is_a_conflict() {
    let mut registry = Registry::new();

    registry.register(parser::Lookup::REQUEST_KIND);
    registry.register(resolver::Lookup::REQUEST_KIND);
}
