use modelkit::prelude::*;
use modelkit_core::NavigationEnd;

fn id() -> MemberDescriptor {
    MemberDescriptor::property("Id", MemberType::scalar(ScalarKind::I32))
}

fn reference(name: &str, target: &str) -> MemberDescriptor {
    MemberDescriptor::property(name, MemberType::reference(target))
}

fn couple(wife_members: Vec<MemberDescriptor>) -> TypeCatalog {
    let mut wife = TypeDescriptor::new("Wife").with_member(id()).with_member(reference("Husband", "Husband"));
    for member in wife_members {
        wife = wife.with_member(member);
    }
    TypeCatalog::new()
        .with(TypeDescriptor::new("Husband").with_member(id()).with_member(reference("Wife", "Wife")))
        .with(wife)
}

fn ship(captain_marks: Vec<AttributeData>, ship_marks: Vec<AttributeData>) -> TypeCatalog {
    let mut captain = reference("Captain", "Captain");
    for mark in captain_marks {
        captain = captain.with_attribute(mark);
    }
    let mut ship = reference("Ship", "Ship");
    for mark in ship_marks {
        ship = ship.with_attribute(mark);
    }
    TypeCatalog::new()
        .with(TypeDescriptor::new("Ship").with_member(id()).with_member(captain))
        .with(TypeDescriptor::new("Captain").with_member(id()).with_member(ship))
}

#[test]
fn one_to_one_without_hints_is_ambiguous() {
    let err = build_model(Arc::new(couple(Vec::new())), &["Husband"], ConventionConfig::default())
        .unwrap_err();
    match err {
        Error::AmbiguousOneToOne {
            dependent_path,
            principal_path,
        } => {
            let mut paths = vec![dependent_path, principal_path];
            paths.sort();
            assert_eq!(paths, vec!["Husband.Wife", "Wife.Husband"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn foreign_key_property_picks_the_dependent() {
    let husband_id = MemberDescriptor::property("HusbandId", MemberType::scalar(ScalarKind::I32));
    let model = build_model(
        Arc::new(couple(vec![husband_id])),
        &["Husband"],
        ConventionConfig::default(),
    )
    .unwrap();
    let snapshot = model.snapshot();
    assert!(snapshot.entity_type("Husband").unwrap().foreign_keys.is_empty());
    let wife = snapshot.entity_type("Wife").unwrap();
    assert_eq!(wife.foreign_keys.len(), 1);
    let fk = &wife.foreign_keys[0];
    assert_eq!(fk.principal, "Husband");
    assert_eq!(fk.properties, vec!["HusbandId"]);
    assert_eq!(fk.dependent_to_principal.as_deref(), Some("Husband"));
    assert!(fk.unique);
}

#[test]
fn required_navigation_on_dependent_resolves_one_to_one() {
    let catalog = ship(vec![AttributeData::required()], Vec::new());
    let model = build_model(Arc::new(catalog), &["Ship"], ConventionConfig::default()).unwrap();
    assert!(model.diagnostics().is_empty());

    let m = model.model();
    let (_, fk) = m.foreign_keys().next().unwrap();
    assert_eq!(m.entity_type_name(fk.dependent()), "Ship");
    assert_eq!(m.entity_type_name(fk.principal()), "Captain");
    assert!(fk.is_required());
    assert_eq!(fk.is_required_source(), Some(ConfigurationSource::DataAnnotation));
    assert_eq!(fk.navigation(NavigationEnd::DependentToPrincipal).unwrap().name, "Captain");
    assert_eq!(fk.properties().len(), 1);
}

#[test]
fn required_on_both_navigations_is_reported_once() {
    let catalog = ship(vec![AttributeData::required()], vec![AttributeData::required()]);
    let mut builder = ModelBuilder::new(Arc::new(catalog));
    builder.entity("Ship", ConfigurationSource::Explicit).unwrap();

    let diagnostics = builder.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics.count(DiagnosticKind::RequiredAttributeOnBothNavigations), 1);
    assert!(diagnostics.entries()[0].message.contains("Captain.Ship"));
    assert!(diagnostics.entries()[0].message.contains("Ship.Captain"));

    let err = builder.finalize().unwrap_err();
    assert!(matches!(err, Error::AmbiguousOneToOne { .. }));
}

#[test]
fn non_nullable_markers_make_navigation_required() {
    let catalog = TypeCatalog::new()
        .with(
            TypeDescriptor::new("Ship")
                .with_attribute(AttributeData::nullable_context(1))
                .with_member(id())
                .with_member(reference("Captain", "Captain")),
        )
        .with(
            TypeDescriptor::new("Captain")
                .with_member(id())
                .with_member(reference("Ship", "Ship").with_attribute(AttributeData::nullable([2u8]))),
        );
    let model = build_model(Arc::new(catalog), &["Ship"], ConventionConfig::default()).unwrap();
    let m = model.model();
    let (_, fk) = m.foreign_keys().next().unwrap();
    assert_eq!(m.entity_type_name(fk.dependent()), "Ship");
    assert!(fk.is_required());
    assert_eq!(fk.is_required_source(), Some(ConfigurationSource::Convention));
}

#[test]
fn collection_pairs_are_reported_as_many_to_many() {
    let catalog = TypeCatalog::new()
        .with(
            TypeDescriptor::new("Student")
                .with_member(id())
                .with_member(MemberDescriptor::property("Courses", MemberType::collection("Course"))),
        )
        .with(
            TypeDescriptor::new("Course")
                .with_member(id())
                .with_member(MemberDescriptor::property("Students", MemberType::collection("Student"))),
        );
    let config = ConventionConfig::default().remove_unreachable_types(false);
    let model = build_model(Arc::new(catalog), &["Student"], config).unwrap();
    assert_eq!(model.diagnostics().count(DiagnosticKind::ManyToManyNotSupported), 1);
    assert!(model.model().foreign_key_ids().is_empty());
}

fn addresses() -> TypeCatalog {
    TypeCatalog::new()
        .with(TypeDescriptor::new("Customer").with_member(id()).with_member(reference("Home", "Address")))
        .with(TypeDescriptor::new("Supplier").with_member(id()).with_member(reference("Office", "Address")))
        .with(
            TypeDescriptor::new("Address")
                .with_attribute(AttributeData::owned())
                .with_member(MemberDescriptor::property("Street", MemberType::scalar(ScalarKind::String))),
        )
}

#[test]
fn owned_reference_becomes_ownership() {
    let model = build_model(Arc::new(addresses()), &["Customer"], ConventionConfig::default()).unwrap();
    let m = model.model();
    let address = m.find_entity_type("Address").unwrap();
    let ownership = m.foreign_key(m.find_ownership(address).unwrap()).unwrap();
    assert_eq!(m.entity_type_name(ownership.principal()), "Customer");
    assert!(ownership.is_unique());
    assert!(ownership.is_required());
    assert_eq!(
        ownership.navigation(NavigationEnd::PrincipalToDependent).unwrap().name,
        "Home"
    );
    assert!(m.find_primary_key(address).is_some());
}

#[test]
fn shared_owned_type_splits_into_weak_types() {
    let model = build_model(
        Arc::new(addresses()),
        &["Customer", "Supplier"],
        ConventionConfig::default(),
    )
    .unwrap();
    let m = model.model();
    assert!(m.find_entity_type("Address").is_none());
    let weak = m.weak_entity_types("Address");
    assert_eq!(weak.len(), 2);
    let mut owners: Vec<&str> = weak
        .iter()
        .map(|w| {
            let ownership = m.foreign_key(m.find_ownership(*w).unwrap()).unwrap();
            m.entity_type_name(ownership.principal())
        })
        .collect();
    owners.sort_unstable();
    assert_eq!(owners, vec!["Customer", "Supplier"]);
}

#[test]
fn ignoring_inherited_member_fails_at_build() {
    let catalog = TypeCatalog::new()
        .with(
            TypeDescriptor::new("Animal")
                .with_member(id())
                .with_member(MemberDescriptor::property("Name", MemberType::scalar(ScalarKind::String))),
        )
        .with(TypeDescriptor::new("Cat").with_base("Animal"));
    let mut builder = ModelBuilder::new(Arc::new(catalog));
    builder.entity("Animal", ConfigurationSource::Explicit).unwrap();
    let cat = builder.entity("Cat", ConfigurationSource::Explicit).unwrap().unwrap();
    builder.ignore_member(cat, "Name", ConfigurationSource::Explicit).unwrap();

    match builder.finalize().unwrap_err() {
        Error::InheritedMemberIgnored {
            member,
            entity_type,
            declaring_type,
        } => {
            assert_eq!(member, "Name");
            assert_eq!(entity_type, "Cat");
            assert_eq!(declaring_type, "Animal");
        }
        other => panic!("unexpected error: {other}"),
    }
}
