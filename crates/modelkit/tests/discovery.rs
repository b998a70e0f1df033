use modelkit::prelude::*;
use modelkit_core::ValueGenerated;
use proptest::prelude::*;

fn scalar(name: &str, scalar: ScalarKind) -> MemberDescriptor {
    MemberDescriptor::property(name, MemberType::scalar(scalar))
}

fn blogging() -> TypeCatalog {
    TypeCatalog::new()
        .with(
            TypeDescriptor::new("Blog")
                .with_member(scalar("Id", ScalarKind::I32))
                .with_member(scalar("Name", ScalarKind::String))
                .with_member(MemberDescriptor::property("Posts", MemberType::collection("Post"))),
        )
        .with(
            TypeDescriptor::new("Post")
                .with_member(scalar("Id", ScalarKind::I32))
                .with_member(scalar("Title", ScalarKind::String))
                .with_member(scalar("BlogId", ScalarKind::I32))
                .with_member(MemberDescriptor::property("Blog", MemberType::reference("Blog"))),
        )
}

fn animals() -> TypeCatalog {
    TypeCatalog::new()
        .with(
            TypeDescriptor::new("Animal")
                .with_member(scalar("Id", ScalarKind::I32))
                .with_member(scalar("Name", ScalarKind::String)),
        )
        .with(
            TypeDescriptor::new("Dog")
                .with_base("Animal")
                .with_member(scalar("Breed", ScalarKind::String)),
        )
        .with(
            TypeDescriptor::new("Puppy")
                .with_base("Dog")
                .with_member(scalar("Toy", ScalarKind::String)),
        )
        .with(
            TypeDescriptor::new("Cat")
                .with_base("Animal")
                .with_member(scalar("Lives", ScalarKind::I16)),
        )
}

fn snapshot(catalog: &Arc<TypeCatalog>, roots: &[&str]) -> ModelSnapshot {
    build_model(Arc::clone(catalog), roots, ConventionConfig::default())
        .unwrap()
        .snapshot()
}

#[test]
fn blog_and_posts_are_discovered_from_one_root() {
    let model = build_model(Arc::new(blogging()), &["Blog"], ConventionConfig::default()).unwrap();
    let snapshot = model.snapshot();

    let blog = snapshot.entity_type("Blog").unwrap();
    assert_eq!(blog.primary_key, vec!["Id"]);
    assert!(blog.foreign_keys.is_empty());

    let post = snapshot.entity_type("Post").unwrap();
    assert_eq!(post.primary_key, vec!["Id"]);
    assert_eq!(post.foreign_keys.len(), 1);
    let fk = &post.foreign_keys[0];
    assert_eq!(fk.principal, "Blog");
    assert_eq!(fk.properties, vec!["BlogId"]);
    assert_eq!(fk.dependent_to_principal.as_deref(), Some("Blog"));
    assert_eq!(fk.principal_to_dependent.as_deref(), Some("Posts"));
    assert!(!fk.unique);
    assert!(fk.required);

    let blog_id = post.properties.iter().find(|p| p.name == "BlogId").unwrap();
    assert!(!blog_id.shadow);
    assert_eq!(blog_id.value_generated, ValueGenerated::Never);
    let id = post.properties.iter().find(|p| p.name == "Id").unwrap();
    assert_eq!(id.value_generated, ValueGenerated::OnAdd);
}

#[test]
fn either_root_gives_the_same_model() {
    let catalog = Arc::new(blogging());
    assert_eq!(snapshot(&catalog, &["Blog"]), snapshot(&catalog, &["Post"]));
}

#[test]
fn hierarchy_is_independent_of_root_order() {
    let catalog = Arc::new(animals());
    let forward = snapshot(&catalog, &["Animal", "Dog"]);
    let backward = snapshot(&catalog, &["Dog", "Animal"]);
    assert_eq!(forward, backward);

    let dog = forward.entity_type("Dog").unwrap();
    assert_eq!(dog.base_type.as_deref(), Some("Animal"));
    let names: Vec<&str> = dog.properties.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Breed"]);
    assert!(dog.primary_key.is_empty());
    assert_eq!(forward.entity_type("Animal").unwrap().primary_key, vec!["Id"]);
}

#[test]
fn unknown_root_is_rejected() {
    let err = build_model(Arc::new(animals()), &["Animal", "Horse"], ConventionConfig::default())
        .unwrap_err();
    assert!(matches!(err, Error::UnknownEntityType { name } if name == "Horse"));
}

#[test]
fn key_annotation_beats_conventional_key() {
    let catalog = TypeCatalog::new().with(
        TypeDescriptor::new("Invoice")
            .with_member(scalar("Id", ScalarKind::I32))
            .with_member(scalar("Number", ScalarKind::String).with_attribute(AttributeData::key()))
            .with_member(scalar("Total", ScalarKind::Decimal)),
    );
    let config = ConventionConfig::default().string_key_max_length(Some(450));
    let model = build_model(Arc::new(catalog), &["Invoice"], config).unwrap();
    let snapshot = model.snapshot();
    let invoice = snapshot.entity_type("Invoice").unwrap();
    assert_eq!(invoice.primary_key, vec!["Number"]);

    let property = |name: &str| invoice.properties.iter().find(|p| p.name == name).unwrap();
    assert_eq!(property("Id").value_generated, ValueGenerated::Never);
    assert!(!property("Number").nullable);
    assert_eq!(
        property("Number").type_mapping.as_ref().unwrap().store_type,
        "varchar(450)"
    );
    assert_eq!(
        property("Total").type_mapping.as_ref().unwrap().store_type,
        "decimal(18,2)"
    );
}

#[test]
fn unreachable_types_are_removed_when_the_model_is_built() {
    let catalog = TypeCatalog::new()
        .with(
            TypeDescriptor::new("Order")
                .with_member(scalar("Id", ScalarKind::I32))
                .with_member(MemberDescriptor::property("Customer", MemberType::reference("Customer"))),
        )
        .with(TypeDescriptor::new("Customer").with_member(scalar("Id", ScalarKind::I32)));
    let mut builder = ModelBuilder::new(Arc::new(catalog));
    let order = builder.entity("Order", ConfigurationSource::Explicit).unwrap().unwrap();
    assert!(builder.model().find_entity_type("Customer").is_some());

    assert!(builder.ignore_member(order, "Customer", ConfigurationSource::Explicit).unwrap());
    let model = builder.finalize().unwrap().into_model();
    assert!(model.find_entity_type("Order").is_some());
    assert!(model.find_entity_type("Customer").is_none());
    assert!(model.foreign_key_ids().is_empty());
}

#[test]
fn unreachable_types_can_be_kept() {
    let catalog = TypeCatalog::new()
        .with(
            TypeDescriptor::new("Order")
                .with_member(scalar("Id", ScalarKind::I32))
                .with_member(MemberDescriptor::property("Customer", MemberType::reference("Customer"))),
        )
        .with(TypeDescriptor::new("Customer").with_member(scalar("Id", ScalarKind::I32)));
    let config = ConventionConfig::default().remove_unreachable_types(false);
    let mut builder = ModelBuilder::with_config(Arc::new(catalog), config);
    let order = builder.entity("Order", ConfigurationSource::Explicit).unwrap().unwrap();
    builder.ignore_member(order, "Customer", ConfigurationSource::Explicit).unwrap();
    let model = builder.finalize().unwrap().into_model();
    assert!(model.find_entity_type("Customer").is_some());
}

#[test]
fn ignored_member_can_be_rediscovered() {
    let catalog = TypeCatalog::new().with(
        TypeDescriptor::new("Product")
            .with_member(scalar("Id", ScalarKind::I32))
            .with_member(scalar("Notes", ScalarKind::String)),
    );
    let mut builder = ModelBuilder::new(Arc::new(catalog));
    let product = builder.entity("Product", ConfigurationSource::Explicit).unwrap().unwrap();
    assert!(builder.model().find_property(product, "Notes").is_some());

    assert!(builder.ignore_member(product, "Notes", ConfigurationSource::Explicit).unwrap());
    assert!(builder.model().find_property(product, "Notes").is_none());
    builder.rediscover(product).unwrap();
    assert!(builder.model().find_property(product, "Notes").is_none());

    assert!(builder.unignore_member(product, "Notes"));
    builder.rediscover(product).unwrap();
    assert!(builder.model().find_property(product, "Notes").is_some());
}

#[test]
fn conventions_wait_for_delay_scope() {
    let mut builder = ModelBuilder::new(Arc::new(blogging()));
    builder
        .delay_conventions(|builder| {
            let blog = builder.entity("Blog", ConfigurationSource::Explicit)?.unwrap();
            assert!(builder.model().find_property(blog, "Id").is_none());
            assert!(builder.model().find_entity_type("Post").is_none());
            assert_eq!(builder.pending_events(), 1);
            Ok(())
        })
        .unwrap();
    let blog = builder.model().find_entity_type("Blog").unwrap();
    assert!(builder.model().find_property(blog, "Id").is_some());
    assert!(builder.model().find_entity_type("Post").is_some());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn hierarchy_snapshot_ignores_root_order(
        roots in Just(vec!["Animal", "Dog", "Puppy", "Cat"]).prop_shuffle()
    ) {
        let catalog = Arc::new(animals());
        let expected = snapshot(&catalog, &["Animal", "Dog", "Puppy", "Cat"]);
        prop_assert_eq!(snapshot(&catalog, &roots), expected);
    }

    #[test]
    fn model_building_is_deterministic(root in prop::sample::select(vec!["Blog", "Post"])) {
        let catalog = Arc::new(blogging());
        let first = snapshot(&catalog, &[root]).to_json().unwrap();
        let second = snapshot(&catalog, &[root]).to_json().unwrap();
        prop_assert_eq!(first, second);
    }
}
