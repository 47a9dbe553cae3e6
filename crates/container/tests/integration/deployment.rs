use caisson_container::{InvocationError, JndiBinder, ProxyReference};
use caisson_metadata::{AnnotatedKind, AssemblyDescriptor, BeanDescriptor, BeanKind, ContainerTransaction, DescriptorTree, MapClassLoader, RawModule, ResourceRef};
use caisson_model::{ContainerType, InterfaceKind, InterfaceSlots, MethodPattern, ProblemKind, TransactionAttribute, WarningKind};
use caisson_settings::{ConnectorDecl, ContainerDecl, ContainerSystemSettings};
use pretty_assertions::assert_eq;

use crate::common::{clerk, component, fixture, fixture_with, implementation, interface, local, sig};

fn shop_loader() -> MapClassLoader {
	MapClassLoader::new()
		.with(interface("acme.OrderLocal", &["place(Order)"]))
		.with(implementation("acme.OrderBean", &["place(Order)"]).build())
}

#[test]
fn annotation_only_bean_deploys_into_default_container() {
	let mut order = component(AnnotatedKind::Stateless, "acme.OrderBean", "acme.OrderLocal");
	order.resource_refs = vec![ResourceRef::new("jdbc/orders")];
	let settings = ContainerSystemSettings::default().with_connector(ConnectorDecl::new("jdbc/orders", caisson_model::DEFAULT_RESOURCE_TYPE));
	let f = fixture_with(settings, shop_loader()).system;

	let resolved = f.deploy(RawModule::new("shop", "/deploy/shop.jar").with_annotated(order)).expect("module deploys");
	assert_eq!(resolved.components[0].deployment_id, "OrderBean");

	let descriptor = f.descriptor("OrderBean").expect("descriptor published");
	assert_eq!(descriptor.container_id, "Default Stateless Container");
	assert_eq!(descriptor.resource_links[0].connector_id, "jdbc/orders");
	assert_eq!(
		f.settings().container("Default Stateless Container"),
		Some(&ContainerDecl::new("Default Stateless Container", ContainerType::Stateless))
	);
	assert!(resolved.all_warnings().any(|w| matches!(w.kind, WarningKind::AutoCreatedContainer { .. })));
}

#[test]
fn overloaded_methods_keep_distinct_attributes_after_deploy() {
	let loader = MapClassLoader::new()
		.with(interface("acme.Payment", &["charge(Money)", "charge(CardInfo)"]))
		.with(implementation("acme.PaymentBean", &["charge(Money)", "charge(CardInfo)"]).build());
	let f = fixture(loader);
	let descriptor = DescriptorTree {
		beans: vec![BeanDescriptor {
			class: Some("acme.PaymentBean".into()),
			kind: Some(BeanKind::Stateless),
			interfaces: InterfaceSlots {
				business_local: vec!["acme.Payment".into()],
				..InterfaceSlots::default()
			},
			..BeanDescriptor::new("PaymentBean")
		}],
		assembly: AssemblyDescriptor {
			container_transactions: vec![
				ContainerTransaction {
					bean: "PaymentBean".into(),
					attribute: TransactionAttribute::Required,
					methods: vec![MethodPattern::named("charge")],
				},
				ContainerTransaction {
					bean: "PaymentBean".into(),
					attribute: TransactionAttribute::RequiresNew,
					methods: vec![MethodPattern::exact(&sig("charge(CardInfo)"))],
				},
			],
			..AssemblyDescriptor::default()
		},
		..DescriptorTree::default()
	};

	f.system
		.deploy(RawModule::new("billing", "/deploy/billing.jar").with_descriptor(descriptor))
		.expect("module deploys");
	let payment = f.system.descriptor("PaymentBean").expect("descriptor published");
	assert_eq!(payment.transaction_attribute(&local("charge(CardInfo)")), Some(TransactionAttribute::RequiresNew));
	assert_eq!(payment.transaction_attribute(&local("charge(Money)")), Some(TransactionAttribute::Required));
}

#[test]
fn duplicate_deployment_id_fails_only_the_later_module() {
	let loader = MapClassLoader::new()
		.with(interface("acme.InventoryLocal", &["count(String)"]))
		.with(implementation("acme.a.InventoryBean", &["count(String)"]).build())
		.with(implementation("acme.b.InventoryBean", &["count(String)"]).build())
		.with(interface("acme.OrderLocal", &["place(Order)"]))
		.with(implementation("acme.OrderBean", &["place(Order)"]).build());
	let f = fixture(loader);

	let outcome = f.system.deploy_all(vec![
		RawModule::new("a", "/deploy/a.jar").with_annotated(component(AnnotatedKind::Stateless, "acme.a.InventoryBean", "acme.InventoryLocal")),
		RawModule::new("b", "/deploy/b.jar").with_annotated(component(AnnotatedKind::Stateless, "acme.b.InventoryBean", "acme.InventoryLocal")),
		RawModule::new("shop", "/deploy/shop.jar").with_annotated(component(AnnotatedKind::Stateless, "acme.OrderBean", "acme.OrderLocal")),
	]);

	assert!(!outcome.is_success());
	assert_eq!(outcome.deployed().count(), 2);
	let failures: Vec<_> = outcome.failed().collect();
	assert_eq!(failures.len(), 1);
	assert_eq!(failures[0].module, "b");
	assert_eq!(
		failures[0].problems[0].kind,
		ProblemKind::DuplicateDeploymentId {
			deployment_id: "InventoryBean".into(),
			first_module: "/deploy/a.jar".into(),
			second_module: "/deploy/b.jar".into(),
		}
	);
	assert_eq!(f.system.deployment_ids(), vec!["InventoryBean".to_string(), "OrderBean".to_string()]);
	assert_eq!(f.system.registry().get("InventoryBean").map(|c| c.module_id), Some("a".to_string()));
}

#[test]
fn deploying_the_same_module_twice_is_rejected() {
	let f = fixture(shop_loader());
	let module = || RawModule::new("shop", "/deploy/shop.jar").with_annotated(component(AnnotatedKind::Stateless, "acme.OrderBean", "acme.OrderLocal"));

	f.system.deploy(module()).expect("first deploy succeeds");
	let error = f.system.deploy(module()).expect_err("id already taken");
	assert!(matches!(error.problems[0].kind, ProblemKind::DuplicateDeploymentId { .. }));
	assert_eq!(f.system.registry().len(), 1);
}

#[test]
fn jndi_conflict_rolls_back_the_module() {
	let f = fixture(shop_loader());
	f.binder
		.bind(
			"OrderBeanLocal",
			ProxyReference {
				deployment_id: "Legacy".into(),
				interface: InterfaceKind::BusinessLocal,
				interface_class: "legacy.Order".into(),
			},
		)
		.expect("pre-bind succeeds");

	let error = f
		.system
		.deploy(RawModule::new("shop", "/deploy/shop.jar").with_annotated(component(AnnotatedKind::Stateless, "acme.OrderBean", "acme.OrderLocal")))
		.expect_err("name is taken");

	assert!(matches!(&error.problems[0].kind, ProblemKind::JndiBinding { name, .. } if name == "OrderBeanLocal"));
	assert!(f.system.descriptor("OrderBean").is_none());
	assert!(!f.system.registry().contains("OrderBean"));
	assert_eq!(f.binder.lookup("OrderBeanLocal").map(|r| r.deployment_id), Some("Legacy".to_string()));
}

#[test]
fn undeploy_unbinds_names_and_stops_dispatch() {
	let f = fixture(shop_loader());
	f.system
		.deploy(RawModule::new("shop", "/deploy/shop.jar").with_annotated(component(AnnotatedKind::Stateless, "acme.OrderBean", "acme.OrderLocal")))
		.expect("module deploys");
	assert_eq!(f.binder.names(), vec!["OrderBeanLocal".to_string()]);

	assert_eq!(f.system.undeploy("shop"), vec!["OrderBean".to_string()]);
	assert!(f.binder.names().is_empty());
	assert!(f.system.registry().is_empty());
	assert_eq!(
		f.system.invoke("OrderBean", &local("place(Order)"), Vec::new(), None, &clerk()),
		Err(InvocationError::NotDeployed {
			deployment_id: "OrderBean".into()
		})
	);
}
