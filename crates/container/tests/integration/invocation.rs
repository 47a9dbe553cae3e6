use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use caisson_container::{InvocationError, Phase, context};
use caisson_metadata::{
	AnnotatedCallback, AnnotatedKind, AssemblyDescriptor, BeanDescriptor, BeanKind, CallFrame, DescriptorTree, ExcludedMethods, InterceptorBindingDescriptor,
	InterceptorDescriptor, LoadedClass, MapClassLoader, MethodPermission, RawModule,
};
use caisson_model::{BeanFault, CallbackRef, InterfaceKind, InterfaceSlots, LifecycleEvent, MethodPattern, MethodRef, SecurityIdentity, Value};
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::common::{clerk, component, fixture, illegal_state, interface, local, sig};

fn shop_module(descriptor: DescriptorTree) -> RawModule {
	let mut order = component(AnnotatedKind::Stateless, "acme.OrderBean", "acme.OrderLocal");
	order.declare_roles = vec!["clerk".into(), "admin".into()];
	RawModule::new("shop", "/deploy/shop.jar").with_annotated(order).with_descriptor(descriptor)
}

fn shop_loader() -> MapClassLoader {
	let bean = LoadedClass::builder("acme.OrderBean")
		.method(sig("place(Order)"), |frame: &mut CallFrame<'_>| Ok(json!({ "placed": frame.arg(0).cloned() })))
		.method(sig("whoami()"), |_: &mut CallFrame<'_>| {
			let principal = context::caller_principal().map_err(illegal_state)?;
			Ok(Value::from(principal.name))
		})
		.method(sig("purge()"), |_: &mut CallFrame<'_>| Ok(Value::Null))
		.build();
	MapClassLoader::new()
		.with(interface("acme.OrderLocal", &["place(Order)", "whoami()", "purge()"]))
		.with(bean)
}

#[test]
fn business_method_returns_the_bean_result() {
	let f = fixture(shop_loader());
	f.system.deploy(shop_module(DescriptorTree::default())).expect("module deploys");

	let result = f.system.invoke("OrderBean", &local("place(Order)"), vec![json!({"sku": "A-1"})], None, &clerk());
	assert_eq!(result, Ok(json!({ "placed": { "sku": "A-1" } })));
	assert_eq!(f.transactions.committed(), 1, "Required runs in its own transaction");
}

#[test]
fn business_code_sees_the_caller() {
	let f = fixture(shop_loader());
	f.system.deploy(shop_module(DescriptorTree::default())).expect("module deploys");

	assert_eq!(f.system.invoke("OrderBean", &local("whoami()"), Vec::new(), None, &clerk()), Ok(Value::from("alice")));
	assert_eq!(
		f.system.invoke("OrderBean", &local("whoami()"), Vec::new(), None, &SecurityIdentity::anonymous()),
		Ok(Value::from("guest"))
	);
	assert!(context::current().is_none(), "context must not leak past the call");
}

#[test]
fn unknown_targets_are_reported() {
	let f = fixture(shop_loader());
	f.system.deploy(shop_module(DescriptorTree::default())).expect("module deploys");

	assert!(matches!(
		f.system.invoke("Nope", &local("place(Order)"), Vec::new(), None, &clerk()),
		Err(InvocationError::NotDeployed { .. })
	));
	let wrong_slot = MethodRef::new(InterfaceKind::BusinessRemote, sig("place(Order)"));
	assert!(matches!(
		f.system.invoke("OrderBean", &wrong_slot, Vec::new(), None, &clerk()),
		Err(InvocationError::NoSuchMethod { .. })
	));
}

#[test]
fn method_permissions_and_exclusions_are_enforced() {
	let f = fixture(shop_loader());
	let descriptor = DescriptorTree {
		assembly: AssemblyDescriptor {
			method_permissions: vec![
				MethodPermission {
					bean: "OrderBean".into(),
					roles: vec!["admin".into()],
					unchecked: false,
					methods: vec![MethodPattern::named("place")],
				},
				MethodPermission {
					bean: "OrderBean".into(),
					roles: Vec::new(),
					unchecked: true,
					methods: vec![MethodPattern::named("whoami")],
				},
			],
			exclude_list: vec![ExcludedMethods {
				bean: "OrderBean".into(),
				methods: vec![MethodPattern::named("purge")],
			}],
			..AssemblyDescriptor::default()
		},
		..DescriptorTree::default()
	};
	f.system.deploy(shop_module(descriptor)).expect("module deploys");
	let admin = SecurityIdentity::user("root", ["admin"]);

	assert!(matches!(
		f.system.invoke("OrderBean", &local("place(Order)"), Vec::new(), None, &clerk()),
		Err(InvocationError::AccessDenied { .. })
	));
	assert!(f.system.invoke("OrderBean", &local("place(Order)"), Vec::new(), None, &admin).is_ok());
	assert!(f.system.invoke("OrderBean", &local("whoami()"), Vec::new(), None, &SecurityIdentity::anonymous()).is_ok());
	assert!(matches!(
		f.system.invoke("OrderBean", &local("purge()"), Vec::new(), None, &admin),
		Err(InvocationError::AccessDenied { .. })
	));
	assert_eq!(f.transactions.committed(), 2, "denied calls never begin a transaction");
}

#[test]
fn interceptors_wrap_business_methods() {
	let calls = Arc::new(AtomicUsize::new(0));
	let seen = Arc::clone(&calls);
	let audit = LoadedClass::builder("acme.Audit")
		.method(sig("audit(InvocationContext)"), move |frame: &mut CallFrame<'_>| {
			seen.fetch_add(1, Ordering::SeqCst);
			frame.args = vec![json!("rewritten")];
			frame.proceed()
		})
		.build();
	let f = fixture(shop_loader().with(audit));
	let descriptor = DescriptorTree {
		interceptors: vec![InterceptorDescriptor {
			class: "acme.Audit".into(),
			around_invoke: Some("audit".into()),
			..InterceptorDescriptor::default()
		}],
		assembly: AssemblyDescriptor {
			interceptor_bindings: vec![InterceptorBindingDescriptor {
				bean: "*".into(),
				interceptors: vec!["acme.Audit".into()],
				method: None,
				exclude_default_interceptors: false,
				exclude_class_interceptors: false,
			}],
			..AssemblyDescriptor::default()
		},
		..DescriptorTree::default()
	};
	f.system.deploy(shop_module(descriptor)).expect("module deploys");

	let result = f.system.invoke("OrderBean", &local("place(Order)"), vec![json!("original")], None, &clerk());
	assert_eq!(result, Ok(json!({ "placed": "rewritten" })));
	assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// Cart bean; `checkout` records whether it ran as a pre-destroy callback
/// with rollback-only queries refused.
fn cart_loader(checked_out: Arc<AtomicBool>) -> MapClassLoader {
	let bean = LoadedClass::builder("acme.CartBean")
		.method(sig("ejbCreate()"), |frame: &mut CallFrame<'_>| {
			*frame.state = json!([]);
			Ok(Value::Null)
		})
		.method(sig("ejbCreate(String)"), |_: &mut CallFrame<'_>| Err(BeanFault::application("acme.CreateException", "no such coupon")))
		.method(sig("checkout()"), move |_: &mut CallFrame<'_>| {
			let in_pre_destroy = context::current().is_some_and(|ctx| ctx.phase == Phase::PreDestroy);
			checked_out.store(in_pre_destroy && context::get_rollback_only().is_err(), Ordering::SeqCst);
			Ok(Value::Null)
		})
		.method(sig("add(String)"), |frame: &mut CallFrame<'_>| {
			let mut items = frame.state.as_array().cloned().unwrap_or_default();
			items.extend(frame.arg(0).cloned());
			let count = items.len();
			*frame.state = Value::Array(items);
			Ok(Value::from(count))
		})
		.method(sig("init()"), |frame: &mut CallFrame<'_>| {
			context::caller_principal().map_err(illegal_state)?;
			let mut items = frame.state.as_array().cloned().unwrap_or_default();
			items.push(json!("welcome-gift"));
			*frame.state = Value::Array(items);
			Ok(Value::Null)
		})
		.build();
	MapClassLoader::new()
		.with(interface("acme.CartHome", &["create()", "create(String)"]))
		.with(interface("acme.Cart", &["add(String)", "remove()"]))
		.with(bean)
}

fn cart_module(pre_destroy: Vec<CallbackRef>) -> RawModule {
	let descriptor = DescriptorTree {
		beans: vec![BeanDescriptor {
			class: Some("acme.CartBean".into()),
			kind: Some(BeanKind::Stateful),
			interfaces: InterfaceSlots {
				local_home: Some("acme.CartHome".into()),
				local: Some("acme.Cart".into()),
				..InterfaceSlots::default()
			},
			post_construct: vec![CallbackRef::on_bean("init")],
				pre_destroy,
			..BeanDescriptor::new("CartBean")
		}],
		..DescriptorTree::default()
	};
	RawModule::new("shop", "/deploy/shop.jar").with_descriptor(descriptor)
}

#[test]
fn stateful_instances_keep_their_own_state() {
	let f = fixture(cart_loader(Arc::default()));
	f.system.deploy(cart_module(Vec::new())).expect("module deploys");
	let create = MethodRef::new(InterfaceKind::LocalHome, sig("create()"));
	let cart = |method: &str| MethodRef::new(InterfaceKind::Local, sig(method));
	let session_a = Some(json!("session-a"));
	let session_b = Some(json!("session-b"));

	f.system.invoke("CartBean", &create, Vec::new(), session_a.clone(), &clerk()).expect("create runs");
	f.system
		.run_lifecycle("CartBean", LifecycleEvent::PostConstruct, session_a.clone(), &clerk())
		.expect("post-construct runs");
	let add = |item: &str, session: &Option<Value>| f.system.invoke("CartBean", &cart("add(String)"), vec![json!(item)], session.clone(), &clerk());

	assert_eq!(add("book", &session_a), Ok(Value::from(2)));
	assert_eq!(add("pen", &session_b), Ok(Value::from(1)));
	assert_eq!(add("lamp", &session_a), Ok(Value::from(3)));

	f.system
		.invoke("CartBean", &cart("remove()"), Vec::new(), session_a.clone(), &clerk())
		.expect("remove is a container operation");
	assert_eq!(add("mug", &session_a), Ok(Value::from(1)), "a removed instance starts over");
}

#[test]
fn remove_runs_pre_destroy_callbacks_in_their_own_phase() {
	let checked_out = Arc::new(AtomicBool::new(false));
	let f = fixture(cart_loader(Arc::clone(&checked_out)));
	f.system.deploy(cart_module(vec![CallbackRef::on_bean("checkout")])).expect("module deploys");
	let session = Some(json!("session-a"));

	f.system
		.invoke("CartBean", &MethodRef::new(InterfaceKind::LocalHome, sig("create()")), Vec::new(), session.clone(), &clerk())
		.expect("create runs");
	f.system
		.invoke("CartBean", &MethodRef::new(InterfaceKind::Local, sig("remove()")), Vec::new(), session, &clerk())
		.expect("remove runs");

	assert!(checked_out.load(Ordering::SeqCst), "checkout must see the pre-destroy phase");
}

#[test]
fn failed_create_keeps_the_existing_instance_state() {
	let f = fixture(cart_loader(Arc::default()));
	f.system.deploy(cart_module(Vec::new())).expect("module deploys");
	let session = Some(json!("session-a"));
	let home = |method: &str| MethodRef::new(InterfaceKind::LocalHome, sig(method));
	let add = |item: &str| f.system.invoke("CartBean", &MethodRef::new(InterfaceKind::Local, sig("add(String)")), vec![json!(item)], session.clone(), &clerk());

	f.system.invoke("CartBean", &home("create()"), Vec::new(), session.clone(), &clerk()).expect("create runs");
	assert_eq!(add("book"), Ok(Value::from(1)));

	assert!(matches!(
		f.system.invoke("CartBean", &home("create(String)"), vec![json!("BOGUS")], session.clone(), &clerk()),
		Err(InvocationError::Application(_))
	));
	assert_eq!(add("pen"), Ok(Value::from(2)), "the cart survives a refused create");
}

#[test]
fn stateless_post_construct_may_not_ask_for_the_caller() {
	let bean = LoadedClass::builder("acme.OrderBean")
		.method(sig("place(Order)"), |_: &mut CallFrame<'_>| Ok(Value::Null))
		.method(sig("warmUp()"), |_: &mut CallFrame<'_>| {
			context::caller_principal().map_err(illegal_state)?;
			Ok(Value::Null)
		})
		.build();
	let f = fixture(MapClassLoader::new().with(interface("acme.OrderLocal", &["place(Order)"])).with(bean));
	let mut order = component(AnnotatedKind::Stateless, "acme.OrderBean", "acme.OrderLocal");
	order.callbacks = vec![AnnotatedCallback {
		event: LifecycleEvent::PostConstruct,
		method: "warmUp".into(),
	}];
	f.system
		.deploy(RawModule::new("shop", "/deploy/shop.jar").with_annotated(order))
		.expect("module deploys");

	let error = f
		.system
		.run_lifecycle("OrderBean", LifecycleEvent::PostConstruct, None, &clerk())
		.expect_err("caller is unknown during post-construct");
	assert!(matches!(error, InvocationError::System(BeanFault::System { ref class, .. }) if class == "IllegalStateException"));
}
