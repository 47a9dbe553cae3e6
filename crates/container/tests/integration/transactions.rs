use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use caisson_container::{ContainerSystem, InvocationError, LocalTransactionManager, TransactionManager, TxError, TxHandle, TxStatus, context};
use caisson_metadata::{AnnotatedClass, AnnotatedKind, BeanDescriptor, BeanKind, CallFrame, DescriptorTree, LoadedClass, LoadedClassBuilder, MapClassLoader, MethodTransaction, RawModule};
use caisson_model::{BeanFault, InterfaceKind, InterfaceSlots, MethodRef, TransactionAttribute, TransactionType, Value};
use caisson_settings::ContainerSystemSettings;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use crate::common::{clerk, component, fixture, illegal_state, interface, local, noop, sig};

/// Forwards to a local manager and counts `set_rollback_only` calls.
#[derive(Default)]
struct CountingManager {
	inner: LocalTransactionManager,
	rollback_marks: AtomicUsize,
}

impl TransactionManager for CountingManager {
	fn begin(&self) -> Result<TxHandle, TxError> {
		self.inner.begin()
	}

	fn commit(&self) -> Result<(), TxError> {
		self.inner.commit()
	}

	fn rollback(&self) -> Result<(), TxError> {
		self.inner.rollback()
	}

	fn set_rollback_only(&self) -> Result<(), TxError> {
		self.rollback_marks.fetch_add(1, Ordering::SeqCst);
		self.inner.set_rollback_only()
	}

	fn status(&self) -> TxStatus {
		self.inner.status()
	}

	fn suspend(&self) -> Option<TxHandle> {
		self.inner.suspend()
	}

	fn resume(&self, tx: TxHandle) -> Result<(), TxError> {
		self.inner.resume(tx)
	}
}

fn payment_loader() -> MapClassLoader {
	let bean = LoadedClass::builder("acme.PaymentBean")
		.method(sig("charge(Money)"), |_: &mut CallFrame<'_>| Ok(Value::from("charged")))
		.method(sig("charge(CardInfo)"), |_: &mut CallFrame<'_>| Ok(Value::from("card charged")))
		.method(sig("audit()"), |_: &mut CallFrame<'_>| Ok(Value::Null))
		.method(sig("crash()"), |_: &mut CallFrame<'_>| Err(BeanFault::system("ledger unavailable")))
		.method(sig("reject()"), |_: &mut CallFrame<'_>| Err(BeanFault::application("acme.CardDeclined", "declined")))
		.method(sig("soldOut()"), |_: &mut CallFrame<'_>| Err(BeanFault::application("acme.OutOfStock", "none left")))
		.method(sig("abandon()"), |_: &mut CallFrame<'_>| {
			context::set_rollback_only().map_err(illegal_state)?;
			Ok(Value::Null)
		})
		.build();
	MapClassLoader::new()
		.with(interface(
			"acme.Payment",
			&["charge(Money)", "charge(CardInfo)", "audit()", "crash()", "reject()", "soldOut()", "abandon()"],
		))
		.with(bean)
		.with(LoadedClass::builder("acme.OutOfStock").build())
}

fn payment_module() -> RawModule {
	let mut payment = component(AnnotatedKind::Stateless, "acme.PaymentBean", "acme.Payment");
	payment.method_transactions = vec![
		MethodTransaction {
			method: sig("charge(CardInfo)"),
			attribute: TransactionAttribute::RequiresNew,
		},
		MethodTransaction {
			method: sig("audit()"),
			attribute: TransactionAttribute::Mandatory,
		},
	];
	let mut out_of_stock = AnnotatedClass::new("acme.OutOfStock");
	out_of_stock.application_exception = Some(true);
	RawModule::new("billing", "/deploy/billing.jar").with_annotated(payment).with_annotated(out_of_stock)
}

#[test]
fn requires_new_suspends_and_resumes_the_caller_transaction() {
	let f = fixture(payment_loader());
	f.system.deploy(payment_module()).expect("module deploys");
	let caller = f.transactions.begin().expect("caller transaction");

	let result = f.system.invoke("PaymentBean", &local("charge(CardInfo)"), Vec::new(), None, &clerk());

	assert_eq!(result, Ok(Value::from("card charged")));
	assert_eq!(f.transactions.committed(), 1, "the inner transaction committed");
	assert_eq!(f.transactions.status(), TxStatus::Active, "the caller transaction is back");
	assert_eq!(f.transactions.suspend(), Some(caller));
	f.transactions.resume(caller).expect("resume caller");
	f.transactions.commit().expect("caller commits");
}

#[test]
fn required_joins_the_caller_transaction() {
	let f = fixture(payment_loader());
	f.system.deploy(payment_module()).expect("module deploys");
	f.transactions.begin().expect("caller transaction");

	f.system
		.invoke("PaymentBean", &local("charge(Money)"), Vec::new(), None, &clerk())
		.expect("charge succeeds");
	assert_eq!(f.transactions.committed(), 0, "a joined transaction is not the callee's to commit");
	f.transactions.commit().expect("caller commits");
}

#[test]
fn mandatory_without_caller_transaction_fails() {
	let f = fixture(payment_loader());
	f.system.deploy(payment_module()).expect("module deploys");

	assert_eq!(
		f.system.invoke("PaymentBean", &local("audit()"), Vec::new(), None, &clerk()),
		Err(InvocationError::TransactionRequired { method: local("audit()") })
	);
	assert_eq!(f.transactions.open_transactions(), 0);
}

#[test]
fn system_fault_rolls_back_and_poisons_a_joined_transaction() {
	let f = fixture(payment_loader());
	f.system.deploy(payment_module()).expect("module deploys");

	assert!(matches!(
		f.system.invoke("PaymentBean", &local("crash()"), Vec::new(), None, &clerk()),
		Err(InvocationError::System(_))
	));
	assert_eq!(f.transactions.rolled_back(), 1);

	f.transactions.begin().expect("caller transaction");
	assert!(matches!(
		f.system.invoke("PaymentBean", &local("crash()"), Vec::new(), None, &clerk()),
		Err(InvocationError::TransactionRolledBack(_))
	));
	assert_eq!(f.transactions.status(), TxStatus::MarkedRollback);
	f.transactions.rollback().expect("caller rolls back");
}

#[test]
fn application_faults_follow_their_rollback_flag() {
	let f = fixture(payment_loader());
	f.system.deploy(payment_module()).expect("module deploys");

	assert!(matches!(
		f.system.invoke("PaymentBean", &local("reject()"), Vec::new(), None, &clerk()),
		Err(InvocationError::Application(_))
	));
	assert_eq!((f.transactions.committed(), f.transactions.rolled_back()), (1, 0));

	assert!(matches!(
		f.system.invoke("PaymentBean", &local("soldOut()"), Vec::new(), None, &clerk()),
		Err(InvocationError::Application(_))
	));
	assert_eq!((f.transactions.committed(), f.transactions.rolled_back()), (1, 1));
}

#[test]
fn container_managed_set_rollback_only_rolls_back_silently() {
	let f = fixture(payment_loader());
	f.system.deploy(payment_module()).expect("module deploys");

	assert_eq!(f.system.invoke("PaymentBean", &local("abandon()"), Vec::new(), None, &clerk()), Ok(Value::Null));
	assert_eq!((f.transactions.committed(), f.transactions.rolled_back()), (0, 1));
}

#[test]
fn bean_managed_set_rollback_only_is_illegal_and_never_reaches_the_manager() {
	let manager = Arc::new(CountingManager::default());
	let system = ContainerSystem::new(ContainerSystemSettings::default(), Arc::new(payment_loader())).with_transaction_manager(manager.clone());
	let mut payment = component(AnnotatedKind::Stateless, "acme.PaymentBean", "acme.Payment");
	payment.transaction_management = Some(TransactionType::Bean);
	system
		.deploy(RawModule::new("billing", "/deploy/billing.jar").with_annotated(payment))
		.expect("module deploys");

	let error = system
		.invoke("PaymentBean", &local("abandon()"), Vec::new(), None, &clerk())
		.expect_err("bean-managed components cannot mark rollback");

	assert!(matches!(error, InvocationError::System(BeanFault::System { ref class, .. }) if class == "IllegalStateException"));
	assert_eq!(manager.rollback_marks.load(Ordering::SeqCst), 0);
}

/// Bean whose `open` begins a user transaction and `close` commits it.
fn bmt_bean(class: &str) -> LoadedClassBuilder {
	LoadedClass::builder(class)
		.method(sig("open()"), |_: &mut CallFrame<'_>| {
			let utx = context::user_transaction().map_err(illegal_state)?;
			utx.begin().map_err(illegal_state)?;
			Ok(Value::Null)
		})
		.method(sig("close()"), |_: &mut CallFrame<'_>| {
			let utx = context::user_transaction().map_err(illegal_state)?;
			utx.commit().map_err(illegal_state)?;
			Ok(Value::Null)
		})
}

fn bmt_loader(class: &str) -> MapClassLoader {
	MapClassLoader::new().with(interface("acme.Session", &["open()", "close()"])).with(bmt_bean(class).build())
}

fn bmt_module(kind: AnnotatedKind, class: &str) -> RawModule {
	let mut bean = component(kind, class, "acme.Session");
	bean.transaction_management = Some(TransactionType::Bean);
	RawModule::new("sessions", "/deploy/sessions.jar").with_annotated(bean)
}

#[test]
fn stateful_bean_managed_transaction_spans_calls() {
	let f = fixture(bmt_loader("acme.ConversationBean"));
	f.system
		.deploy(bmt_module(AnnotatedKind::Stateful, "acme.ConversationBean"))
		.expect("module deploys");
	let session = Some(Value::from("s-1"));

	f.system
		.invoke("ConversationBean", &local("open()"), Vec::new(), session.clone(), &clerk())
		.expect("open");
	assert_eq!(f.transactions.status(), TxStatus::NoTransaction, "the open transaction is not left on the caller");
	assert_eq!(f.transactions.open_transactions(), 1);

	f.system
		.invoke("ConversationBean", &local("close()"), Vec::new(), session, &clerk())
		.expect("close");
	assert_eq!(f.transactions.committed(), 1);
	assert_eq!(f.transactions.open_transactions(), 0);
}

fn conversation_module() -> RawModule {
	let descriptor = DescriptorTree {
		beans: vec![BeanDescriptor {
			class: Some("acme.ConversationBean".into()),
			kind: Some(BeanKind::Stateful),
			transaction_type: Some(TransactionType::Bean),
			interfaces: InterfaceSlots {
				local_home: Some("acme.ConversationHome".into()),
				local: Some("acme.Conversation".into()),
				..InterfaceSlots::default()
			},
			..BeanDescriptor::new("ConversationBean")
		}],
		..DescriptorTree::default()
	};
	RawModule::new("sessions", "/deploy/sessions.jar").with_descriptor(descriptor)
}

#[test]
fn removing_a_stateful_instance_rolls_back_its_open_transaction() {
	let loader = MapClassLoader::new()
		.with(interface("acme.ConversationHome", &["create()"]))
		.with(interface("acme.Conversation", &["open()", "close()", "remove()"]))
		.with(bmt_bean("acme.ConversationBean").method(sig("ejbCreate()"), noop).build());
	let f = fixture(loader);
	f.system.deploy(conversation_module()).expect("module deploys");
	let session = Some(Value::from("s-1"));
	let call = |slot: InterfaceKind, method: &str| f.system.invoke("ConversationBean", &MethodRef::new(slot, sig(method)), Vec::new(), session.clone(), &clerk());

	call(InterfaceKind::LocalHome, "create()").expect("create");
	call(InterfaceKind::Local, "open()").expect("open");
	assert_eq!(f.transactions.open_transactions(), 1);

	assert_eq!(call(InterfaceKind::Local, "remove()"), Ok(Value::Null));
	assert_eq!(f.transactions.open_transactions(), 0);
	assert_eq!(f.transactions.rolled_back(), 1);
	assert_eq!(f.transactions.status(), TxStatus::NoTransaction);

	call(InterfaceKind::LocalHome, "create()").expect("create again");
	call(InterfaceKind::Local, "open()").expect("a new instance begins its own transaction");
	call(InterfaceKind::Local, "close()").expect("close");
	assert_eq!((f.transactions.committed(), f.transactions.rolled_back()), (1, 1));
}

#[test]
fn stateless_bean_managed_transaction_left_open_is_rolled_back() {
	let f = fixture(bmt_loader("acme.BatchBean"));
	f.system.deploy(bmt_module(AnnotatedKind::Stateless, "acme.BatchBean")).expect("module deploys");

	let error = f
		.system
		.invoke("BatchBean", &local("open()"), Vec::new(), None, &clerk())
		.expect_err("stateless components must complete their transactions");
	assert!(matches!(error, InvocationError::System(_)));
	assert_eq!(f.transactions.rolled_back(), 1);
	assert_eq!(f.transactions.open_transactions(), 0);
}

fn attribute() -> impl Strategy<Value = TransactionAttribute> {
	proptest::sample::select(TransactionAttribute::ALL.to_vec())
}

proptest! {
	#[test]
	fn method_entry_beats_class_default(named in attribute(), exact in attribute()) {
		let f = fixture(payment_loader());
		let mut payment = component(AnnotatedKind::Stateless, "acme.PaymentBean", "acme.Payment");
		payment.transaction_attribute = Some(named);
		payment.method_transactions = vec![MethodTransaction {
			method: sig("charge(CardInfo)"),
			attribute: exact,
		}];
		f.system
			.deploy(RawModule::new("billing", "/deploy/billing.jar").with_annotated(payment))
			.expect("module deploys");

		let descriptor = f.system.descriptor("PaymentBean").expect("descriptor published");
		prop_assert_eq!(descriptor.transaction_attribute(&local("charge(CardInfo)")), Some(exact));
		prop_assert_eq!(descriptor.transaction_attribute(&local("charge(Money)")), Some(named));
	}
}
