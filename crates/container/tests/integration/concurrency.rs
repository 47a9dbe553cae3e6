use std::path::{Path, PathBuf};
use std::thread;

use caisson_assembly::{DeploymentRegistry, ResolvedModule, resolve_module};
use caisson_container::TxStatus;
use caisson_metadata::{AnnotatedKind, CallFrame, LoadedClass, MapClassLoader, RawModule, merge};
use caisson_model::{ProblemKind, Value};
use caisson_settings::ContainerSystemSettings;
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::common::{clerk, component, fixture, implementation, interface, local, sig};

const THREADS: usize = 8;
const CALLS: usize = 50;

fn counter_loader() -> MapClassLoader {
	let bean = LoadedClass::builder("acme.EchoBean")
		.method(sig("echo(int)"), |frame: &mut CallFrame<'_>| {
			let value = frame.arg(0).cloned().unwrap_or(Value::Null);
			Ok(json!({ "echo": value }))
		})
		.build();
	(0..THREADS).fold(MapClassLoader::new().with(interface("acme.Echo", &["echo(int)"])).with(bean), |loader, n| {
		loader.with(implementation(&format!("acme.Worker{n}Bean"), &["echo(int)"]).build())
	})
}

#[test]
fn stateless_calls_from_many_threads_each_commit() {
	let f = fixture(counter_loader());
	f.system
		.deploy(RawModule::new("echo", "/deploy/echo.jar").with_annotated(component(AnnotatedKind::Stateless, "acme.EchoBean", "acme.Echo")))
		.expect("module deploys");

	thread::scope(|scope| {
		for t in 0..THREADS {
			let system = &f.system;
			scope.spawn(move || {
				for call in 0..CALLS {
					let n = t * CALLS + call;
					let result = system.invoke("EchoBean", &local("echo(int)"), vec![json!(n)], None, &clerk());
					assert_eq!(result, Ok(json!({ "echo": n })));
				}
				assert_eq!(system.transaction_manager().status(), TxStatus::NoTransaction);
			});
		}
	});

	assert_eq!(f.transactions.committed(), THREADS * CALLS);
	assert_eq!(f.transactions.open_transactions(), 0);
}

#[test]
fn deployments_race_with_invocations() {
	let f = fixture(counter_loader());
	f.system
		.deploy(RawModule::new("echo", "/deploy/echo.jar").with_annotated(component(AnnotatedKind::Stateless, "acme.EchoBean", "acme.Echo")))
		.expect("module deploys");

	thread::scope(|scope| {
		for n in 0..THREADS {
			let system = &f.system;
			scope.spawn(move || {
				let module = RawModule::new(format!("worker-{n}"), format!("/deploy/worker-{n}.jar"))
					.with_annotated(component(AnnotatedKind::Stateless, &format!("acme.Worker{n}Bean"), "acme.Echo"));
				system.deploy(module).expect("distinct modules deploy concurrently");
			});
		}
		let system = &f.system;
		scope.spawn(move || {
			for call in 0..CALLS {
				assert!(system.invoke("EchoBean", &local("echo(int)"), vec![json!(call)], None, &clerk()).is_ok());
			}
		});
	});

	let mut expected: Vec<String> = (0..THREADS).map(|n| format!("Worker{n}Bean")).collect();
	expected.push("EchoBean".into());
	expected.sort();
	assert_eq!(f.system.deployment_ids(), expected);
	assert_eq!(f.binder.names().len(), THREADS + 1);
}

/// Modules whose beans all claim the `InventoryBean` deployment id.
fn rival_loader() -> MapClassLoader {
	(0..THREADS).fold(MapClassLoader::new().with(interface("acme.Inventory", &["count(String)"])), |loader, n| {
		loader.with(implementation(&format!("acme.r{n}.InventoryBean"), &["count(String)"]).build())
	})
}

fn rival_module(n: usize) -> RawModule {
	RawModule::new(format!("rival-{n}"), format!("/deploy/rival-{n}.jar"))
		.with_annotated(component(AnnotatedKind::Stateless, &format!("acme.r{n}.InventoryBean"), "acme.Inventory"))
}

fn duplicate_of(winner: &Path, n: usize) -> ProblemKind {
	ProblemKind::DuplicateDeploymentId {
		deployment_id: "InventoryBean".into(),
		first_module: winner.to_path_buf(),
		second_module: PathBuf::from(format!("/deploy/rival-{n}.jar")),
	}
}

#[test]
fn racing_deploys_of_one_deployment_id_admit_exactly_one() {
	let f = fixture(rival_loader());

	let results: Vec<_> = thread::scope(|scope| {
		let handles: Vec<_> = (0..THREADS)
			.map(|n| {
				let system = &f.system;
				scope.spawn(move || system.deploy(rival_module(n)))
			})
			.collect();
		handles.into_iter().map(|handle| handle.join().expect("deploy thread")).collect()
	});

	assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
	let winner = f.system.registry().get("InventoryBean").expect("one module holds the id").module_path;
	for (n, result) in results.iter().enumerate() {
		if let Err(error) = result {
			assert_eq!(error.problems.len(), 1);
			assert_eq!(error.problems[0].kind, duplicate_of(&winner, n));
		}
	}
	assert_eq!(f.system.deployment_ids(), vec!["InventoryBean".to_string()]);
	assert_eq!(f.binder.names(), vec!["InventoryBeanLocal".to_string()]);
}

#[test]
fn racing_registry_commits_admit_exactly_one() {
	let loader = rival_loader();
	let settings = ContainerSystemSettings::default();
	let registry = DeploymentRegistry::new();
	let resolved: Vec<ResolvedModule> = (0..THREADS)
		.map(|n| {
			let merged = merge(&rival_module(n), &loader).expect("module merges");
			resolve_module(&merged, &settings, &registry).expect("an empty registry has no rival")
		})
		.collect();

	let commits: Vec<_> = thread::scope(|scope| {
		let handles: Vec<_> = resolved
			.iter()
			.map(|module| {
				let registry = &registry;
				scope.spawn(move || registry.commit(module))
			})
			.collect();
		handles.into_iter().map(|handle| handle.join().expect("commit thread")).collect()
	});

	assert_eq!(commits.iter().filter(|result| result.is_ok()).count(), 1);
	assert_eq!(registry.len(), 1);
	let winner = registry.get("InventoryBean").expect("one module holds the id").module_path;
	for (n, result) in commits.iter().enumerate() {
		if let Err(error) = result {
			assert!(error.any(|kind| *kind == duplicate_of(&winner, n)), "{error:?}");
		}
	}
}
