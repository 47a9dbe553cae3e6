//! Interface-method to implementation-method rule table.
//!
//! | Slot | Method | Target |
//! |------|--------|--------|
//! | home, local-home | `remove`, `getEJBMetaData`, `getHomeHandle` | container operation |
//! | home, local-home | `create*` | `ejbCreate*` (and `ejbPostCreate*` when present) |
//! | home, local-home | `findByPrimaryKey` on CMP | container operation |
//! | home, local-home | `find*` on CMP | query from the descriptor |
//! | home, local-home | `find*` on BMP | `ejbFind*` |
//! | home, local-home | anything else | `ejbHome` + capitalized name |
//! | remote, local | `remove`, `getHandle`, `getPrimaryKey`, `isIdentical`, `getEJBHome`, `getEJBLocalHome` | container operation |
//! | every other slot | any | same name and parameters |

use caisson_model::{ComponentKind, InterfaceKind, MethodSignature};

/// Behaviour the container provides itself instead of calling the bean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerOperation {
	Remove,
	GetMetaData,
	GetHomeHandle,
	GetHandle,
	GetPrimaryKey,
	IsIdentical,
	GetHome,
	GetLocalHome,
	FindByPrimaryKey,
}

const HOME_OPERATIONS: &[(&str, ContainerOperation)] = &[
	("remove", ContainerOperation::Remove),
	("getEJBMetaData", ContainerOperation::GetMetaData),
	("getHomeHandle", ContainerOperation::GetHomeHandle),
];

const OBJECT_OPERATIONS: &[(&str, ContainerOperation)] = &[
	("remove", ContainerOperation::Remove),
	("getHandle", ContainerOperation::GetHandle),
	("getPrimaryKey", ContainerOperation::GetPrimaryKey),
	("isIdentical", ContainerOperation::IsIdentical),
	("getEJBHome", ContainerOperation::GetHome),
	("getEJBLocalHome", ContainerOperation::GetLocalHome),
];

/// Where an interface method is implemented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mapping {
	Bean(MethodSignature),
	Create { create: MethodSignature, post_create: MethodSignature },
	/// CMP finder answered by a query.
	Finder,
	Container(ContainerOperation),
}

fn lookup(table: &[(&str, ContainerOperation)], name: &str) -> Option<ContainerOperation> {
	table.iter().find(|(candidate, _)| *candidate == name).map(|(_, op)| *op)
}

/// `create` → `ejbCreate`, `createLarge` → `ejbCreateLarge`.
fn prefixed(prefix: &str, name: &str) -> String {
	let mut chars = name.chars();
	match chars.next() {
		Some(first) => format!("{prefix}{}{}", first.to_uppercase(), chars.as_str()),
		None => prefix.to_string(),
	}
}

pub fn map_method(kind: ComponentKind, slot: InterfaceKind, method: &MethodSignature) -> Mapping {
	let name = method.name.as_str();
	match slot {
		InterfaceKind::Home | InterfaceKind::LocalHome => {
			if let Some(op) = lookup(HOME_OPERATIONS, name) {
				return Mapping::Container(op);
			}
			if name.starts_with("create") {
				return Mapping::Create {
					create: method.renamed(prefixed("ejb", name)),
					post_create: method.renamed(prefixed("ejbPost", name)),
				};
			}
			match kind {
				ComponentKind::EntityCmp { .. } if name == "findByPrimaryKey" => Mapping::Container(ContainerOperation::FindByPrimaryKey),
				ComponentKind::EntityCmp { .. } if name.starts_with("find") => Mapping::Finder,
				ComponentKind::EntityBmp if name.starts_with("find") => Mapping::Bean(method.renamed(prefixed("ejb", name))),
				_ => Mapping::Bean(method.renamed(prefixed("ejbHome", name))),
			}
		}
		InterfaceKind::Remote | InterfaceKind::Local => match lookup(OBJECT_OPERATIONS, name) {
			Some(op) => Mapping::Container(op),
			None => Mapping::Bean(method.clone()),
		},
		InterfaceKind::BusinessLocal | InterfaceKind::BusinessRemote | InterfaceKind::MessageListener => Mapping::Bean(method.clone()),
	}
}
