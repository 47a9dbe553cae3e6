//! Metadata source readers.

use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{AnnotatedClass, DescriptorTree, MetadataError, Result};

/// Location of the module descriptor, relative to the module root.
pub const DESCRIPTOR_PATH: &str = "META-INF/ejb-jar.toml";

/// Location of the annotation index written by the external scanner.
pub const ANNOTATION_INDEX_PATH: &str = "META-INF/annotations.toml";

/// Pluggable metadata discovery for one module format.
pub trait MetadataSource: Send + Sync {
	/// Classes carrying component, interceptor or exception annotations under `root`.
	fn find_declared_components(&self, root: &Path) -> Result<Vec<AnnotatedClass>>;

	fn parse_descriptor(&self, reader: &mut dyn Read) -> Result<DescriptorTree>;
}

/// Reads TOML descriptors and a TOML annotation index.
#[derive(Debug, Clone, Copy, Default)]
pub struct TomlMetadataSource;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct AnnotationIndex {
	#[serde(default)]
	classes: Vec<AnnotatedClass>,
}

impl MetadataSource for TomlMetadataSource {
	fn find_declared_components(&self, root: &Path) -> Result<Vec<AnnotatedClass>> {
		let path = root.join(ANNOTATION_INDEX_PATH);
		if !path.exists() {
			return Ok(Vec::new());
		}
		let text = std::fs::read_to_string(&path).map_err(|error| MetadataError::Io { path: path.clone(), error })?;
		let index: AnnotationIndex = toml::from_str(&text).map_err(|e| MetadataError::Parse {
			path,
			message: e.to_string(),
		})?;
		Ok(index.classes)
	}

	fn parse_descriptor(&self, reader: &mut dyn Read) -> Result<DescriptorTree> {
		let mut text = String::new();
		reader.read_to_string(&mut text).map_err(|error| MetadataError::Io {
			path: PathBuf::from(DESCRIPTOR_PATH),
			error,
		})?;
		Ok(toml::from_str(&text)?)
	}
}

/// Unmerged metadata of one module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawModule {
	pub module_id: String,
	pub path: PathBuf,
	pub annotated: Vec<AnnotatedClass>,
	pub descriptor: Option<DescriptorTree>,
}

impl RawModule {
	pub fn new(module_id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
		Self {
			module_id: module_id.into(),
			path: path.into(),
			..Self::default()
		}
	}

	pub fn with_descriptor(mut self, descriptor: DescriptorTree) -> Self {
		self.descriptor = Some(descriptor);
		self
	}

	pub fn with_annotated(mut self, class: AnnotatedClass) -> Self {
		self.annotated.push(class);
		self
	}
}

/// Reads descriptor and annotation metadata of the module rooted at `root`.
///
/// A module without descriptor is valid (annotation-only). The module id is the
/// descriptor's `module-id`, else the file stem of `root`.
pub fn read_module(source: &dyn MetadataSource, root: &Path) -> Result<RawModule> {
	let _span = tracing::trace_span!("read_module", root = %root.display()).entered();

	let descriptor_path = root.join(DESCRIPTOR_PATH);
	let descriptor = if descriptor_path.exists() {
		let mut file = std::fs::File::open(&descriptor_path).map_err(|error| MetadataError::Io {
			path: descriptor_path.clone(),
			error,
		})?;
		let tree = source.parse_descriptor(&mut file).map_err(|e| match e {
			MetadataError::Toml(err) => MetadataError::Parse {
				path: descriptor_path.clone(),
				message: err.to_string(),
			},
			other => other,
		})?;
		Some(tree)
	} else {
		None
	};
	let annotated = source.find_declared_components(root)?;

	let module_id = descriptor
		.as_ref()
		.and_then(|d| d.module_id.clone())
		.or_else(|| root.file_stem().map(|stem| stem.to_string_lossy().into_owned()))
		.unwrap_or_else(|| root.display().to_string());

	tracing::debug!(
		module = %module_id,
		descriptor = descriptor.is_some(),
		annotated = annotated.len(),
		"read module metadata"
	);

	Ok(RawModule {
		module_id,
		path: root.to_path_buf(),
		annotated,
		descriptor,
	})
}
