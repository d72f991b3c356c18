//! Container extensions: named configuration-loading units.
//!
//! An extension translates high-level raw configuration into definitions and
//! parameters. It never touches the main builder directly: the builder hands
//! it a dedicated sub-container per namespace, merged back in at freeze time
//! so that direct registrations always win over extension contributions.

use crate::builder::ContainerBuilder;
use crate::error::{DiError, DiResult};
use crate::value::Value;
use indexmap::IndexMap;
use std::sync::Arc;

/// A named, versioned configuration loader.
pub trait Extension: Send + Sync {
	/// The extension's namespace (e.g. a URL or dotted path).
	fn namespace(&self) -> &str;

	/// The short alias the extension is addressed by in configuration.
	fn alias(&self) -> &str;

	/// Loads one configuration tag into the extension's sub-container.
	///
	/// `tag` selects which of the extension's configuration sections to
	/// load; `config` is the raw configuration for that section.
	fn load(&self, tag: &str, config: &Value, container: &mut ContainerBuilder) -> DiResult<()>;
}

/// An explicit, builder-owned table of registered extensions.
///
/// Extensions are indexed under both their alias and their namespace.
#[derive(Default)]
pub struct ExtensionRegistry {
	extensions: IndexMap<String, Arc<dyn Extension>>,
}

impl ExtensionRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers an extension under its alias and namespace.
	pub fn register(&mut self, extension: Arc<dyn Extension>) {
		self.extensions
			.insert(extension.alias().to_string(), extension.clone());
		self.extensions
			.insert(extension.namespace().to_string(), extension);
	}

	/// Looks an extension up by alias or namespace.
	pub fn get(&self, name: &str) -> DiResult<Arc<dyn Extension>> {
		self.extensions
			.get(name)
			.cloned()
			.ok_or_else(|| DiError::UnknownExtension(name.to_string()))
	}

	/// True when an extension is registered under the name.
	pub fn contains(&self, name: &str) -> bool {
		self.extensions.contains_key(name)
	}

	/// Adopts extensions from another registry, keeping existing entries.
	pub(crate) fn absorb(&mut self, other: ExtensionRegistry) {
		for (name, extension) in other.extensions {
			self.extensions.entry(name).or_insert(extension);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	struct Noop;

	impl Extension for Noop {
		fn namespace(&self) -> &str {
			"https://example.com/schema/noop"
		}

		fn alias(&self) -> &str {
			"noop"
		}

		fn load(
			&self,
			_tag: &str,
			_config: &Value,
			_container: &mut ContainerBuilder,
		) -> DiResult<()> {
			Ok(())
		}
	}

	#[test]
	fn registered_under_alias_and_namespace() {
		let mut registry = ExtensionRegistry::new();
		registry.register(Arc::new(Noop));
		assert!(registry.contains("noop"));
		assert!(registry.contains("https://example.com/schema/noop"));
		assert_eq!(registry.get("noop").unwrap().alias(), "noop");
	}

	#[test]
	fn unknown_extension_fails() {
		let registry = ExtensionRegistry::new();
		assert!(matches!(
			registry.get("ghost"),
			Err(DiError::UnknownExtension(name)) if name == "ghost"
		));
	}
}
