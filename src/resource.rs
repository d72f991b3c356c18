//! Opaque configuration resources.
//!
//! A resource marks something the container's configuration depends on, so a
//! caller can decide when cached configuration must be rebuilt. The builder
//! only accumulates and deduplicates resources, never interprets them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A dependency of the container's configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resource {
	/// A file the configuration was built from.
	File(PathBuf),
	/// A code identity, such as the extension that contributed configuration.
	Code(String),
}

impl Resource {
	/// Creates a file resource.
	pub fn file(path: impl Into<PathBuf>) -> Self {
		Resource::File(path.into())
	}

	/// Creates a code-identity resource.
	pub fn code(identity: impl Into<String>) -> Self {
		Resource::Code(identity.into())
	}
}

impl fmt::Display for Resource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Resource::File(path) => write!(f, "{}", path.display()),
			Resource::Code(identity) => f.write_str(identity),
		}
	}
}
