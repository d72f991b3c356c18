//! Service references and the invalid-reference policy.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What to do when a referenced service does not exist.
///
/// The policy is an explicit parameter on every resolution entry point;
/// callers decide between propagating an error and accepting a default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvalidBehavior {
	/// Fail with [`DiError::ServiceNotFound`](crate::DiError::ServiceNotFound).
	#[default]
	Fail,
	/// Substitute [`Value::Null`](crate::Value::Null) for the missing service.
	ReturnNull,
	/// Omit the containing method call entirely when the service is missing.
	Ignore,
}

/// A placeholder meaning "substitute the service registered under this
/// identifier at resolution time".
///
/// Immutable value; displays as its target identifier, so it can stand in
/// for the service wherever a string key is expected.
///
/// # Examples
///
/// ```
/// use grappelli::{InvalidBehavior, Reference};
///
/// let required = Reference::new("database");
/// assert_eq!(required.id(), "database");
/// assert_eq!(required.invalid_behavior(), InvalidBehavior::Fail);
///
/// let optional = Reference::new("profiler").with_behavior(InvalidBehavior::Ignore);
/// assert_eq!(optional.to_string(), "profiler");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
	id: String,
	invalid_behavior: InvalidBehavior,
}

impl Reference {
	/// Creates a reference that fails when the target is missing.
	pub fn new(id: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			invalid_behavior: InvalidBehavior::Fail,
		}
	}

	/// Returns the same reference with a different invalid-reference policy.
	pub fn with_behavior(mut self, behavior: InvalidBehavior) -> Self {
		self.invalid_behavior = behavior;
		self
	}

	/// The target service identifier.
	pub fn id(&self) -> &str {
		&self.id
	}

	/// The policy applied when the target does not exist.
	pub fn invalid_behavior(&self) -> InvalidBehavior {
		self.invalid_behavior
	}
}

impl fmt::Display for Reference {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.id)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_to_fail() {
		assert_eq!(Reference::new("db").invalid_behavior(), InvalidBehavior::Fail);
	}

	#[test]
	fn displays_as_target_id() {
		let reference = Reference::new("mailer").with_behavior(InvalidBehavior::ReturnNull);
		assert_eq!(reference.to_string(), "mailer");
		assert_eq!(reference.invalid_behavior(), InvalidBehavior::ReturnNull);
	}
}
