//! Container error types.
//!
//! All failures in the container are synchronous and fail-fast: an error
//! aborts the current build attempt and propagates to the caller. Every
//! message names the offending identifier, parameter, or alias.

use thiserror::Error;

/// Result type for container operations.
pub type DiResult<T> = Result<T, DiError>;

/// Service container errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DiError {
	/// A parameter was referenced but never defined.
	#[error("parameter not found: {0}")]
	ParameterNotFound(String),

	/// A parameter's value resolves back to itself, directly or through a chain.
	#[error("circular reference while resolving parameter '{0}'")]
	CircularParameter(String),

	/// A non-scalar parameter was embedded inside a string placeholder.
	#[error("parameter '{0}' cannot be embedded in a string: value is not a scalar")]
	NonScalarParameter(String),

	/// An alias chain revisited an identifier.
	#[error("circular alias chain detected at '{0}'")]
	CircularAlias(String),

	/// Alias lookup on an identifier with no alias.
	#[error("service alias not found: {0}")]
	AliasNotFound(String),

	/// No cached instance, alias, or definition under the identifier.
	#[error("service not found: {0}")]
	ServiceNotFound(String),

	/// Definition lookup on an identifier with no definition.
	#[error("service definition not found: {0}")]
	DefinitionNotFound(String),

	/// Building a service re-entered its own build through a constructor argument.
	#[error("service '{0}' has a circular reference to itself")]
	CircularService(String),

	/// A mutation was attempted after `freeze()`.
	#[error("cannot {0} on a frozen container")]
	FrozenContainer(&'static str),

	/// Extension lookup with an unregistered name.
	#[error("container extension '{0}' is not registered")]
	UnknownExtension(String),

	/// A declared configurator does not resolve to an invocable target.
	#[error("configurator for service '{0}' is not invocable")]
	InvalidConfigurator(String),

	/// A factory method did not produce a service instance.
	#[error("factory for service '{0}' did not produce a service instance")]
	InvalidFactory(String),

	/// A definition has neither a class nor a factory service.
	#[error("definition '{0}' has neither a class nor a factory service")]
	MissingClass(String),

	/// Instantiation was requested for a class with no registered closure table.
	#[error("class not registered: {0}")]
	ClassNotRegistered(String),

	/// Method invocation was requested for a method with no registered closure.
	#[error("method '{method}' not registered for class '{class}'")]
	MethodNotRegistered {
		/// Class the lookup ran against.
		class: String,
		/// Missing method name.
		method: String,
	},

	/// A host-supplied constructor, factory, or method rejected its input.
	#[error("failed to build '{class}': {message}")]
	Instantiation {
		/// Class being built.
		class: String,
		/// Host-provided failure description.
		message: String,
	},
}

impl DiError {
	/// Shorthand for host closures rejecting their arguments.
	pub fn instantiation(class: impl Into<String>, message: impl Into<String>) -> Self {
		DiError::Instantiation {
			class: class.into(),
			message: message.into(),
		}
	}
}
