//! Service definitions: the declarative recipe for building one service.

use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One set of named attributes attached to a service under a tag.
pub type Annotation = IndexMap<String, Value>;

/// A method invocation performed on a service after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
	/// Method name, looked up in the class's closure table.
	pub method: String,
	/// Ordered arguments; literals, placeholders, or references.
	pub arguments: Vec<Value>,
}

impl MethodCall {
	/// Creates a method call descriptor.
	pub fn new(method: impl Into<String>, arguments: Vec<Value>) -> Self {
		Self {
			method: method.into(),
			arguments,
		}
	}
}

/// A callable invoked with the built instance as its sole argument, after
/// all method calls have run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Configurator {
	/// An instance method on another service.
	Service {
		/// Identifier of the service carrying the method.
		id: String,
		/// Method name on that service.
		method: String,
	},
	/// A static method on a registered class.
	Class {
		/// Class name; may contain parameter placeholders.
		class: String,
		/// Static method name on that class.
		method: String,
	},
}

/// A serializable descriptor of how to build one service.
///
/// A definition carries no identifier of its own; it is stored under an id
/// by the [`ContainerBuilder`](crate::ContainerBuilder) that registers it.
/// Pure data: the builder interprets it, the definition never builds
/// anything itself. Equality is by value.
///
/// # Examples
///
/// ```
/// use grappelli::{Definition, Reference, Value};
///
/// let definition = Definition::new("App::Connection")
///     .with_argument("%db.dsn%")
///     .with_argument(Reference::new("logger"))
///     .with_method_call("set_timeout", vec![Value::from(30i64)])
///     .with_shared(true);
///
/// assert_eq!(definition.class(), Some("App::Connection"));
/// assert_eq!(definition.arguments().len(), 2);
/// assert!(definition.is_shared());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Definition {
	class: Option<String>,
	arguments: Vec<Value>,
	annotations: IndexMap<String, Vec<Annotation>>,
	method_calls: Vec<MethodCall>,
	factory_method: Option<String>,
	factory_service: Option<String>,
	configurator: Option<Configurator>,
	shared: bool,
	file: Option<String>,
}

impl Default for Definition {
	fn default() -> Self {
		Self {
			class: None,
			arguments: Vec::new(),
			annotations: IndexMap::new(),
			method_calls: Vec::new(),
			factory_method: None,
			factory_service: None,
			configurator: None,
			// Services are singletons unless declared otherwise.
			shared: true,
			file: None,
		}
	}
}

impl Definition {
	/// Creates a definition for the given class.
	///
	/// The class name may itself contain `%name%` placeholders; it is
	/// resolved against the parameter bag at build time.
	pub fn new(class: impl Into<String>) -> Self {
		Self {
			class: Some(class.into()),
			..Self::default()
		}
	}

	/// The declared class name, if any.
	pub fn class(&self) -> Option<&str> {
		self.class.as_deref()
	}

	/// Replaces the class name.
	pub fn set_class(&mut self, class: impl Into<String>) -> &mut Self {
		self.class = Some(class.into());
		self
	}

	/// Appends a constructor argument (builder style).
	pub fn with_argument(mut self, argument: impl Into<Value>) -> Self {
		self.arguments.push(argument.into());
		self
	}

	/// Appends a constructor argument in place.
	pub fn add_argument(&mut self, argument: impl Into<Value>) -> &mut Self {
		self.arguments.push(argument.into());
		self
	}

	/// Replaces the whole argument list.
	pub fn set_arguments(&mut self, arguments: Vec<Value>) -> &mut Self {
		self.arguments = arguments;
		self
	}

	/// The ordered constructor arguments.
	pub fn arguments(&self) -> &[Value] {
		&self.arguments
	}

	/// Appends a method call (builder style).
	pub fn with_method_call(mut self, method: impl Into<String>, arguments: Vec<Value>) -> Self {
		self.method_calls.push(MethodCall::new(method, arguments));
		self
	}

	/// Appends a method call in place.
	pub fn add_method_call(
		&mut self,
		method: impl Into<String>,
		arguments: Vec<Value>,
	) -> &mut Self {
		self.method_calls.push(MethodCall::new(method, arguments));
		self
	}

	/// The ordered method calls.
	pub fn method_calls(&self) -> &[MethodCall] {
		&self.method_calls
	}

	/// Attaches an annotation under a tag (builder style).
	pub fn with_annotation(mut self, tag: impl Into<String>, attributes: Annotation) -> Self {
		self.annotations.entry(tag.into()).or_default().push(attributes);
		self
	}

	/// Attaches an annotation under a tag in place.
	pub fn add_annotation(&mut self, tag: impl Into<String>, attributes: Annotation) -> &mut Self {
		self.annotations.entry(tag.into()).or_default().push(attributes);
		self
	}

	/// The annotations declared under a tag, if any.
	pub fn annotation(&self, tag: &str) -> Option<&[Annotation]> {
		self.annotations.get(tag).map(Vec::as_slice)
	}

	/// All annotations, keyed by tag name.
	pub fn annotations(&self) -> &IndexMap<String, Vec<Annotation>> {
		&self.annotations
	}

	/// Declares a factory method used instead of the constructor.
	///
	/// With a factory service set, the method is invoked on that service;
	/// otherwise it names a static method on the declared class.
	pub fn with_factory_method(mut self, method: impl Into<String>) -> Self {
		self.factory_method = Some(method.into());
		self
	}

	/// The factory method name, if any.
	pub fn factory_method(&self) -> Option<&str> {
		self.factory_method.as_deref()
	}

	/// Declares the service whose method acts as the factory.
	pub fn with_factory_service(mut self, id: impl Into<String>) -> Self {
		self.factory_service = Some(id.into());
		self
	}

	/// The factory service identifier, if any.
	pub fn factory_service(&self) -> Option<&str> {
		self.factory_service.as_deref()
	}

	/// Declares a configurator callable.
	pub fn with_configurator(mut self, configurator: Configurator) -> Self {
		self.configurator = Some(configurator);
		self
	}

	/// The configurator, if any.
	pub fn configurator(&self) -> Option<&Configurator> {
		self.configurator.as_ref()
	}

	/// Sets whether the service is a shared singleton (the default) or
	/// rebuilt on every retrieval.
	pub fn with_shared(mut self, shared: bool) -> Self {
		self.shared = shared;
		self
	}

	/// True when the service is a shared singleton.
	pub fn is_shared(&self) -> bool {
		self.shared
	}

	/// Declares a file to load exactly once before instantiation.
	///
	/// The path may contain parameter placeholders.
	pub fn with_file(mut self, file: impl Into<String>) -> Self {
		self.file = Some(file.into());
		self
	}

	/// The declared file, if any.
	pub fn file(&self) -> Option<&str> {
		self.file.as_deref()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::reference::Reference;

	#[test]
	fn defaults_are_shared_and_empty() {
		let definition = Definition::default();
		assert!(definition.is_shared());
		assert!(definition.class().is_none());
		assert!(definition.arguments().is_empty());
		assert!(definition.method_calls().is_empty());
	}

	#[test]
	fn annotations_accumulate_per_tag() {
		let mut attributes = Annotation::new();
		attributes.insert("priority".to_string(), Value::Int(10));

		let definition = Definition::new("Listener")
			.with_annotation("event.listener", attributes.clone())
			.with_annotation("event.listener", Annotation::new());

		assert_eq!(definition.annotation("event.listener").unwrap().len(), 2);
		assert_eq!(
			definition.annotation("event.listener").unwrap()[0],
			attributes
		);
		assert!(definition.annotation("other").is_none());
	}

	#[test]
	fn equality_is_by_value() {
		let a = Definition::new("X").with_argument(1i64);
		let b = Definition::new("X").with_argument(1i64);
		let c = Definition::new("X").with_argument(2i64);
		assert_eq!(a, b);
		assert_ne!(a, c);
	}

	#[test]
	fn serde_round_trip() {
		let definition = Definition::new("App::Mailer")
			.with_argument("%mailer.transport%")
			.with_argument(Reference::new("logger"))
			.with_method_call("set_host", vec![Value::from("smtp.local")])
			.with_factory_method("create")
			.with_factory_service("mailer.factory")
			.with_configurator(Configurator::Service {
				id: "mailer.configurator".to_string(),
				method: "configure".to_string(),
			})
			.with_shared(false)
			.with_file("%app.dir%/mailer_setup.rs");

		let json = serde_json::to_string(&definition).unwrap();
		let back: Definition = serde_json::from_str(&json).unwrap();
		assert_eq!(definition, back);
	}
}
