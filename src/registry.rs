//! The instantiation seam: host-supplied closure tables per class.
//!
//! The container never introspects types at runtime. Instead the host
//! application registers, once per class, a constructor closure, named
//! instance-method closures, and named static-method closures. The builder
//! drives these tables when it interprets definitions.
//!
//! A method closure receives the live instance and the resolved arguments.
//! Arguments may contain service handles; a method body must not re-lock the
//! instance it is mutating through one of its own arguments (store the
//! handle instead of reading through it), since the instance is locked for
//! writing for the duration of the call.

use crate::error::{DiError, DiResult};
use crate::value::{BoxedInstance, ServiceHandle, Value};
use std::any::Any;
use std::collections::HashMap;

/// Builds an instance from resolved constructor arguments.
pub type ConstructorFn = Box<dyn Fn(&[Value]) -> DiResult<BoxedInstance> + Send + Sync>;

/// A static method on a class: resolved arguments in, value out.
pub type StaticFn = Box<dyn Fn(&[Value]) -> DiResult<Value> + Send + Sync>;

/// An instance method: live instance plus resolved arguments in, value out.
pub type MethodFn =
	Box<dyn Fn(&mut (dyn Any + Send + Sync), &[Value]) -> DiResult<Value> + Send + Sync>;

/// The closure table for one registered class.
#[derive(Default)]
pub struct ClassSpec {
	constructor: Option<ConstructorFn>,
	methods: HashMap<String, MethodFn>,
	statics: HashMap<String, StaticFn>,
}

impl ClassSpec {
	/// Registers the constructor.
	pub fn constructor<F>(&mut self, f: F) -> &mut Self
	where
		F: Fn(&[Value]) -> DiResult<BoxedInstance> + Send + Sync + 'static,
	{
		self.constructor = Some(Box::new(f));
		self
	}

	/// Registers a named instance method.
	pub fn method<F>(&mut self, name: &str, f: F) -> &mut Self
	where
		F: Fn(&mut (dyn Any + Send + Sync), &[Value]) -> DiResult<Value> + Send + Sync + 'static,
	{
		self.methods.insert(name.to_string(), Box::new(f));
		self
	}

	/// Registers a named static method.
	///
	/// Static methods serve as factories (returning a new service via
	/// [`Value::service`]) and as class configurators (receiving the built
	/// instance as their sole argument).
	pub fn static_method<F>(&mut self, name: &str, f: F) -> &mut Self
	where
		F: Fn(&[Value]) -> DiResult<Value> + Send + Sync + 'static,
	{
		self.statics.insert(name.to_string(), Box::new(f));
		self
	}
}

/// Maps class names to their closure tables.
///
/// # Examples
///
/// ```
/// use grappelli::{ClassRegistry, DiError, Value};
///
/// struct Clock {
///     timezone: String,
/// }
///
/// let mut registry = ClassRegistry::new();
/// registry.class("Clock").constructor(|args| {
///     let timezone = args
///         .first()
///         .and_then(Value::as_str)
///         .ok_or_else(|| DiError::instantiation("Clock", "expected a timezone string"))?
///         .to_string();
///     Ok(Box::new(Clock { timezone }))
/// });
///
/// let instance = registry.instantiate("Clock", &[Value::from("UTC")]).unwrap();
/// assert_eq!(instance.downcast_ref::<Clock>().unwrap().timezone, "UTC");
/// ```
#[derive(Default)]
pub struct ClassRegistry {
	classes: HashMap<String, ClassSpec>,
}

impl ClassRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the closure table for a class, creating it on first use.
	pub fn class(&mut self, name: &str) -> &mut ClassSpec {
		self.classes.entry(name.to_string()).or_default()
	}

	/// True when the class has a closure table.
	pub fn contains(&self, class: &str) -> bool {
		self.classes.contains_key(class)
	}

	/// True when the class has the named instance method.
	pub fn has_method(&self, class: &str, method: &str) -> bool {
		self.classes
			.get(class)
			.is_some_and(|spec| spec.methods.contains_key(method))
	}

	/// True when the class has the named static method.
	pub fn has_static(&self, class: &str, method: &str) -> bool {
		self.classes
			.get(class)
			.is_some_and(|spec| spec.statics.contains_key(method))
	}

	/// Builds an instance of a class from resolved constructor arguments.
	pub fn instantiate(&self, class: &str, arguments: &[Value]) -> DiResult<BoxedInstance> {
		let spec = self.spec(class)?;
		let constructor = spec.constructor.as_ref().ok_or_else(|| {
			DiError::instantiation(class, "no constructor registered")
		})?;
		constructor(arguments)
	}

	/// Calls a named static method on a class.
	pub fn call_static(&self, class: &str, method: &str, arguments: &[Value]) -> DiResult<Value> {
		let spec = self.spec(class)?;
		let f = spec.statics.get(method).ok_or_else(|| DiError::MethodNotRegistered {
			class: class.to_string(),
			method: method.to_string(),
		})?;
		f(arguments)
	}

	/// Invokes a named instance method on a resolved service.
	///
	/// The instance is locked for writing for the duration of the call.
	pub fn invoke(
		&self,
		handle: &ServiceHandle,
		method: &str,
		arguments: &[Value],
	) -> DiResult<Value> {
		let spec = self.spec(handle.class())?;
		let f = spec.methods.get(method).ok_or_else(|| DiError::MethodNotRegistered {
			class: handle.class().to_string(),
			method: method.to_string(),
		})?;
		let mut object = handle.write();
		f(object.as_mut(), arguments)
	}

	fn spec(&self, class: &str) -> DiResult<&ClassSpec> {
		self.classes
			.get(class)
			.ok_or_else(|| DiError::ClassNotRegistered(class.to_string()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::value::ServiceCell;

	struct Greeter {
		greeting: String,
	}

	fn registry() -> ClassRegistry {
		let mut registry = ClassRegistry::new();
		registry
			.class("Greeter")
			.constructor(|args| {
				let greeting = args
					.first()
					.and_then(Value::as_str)
					.unwrap_or("hello")
					.to_string();
				Ok(Box::new(Greeter { greeting }))
			})
			.method("set_greeting", |this, args| {
				let greeter = this
					.downcast_mut::<Greeter>()
					.ok_or_else(|| DiError::instantiation("Greeter", "wrong instance type"))?;
				if let Some(greeting) = args.first().and_then(Value::as_str) {
					greeter.greeting = greeting.to_string();
				}
				Ok(Value::Null)
			})
			.static_method("silent", |_args| {
				Ok(Value::service("Greeter", Greeter { greeting: String::new() }))
			});
		registry
	}

	#[test]
	fn instantiate_uses_the_constructor() {
		let instance = registry()
			.instantiate("Greeter", &[Value::from("hi")])
			.unwrap();
		assert_eq!(instance.downcast_ref::<Greeter>().unwrap().greeting, "hi");
	}

	#[test]
	fn unknown_class_fails() {
		let err = registry().instantiate("Nope", &[]).unwrap_err();
		assert!(matches!(err, DiError::ClassNotRegistered(class) if class == "Nope"));
	}

	#[test]
	fn invoke_mutates_the_instance() {
		let registry = registry();
		let handle = ServiceCell::new(
			"Greeter",
			registry.instantiate("Greeter", &[]).unwrap(),
		);
		registry
			.invoke(&handle, "set_greeting", &[Value::from("bonjour")])
			.unwrap();
		assert_eq!(
			handle.downcast_read::<Greeter>().unwrap().greeting,
			"bonjour"
		);
	}

	#[test]
	fn unknown_method_fails() {
		let registry = registry();
		let handle = ServiceCell::new("Greeter", registry.instantiate("Greeter", &[]).unwrap());
		let err = registry.invoke(&handle, "shout", &[]).unwrap_err();
		assert!(matches!(err, DiError::MethodNotRegistered { method, .. } if method == "shout"));
	}

	#[test]
	fn static_methods_can_produce_services() {
		let produced = registry().call_static("Greeter", "silent", &[]).unwrap();
		assert!(produced.as_service().is_some());
	}
}
