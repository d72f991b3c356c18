//! Dynamic values flowing through parameters and definitions.
//!
//! A [`Value`] is the single value type the container moves around: parameter
//! values, definition arguments, method-call arguments, and resolved services
//! are all `Value`s. Strings may carry `%name%` placeholders, a
//! [`Reference`](crate::Reference) stands in for a service until resolution,
//! and [`Value::Service`] carries a live instance after resolution.

use crate::reference::Reference;
use indexmap::IndexMap;
use parking_lot::{
	MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A boxed service object, as produced by host-registered constructors.
pub type BoxedInstance = Box<dyn Any + Send + Sync>;

/// Shared handle to a resolved service instance.
pub type ServiceHandle = Arc<ServiceCell>;

/// A resolved service instance paired with its class name.
///
/// The class name travels with the instance so that method calls, factories,
/// and configurators can locate the class's closure table in the
/// [`ClassRegistry`](crate::ClassRegistry) without runtime type introspection.
///
/// # Examples
///
/// ```
/// use grappelli::ServiceCell;
///
/// struct Config {
///     debug: bool,
/// }
///
/// let handle = ServiceCell::new("Config", Box::new(Config { debug: true }));
/// assert_eq!(handle.class(), "Config");
/// assert!(handle.downcast_read::<Config>().unwrap().debug);
/// ```
pub struct ServiceCell {
	class: String,
	object: RwLock<BoxedInstance>,
}

impl ServiceCell {
	/// Wraps a boxed instance into a shared handle.
	pub fn new(class: impl Into<String>, object: BoxedInstance) -> ServiceHandle {
		Arc::new(Self {
			class: class.into(),
			object: RwLock::new(object),
		})
	}

	/// The resolved class name this instance was built as.
	pub fn class(&self) -> &str {
		&self.class
	}

	/// Locks the instance for reading.
	pub fn read(&self) -> RwLockReadGuard<'_, BoxedInstance> {
		self.object.read()
	}

	/// Locks the instance for writing.
	pub fn write(&self) -> RwLockWriteGuard<'_, BoxedInstance> {
		self.object.write()
	}

	/// Locks and downcasts the instance to a concrete type.
	///
	/// Returns `None` when the instance is not a `T`.
	pub fn downcast_read<T: Any>(&self) -> Option<MappedRwLockReadGuard<'_, T>> {
		RwLockReadGuard::try_map(self.object.read(), |object| {
			object.as_ref().downcast_ref::<T>()
		})
		.ok()
	}

	/// Locks and downcasts the instance mutably.
	pub fn downcast_write<T: Any>(&self) -> Option<MappedRwLockWriteGuard<'_, T>> {
		RwLockWriteGuard::try_map(self.object.write(), |object| {
			object.as_mut().downcast_mut::<T>()
		})
		.ok()
	}
}

impl fmt::Debug for ServiceCell {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ServiceCell")
			.field("class", &self.class)
			.finish_non_exhaustive()
	}
}

/// A dynamic container value.
///
/// Scalars, sequences, and mappings describe configuration data; strings may
/// embed `%name%` parameter placeholders; [`Value::Reference`] is replaced by
/// the referenced service during resolution and becomes [`Value::Service`].
///
/// Every variant except `Service` serializes with `serde`; a resolved service
/// is a live object and cannot be serialized.
///
/// # Examples
///
/// ```
/// use grappelli::{Reference, Value};
///
/// let args = vec![
///     Value::from("%db.dsn%"),
///     Value::from(5i64),
///     Value::from(Reference::new("logger")),
/// ];
/// assert_eq!(args[1].as_int(), Some(5));
/// ```
#[derive(Clone, Default, Serialize, Deserialize)]
pub enum Value {
	/// Absent value; also the result of a missing reference under the
	/// null-if-missing policy.
	#[default]
	Null,
	/// Boolean scalar.
	Bool(bool),
	/// Integer scalar.
	Int(i64),
	/// Floating-point scalar.
	Float(f64),
	/// String scalar, possibly containing `%name%` placeholders.
	String(String),
	/// Ordered sequence, resolved element-wise.
	Sequence(Vec<Value>),
	/// Ordered mapping, resolved value-wise.
	Map(IndexMap<String, Value>),
	/// Placeholder for "inject the service with this identifier here".
	Reference(Reference),
	/// A resolved, live service instance.
	#[serde(skip)]
	Service(ServiceHandle),
}

impl Value {
	/// Wraps a concrete object into a resolved service value.
	///
	/// This is what factory methods registered on the
	/// [`ClassRegistry`](crate::ClassRegistry) return.
	pub fn service<T: Any + Send + Sync>(class: impl Into<String>, value: T) -> Self {
		Value::Service(ServiceCell::new(class, Box::new(value)))
	}

	/// True for [`Value::Null`].
	pub fn is_null(&self) -> bool {
		matches!(self, Value::Null)
	}

	/// The boolean payload, if this is a `Bool`.
	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Value::Bool(b) => Some(*b),
			_ => None,
		}
	}

	/// The integer payload, if this is an `Int`.
	pub fn as_int(&self) -> Option<i64> {
		match self {
			Value::Int(i) => Some(*i),
			_ => None,
		}
	}

	/// The float payload, if this is a `Float`.
	pub fn as_float(&self) -> Option<f64> {
		match self {
			Value::Float(f) => Some(*f),
			_ => None,
		}
	}

	/// The string payload, if this is a `String`.
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::String(s) => Some(s),
			_ => None,
		}
	}

	/// The elements, if this is a `Sequence`.
	pub fn as_sequence(&self) -> Option<&[Value]> {
		match self {
			Value::Sequence(items) => Some(items),
			_ => None,
		}
	}

	/// The entries, if this is a `Map`.
	pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
		match self {
			Value::Map(map) => Some(map),
			_ => None,
		}
	}

	/// The reference, if this is an unresolved `Reference`.
	pub fn as_reference(&self) -> Option<&Reference> {
		match self {
			Value::Reference(r) => Some(r),
			_ => None,
		}
	}

	/// The service handle, if this is a resolved `Service`.
	pub fn as_service(&self) -> Option<&ServiceHandle> {
		match self {
			Value::Service(handle) => Some(handle),
			_ => None,
		}
	}
}

impl fmt::Debug for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Value::Null => f.write_str("Null"),
			Value::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
			Value::Int(i) => f.debug_tuple("Int").field(i).finish(),
			Value::Float(x) => f.debug_tuple("Float").field(x).finish(),
			Value::String(s) => f.debug_tuple("String").field(s).finish(),
			Value::Sequence(items) => f.debug_tuple("Sequence").field(items).finish(),
			Value::Map(map) => f.debug_tuple("Map").field(map).finish(),
			Value::Reference(r) => f.debug_tuple("Reference").field(r).finish(),
			Value::Service(cell) => f.debug_tuple("Service").field(&cell.class()).finish(),
		}
	}
}

impl PartialEq for Value {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Value::Null, Value::Null) => true,
			(Value::Bool(a), Value::Bool(b)) => a == b,
			(Value::Int(a), Value::Int(b)) => a == b,
			(Value::Float(a), Value::Float(b)) => a == b,
			(Value::String(a), Value::String(b)) => a == b,
			(Value::Sequence(a), Value::Sequence(b)) => a == b,
			(Value::Map(a), Value::Map(b)) => a == b,
			(Value::Reference(a), Value::Reference(b)) => a == b,
			// Services compare by identity, not contents.
			(Value::Service(a), Value::Service(b)) => Arc::ptr_eq(a, b),
			_ => false,
		}
	}
}

impl From<bool> for Value {
	fn from(value: bool) -> Self {
		Value::Bool(value)
	}
}

impl From<i64> for Value {
	fn from(value: i64) -> Self {
		Value::Int(value)
	}
}

impl From<i32> for Value {
	fn from(value: i32) -> Self {
		Value::Int(i64::from(value))
	}
}

impl From<f64> for Value {
	fn from(value: f64) -> Self {
		Value::Float(value)
	}
}

impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Value::String(value.to_string())
	}
}

impl From<String> for Value {
	fn from(value: String) -> Self {
		Value::String(value)
	}
}

impl From<Vec<Value>> for Value {
	fn from(value: Vec<Value>) -> Self {
		Value::Sequence(value)
	}
}

impl From<IndexMap<String, Value>> for Value {
	fn from(value: IndexMap<String, Value>) -> Self {
		Value::Map(value)
	}
}

impl From<Reference> for Value {
	fn from(value: Reference) -> Self {
		Value::Reference(value)
	}
}

impl From<ServiceHandle> for Value {
	fn from(value: ServiceHandle) -> Self {
		Value::Service(value)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn conversions_produce_expected_variants() {
		assert_eq!(Value::from(true), Value::Bool(true));
		assert_eq!(Value::from(7i64), Value::Int(7));
		assert_eq!(Value::from(7i32), Value::Int(7));
		assert_eq!(Value::from("x"), Value::String("x".to_string()));
		assert_eq!(
			Value::from(vec![Value::Null]),
			Value::Sequence(vec![Value::Null])
		);
	}

	#[test]
	fn default_is_null() {
		assert!(Value::default().is_null());
	}

	#[test]
	fn services_compare_by_identity() {
		let a = Value::service("Config", 1u8);
		let b = a.clone();
		let c = Value::service("Config", 1u8);
		assert_eq!(a, b);
		assert_ne!(a, c);
	}

	#[test]
	fn downcast_read_and_write() {
		struct Counter {
			n: u32,
		}

		let handle = ServiceCell::new("Counter", Box::new(Counter { n: 1 }));
		handle.downcast_write::<Counter>().unwrap().n += 1;
		assert_eq!(handle.downcast_read::<Counter>().unwrap().n, 2);
		assert!(handle.downcast_read::<String>().is_none());
	}

	#[test]
	fn serde_round_trip_skips_nothing_descriptive() {
		let mut map = IndexMap::new();
		map.insert("host".to_string(), Value::from("localhost"));
		let value = Value::Sequence(vec![
			Value::Null,
			Value::from(3i64),
			Value::Map(map),
			Value::from(Reference::new("db")),
		]);

		let json = serde_json::to_string(&value).unwrap();
		let back: Value = serde_json::from_str(&json).unwrap();
		assert_eq!(value, back);
	}

	#[test]
	fn serializing_a_resolved_service_fails() {
		let value = Value::service("Config", 1u8);
		assert!(serde_json::to_string(&value).is_err());
	}
}
