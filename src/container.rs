//! The base container: resolved instances plus parameters.

use crate::error::{DiError, DiResult};
use crate::parameter_bag::ParameterBag;
use crate::reference::InvalidBehavior;
use crate::value::{BoxedInstance, ServiceCell, ServiceHandle, Value};
use indexmap::IndexMap;
use parking_lot::RwLock;

/// Holds resolved, shared service instances keyed by identifier, plus the
/// parameter bag.
///
/// This layer owns no dependency-resolution logic; it only serves what has
/// already been built (or registered directly with
/// [`set`](Container::set)). Lazy instantiation lives in
/// [`ContainerBuilder`](crate::ContainerBuilder).
pub struct Container {
	pub(crate) services: RwLock<IndexMap<String, ServiceHandle>>,
	pub(crate) parameter_bag: ParameterBag,
	pub(crate) frozen: bool,
}

impl Default for Container {
	fn default() -> Self {
		Self::new()
	}
}

impl Container {
	/// Creates an empty container.
	pub fn new() -> Self {
		Self {
			services: RwLock::new(IndexMap::new()),
			parameter_bag: ParameterBag::new(),
			frozen: false,
		}
	}

	/// Creates a container seeded with parameters.
	pub fn with_parameters(parameters: IndexMap<String, Value>) -> DiResult<Self> {
		let mut container = Self::new();
		container.parameter_bag.add(parameters)?;
		Ok(container)
	}

	/// Stores a pre-built shared instance under an identifier.
	///
	/// The class name travels with the instance so factories and
	/// configurators can still invoke methods on it. Fails once the
	/// container is frozen.
	pub fn set(
		&mut self,
		id: &str,
		class: &str,
		instance: BoxedInstance,
	) -> DiResult<ServiceHandle> {
		if self.frozen {
			return Err(DiError::FrozenContainer("set a service"));
		}
		let handle = ServiceCell::new(class, instance);
		self.services
			.write()
			.insert(id.to_string(), handle.clone());
		Ok(handle)
	}

	/// Returns the cached shared instance for an identifier.
	///
	/// A missing identifier fails under [`InvalidBehavior::Fail`] and yields
	/// `None` under the null/ignore policies.
	pub fn get(&self, id: &str, behavior: InvalidBehavior) -> DiResult<Option<ServiceHandle>> {
		match self.cached(id) {
			Some(handle) => Ok(Some(handle)),
			None => match behavior {
				InvalidBehavior::Fail => Err(DiError::ServiceNotFound(id.to_string())),
				InvalidBehavior::ReturnNull | InvalidBehavior::Ignore => Ok(None),
			},
		}
	}

	/// True when a shared instance is cached under the identifier.
	pub fn has(&self, id: &str) -> bool {
		self.services.read().contains_key(id)
	}

	/// Identifiers of all cached instances, in registration order.
	pub fn service_ids(&self) -> Vec<String> {
		self.services.read().keys().cloned().collect()
	}

	/// Sets a parameter.
	pub fn set_parameter(&mut self, name: &str, value: Value) -> DiResult<()> {
		self.parameter_bag.set(name, value)
	}

	/// Returns the raw value of a parameter.
	pub fn get_parameter(&self, name: &str) -> DiResult<&Value> {
		self.parameter_bag.get(name)
	}

	/// True when the parameter exists.
	pub fn has_parameter(&self, name: &str) -> bool {
		self.parameter_bag.has(name)
	}

	/// The parameter bag.
	pub fn parameter_bag(&self) -> &ParameterBag {
		&self.parameter_bag
	}

	/// The parameter bag, mutably.
	pub fn parameter_bag_mut(&mut self) -> &mut ParameterBag {
		&mut self.parameter_bag
	}

	/// Freezes the parameter bag and disables further raw registration.
	///
	/// Idempotent. Cached instances remain retrievable.
	pub fn freeze(&mut self) -> DiResult<()> {
		if self.frozen {
			return Ok(());
		}
		self.parameter_bag.freeze()?;
		self.frozen = true;
		Ok(())
	}

	/// True after [`freeze`](Container::freeze).
	pub fn is_frozen(&self) -> bool {
		self.frozen
	}

	pub(crate) fn cached(&self, id: &str) -> Option<ServiceHandle> {
		self.services.read().get(id).cloned()
	}

	/// Caches a handle without the frozen check; used by the builder when a
	/// shared service finishes building after freeze time.
	pub(crate) fn insert_handle(&self, id: &str, handle: ServiceHandle) {
		self.services.write().insert(id.to_string(), handle);
	}
}
