//! The container builder: lazy service instantiation over declarative
//! definitions.
//!
//! A [`ContainerBuilder`] runs through two phases. While **building**,
//! definitions, aliases, and parameters are mutable and extensions may load
//! configuration into their own sub-containers. [`freeze`] merges the
//! pending sub-containers, finalizes parameter resolution, and makes the
//! configuration immutable; the transition is one-way. Services are built
//! lazily on first [`get`], depth-first and eagerly: constructor arguments
//! resolve before instantiation, shared instances are cached before method
//! calls run, and the configurator runs last.
//!
//! Re-entrancy during a build is guarded by a per-identifier loading set,
//! released through an RAII guard on success and error paths alike. A
//! constructor-argument cycle is an error; a cycle resolved through
//! post-construction method injection is not, because the partially-built
//! shared instance is already cached when the method call resolves its
//! arguments.
//!
//! [`freeze`]: ContainerBuilder::freeze
//! [`get`]: ContainerBuilder::get

use crate::container::Container;
use crate::definition::{Annotation, Configurator, Definition};
use crate::error::{DiError, DiResult};
use crate::extension::{Extension, ExtensionRegistry};
use crate::parameter_bag::ParameterBag;
use crate::reference::InvalidBehavior;
use crate::registry::ClassRegistry;
use crate::resource::Resource;
use crate::value::{BoxedInstance, ServiceCell, ServiceHandle, Value};
use indexmap::map::Entry;
use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Host hook invoked once per distinct file declared by a definition.
pub type FileLoader = Box<dyn Fn(&Path) -> DiResult<()> + Send + Sync>;

/// A DI container that provides an API to describe services and builds the
/// described object graph on demand.
pub struct ContainerBuilder {
	container: Container,
	definitions: IndexMap<String, Definition>,
	aliases: IndexMap<String, String>,
	loading: Mutex<HashSet<String>>,
	resources: IndexSet<Resource>,
	extensions: ExtensionRegistry,
	extension_containers: IndexMap<String, ContainerBuilder>,
	class_registry: Arc<ClassRegistry>,
	file_loader: Option<FileLoader>,
	loaded_files: Mutex<HashSet<PathBuf>>,
}

impl ContainerBuilder {
	/// Creates an empty builder over a class registry.
	pub fn new(class_registry: Arc<ClassRegistry>) -> Self {
		Self {
			container: Container::new(),
			definitions: IndexMap::new(),
			aliases: IndexMap::new(),
			loading: Mutex::new(HashSet::new()),
			resources: IndexSet::new(),
			extensions: ExtensionRegistry::new(),
			extension_containers: IndexMap::new(),
			class_registry,
			file_loader: None,
			loaded_files: Mutex::new(HashSet::new()),
		}
	}

	/// Creates a builder seeded with parameters.
	///
	/// Seeded parameters win over anything later merged in, including
	/// extension contributions.
	pub fn with_parameters(
		class_registry: Arc<ClassRegistry>,
		parameters: IndexMap<String, Value>,
	) -> DiResult<Self> {
		let mut builder = Self::new(class_registry);
		builder.container.parameter_bag_mut().add(parameters)?;
		Ok(builder)
	}

	/// The class registry this builder instantiates through.
	pub fn class_registry(&self) -> &Arc<ClassRegistry> {
		&self.class_registry
	}

	/// Installs the hook called once per distinct declared file.
	pub fn set_file_loader(&mut self, loader: FileLoader) {
		self.file_loader = Some(loader);
	}

	// ---- definitions and aliases ----

	/// Registers a service definition, removing any alias under the same id.
	pub fn set_definition(&mut self, id: &str, definition: Definition) -> DiResult<()> {
		self.ensure_mutable("register a definition")?;
		self.aliases.shift_remove(id);
		self.definitions.insert(id.to_string(), definition);
		Ok(())
	}

	/// Registers a definition for a class and returns it for fluent setup.
	///
	/// # Examples
	///
	/// ```
	/// use grappelli::{ClassRegistry, ContainerBuilder};
	/// use std::sync::Arc;
	///
	/// let mut builder = ContainerBuilder::new(Arc::new(ClassRegistry::new()));
	/// builder
	///     .register("mailer", "App::Mailer")
	///     .unwrap()
	///     .add_argument("%mailer.transport%");
	/// assert!(builder.has_definition("mailer"));
	/// ```
	pub fn register(&mut self, id: &str, class: &str) -> DiResult<&mut Definition> {
		self.ensure_mutable("register a definition")?;
		self.aliases.shift_remove(id);
		match self.definitions.entry(id.to_string()) {
			Entry::Occupied(entry) => {
				let slot = entry.into_mut();
				*slot = Definition::new(class);
				Ok(slot)
			}
			Entry::Vacant(entry) => Ok(entry.insert(Definition::new(class))),
		}
	}

	/// Registers definitions in bulk.
	pub fn add_definitions(
		&mut self,
		definitions: impl IntoIterator<Item = (String, Definition)>,
	) -> DiResult<()> {
		for (id, definition) in definitions {
			self.set_definition(&id, definition)?;
		}
		Ok(())
	}

	/// True when a definition exists under the id.
	pub fn has_definition(&self, id: &str) -> bool {
		self.definitions.contains_key(id)
	}

	/// Returns the definition registered under the id.
	pub fn get_definition(&self, id: &str) -> DiResult<&Definition> {
		self.definitions
			.get(id)
			.ok_or_else(|| DiError::DefinitionNotFound(id.to_string()))
	}

	/// Returns the definition mutably.
	pub fn get_definition_mut(&mut self, id: &str) -> DiResult<&mut Definition> {
		self.definitions
			.get_mut(id)
			.ok_or_else(|| DiError::DefinitionNotFound(id.to_string()))
	}

	/// Removes a definition, returning it.
	pub fn remove_definition(&mut self, id: &str) -> DiResult<Option<Definition>> {
		self.ensure_mutable("remove a definition")?;
		Ok(self.definitions.shift_remove(id))
	}

	/// All registered definitions.
	pub fn definitions(&self) -> &IndexMap<String, Definition> {
		&self.definitions
	}

	/// Resolves an id through the alias chain to its definition.
	pub fn find_definition(&self, id: &str) -> DiResult<&Definition> {
		let target = self.resolve_alias_target(id)?;
		self.definitions
			.get(&target)
			.ok_or(DiError::DefinitionNotFound(target))
	}

	/// Registers an alias, removing any definition under the same id.
	pub fn set_alias(&mut self, alias: &str, id: &str) -> DiResult<()> {
		self.ensure_mutable("register an alias")?;
		self.definitions.shift_remove(alias);
		self.aliases.insert(alias.to_string(), id.to_string());
		Ok(())
	}

	/// Registers aliases in bulk.
	pub fn add_aliases(
		&mut self,
		aliases: impl IntoIterator<Item = (String, String)>,
	) -> DiResult<()> {
		for (alias, id) in aliases {
			self.set_alias(&alias, &id)?;
		}
		Ok(())
	}

	/// True when an alias exists under the id.
	pub fn has_alias(&self, id: &str) -> bool {
		self.aliases.contains_key(id)
	}

	/// Returns the identifier an alias points at.
	pub fn get_alias(&self, id: &str) -> DiResult<&str> {
		self.aliases
			.get(id)
			.map(String::as_str)
			.ok_or_else(|| DiError::AliasNotFound(id.to_string()))
	}

	/// All registered aliases.
	pub fn aliases(&self) -> &IndexMap<String, String> {
		&self.aliases
	}

	// ---- services ----

	/// Stores a pre-built shared instance, overriding any definition or
	/// alias under the same id.
	pub fn set(&mut self, id: &str, class: &str, instance: BoxedInstance) -> DiResult<ServiceHandle> {
		self.ensure_mutable("set a service")?;
		self.definitions.shift_remove(id);
		self.aliases.shift_remove(id);
		self.container.set(id, class, instance)
	}

	/// True when the id resolves to a definition, alias, or cached instance.
	pub fn has(&self, id: &str) -> bool {
		self.definitions.contains_key(id)
			|| self.aliases.contains_key(id)
			|| self.container.has(id)
	}

	/// Retrieves a service, building it on first use.
	pub fn get(&self, id: &str) -> DiResult<ServiceHandle> {
		match self.get_with(id, InvalidBehavior::Fail)? {
			Some(handle) => Ok(handle),
			None => Err(DiError::ServiceNotFound(id.to_string())),
		}
	}

	/// Retrieves a service under an explicit invalid-reference policy.
	///
	/// Lookup order: cached shared instance, alias chain, then definition.
	/// A missing id yields `None` under [`InvalidBehavior::ReturnNull`];
	/// [`InvalidBehavior::Ignore`] has no distinct meaning for a top-level
	/// retrieval and fails like [`InvalidBehavior::Fail`].
	pub fn get_with(
		&self,
		id: &str,
		behavior: InvalidBehavior,
	) -> DiResult<Option<ServiceHandle>> {
		if let Some(handle) = self.container.cached(id) {
			return Ok(Some(handle));
		}

		let target = self.resolve_alias_target(id)?;
		if target != id {
			if let Some(handle) = self.container.cached(&target) {
				return Ok(Some(handle));
			}
		}

		let Some(definition) = self.definitions.get(&target) else {
			return match behavior {
				InvalidBehavior::ReturnNull => Ok(None),
				InvalidBehavior::Fail | InvalidBehavior::Ignore => {
					Err(DiError::ServiceNotFound(id.to_string()))
				}
			};
		};

		{
			let mut loading = self.loading.lock();
			if !loading.insert(target.clone()) {
				return Err(DiError::CircularService(target));
			}
		}
		let _guard = LoadingGuard {
			loading: &self.loading,
			id: target.clone(),
		};

		debug!(service = %target, "building service");
		self.create_service(&target, definition).map(Some)
	}

	/// Identifiers of everything the builder knows: definitions, aliases,
	/// and cached instances.
	pub fn service_ids(&self) -> Vec<String> {
		let mut ids: IndexSet<String> = self.definitions.keys().cloned().collect();
		ids.extend(self.aliases.keys().cloned());
		ids.extend(self.container.service_ids());
		ids.into_iter().collect()
	}

	/// Replaces service references inside a value with live instances.
	///
	/// Sequences and mappings are walked recursively. A missing target
	/// resolves to [`Value::Null`] under the null and ignore policies.
	pub fn resolve_services(&self, value: &Value) -> DiResult<Value> {
		match value {
			Value::Reference(reference) => {
				let behavior = match reference.invalid_behavior() {
					InvalidBehavior::Fail => InvalidBehavior::Fail,
					InvalidBehavior::ReturnNull | InvalidBehavior::Ignore => {
						InvalidBehavior::ReturnNull
					}
				};
				Ok(self
					.get_with(reference.id(), behavior)?
					.map(Value::Service)
					.unwrap_or(Value::Null))
			}
			Value::Sequence(items) => items
				.iter()
				.map(|item| self.resolve_services(item))
				.collect::<DiResult<Vec<_>>>()
				.map(Value::Sequence),
			Value::Map(map) => {
				let mut resolved = IndexMap::with_capacity(map.len());
				for (key, item) in map {
					resolved.insert(key.clone(), self.resolve_services(item)?);
				}
				Ok(Value::Map(resolved))
			}
			other => Ok(other.clone()),
		}
	}

	/// Collects the ids referenced under the ignore-if-missing policy.
	///
	/// A method call is skipped in its entirety when any of these ids is
	/// absent at call time.
	pub fn service_conditionals(arguments: &[Value]) -> Vec<String> {
		let mut ids = IndexSet::new();
		for argument in arguments {
			collect_conditionals(argument, &mut ids);
		}
		ids.into_iter().collect()
	}

	// ---- parameters ----

	/// Sets a parameter.
	pub fn set_parameter(&mut self, name: &str, value: Value) -> DiResult<()> {
		self.container.set_parameter(name, value)
	}

	/// Returns the raw value of a parameter.
	pub fn get_parameter(&self, name: &str) -> DiResult<&Value> {
		self.container.get_parameter(name)
	}

	/// True when the parameter exists.
	pub fn has_parameter(&self, name: &str) -> bool {
		self.container.has_parameter(name)
	}

	/// The parameter bag.
	pub fn parameter_bag(&self) -> &ParameterBag {
		self.container.parameter_bag()
	}

	/// The parameter bag, mutably.
	pub fn parameter_bag_mut(&mut self) -> &mut ParameterBag {
		self.container.parameter_bag_mut()
	}

	// ---- resources ----

	/// Records a configuration resource; duplicates are collapsed.
	pub fn add_resource(&mut self, resource: Resource) {
		self.resources.insert(resource);
	}

	/// All recorded resources, in first-seen order.
	pub fn resources(&self) -> &IndexSet<Resource> {
		&self.resources
	}

	// ---- extensions ----

	/// Registers an extension under its alias and namespace.
	pub fn register_extension(&mut self, extension: Arc<dyn Extension>) {
		self.extensions.register(extension);
	}

	/// Looks an extension up by alias or namespace.
	pub fn get_extension(&self, name: &str) -> DiResult<Arc<dyn Extension>> {
		self.extensions.get(name)
	}

	/// True when an extension is registered under the name.
	pub fn has_extension(&self, name: &str) -> bool {
		self.extensions.contains(name)
	}

	/// Loads one tag of raw configuration through a registered extension.
	///
	/// The extension populates a dedicated sub-container (created lazily,
	/// one per namespace) rather than this builder; the sub-containers are
	/// merged in at freeze time. The extension's identity is recorded as a
	/// resource so configuration caches can detect extension changes.
	pub fn load_from_extension(&mut self, name: &str, tag: &str, config: &Value) -> DiResult<()> {
		self.ensure_mutable("load an extension")?;
		let extension = self.extensions.get(name)?;
		let namespace = extension.alias().to_string();

		self.add_resource(Resource::code(format!("extension:{}", extension.namespace())));

		debug!(extension = %namespace, tag = %tag, "loading extension configuration");
		let class_registry = Arc::clone(&self.class_registry);
		let sub = self
			.extension_containers
			.entry(namespace)
			.or_insert_with(|| ContainerBuilder::new(class_registry));
		extension.load(tag, config, sub)
	}

	/// The pending per-namespace extension sub-containers.
	pub fn extension_containers(&self) -> &IndexMap<String, ContainerBuilder> {
		&self.extension_containers
	}

	// ---- merging and freezing ----

	/// Merges another builder's configuration into this one.
	///
	/// Definitions and aliases from `other` override entries under the same
	/// id here; parameters keep this builder's values where names collide.
	/// The asymmetry is deliberate: it protects caller-supplied parameter
	/// overrides without letting them block merged-in services. Resources
	/// are unioned and extension sub-containers merge recursively by
	/// namespace.
	pub fn merge(&mut self, other: ContainerBuilder) -> DiResult<()> {
		self.ensure_mutable("merge")?;
		let ContainerBuilder {
			container,
			definitions,
			aliases,
			resources,
			extensions,
			extension_containers,
			..
		} = other;

		for (id, definition) in definitions {
			self.set_definition(&id, definition)?;
		}
		for (alias, target) in aliases {
			self.set_alias(&alias, &target)?;
		}

		for (name, value) in container.parameter_bag().all() {
			if !self.container.has_parameter(name) {
				self.container.set_parameter(name, value.clone())?;
			}
		}

		for resource in resources {
			self.add_resource(resource);
		}
		self.extensions.absorb(extensions);

		for (namespace, sub) in extension_containers {
			match self.extension_containers.entry(namespace) {
				Entry::Occupied(entry) => entry.into_mut().merge(sub)?,
				Entry::Vacant(entry) => {
					entry.insert(sub);
				}
			}
		}
		Ok(())
	}

	/// Freezes the container.
	///
	/// Pending extension sub-containers are merged and cleared, the
	/// pre-merge snapshot of definitions, aliases, and parameters is
	/// re-applied on top (a caller's explicit registrations always win over
	/// extension contributions), and the parameter bag is resolved and
	/// frozen. Idempotent; services remain retrievable afterwards.
	pub fn freeze(&mut self) -> DiResult<()> {
		if self.is_frozen() {
			return Ok(());
		}
		debug!("freezing container");

		let definitions = self.definitions.clone();
		let aliases = self.aliases.clone();
		let parameters = self.container.parameter_bag().all().clone();

		let pending = std::mem::take(&mut self.extension_containers);
		for (_namespace, sub) in pending {
			self.merge(sub)?;
		}

		for (id, definition) in definitions {
			self.set_definition(&id, definition)?;
		}
		for (alias, target) in aliases {
			self.set_alias(&alias, &target)?;
		}
		self.container.parameter_bag_mut().add(parameters)?;

		self.container.freeze()
	}

	/// True after [`freeze`](ContainerBuilder::freeze).
	pub fn is_frozen(&self) -> bool {
		self.container.is_frozen()
	}

	// ---- annotations ----

	/// Maps service id to declared attributes, for every definition
	/// carrying the tag.
	pub fn find_annotated_service_ids(&self, tag: &str) -> IndexMap<String, Vec<Annotation>> {
		let mut found = IndexMap::new();
		for (id, definition) in &self.definitions {
			if let Some(annotations) = definition.annotation(tag) {
				if !annotations.is_empty() {
					found.insert(id.clone(), annotations.to_vec());
				}
			}
		}
		found
	}

	// ---- internals ----

	fn ensure_mutable(&self, action: &'static str) -> DiResult<()> {
		if self.is_frozen() {
			Err(DiError::FrozenContainer(action))
		} else {
			Ok(())
		}
	}

	/// Follows the alias chain to a non-alias identifier.
	fn resolve_alias_target(&self, id: &str) -> DiResult<String> {
		let mut seen = HashSet::new();
		let mut current = id;
		while let Some(next) = self.aliases.get(current) {
			if !seen.insert(current.to_string()) {
				return Err(DiError::CircularAlias(current.to_string()));
			}
			current = next;
		}
		Ok(current.to_string())
	}

	/// Interprets one definition into a live instance.
	fn create_service(&self, id: &str, definition: &Definition) -> DiResult<ServiceHandle> {
		if let Some(file) = definition.file() {
			self.require_file_once(file)?;
		}

		let arguments = self.resolve_arguments(definition.arguments())?;
		let class = self.resolve_class(definition)?;

		let handle = if let Some(factory_method) = definition.factory_method() {
			if let Some(factory_id) = definition.factory_service() {
				let factory_id = self.resolve_string_parameter(factory_id)?;
				let factory = self.get(&factory_id)?;
				match self
					.class_registry
					.invoke(&factory, factory_method, &arguments)?
				{
					Value::Service(handle) => handle,
					_ => return Err(DiError::InvalidFactory(id.to_string())),
				}
			} else {
				let class = class.ok_or_else(|| DiError::MissingClass(id.to_string()))?;
				match self
					.class_registry
					.call_static(&class, factory_method, &arguments)?
				{
					Value::Service(handle) => handle,
					_ => return Err(DiError::InvalidFactory(id.to_string())),
				}
			}
		} else {
			let class = class.ok_or_else(|| DiError::MissingClass(id.to_string()))?;
			let object = self.class_registry.instantiate(&class, &arguments)?;
			ServiceCell::new(class, object)
		};

		// Shared instances are cached before method calls run, so a cycle
		// broken by setter injection can see the partially-built instance.
		if definition.is_shared() {
			self.container.insert_handle(id, handle.clone());
		}

		for call in definition.method_calls() {
			let conditionals = Self::service_conditionals(&call.arguments);
			if let Some(missing) = conditionals.iter().find(|sid| !self.has(sid)) {
				debug!(
					service = %id,
					method = %call.method,
					missing = %missing,
					"skipping method call"
				);
				continue;
			}
			let call_arguments = self.resolve_arguments(&call.arguments)?;
			self.class_registry
				.invoke(&handle, &call.method, &call_arguments)?;
		}

		if let Some(configurator) = definition.configurator() {
			self.run_configurator(id, configurator, &handle)?;
		}

		Ok(handle)
	}

	/// Parameter placeholders first, then service references.
	fn resolve_arguments(&self, arguments: &[Value]) -> DiResult<Vec<Value>> {
		arguments
			.iter()
			.map(|argument| {
				let resolved = self.container.parameter_bag().resolve_value(argument)?;
				self.resolve_services(&resolved)
			})
			.collect()
	}

	fn resolve_class(&self, definition: &Definition) -> DiResult<Option<String>> {
		match definition.class() {
			Some(class) => Ok(Some(self.resolve_string_parameter(class)?)),
			None => Ok(None),
		}
	}

	fn resolve_string_parameter(&self, raw: &str) -> DiResult<String> {
		match self
			.container
			.parameter_bag()
			.resolve_value(&Value::from(raw))?
		{
			Value::String(resolved) => Ok(resolved),
			_ => Err(DiError::instantiation(
				raw,
				"placeholder did not resolve to a string",
			)),
		}
	}

	fn run_configurator(
		&self,
		id: &str,
		configurator: &Configurator,
		handle: &ServiceHandle,
	) -> DiResult<()> {
		match configurator {
			Configurator::Service { id: target, method } => {
				let target_handle = self.get(target)?;
				if !self.class_registry.has_method(target_handle.class(), method) {
					return Err(DiError::InvalidConfigurator(id.to_string()));
				}
				self.class_registry
					.invoke(&target_handle, method, &[Value::Service(handle.clone())])?;
			}
			Configurator::Class { class, method } => {
				let class = self.resolve_string_parameter(class)?;
				if !self.class_registry.has_static(&class, method) {
					return Err(DiError::InvalidConfigurator(id.to_string()));
				}
				self.class_registry
					.call_static(&class, method, &[Value::Service(handle.clone())])?;
			}
		}
		Ok(())
	}

	fn require_file_once(&self, file: &str) -> DiResult<()> {
		let path = PathBuf::from(self.resolve_string_parameter(file)?);
		if self.loaded_files.lock().contains(&path) {
			return Ok(());
		}
		if let Some(loader) = &self.file_loader {
			loader(&path)?;
		}
		self.loaded_files.lock().insert(path);
		Ok(())
	}
}

/// Releases the loading mark for an id when the build finishes, whether it
/// succeeded or failed.
struct LoadingGuard<'a> {
	loading: &'a Mutex<HashSet<String>>,
	id: String,
}

impl Drop for LoadingGuard<'_> {
	fn drop(&mut self) {
		self.loading.lock().remove(&self.id);
	}
}

fn collect_conditionals(value: &Value, ids: &mut IndexSet<String>) {
	match value {
		Value::Reference(reference)
			if reference.invalid_behavior() == InvalidBehavior::Ignore =>
		{
			ids.insert(reference.id().to_string());
		}
		Value::Sequence(items) => {
			for item in items {
				collect_conditionals(item, ids);
			}
		}
		Value::Map(map) => {
			for item in map.values() {
				collect_conditionals(item, ids);
			}
		}
		_ => {}
	}
}
