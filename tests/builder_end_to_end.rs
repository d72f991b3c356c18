//! End-to-end behavior of the container builder: lazy instantiation,
//! sharing, references, factories, configurators, and freeze semantics.

use grappelli::{
	ClassRegistry, Configurator, ContainerBuilder, Definition, DiError, InvalidBehavior,
	Reference, Resource, ServiceHandle, Value,
};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;

struct Logger;

struct Connection {
	dsn: String,
	timeout: i64,
	logger: Option<ServiceHandle>,
}

struct Mailer {
	transport: String,
}

struct MailerFactory {
	default_transport: String,
}

struct Holder {
	inner: Option<ServiceHandle>,
}

fn downcast<'a, T: Any>(
	this: &'a mut (dyn Any + Send + Sync),
	class: &str,
) -> Result<&'a mut T, DiError> {
	this.downcast_mut::<T>()
		.ok_or_else(|| DiError::instantiation(class, "wrong instance type"))
}

fn registry() -> ClassRegistry {
	let mut registry = ClassRegistry::new();

	registry
		.class("App::Logger")
		.constructor(|_| Ok(Box::new(Logger)));

	registry
		.class("App::Connection")
		.constructor(|args| {
			let dsn = args
				.first()
				.and_then(Value::as_str)
				.ok_or_else(|| DiError::instantiation("App::Connection", "expected a dsn"))?
				.to_string();
			Ok(Box::new(Connection {
				dsn,
				timeout: 0,
				logger: None,
			}))
		})
		.method("set_timeout", |this, args| {
			let connection = downcast::<Connection>(this, "App::Connection")?;
			connection.timeout = args.first().and_then(Value::as_int).unwrap_or(0);
			Ok(Value::Null)
		})
		.method("set_logger", |this, args| {
			let connection = downcast::<Connection>(this, "App::Connection")?;
			connection.logger = args.first().and_then(Value::as_service).cloned();
			Ok(Value::Null)
		});

	registry
		.class("App::Mailer")
		.constructor(|args| {
			let transport = args
				.first()
				.and_then(Value::as_str)
				.unwrap_or("sendmail")
				.to_string();
			Ok(Box::new(Mailer { transport }))
		})
		.static_method("create", |args| {
			let transport = args
				.first()
				.and_then(Value::as_str)
				.unwrap_or("smtp")
				.to_string();
			Ok(Value::service("App::Mailer", Mailer { transport }))
		})
		.static_method("broken", |_| Ok(Value::Int(42)));

	registry
		.class("App::MailerFactory")
		.constructor(|args| {
			let default_transport = args
				.first()
				.and_then(Value::as_str)
				.unwrap_or("smtp")
				.to_string();
			Ok(Box::new(MailerFactory { default_transport }))
		})
		.method("create", |this, _| {
			let factory = downcast::<MailerFactory>(this, "App::MailerFactory")?;
			Ok(Value::service(
				"App::Mailer",
				Mailer {
					transport: factory.default_transport.clone(),
				},
			))
		});

	registry
		.class("App::Holder")
		.constructor(|args| {
			Ok(Box::new(Holder {
				inner: args.first().and_then(Value::as_service).cloned(),
			}))
		})
		.method("set_inner", |this, args| {
			let holder = downcast::<Holder>(this, "App::Holder")?;
			holder.inner = args.first().and_then(Value::as_service).cloned();
			Ok(Value::Null)
		});

	registry
		.class("App::Tuner")
		.constructor(|_| Ok(Box::new(())))
		.method("configure", |_, args| {
			if let Some(handle) = args.first().and_then(Value::as_service) {
				if let Some(mut connection) = handle.downcast_write::<Connection>() {
					connection.timeout = 99;
				}
			}
			Ok(Value::Null)
		});

	registry.class("App::Setup").static_method("tune", |args| {
		if let Some(handle) = args.first().and_then(Value::as_service) {
			if let Some(mut connection) = handle.downcast_write::<Connection>() {
				connection.timeout = 77;
			}
		}
		Ok(Value::Null)
	});

	registry
}

fn builder() -> ContainerBuilder {
	ContainerBuilder::new(Arc::new(registry()))
}

#[test]
fn builds_a_service_graph_from_definitions() {
	let mut builder = builder();
	builder
		.set_parameter("db.dsn", Value::from("pgsql://localhost"))
		.unwrap();
	builder
		.set_parameter("db.timeout", Value::from(30i64))
		.unwrap();
	builder
		.set_definition("logger", Definition::new("App::Logger"))
		.unwrap();
	builder
		.set_definition(
			"connection",
			Definition::new("App::Connection")
				.with_argument("%db.dsn%")
				.with_method_call("set_timeout", vec![Value::from("%db.timeout%")])
				.with_method_call("set_logger", vec![Reference::new("logger").into()]),
		)
		.unwrap();

	let connection = builder.get("connection").unwrap();
	let logger = builder.get("logger").unwrap();

	let guard = connection.downcast_read::<Connection>().unwrap();
	assert_eq!(guard.dsn, "pgsql://localhost");
	// the lone placeholder keeps the parameter's integer type
	assert_eq!(guard.timeout, 30);
	assert!(Arc::ptr_eq(guard.logger.as_ref().unwrap(), &logger));
}

#[test]
fn shared_services_are_built_once() {
	let mut builder = builder();
	builder
		.set_definition(
			"connection",
			Definition::new("App::Connection").with_argument("dsn"),
		)
		.unwrap();

	let first = builder.get("connection").unwrap();
	let second = builder.get("connection").unwrap();
	assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn non_shared_services_are_rebuilt_per_retrieval() {
	let mut builder = builder();
	builder
		.set_definition(
			"connection",
			Definition::new("App::Connection")
				.with_argument("dsn")
				.with_shared(false),
		)
		.unwrap();

	let first = builder.get("connection").unwrap();
	let second = builder.get("connection").unwrap();
	assert!(!Arc::ptr_eq(&first, &second));
}

#[test]
fn redefining_an_id_replaces_the_previous_definition() {
	let mut builder = builder();
	builder
		.set_definition(
			"connection",
			Definition::new("App::Connection").with_argument("first"),
		)
		.unwrap();
	builder
		.set_definition(
			"connection",
			Definition::new("App::Connection").with_argument("second"),
		)
		.unwrap();

	let connection = builder.get("connection").unwrap();
	assert_eq!(
		connection.downcast_read::<Connection>().unwrap().dsn,
		"second"
	);
}

#[test]
fn definitions_and_aliases_are_mutually_exclusive() {
	let mut builder = builder();
	builder
		.set_definition("mail", Definition::new("App::Mailer"))
		.unwrap();
	builder.set_alias("mail", "other").unwrap();
	assert!(!builder.has_definition("mail"));
	assert!(builder.has_alias("mail"));

	builder
		.set_definition("mail", Definition::new("App::Mailer"))
		.unwrap();
	assert!(builder.has_definition("mail"));
	assert!(!builder.has_alias("mail"));
}

#[test]
fn aliases_resolve_through_chains_to_the_same_instance() {
	let mut builder = builder();
	builder
		.set_definition(
			"connection",
			Definition::new("App::Connection").with_argument("dsn"),
		)
		.unwrap();
	builder.set_alias("db", "connection").unwrap();
	builder.set_alias("database", "db").unwrap();

	let via_alias = builder.get("database").unwrap();
	let direct = builder.get("connection").unwrap();
	assert!(Arc::ptr_eq(&via_alias, &direct));

	assert_eq!(builder.get_alias("db").unwrap(), "connection");
	let definition = builder.find_definition("database").unwrap();
	assert_eq!(definition.class(), Some("App::Connection"));
}

#[test]
fn circular_alias_chains_are_rejected() {
	let mut builder = builder();
	builder.set_alias("a", "b").unwrap();
	builder.set_alias("b", "a").unwrap();
	assert!(matches!(builder.get("a"), Err(DiError::CircularAlias(_))));
	assert!(matches!(
		builder.find_definition("a"),
		Err(DiError::CircularAlias(_))
	));
}

#[test]
fn constructor_cycles_are_detected() {
	let mut builder = builder();
	builder
		.set_definition(
			"a",
			Definition::new("App::Holder").with_argument(Reference::new("b")),
		)
		.unwrap();
	builder
		.set_definition(
			"b",
			Definition::new("App::Holder").with_argument(Reference::new("a")),
		)
		.unwrap();

	assert!(matches!(
		builder.get("a"),
		Err(DiError::CircularService(_))
	));

	// the loading marker is released on failure, other builds still work
	builder
		.set_definition("ok", Definition::new("App::Logger"))
		.unwrap();
	assert!(builder.get("ok").is_ok());
}

#[test]
fn setter_cycles_resolve_against_the_cached_instance() {
	let mut builder = builder();
	builder
		.set_definition(
			"holder",
			Definition::new("App::Holder")
				.with_method_call("set_inner", vec![Reference::new("holder").into()]),
		)
		.unwrap();

	let holder = builder.get("holder").unwrap();
	let guard = holder.downcast_read::<Holder>().unwrap();
	assert!(Arc::ptr_eq(guard.inner.as_ref().unwrap(), &holder));
}

#[test]
fn missing_service_follows_the_behavior() {
	let builder = builder();
	assert!(matches!(
		builder.get("ghost"),
		Err(DiError::ServiceNotFound(id)) if id == "ghost"
	));
	assert!(builder
		.get_with("ghost", InvalidBehavior::ReturnNull)
		.unwrap()
		.is_none());
	// ignore has no distinct meaning at the top level
	assert!(builder
		.get_with("ghost", InvalidBehavior::Ignore)
		.is_err());
}

#[test]
fn null_references_substitute_null_for_missing_services() {
	let mut builder = builder();
	builder
		.set_definition(
			"holder",
			Definition::new("App::Holder").with_argument(
				Reference::new("ghost").with_behavior(InvalidBehavior::ReturnNull),
			),
		)
		.unwrap();

	let holder = builder.get("holder").unwrap();
	assert!(holder.downcast_read::<Holder>().unwrap().inner.is_none());
}

#[test]
fn ignored_references_skip_the_whole_method_call() {
	let mut builder = builder();
	builder
		.set_definition(
			"connection",
			Definition::new("App::Connection")
				.with_argument("dsn")
				.with_method_call(
					"set_timeout",
					vec![
						Value::from(5i64),
						Reference::new("profiler")
							.with_behavior(InvalidBehavior::Ignore)
							.into(),
					],
				),
		)
		.unwrap();

	// "profiler" does not exist: the call never runs
	let connection = builder.get("connection").unwrap();
	assert_eq!(connection.downcast_read::<Connection>().unwrap().timeout, 0);

	// with the target present the call runs normally
	let mut with_profiler = ContainerBuilder::new(Arc::new(registry()));
	with_profiler
		.set_definition("profiler", Definition::new("App::Logger"))
		.unwrap();
	with_profiler
		.set_definition(
			"connection",
			Definition::new("App::Connection")
				.with_argument("dsn")
				.with_method_call(
					"set_timeout",
					vec![
						Value::from(5i64),
						Reference::new("profiler")
							.with_behavior(InvalidBehavior::Ignore)
							.into(),
					],
				),
		)
		.unwrap();
	let connection = with_profiler.get("connection").unwrap();
	assert_eq!(connection.downcast_read::<Connection>().unwrap().timeout, 5);
}

#[test]
fn static_factories_produce_the_service() {
	let mut builder = builder();
	builder
		.set_definition(
			"mailer",
			Definition::new("App::Mailer")
				.with_factory_method("create")
				.with_argument("ses"),
		)
		.unwrap();

	let mailer = builder.get("mailer").unwrap();
	assert_eq!(mailer.class(), "App::Mailer");
	assert_eq!(mailer.downcast_read::<Mailer>().unwrap().transport, "ses");
}

#[test]
fn factory_services_produce_the_service() {
	let mut builder = builder();
	builder
		.set_definition(
			"mailer.factory",
			Definition::new("App::MailerFactory").with_argument("imap"),
		)
		.unwrap();
	builder
		.set_definition(
			"mailer",
			Definition::default()
				.with_factory_service("mailer.factory")
				.with_factory_method("create"),
		)
		.unwrap();

	let mailer = builder.get("mailer").unwrap();
	assert_eq!(mailer.downcast_read::<Mailer>().unwrap().transport, "imap");
	// building the product built (and cached) the factory itself
	assert!(builder.has("mailer.factory"));
}

#[test]
fn a_factory_that_returns_no_service_is_invalid() {
	let mut builder = builder();
	builder
		.set_definition(
			"mailer",
			Definition::new("App::Mailer").with_factory_method("broken"),
		)
		.unwrap();
	assert!(matches!(
		builder.get("mailer"),
		Err(DiError::InvalidFactory(id)) if id == "mailer"
	));
}

#[test]
fn a_definition_without_class_or_factory_service_fails() {
	let mut builder = builder();
	builder
		.set_definition("empty", Definition::default())
		.unwrap();
	assert!(matches!(
		builder.get("empty"),
		Err(DiError::MissingClass(id)) if id == "empty"
	));
}

#[test]
fn service_configurators_run_last() {
	let mut builder = builder();
	builder
		.set_definition("tuner", Definition::new("App::Tuner"))
		.unwrap();
	builder
		.set_definition(
			"connection",
			Definition::new("App::Connection")
				.with_argument("dsn")
				.with_method_call("set_timeout", vec![Value::from(5i64)])
				.with_configurator(Configurator::Service {
					id: "tuner".to_string(),
					method: "configure".to_string(),
				}),
		)
		.unwrap();

	let connection = builder.get("connection").unwrap();
	// the configurator overwrote the value the method call had set
	assert_eq!(connection.downcast_read::<Connection>().unwrap().timeout, 99);
}

#[test]
fn class_configurators_run_through_the_static_table() {
	let mut builder = builder();
	builder
		.set_definition(
			"connection",
			Definition::new("App::Connection")
				.with_argument("dsn")
				.with_configurator(Configurator::Class {
					class: "App::Setup".to_string(),
					method: "tune".to_string(),
				}),
		)
		.unwrap();

	let connection = builder.get("connection").unwrap();
	assert_eq!(connection.downcast_read::<Connection>().unwrap().timeout, 77);
}

#[test]
fn a_configurator_without_a_registered_method_is_invalid() {
	let mut builder = builder();
	builder
		.set_definition("tuner", Definition::new("App::Tuner"))
		.unwrap();
	builder
		.set_definition(
			"connection",
			Definition::new("App::Connection")
				.with_argument("dsn")
				.with_configurator(Configurator::Service {
					id: "tuner".to_string(),
					method: "missing".to_string(),
				}),
		)
		.unwrap();
	assert!(matches!(
		builder.get("connection"),
		Err(DiError::InvalidConfigurator(id)) if id == "connection"
	));
}

#[test]
fn declared_files_load_exactly_once() {
	let loaded: Arc<Mutex<Vec<PathBuf>>> = Arc::new(Mutex::new(Vec::new()));
	let seen = Arc::clone(&loaded);

	let mut builder = builder();
	builder.set_file_loader(Box::new(move |path| {
		seen.lock().push(path.to_path_buf());
		Ok(())
	}));
	builder
		.set_parameter("conf.dir", Value::from("/etc/app"))
		.unwrap();
	builder
		.set_definition(
			"a",
			Definition::new("App::Logger").with_file("%conf.dir%/services.conf"),
		)
		.unwrap();
	builder
		.set_definition(
			"b",
			Definition::new("App::Logger").with_file("%conf.dir%/services.conf"),
		)
		.unwrap();

	builder.get("a").unwrap();
	builder.get("b").unwrap();
	builder.get("a").unwrap();

	assert_eq!(
		loaded.lock().as_slice(),
		&[PathBuf::from("/etc/app/services.conf")]
	);
}

#[test]
fn pre_built_instances_override_definitions() {
	let mut builder = builder();
	builder
		.set_definition(
			"connection",
			Definition::new("App::Connection").with_argument("from-definition"),
		)
		.unwrap();
	let stored = builder
		.set(
			"connection",
			"App::Connection",
			Box::new(Connection {
				dsn: "pre-built".to_string(),
				timeout: 0,
				logger: None,
			}),
		)
		.unwrap();

	assert!(!builder.has_definition("connection"));
	let fetched = builder.get("connection").unwrap();
	assert!(Arc::ptr_eq(&stored, &fetched));
	assert_eq!(fetched.downcast_read::<Connection>().unwrap().dsn, "pre-built");
}

#[test]
fn find_annotated_service_ids_groups_by_tag() {
	let mut attributes = IndexMap::new();
	attributes.insert("priority".to_string(), Value::from(10i64));

	let mut builder = builder();
	builder
		.set_definition(
			"listener.a",
			Definition::new("App::Logger").with_annotation("event.listener", attributes.clone()),
		)
		.unwrap();
	builder
		.set_definition(
			"listener.b",
			Definition::new("App::Logger")
				.with_annotation("event.listener", IndexMap::new())
				.with_annotation("event.listener", IndexMap::new()),
		)
		.unwrap();
	builder
		.set_definition("plain", Definition::new("App::Logger"))
		.unwrap();

	let found = builder.find_annotated_service_ids("event.listener");
	assert_eq!(found.len(), 2);
	assert_eq!(found["listener.a"], vec![attributes]);
	assert_eq!(found["listener.b"].len(), 2);
	assert!(builder.find_annotated_service_ids("other").is_empty());
}

#[test]
fn service_ids_cover_definitions_aliases_and_instances() {
	let mut builder = builder();
	builder
		.set_definition("defined", Definition::new("App::Logger"))
		.unwrap();
	builder.set_alias("aliased", "defined").unwrap();
	builder.set("direct", "App::Logger", Box::new(Logger)).unwrap();

	let ids = builder.service_ids();
	assert!(ids.contains(&"defined".to_string()));
	assert!(ids.contains(&"aliased".to_string()));
	assert!(ids.contains(&"direct".to_string()));
	assert!(builder.has("defined"));
	assert!(builder.has("aliased"));
	assert!(builder.has("direct"));
	assert!(!builder.has("ghost"));
}

#[test]
fn frozen_builders_reject_mutation_but_still_serve() {
	let mut builder = builder();
	builder
		.set_definition(
			"connection",
			Definition::new("App::Connection").with_argument("dsn"),
		)
		.unwrap();
	builder.freeze().unwrap();
	assert!(builder.is_frozen());

	assert!(matches!(
		builder.set_definition("late", Definition::new("App::Logger")),
		Err(DiError::FrozenContainer(_))
	));
	assert!(matches!(
		builder.set_alias("late", "connection"),
		Err(DiError::FrozenContainer(_))
	));
	assert!(matches!(
		builder.set_parameter("late", Value::Null),
		Err(DiError::FrozenContainer(_))
	));
	assert!(matches!(
		builder.set("late", "App::Logger", Box::new(Logger)),
		Err(DiError::FrozenContainer(_))
	));
	assert!(matches!(
		builder.remove_definition("connection"),
		Err(DiError::FrozenContainer(_))
	));

	// services still build lazily after the freeze
	let connection = builder.get("connection").unwrap();
	assert_eq!(connection.downcast_read::<Connection>().unwrap().dsn, "dsn");

	// freezing again is a no-op
	builder.freeze().unwrap();
}

#[test]
fn resources_deduplicate() {
	let mut builder = builder();
	builder.add_resource(Resource::file("/etc/app/services.conf"));
	builder.add_resource(Resource::file("/etc/app/services.conf"));
	builder.add_resource(Resource::code("extension:db"));
	assert_eq!(builder.resources().len(), 2);
}
