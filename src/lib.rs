//! A dependency injection container built around declarative service
//! definitions.
//!
//! Services are described as data ([`Definition`]: class name, constructor
//! arguments, post-construction method calls, factory, configurator) and
//! wired together with [`Reference`]s and `%name%` parameter placeholders.
//! The [`ContainerBuilder`] interprets those descriptions lazily: nothing is
//! instantiated until the first [`get`](ContainerBuilder::get), and shared
//! services are built exactly once.
//!
//! Because the container never introspects types at runtime, the host
//! application supplies a [`ClassRegistry`] mapping class names to
//! constructor and method closures. That registry is the only seam between
//! the container's dynamic world of [`Value`]s and the host's concrete
//! types.
//!
//! # Quick Start
//!
//! ```
//! use grappelli::{ClassRegistry, ContainerBuilder, Definition, DiError, Reference, Value};
//! use std::sync::Arc;
//!
//! struct Connection {
//!     dsn: String,
//! }
//!
//! struct Repository {
//!     connection: grappelli::ServiceHandle,
//! }
//!
//! let mut registry = ClassRegistry::new();
//! registry.class("App::Connection").constructor(|args| {
//!     let dsn = args
//!         .first()
//!         .and_then(Value::as_str)
//!         .ok_or_else(|| DiError::instantiation("App::Connection", "expected a dsn"))?
//!         .to_string();
//!     Ok(Box::new(Connection { dsn }))
//! });
//! registry.class("App::Repository").constructor(|args| {
//!     let connection = args
//!         .first()
//!         .and_then(Value::as_service)
//!         .cloned()
//!         .ok_or_else(|| DiError::instantiation("App::Repository", "expected a connection"))?;
//!     Ok(Box::new(Repository { connection }))
//! });
//!
//! let mut builder = ContainerBuilder::new(Arc::new(registry));
//! builder.set_parameter("db.dsn", Value::from("postgres://localhost"))?;
//! builder.set_definition(
//!     "connection",
//!     Definition::new("App::Connection").with_argument("%db.dsn%"),
//! )?;
//! builder.set_definition(
//!     "repository",
//!     Definition::new("App::Repository").with_argument(Reference::new("connection")),
//! )?;
//!
//! let repository = builder.get("repository")?;
//! let connection = builder.get("connection")?;
//! let guard = repository.downcast_read::<Repository>().unwrap();
//! assert!(Arc::ptr_eq(&guard.connection, &connection));
//! assert_eq!(connection.downcast_read::<Connection>().unwrap().dsn, "postgres://localhost");
//! # Ok::<(), DiError>(())
//! ```
//!
//! # Extensions
//!
//! Larger applications split configuration across [`Extension`]s. An
//! extension translates raw configuration into definitions inside its own
//! sub-container; [`ContainerBuilder::freeze`] merges the sub-containers
//! back, with anything registered directly on the builder taking precedence
//! over extension contributions.

pub mod builder;
pub mod container;
pub mod definition;
pub mod error;
pub mod extension;
pub mod parameter_bag;
pub mod reference;
pub mod registry;
pub mod resource;
pub mod value;

pub use builder::{ContainerBuilder, FileLoader};
pub use container::Container;
pub use definition::{Annotation, Configurator, Definition, MethodCall};
pub use error::{DiError, DiResult};
pub use extension::{Extension, ExtensionRegistry};
pub use parameter_bag::ParameterBag;
pub use reference::{InvalidBehavior, Reference};
pub use registry::{ClassRegistry, ClassSpec, ConstructorFn, MethodFn, StaticFn};
pub use resource::Resource;
pub use value::{BoxedInstance, ServiceCell, ServiceHandle, Value};
