//! Parameter storage and `%name%` placeholder resolution.

use crate::error::{DiError, DiResult};
use crate::value::Value;
use indexmap::IndexMap;
use std::collections::HashSet;

/// Holds container parameters and resolves placeholders inside values.
///
/// Parameter names are case-insensitive. A string that is exactly one
/// `%name%` placeholder resolves to the parameter's raw typed value; a string
/// with embedded placeholders substitutes their stringified values. `%%`
/// escapes a literal percent sign. Resolution runs recursively through
/// sequences and mappings and fails on cycles.
///
/// The bag is mutable until [`freeze`](ParameterBag::freeze) resolves every
/// stored value in place and makes the bag immutable.
///
/// # Examples
///
/// ```
/// use grappelli::{ParameterBag, Value};
///
/// let mut bag = ParameterBag::new();
/// bag.set("db.host", "localhost".into()).unwrap();
/// bag.set("db.port", 5432i64.into()).unwrap();
/// bag.set("db.dsn", "pgsql://%db.host%:%db.port%".into()).unwrap();
///
/// let dsn = bag.resolve_value(&Value::from("%db.dsn%")).unwrap();
/// assert_eq!(dsn.as_str(), Some("pgsql://localhost:5432"));
///
/// // A lone placeholder keeps the raw typed value.
/// let port = bag.resolve_value(&Value::from("%db.port%")).unwrap();
/// assert_eq!(port.as_int(), Some(5432));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ParameterBag {
	parameters: IndexMap<String, Value>,
	frozen: bool,
}

impl ParameterBag {
	/// Creates an empty, mutable bag.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets a parameter, overriding any previous value under the same name.
	pub fn set(&mut self, name: &str, value: Value) -> DiResult<()> {
		self.ensure_mutable()?;
		self.parameters.insert(name.to_lowercase(), value);
		Ok(())
	}

	/// Returns the raw (unresolved) value of a parameter.
	pub fn get(&self, name: &str) -> DiResult<&Value> {
		self.parameters
			.get(&name.to_lowercase())
			.ok_or_else(|| DiError::ParameterNotFound(name.to_string()))
	}

	/// True when a parameter exists under the name.
	pub fn has(&self, name: &str) -> bool {
		self.parameters.contains_key(&name.to_lowercase())
	}

	/// Removes a parameter, returning its previous value.
	pub fn remove(&mut self, name: &str) -> DiResult<Option<Value>> {
		self.ensure_mutable()?;
		Ok(self.parameters.shift_remove(&name.to_lowercase()))
	}

	/// Adds parameters in bulk, overriding existing names.
	pub fn add(&mut self, parameters: IndexMap<String, Value>) -> DiResult<()> {
		self.ensure_mutable()?;
		for (name, value) in parameters {
			self.parameters.insert(name.to_lowercase(), value);
		}
		Ok(())
	}

	/// All parameters, keyed by lowercased name.
	pub fn all(&self) -> &IndexMap<String, Value> {
		&self.parameters
	}

	/// True after [`freeze`](ParameterBag::freeze) has run.
	pub fn is_frozen(&self) -> bool {
		self.frozen
	}

	/// Recursively resolves placeholders inside a value.
	///
	/// Sequences and mappings are resolved element-wise; non-string scalars,
	/// references, and services pass through unchanged.
	pub fn resolve_value(&self, value: &Value) -> DiResult<Value> {
		let mut resolving = HashSet::new();
		self.resolve_inner(value, &mut resolving)
	}

	/// Resolves every stored parameter in place and makes the bag immutable.
	///
	/// Idempotent: freezing twice leaves values unchanged.
	pub fn freeze(&mut self) -> DiResult<()> {
		if self.frozen {
			return Ok(());
		}

		let keys: Vec<String> = self.parameters.keys().cloned().collect();
		let mut resolved = IndexMap::with_capacity(keys.len());
		for key in keys {
			let value = self.resolve_value(&self.parameters[&key])?;
			resolved.insert(key, value);
		}
		self.parameters = resolved;
		self.frozen = true;
		Ok(())
	}

	fn ensure_mutable(&self) -> DiResult<()> {
		if self.frozen {
			Err(DiError::FrozenContainer("set a parameter"))
		} else {
			Ok(())
		}
	}

	fn resolve_inner(&self, value: &Value, resolving: &mut HashSet<String>) -> DiResult<Value> {
		match value {
			Value::String(s) => self.resolve_string(s, resolving),
			Value::Sequence(items) => items
				.iter()
				.map(|item| self.resolve_inner(item, resolving))
				.collect::<DiResult<Vec<_>>>()
				.map(Value::Sequence),
			Value::Map(map) => {
				let mut resolved = IndexMap::with_capacity(map.len());
				for (key, item) in map {
					resolved.insert(key.clone(), self.resolve_inner(item, resolving)?);
				}
				Ok(Value::Map(resolved))
			}
			other => Ok(other.clone()),
		}
	}

	fn resolve_string(&self, s: &str, resolving: &mut HashSet<String>) -> DiResult<Value> {
		if let Some(name) = lone_placeholder(s) {
			return self.resolve_placeholder(name, resolving);
		}

		let mut out = String::with_capacity(s.len());
		let mut rest = s;
		while let Some(pos) = rest.find('%') {
			out.push_str(&rest[..pos]);
			rest = &rest[pos + 1..];

			// `%%` is an escaped percent sign
			if let Some(stripped) = rest.strip_prefix('%') {
				out.push('%');
				rest = stripped;
				continue;
			}

			match rest.find('%') {
				Some(end) if is_placeholder_name(&rest[..end]) => {
					let name = &rest[..end];
					let resolved = self.resolve_placeholder(name, resolving)?;
					out.push_str(&stringify_scalar(name, &resolved)?);
					rest = &rest[end + 1..];
				}
				// unmatched or malformed: keep the percent sign literal
				_ => out.push('%'),
			}
		}
		out.push_str(rest);
		Ok(Value::String(out))
	}

	fn resolve_placeholder(&self, name: &str, resolving: &mut HashSet<String>) -> DiResult<Value> {
		let key = name.to_lowercase();
		if !resolving.insert(key.clone()) {
			return Err(DiError::CircularParameter(name.to_string()));
		}

		let value = self
			.parameters
			.get(&key)
			.ok_or_else(|| DiError::ParameterNotFound(name.to_string()))?;
		let resolved = self.resolve_inner(value, resolving)?;

		resolving.remove(&key);
		Ok(resolved)
	}
}

/// Returns the placeholder name when the whole string is a single `%name%`.
fn lone_placeholder(s: &str) -> Option<&str> {
	let inner = s.strip_prefix('%')?.strip_suffix('%')?;
	if is_placeholder_name(inner) {
		Some(inner)
	} else {
		None
	}
}

fn is_placeholder_name(name: &str) -> bool {
	!name.is_empty() && !name.contains('%') && !name.contains(char::is_whitespace)
}

fn stringify_scalar(name: &str, value: &Value) -> DiResult<String> {
	match value {
		Value::Null => Ok(String::new()),
		Value::Bool(b) => Ok(b.to_string()),
		Value::Int(i) => Ok(i.to_string()),
		Value::Float(x) => Ok(x.to_string()),
		Value::String(s) => Ok(s.clone()),
		_ => Err(DiError::NonScalarParameter(name.to_string())),
	}
}
