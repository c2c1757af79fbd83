//! Dependency injection framework based on an explicit component registry and runtime
//! autowiring.
//!
//! Components register themselves in a [ComponentDefinitionRegistry](component_registry::ComponentDefinitionRegistry),
//! interfaces (traits) are bound to concrete implementations with priority orders, and a
//! [BeanFactory](factory::BeanFactory) resolves the object graph on demand: each lookup either
//! returns the cached singleton for the derived bean name or instantiates the concrete type,
//! stores a placeholder, recursively injects the declared dependency slots and runs the
//! construction hook. See the [component] module for a complete example.
//!
//! Wiring mistakes are treated as unrecoverable startup defects: structural contract violations
//! fail at compile time, registration conflicts warn and keep the first registration, and
//! injection or construction failures terminate the process.

pub mod bean_store;
pub mod component;
pub mod component_registry;
pub mod error;
pub mod factory;
pub mod instance_provider;
pub mod lifecycle;
pub mod options;
