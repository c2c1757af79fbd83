//! Functionality related to registering definitions of components and interface bindings. The
//! [BeanFactory](crate::factory::BeanFactory) creates instances based on those definitions.
//!
//! The registry is append-only and keyed by the composite `namespace:TypeName` key. Conflicting
//! registrations on the same key are resolved by priority order (lower wins, no order loses to
//! any order); a conflict with no disambiguating order keeps the first registration and logs a
//! warning - wiring mistakes are diagnosed, not silently accepted, but they do not abort
//! registration.

use crate::component::{Component, ComponentDowncast, InjectionPoint};
use crate::error::AssignmentError;
use crate::instance_provider::{AnyBeanPtr, CastFunction, ConstructorArgs, ErrorPtr};
use crate::options::{type_key, RegistrationOptions};
use derivative::Derivative;
use fxhash::FxHashMap;
use std::any::{Any, TypeId};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

/// Type-erased construction and lifecycle table for one concrete component type, collected once
/// at registration time.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct ComponentMetadata {
    /// [TypeId] of the concrete component type behind this metadata.
    pub type_id: TypeId,
    #[derivative(Debug = "ignore")]
    pub(crate) constructor: fn() -> AnyBeanPtr,
    #[derivative(Debug = "ignore")]
    pub(crate) init: fn(&AnyBeanPtr, &ConstructorArgs) -> Result<(), ErrorPtr>,
    #[derivative(Debug = "ignore")]
    pub(crate) stop: fn(&AnyBeanPtr),
    #[derivative(Debug = "ignore")]
    pub(crate) cast: CastFunction,
    pub(crate) injection_points: Arc<Vec<InjectionPoint>>,
}

impl ComponentMetadata {
    /// Metadata for a plainly registered component: its own hooks and a self-cast.
    pub fn of<T: Component>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            constructor: erased_constructor::<T>,
            init: erased_init::<T>,
            stop: erased_stop::<T>,
            cast: self_cast::<T>,
            injection_points: Arc::new(T::injection_points()),
        }
    }

    /// Metadata for an implementation bound to interface `I`: the implementation's hooks with a
    /// cast to the interface handle type.
    pub(crate) fn for_binding<I, C>() -> Self
    where
        I: ComponentDowncast<C> + ?Sized,
        C: Component,
    {
        Self {
            cast: interface_cast::<I, C>,
            ..Self::of::<C>()
        }
    }
}

fn erased_constructor<T: Component>() -> AnyBeanPtr {
    Arc::new(RwLock::new(T::default()))
}

fn erased_init<T: Component>(
    instance: &AnyBeanPtr,
    args: &ConstructorArgs,
) -> Result<(), ErrorPtr> {
    let instance = instance
        .clone()
        .downcast::<RwLock<T>>()
        .map_err(|_| Arc::new(AssignmentError::OwnerTypeMismatch) as ErrorPtr)?;

    let mut instance = match instance.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    instance.init(args)
}

fn erased_stop<T: Component>(instance: &AnyBeanPtr) {
    if let Ok(instance) = instance.clone().downcast::<RwLock<T>>() {
        let instance = match instance.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        instance.graceful_stop();
    }
}

fn self_cast<T: Component>(instance: AnyBeanPtr) -> Result<Box<dyn Any>, AnyBeanPtr> {
    instance
        .downcast::<RwLock<T>>()
        .map(|bean| Box::new(bean) as Box<dyn Any>)
}

fn interface_cast<I: ComponentDowncast<C> + ?Sized, C: Component>(
    instance: AnyBeanPtr,
) -> Result<Box<dyn Any>, AnyBeanPtr> {
    I::downcast(instance).map(|bean| Box::new(bean) as Box<dyn Any>)
}

/// One implementation bound to an interface, addressable by its type name via `type=<ImplName>`
/// selection.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct BindingDefinition {
    pub type_name: String,
    pub options: RegistrationOptions,
    pub(crate) metadata: ComponentMetadata,
}

/// Definition of one registered component, or of one interface together with its binding pool.
///
/// Root definitions are unique per `(namespace, type_name)`; pool members share the root key but
/// carry distinct concrete types. Exactly one pool member is selected as current at any time.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct ComponentDefinition {
    pub namespace: String,
    pub type_name: String,
    pub options: RegistrationOptions,
    pub(crate) metadata: ComponentMetadata,
    pool: Vec<BindingDefinition>,
    current: usize,
}

impl ComponentDefinition {
    /// The composite registry key, also the default singleton bean name.
    pub fn key(&self) -> String {
        format!("{}:{}", self.namespace, self.type_name)
    }

    pub fn bindings(&self) -> &[BindingDefinition] {
        &self.pool
    }

    /// The binding currently selected by priority, if this definition has a pool.
    pub fn current_binding(&self) -> Option<&BindingDefinition> {
        self.pool.get(self.current)
    }

    pub fn binding(&self, variant: &str) -> Option<&BindingDefinition> {
        self.pool.iter().find(|binding| binding.type_name == variant)
    }

    /// Narrows to the metadata/options to instantiate: the named pool entry when a variant is
    /// requested (`None` on a pool miss), the current binding for interface roots, or the
    /// definition itself for plain components.
    pub(crate) fn select(
        &self,
        variant: Option<&str>,
    ) -> Option<(&ComponentMetadata, &RegistrationOptions)> {
        match variant {
            Some(variant) => self
                .binding(variant)
                .map(|binding| (&binding.metadata, &binding.options)),
            None => match self.current_binding() {
                Some(binding) => Some((&binding.metadata, &binding.options)),
                None => Some((&self.metadata, &self.options)),
            },
        }
    }

    fn push_binding(&mut self, binding: BindingDefinition) {
        let key = self.key();
        if let Some(existing) = self
            .pool
            .iter()
            .position(|existing| existing.type_name == binding.type_name)
        {
            match resolve_priority(self.pool[existing].options.order, binding.options.order) {
                PriorityResolution::TakeSecond => self.pool[existing] = binding,
                PriorityResolution::KeepFirstAmbiguous => warn!(
                    "Binding '{}' for '{key}' is already present without a priority order; keeping the first binding.",
                    binding.type_name
                ),
                PriorityResolution::KeepFirstTie => warn!(
                    "Binding '{}' for '{key}' conflicts on equal priority order; keeping the first binding.",
                    binding.type_name
                ),
                PriorityResolution::KeepFirst => {}
            }
        } else {
            info!("Binding '{}' added to pool for '{key}'.", binding.type_name);
            self.pool.push(binding);
        }

        self.reselect_current();
    }

    fn reselect_current(&mut self) {
        let key = self.key();
        let mut current = 0;
        for candidate in 1..self.pool.len() {
            match resolve_priority(
                self.pool[current].options.order,
                self.pool[candidate].options.order,
            ) {
                PriorityResolution::TakeSecond => current = candidate,
                PriorityResolution::KeepFirstAmbiguous => warn!(
                    "Multiple bindings without a priority order for '{key}'; keeping '{}' as current.",
                    self.pool[current].type_name
                ),
                PriorityResolution::KeepFirstTie => warn!(
                    "Priority tie between bindings '{}' and '{}' for '{key}'; keeping '{}' as current.",
                    self.pool[current].type_name,
                    self.pool[candidate].type_name,
                    self.pool[current].type_name
                ),
                PriorityResolution::KeepFirst => {}
            }
        }

        self.current = current;
    }
}

#[derive(Debug, Eq, PartialEq)]
enum PriorityResolution {
    KeepFirst,
    KeepFirstAmbiguous,
    KeepFirstTie,
    TakeSecond,
}

/// Priority order rules: no order loses to any order, lower values win, equal values are a
/// conflict, and two missing orders are ambiguous. The first side wins every non-decisive case.
fn resolve_priority(first: Option<i32>, second: Option<i32>) -> PriorityResolution {
    match (first, second) {
        (None, None) => PriorityResolution::KeepFirstAmbiguous,
        (Some(_), None) => PriorityResolution::KeepFirst,
        (None, Some(_)) => PriorityResolution::TakeSecond,
        (Some(first), Some(second)) if second < first => PriorityResolution::TakeSecond,
        (Some(first), Some(second)) if first == second => PriorityResolution::KeepFirstTie,
        _ => PriorityResolution::KeepFirst,
    }
}

/// Append-only table of component definitions, expected to be fully populated before the first
/// lookup.
#[derive(Debug, Default)]
pub struct ComponentDefinitionRegistry {
    definitions: Vec<ComponentDefinition>,
    names: FxHashMap<String, usize>,
}

impl ComponentDefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a component type under its `namespace:TypeName` key (namespace taken from the
    /// options override, or from the type's module path).
    pub fn register<T: Component>(&mut self, options: RegistrationOptions) {
        let (derived_namespace, type_name) = type_key::<T>();
        let namespace = options.namespace.clone().unwrap_or(derived_namespace);
        let metadata = ComponentMetadata::of::<T>();

        self.register_definition(ComponentDefinition {
            namespace,
            type_name,
            options,
            metadata,
            pool: Vec::new(),
            current: 0,
        });
    }

    /// Binds implementation `C` to interface `I`, appending it to the interface's binding pool.
    /// The first bind creates the interface's root definition. The contract checks of the
    /// capability set and the interface methods are enforced by the trait bounds: this only
    /// compiles when `C` is a component implementing `I`.
    pub fn bind<I, C>(&mut self, options: RegistrationOptions)
    where
        I: ComponentDowncast<C> + ?Sized,
        C: Component,
    {
        let (derived_namespace, interface_name) = type_key::<I>();
        let namespace = options.namespace.clone().unwrap_or(derived_namespace);
        let (_, impl_name) = type_key::<C>();
        let metadata = ComponentMetadata::for_binding::<I, C>();

        let key = format!("{namespace}:{interface_name}");
        let index = match self.names.get(&key) {
            Some(&index) => index,
            None => {
                info!("Interface '{key}' registered.");
                self.names.insert(key, self.definitions.len());
                self.definitions.push(ComponentDefinition {
                    namespace,
                    type_name: interface_name,
                    options: options.clone(),
                    metadata: metadata.clone(),
                    pool: Vec::new(),
                    current: 0,
                });
                self.definitions.len() - 1
            }
        };

        self.definitions[index].push_binding(BindingDefinition {
            type_name: impl_name,
            options,
            metadata,
        });
    }

    fn register_definition(&mut self, definition: ComponentDefinition) {
        let key = definition.key();
        if let Some(&index) = self.names.get(&key) {
            match resolve_priority(
                self.definitions[index].options.order,
                definition.options.order,
            ) {
                PriorityResolution::TakeSecond => {
                    info!("Component '{key}' re-registered with a higher priority order.");
                    self.definitions[index] = definition;
                }
                PriorityResolution::KeepFirstAmbiguous => warn!(
                    "Component '{key}' is already registered and neither registration carries a priority order; keeping the first registration."
                ),
                PriorityResolution::KeepFirstTie => warn!(
                    "Component '{key}' is already registered with an equal priority order; keeping the first registration."
                ),
                PriorityResolution::KeepFirst => {}
            }
            return;
        }

        info!("Component '{key}' registered.");
        self.names.insert(key, self.definitions.len());
        self.definitions.push(definition);
    }

    /// Returns the first definition matching the given partial key, in registration order.
    pub fn find(
        &self,
        namespace: Option<&str>,
        type_name: Option<&str>,
    ) -> Option<&ComponentDefinition> {
        self.definitions.iter().find(|definition| {
            namespace.map_or(true, |namespace| definition.namespace == namespace)
                && type_name.map_or(true, |type_name| definition.type_name == type_name)
        })
    }

    pub fn find_exact(&self, namespace: &str, type_name: &str) -> Option<&ComponentDefinition> {
        self.names
            .get(&format!("{namespace}:{type_name}"))
            .map(|&index| &self.definitions[index])
    }

    pub fn is_registered(&self, namespace: &str, type_name: &str) -> bool {
        self.names.contains_key(&format!("{namespace}:{type_name}"))
    }

    pub fn definitions(&self) -> &[ComponentDefinition] {
        &self.definitions
    }

    /// Returns a copy of all definitions keyed by their composite key.
    pub fn all_definitions(&self) -> FxHashMap<String, ComponentDefinition> {
        self.definitions
            .iter()
            .map(|definition| (definition.key(), definition.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
