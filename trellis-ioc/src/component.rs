//! One of the basic blocks of dependency injection is a [Component]. Components are injectable
//! objects, which themselves can declare dependencies on other components via
//! [injection points](InjectionPoint).
//!
//! ## Declaring components
//!
//! Any type managed by the container implements `Component` plus the [Injectable] marker, starts
//! from its [Default] value, and lists its dependency slots explicitly. Trait objects become
//! injectable by implementing [ComponentDowncast] per bound implementation and binding the trait
//! to it in a
//! [ComponentDefinitionRegistry](crate::component_registry::ComponentDefinitionRegistry):
//!
//! ```
//! use std::sync::RwLock;
//! use trellis_ioc::component::{Component, ComponentDowncast, Injectable, InjectionPoint};
//! use trellis_ioc::component_registry::ComponentDefinitionRegistry;
//! use trellis_ioc::factory::BeanFactory;
//! use trellis_ioc::instance_provider::{AnyBeanPtr, BeanPtr, TypedBeanResolver};
//! use trellis_ioc::options::RegistrationOptions;
//!
//! // injectable traits need Send + Sync, since instances are shared between threads
//! trait Greeter: Send + Sync {
//!     fn greet(&self, name: &str) -> String;
//! }
//!
//! impl Injectable for dyn Greeter {}
//!
//! #[derive(Default)]
//! struct EchoGreeter;
//!
//! impl Greeter for EchoGreeter {
//!     fn greet(&self, name: &str) -> String {
//!         name.to_string()
//!     }
//! }
//!
//! impl Injectable for EchoGreeter {}
//!
//! impl ComponentDowncast<EchoGreeter> for dyn Greeter {
//!     fn downcast(source: AnyBeanPtr) -> Result<BeanPtr<Self>, AnyBeanPtr> {
//!         source
//!             .downcast::<RwLock<EchoGreeter>>()
//!             .map(|bean| bean as BeanPtr<dyn Greeter>)
//!     }
//! }
//!
//! impl Component for EchoGreeter {}
//!
//! #[derive(Default)]
//! struct App {
//!     greeter: Option<BeanPtr<dyn Greeter>>,
//! }
//!
//! impl Injectable for App {}
//!
//! impl Component for App {
//!     fn injection_points() -> Vec<InjectionPoint> {
//!         vec![InjectionPoint::new::<Self, dyn Greeter>("greeter", |app, bean| {
//!             app.greeter = Some(bean);
//!         })]
//!     }
//! }
//!
//! let mut registry = ComponentDefinitionRegistry::new();
//! registry.bind::<dyn Greeter, EchoGreeter>(RegistrationOptions::default());
//! registry.register::<App>(RegistrationOptions::default());
//!
//! let factory = BeanFactory::new(registry);
//! let app = factory.get::<App>();
//! let greeter = app.read().unwrap().greeter.clone().unwrap();
//! assert_eq!(greeter.read().unwrap().greet("trellis"), "trellis");
//! ```
//!
//! Injection points carry a [FieldSpec] - either built programmatically or parsed once from the
//! tag mini-language (`"lazy,pkg=other::namespace,bean=custom_name,type=ImplName"`) via
//! [InjectionPoint::with_tag].

use crate::error::{AssignmentError, TagParseError};
use crate::instance_provider::{
    downcast_bean, AnyBeanPtr, BeanPtr, CastFunction, ConstructorArgs, ErrorPtr,
};
use crate::options::{type_key, FieldSpec};
use derivative::Derivative;
use std::sync::{Arc, RwLock};

/// Marker trait for injectable targets - components and bound trait objects.
pub trait Injectable: 'static {}

/// Base capability set for managed types.
///
/// Instances start from their [Default] value ("zero value"), get their declared injection points
/// filled, and then receive the [init](Component::init) construction hook. On graceful shutdown
/// every cached instance receives [graceful_stop](Component::graceful_stop) exactly once. All
/// hooks have no-op defaults, so a plain data component only needs `impl Component for T {}`.
pub trait Component: Default + Send + Sync + 'static {
    /// Construction hook, invoked once per instance after field injection with the arguments the
    /// original caller supplied. Returning an error is a fatal wiring defect which terminates the
    /// process.
    fn init(&mut self, args: &ConstructorArgs) -> Result<(), ErrorPtr> {
        let _ = args;
        Ok(())
    }

    /// Shutdown hook, invoked during graceful shutdown.
    fn graceful_stop(&self) {}

    /// The component's dependency slots. Fields not listed here are never touched by the
    /// container.
    fn injection_points() -> Vec<InjectionPoint> {
        Vec::new()
    }
}

/// Helper trait turning type-erased instance handles back into typed ones, thus allowing
/// injection of `dyn Trait` targets. The type `C` refers to the concrete component type behind
/// the handle; an implementation exists per (target, concrete) pair.
pub trait ComponentDowncast<C: Component>: Injectable {
    fn downcast(source: AnyBeanPtr) -> Result<BeanPtr<Self>, AnyBeanPtr>;
}

type AssignFunction =
    Arc<dyn Fn(&AnyBeanPtr, AnyBeanPtr, CastFunction) -> Result<(), AssignmentError> + Send + Sync>;

/// A declared dependency slot of a component: the field it fills, the lookup spec parsed once at
/// declaration time, and a typed assignment thunk writing the resolved handle into the owner.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct InjectionPoint {
    field: &'static str,
    spec: FieldSpec,
    target_namespace: String,
    target_type_name: String,
    #[derivative(Debug = "ignore")]
    assign: AssignFunction,
}

impl InjectionPoint {
    /// Declares a dependency slot with default lookup options. `O` is the owning component, `T`
    /// the injected target (a component type or a bound trait object).
    pub fn new<O, T>(field: &'static str, assign: fn(&mut O, BeanPtr<T>)) -> Self
    where
        O: Component,
        T: Injectable + ?Sized,
    {
        Self::with_spec(field, FieldSpec::default(), assign)
    }

    /// Declares a dependency slot with an explicit, already-parsed [FieldSpec].
    pub fn with_spec<O, T>(
        field: &'static str,
        spec: FieldSpec,
        assign: fn(&mut O, BeanPtr<T>),
    ) -> Self
    where
        O: Component,
        T: Injectable + ?Sized,
    {
        let (target_namespace, target_type_name) = type_key::<T>();
        let erased: AssignFunction = Arc::new(move |owner, dependency, cast| {
            let owner = owner
                .clone()
                .downcast::<RwLock<O>>()
                .map_err(|_| AssignmentError::OwnerTypeMismatch)?;
            let dependency =
                downcast_bean::<T>(dependency, cast).ok_or(AssignmentError::DependencyTypeMismatch)?;

            let mut owner = match owner.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            assign(&mut owner, dependency);
            Ok(())
        });

        Self {
            field,
            spec,
            target_namespace,
            target_type_name,
            assign: erased,
        }
    }

    /// Declares a dependency slot from a field tag in the mini-language, parsing it once here.
    pub fn with_tag<O, T>(
        field: &'static str,
        tag: &str,
        assign: fn(&mut O, BeanPtr<T>),
    ) -> Result<Self, TagParseError>
    where
        O: Component,
        T: Injectable + ?Sized,
    {
        Ok(Self::with_spec(field, FieldSpec::parse(tag)?, assign))
    }

    /// Name of the field this point fills; doubles as the bean name in multiplicity mode.
    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn spec(&self) -> &FieldSpec {
        &self.spec
    }

    /// Namespace derived from the target type, used when the spec carries no override.
    pub fn target_namespace(&self) -> &str {
        &self.target_namespace
    }

    pub fn target_type_name(&self) -> &str {
        &self.target_type_name
    }

    pub(crate) fn assign(
        &self,
        owner: &AnyBeanPtr,
        dependency: AnyBeanPtr,
        cast: CastFunction,
    ) -> Result<(), AssignmentError> {
        (self.assign)(owner, dependency, cast)
    }
}
