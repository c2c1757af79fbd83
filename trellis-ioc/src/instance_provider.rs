//! Type-erased bean handles and the resolver traits built on top of them.
//!
//! Instances managed by the container are stored behind [BeanPtr] handles - shared pointers with
//! interior mutability, since field injection mutates an instance which is already visible in the
//! bean store. Erasure goes through [AnyBeanPtr] + [CastFunction] pairs: the erased pointer can
//! only be turned back into a typed handle by the cast function registered together with it.

use crate::component::Injectable;
use crate::error::BeanResolutionError;
use crate::options::{type_key, LookupOptions};
#[cfg(test)]
use mockall::automock;
use std::any::Any;
use std::error::Error;
use std::fmt::{self, Debug, Formatter};
use std::sync::{Arc, RwLock};

/// Handle to a managed instance. Trait-object targets (`BeanPtr<dyn Trait>`) are supported as
/// long as the trait requires `Send + Sync`.
pub type BeanPtr<T> = Arc<RwLock<T>>;

/// Type-erased [BeanPtr]. The erased type is always the `RwLock<T>` of some concrete component.
pub type AnyBeanPtr = Arc<dyn Any + Send + Sync>;

/// Casts an erased instance to a `Box<dyn Any>` containing a [BeanPtr] of a concrete or
/// trait-object type. Which target type depends on the function instance - components register a
/// self-cast, interface bindings register a cast to the bound trait object.
pub type CastFunction = fn(instance: AnyBeanPtr) -> Result<Box<dyn Any>, AnyBeanPtr>;

/// Type-erased error for user-supplied lifecycle hooks.
pub type ErrorPtr = Arc<dyn Error + Send + Sync>;

/// Heterogeneous construction-argument pack handed to [Component::init](crate::component::Component::init).
/// Arguments are supplied by the original caller and travel unchanged through recursive
/// resolution.
#[derive(Clone, Default)]
pub struct ConstructorArgs {
    values: Vec<Arc<dyn Any + Send + Sync>>,
}

impl ConstructorArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an argument, builder-style.
    pub fn with<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.values.push(Arc::new(value));
        self
    }

    /// Returns the argument at `index`, if present and of the requested type.
    pub fn get<T: Any>(&self, index: usize) -> Option<&T> {
        self.values.get(index).and_then(|value| value.downcast_ref())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Debug for ConstructorArgs {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConstructorArgs")
            .field(&self.values.len())
            .finish()
    }
}

/// Generic provider of bean instances.
#[cfg_attr(test, automock)]
pub trait BeanResolver {
    /// Finds or creates an instance matching the given options. On a cache miss the instance is
    /// fully constructed (or scheduled for lazy construction) before being returned.
    fn instance(
        &self,
        options: LookupOptions,
    ) -> Result<(AnyBeanPtr, CastFunction), BeanResolutionError>;

    /// Returns a bean by its explicit name, without type information. Falls back to interpreting
    /// the name as a composite `namespace:TypeName[:Variant]` key when nothing is cached under
    /// it.
    fn instance_by_name(
        &self,
        name: &str,
    ) -> Result<(AnyBeanPtr, CastFunction), BeanResolutionError>;
}

/// Helper trait for [BeanResolver] providing strongly-typed access. Both concrete component types
/// and bound trait objects can be requested.
pub trait TypedBeanResolver {
    /// Resolves the bean for `T` using default options.
    fn resolve<T: Injectable + ?Sized>(&self) -> Result<BeanPtr<T>, BeanResolutionError>;

    /// Resolves the bean for `T`, with explicit options taking precedence over values derived
    /// from the type.
    fn resolve_with<T: Injectable + ?Sized>(
        &self,
        options: LookupOptions,
    ) -> Result<BeanPtr<T>, BeanResolutionError>;

    /// Best-effort variant of [resolve](TypedBeanResolver::resolve): logs a warning and returns
    /// `None` when resolution fails.
    fn try_resolve<T: Injectable + ?Sized>(&self) -> Option<BeanPtr<T>>;

    /// Must-succeed variant of [resolve](TypedBeanResolver::resolve): panics with a descriptive
    /// message when resolution fails. Use when a missing bean is a wiring defect.
    fn get<T: Injectable + ?Sized>(&self) -> BeanPtr<T>;

    /// Must-succeed variant of [resolve_with](TypedBeanResolver::resolve_with).
    fn get_with<T: Injectable + ?Sized>(&self, options: LookupOptions) -> BeanPtr<T>;

    /// Resolves the bean cached under (or to be created under) the given explicit name.
    fn resolve_named<T: Injectable + ?Sized>(
        &self,
        name: &str,
    ) -> Result<BeanPtr<T>, BeanResolutionError>;
}

impl<P: BeanResolver + ?Sized> TypedBeanResolver for P {
    fn resolve<T: Injectable + ?Sized>(&self) -> Result<BeanPtr<T>, BeanResolutionError> {
        self.resolve_with::<T>(LookupOptions::default())
    }

    fn resolve_with<T: Injectable + ?Sized>(
        &self,
        options: LookupOptions,
    ) -> Result<BeanPtr<T>, BeanResolutionError> {
        let (namespace, type_name) = type_key::<T>();
        let mut options = options;
        options.fill(&namespace, &type_name);

        let label = options
            .bean_name
            .clone()
            .unwrap_or_else(|| format!("{namespace}:{type_name}"));

        let (instance, cast) = self.instance(options)?;
        downcast_bean::<T>(instance, cast).ok_or(BeanResolutionError::IncompatibleBean(label))
    }

    fn try_resolve<T: Injectable + ?Sized>(&self) -> Option<BeanPtr<T>> {
        match self.resolve::<T>() {
            Ok(bean) => Some(bean),
            Err(error) => {
                tracing::warn!("{error}");
                None
            }
        }
    }

    fn get<T: Injectable + ?Sized>(&self) -> BeanPtr<T> {
        self.get_with::<T>(LookupOptions::default())
    }

    fn get_with<T: Injectable + ?Sized>(&self, options: LookupOptions) -> BeanPtr<T> {
        match self.resolve_with::<T>(options) {
            Ok(bean) => bean,
            Err(error) => panic!("cannot resolve required bean: {error}"),
        }
    }

    fn resolve_named<T: Injectable + ?Sized>(
        &self,
        name: &str,
    ) -> Result<BeanPtr<T>, BeanResolutionError> {
        self.resolve_with::<T>(LookupOptions::default().with_bean_name(name))
    }
}

/// Turns an erased instance back into a typed handle using its registered cast function.
pub fn downcast_bean<T: Injectable + ?Sized>(
    instance: AnyBeanPtr,
    cast: CastFunction,
) -> Option<BeanPtr<T>> {
    cast(instance)
        .ok()
        .and_then(|boxed| boxed.downcast::<BeanPtr<T>>().ok())
        .map(|boxed| *boxed)
}

#[cfg(test)]
mod tests {
    use crate::component::{Component, ComponentDowncast, Injectable};
    use crate::error::BeanResolutionError;
    use crate::instance_provider::{
        AnyBeanPtr, BeanPtr, CastFunction, ConstructorArgs, MockBeanResolver, TypedBeanResolver,
    };
    use std::any::Any;
    use std::sync::{Arc, RwLock};

    #[derive(Default, Debug)]
    struct TestComponent;

    impl Injectable for TestComponent {}

    impl ComponentDowncast<TestComponent> for TestComponent {
        fn downcast(source: AnyBeanPtr) -> Result<BeanPtr<Self>, AnyBeanPtr> {
            source.downcast::<RwLock<TestComponent>>()
        }
    }

    impl Component for TestComponent {}

    fn test_cast(instance: AnyBeanPtr) -> Result<Box<dyn Any>, AnyBeanPtr> {
        TestComponent::downcast(instance).map(|bean| Box::new(bean) as Box<dyn Any>)
    }

    fn failing_cast(instance: AnyBeanPtr) -> Result<Box<dyn Any>, AnyBeanPtr> {
        Err(instance)
    }

    fn test_instance() -> AnyBeanPtr {
        Arc::new(RwLock::new(TestComponent))
    }

    #[test]
    fn should_resolve_typed_instance() {
        let mut resolver = MockBeanResolver::new();
        resolver
            .expect_instance()
            .times(1)
            .returning(|_| Ok((test_instance(), test_cast as CastFunction)));

        assert!(resolver.resolve::<TestComponent>().is_ok());
    }

    #[test]
    fn should_report_incompatible_bean() {
        let mut resolver = MockBeanResolver::new();
        resolver
            .expect_instance()
            .times(1)
            .returning(|_| Ok((test_instance(), failing_cast as CastFunction)));

        assert!(matches!(
            resolver.resolve::<TestComponent>().unwrap_err(),
            BeanResolutionError::IncompatibleBean(..)
        ));
    }

    #[test]
    fn should_fill_lookup_options_from_type() {
        let mut resolver = MockBeanResolver::new();
        resolver
            .expect_instance()
            .withf(|options| {
                options.type_name.as_deref() == Some("TestComponent")
                    && options
                        .namespace
                        .as_deref()
                        .map_or(false, |namespace| namespace.ends_with("tests"))
            })
            .times(1)
            .returning(|_| Ok((test_instance(), test_cast as CastFunction)));

        resolver.resolve::<TestComponent>().unwrap();
    }

    #[test]
    fn should_access_constructor_args_by_type() {
        let args = ConstructorArgs::new().with(42i32).with("hello".to_string());

        assert_eq!(args.len(), 2);
        assert_eq!(args.get::<i32>(0), Some(&42));
        assert_eq!(args.get::<String>(1), Some(&"hello".to_string()));
        assert_eq!(args.get::<i32>(1), None);
        assert_eq!(args.get::<i32>(2), None);
    }
}
