//! Core functionality for creating and caching bean instances. The [BeanFactory] resolves
//! lookups against registered definitions: cache hits return the shared instance, misses
//! instantiate the concrete type, store a placeholder, perform recursive field injection and run
//! the construction hook.

use crate::bean_store::{BeanInstance, BeanStore};
use crate::component::{Injectable, InjectionPoint};
use crate::component_registry::{ComponentDefinitionRegistry, ComponentMetadata};
use crate::error::{fatal, BeanResolutionError};
use crate::instance_provider::{
    AnyBeanPtr, BeanPtr, BeanResolver, CastFunction, TypedBeanResolver,
};
use crate::lifecycle::{self, BeanState, LAZY_INIT_DELAY};
use crate::options::{BeanMode, LookupOptions};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

/// Builder for [BeanFactory], for when the defaults need adjusting.
pub struct BeanFactoryBuilder {
    definitions: ComponentDefinitionRegistry,
    default_mode: BeanMode,
}

impl BeanFactoryBuilder {
    pub fn new(definitions: ComponentDefinitionRegistry) -> Self {
        Self {
            definitions,
            default_mode: BeanMode::default(),
        }
    }

    /// Sets the initial default bean naming mode.
    pub fn with_default_mode(mut self, mode: BeanMode) -> Self {
        self.default_mode = mode;
        self
    }

    pub fn build(self) -> BeanFactory {
        BeanFactory {
            inner: Arc::new(FactoryInner {
                definitions: self.definitions,
                store: BeanStore::new(),
                default_mode: RwLock::new(self.default_mode),
            }),
        }
    }
}

/// Resolver over a frozen definition registry and a concurrent bean store. Cheap to clone; all
/// clones share the same store. Registration must be complete before the factory is built - the
/// registry moves in by value, so the type system enforces this ordering.
#[derive(Clone)]
pub struct BeanFactory {
    inner: Arc<FactoryInner>,
}

struct FactoryInner {
    definitions: ComponentDefinitionRegistry,
    store: BeanStore,
    default_mode: RwLock<BeanMode>,
}

impl BeanFactory {
    pub fn new(definitions: ComponentDefinitionRegistry) -> Self {
        BeanFactoryBuilder::new(definitions).build()
    }

    pub fn definitions(&self) -> &ComponentDefinitionRegistry {
        &self.inner.definitions
    }

    pub fn store(&self) -> &BeanStore {
        &self.inner.store
    }

    /// The default bean naming mode for injection sites without an explicit name.
    pub fn default_mode(&self) -> BeanMode {
        match self.inner.default_mode.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn set_default_mode(&self, mode: BeanMode) {
        let mut guard = match self.inner.default_mode.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = mode;
    }

    /// Waits until the named bean finishes construction, up to the given timeout. Returns
    /// whether the bean exists and is ready. The supported way to synchronize with a lazy bean
    /// instead of racing its fixed delay.
    pub fn await_ready(&self, bean_name: &str, timeout: Duration) -> bool {
        self.inner
            .store
            .load(bean_name)
            .map_or(false, |bean| bean.readiness().wait_timeout(timeout))
    }

    /// Invokes every cached instance's shutdown hook and clears the store. Subsequent lookups
    /// reconstruct fresh instances.
    pub fn graceful_stop(&self) {
        info!("Graceful stop requested.");
        lifecycle::sweep(&self.inner.store);
    }

    /// Graceful stop followed by a fresh resolution of the given root type, transitively
    /// reconstructing its dependency subtree.
    pub fn restart<T: Injectable + ?Sized>(&self) -> Result<BeanPtr<T>, BeanResolutionError> {
        info!("Restart requested.");
        self.graceful_stop();
        self.resolve::<T>()
    }

    fn resolve_internal(
        &self,
        options: &LookupOptions,
        site_field: Option<&str>,
    ) -> Result<BeanInstance, BeanResolutionError> {
        let namespace = options.namespace.as_deref();
        let type_name = options.type_name.as_deref();
        let variant = options.variant.as_deref();

        // composite key derived from the target; an explicitly selected variant always produces
        // the three-part key, even over an explicit bean name
        let derived_name = match (namespace, type_name) {
            (Some(namespace), Some(type_name)) => Some(match variant {
                Some(variant) => format!("{namespace}:{type_name}:{variant}"),
                None => format!("{namespace}:{type_name}"),
            }),
            _ => None,
        };
        let explicit_name = match variant {
            Some(_) => None,
            None => options.bean_name.clone(),
        };
        let cache_name = explicit_name.clone().or_else(|| derived_name.clone());

        if let Some(name) = &cache_name {
            if let Some(bean) = self.inner.store.load(name) {
                return Ok(bean);
            }
        }

        let definition = self.inner.definitions.find(namespace, type_name).ok_or_else(|| {
            BeanResolutionError::NoSuchDefinition {
                namespace: namespace.unwrap_or_default().to_string(),
                type_name: type_name.unwrap_or_default().to_string(),
            }
        })?;

        let (metadata, registration) =
            definition
                .select(variant)
                .ok_or_else(|| BeanResolutionError::UnknownVariant {
                    namespace: definition.namespace.clone(),
                    type_name: definition.type_name.clone(),
                    variant: variant.unwrap_or_default().to_string(),
                })?;

        // multiplicity: a fresh, uncached instance per call or injection site; an explicit bean
        // name pins the instance in the store instead
        let site_multi = site_field.is_some()
            && options.bean_name.is_none()
            && self.default_mode() == BeanMode::Multi;

        if (registration.is_multi() || site_multi) && explicit_name.is_none() {
            let display_name = site_field
                .map(str::to_string)
                .or_else(|| cache_name.clone())
                .unwrap_or_else(|| definition.key());
            let bean = BeanInstance::new(display_name, metadata);

            if options.is_lazy() {
                self.spawn_lazy(bean.clone(), metadata.clone(), options.clone());
            } else {
                self.construct(&bean, metadata, options);
            }

            return Ok(bean);
        }

        let bean_name = cache_name.unwrap_or_else(|| definition.key());
        let bean = BeanInstance::new(bean_name, metadata);

        // the placeholder becomes visible before injection completes, so a racing lookup
        // observes "exists" immediately; losing the race means returning the winner's instance
        let (bean, already_present) = self.inner.store.load_or_store(bean);
        if already_present {
            return Ok(bean);
        }

        if options.is_lazy() {
            self.spawn_lazy(bean.clone(), metadata.clone(), options.clone());
        } else {
            self.construct(&bean, metadata, options);
        }

        Ok(bean)
    }

    /// Drives field injection and the construction hook for a freshly created instance.
    fn construct(&self, bean: &BeanInstance, metadata: &ComponentMetadata, options: &LookupOptions) {
        bean.readiness.advance(BeanState::Injecting);

        for point in metadata.injection_points.iter() {
            self.inject(bean, point, options);
        }

        let parent = options.parent.as_deref().unwrap_or("main");
        match (metadata.init)(&bean.instance, &options.args) {
            Ok(()) => {
                info!("Bean [{}] constructed (parent [{parent}]).", bean.bean_name);
                bean.readiness.advance(BeanState::Constructed);
            }
            Err(cause) => fatal(format!(
                "Bean [{}] construction failed (parent [{parent}]): {cause}",
                bean.bean_name
            )),
        }
    }

    fn inject(&self, owner: &BeanInstance, point: &InjectionPoint, options: &LookupOptions) {
        let spec = point.spec();

        let mut lookup = LookupOptions::new()
            .with_namespace(
                spec.namespace
                    .clone()
                    .unwrap_or_else(|| point.target_namespace().to_string()),
            )
            .with_type_name(point.target_type_name())
            .with_args(options.args.clone())
            .with_parent(owner.bean_name.clone());
        if let Some(name) = &spec.bean_name {
            lookup = lookup.with_bean_name(name.clone());
        }
        if let Some(variant) = &spec.variant {
            lookup = lookup.with_variant(variant.clone());
        }
        if spec.lazy {
            lookup = lookup.with_lazy();
        }

        match self.resolve_internal(&lookup, Some(point.field())) {
            // a lazy slot is only assigned once its dependency finishes construction, so the
            // owner observes either nothing or a fully constructed instance
            Ok(dependency) if spec.lazy => {
                self.spawn_lazy_assign(owner.clone(), point.clone(), dependency)
            }
            Ok(dependency) => {
                if let Err(cause) =
                    point.assign(&owner.instance, dependency.instance, dependency.cast)
                {
                    fatal(format!(
                        "Cannot inject field [{}] of bean [{}]: {cause}.",
                        point.field(),
                        owner.bean_name
                    ));
                }
            }
            Err(cause) => warn!(
                "Skipping injection of field [{}] of bean [{}]: {cause}",
                point.field(),
                owner.bean_name
            ),
        }
    }

    /// Defers a lazy slot's assignment until the dependency signals readiness.
    fn spawn_lazy_assign(&self, owner: BeanInstance, point: InjectionPoint, dependency: BeanInstance) {
        let field_name = point.field().to_string();
        let owner_name = owner.bean_name.clone();
        let spawned = thread::Builder::new()
            .name(format!("lazy-inject-{}", owner.bean_name))
            .spawn(move || {
                dependency.readiness().wait();
                if let Err(cause) =
                    point.assign(&owner.instance, dependency.instance.clone(), dependency.cast)
                {
                    fatal(format!(
                        "Cannot inject field [{}] of bean [{}]: {cause}.",
                        point.field(),
                        owner.bean_name
                    ));
                }
            });

        if let Err(cause) = spawned {
            error!(
                "Cannot spawn lazy injection task for field [{}] of bean [{}]: {cause}",
                field_name,
                owner_name
            );
        }
    }

    /// Schedules injection and construction on a detached thread after the fixed delay. The
    /// placeholder stays observable in the meantime - a documented, accepted race.
    fn spawn_lazy(&self, bean: BeanInstance, metadata: ComponentMetadata, options: LookupOptions) {
        let factory = self.clone();
        let bean_name = bean.bean_name.clone();
        let spawned = thread::Builder::new()
            .name(format!("lazy-init-{}", bean.bean_name))
            .spawn(move || {
                thread::sleep(LAZY_INIT_DELAY);
                factory.construct(&bean, &metadata, &options);
            });

        if let Err(cause) = spawned {
            error!(
                "Cannot spawn lazy construction task for bean [{}]: {cause}",
                bean_name
            );
        }
    }
}

impl BeanResolver for BeanFactory {
    fn instance(
        &self,
        options: LookupOptions,
    ) -> Result<(AnyBeanPtr, CastFunction), BeanResolutionError> {
        self.resolve_internal(&options, None)
            .map(|bean| (bean.instance, bean.cast))
    }

    fn instance_by_name(
        &self,
        name: &str,
    ) -> Result<(AnyBeanPtr, CastFunction), BeanResolutionError> {
        if let Some(bean) = self.inner.store.load(name) {
            return Ok((bean.instance, bean.cast));
        }

        // bean names are composite keys for everything the store can hold, so interpret the
        // name as namespace:TypeName[:Variant] against the registry
        let options = match split_composite(name).as_slice() {
            [namespace, type_name] => LookupOptions::new()
                .with_namespace(*namespace)
                .with_type_name(*type_name),
            [namespace, type_name, variant] => LookupOptions::new()
                .with_namespace(*namespace)
                .with_type_name(*type_name)
                .with_variant(*variant),
            _ => return Err(BeanResolutionError::NoSuchBean(name.to_string())),
        };

        self.resolve_internal(&options, None)
            .map(|bean| (bean.instance, bean.cast))
            .map_err(|_| BeanResolutionError::NoSuchBean(name.to_string()))
    }
}

/// Splits a composite bean name on single colons, leaving the `::` of namespace paths intact.
fn split_composite(name: &str) -> Vec<&str> {
    let bytes = name.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b':' {
            if i + 1 < bytes.len() && bytes[i + 1] == b':' {
                i += 2;
                continue;
            }
            parts.push(&name[start..i]);
            start = i + 1;
        }
        i += 1;
    }
    parts.push(&name[start..]);
    parts
}
