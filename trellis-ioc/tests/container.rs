use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{Duration, Instant};
use trellis_ioc::component::{Component, ComponentDowncast, Injectable, InjectionPoint};
use trellis_ioc::component_registry::ComponentDefinitionRegistry;
use trellis_ioc::error::BeanResolutionError;
use trellis_ioc::factory::BeanFactory;
use trellis_ioc::instance_provider::{
    AnyBeanPtr, BeanPtr, ConstructorArgs, ErrorPtr, TypedBeanResolver,
};
use trellis_ioc::options::{BeanMode, FieldSpec, LookupOptions, RegistrationOptions};

static STOP_COUNT: AtomicUsize = AtomicUsize::new(0);

trait Greeter: Send + Sync + std::fmt::Debug {
    fn greet(&self, input: &str) -> String;
}

impl Injectable for dyn Greeter {}

#[derive(Default, Debug)]
struct EchoGreeter;

impl Greeter for EchoGreeter {
    fn greet(&self, input: &str) -> String {
        input.to_string()
    }
}

impl Injectable for EchoGreeter {}
impl Component for EchoGreeter {}

impl ComponentDowncast<EchoGreeter> for dyn Greeter {
    fn downcast(source: AnyBeanPtr) -> Result<BeanPtr<Self>, AnyBeanPtr> {
        source
            .downcast::<RwLock<EchoGreeter>>()
            .map(|bean| bean as BeanPtr<dyn Greeter>)
    }
}

#[derive(Default, Debug)]
struct UpperGreeter;

impl Greeter for UpperGreeter {
    fn greet(&self, input: &str) -> String {
        input.to_uppercase()
    }
}

impl Injectable for UpperGreeter {}
impl Component for UpperGreeter {}

impl ComponentDowncast<UpperGreeter> for dyn Greeter {
    fn downcast(source: AnyBeanPtr) -> Result<BeanPtr<Self>, AnyBeanPtr> {
        source
            .downcast::<RwLock<UpperGreeter>>()
            .map(|bean| bean as BeanPtr<dyn Greeter>)
    }
}

#[derive(Default)]
struct AuditLog;

impl Injectable for AuditLog {}
impl Component for AuditLog {}

#[derive(Default)]
struct Counter;

impl Injectable for Counter {}
impl Component for Counter {}

#[derive(Default)]
struct App {
    greeter: Option<BeanPtr<dyn Greeter>>,
}

impl Injectable for App {}

impl Component for App {
    fn injection_points() -> Vec<InjectionPoint> {
        vec![InjectionPoint::new::<Self, dyn Greeter>("greeter", |app, bean| {
            app.greeter = Some(bean);
        })]
    }
}

#[derive(Default)]
struct LazyHolder {
    audit: Option<BeanPtr<AuditLog>>,
}

impl Injectable for LazyHolder {}

impl Component for LazyHolder {
    fn injection_points() -> Vec<InjectionPoint> {
        vec![InjectionPoint::with_spec::<Self, AuditLog>(
            "audit",
            FieldSpec::default().lazy(),
            |holder, bean| holder.audit = Some(bean),
        )]
    }
}

#[derive(Default)]
struct Stoppable;

impl Injectable for Stoppable {}

impl Component for Stoppable {
    fn graceful_stop(&self) {
        STOP_COUNT.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct Configured {
    prefix: String,
}

impl Injectable for Configured {}

impl Component for Configured {
    fn init(&mut self, args: &ConstructorArgs) -> Result<(), ErrorPtr> {
        if let Some(prefix) = args.get::<String>(0) {
            self.prefix = prefix.clone();
        }
        Ok(())
    }
}

#[derive(Default)]
struct WorkerA {
    counter: Option<BeanPtr<Counter>>,
}

impl Injectable for WorkerA {}

impl Component for WorkerA {
    fn injection_points() -> Vec<InjectionPoint> {
        vec![InjectionPoint::new::<Self, Counter>("counter", |worker, bean| {
            worker.counter = Some(bean);
        })]
    }
}

#[derive(Default)]
struct WorkerB {
    counter: Option<BeanPtr<Counter>>,
}

impl Injectable for WorkerB {}

impl Component for WorkerB {
    fn injection_points() -> Vec<InjectionPoint> {
        vec![InjectionPoint::new::<Self, Counter>("counter", |worker, bean| {
            worker.counter = Some(bean);
        })]
    }
}

mod dup_one {
    use trellis_ioc::component::{Component, Injectable};

    #[derive(Default)]
    pub struct Service;

    impl Injectable for Service {}
    impl Component for Service {}
}

mod dup_two {
    use trellis_ioc::component::{Component, Injectable};

    #[derive(Default, Debug)]
    pub struct Service;

    impl Injectable for Service {}
    impl Component for Service {}
}

fn greeter_factory() -> BeanFactory {
    let mut registry = ComponentDefinitionRegistry::new();
    registry.bind::<dyn Greeter, EchoGreeter>(RegistrationOptions::new().with_order(1));
    registry.bind::<dyn Greeter, UpperGreeter>(RegistrationOptions::new().with_order(2));
    registry.register::<App>(RegistrationOptions::default());
    BeanFactory::new(registry)
}

#[test]
fn should_return_identical_singleton_instances() {
    let mut registry = ComponentDefinitionRegistry::new();
    registry.register::<Counter>(RegistrationOptions::default());
    let factory = BeanFactory::new(registry);

    let first = factory.resolve::<Counter>().unwrap();
    let second = factory.resolve::<Counter>().unwrap();

    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn should_create_distinct_multi_instances() {
    let mut registry = ComponentDefinitionRegistry::new();
    registry.register::<Counter>(RegistrationOptions::new().with_multi(true));
    let factory = BeanFactory::new(registry);

    let first = factory.resolve::<Counter>().unwrap();
    let second = factory.resolve::<Counter>().unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert!(factory.store().is_empty());
}

#[test]
fn should_keep_first_registration_on_ambiguous_duplicate() {
    let mut registry = ComponentDefinitionRegistry::new();
    registry.register::<dup_one::Service>(RegistrationOptions::new().with_namespace("dup"));
    registry.register::<dup_two::Service>(RegistrationOptions::new().with_namespace("dup"));
    assert_eq!(registry.len(), 1);

    let factory = BeanFactory::new(registry);

    // the surviving definition is the first one, so the first type resolves...
    factory
        .resolve_with::<dup_one::Service>(LookupOptions::new().with_namespace("dup"))
        .unwrap();

    // ...while the ignored second type no longer matches the stored instance
    assert!(matches!(
        factory
            .resolve_with::<dup_two::Service>(LookupOptions::new().with_namespace("dup"))
            .unwrap_err(),
        BeanResolutionError::IncompatibleBean(..)
    ));
}

#[test]
fn should_resolve_binding_with_lowest_order() {
    let factory = greeter_factory();

    let greeter = factory.resolve::<dyn Greeter>().unwrap();
    let greeting = greeter.read().unwrap().greet("MiXeD");

    // EchoGreeter carries order 1 and must win over UpperGreeter's order 2
    assert_eq!(greeting, "MiXeD");
}

#[test]
fn should_resolve_pool_variant_by_name() {
    let factory = greeter_factory();

    let greeter = factory
        .resolve_with::<dyn Greeter>(LookupOptions::new().with_variant("UpperGreeter"))
        .unwrap();

    assert_eq!(greeter.read().unwrap().greet("MiXeD"), "MIXED");
    assert!(matches!(
        factory
            .resolve_with::<dyn Greeter>(LookupOptions::new().with_variant("MissingGreeter"))
            .unwrap_err(),
        BeanResolutionError::UnknownVariant { .. }
    ));
}

#[test]
fn should_inject_interface_dependency() {
    let factory = greeter_factory();

    let app = factory.get::<App>();
    let greeter = app.read().unwrap().greeter.clone().unwrap();

    assert_eq!(greeter.read().unwrap().greet("hello"), "hello");

    // the injected dependency shares identity with a direct interface lookup
    let direct = factory.resolve::<dyn Greeter>().unwrap();
    assert!(Arc::ptr_eq(&greeter, &direct));
}

#[test]
fn should_inject_lazy_field_after_delay() {
    let mut registry = ComponentDefinitionRegistry::new();
    registry.register::<LazyHolder>(RegistrationOptions::default());
    registry.register::<AuditLog>(RegistrationOptions::default());
    let factory = BeanFactory::new(registry);

    let holder = factory.resolve::<LazyHolder>().unwrap();
    assert!(holder.read().unwrap().audit.is_none());

    let deadline = Instant::now() + Duration::from_secs(5);
    while holder.read().unwrap().audit.is_none() {
        assert!(Instant::now() < deadline, "lazy field was never injected");
        thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn should_await_readiness_of_lazy_bean() {
    let mut registry = ComponentDefinitionRegistry::new();
    registry.register::<AuditLog>(RegistrationOptions::default());
    let factory = BeanFactory::new(registry);

    factory
        .resolve_with::<AuditLog>(LookupOptions::new().with_lazy())
        .unwrap();

    let key = factory.definitions().find(None, Some("AuditLog")).unwrap().key();
    assert!(factory.await_ready(&key, Duration::from_secs(5)));
    assert!(!factory.await_ready("no:SuchBean", Duration::from_millis(10)));
}

#[test]
fn should_stop_each_bean_once_and_reconstruct_after_shutdown() {
    let mut registry = ComponentDefinitionRegistry::new();
    registry.register::<Stoppable>(RegistrationOptions::default());
    let factory = BeanFactory::new(registry);

    let before = STOP_COUNT.load(Ordering::SeqCst);
    let first = factory.resolve::<Stoppable>().unwrap();

    factory.graceful_stop();
    assert_eq!(STOP_COUNT.load(Ordering::SeqCst), before + 1);
    assert!(factory.store().is_empty());

    let second = factory.resolve::<Stoppable>().unwrap();
    assert!(!Arc::ptr_eq(&first, &second));

    // restart stops the previous instance and builds the subtree again
    let third = factory.restart::<Stoppable>().unwrap();
    assert_eq!(STOP_COUNT.load(Ordering::SeqCst), before + 2);
    assert!(!Arc::ptr_eq(&second, &third));
}

#[test]
fn should_pass_constructor_args_to_init_hook() {
    let mut registry = ComponentDefinitionRegistry::new();
    registry.register::<Configured>(RegistrationOptions::default());
    let factory = BeanFactory::new(registry);

    let configured = factory
        .resolve_with::<Configured>(
            LookupOptions::new().with_args(ConstructorArgs::new().with("hi, ".to_string())),
        )
        .unwrap();

    assert_eq!(configured.read().unwrap().prefix, "hi, ");
}

#[test]
fn should_use_fresh_instances_for_multi_mode_injection_sites() {
    let mut registry = ComponentDefinitionRegistry::new();
    registry.register::<Counter>(RegistrationOptions::default());
    registry.register::<WorkerA>(RegistrationOptions::default());
    registry.register::<WorkerB>(RegistrationOptions::default());
    let factory = BeanFactory::new(registry);
    factory.set_default_mode(BeanMode::Multi);

    let a = factory.get::<WorkerA>();
    let b = factory.get::<WorkerB>();

    let counter_a = a.read().unwrap().counter.clone().unwrap();
    let counter_b = b.read().unwrap().counter.clone().unwrap();

    assert!(!Arc::ptr_eq(&counter_a, &counter_b));
    // only the workers themselves are cached - injection-site instances have no shared name
    assert_eq!(factory.store().len(), 2);
}

#[test]
fn should_warn_and_return_none_for_missing_bean() {
    let factory = BeanFactory::new(ComponentDefinitionRegistry::new());
    assert!(factory.try_resolve::<Counter>().is_none());
}

#[test]
fn should_resolve_end_to_end_greeter_contract() {
    // spec contract: Echo bound with priority 1, Upper with priority 2 - resolution yields
    // Echo's behavior, and the cached interface bean keeps singleton identity
    let factory = greeter_factory();

    let first = factory.resolve::<dyn Greeter>().unwrap();
    let second = factory.resolve::<dyn Greeter>().unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.read().unwrap().greet("input unchanged"), "input unchanged");
}
