use std::sync::RwLock;
use trellis_ioc::component::{Component, ComponentDowncast, Injectable, InjectionPoint};
use trellis_ioc::component_registry::ComponentDefinitionRegistry;
use trellis_ioc::factory::BeanFactory;
use trellis_ioc::instance_provider::{AnyBeanPtr, BeanPtr, TypedBeanResolver};
use trellis_ioc::options::RegistrationOptions;

trait MessageSource: Send + Sync {
    fn message(&self) -> String;
}

impl Injectable for dyn MessageSource {}

#[derive(Default)]
struct StaticMessageSource;

impl MessageSource for StaticMessageSource {
    fn message(&self) -> String {
        "hello from an injected component".to_string()
    }
}

impl Injectable for StaticMessageSource {}
impl Component for StaticMessageSource {}

impl ComponentDowncast<StaticMessageSource> for dyn MessageSource {
    fn downcast(source: AnyBeanPtr) -> Result<BeanPtr<Self>, AnyBeanPtr> {
        source
            .downcast::<RwLock<StaticMessageSource>>()
            .map(|bean| bean as BeanPtr<dyn MessageSource>)
    }
}

#[derive(Default)]
struct Printer {
    source: Option<BeanPtr<dyn MessageSource>>,
}

impl Injectable for Printer {}

impl Component for Printer {
    fn injection_points() -> Vec<InjectionPoint> {
        vec![InjectionPoint::new::<Self, dyn MessageSource>(
            "source",
            |printer, bean| printer.source = Some(bean),
        )]
    }
}

fn main() {
    let mut registry = ComponentDefinitionRegistry::new();
    registry.bind::<dyn MessageSource, StaticMessageSource>(RegistrationOptions::default());
    registry.register::<Printer>(RegistrationOptions::default());

    let factory = BeanFactory::new(registry);
    let printer = factory.get::<Printer>();

    let source = printer.read().unwrap().source.clone().unwrap();
    println!("{}", source.read().unwrap().message());
}
