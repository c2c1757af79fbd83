use std::sync::RwLock;
use trellis_ioc::component::{Component, ComponentDowncast, Injectable};
use trellis_ioc::component_registry::ComponentDefinitionRegistry;
use trellis_ioc::factory::BeanFactory;
use trellis_ioc::instance_provider::{AnyBeanPtr, BeanPtr, TypedBeanResolver};
use trellis_ioc::options::{LookupOptions, RegistrationOptions};

trait Codec: Send + Sync {
    fn name(&self) -> &'static str;
}

impl Injectable for dyn Codec {}

#[derive(Default)]
struct JsonCodec;

impl Codec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }
}

impl Injectable for JsonCodec {}
impl Component for JsonCodec {}

impl ComponentDowncast<JsonCodec> for dyn Codec {
    fn downcast(source: AnyBeanPtr) -> Result<BeanPtr<Self>, AnyBeanPtr> {
        source
            .downcast::<RwLock<JsonCodec>>()
            .map(|bean| bean as BeanPtr<dyn Codec>)
    }
}

#[derive(Default)]
struct BinaryCodec;

impl Codec for BinaryCodec {
    fn name(&self) -> &'static str {
        "binary"
    }
}

impl Injectable for BinaryCodec {}
impl Component for BinaryCodec {}

impl ComponentDowncast<BinaryCodec> for dyn Codec {
    fn downcast(source: AnyBeanPtr) -> Result<BeanPtr<Self>, AnyBeanPtr> {
        source
            .downcast::<RwLock<BinaryCodec>>()
            .map(|bean| bean as BeanPtr<dyn Codec>)
    }
}

fn main() {
    let mut registry = ComponentDefinitionRegistry::new();

    // lower order wins when resolving the plain interface
    registry.bind::<dyn Codec, BinaryCodec>(RegistrationOptions::new().with_order(1));
    registry.bind::<dyn Codec, JsonCodec>(RegistrationOptions::new().with_order(2));

    let factory = BeanFactory::new(registry);

    let current = factory.get::<dyn Codec>();
    println!("current codec: {}", current.read().unwrap().name());

    // losing bindings stay addressable by implementation name
    let json = factory.get_with::<dyn Codec>(LookupOptions::new().with_variant("JsonCodec"));
    println!("explicitly selected codec: {}", json.read().unwrap().name());
}
