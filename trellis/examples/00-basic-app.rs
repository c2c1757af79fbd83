use std::time::Duration;
use trellis::application;
use trellis_ioc::component::{Component, Injectable};
use trellis_ioc::component_registry::ComponentDefinitionRegistry;
use trellis_ioc::factory::BeanFactory;
use trellis_ioc::instance_provider::{ConstructorArgs, ErrorPtr};
use trellis_ioc::options::RegistrationOptions;

#[derive(Default)]
struct Server;

impl Injectable for Server {}

impl Component for Server {
    fn init(&mut self, _args: &ConstructorArgs) -> Result<(), ErrorPtr> {
        println!("server component constructed");
        Ok(())
    }

    fn graceful_stop(&self) {
        println!("server component stopped");
    }
}

#[tokio::main]
async fn main() -> Result<(), application::ApplicationError> {
    let mut registry = ComponentDefinitionRegistry::new();
    registry.register::<Server>(RegistrationOptions::default());

    let application = application::create(BeanFactory::new(registry))?;

    // a real application would wait for ctrl-c; this one stops itself after a moment
    let shutdown = application.shutdown_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        shutdown.exit();
    });

    application.run::<Server>().await
}
