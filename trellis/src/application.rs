//! Core application framework functionality.

use crate::config::ApplicationConfig;
use config::ConfigError;
use derive_more::{Constructor, Display};
use thiserror::Error;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use trellis_ioc::component::Injectable;
use trellis_ioc::error::BeanResolutionError;
use trellis_ioc::factory::BeanFactory;
use trellis_ioc::instance_provider::{BeanPtr, TypedBeanResolver};

#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("Error resolving root component: {0}")]
    RootResolution(#[from] BeanResolutionError),
    #[error("Error loading application config: {0}")]
    Config(#[from] ConfigError),
}

/// What caused the application to shut down.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, Hash)]
pub enum ShutdownReason {
    #[display(fmt = "interrupt signal")]
    Interrupt,
    #[display(fmt = "termination signal")]
    Terminate,
    #[display(fmt = "shutdown request")]
    Requested,
}

/// Cloneable trigger for a graceful, programmatic shutdown of the owning [Application]. Can be
/// handed to components or background tasks.
#[derive(Clone, Constructor)]
pub struct ShutdownHandle {
    sender: Sender<ShutdownReason>,
}

impl ShutdownHandle {
    /// Requests graceful shutdown. The trigger channel is buffered with capacity 1, so the
    /// request is not lost when nothing is waiting yet, and duplicate requests are dropped.
    pub fn exit(&self) {
        let _ = self.sender.try_send(ShutdownReason::Requested);
    }
}

/// Main entrypoint for the application: resolves the designated root component, keeps the
/// process alive until an external shutdown trigger arrives, then stops every live component.
pub struct Application {
    factory: BeanFactory,
    shutdown: ShutdownHandle,
    signals: Receiver<ShutdownReason>,
}

impl Application {
    pub fn new(factory: BeanFactory) -> Self {
        let (sender, signals) = mpsc::channel(1);
        Self {
            factory,
            shutdown: ShutdownHandle::new(sender),
            signals,
        }
    }

    pub fn factory(&self) -> &BeanFactory {
        &self.factory
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Resolves the root component `T`, transitively constructing its dependency subtree, then
    /// blocks until SIGINT/SIGTERM or a [ShutdownHandle] request arrives, and finally runs
    /// graceful shutdown synchronously to completion.
    pub async fn run<T: Injectable + ?Sized>(mut self) -> Result<(), ApplicationError> {
        info!("Resolving root component...");
        self.factory.resolve::<T>()?;

        info!("Application started; waiting for a shutdown trigger.");
        let reason = self.wait_for_shutdown().await;

        info!("Received {reason}; shutting down.");
        self.factory.graceful_stop();
        Ok(())
    }

    /// Stops every live component and resolves the given root type afresh, reconstructing its
    /// whole dependency subtree.
    pub fn restart<T: Injectable + ?Sized>(&self) -> Result<BeanPtr<T>, BeanResolutionError> {
        self.factory.restart::<T>()
    }

    async fn wait_for_shutdown(&mut self) -> ShutdownReason {
        #[cfg(unix)]
        let terminate = {
            use tokio::signal::unix::{signal, SignalKind};

            match signal(SignalKind::terminate()) {
                Ok(stream) => Some(stream),
                Err(cause) => {
                    error!("Cannot install termination signal handler: {cause}");
                    None
                }
            }
        };
        #[cfg(unix)]
        let terminate = async move {
            let mut terminate = terminate;
            match terminate.as_mut() {
                Some(stream) => stream.recv().await,
                None => std::future::pending().await,
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<Option<()>>();

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(cause) = result {
                    error!("Cannot listen for interrupt signals: {cause}");
                }
                ShutdownReason::Interrupt
            }
            Some(()) = terminate => ShutdownReason::Terminate,
            reason = self.signals.recv() => reason.unwrap_or(ShutdownReason::Requested),
        }
    }
}

/// Creates an [Application] configured from the environment, installing the default tracing
/// logger when the config asks for one.
pub fn create(factory: BeanFactory) -> Result<Application, ApplicationError> {
    let config = ApplicationConfig::init_from_environment()?;
    if config.install_tracing_logger {
        install_tracing_logger();
    }

    Ok(Application::new(factory))
}

fn install_tracing_logger() {
    if tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
        .is_err()
    {
        warn!("A global tracing subscriber is already installed.");
    }
}
