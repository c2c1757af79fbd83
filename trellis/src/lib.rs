//! Application framework based on [trellis_ioc] dependency injection.
//!
//! Traditional applications start in `main()` and explicitly initialize and pass around their
//! services. With dependency injection in place, components form a graph managed by the
//! container, and what remains is an entrypoint which resolves the designated root component and
//! keeps the process alive until it is told to stop. This crate provides that entrypoint in the
//! form of [Application](application::Application): it resolves the root, blocks until an
//! interrupt/termination signal or a programmatic
//! [shutdown request](application::ShutdownHandle) arrives, and then runs graceful shutdown to
//! completion. It also configures supporting infrastructure, e.g. logging.

pub mod application;
pub mod config;
