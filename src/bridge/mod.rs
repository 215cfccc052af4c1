//! The command execution and structured-response bridge.
//!
//! Front ends talk to the system exclusively through this module: actions go
//! in, one [`protocol::ResponseEnvelope`] comes out. The bridge owns the
//! process-wide state (privilege session, catalog cache) through an explicit
//! context object instead of globals, so invalidation and expiry are
//! testable calls rather than hidden mutations.

pub mod actions;
pub mod batch;
pub mod cache;
pub mod error;
pub mod executor;
pub mod privilege;
pub mod protocol;

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use batch::BatchRunner;
use cache::CatalogCache;
use executor::CommandExecutor;
use privilege::PrivilegeSession;

use crate::common::config::Config;
use crate::common::pacman::PacmanBackend;

/// Process-wide bridge state, owned by the entry point and passed by
/// reference into every action.
pub struct BridgeContext {
    pub config: Config,
    pub executor: CommandExecutor,
    pub runner: BatchRunner,
    pub cache: CatalogCache,
    pub backend: Arc<PacmanBackend>,
    /// Interrupt flag shared with the signal task. The runner only reads it;
    /// the menu re-arms it between batches.
    pub cancel: Arc<AtomicBool>,
}

impl BridgeContext {
    pub fn new(config: Config, session: Arc<PrivilegeSession>, cancel: Arc<AtomicBool>) -> Self {
        let executor = CommandExecutor::new(
            session,
            Duration::from_secs(config.command_timeout_secs),
        );
        let backend = Arc::new(PacmanBackend::new(executor.clone(), &config));
        let cache = CatalogCache::new(backend.clone());

        Self {
            config,
            executor,
            runner: BatchRunner::new(cancel.clone()),
            cache,
            backend,
            cancel,
        }
    }
}
