//! Batch operations over the pacman adapter.

use async_trait::async_trait;

use crate::bridge::batch::BatchOperation;
use crate::bridge::error::BridgeError;
use crate::bridge::executor::ExecOutcome;
use crate::common::pacman::PacmanBackend;

/// "install package X": satisfied when the package is already installed.
pub struct InstallOperation<'a> {
    backend: &'a PacmanBackend,
}

impl<'a> InstallOperation<'a> {
    pub fn new(backend: &'a PacmanBackend) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl BatchOperation for InstallOperation<'_> {
    fn verb(&self) -> &str {
        "install"
    }

    fn past_tense(&self) -> &str {
        "installed"
    }

    async fn is_satisfied(&self, item: &str) -> Result<bool, BridgeError> {
        self.backend.is_installed(item).await
    }

    async fn apply(&self, item: &str) -> Result<ExecOutcome, BridgeError> {
        self.backend.install(item).await
    }
}

/// "remove package X": satisfied when the package is already absent.
pub struct RemoveOperation<'a> {
    backend: &'a PacmanBackend,
}

impl<'a> RemoveOperation<'a> {
    pub fn new(backend: &'a PacmanBackend) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl BatchOperation for RemoveOperation<'_> {
    fn verb(&self) -> &str {
        "remove"
    }

    fn past_tense(&self) -> &str {
        "removed"
    }

    async fn is_satisfied(&self, item: &str) -> Result<bool, BridgeError> {
        Ok(!self.backend.is_installed(item).await?)
    }

    async fn apply(&self, item: &str) -> Result<ExecOutcome, BridgeError> {
        self.backend.remove(item).await
    }
}
