use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use tokio::sync::watch;

use super::capture::ExchangeCapture;
use super::endpoints::EndpointRegistry;
use super::target::ResolvedTarget;
use crate::error::{ChatVaultError, Result};
use crate::models::InterceptedExchange;

/// Live settings of the capture layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConfig {
    pub enabled: bool,
    pub max_body_bytes: usize,
}

impl CaptureConfig {
    pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_body_bytes: Self::DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Receives every completed exchange while installed.
pub trait ExchangeObserver: Send + Sync {
    fn on_exchange(&self, exchange: InterceptedExchange);
}

impl<F> ExchangeObserver for F
where
    F: Fn(InterceptedExchange) + Send + Sync,
{
    fn on_exchange(&self, exchange: InterceptedExchange) {
        self(exchange)
    }
}

struct Installed {
    id: u64,
    observer: Arc<dyn ExchangeObserver>,
}

/// Shared state behind every transport tap: the endpoint registry, the live
/// config, and at most one installed observer.
pub struct CaptureHub {
    registry: &'static EndpointRegistry,
    config: watch::Receiver<CaptureConfig>,
    installed: RwLock<Option<Installed>>,
    next_id: AtomicU64,
}

/// Write side of the live capture config.
#[derive(Clone)]
pub struct CaptureSettings {
    sender: Arc<watch::Sender<CaptureConfig>>,
}

impl CaptureSettings {
    pub fn current(&self) -> CaptureConfig {
        *self.sender.borrow()
    }

    /// Takes effect for the next call through any tap.
    pub fn update(&self, config: CaptureConfig) {
        self.sender.send_replace(config);
        tracing::info!(
            enabled = config.enabled,
            max_body_bytes = config.max_body_bytes,
            "Capture config updated"
        );
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.update(CaptureConfig {
            enabled,
            ..self.current()
        });
    }

    pub fn set_max_body_bytes(&self, max_body_bytes: usize) {
        self.update(CaptureConfig {
            max_body_bytes,
            ..self.current()
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<CaptureConfig> {
        self.sender.subscribe()
    }
}

/// Capability returned by [`CaptureHub::install`]; removing it (or dropping
/// it) uninstalls the observer. Removal is idempotent.
pub struct InstallToken {
    hub: Weak<CaptureHub>,
    id: u64,
    removed: bool,
}

impl InstallToken {
    pub fn remove(mut self) {
        self.release();
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    fn release(&mut self) {
        if self.removed {
            return;
        }
        self.removed = true;
        if let Some(hub) = self.hub.upgrade() {
            hub.uninstall(self.id);
        }
    }
}

impl Drop for InstallToken {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for InstallToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallToken")
            .field("id", &self.id)
            .field("removed", &self.removed)
            .finish()
    }
}

impl CaptureHub {
    pub fn new(config: CaptureConfig) -> (Arc<Self>, CaptureSettings) {
        let (sender, receiver) = watch::channel(config);
        let hub = Arc::new(Self::with_receiver(receiver));
        (
            hub,
            CaptureSettings {
                sender: Arc::new(sender),
            },
        )
    }

    pub fn with_receiver(config: watch::Receiver<CaptureConfig>) -> Self {
        Self {
            registry: EndpointRegistry::global(),
            config,
            installed: RwLock::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> CaptureConfig {
        *self.config.borrow()
    }

    /// Installs `observer`. A second install while one is active is refused.
    pub fn install(self: &Arc<Self>, observer: Arc<dyn ExchangeObserver>) -> Result<InstallToken> {
        let mut slot = self.write_slot();
        if slot.is_some() {
            tracing::warn!("Capture observer already installed, skipping");
            return Err(ChatVaultError::AlreadyInstalled);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        *slot = Some(Installed { id, observer });
        tracing::info!(token = id, "Capture observer installed");

        Ok(InstallToken {
            hub: Arc::downgrade(self),
            id,
            removed: false,
        })
    }

    fn uninstall(&self, id: u64) {
        let mut slot = self.write_slot();
        if slot.as_ref().is_some_and(|installed| installed.id == id) {
            *slot = None;
            tracing::info!(token = id, "Capture observer removed");
        }
    }

    pub fn is_installed(&self) -> bool {
        self.read_slot().is_some()
    }

    /// Installed and enabled: taps capture only while this holds.
    pub fn is_active(&self) -> bool {
        self.config().enabled && self.is_installed()
    }

    /// Start capturing a call if the hub is active and the target is a known
    /// AI endpoint. `None` means the call must pass through untouched.
    pub fn begin(self: &Arc<Self>, target: &ResolvedTarget) -> Option<ExchangeCapture> {
        if !self.is_active() {
            return None;
        }

        let endpoint = self
            .registry
            .match_endpoint(&target.hostname, &target.path)?;

        tracing::debug!(
            provider = %endpoint.provider,
            endpoint = endpoint.label,
            method = %target.method,
            "Capturing AI exchange"
        );

        Some(ExchangeCapture::new(
            Arc::clone(self),
            endpoint,
            target.clone(),
            self.config().max_body_bytes,
        ))
    }

    /// Hand a finished exchange to the observer. Observer panics are
    /// contained and logged.
    pub(crate) fn deliver(&self, exchange: InterceptedExchange) {
        let observer = match self.read_slot().as_ref() {
            Some(installed) => Arc::clone(&installed.observer),
            None => {
                tracing::debug!("Exchange completed after observer removal, dropping");
                return;
            }
        };

        fail_open("deliver exchange", || observer.on_exchange(exchange));
    }

    fn read_slot(&self) -> RwLockReadGuard<'_, Option<Installed>> {
        self.installed.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_slot(&self) -> RwLockWriteGuard<'_, Option<Installed>> {
        self.installed.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Run one capture step; a panic inside it is logged and turned into `None`
/// so the wrapped network call is never affected.
pub(crate) fn fail_open<T>(step: &str, f: impl FnOnce() -> T) -> Option<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::warn!(step = step, reason = %reason, "Capture step failed, continuing uncaptured");
            None
        }
    }
}
