//! Location permission gate.
//!
//! Wraps the platform's permission prompts as plain boolean capabilities.
//! Foreground access is required to monitor at all; background access only
//! enables OS-delivered updates while the app is suspended.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// The two location permission scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionKind {
    Foreground,
    Background,
}

/// Platform permission capability.
///
/// Implementations collapse platform errors to `false`; a failed prompt is
/// treated the same as a denial.
#[async_trait]
pub trait PermissionGate: Send + Sync {
    /// Whether "while in use" location access is currently granted.
    async fn has_foreground_permission(&self) -> bool;

    /// Prompt for foreground access. Returns true iff granted.
    async fn request_foreground_permission(&self) -> bool;

    /// Whether "always" location access is currently granted.
    async fn has_background_permission(&self) -> bool;

    /// Prompt for background access. Returns true iff granted.
    async fn request_background_permission(&self) -> bool;
}

/// Shared permission gate reference.
pub type PermissionGateRef = Arc<dyn PermissionGate>;

/// Check, then prompt only if needed.
pub async fn ensure_permission(gate: &dyn PermissionGate, kind: PermissionKind) -> bool {
    let granted = match kind {
        PermissionKind::Foreground => {
            gate.has_foreground_permission().await || gate.request_foreground_permission().await
        }
        PermissionKind::Background => {
            gate.has_background_permission().await || gate.request_background_permission().await
        }
    };

    if granted {
        tracing::debug!(?kind, "location permission granted");
    } else {
        tracing::info!(?kind, "location permission denied");
    }
    granted
}

/// Gate for platforms without location services: everything is denied.
pub struct NullPermissions;

#[async_trait]
impl PermissionGate for NullPermissions {
    async fn has_foreground_permission(&self) -> bool {
        false
    }

    async fn request_foreground_permission(&self) -> bool {
        false
    }

    async fn has_background_permission(&self) -> bool {
        false
    }

    async fn request_background_permission(&self) -> bool {
        false
    }
}

/// Scripted gate for headless runs and tests.
///
/// Each scope starts granted or not, and a request either grants it or
/// leaves it denied. Request calls are counted.
#[derive(Debug, Default)]
pub struct StaticPermissions {
    foreground: AtomicBool,
    background: AtomicBool,
    grant_foreground_on_request: bool,
    grant_background_on_request: bool,
    foreground_requests: AtomicUsize,
    background_requests: AtomicUsize,
}

impl StaticPermissions {
    /// Both scopes already granted.
    pub fn granted() -> Self {
        Self {
            foreground: AtomicBool::new(true),
            background: AtomicBool::new(true),
            ..Self::default()
        }
    }

    /// Nothing granted, and every prompt is declined.
    pub fn denied() -> Self {
        Self::default()
    }

    /// Foreground granted, background declined.
    pub fn foreground_only() -> Self {
        Self {
            foreground: AtomicBool::new(true),
            ..Self::default()
        }
    }

    /// Nothing granted yet; prompts for the given scopes will be accepted.
    pub fn prompt(grant_foreground: bool, grant_background: bool) -> Self {
        Self {
            grant_foreground_on_request: grant_foreground,
            grant_background_on_request: grant_background,
            ..Self::default()
        }
    }

    pub fn foreground_requests(&self) -> usize {
        self.foreground_requests.load(Ordering::SeqCst)
    }

    pub fn background_requests(&self) -> usize {
        self.background_requests.load(Ordering::SeqCst)
    }

    /// Revoke a scope, as the user would from system settings.
    pub fn revoke(&self, kind: PermissionKind) {
        match kind {
            PermissionKind::Foreground => self.foreground.store(false, Ordering::SeqCst),
            PermissionKind::Background => self.background.store(false, Ordering::SeqCst),
        }
    }
}

#[async_trait]
impl PermissionGate for StaticPermissions {
    async fn has_foreground_permission(&self) -> bool {
        self.foreground.load(Ordering::SeqCst)
    }

    async fn request_foreground_permission(&self) -> bool {
        self.foreground_requests.fetch_add(1, Ordering::SeqCst);
        if self.grant_foreground_on_request {
            self.foreground.store(true, Ordering::SeqCst);
        }
        self.foreground.load(Ordering::SeqCst)
    }

    async fn has_background_permission(&self) -> bool {
        self.background.load(Ordering::SeqCst)
    }

    async fn request_background_permission(&self) -> bool {
        self.background_requests.fetch_add(1, Ordering::SeqCst);
        if self.grant_background_on_request {
            self.background.store(true, Ordering::SeqCst);
        }
        self.background.load(Ordering::SeqCst)
    }
}
