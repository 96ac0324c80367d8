//! Host hook interface.

use async_trait::async_trait;

use crate::whitelist::AttackDecision;

/// Events the host raises around its attack loop.
///
/// Implementations must never fail a hook: errors are logged and resolved
/// internally so the host loop keeps running.
#[async_trait]
pub trait DeauthHooks: Send + Sync {
    /// Called before a deauthentication frame is sent to `bssid`.
    async fn on_deauth_attempt(&self, bssid: &str, ssid: &str) -> AttackDecision;

    /// Called after a handshake was captured and written to `filename`.
    async fn on_handshake(&self, bssid: &str, ssid: &str, filename: &str);

    /// Called when the host gains internet connectivity.
    async fn on_internet_available(&self);
}
