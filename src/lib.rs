//! Deauth Whitelist - protect known networks from deauthentication attacks.
//!
//! The [`guard::WhitelistGuard`] answers the host's "may I attack this
//! network?" question from a persisted [`whitelist::WhitelistStore`], with an
//! optional [`audit::AuditLog`] and an HTTP management API in [`web`].

pub mod audit;
pub mod config;
pub mod display;
pub mod guard;
pub mod watcher;
pub mod web;
pub mod whitelist;
