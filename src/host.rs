//! Collaborators supplied by the embedding application.
//!
//! A session reads whether localization is switched on, whether the
//! current origin is allowed, what today's date is, and reports each
//! conversion. Each of these is a small trait here so hosts can back them
//! with whatever storage they have. [`SettingsStore`] is an in-memory
//! implementation of the lot.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Local;
use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::debug;

use crate::config::Settings;
use crate::consts::{WILDCARD_ORIGIN, WILDCARD_SUBDOMAIN_PREFIX};
use crate::gregorian::GregorianDate;

/// Source of the user's on/off switch.
#[async_trait]
pub trait EnablementStore: Send + Sync {
    async fn get(&self) -> bool;

    /// Receives every change of the switch after subscription.
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// Decides which origins may be localized.
#[async_trait]
pub trait OriginAllowList: Send + Sync {
    async fn is_origin_allowed(&self, origin: &str) -> bool;
}

/// Fire-and-forget sink for the running conversion total.
pub trait ConversionCounter: Send + Sync {
    fn increment(&self);
}

/// Reference date for relative phrases such as "yesterday".
pub trait Clock: Send + Sync {
    /// `None` when the current date is not representable.
    fn today(&self) -> Option<GregorianDate>;
}

#[async_trait]
impl<T: EnablementStore + ?Sized> EnablementStore for Arc<T> {
    async fn get(&self) -> bool {
        (**self).get().await
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        (**self).subscribe()
    }
}

#[async_trait]
impl<T: OriginAllowList + ?Sized> OriginAllowList for Arc<T> {
    async fn is_origin_allowed(&self, origin: &str) -> bool {
        (**self).is_origin_allowed(origin).await
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCounter;

impl ConversionCounter for NoopCounter {
    fn increment(&self) {}
}

/// Counter kept in process memory.
#[derive(Debug, Default)]
pub struct AtomicCounter(AtomicU64);

impl AtomicCounter {
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl ConversionCounter for AtomicCounter {
    fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}

/// The local wall-clock date.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> Option<GregorianDate> {
        GregorianDate::try_from(Local::now().date_naive()).ok()
    }
}

/// Always reports the same date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub GregorianDate);

impl Clock for FixedClock {
    fn today(&self) -> Option<GregorianDate> {
        Some(self.0)
    }
}

/// Host part of an origin or URL, without scheme, credentials, path or port.
pub fn hostname(origin: &str) -> &str {
    let rest = origin.split_once("://").map_or(origin, |(_, rest)| rest);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    host.rsplit_once(':')
        .filter(|(_, port)| !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()))
        .map_or(host, |(host, _)| host)
}

/// Allow-list of origin patterns.
///
/// An entry matches when it is `*`, when it is `*.suffix` and the host
/// ends with `suffix`, or when the host equals or contains it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowList {
    entries: Vec<String>,
}

impl Default for AllowList {
    fn default() -> Self {
        Self::new([WILDCARD_ORIGIN])
    }
}

impl AllowList {
    /// Blank entries are dropped; entries are compared case-insensitively.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|e| e.as_ref().trim().to_ascii_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        if self.entries.iter().any(|e| e == WILDCARD_ORIGIN) {
            return true;
        }
        let host = hostname(origin).to_ascii_lowercase();
        self.entries
            .iter()
            .any(|entry| match entry.strip_prefix(WILDCARD_SUBDOMAIN_PREFIX) {
                Some(suffix) => host.ends_with(suffix),
                None => host == *entry || host.contains(entry.as_str()),
            })
    }
}

#[async_trait]
impl OriginAllowList for AllowList {
    async fn is_origin_allowed(&self, origin: &str) -> bool {
        self.is_allowed(origin)
    }
}

/// In-memory [`Settings`] with change notification for the on/off switch.
#[derive(Debug)]
pub struct SettingsStore {
    settings: RwLock<Settings>,
    enabled: watch::Sender<bool>,
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl SettingsStore {
    pub fn new(settings: Settings) -> Self {
        let (enabled, _) = watch::channel(settings.enabled);
        Self {
            settings: RwLock::new(settings),
            enabled,
        }
    }

    /// Flips the switch. Subscribers only hear about actual changes.
    pub fn set_enabled(&self, enabled: bool) {
        self.settings.write().enabled = enabled;
        let changed = self.enabled.send_if_modified(|current| {
            let changed = *current != enabled;
            *current = enabled;
            changed
        });
        debug!(enabled, changed, "enablement updated");
    }

    pub fn set_allowed_domains<I, S>(&self, domains: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.settings.write().allowed_domains = domains.into_iter().map(Into::into).collect();
    }

    pub fn converted_count(&self) -> u64 {
        self.settings.read().converted_count
    }

    pub fn snapshot(&self) -> Settings {
        self.settings.read().clone()
    }
}

#[async_trait]
impl EnablementStore for SettingsStore {
    async fn get(&self) -> bool {
        self.settings.read().enabled
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.enabled.subscribe()
    }
}

#[async_trait]
impl OriginAllowList for SettingsStore {
    async fn is_origin_allowed(&self, origin: &str) -> bool {
        let list = AllowList::new(&self.settings.read().allowed_domains);
        list.is_allowed(origin)
    }
}

impl ConversionCounter for SettingsStore {
    fn increment(&self) {
        let mut settings = self.settings.write();
        settings.converted_count = settings.converted_count.saturating_add(1);
    }
}
