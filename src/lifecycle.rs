//! Switches localization on and off for one document.
//!
//! The controller owns at most one live [`Session`]. A session is started
//! only when the enablement switch is on and the document's origin is on
//! the allow-list, and it is destroyed as soon as the switch goes off.

use std::future;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::LocalizerConfig;
use crate::document::DocumentTree;
use crate::host::{
    Clock, ConversionCounter, EnablementStore, NoopCounter, OriginAllowList, SystemClock,
};
use crate::session::{Session, SessionEvent, SessionState, SharedDocument};

enum ControllerEvent<N> {
    Enablement(Option<bool>),
    Session(SessionEvent<N>),
}

/// Starts and stops localization sessions in response to host signals.
pub struct LifecycleController<D, E, A>
where
    D: DocumentTree,
{
    document: SharedDocument<D>,
    root: D::NodeId,
    origin: String,
    enablement: E,
    allow_list: A,
    counter: Arc<dyn ConversionCounter>,
    clock: Arc<dyn Clock>,
    config: LocalizerConfig,
    session: Option<Session<D>>,
}

impl<D, E, A> LifecycleController<D, E, A>
where
    D: DocumentTree,
    E: EnablementStore,
    A: OriginAllowList,
{
    /// Conversions are not counted and relative phrases use the system
    /// clock unless overridden with the `with_*` builders.
    pub fn new(
        document: SharedDocument<D>,
        root: D::NodeId,
        origin: impl Into<String>,
        enablement: E,
        allow_list: A,
    ) -> Self {
        Self {
            document,
            root,
            origin: origin.into(),
            enablement,
            allow_list,
            counter: Arc::new(NoopCounter),
            clock: Arc::new(SystemClock),
            config: LocalizerConfig::default(),
            session: None,
        }
    }

    #[must_use]
    pub fn with_counter(mut self, counter: Arc<dyn ConversionCounter>) -> Self {
        self.counter = counter;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: LocalizerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub const fn session(&self) -> Option<&Session<D>> {
        self.session.as_ref()
    }

    pub const fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Starts a session if none is live and the host allows it.
    ///
    /// Waits for the configured ready delay before the first scan and
    /// re-reads the switch afterwards, since it may have flipped meanwhile.
    /// Returns whether a session is live on return.
    pub async fn activate(&mut self) -> bool {
        if self.session.is_some() {
            debug!("session already live");
            return true;
        }
        if !self.enablement.get().await {
            debug!("localization switched off");
            return false;
        }
        if !self.allow_list.is_origin_allowed(&self.origin).await {
            info!(origin = %self.origin, "origin not on the allow-list");
            return false;
        }

        tokio::time::sleep(self.config.ready_delay()).await;
        if !self.enablement.get().await {
            debug!("localization switched off while waiting for the document");
            return false;
        }

        let mut session = Session::new(
            Arc::clone(&self.document),
            self.root,
            self.config.clone(),
            Arc::clone(&self.counter),
            Arc::clone(&self.clock),
        );
        match session.start() {
            Ok(()) if session.state() == SessionState::Observing => {
                info!(origin = %self.origin, "localization session started");
                self.session = Some(session);
                true
            }
            Ok(()) => false,
            Err(err) => {
                warn!(origin = %self.origin, %err, "localization session not started");
                false
            }
        }
    }

    /// Destroys the live session, if any. Returns whether one was live.
    pub fn deactivate(&mut self) -> bool {
        match self.session.take() {
            Some(mut session) => {
                session.destroy();
                true
            }
            None => false,
        }
    }

    /// Reacts to a new value of the enablement switch.
    pub async fn apply(&mut self, enabled: bool) -> bool {
        if enabled {
            self.activate().await
        } else {
            self.deactivate();
            false
        }
    }

    /// Activates if allowed, then follows the enablement switch and drives
    /// the live session until the switch's sender goes away and no session
    /// is left.
    pub async fn run(&mut self) {
        let mut enablement = self.enablement.subscribe();
        enablement.borrow_and_update();
        self.activate().await;

        let mut feed_open = true;
        loop {
            let observing = self.session.is_some();
            if !feed_open && !observing {
                break;
            }

            let event = tokio::select! {
                changed = enablement.changed(), if feed_open => {
                    ControllerEvent::Enablement(changed.ok().map(|()| *enablement.borrow_and_update()))
                }
                event = next_session_event(self.session.as_mut()), if observing => {
                    ControllerEvent::Session(event)
                }
            };

            match event {
                ControllerEvent::Enablement(Some(enabled)) => {
                    debug!(enabled, "enablement changed");
                    self.apply(enabled).await;
                }
                ControllerEvent::Enablement(None) => {
                    debug!("enablement feed closed");
                    feed_open = false;
                }
                ControllerEvent::Session(event) => {
                    let keep = self
                        .session
                        .as_mut()
                        .is_some_and(|session| session.handle_event(event));
                    if !keep {
                        self.session = None;
                    }
                }
            }
        }
    }
}

async fn next_session_event<D: DocumentTree>(
    session: Option<&mut Session<D>>,
) -> SessionEvent<D::NodeId> {
    match session {
        Some(session) => session.next_event().await,
        None => future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;
    use crate::config::Settings;
    use crate::document::Document;
    use crate::gregorian::GregorianDate;
    use crate::host::{AllowList, FixedClock, SettingsStore};

    type Controller = LifecycleController<Document, Arc<SettingsStore>, AllowList>;

    fn document(text: &str) -> SharedDocument<Document> {
        let mut doc = Document::new();
        let root = doc.root();
        doc.append_text(root, text).unwrap();
        Arc::new(Mutex::new(doc))
    }

    fn controller(
        document: &SharedDocument<Document>,
        store: &Arc<SettingsStore>,
        allow: AllowList,
    ) -> Controller {
        let root = document.lock().root();
        LifecycleController::new(
            Arc::clone(document),
            root,
            "https://news.example.com/article",
            Arc::clone(store),
            allow,
        )
        .with_counter(store.clone())
        .with_clock(Arc::new(FixedClock(
            GregorianDate::new(2026, 10, 19).unwrap(),
        )))
    }

    fn text_of(document: &SharedDocument<Document>) -> String {
        let doc = document.lock();
        doc.text_content(doc.root())
    }

    #[tokio::test(start_paused = true)]
    async fn test_activate_localizes_after_ready_delay() {
        let doc = document("Published 2024-03-20");
        let store = Arc::new(SettingsStore::default());
        let mut controller = controller(&doc, &store, AllowList::default());

        let started = tokio::time::Instant::now();
        assert!(controller.activate().await);
        assert!(started.elapsed() >= Duration::from_millis(300));
        assert!(controller.is_active());
        assert_eq!(text_of(&doc), "Published 1403/01/01");
        assert_eq!(store.converted_count(), 1);

        // a second activation does not start another session
        assert!(controller.activate().await);
        assert_eq!(store.converted_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_or_disallowed_never_starts() {
        let doc = document("Published 2024-03-20");
        let store = Arc::new(SettingsStore::new(Settings {
            enabled: false,
            ..Settings::default()
        }));
        let mut disabled = controller(&doc, &store, AllowList::default());
        assert!(!disabled.activate().await);

        store.set_enabled(true);
        let mut disallowed = controller(&doc, &store, AllowList::new(["*.ir"]));
        assert!(!disallowed.activate().await);

        assert!(!disabled.is_active());
        assert!(!disallowed.is_active());
        assert_eq!(text_of(&doc), "Published 2024-03-20");
    }

    #[tokio::test(start_paused = true)]
    async fn test_switched_off_during_ready_delay() {
        let doc = document("Published 2024-03-20");
        let store = Arc::new(SettingsStore::default());
        let mut controller = controller(&doc, &store, AllowList::default());

        let flip = Arc::clone(&store);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            flip.set_enabled(false);
        });

        assert!(!controller.activate().await);
        assert_eq!(text_of(&doc), "Published 2024-03-20");
    }

    #[tokio::test(start_paused = true)]
    async fn test_deactivate_is_synchronous_and_idempotent() {
        let doc = document("Published 2024-03-20");
        let store = Arc::new(SettingsStore::default());
        let mut controller = controller(&doc, &store, AllowList::default());

        assert!(controller.apply(true).await);
        assert_eq!(doc.lock().subscriber_count(), 1);
        assert!(controller.deactivate());
        assert_eq!(doc.lock().subscriber_count(), 0);
        assert!(!controller.deactivate());
        assert!(!controller.apply(false).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_follows_enablement() {
        let doc = document("Published 2024-03-20");
        let store = Arc::new(SettingsStore::default());
        let controller = controller(&doc, &store, AllowList::default());

        let task = tokio::spawn(async move {
            let mut controller = controller;
            controller.run().await;
            controller
        });

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(text_of(&doc), "Published 1403/01/01");

        store.set_enabled(false);
        tokio::time::sleep(Duration::from_millis(10)).await;
        {
            let mut d = doc.lock();
            let root = d.root();
            d.append_text(root, " then 2024-12-25").unwrap();
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(text_of(&doc), "Published 1403/01/01 then 2024-12-25");

        store.set_enabled(true);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(text_of(&doc), "Published 1403/01/01 then 1403/10/05");
        assert_eq!(store.converted_count(), 2);

        task.abort();
    }
}
