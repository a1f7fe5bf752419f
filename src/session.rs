//! One localization session over a document.
//!
//! A [`Session`] does an initial pass over every text leaf under its root,
//! then watches for inserted subtrees and localizes them after a quiet
//! period. Rewritten leaves are remembered so a later pass never touches
//! them again. Destroying the session stops all of this immediately: no
//! text is replaced after [`Session::destroy`] or [`SessionHandle::destroy`]
//! returns.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use crate::DateError;
use crate::config::LocalizerConfig;
use crate::document::{
    ChangeBatch, ChangeSubscription, DocumentTree, TextLeafCursor, TextLeaves, inside_non_prose,
};
use crate::host::{Clock, ConversionCounter};
use crate::jalali::gregorian_to_jalali;
use crate::matcher::DateMatcher;
use crate::prelude::*;

/// Document shared between the host and a session.
pub type SharedDocument<D> = Arc<Mutex<D>>;

/// Date the calendar self-check converts, and what it must produce.
const SELF_CHECK_INPUT: (u16, u8, u8) = (2024, 3, 20);
const SELF_CHECK_EXPECTED: &str = "1403/01/01";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum SessionState {
    /// Created, nothing scanned yet
    Idle,
    /// A pass is running
    Scanning,
    /// Initial pass done, following changes
    Observing,
    /// Terminal
    Destroyed,
}

/// The calendar is unusable, so the session never starts.
#[derive(Debug, thiserror::Error)]
pub enum EnvironmentError {
    #[error("calendar self-check failed: {0}")]
    Calendar(#[from] DateError),

    #[error("calendar self-check converted {input} to {found}, expected {expected}")]
    SelfCheck {
        input: String,
        expected: &'static str,
        found: String,
    },

    #[error("session was destroyed before it started")]
    Destroyed,
}

/// Converts a known date and compares against the expected Jalali value.
///
/// # Errors
/// `EnvironmentError` when the conversion fails or disagrees.
pub fn calendar_self_check() -> Result<(), EnvironmentError> {
    let (year, month, day) = SELF_CHECK_INPUT;
    let found = gregorian_to_jalali(year, month, day)?.to_string();
    if found == SELF_CHECK_EXPECTED {
        Ok(())
    } else {
        Err(EnvironmentError::SelfCheck {
            input: format!("{year:04}-{month:02}-{day:02}"),
            expected: SELF_CHECK_EXPECTED,
            found,
        })
    }
}

/// Counts from one or more passes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanReport {
    /// Unprocessed text leaves looked at
    pub visited: usize,
    /// Leaves whose text was rewritten
    pub replaced: usize,
    /// Dates converted across those leaves
    pub conversions: usize,
    /// The pass stopped because the session was destroyed
    pub interrupted: bool,
}

impl ScanReport {
    fn merge(&mut self, other: Self) {
        self.visited += other.visited;
        self.replaced += other.replaced;
        self.conversions += other.conversions;
        self.interrupted |= other.interrupted;
    }
}

#[derive(Debug, Default)]
struct Signal {
    destroyed: AtomicBool,
    notify: Notify,
}

impl Signal {
    fn is_set(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }
}

/// Cloneable remote for destroying a session from elsewhere.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    signal: Arc<Signal>,
}

impl SessionHandle {
    /// Requests destruction. A running pass stops before its next text
    /// replacement and the owning session tears down on its next step.
    pub fn destroy(&self) {
        self.signal.destroyed.store(true, Ordering::Release);
        self.signal.notify.notify_one();
    }

    pub fn is_destroyed(&self) -> bool {
        self.signal.is_set()
    }
}

/// What woke a session up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent<N> {
    Changes(ChangeBatch<N>),
    /// The document stopped delivering changes
    FeedClosed,
    DebounceElapsed,
    DestroyRequested,
}

/// Localizes one document subtree and keeps it localized.
pub struct Session<D: DocumentTree> {
    document: SharedDocument<D>,
    root: D::NodeId,
    config: LocalizerConfig,
    matcher: DateMatcher,
    counter: Arc<dyn ConversionCounter>,
    clock: Arc<dyn Clock>,
    processed: HashSet<D::NodeId>,
    subscription: Option<ChangeSubscription<D::NodeId>>,
    pending: Vec<D::NodeId>,
    deadline: Option<Instant>,
    signal: Arc<Signal>,
    state: SessionState,
    conversions: u64,
}

impl<D: DocumentTree> Session<D> {
    pub fn new(
        document: SharedDocument<D>,
        root: D::NodeId,
        config: LocalizerConfig,
        counter: Arc<dyn ConversionCounter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            document,
            root,
            matcher: DateMatcher::new(&config),
            config,
            counter,
            clock,
            processed: HashSet::new(),
            subscription: None,
            pending: Vec::new(),
            deadline: None,
            signal: Arc::default(),
            state: SessionState::Idle,
            conversions: 0,
        }
    }

    pub const fn state(&self) -> SessionState {
        self.state
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            signal: Arc::clone(&self.signal),
        }
    }

    /// Total dates converted by this session.
    pub const fn conversions(&self) -> u64 {
        self.conversions
    }

    pub fn is_processed(&self, node: D::NodeId) -> bool {
        self.processed.contains(&node)
    }

    /// Forgets that `node` was rewritten so a later pass may look at it again.
    pub fn reset(&mut self, node: D::NodeId) -> bool {
        self.processed.remove(&node)
    }

    /// Subtree roots waiting for the debounce to elapse.
    pub fn pending(&self) -> &[D::NodeId] {
        &self.pending
    }

    pub const fn debounce_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Runs the self-check, localizes the whole root and starts observing.
    ///
    /// Calling this on a session that already started does nothing.
    ///
    /// # Errors
    /// `EnvironmentError` if the calendar self-check fails or the session
    /// was destroyed before starting. Nothing is scanned in either case.
    pub fn start(&mut self) -> Result<(), EnvironmentError> {
        match self.state {
            SessionState::Idle => {}
            SessionState::Destroyed => return Err(EnvironmentError::Destroyed),
            SessionState::Scanning | SessionState::Observing => return Ok(()),
        }
        if self.signal.is_set() {
            self.destroy();
            return Err(EnvironmentError::Destroyed);
        }
        if let Err(err) = calendar_self_check() {
            warn!(%err, "calendar self-check failed, localization disabled");
            return Err(err);
        }

        self.state = SessionState::Scanning;
        let report = self.scan(self.root);
        if self.state == SessionState::Destroyed {
            return Ok(());
        }

        let subscription = self.document.lock().subscribe(self.root);
        debug!(subscription = %subscription.id, "observing document changes");
        self.subscription = Some(subscription);
        self.state = SessionState::Observing;
        info!(
            visited = report.visited,
            replaced = report.replaced,
            conversions = report.conversions,
            "initial localization pass finished"
        );
        Ok(())
    }

    /// Localizes every unprocessed text leaf under `root`.
    ///
    /// Relative phrases all resolve against one reading of the clock taken
    /// at the start of the pass.
    pub fn scan(&mut self, root: D::NodeId) -> ScanReport {
        let mut report = ScanReport::default();
        if self.state == SessionState::Destroyed {
            return report;
        }
        if self.signal.is_set() {
            self.destroy();
            report.interrupted = true;
            return report;
        }

        if inside_non_prose(&*self.document.lock(), root, self.root, &self.config) {
            debug!(?root, "subtree sits inside a non-prose element");
            return report;
        }

        let resume = self.state;
        self.state = SessionState::Scanning;
        let today = self.clock.today();

        {
            let mut document = self.document.lock();
            let mut cursor = TextLeafCursor::new(root, &self.config);
            while let Some(leaf) = cursor.next_leaf(&*document) {
                if self.signal.is_set() {
                    report.interrupted = true;
                    break;
                }
                if self.processed.contains(&leaf) {
                    continue;
                }
                report.visited += 1;

                let localized = match document.text(leaf) {
                    Some(text) if self.matcher.contains_date(text) => {
                        self.matcher.localize_text(text, today)
                    }
                    _ => continue,
                };
                if localized.conversions == 0 {
                    continue;
                }

                if document.set_text(leaf, localized.text) {
                    self.processed.insert(leaf);
                    report.replaced += 1;
                    report.conversions += localized.conversions;
                    for _ in 0..localized.conversions {
                        self.counter.increment();
                    }
                }
            }
        }

        self.conversions += report.conversions as u64;
        if report.interrupted {
            debug!(replaced = report.replaced, "pass interrupted by destroy");
            self.destroy();
        } else {
            self.state = resume;
            debug!(
                ?root,
                visited = report.visited,
                replaced = report.replaced,
                conversions = report.conversions,
                "pass finished"
            );
        }
        report
    }

    /// Queues the inserted subtrees that contain unprocessed date-bearing
    /// text and re-arms the debounce. Returns whether anything qualified.
    pub fn handle_batch(&mut self, batch: ChangeBatch<D::NodeId>) -> bool {
        if self.state == SessionState::Destroyed || self.signal.is_set() {
            return false;
        }

        let qualifying: Vec<D::NodeId> = {
            let document = self.document.lock();
            batch
                .added
                .into_iter()
                .filter(|node| !inside_non_prose(&*document, *node, self.root, &self.config))
                .filter(|node| {
                    TextLeaves::new(&*document, *node, &self.config).any(|leaf| {
                        !self.processed.contains(&leaf)
                            && document
                                .text(leaf)
                                .is_some_and(|text| self.matcher.contains_date(text))
                    })
                })
                .collect()
        };
        if qualifying.is_empty() {
            return false;
        }

        for node in qualifying {
            if !self.pending.contains(&node) {
                self.pending.push(node);
            }
        }
        self.deadline = Some(Instant::now() + self.config.debounce());
        debug!(pending = self.pending.len(), "rescan scheduled");
        true
    }

    /// Scans every queued subtree now.
    pub fn flush_pending(&mut self) -> ScanReport {
        self.deadline = None;
        let roots = std::mem::take(&mut self.pending);
        let mut report = ScanReport::default();
        for root in roots {
            if self.state == SessionState::Destroyed {
                break;
            }
            report.merge(self.scan(root));
        }
        report
    }

    /// Waits for the next thing the session has to react to.
    ///
    /// Cancel-safe: dropping the future loses nothing.
    pub async fn next_event(&mut self) -> SessionEvent<D::NodeId> {
        if self.signal.is_set() {
            return SessionEvent::DestroyRequested;
        }
        let deadline = self.deadline;
        let Some(subscription) = self.subscription.as_mut() else {
            self.signal.notify.notified().await;
            return SessionEvent::DestroyRequested;
        };

        tokio::select! {
            biased;

            () = self.signal.notify.notified() => SessionEvent::DestroyRequested,
            batch = subscription.receiver.recv() => match batch {
                Some(batch) => SessionEvent::Changes(batch),
                None => SessionEvent::FeedClosed,
            },
            () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                SessionEvent::DebounceElapsed
            }
        }
    }

    /// Applies one event. Returns false once the session is destroyed.
    pub fn handle_event(&mut self, event: SessionEvent<D::NodeId>) -> bool {
        match event {
            SessionEvent::Changes(batch) => {
                self.handle_batch(batch);
            }
            SessionEvent::DebounceElapsed => {
                self.flush_pending();
            }
            SessionEvent::FeedClosed => {
                info!("document change feed closed");
                self.destroy();
            }
            SessionEvent::DestroyRequested => {
                self.destroy();
            }
        }
        self.state != SessionState::Destroyed
    }

    /// Handles events until the session is destroyed.
    pub async fn run(&mut self) {
        while self.state != SessionState::Destroyed {
            let event = self.next_event().await;
            if !self.handle_event(event) {
                break;
            }
        }
    }

    /// Stops observing, drops queued work and forgets processed leaves.
    /// Returns false if the session was already destroyed.
    pub fn destroy(&mut self) -> bool {
        if self.state == SessionState::Destroyed {
            return false;
        }
        self.signal.destroyed.store(true, Ordering::Release);
        if let Some(subscription) = self.subscription.take() {
            self.document.lock().unsubscribe(subscription.id);
        }
        self.pending.clear();
        self.deadline = None;
        self.processed = HashSet::new();
        self.state = SessionState::Destroyed;
        info!(conversions = self.conversions, "session destroyed");
        true
    }
}
