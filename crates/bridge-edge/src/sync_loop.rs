//! Edge-side reconciliation loop.
//!
//! The loop owns the edge application's answer to "who is logged in".
//! It moves through four phases:
//!
//! - `Idle`: nothing confirmed yet
//! - `Reconciling`: an identity fetch is in flight
//! - `Synced`: the current identity matches the authority's last answer
//! - `Degraded`: the authority is unreachable; only the cache is available
//!
//! Reconciliations never overlap. A request arriving while one is in
//! flight is coalesced into a single follow-up run, so a burst of push
//! events costs at most two fetches.

use crate::backoff::{with_fixed_retry_if, FixedBackoff};
use crate::cache::{CachedIdentity, IdentityCache};
use crate::client::EdgeSyncClient;
use crate::error::{EdgeError, EdgeResult};
use async_trait::async_trait;
use bridge_events::{EventBus, Subscription};
use bridge_tokens::IdentityRecord;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, error, info, warn};

/// Where the loop currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No reconciliation has completed yet.
    Idle,
    /// A reconciliation is in flight.
    Reconciling,
    /// Identity matches the authority's last confirmed answer.
    Synced,
    /// The authority could not be reached; identity is unconfirmed.
    Degraded,
}

/// Notifications the loop broadcasts to interested UI or session layers.
#[derive(Debug, Clone)]
pub enum SyncNotice {
    /// The confirmed identity changed. `None` means signed out.
    IdentityChanged(Option<IdentityRecord>),

    /// The push subscription dropped; reconnecting after a fixed delay.
    Reconnecting {
        /// Sequential reconnect attempt number.
        attempt: u32,
    },

    /// The loop is degraded and falling back to the cached identity for
    /// display. Grants nothing.
    UsingCachedIdentity(CachedIdentity),
}

/// Result of asking the loop to reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// A reconciliation ran. `changed` reports whether the confirmed
    /// identity moved.
    Applied {
        /// Whether the identity differs from before the run.
        changed: bool,
    },

    /// Another reconciliation was already in flight; this request was
    /// folded into its follow-up run.
    Coalesced,
}

/// Source of authoritative identity answers.
///
/// `Ok(None)` is the clean signed-out answer; errors mean the authority
/// could not be asked.
#[async_trait]
pub trait Reconciler: Send + Sync {
    /// Ask the authority who is logged in right now.
    async fn reconcile(&self) -> EdgeResult<Option<IdentityRecord>>;
}

/// Holds the persistent sync token the edge received from the login
/// redirect. Empty means no authority login has been handed off here.
pub struct SyncTokenSlot {
    slot: RwLock<Option<String>>,
}

impl SyncTokenSlot {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(None),
        }
    }

    /// Store the token from a login redirect, replacing any previous one.
    pub async fn set(&self, token: impl Into<String>) {
        *self.slot.write().await = Some(token.into());
    }

    /// Current token, if any.
    pub async fn get(&self) -> Option<String> {
        self.slot.read().await.clone()
    }

    /// Forget the token.
    pub async fn clear(&self) {
        *self.slot.write().await = None;
    }
}

impl Default for SyncTokenSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SyncTokenSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncTokenSlot").finish_non_exhaustive()
    }
}

/// [`Reconciler`] scoped to this edge client's own persistent sync token.
///
/// Identity is resolved by revalidating the stored token, so the answer
/// is always about the account that logged in through *this* client. The
/// bulk active-sessions snapshot is deliberately not consulted here; it
/// reports everyone and belongs to bulk reconciliation jobs.
///
/// No stored token, or a token the authority rejects, is a clean
/// signed-out answer; a rejected token is also dropped from the slot.
pub struct TokenReconciler {
    client: EdgeSyncClient,
    token: Arc<SyncTokenSlot>,
}

impl TokenReconciler {
    /// Wrap a sync client and token slot.
    pub fn new(client: EdgeSyncClient, token: Arc<SyncTokenSlot>) -> Self {
        Self { client, token }
    }
}

#[async_trait]
impl Reconciler for TokenReconciler {
    async fn reconcile(&self) -> EdgeResult<Option<IdentityRecord>> {
        let Some(token) = self.token.get().await else {
            return Ok(None);
        };

        match self.client.validate_persistent_token(&token).await {
            Ok(resolved) => Ok(Some(resolved.identity)),
            Err(EdgeError::InvalidToken) => {
                debug!("Stored sync token rejected; treating as signed out");
                self.token.clear().await;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// What the edge application should show for "who is logged in".
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayIdentity {
    /// Confirmed by the authority in the current sync state.
    Confirmed(IdentityRecord),

    /// Last-known identity from the cache; shown while degraded, grants
    /// no access.
    Cached(CachedIdentity),
}

/// The reconciliation loop.
pub struct SyncLoop {
    reconciler: Arc<dyn Reconciler>,
    cache: Arc<dyn IdentityCache>,
    phase: RwLock<SyncPhase>,
    current: RwLock<Option<IdentityRecord>>,
    in_flight: Mutex<()>,
    pending: AtomicBool,
    notices: broadcast::Sender<SyncNotice>,
    reconnect_delay: Duration,
    retry: FixedBackoff,
}

impl SyncLoop {
    /// Create a loop over a reconciler and cache.
    ///
    /// Transient reconcile failures are retried at the same fixed
    /// interval as stream reconnects; override with [`Self::with_retry`].
    pub fn new(
        reconciler: Arc<dyn Reconciler>,
        cache: Arc<dyn IdentityCache>,
        reconnect_delay: Duration,
    ) -> Self {
        let (notices, _) = broadcast::channel(64);
        Self {
            reconciler,
            cache,
            phase: RwLock::new(SyncPhase::Idle),
            current: RwLock::new(None),
            in_flight: Mutex::new(()),
            pending: AtomicBool::new(false),
            notices,
            reconnect_delay,
            retry: FixedBackoff::every(reconnect_delay, 3),
        }
    }

    /// Set the retry schedule for transient reconcile failures.
    pub fn with_retry(mut self, retry: FixedBackoff) -> Self {
        self.retry = retry;
        self
    }

    /// Current phase.
    pub async fn phase(&self) -> SyncPhase {
        *self.phase.read().await
    }

    /// Identity confirmed by the last successful reconciliation.
    pub async fn current_identity(&self) -> Option<IdentityRecord> {
        self.current.read().await.clone()
    }

    /// What to display for "who is logged in" right now.
    ///
    /// While degraded this falls back to the cached identity; in every
    /// other phase only a confirmed identity is shown.
    pub async fn display_identity(&self) -> Option<DisplayIdentity> {
        match *self.phase.read().await {
            SyncPhase::Degraded => self.cache.load().await.map(DisplayIdentity::Cached),
            _ => self
                .current
                .read()
                .await
                .clone()
                .map(DisplayIdentity::Confirmed),
        }
    }

    /// Subscribe to loop notifications.
    pub fn subscribe_notices(&self) -> broadcast::Receiver<SyncNotice> {
        self.notices.subscribe()
    }

    /// Request a reconciliation.
    ///
    /// If none is in flight, runs one (plus one follow-up run if further
    /// requests arrived meanwhile). If one is in flight, marks it pending
    /// and returns immediately; the holder is guaranteed to observe the
    /// flag and run the follow-up.
    pub async fn request_reconcile(&self) -> EdgeResult<ReconcileOutcome> {
        let mut changed = false;
        loop {
            let guard = match self.in_flight.try_lock() {
                Ok(guard) => guard,
                Err(_) => {
                    self.pending.store(true, Ordering::SeqCst);
                    // The holder may have finished between our failed
                    // try_lock and the store, leaving the flag orphaned.
                    // Re-probe: if the lock is free now, run the
                    // follow-up ourselves.
                    if self.in_flight.try_lock().is_err() {
                        debug!("Reconcile already in flight; request coalesced");
                        return Ok(ReconcileOutcome::Coalesced);
                    }
                    continue;
                }
            };

            changed = self.reconcile_once().await? || changed;

            // Requests that arrived during the run collapse into one more.
            while self.pending.swap(false, Ordering::SeqCst) {
                changed = self.reconcile_once().await? || changed;
            }

            drop(guard);

            // A request racing the drop may have set the flag after our
            // last swap; pick it up instead of leaving it for nobody.
            if self.pending.load(Ordering::SeqCst) {
                continue;
            }
            return Ok(ReconcileOutcome::Applied { changed });
        }
    }

    async fn reconcile_once(&self) -> EdgeResult<bool> {
        *self.phase.write().await = SyncPhase::Reconciling;

        // Transient faults get the fixed-interval retry budget before the
        // loop is allowed to degrade.
        let fetch = with_fixed_retry_if(
            &self.retry,
            || self.reconciler.reconcile(),
            EdgeError::is_transient,
        )
        .await;

        let answer = match fetch {
            Ok(answer) => answer,
            Err(e) if e.is_empty_snapshot() => None,
            Err(e) => {
                warn!(error = %e, "Reconciliation failed; entering degraded state");
                *self.phase.write().await = SyncPhase::Degraded;
                if let Some(cached) = self.cache.load().await {
                    let _ = self
                        .notices
                        .send(SyncNotice::UsingCachedIdentity(cached));
                }
                return Err(e);
            }
        };

        let changed = {
            let mut current = self.current.write().await;
            if *current == answer {
                false
            } else {
                *current = answer.clone();
                true
            }
        };

        if changed {
            match &answer {
                Some(identity) => {
                    info!(username = %identity.username, "Confirmed identity changed");
                    self.cache
                        .store(CachedIdentity::confirmed_now(identity.clone()))
                        .await;
                }
                None => {
                    info!("Confirmed identity cleared (signed out)");
                    self.cache.clear().await;
                }
            }
            let _ = self.notices.send(SyncNotice::IdentityChanged(answer));
        }

        *self.phase.write().await = SyncPhase::Synced;
        Ok(changed)
    }

    /// Drive the loop from authority push events.
    ///
    /// Subscribes to the given topic, reconciles once on every
    /// (re)connect to cover missed events, and then reconciles on each
    /// received event. A dropped subscription is retried forever with a
    /// fixed delay; each retry broadcasts [`SyncNotice::Reconnecting`].
    pub async fn run(self: Arc<Self>, bus: Arc<dyn EventBus>, topic: &str) {
        let mut reconnect_attempt: u32 = 0;

        loop {
            let mut subscription: Subscription = match bus.subscribe(topic).await {
                Ok(subscription) => subscription,
                Err(e) => {
                    reconnect_attempt += 1;
                    warn!(error = %e, attempt = reconnect_attempt, "Subscribe failed");
                    let _ = self.notices.send(SyncNotice::Reconnecting {
                        attempt: reconnect_attempt,
                    });
                    tokio::time::sleep(self.reconnect_delay).await;
                    continue;
                }
            };
            reconnect_attempt = 0;

            // Catch up on anything missed while disconnected.
            if let Err(e) = self.request_reconcile().await {
                error!(error = %e, "Catch-up reconcile failed");
            }

            loop {
                match subscription.recv().await {
                    Ok(event) => {
                        debug!(topic = %event.topic(), "Push event received");
                        if let Err(e) = self.request_reconcile().await {
                            error!(error = %e, "Event-driven reconcile failed");
                        }
                    }
                    Err(e) => {
                        reconnect_attempt += 1;
                        warn!(error = %e, attempt = reconnect_attempt, "Subscription dropped");
                        let _ = self.notices.send(SyncNotice::Reconnecting {
                            attempt: reconnect_attempt,
                        });
                        tokio::time::sleep(self.reconnect_delay).await;
                        break;
                    }
                }
            }
        }
    }
}
