//! # Interactive session state
//! Holds the current batch for the dashboard and the per-item verification states.
//!
//! Items are addressed by [`ItemStamp`] (batch generation + position), so a verification
//! started against an old batch can never land on an item of the new one. Starting a scan
//! bumps the generation and drops the previous batch and its verification map at once.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::schema::{NewsItem, ScanBatch, Sector, SignalCounts, VerificationResult};

/// Arena-style item address: which batch, which position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemStamp {
    pub generation: u64,
    pub index: usize,
}

/// Client-visible verification state of one item. A missing entry means `Idle`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "result", rename_all = "lowercase")]
pub enum VerificationState {
    Idle,
    Verifying,
    Resolved(VerificationResult),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("a scan is already in progress")]
    ScanInProgress,
    #[error("no batch is loaded")]
    NoBatch,
    #[error("batch {requested} was replaced by batch {current}")]
    StaleBatch { requested: u64, current: u64 },
    #[error("item {index} is out of range for a batch of {len}")]
    NoSuchItem { index: usize, len: usize },
    #[error("item {0} is already being verified")]
    AlreadyVerifying(usize),
    #[error("item {0} has already been verified")]
    AlreadyResolved(usize),
}

#[derive(Debug, Default)]
struct Inner {
    generation: u64,
    scanning: bool,
    batch: Option<Arc<ScanBatch>>,
    verifications: BTreeMap<usize, VerificationState>,
}

#[derive(Debug, Default)]
pub struct Session {
    inner: Mutex<Inner>,
}

/// Exclusive right to run one scan against a session. Dropping it clears the flag.
#[derive(Debug)]
#[must_use = "the scan flag is released as soon as the permit is dropped"]
pub struct ScanPermit<'a> {
    session: &'a Session,
    generation: u64,
}

impl ScanPermit<'_> {
    /// Install the finished batch. Returns the stamp generation the items live under.
    pub fn install(self, batch: ScanBatch) -> u64 {
        {
            let mut g = self.session.lock();
            g.batch = Some(Arc::new(batch));
            g.verifications.clear();
        }
        info!(target: "session", generation = self.generation, "batch installed");
        self.generation
    }
}

impl Drop for ScanPermit<'_> {
    fn drop(&mut self) {
        self.session.lock().scanning = false;
    }
}

/// Handed out when a verification starts. Dropping it without [`VerifyTicket::complete`]
/// puts the item back to `Idle` so the check can be retried.
#[derive(Debug)]
#[must_use = "the item returns to Idle as soon as the ticket is dropped"]
pub struct VerifyTicket<'a> {
    session: &'a Session,
    pub stamp: ItemStamp,
    pub item: NewsItem,
    completed: bool,
}

impl VerifyTicket<'_> {
    /// Verifying -> Resolved. Returns `false` (and drops the result) when the ticket's
    /// batch has been replaced in the meantime.
    pub fn complete(mut self, result: VerificationResult) -> bool {
        self.completed = true;
        let mut g = self.session.lock();
        if self.stamp.generation != g.generation || g.batch.is_none() {
            info!(
                target: "session",
                stale = self.stamp.generation,
                current = g.generation,
                index = self.stamp.index,
                "discarding verification for replaced batch"
            );
            return false;
        }
        g.verifications
            .insert(self.stamp.index, VerificationState::Resolved(result));
        true
    }
}

impl Drop for VerifyTicket<'_> {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        let mut g = self.session.lock();
        if self.stamp.generation == g.generation
            && g.verifications.get(&self.stamp.index) == Some(&VerificationState::Verifying)
        {
            g.verifications.remove(&self.stamp.index);
            debug!(target: "session", index = self.stamp.index, "verification abandoned");
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotItem {
    pub stamp: ItemStamp,
    pub item: NewsItem,
    pub verification: VerificationState,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub generation: u64,
    pub scanning: bool,
    pub generated_at: Option<chrono::DateTime<chrono::Utc>>,
    pub counts: SignalCounts,
    pub items: Vec<SnapshotItem>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("session mutex poisoned")
    }

    /// Claim the scan flag. Invalidates the current batch and every pending verification.
    pub fn try_begin_scan(&self) -> Result<ScanPermit<'_>, SessionError> {
        let mut g = self.lock();
        if g.scanning {
            return Err(SessionError::ScanInProgress);
        }
        g.scanning = true;
        g.generation += 1;
        g.batch = None;
        g.verifications.clear();
        debug!(target: "session", generation = g.generation, "scan started");
        Ok(ScanPermit {
            session: self,
            generation: g.generation,
        })
    }

    pub fn is_scanning(&self) -> bool {
        self.lock().scanning
    }

    /// The current batch with its generation, if one is loaded.
    pub fn current(&self) -> Option<(u64, Arc<ScanBatch>)> {
        let g = self.lock();
        g.batch.clone().map(|b| (g.generation, b))
    }

    /// Resolved results of the current batch, by position.
    pub fn resolved(&self) -> BTreeMap<usize, VerificationResult> {
        self.lock()
            .verifications
            .iter()
            .filter_map(|(i, s)| match s {
                VerificationState::Resolved(r) => Some((*i, r.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn state_of(&self, stamp: ItemStamp) -> Result<VerificationState, SessionError> {
        let g = self.lock();
        Self::check_stamp(&g, stamp)?;
        Ok(g.verifications
            .get(&stamp.index)
            .cloned()
            .unwrap_or(VerificationState::Idle))
    }

    fn check_stamp(g: &Inner, stamp: ItemStamp) -> Result<Arc<ScanBatch>, SessionError> {
        if stamp.generation != g.generation {
            return Err(SessionError::StaleBatch {
                requested: stamp.generation,
                current: g.generation,
            });
        }
        let batch = g.batch.clone().ok_or(SessionError::NoBatch)?;
        if stamp.index >= batch.len() {
            return Err(SessionError::NoSuchItem {
                index: stamp.index,
                len: batch.len(),
            });
        }
        Ok(batch)
    }

    /// Idle -> Verifying. Other items are unaffected; repeated triggers are refused.
    pub fn begin_verification(&self, stamp: ItemStamp) -> Result<VerifyTicket<'_>, SessionError> {
        let mut g = self.lock();
        let batch = Self::check_stamp(&g, stamp)?;
        match g.verifications.get(&stamp.index) {
            Some(VerificationState::Verifying) => {
                return Err(SessionError::AlreadyVerifying(stamp.index))
            }
            Some(VerificationState::Resolved(_)) => {
                return Err(SessionError::AlreadyResolved(stamp.index))
            }
            Some(VerificationState::Idle) | None => {}
        }
        g.verifications
            .insert(stamp.index, VerificationState::Verifying);
        Ok(VerifyTicket {
            session: self,
            stamp,
            item: batch.items[stamp.index].clone(),
            completed: false,
        })
    }

    /// Current batch with every item's stamp and state, optionally filtered by sector.
    /// Counters always cover the whole batch.
    pub fn snapshot(&self, sector: Option<Sector>) -> SessionSnapshot {
        let g = self.lock();
        let Some(batch) = g.batch.as_ref() else {
            return SessionSnapshot {
                generation: g.generation,
                scanning: g.scanning,
                generated_at: None,
                counts: SignalCounts::default(),
                items: Vec::new(),
            };
        };
        let items = batch
            .items
            .iter()
            .enumerate()
            .filter(|(_, it)| sector.map_or(true, |s| it.sector == s))
            .map(|(index, it)| SnapshotItem {
                stamp: ItemStamp {
                    generation: g.generation,
                    index,
                },
                item: it.clone(),
                verification: g
                    .verifications
                    .get(&index)
                    .cloned()
                    .unwrap_or(VerificationState::Idle),
            })
            .collect();
        SessionSnapshot {
            generation: g.generation,
            scanning: g.scanning,
            generated_at: Some(batch.generated_at),
            counts: SignalCounts::tally(&batch.items),
            items,
        }
    }
}
