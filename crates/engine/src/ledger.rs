//! Delivery ledger — durable record of which (event, recipient) pairs were notified.
//!
//! The ledger is the only source of truth for "already notified". It is read
//! once at startup, mutated in memory, and rewritten to disk synchronously after
//! every new pair, so a crash right after an acknowledged send never loses a
//! previously committed record.
//!
//! On-disk format (pretty-printed JSON):
//!
//! ```json
//! { "version": 1, "deliveries": { "<event id>": ["<recipient key>", ...] } }
//! ```
//!
//! The unversioned shape `{ "<event id>": [...] }` written by older deployments
//! is still accepted and is upgraded on the next write.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use reminder_common::error::{ReminderError, Result};

/// Schema version written by this build.
pub const LEDGER_VERSION: u32 = 1;

type Deliveries = BTreeMap<String, BTreeSet<String>>;
type Pair = (String, String);

#[derive(Serialize)]
struct LedgerDocument<'a> {
    version: u32,
    deliveries: &'a Deliveries,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredLedger {
    Versioned { version: u32, deliveries: Deliveries },
    Legacy(Deliveries),
}

/// File-backed delivery ledger with a single-writer discipline.
///
/// All reads and writes go through one mutex; `record_notified` holds it
/// across the disk write so two writers can never interleave.
///
/// Pairs whose send is underway are tracked separately in memory. `claim`
/// checks both sets under the same lock, so two callers can never both
/// decide to send the same pair.
pub struct DeliveryLedger {
    path: PathBuf,
    deliveries: Mutex<Deliveries>,
    in_flight: Mutex<HashSet<Pair>>,
}

/// Result of [`DeliveryLedger::claim`].
#[must_use]
pub enum Claim<'a> {
    /// The caller owns the pair until the reservation is dropped.
    Reserved(Reservation<'a>),
    AlreadyNotified,
    /// Another caller holds a reservation for the pair.
    InFlight,
}

/// Exclusive right to send one (event, recipient) pair. Dropping it releases
/// the pair, whether or not it was recorded.
pub struct Reservation<'a> {
    ledger: &'a DeliveryLedger,
    pair: Pair,
}

impl Reservation<'_> {
    /// Record the acknowledged send; see [`DeliveryLedger::record_notified`].
    pub fn record(self) -> Result<bool> {
        self.ledger.record_notified(&self.pair.0, &self.pair.1)
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.ledger.lock_in_flight().remove(&self.pair);
    }
}

impl DeliveryLedger {
    /// Load the ledger at `path`.
    ///
    /// A missing file is a fresh, empty ledger. Anything else that cannot be
    /// read or parsed is `LedgerCorrupt`: starting with a guessed ledger would
    /// re-notify everyone.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let deliveries = match fs::read_to_string(&path) {
            Ok(contents) => Self::parse(&path, &contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No delivery ledger found, starting empty");
                Deliveries::new()
            }
            Err(e) => {
                return Err(ReminderError::LedgerCorrupt {
                    path,
                    reason: format!("unreadable: {e}"),
                });
            }
        };

        let pairs: usize = deliveries.values().map(BTreeSet::len).sum();
        tracing::info!(
            path = %path.display(),
            events = deliveries.len(),
            pairs,
            "Delivery ledger loaded"
        );

        Ok(Self {
            path,
            deliveries: Mutex::new(deliveries),
            in_flight: Mutex::new(HashSet::new()),
        })
    }

    fn parse(path: &Path, contents: &str) -> Result<Deliveries> {
        if contents.trim().is_empty() {
            return Err(ReminderError::LedgerCorrupt {
                path: path.to_path_buf(),
                reason: "file is empty".to_string(),
            });
        }

        let stored: StoredLedger =
            serde_json::from_str(contents).map_err(|e| ReminderError::LedgerCorrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        match stored {
            StoredLedger::Versioned {
                version,
                deliveries,
            } if version == LEDGER_VERSION => Ok(deliveries),
            StoredLedger::Versioned { version, .. } => Err(ReminderError::LedgerCorrupt {
                path: path.to_path_buf(),
                reason: format!("unsupported ledger version {version}"),
            }),
            StoredLedger::Legacy(deliveries) => {
                tracing::info!(
                    path = %path.display(),
                    "Legacy ledger format detected, will upgrade on next write"
                );
                Ok(deliveries)
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether `recipient_key` was already notified about `event_id`.
    pub fn already_notified(&self, event_id: &str, recipient_key: &str) -> bool {
        self.lock()
            .get(event_id)
            .is_some_and(|recipients| recipients.contains(recipient_key))
    }

    /// Check and reserve a pair in one step.
    ///
    /// Lock order is `deliveries` then `in_flight`; nothing takes them the
    /// other way round.
    pub fn claim(&self, event_id: &str, recipient_key: &str) -> Claim<'_> {
        let deliveries = self.lock();
        if deliveries
            .get(event_id)
            .is_some_and(|recipients| recipients.contains(recipient_key))
        {
            return Claim::AlreadyNotified;
        }

        let pair = (event_id.to_string(), recipient_key.to_string());
        if !self.lock_in_flight().insert(pair.clone()) {
            return Claim::InFlight;
        }
        drop(deliveries);

        Claim::Reserved(Reservation { ledger: self, pair })
    }

    /// Record an acknowledged send and flush the ledger to disk.
    ///
    /// Idempotent: returns `Ok(false)` without touching the disk when the pair
    /// is already present. If the write fails the pair is kept in memory, since
    /// the send did happen, and the next successful write persists it.
    pub fn record_notified(&self, event_id: &str, recipient_key: &str) -> Result<bool> {
        let mut deliveries = self.lock();

        let inserted = deliveries
            .entry(event_id.to_string())
            .or_default()
            .insert(recipient_key.to_string());

        if !inserted {
            return Ok(false);
        }

        self.persist(&deliveries)?;
        Ok(true)
    }

    /// Recipients already notified for `event_id`.
    pub fn recipients_for(&self, event_id: &str) -> Vec<String> {
        self.lock()
            .get(event_id)
            .map(|recipients| recipients.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of (event, recipient) pairs recorded.
    pub fn len(&self) -> usize {
        self.lock().values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the full ledger, in on-disk shape.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<String>> {
        self.lock()
            .iter()
            .map(|(event_id, recipients)| (event_id.clone(), recipients.iter().cloned().collect()))
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Deliveries> {
        // A panic while holding the lock cannot leave the map half-updated:
        // every mutation is a single insert.
        self.deliveries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, HashSet<Pair>> {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Write to a sibling temp file, fsync, then rename over the ledger.
    fn persist(&self, deliveries: &Deliveries) -> Result<()> {
        let document = LedgerDocument {
            version: LEDGER_VERSION,
            deliveries,
        };
        let json = serde_json::to_vec_pretty(&document)
            .map_err(|e| ReminderError::LedgerWrite(e.to_string()))?;

        let tmp_path = self.tmp_path();
        let write = || -> std::io::Result<()> {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&json)?;
            file.sync_all()?;
            fs::rename(&tmp_path, &self.path)?;
            sync_parent_dir(&self.path);
            Ok(())
        };

        write().map_err(|e| {
            tracing::error!(
                path = %self.path.display(),
                error = %e,
                "Failed to persist delivery ledger"
            );
            ReminderError::LedgerWrite(format!("{}: {e}", self.path.display()))
        })
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "ledger.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

/// Make the rename durable. Not every platform lets a directory be opened.
fn sync_parent_dir(path: &Path) {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if let Ok(handle) = File::open(dir) {
            let _ = handle.sync_all();
        }
    }
}
