//! FilterSet construction and hot reload.
//!
//! Readers take an `Arc<FilterSet>` snapshot once per query and never
//! lock. The coordinator is the only writer: it builds a complete new set
//! off to the side and publishes it with a single atomic store.

use arc_swap::ArcSwap;
use parking_lot::{Condvar, Mutex, MutexGuard};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::FilterConfig;
use crate::source::{fetch, ListEntry};
use crate::stats::FilterStats;
use crate::{FilterSet, ListKind, Polarity, Result};

/// SHA-256 digest over every source's content.
pub type SourceDigest = [u8; 32];

/// Render a digest as lowercase hex.
pub fn digest_hex(digest: &SourceDigest) -> String {
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Digest a set of fetched payloads.
///
/// Each payload is framed by its polarity, kind and length, so moving a
/// line between lists or across a list boundary changes the digest.
pub fn digest_payloads(entries: &[ListEntry], payloads: &[Vec<u8>]) -> SourceDigest {
    let mut hasher = Sha256::new();
    for (entry, payload) in entries.iter().zip(payloads) {
        let polarity = match entry.polarity {
            Polarity::Allow => b'A',
            Polarity::Deny => b'D',
        };
        let kind = match entry.kind {
            ListKind::Names => b'N',
            ListKind::Cidr => b'C',
        };
        hasher.update([polarity, kind]);
        hasher.update((payload.len() as u64).to_be_bytes());
        hasher.update(payload);
    }
    hasher.finalize().into()
}

/// Reload behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadOptions {
    /// Skip rebuilding when the digest matches the last successful build
    pub hash_gated: bool,
}

impl Default for ReloadOptions {
    fn default() -> Self {
        Self { hash_gated: true }
    }
}

impl ReloadOptions {
    pub fn from_config(config: &FilterConfig) -> Self {
        Self {
            hash_gated: config.reload.hash_gated,
        }
    }
}

/// Result of a reload attempt that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// A new set was built and published
    Reloaded {
        generation: u64,
        allow: usize,
        deny: usize,
    },
    /// Source content was unchanged; the current set stays
    Unchanged,
}

/// Cheap cloneable read handle onto the current [`FilterSet`].
#[derive(Debug, Clone)]
pub struct FilterHandle {
    current: Arc<ArcSwap<FilterSet>>,
}

impl FilterHandle {
    /// A handle on a fixed set. Useful for hosts that never reload.
    pub fn fixed(set: FilterSet) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(set)),
        }
    }

    /// The current set. Hold it for the whole evaluation of one query.
    pub fn snapshot(&self) -> Arc<FilterSet> {
        self.current.load_full()
    }
}

/// ReloadCoordinator owns the current [`FilterSet`] and rebuilds it from
/// its list sources.
///
/// # Example
///
/// ```ignore
/// use k2filter::{FilterConfig, ReloadCoordinator, ReloadOptions};
/// use k2filter::source::entries_from_config;
///
/// let config = FilterConfig::load("k2filter.yaml")?;
/// let coordinator = ReloadCoordinator::start(
///     entries_from_config(&config),
///     ReloadOptions::from_config(&config),
/// )?;
///
/// let set = coordinator.snapshot();
/// let decision = set.decide("ads.example.com");
///
/// // Later: rebuilds only if any source changed
/// coordinator.reload()?;
/// ```
pub struct ReloadCoordinator {
    entries: Vec<ListEntry>,
    options: ReloadOptions,
    handle: FilterHandle,
    /// Digest of the last published build. Held for the whole reload, so
    /// it also serializes writers.
    last_digest: Mutex<SourceDigest>,
    generation: AtomicU64,
    stats: Arc<FilterStats>,
}

impl ReloadCoordinator {
    /// Build the first set. Any failure here is returned to the caller.
    pub fn start(entries: Vec<ListEntry>, options: ReloadOptions) -> Result<Self> {
        Self::start_with_stats(entries, options, Arc::new(FilterStats::new()))
    }

    /// Like [`start`](Self::start), recording reloads into shared counters.
    pub fn start_with_stats(
        entries: Vec<ListEntry>,
        options: ReloadOptions,
        stats: Arc<FilterStats>,
    ) -> Result<Self> {
        let (set, digest) = build(&entries)?;
        log::info!(
            "Loaded filter set from {} lists: {} allow, {} deny entries",
            entries.len(),
            set.allow_len(),
            set.deny_len()
        );
        stats.record_reload();

        Ok(Self {
            entries,
            options,
            handle: FilterHandle::fixed(set),
            last_digest: Mutex::new(digest),
            generation: AtomicU64::new(1),
            stats,
        })
    }

    /// The current set.
    pub fn snapshot(&self) -> Arc<FilterSet> {
        self.handle.snapshot()
    }

    /// A read handle for query paths.
    pub fn handle(&self) -> FilterHandle {
        self.handle.clone()
    }

    pub fn stats(&self) -> &Arc<FilterStats> {
        &self.stats
    }

    /// Number of sets published so far, the initial one included.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Digest of the current set's sources.
    pub fn digest(&self) -> SourceDigest {
        *self.last_digest.lock()
    }

    /// Refetch every source and rebuild if the content changed (or always,
    /// when hash gating is off).
    ///
    /// On error the previous set stays in service.
    pub fn reload(&self) -> Result<ReloadOutcome> {
        self.run(!self.options.hash_gated)
    }

    /// Refetch and rebuild regardless of the digest.
    pub fn force_reload(&self) -> Result<ReloadOutcome> {
        self.run(true)
    }

    fn run(&self, force: bool) -> Result<ReloadOutcome> {
        let mut last = self.last_digest.lock();
        match self.rebuild(&mut last, force) {
            Ok(ReloadOutcome::Unchanged) => {
                self.stats.record_skipped_reload();
                log::debug!("Filter lists unchanged, skipping rebuild");
                Ok(ReloadOutcome::Unchanged)
            }
            Ok(outcome) => {
                self.stats.record_reload();
                Ok(outcome)
            }
            Err(e) => {
                self.stats.record_failed_reload();
                log::error!("Filter reload failed, keeping previous filter set: {}", e);
                Err(e)
            }
        }
    }

    fn rebuild(&self, last: &mut SourceDigest, force: bool) -> Result<ReloadOutcome> {
        let payloads = fetch_all(&self.entries)?;
        let digest = digest_payloads(&self.entries, &payloads);
        if !force && digest == *last {
            return Ok(ReloadOutcome::Unchanged);
        }

        let set = build_from(&self.entries, &payloads)?;
        let (allow, deny) = (set.allow_len(), set.deny_len());
        self.handle.current.store(Arc::new(set));
        *last = digest;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        log::info!(
            "Reloaded filter set (generation {}): {} allow, {} deny entries",
            generation,
            allow,
            deny
        );
        Ok(ReloadOutcome::Reloaded {
            generation,
            allow,
            deny,
        })
    }
}

fn fetch_all(entries: &[ListEntry]) -> Result<Vec<Vec<u8>>> {
    entries
        .iter()
        .map(|entry| fetch(entry.source.as_ref()))
        .collect()
}

fn build_from(entries: &[ListEntry], payloads: &[Vec<u8>]) -> Result<FilterSet> {
    let mut builder = FilterSet::builder();
    for (entry, payload) in entries.iter().zip(payloads) {
        let summary = builder.load(&mut payload.as_slice(), entry.polarity, entry.kind)?;
        log::debug!(
            "Loaded {} {} list {}: {} added, {} duplicates, {} skipped",
            entry.polarity,
            entry.kind,
            entry.source.name(),
            summary.added,
            summary.duplicates,
            summary.skipped
        );
    }
    Ok(builder.build())
}

/// Fetch every source and build a set, returning it with its digest.
pub fn build(entries: &[ListEntry]) -> Result<(FilterSet, SourceDigest)> {
    let payloads = fetch_all(entries)?;
    let set = build_from(entries, &payloads)?;
    Ok((set, digest_payloads(entries, &payloads)))
}

type StopToken = Arc<(Mutex<bool>, Condvar)>;

/// Periodic background reload.
///
/// Stops on [`stop`](ReloadTask::stop) or when dropped.
pub struct ReloadTask {
    stop: StopToken,
    thread: Option<JoinHandle<()>>,
}

impl ReloadTask {
    /// Reload `coordinator` every `interval` on a background thread.
    pub fn spawn(coordinator: Arc<ReloadCoordinator>, interval: Duration) -> Result<Self> {
        let stop: StopToken = Arc::new((Mutex::new(false), Condvar::new()));
        let token = stop.clone();

        let thread = thread::Builder::new()
            .name("k2filter-reload".to_string())
            .spawn(move || {
                let (lock, cvar) = &*token;
                let mut stopped = lock.lock();
                while !*stopped {
                    let timed_out = cvar.wait_for(&mut stopped, interval).timed_out();
                    if *stopped {
                        break;
                    }
                    if timed_out {
                        let result = MutexGuard::unlocked(&mut stopped, || coordinator.reload());
                        if let Err(e) = result {
                            // Already logged and counted by the coordinator
                            log::debug!("Periodic reload failed, keeping previous set: {}", e);
                        }
                    }
                }
                log::debug!("Reload task stopped");
            })?;

        Ok(Self {
            stop,
            thread: Some(thread),
        })
    }

    /// Cancel the task and wait for an in-progress reload to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let (lock, cvar) = &*self.stop;
        *lock.lock() = true;
        cvar.notify_all();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Reload task panicked");
            }
        }
    }
}

impl Drop for ReloadTask {
    fn drop(&mut self) {
        self.shutdown();
    }
}
