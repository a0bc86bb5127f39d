//! Entropy collector: pool-served and direct fetch paths.
//!
//! The collector hides the cost of the noise source from
//! latency-sensitive callers. A background filler prefetches
//! standard-size seeds into the slot pool; requests of exactly that
//! size are served from the pool, everything else pays for a
//! synchronous fetch. The noise source itself is never invoked
//! concurrently: both paths share one fetch lock.

use crate::config::{CollectorConfig, ConfigError};
use crate::crediting::{self, SECURITY_STRENGTH_BITS, SEED_BITS, SEED_BYTES};
use crate::pool::{SlotPool, SlotState};
use crate::source::{NoiseError, NoiseSource, TimerJitter};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use thiserror::Error;
use zeroize::Zeroize;

/// Errors from collector lifecycle operations.
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("collector already initialized")]
    AlreadyInitialized,
    #[error("noise source unavailable: {0}")]
    Source(#[from] NoiseError),
}

/// Callback invoked when initialization determines enough entropy is
/// available to justify an immediate full reseed of the consuming DRNG.
pub type ReseedHook = Box<dyn Fn() + Send + Sync>;

/// A batch of harvested entropy: bytes plus the bits credited to them.
///
/// Zero credited bits signals "no entropy this round" — an expected,
/// non-fatal outcome. The buffer is wiped on drop.
pub struct EntropyBatch {
    data: Vec<u8>,
    credited_bits: u32,
}

impl EntropyBatch {
    fn new(data: Vec<u8>, credited_bits: u32) -> Self {
        Self {
            data,
            credited_bits,
        }
    }

    fn zeroed(requested_bits: u32) -> Self {
        Self::new(vec![0u8; (requested_bits / 8) as usize], 0)
    }

    /// Returns the harvested bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the entropy credited to [`data`](Self::data), in bits.
    pub fn credited_bits(&self) -> u32 {
        self.credited_bits
    }
}

impl Drop for EntropyBatch {
    fn drop(&mut self) {
        self.data.zeroize();
    }
}

impl std::fmt::Debug for EntropyBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntropyBatch")
            .field("bytes", &self.data.len())
            .field("credited_bits", &self.credited_bits)
            .finish_non_exhaustive()
    }
}

/// Read-only snapshot of the collector state.
#[derive(Debug, Clone)]
pub struct CollectorStatus {
    /// Entropy estimate at the security-strength reference width.
    pub available_entropy: u32,
    /// Whether the noise source has been acquired.
    pub initialized: bool,
    /// Whether background prefetching is enabled.
    pub async_enabled: bool,
}

impl std::fmt::Display for CollectorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, " Available entropy: {}", self.available_entropy)?;
        writeln!(f, " Initialized: {}", self.initialized)?;
        writeln!(f, " Async collection: {}", self.async_enabled)
    }
}

struct Inner {
    /// The shared noise source, `None` until initialization. The mutex
    /// also serializes fetches between the filler and the direct path.
    source: Mutex<Option<Box<dyn NoiseSource>>>,
    pool: SlotPool,
    /// Credited entropy bits per [`SECURITY_STRENGTH_BITS`] data bits.
    rate: AtomicU32,
    compliance_mode: bool,
    initialized: AtomicBool,
    async_enabled: AtomicBool,
    /// Coalesces refill requests: one scan in flight at a time.
    scan_scheduled: AtomicBool,
    /// Bumped on disable; fills that started under an older epoch are
    /// discarded instead of deposited.
    epoch: AtomicU64,
    reseed_hook: Option<ReseedHook>,
}

/// Handle to the jitter entropy subsystem.
///
/// Cheap to clone; all clones share the same pool, noise source, and
/// runtime flags. Consumers may call [`get_entropy`] from any number of
/// threads concurrently.
///
/// [`get_entropy`]: JitterCollector::get_entropy
#[derive(Clone)]
pub struct JitterCollector {
    inner: Arc<Inner>,
}

impl JitterCollector {
    /// Creates an uninitialized collector from a validated configuration.
    ///
    /// Until [`init`](Self::init) succeeds, every request is credited
    /// zero bits and the noise source is never touched.
    pub fn new(config: CollectorConfig) -> Result<Self, ConfigError> {
        Self::build(config, None)
    }

    /// Creates a collector that invokes `hook` when initialization
    /// determines an immediate full reseed of the consumer is justified.
    pub fn with_reseed_hook(
        config: CollectorConfig,
        hook: impl Fn() + Send + Sync + 'static,
    ) -> Result<Self, ConfigError> {
        Self::build(config, Some(Box::new(hook)))
    }

    fn build(config: CollectorConfig, hook: Option<ReseedHook>) -> Result<Self, ConfigError> {
        config.validate()?;
        let pool = SlotPool::new(config.pool_blocks)?;
        Ok(Self {
            inner: Arc::new(Inner {
                source: Mutex::new(None),
                pool,
                rate: AtomicU32::new(config.entropy_rate),
                compliance_mode: config.compliance_mode,
                initialized: AtomicBool::new(false),
                async_enabled: AtomicBool::new(config.async_enabled),
                scan_scheduled: AtomicBool::new(false),
                epoch: AtomicU64::new(0),
                reseed_hook: hook,
            }),
        })
    }

    /// One-time startup: probes the built-in timer jitter source and
    /// installs it. See [`init_with_source`](Self::init_with_source).
    pub fn init(&self) -> Result<(), CollectorError> {
        let source = TimerJitter::probe()?;
        self.init_with_source(Box::new(source))
    }

    /// One-time startup with a caller-supplied noise source.
    ///
    /// Installs the source, resolves the compliance-mode entropy rate,
    /// arms background filling when enabled, and fires the force-reseed
    /// hook when the resolved rate is nonzero.
    pub fn init_with_source(&self, source: Box<dyn NoiseSource>) -> Result<(), CollectorError> {
        let inner = &self.inner;
        {
            let mut guard = inner.source.lock();
            if guard.is_some() {
                return Err(CollectorError::AlreadyInitialized);
            }
            tracing::info!(source = source.name(), "jitter noise source acquired");
            *guard = Some(source);
        }
        inner.initialized.store(true, Ordering::SeqCst);

        let configured = inner.rate.load(Ordering::SeqCst);
        let resolved = crediting::resolve_rate(configured, inner.compliance_mode);
        if resolved != configured {
            tracing::info!(
                rate = resolved,
                "compliance mode forces full entropy crediting"
            );
        }
        inner.rate.store(resolved, Ordering::SeqCst);

        if inner.async_enabled.load(Ordering::SeqCst) {
            inner.pool.wipe_all();
            self.schedule_refill();
        }

        if resolved > 0 {
            tracing::info!(rate = resolved, "requesting full reseed of the consumer");
            if let Some(hook) = &inner.reseed_hook {
                hook();
            }
        }
        Ok(())
    }

    /// Obtains entropy for the caller.
    ///
    /// Standard-size requests ([`SEED_BITS`]) are served from the
    /// prefetch pool while async collection is enabled; everything else
    /// takes the direct (synchronous) path. Never fails: zero credited
    /// bits is the degraded-but-expected outcome. Requests must be a
    /// positive, byte-aligned bit count.
    pub fn get_entropy(&self, requested_bits: u32) -> EntropyBatch {
        if requested_bits == 0 || requested_bits % 8 != 0 {
            tracing::warn!(
                requested_bits,
                "entropy request must be a positive byte-aligned bit count"
            );
            return EntropyBatch::new(Vec::new(), 0);
        }
        if self.inner.async_enabled.load(Ordering::SeqCst) && requested_bits == SEED_BITS {
            self.pool_get(requested_bits)
        } else {
            self.direct_get(requested_bits)
        }
    }

    /// Serves a standard-size request from the prefetch pool, falling
    /// back to the direct path when the candidate slot is exhausted.
    fn pool_get(&self, requested_bits: u32) -> EntropyBatch {
        let inner = &self.inner;
        if !inner.initialized.load(Ordering::SeqCst) {
            return EntropyBatch::zeroed(requested_bits);
        }

        let index = inner.pool.advance_cursor();
        let slot = inner.pool.slot(index);
        if !slot.try_claim(SlotState::Filled, SlotState::Reading) {
            tracing::debug!(slot = index, "prefetch slot exhausted, using direct fetch");
            let batch = self.direct_get(requested_bits);
            self.schedule_refill();
            return batch;
        }

        let (mut buf, bits) = slot.drain();
        tracing::debug!(slot = index, bits, "served entropy from prefetched slot");
        let batch = EntropyBatch::new(buf.to_vec(), bits);
        buf.zeroize();

        if inner.pool.refill_due(index) {
            self.schedule_refill();
        }
        batch
    }

    /// Fetches entropy synchronously under the shared source lock.
    fn direct_get(&self, requested_bits: u32) -> EntropyBatch {
        let inner = &self.inner;
        let credited = crediting::credited_bits(inner.rate.load(Ordering::SeqCst), requested_bits);
        let mut data = vec![0u8; (requested_bits / 8) as usize];

        if !inner.initialized.load(Ordering::SeqCst) {
            return EntropyBatch::new(data, 0);
        }

        let result = {
            let mut guard = inner.source.lock();
            match guard.as_mut() {
                Some(source) => source.fetch(&mut data),
                None => return EntropyBatch::new(data, 0),
            }
        };
        match result {
            Ok(()) => {
                tracing::debug!(bits = credited, "obtained entropy from jitter noise source");
                EntropyBatch::new(data, credited)
            }
            Err(e) => {
                tracing::debug!(error = %e, "jitter noise source fetch failed");
                data.zeroize();
                EntropyBatch::new(data, 0)
            }
        }
    }

    /// One filler pass: claim and fill every `Empty` slot.
    ///
    /// Fetches are serialized with the direct path through the shared
    /// source lock, and the pass yields between slots so a full-pool
    /// refill cannot monopolize a core.
    fn fill_pass(&self) {
        let inner = &self.inner;
        tracing::debug!("slot refill pass started");

        for (index, slot) in inner.pool.slots().iter().enumerate() {
            if !inner.async_enabled.load(Ordering::SeqCst) {
                break;
            }
            if !slot.try_claim(SlotState::Empty, SlotState::Filling) {
                continue;
            }

            let epoch = inner.epoch.load(Ordering::SeqCst);
            let mut scratch = [0u8; SEED_BYTES];
            let fetched = {
                let mut guard = inner.source.lock();
                match guard.as_mut() {
                    Some(source) => match source.fetch(&mut scratch) {
                        Ok(()) => true,
                        Err(e) => {
                            tracing::debug!(slot = index, error = %e, "fill fetch failed");
                            false
                        }
                    },
                    None => false,
                }
            };

            let bits = crediting::credited_bits(inner.rate.load(Ordering::SeqCst), SEED_BITS);
            let committed = fetched
                && slot.commit_fill(&scratch, bits, || {
                    inner.async_enabled.load(Ordering::SeqCst)
                        && inner.epoch.load(Ordering::SeqCst) == epoch
                });
            if committed {
                tracing::debug!(slot = index, bits, "filled slot");
            } else {
                slot.revert_fill();
            }
            scratch.zeroize();

            thread::yield_now();
        }

        tracing::debug!("slot refill pass completed");
    }

    /// Requests a refill pass unless one is already in flight.
    fn schedule_refill(&self) {
        let inner = &self.inner;
        if !inner.async_enabled.load(Ordering::SeqCst) {
            return;
        }
        if inner.scan_scheduled.swap(true, Ordering::SeqCst) {
            return;
        }

        let collector = self.clone();
        let spawned = thread::Builder::new()
            .name("jitter-filler".into())
            .spawn(move || {
                collector.fill_pass();
                collector.inner.scan_scheduled.store(false, Ordering::SeqCst);
            });
        if let Err(e) = spawned {
            inner.scan_scheduled.store(false, Ordering::SeqCst);
            tracing::warn!(error = %e, "failed to spawn refill thread");
        }
    }

    /// Enables or disables background prefetching.
    ///
    /// Enabling resets the pool and schedules a refill pass. Disabling
    /// wipes every slot before returning and invalidates any fill still
    /// in flight.
    pub fn set_async_collection(&self, enabled: bool) {
        let inner = &self.inner;
        if enabled {
            if !inner.async_enabled.swap(true, Ordering::SeqCst) {
                inner.pool.wipe_all();
                tracing::info!("async jitter collection enabled");
                self.schedule_refill();
            }
        } else if inner.async_enabled.swap(false, Ordering::SeqCst) {
            inner.epoch.fetch_add(1, Ordering::SeqCst);
            inner.pool.wipe_all();
            tracing::info!("async jitter collection disabled");
        }
    }

    /// Updates the entropy rate (credited bits per
    /// [`SECURITY_STRENGTH_BITS`] data bits) at runtime, capped at full
    /// crediting.
    pub fn set_entropy_rate(&self, rate: u32) {
        let clamped = rate.min(SECURITY_STRENGTH_BITS);
        if clamped != rate {
            tracing::warn!(rate, clamped, "entropy rate capped at full crediting");
        }
        self.inner.rate.store(clamped, Ordering::SeqCst);
    }

    /// Entropy credited to a request of `requested_bits` under the
    /// current rate; zero while uninitialized.
    pub fn current_entropy(&self, requested_bits: u32) -> u32 {
        let rate = if self.inner.initialized.load(Ordering::SeqCst) {
            self.inner.rate.load(Ordering::SeqCst)
        } else {
            0
        };
        crediting::credited_bits(rate, requested_bits)
    }

    /// Maximum entropy a security-strength-width request can be
    /// credited with.
    pub fn max_entropy(&self) -> u32 {
        self.current_entropy(SECURITY_STRENGTH_BITS)
    }

    /// Read-only snapshot of the collector state.
    pub fn status(&self) -> CollectorStatus {
        CollectorStatus {
            available_entropy: self.max_entropy(),
            initialized: self.inner.initialized.load(Ordering::SeqCst),
            async_enabled: self.inner.async_enabled.load(Ordering::SeqCst),
        }
    }
}

impl std::fmt::Debug for JitterCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JitterCollector")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
