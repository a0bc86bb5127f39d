//! Jitter Entropy Collection Library
//!
//! Supplies entropy harvested from a timing-jitter noise source to a
//! randomness-generation pipeline while hiding the cost of the source
//! from latency-sensitive callers. Seeds are prefetched into a pool of
//! slots by a background filler; standard-size requests are served
//! from the pool and everything else pays for a synchronous fetch.
//!
//! # Architecture
//!
//! The system follows an explicit data flow:
//!
//! ```text
//! noise source → background filler → slot pool → collector → caller
//!       └─────────── direct fetch fallback ──────────┘
//! ```
//!
//! # Design Principles
//!
//! - **Bounded caller latency**: a request waits for at most one noise
//!   fetch, and usually for none
//! - **Conservative crediting**: credited bits deliberately
//!   underestimate what the source delivers; oversampling compensates
//! - **No residue**: slot buffers are securely wiped on every exit
//!   from the filled state and when prefetching is disabled
//! - **Degrade, don't fail**: fetch failures and pool exhaustion
//!   surface as zero credited bits, never as errors
//!
//! # Example
//!
//! ```no_run
//! use jitter_entropy::{CollectorConfig, JitterCollector, SEED_BITS};
//!
//! let collector = JitterCollector::new(CollectorConfig::default()).unwrap();
//! collector.init().unwrap();
//!
//! // Standard-size requests are eligible for the prefetch pool.
//! let batch = collector.get_entropy(SEED_BITS);
//! println!(
//!     "{} bytes harvested, {} bits credited",
//!     batch.data().len(),
//!     batch.credited_bits()
//! );
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod collector;
pub mod config;
pub mod crediting;
pub mod pool;
pub mod source;

// Re-export commonly used types at crate root
pub use collector::{CollectorError, CollectorStatus, EntropyBatch, JitterCollector, ReseedHook};
pub use config::{CollectorConfig, ConfigError, FileConfig, OutputConfig};
pub use crediting::{DEFAULT_ENTROPY_RATE, SECURITY_STRENGTH_BITS, SEED_BITS, SEED_BYTES};
pub use pool::SlotState;
pub use source::{MockNoise, NoiseError, NoiseSource, TimerJitter};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
