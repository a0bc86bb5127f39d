//! Entropy crediting.
//!
//! Converts a requested bit count into the number of entropy bits the
//! jitter source is credited with, based on a conservative, runtime
//! adjustable rate. The rate is deliberately an underestimate of what
//! the noise source delivers; oversampled requests compensate.

/// Security strength of the consuming DRNG in bits.
///
/// Serves as the reference width for crediting: the configured rate is
/// expressed as "entropy bits per [`SECURITY_STRENGTH_BITS`] data bits".
pub const SECURITY_STRENGTH_BITS: u32 = 256;

/// Extra bits requested on top of the security strength to compensate
/// for conservative crediting.
pub const OVERSAMPLE_BITS: u32 = 64;

/// The standard oversampled seed request size in bits.
///
/// Requests of exactly this size are eligible for the prefetch pool.
pub const SEED_BITS: u32 = SECURITY_STRENGTH_BITS + OVERSAMPLE_BITS;

/// [`SEED_BITS`] expressed in bytes; the size of one slot buffer.
pub const SEED_BYTES: usize = (SEED_BITS / 8) as usize;

/// Default credited entropy per [`SECURITY_STRENGTH_BITS`] data bits.
///
/// A 16th of the security strength. The noise source delivers far more,
/// but the underestimate keeps the crediting defensible without a per
/// deployment entropy assessment.
pub const DEFAULT_ENTROPY_RATE: u32 = SECURITY_STRENGTH_BITS / 16;

/// Computes the entropy credited to `requested_bits` of source data.
///
/// Scales `rate` (entropy bits per [`SECURITY_STRENGTH_BITS`] data bits)
/// to the request width and caps the result at `requested_bits`. A rate
/// of zero credits nothing.
pub fn credited_bits(rate: u32, requested_bits: u32) -> u32 {
    let scaled = u64::from(rate) * u64::from(requested_bits) / u64::from(SECURITY_STRENGTH_BITS);
    scaled.min(u64::from(requested_bits)) as u32
}

/// Resolves the effective entropy rate at initialization time.
///
/// In compliance mode the source is defined to deliver full entropy
/// unless the operator explicitly configured a different rate. The
/// override only applies while the built-in default is nonzero: a zero
/// default means the source was meant to be excluded from crediting
/// altogether.
pub fn resolve_rate(configured: u32, compliance_mode: bool) -> u32 {
    if compliance_mode && DEFAULT_ENTROPY_RATE > 0 && configured == DEFAULT_ENTROPY_RATE {
        SECURITY_STRENGTH_BITS
    } else {
        configured
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_zero_rate_credits_nothing() {
        assert_eq!(credited_bits(0, SEED_BITS), 0);
        assert_eq!(credited_bits(0, 8), 0);
    }

    #[test]
    fn test_default_rate_scaling() {
        // 16 bits per 256 data bits, scaled to a 320-bit request.
        assert_eq!(credited_bits(DEFAULT_ENTROPY_RATE, SEED_BITS), 20);
        assert_eq!(credited_bits(DEFAULT_ENTROPY_RATE, SECURITY_STRENGTH_BITS), 16);
    }

    #[test]
    fn test_full_rate_credits_request() {
        assert_eq!(credited_bits(SECURITY_STRENGTH_BITS, SEED_BITS), SEED_BITS);
        assert_eq!(credited_bits(SECURITY_STRENGTH_BITS, 64), 64);
    }

    #[test]
    fn test_oversized_rate_capped_at_request() {
        assert_eq!(credited_bits(4096, 128), 128);
    }

    #[test]
    fn test_compliance_override_forces_full_rate() {
        assert_eq!(
            resolve_rate(DEFAULT_ENTROPY_RATE, true),
            SECURITY_STRENGTH_BITS
        );
    }

    #[test]
    fn test_compliance_respects_explicit_override() {
        // Operator chose a non-default rate; compliance mode leaves it alone.
        assert_eq!(resolve_rate(8, true), 8);
        assert_eq!(resolve_rate(0, true), 0);
    }

    #[test]
    fn test_no_compliance_keeps_configured_rate() {
        assert_eq!(resolve_rate(DEFAULT_ENTROPY_RATE, false), DEFAULT_ENTROPY_RATE);
        assert_eq!(resolve_rate(42, false), 42);
    }

    proptest! {
        #[test]
        fn prop_credit_never_exceeds_request(rate in 0u32..=4096, requested in 0u32..=1 << 20) {
            prop_assert!(credited_bits(rate, requested) <= requested);
        }

        #[test]
        fn prop_credit_monotone_in_rate(rate in 0u32..256, requested in 0u32..=1 << 20) {
            prop_assert!(credited_bits(rate, requested) <= credited_bits(rate + 1, requested));
        }
    }
}
