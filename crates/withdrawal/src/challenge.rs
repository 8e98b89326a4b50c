//! Challenge-period math.

/// Seconds between a successful prove and finalize eligibility (12 hours).
pub const CHALLENGE_PERIOD_SECS: u64 = 43_200;

/// Point in time at which a withdrawal proven at `proven_at` becomes
/// finalizable.
pub const fn finalize_time(proven_at: u64) -> u64 {
    proven_at + CHALLENGE_PERIOD_SECS
}

/// Whether a withdrawal proven at `proven_at` can be finalized at `now`.
///
/// A zero timestamp means the portal has not recorded a prove, so the
/// answer is always false regardless of `now`.
pub const fn can_finalize(now: u64, proven_at: u64) -> bool {
    proven_at > 0 && now >= finalize_time(proven_at)
}
