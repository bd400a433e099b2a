//! Environment abstraction for deterministic testing.
//!
//! Decouples session logic from system resources (time, randomness). Lets
//! the pending-command sweep and idle-timeout logic run against a virtual
//! clock in tests while production uses real system resources.

use std::time::Duration;

/// Abstract environment providing time, randomness, and async primitives.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `now()` never goes backwards
/// - `random_bytes()` uses cryptographically secure entropy in production
/// - Methods are infallible except in exceptional circumstances (e.g., OS
///   entropy exhaustion, incorrect simulation setup)
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    ///
    /// Production environments use `std::time::Instant`; deterministic
    /// tests can supply a virtual instant.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic).
    ///
    /// # Invariants
    ///
    /// Subsequent calls must return times that never decrease.
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// This is the only async method in the trait; only driver code uses
    /// it, never session logic.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    ///
    /// # Invariants
    ///
    /// - Given the same RNG seed, this produces the same sequence of bytes
    /// - Uses cryptographically secure RNG in production
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`. Used for session ids and command sequence
    /// numbers.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// Generates a random `u16`, the wire-format width of a command
    /// sequence number.
    fn random_u16(&self) -> u16 {
        let mut bytes = [0u8; 2];
        self.random_bytes(&mut bytes);
        u16::from_be_bytes(bytes)
    }
}
