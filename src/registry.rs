//! Process-wide default worker-thread counts.
//!
//! Callers that build many codec instances (typically one per chunk) can set a
//! default here instead of passing thread counts through every call site. The
//! resolver reads the registry only for counts the instance left unset.
//!
//! Each slot is a single atomic: readers see either the old or the new value.
//! There is no ordering across calls, so a `set` racing with in-flight encodes
//! may be observed by some of them and not others (last writer wins). Pass
//! explicit instance thread counts when a call must be deterministic.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use crate::config::ThreadKind;
use crate::error::PcmpackError;

/// Slot value meaning "no default set".
const UNSET: usize = 0;

/// Two independent, atomically updated default thread counts.
#[derive(Debug, Default)]
pub struct ThreadRegistry {
    encoding: AtomicUsize,
    decoding: AtomicUsize,
}

impl ThreadRegistry {
    /// A registry with both slots unset.
    pub const fn new() -> Self {
        Self {
            encoding: AtomicUsize::new(UNSET),
            decoding: AtomicUsize::new(UNSET),
        }
    }

    fn slot(&self, kind: ThreadKind) -> &AtomicUsize {
        match kind {
            ThreadKind::Encoding => &self.encoding,
            ThreadKind::Decoding => &self.decoding,
        }
    }

    /// Stores `n` as the default for `kind`, replacing any previous value.
    pub fn set(&self, kind: ThreadKind, n: usize) -> Result<(), PcmpackError> {
        if n == 0 {
            return Err(PcmpackError::InvalidArgument(format!(
                "Default {:?} thread count must be a positive integer, got {}",
                kind, n
            )));
        }
        self.slot(kind).store(n, Ordering::Release);
        log::debug!("default {:?} threads set to {}", kind, n);
        Ok(())
    }

    /// The current default for `kind`, if any.
    pub fn get(&self, kind: ThreadKind) -> Option<NonZeroUsize> {
        NonZeroUsize::new(self.slot(kind).load(Ordering::Acquire))
    }

    /// Clears the default for `kind`.
    pub fn reset(&self, kind: ThreadKind) {
        self.slot(kind).store(UNSET, Ordering::Release);
        log::debug!("default {:?} threads reset", kind);
    }
}

/// Narrows a signed thread count, as handed over by dynamically typed callers.
/// Zero and negative counts are rejected the same way [`ThreadRegistry::set`] rejects zero.
pub fn thread_count_from_signed(kind: ThreadKind, n: i64) -> Result<usize, PcmpackError> {
    match usize::try_from(n) {
        Ok(count) if count > 0 => Ok(count),
        _ => Err(PcmpackError::InvalidArgument(format!(
            "{:?} thread count must be a positive integer, got {}",
            kind, n
        ))),
    }
}

//==================================================================================
// Process-global registry
//==================================================================================

static GLOBAL_REGISTRY: OnceLock<Arc<ThreadRegistry>> = OnceLock::new();

/// The process-wide registry shared by every codec built with `PcmCodec::new`.
pub fn global_registry() -> Arc<ThreadRegistry> {
    GLOBAL_REGISTRY
        .get_or_init(|| Arc::new(ThreadRegistry::new()))
        .clone()
}

pub fn set_default_threads(kind: ThreadKind, n: usize) -> Result<(), PcmpackError> {
    global_registry().set(kind, n)
}

pub fn get_default_threads(kind: ThreadKind) -> Option<usize> {
    global_registry().get(kind).map(NonZeroUsize::get)
}

pub fn reset_default_threads(kind: ThreadKind) {
    global_registry().reset(kind)
}

pub fn set_num_encoding_threads(n: usize) -> Result<(), PcmpackError> {
    set_default_threads(ThreadKind::Encoding, n)
}

pub fn get_num_encoding_threads() -> Option<usize> {
    get_default_threads(ThreadKind::Encoding)
}

pub fn reset_num_encoding_threads() {
    reset_default_threads(ThreadKind::Encoding)
}

pub fn set_num_decoding_threads(n: usize) -> Result<(), PcmpackError> {
    set_default_threads(ThreadKind::Decoding, n)
}

pub fn get_num_decoding_threads() -> Option<usize> {
    get_default_threads(ThreadKind::Decoding)
}

pub fn reset_num_decoding_threads() {
    reset_default_threads(ThreadKind::Decoding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_signed_thread_counts_must_be_positive() {
        assert_eq!(thread_count_from_signed(ThreadKind::Encoding, 3).unwrap(), 3);
        for n in [0i64, -1, i64::MIN] {
            assert!(matches!(
                thread_count_from_signed(ThreadKind::Decoding, n),
                Err(PcmpackError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn test_set_get_reset_are_per_slot() {
        let registry = ThreadRegistry::new();
        assert_eq!(registry.get(ThreadKind::Encoding), None);

        registry.set(ThreadKind::Encoding, 4).unwrap();
        assert_eq!(registry.get(ThreadKind::Encoding).map(NonZeroUsize::get), Some(4));
        assert_eq!(registry.get(ThreadKind::Decoding), None);

        registry.set(ThreadKind::Encoding, 2).unwrap();
        assert_eq!(registry.get(ThreadKind::Encoding).map(NonZeroUsize::get), Some(2));

        registry.reset(ThreadKind::Encoding);
        assert_eq!(registry.get(ThreadKind::Encoding), None);
    }

    #[test]
    fn test_zero_is_rejected_and_leaves_slot_untouched() {
        let registry = ThreadRegistry::new();
        registry.set(ThreadKind::Decoding, 3).unwrap();
        let result = registry.set(ThreadKind::Decoding, 0);
        assert!(matches!(result, Err(PcmpackError::InvalidArgument(_))));
        assert_eq!(registry.get(ThreadKind::Decoding).map(NonZeroUsize::get), Some(3));
    }

    #[test]
    fn test_concurrent_writers_never_tear() {
        let registry = Arc::new(ThreadRegistry::new());
        let handles: Vec<_> = (1..=8)
            .map(|n| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..1_000 {
                        registry.set(ThreadKind::Encoding, n).unwrap();
                        let seen = registry.get(ThreadKind::Encoding).unwrap().get();
                        assert!((1..=8).contains(&seen));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let last = registry.get(ThreadKind::Encoding).unwrap().get();
        assert!((1..=8).contains(&last));
    }

    #[test]
    fn test_global_registry_is_shared() {
        // Only the decoding slot is touched here; facade tests own the encoding slot.
        set_num_decoding_threads(6).unwrap();
        assert_eq!(global_registry().get(ThreadKind::Decoding).map(NonZeroUsize::get), Some(6));
        assert_eq!(get_num_decoding_threads(), Some(6));
        reset_num_decoding_threads();
        assert_eq!(get_default_threads(ThreadKind::Decoding), None);
    }
}
