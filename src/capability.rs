//! Runtime detection of what the linked engine can do.
//!
//! Capabilities are derived from the engine's self-reported version, queried
//! live through [`NativeEngine::version`] rather than assumed at compile time,
//! since the same adapter may sit in front of different engine builds.

use std::fmt;
use std::sync::OnceLock;

use crate::engine::{BuiltinEngine, EngineError, NativeEngine};
use crate::error::PcmpackError;

/// First engine version whose encoder and decoder accept worker threads.
pub const MIN_MULTITHREAD_VERSION: EngineVersion = EngineVersion::new(5, 6, 4);
/// First engine version with per-block (dynamic) noise shaping.
pub const MIN_DYNAMIC_NOISE_SHAPING_VERSION: EngineVersion = EngineVersion::new(5, 0, 0);

//==================================================================================
// 1. Engine Version
//==================================================================================

/// A `major.minor.patch` engine version, ordered component-wise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EngineVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl EngineVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parses strings such as `"5.6.4"`, `"5.7"` or `"5.6.4-beta2"`.
    /// Missing minor/patch components read as zero; a pre-release suffix is ignored.
    pub fn parse(text: &str) -> Result<Self, PcmpackError> {
        let core = text
            .trim()
            .trim_start_matches('v')
            .split(|c: char| c == '-' || c == '+' || c.is_whitespace())
            .next()
            .unwrap_or_default();

        let mut parts = [0u32; 3];
        let mut count = 0;
        for (i, piece) in core.split('.').enumerate() {
            if i >= parts.len() {
                break;
            }
            parts[i] = piece.parse().map_err(|_| {
                PcmpackError::InvalidArgument(format!("Unparsable engine version '{}'", text))
            })?;
            count += 1;
        }
        if count == 0 {
            return Err(PcmpackError::InvalidArgument(format!(
                "Unparsable engine version '{}'",
                text
            )));
        }
        Ok(Self::new(parts[0], parts[1], parts[2]))
    }
}

impl fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

//==================================================================================
// 2. Capabilities
//==================================================================================

/// Version-gated feature flags of one engine. Immutable once probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub version: EngineVersion,
    pub multithreading: bool,
    pub dynamic_noise_shaping: bool,
}

impl Capabilities {
    pub fn from_version(version: EngineVersion) -> Self {
        Self {
            version,
            multithreading: version >= MIN_MULTITHREAD_VERSION,
            dynamic_noise_shaping: version >= MIN_DYNAMIC_NOISE_SHAPING_VERSION,
        }
    }

    /// Queries `engine` for its version and derives the flags.
    pub fn probe(engine: &dyn NativeEngine) -> Result<Self, PcmpackError> {
        let reported = engine.version();
        let version = EngineVersion::parse(&reported)
            .map_err(|e| EngineError::Version(e.to_string()))?;
        log::debug!("engine reports version {} ({})", version, reported);
        Ok(Self::from_version(version))
    }
}

static BUILTIN_CAPABILITIES: OnceLock<Capabilities> = OnceLock::new();

/// Capabilities of the built-in engine, probed once per process.
pub fn builtin_capabilities() -> Capabilities {
    *BUILTIN_CAPABILITIES.get_or_init(|| {
        Capabilities::probe(&BuiltinEngine).unwrap_or_else(|e| {
            log::error!("built-in engine version probe failed: {}", e);
            Capabilities::from_version(EngineVersion::default())
        })
    })
}

/// Version of the built-in engine.
pub fn engine_version() -> EngineVersion {
    builtin_capabilities().version
}

/// Whether the built-in engine honours worker-thread counts.
pub fn supports_multithreading() -> bool {
    builtin_capabilities().multithreading
}

/// Whether the built-in engine supports dynamic noise shaping.
pub fn supports_dynamic_noise_shaping() -> bool {
    builtin_capabilities().dynamic_noise_shaping
}

//==================================================================================
// 3. Warnings
//==================================================================================

/// Non-fatal notice that a request exceeds what the engine supports.
/// The operation still proceeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityWarning {
    /// More than one worker thread was requested from an engine without
    /// multithreading. The counts are passed through unchanged.
    ThreadsUnsupported {
        encoding_threads: Option<usize>,
        decoding_threads: Option<usize>,
        engine_version: EngineVersion,
    },
    /// Dynamic noise shaping was requested from an engine without it; fixed
    /// shaping with the configured weight is used instead.
    DynamicNoiseShapingUnavailable { engine_version: EngineVersion },
}

impl fmt::Display for CapabilityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ThreadsUnsupported {
                encoding_threads,
                decoding_threads,
                engine_version,
            } => write!(
                f,
                "engine {} does not support multithreading (requires >= {}); \
                 requested encoding threads {:?}, decoding threads {:?}",
                engine_version, MIN_MULTITHREAD_VERSION, encoding_threads, decoding_threads
            ),
            Self::DynamicNoiseShapingUnavailable { engine_version } => write!(
                f,
                "engine {} does not support dynamic noise shaping (requires >= {}); \
                 falling back to fixed shaping",
                engine_version, MIN_DYNAMIC_NOISE_SHAPING_VERSION
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_versions() {
        assert_eq!(EngineVersion::parse("5.6.4").unwrap(), EngineVersion::new(5, 6, 4));
        assert_eq!(EngineVersion::parse("5.7").unwrap(), EngineVersion::new(5, 7, 0));
        assert_eq!(
            EngineVersion::parse(" v5.6.4-beta2 ").unwrap(),
            EngineVersion::new(5, 6, 4)
        );
        assert!(EngineVersion::parse("").is_err());
        assert!(EngineVersion::parse("five.six").is_err());
    }

    #[test]
    fn test_ordering_is_semantic_not_lexical() {
        assert!(EngineVersion::new(5, 10, 0) > EngineVersion::new(5, 6, 4));
        assert!(EngineVersion::new(5, 6, 3) < MIN_MULTITHREAD_VERSION);
    }

    #[test]
    fn test_flags_follow_thresholds() {
        let old = Capabilities::from_version(EngineVersion::new(5, 6, 3));
        assert!(!old.multithreading);
        assert!(old.dynamic_noise_shaping);

        let exact = Capabilities::from_version(MIN_MULTITHREAD_VERSION);
        assert!(exact.multithreading);

        let ancient = Capabilities::from_version(EngineVersion::new(4, 80, 0));
        assert!(!ancient.dynamic_noise_shaping);
    }

    #[test]
    fn test_builtin_engine_supports_multithreading() {
        assert!(supports_multithreading());
        assert!(supports_dynamic_noise_shaping());
        assert!(engine_version() >= MIN_MULTITHREAD_VERSION);
    }
}
