//! Turns a per-instance `CodecConfig` into the immutable `ResolvedConfig` of
//! one encode or decode call.
//!
//! Precedence for thread counts is instance value, then registry default, then
//! engine default. Validation happens here, before the engine is touched.

use std::num::NonZeroUsize;

use crate::capability::{Capabilities, CapabilityWarning};
use crate::config::{
    CodecConfig, HybridSettings, NoiseShaping, ResolvedConfig, ThreadKind, ThreadSetting,
    MAX_LEVEL, MIN_LEVEL,
};
use crate::error::PcmpackError;
use crate::registry::ThreadRegistry;
use crate::types::SampleDtype;

/// The outcome of resolving one call: the parameters plus any non-fatal warnings.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub config: ResolvedConfig,
    pub warnings: Vec<CapabilityWarning>,
}

/// Resolves `config` for a chunk of `dtype`.
pub fn resolve(
    config: &CodecConfig,
    dtype: SampleDtype,
    registry: &ThreadRegistry,
    capabilities: &Capabilities,
) -> Result<Resolution, PcmpackError> {
    validate_level(config.level)?;

    let encoding_threads =
        resolve_threads(config.encoding_threads, ThreadKind::Encoding, registry)?;
    let decoding_threads =
        resolve_threads(config.decoding_threads, ThreadKind::Decoding, registry)?;

    let mut warnings = Vec::new();

    if (encoding_threads.is_parallel() || decoding_threads.is_parallel())
        && !capabilities.multithreading
    {
        warnings.push(CapabilityWarning::ThreadsUnsupported {
            encoding_threads: encoding_threads.count().map(NonZeroUsize::get),
            decoding_threads: decoding_threads.count().map(NonZeroUsize::get),
            engine_version: capabilities.version,
        });
    }

    let hybrid = match config.target_bits_per_sample {
        None => {
            if !config.dynamic_noise_shaping || config.shaping_weight != 0.0 {
                log::debug!(
                    "noise shaping settings (dynamic={}, weight={}) have no effect on lossless encoding",
                    config.dynamic_noise_shaping,
                    config.shaping_weight
                );
            }
            None
        }
        Some(bits) => {
            validate_target_bits(bits, dtype)?;
            let noise_shaping = if config.dynamic_noise_shaping {
                if capabilities.dynamic_noise_shaping {
                    NoiseShaping::Dynamic
                } else {
                    warnings.push(CapabilityWarning::DynamicNoiseShapingUnavailable {
                        engine_version: capabilities.version,
                    });
                    fixed_shaping(config.shaping_weight)?
                }
            } else {
                fixed_shaping(config.shaping_weight)?
            };
            Some(HybridSettings {
                target_bits_per_sample: bits,
                noise_shaping,
            })
        }
    };

    Ok(Resolution {
        config: ResolvedConfig {
            level: config.level,
            hybrid,
            encoding_threads,
            decoding_threads,
        },
        warnings,
    })
}

/// Thread resolution for a decode call. Decoding ignores the lossy settings, so
/// only the decoding thread count is resolved and gated.
pub fn resolve_decoding(
    config: &CodecConfig,
    registry: &ThreadRegistry,
    capabilities: &Capabilities,
) -> Result<(ThreadSetting, Vec<CapabilityWarning>), PcmpackError> {
    let threads = resolve_threads(config.decoding_threads, ThreadKind::Decoding, registry)?;
    let mut warnings = Vec::new();
    if threads.is_parallel() && !capabilities.multithreading {
        warnings.push(CapabilityWarning::ThreadsUnsupported {
            encoding_threads: None,
            decoding_threads: threads.count().map(NonZeroUsize::get),
            engine_version: capabilities.version,
        });
    }
    Ok((threads, warnings))
}

fn validate_level(level: u8) -> Result<(), PcmpackError> {
    if !(MIN_LEVEL..=MAX_LEVEL).contains(&level) {
        return Err(PcmpackError::InvalidArgument(format!(
            "Compression level must be in {}..={}, got {}",
            MIN_LEVEL, MAX_LEVEL, level
        )));
    }
    Ok(())
}

fn resolve_threads(
    requested: Option<usize>,
    kind: ThreadKind,
    registry: &ThreadRegistry,
) -> Result<ThreadSetting, PcmpackError> {
    match requested {
        Some(n) => NonZeroUsize::new(n).map(ThreadSetting::Instance).ok_or_else(|| {
            PcmpackError::InvalidArgument(format!(
                "{:?} thread count must be a positive integer, got {}",
                kind, n
            ))
        }),
        None => Ok(registry
            .get(kind)
            .map(ThreadSetting::Registry)
            .unwrap_or(ThreadSetting::EngineDefault)),
    }
}

fn validate_target_bits(bits: f32, dtype: SampleDtype) -> Result<(), PcmpackError> {
    let width = f32::from(dtype.bit_width());
    if !bits.is_finite() || bits <= 0.0 || bits >= width {
        return Err(PcmpackError::InvalidArgument(format!(
            "target_bits_per_sample must be in (0, {}) for {}, got {}",
            width, dtype, bits
        )));
    }
    Ok(())
}

fn fixed_shaping(weight: f32) -> Result<NoiseShaping, PcmpackError> {
    if !weight.is_finite() || !(-1.0..=1.0).contains(&weight) {
        return Err(PcmpackError::InvalidArgument(format!(
            "shaping_weight must be in [-1, 1], got {}",
            weight
        )));
    }
    Ok(NoiseShaping::Fixed(weight))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::EngineVersion;

    fn modern() -> Capabilities {
        Capabilities::from_version(EngineVersion::new(5, 7, 0))
    }

    fn legacy() -> Capabilities {
        Capabilities::from_version(EngineVersion::new(5, 6, 0))
    }

    #[test]
    fn test_registry_precedence() {
        let registry = ThreadRegistry::new();
        let caps = modern();

        registry.set(ThreadKind::Encoding, 4).unwrap();
        let resolved = resolve(&CodecConfig::default(), SampleDtype::Int16, &registry, &caps)
            .unwrap()
            .config;
        assert_eq!(resolved.encoding_threads.count().map(NonZeroUsize::get), Some(4));
        assert!(matches!(resolved.encoding_threads, ThreadSetting::Registry(_)));

        let explicit = CodecConfig::default().with_threads(Some(2), None);
        let resolved = resolve(&explicit, SampleDtype::Int16, &registry, &caps)
            .unwrap()
            .config;
        assert_eq!(resolved.encoding_threads.count().map(NonZeroUsize::get), Some(2));
        assert!(matches!(resolved.encoding_threads, ThreadSetting::Instance(_)));

        registry.reset(ThreadKind::Encoding);
        let resolved = resolve(&CodecConfig::default(), SampleDtype::Int16, &registry, &caps)
            .unwrap()
            .config;
        assert_eq!(resolved.encoding_threads, ThreadSetting::EngineDefault);
        assert_eq!(resolved.encoding_threads.count(), None);
    }

    #[test]
    fn test_threads_on_legacy_engine_warn_once_with_both_counts() {
        let registry = ThreadRegistry::new();
        let config = CodecConfig::default().with_threads(Some(4), Some(4));
        let resolution = resolve(&config, SampleDtype::Int16, &registry, &legacy()).unwrap();

        assert_eq!(
            resolution.warnings,
            vec![CapabilityWarning::ThreadsUnsupported {
                encoding_threads: Some(4),
                decoding_threads: Some(4),
                engine_version: EngineVersion::new(5, 6, 0),
            }]
        );
        // Counts are passed through unchanged.
        assert_eq!(
            resolution.config.encoding_threads.count().map(NonZeroUsize::get),
            Some(4)
        );
    }

    #[test]
    fn test_no_warning_for_single_thread_or_modern_engine() {
        let registry = ThreadRegistry::new();
        let single = CodecConfig::default().with_threads(Some(1), Some(1));
        assert!(resolve(&single, SampleDtype::Int8, &registry, &legacy())
            .unwrap()
            .warnings
            .is_empty());

        let parallel = CodecConfig::default().with_threads(Some(4), Some(1));
        assert!(resolve(&parallel, SampleDtype::Int8, &registry, &modern())
            .unwrap()
            .warnings
            .is_empty());
    }

    #[test]
    fn test_registry_default_also_triggers_warning() {
        let registry = ThreadRegistry::new();
        registry.set(ThreadKind::Decoding, 3).unwrap();
        let resolution =
            resolve(&CodecConfig::default(), SampleDtype::Int32, &registry, &legacy()).unwrap();
        assert_eq!(resolution.warnings.len(), 1);
    }

    #[test]
    fn test_invalid_arguments_are_rejected() {
        let registry = ThreadRegistry::new();
        let caps = modern();
        let cases = [
            CodecConfig::lossless(0),
            CodecConfig::lossless(5),
            CodecConfig::default().with_threads(Some(0), None),
            CodecConfig::default().with_threads(None, Some(0)),
            CodecConfig::lossy(2, 16.0),
            CodecConfig::lossy(2, 0.0),
            CodecConfig::lossy(2, -3.0),
            CodecConfig::lossy(2, f32::NAN),
        ];
        for config in cases {
            let result = resolve(&config, SampleDtype::Int16, &registry, &caps);
            assert!(
                matches!(result, Err(PcmpackError::InvalidArgument(_))),
                "expected rejection for {:?}",
                config
            );
        }
    }

    #[test]
    fn test_target_bits_bound_depends_on_dtype() {
        let registry = ThreadRegistry::new();
        let config = CodecConfig::lossy(2, 12.0);
        assert!(resolve(&config, SampleDtype::Int8, &registry, &modern()).is_err());
        assert!(resolve(&config, SampleDtype::Int16, &registry, &modern()).is_ok());
        assert!(resolve(&config, SampleDtype::Float32, &registry, &modern()).is_ok());
    }

    #[test]
    fn test_shaping_is_inert_when_lossless() {
        let registry = ThreadRegistry::new();
        let config = CodecConfig {
            dynamic_noise_shaping: false,
            shaping_weight: 7.5,
            ..CodecConfig::default()
        };
        let resolved = resolve(&config, SampleDtype::Int16, &registry, &modern())
            .unwrap()
            .config;
        assert!(resolved.is_lossless());
    }

    #[test]
    fn test_noise_shaping_selection() {
        let registry = ThreadRegistry::new();

        let dynamic = CodecConfig::lossy(2, 4.0);
        let resolved = resolve(&dynamic, SampleDtype::Int16, &registry, &modern()).unwrap();
        assert_eq!(
            resolved.config.hybrid.unwrap().noise_shaping,
            NoiseShaping::Dynamic
        );

        let fixed = CodecConfig {
            dynamic_noise_shaping: false,
            shaping_weight: -0.5,
            ..CodecConfig::lossy(2, 4.0)
        };
        let resolved = resolve(&fixed, SampleDtype::Int16, &registry, &modern()).unwrap();
        assert_eq!(
            resolved.config.hybrid.unwrap().noise_shaping,
            NoiseShaping::Fixed(-0.5)
        );

        let out_of_range = CodecConfig {
            shaping_weight: 1.5,
            ..fixed
        };
        assert!(resolve(&out_of_range, SampleDtype::Int16, &registry, &modern()).is_err());
    }

    #[test]
    fn test_dynamic_shaping_falls_back_on_old_engine() {
        let registry = ThreadRegistry::new();
        let caps = Capabilities::from_version(EngineVersion::new(4, 80, 0));
        let config = CodecConfig {
            shaping_weight: 0.25,
            ..CodecConfig::lossy(2, 4.0)
        };
        let resolution = resolve(&config, SampleDtype::Int16, &registry, &caps).unwrap();
        assert_eq!(
            resolution.config.hybrid.unwrap().noise_shaping,
            NoiseShaping::Fixed(0.25)
        );
        assert!(matches!(
            resolution.warnings.as_slice(),
            [CapabilityWarning::DynamicNoiseShapingUnavailable { .. }]
        ));
    }

    #[test]
    fn test_decoding_resolution_ignores_lossy_settings() {
        let registry = ThreadRegistry::new();
        registry.set(ThreadKind::Decoding, 3).unwrap();
        // Would be rejected for int8 on encode; decode does not care.
        let config = CodecConfig::lossy(2, 12.0);
        let (threads, warnings) = resolve_decoding(&config, &registry, &legacy()).unwrap();
        assert_eq!(threads, ThreadSetting::Registry(NonZeroUsize::new(3).unwrap()));
        assert!(matches!(
            warnings.as_slice(),
            [CapabilityWarning::ThreadsUnsupported {
                encoding_threads: None,
                decoding_threads: Some(3),
                ..
            }]
        ));

        let (threads, warnings) =
            resolve_decoding(&CodecConfig::default(), &ThreadRegistry::new(), &modern()).unwrap();
        assert_eq!(threads, ThreadSetting::EngineDefault);
        assert!(warnings.is_empty());
    }
}
