// In: src/ffi/python.rs

use log::LevelFilter;
use pyo3::prelude::*;
use pyo3::types::{PyBytes, PyDict};
use std::fs::OpenOptions;
use std::sync::Once;

use crate::bridge::PcmCodec;
use crate::capability;
use crate::config::{CodecConfig, ThreadKind};
use crate::registry;
use crate::types::SampleDtype;

//==================================================================================
// I. Stateful Codec (numcodecs-style)
//==================================================================================

#[pyclass(name = "PcmPack", module = "pcmpack")]
pub struct PyPcmPack {
    inner: PcmCodec,
}

#[pymethods]
impl PyPcmPack {
    /// Creates a codec. Keyword arguments mirror the keys of `get_config()`.
    #[new]
    #[pyo3(signature = (
        level = 2,
        target_bits_per_sample = None,
        dynamic_noise_shaping = true,
        shaping_weight = 0.0,
        encoding_threads = None,
        decoding_threads = None
    ))]
    fn new(
        level: u8,
        target_bits_per_sample: Option<f32>,
        dynamic_noise_shaping: bool,
        shaping_weight: f32,
        encoding_threads: Option<i64>,
        decoding_threads: Option<i64>,
    ) -> PyResult<Self> {
        let config = CodecConfig {
            level,
            target_bits_per_sample,
            dynamic_noise_shaping,
            shaping_weight,
            encoding_threads: encoding_threads
                .map(|n| registry::thread_count_from_signed(ThreadKind::Encoding, n))
                .transpose()?,
            decoding_threads: decoding_threads
                .map(|n| registry::thread_count_from_signed(ThreadKind::Decoding, n))
                .transpose()?,
        };
        Ok(Self {
            inner: PcmCodec::new(config),
        })
    }

    /// Encodes a raw little-endian buffer of `dtype` elements with the given shape.
    pub fn encode<'py>(
        &self,
        py: Python<'py>,
        data: &[u8],
        dtype: &str,
        shape: Vec<usize>,
    ) -> PyResult<Bound<'py, PyBytes>> {
        let dtype = SampleDtype::from_name(dtype)?;
        let encoded = py.allow_threads(|| self.inner.encode_bytes(dtype, &shape, data))?;
        Ok(PyBytes::new_bound(py, &encoded))
    }

    /// Decodes to `(raw_bytes, dtype_name, shape)`.
    pub fn decode<'py>(
        &self,
        py: Python<'py>,
        data: &[u8],
    ) -> PyResult<(Bound<'py, PyBytes>, String, Vec<usize>)> {
        let chunk = py.allow_threads(|| self.inner.decode(data))?;
        let raw = chunk.to_bytes();
        Ok((
            PyBytes::new_bound(py, &raw),
            chunk.dtype().to_string(),
            chunk.shape().to_vec(),
        ))
    }

    /// The codec configuration as a dict, including its `id`.
    pub fn get_config<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyDict>> {
        let config = self.inner.config();
        let dict = PyDict::new_bound(py);
        dict.set_item("id", crate::config::CODEC_ID)?;
        dict.set_item("level", config.level)?;
        dict.set_item("target_bits_per_sample", config.target_bits_per_sample)?;
        dict.set_item("dynamic_noise_shaping", config.dynamic_noise_shaping)?;
        dict.set_item("shaping_weight", config.shaping_weight)?;
        dict.set_item("encoding_threads", config.encoding_threads)?;
        dict.set_item("decoding_threads", config.decoding_threads)?;
        Ok(dict)
    }

    fn __repr__(&self) -> String {
        format!("{:?}", self.inner.config())
    }
}

//==================================================================================
// II. Stateless Chunk-Level API
//==================================================================================

/// Analyzes an encoded chunk from its descriptor without decoding it.
#[pyfunction]
#[pyo3(name = "analyze_chunk")]
pub fn analyze_chunk_py<'py>(py: Python<'py>, chunk_bytes: &[u8]) -> PyResult<Bound<'py, PyDict>> {
    let stats = crate::bridge::analyze_chunk(chunk_bytes)?;

    let result_dict = PyDict::new_bound(py);
    result_dict.set_item("header_size", stats.header_size)?;
    result_dict.set_item("payload_size", stats.payload_size)?;
    result_dict.set_item("total_size", stats.total_size)?;
    result_dict.set_item("original_size", stats.original_size)?;
    result_dict.set_item("original_type", stats.original_type.clone())?;
    result_dict.set_item("shape", stats.shape.clone())?;
    result_dict.set_item("level", stats.level)?;
    result_dict.set_item("lossless", stats.lossless)?;
    result_dict.set_item("compression_ratio", stats.compression_ratio())?;
    Ok(result_dict)
}

//==================================================================================
// III. Registry and Capabilities
//==================================================================================

#[pyfunction]
pub fn set_num_encoding_threads(n: i64) -> PyResult<()> {
    let n = registry::thread_count_from_signed(ThreadKind::Encoding, n)?;
    Ok(registry::set_num_encoding_threads(n)?)
}

#[pyfunction]
pub fn get_num_encoding_threads() -> Option<usize> {
    registry::get_num_encoding_threads()
}

#[pyfunction]
pub fn reset_num_encoding_threads() {
    registry::reset_num_encoding_threads()
}

#[pyfunction]
pub fn set_num_decoding_threads(n: i64) -> PyResult<()> {
    let n = registry::thread_count_from_signed(ThreadKind::Decoding, n)?;
    Ok(registry::set_num_decoding_threads(n)?)
}

#[pyfunction]
pub fn get_num_decoding_threads() -> Option<usize> {
    registry::get_num_decoding_threads()
}

#[pyfunction]
pub fn reset_num_decoding_threads() {
    registry::reset_num_decoding_threads()
}

/// The built-in engine's version as `"major.minor.patch"`.
#[pyfunction]
pub fn engine_version() -> String {
    capability::engine_version().to_string()
}

#[pyfunction]
pub fn supports_multithreading() -> bool {
    capability::supports_multithreading()
}

#[pyfunction]
pub fn supports_dynamic_noise_shaping() -> bool {
    capability::supports_dynamic_noise_shaping()
}

//==================================================================================
// IV. Logging
//==================================================================================

static INIT_LOGGER: Once = Once::new();

/// Routes the crate's `log` output (capability warnings, per-call metrics)
/// to stderr, or appends it to `log_file`.
#[pyfunction]
#[pyo3(name = "enable_verbose_logging", signature = (log_file = None))]
pub fn enable_verbose_logging_py(log_file: Option<String>) -> PyResult<()> {
    let mut result = Ok(());
    INIT_LOGGER.call_once(|| {
        let mut builder = env_logger::Builder::new();

        builder.is_test(false);
        builder.filter_level(LevelFilter::Debug);

        // Custom formatter: just print the level and message
        builder.format(|buf, record| {
            use std::io::Write;
            writeln!(buf, "[{}] {}", record.level(), record.args())?;
            buf.flush()?;
            Ok(())
        });

        if let Some(filename) = log_file {
            match OpenOptions::new().append(true).create(true).open(&filename) {
                Ok(file) => {
                    builder.target(env_logger::Target::Pipe(Box::new(file)));
                }
                Err(e) => {
                    result = Err(pyo3::exceptions::PyIOError::new_err(format!(
                        "Could not open log file '{}': {}",
                        filename, e
                    )));
                    return;
                }
            }
        }

        let _ = builder.try_init();
    });
    result
}
