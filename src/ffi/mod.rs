//! Foreign-function bindings. Only compiled with the `python` feature.

#[cfg(feature = "python")]
pub mod python;
