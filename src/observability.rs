//! Structured diagnostics for the codec's decision points.
//!
//! The engine and facade make per-call and per-block choices (resolved thread
//! counts, predictor orders, shaping weights). `log_metric!` emits them as a
//! single JSON-ish line on the `log` debug level so they can be grepped out of
//! an `env_logger` run with `RUST_LOG=pcmpack=debug`.

/// Logs a structured key-value metric line at debug level.
///
/// # Example
/// ```
/// use pcmpack::log_metric;
/// let order = 2;
/// log_metric!("event" = "predictor_order", "channel" = 0, "order" = &order);
/// ```
#[macro_export]
macro_rules! log_metric {
    ($($key:literal = $value:expr),+ $(,)?) => {
        if ::log::log_enabled!(::log::Level::Debug) {
            let mut parts: Vec<String> = Vec::new();
            $(
                parts.push(format!("\"{}\": \"{}\"", $key, $value));
            )+
            ::log::debug!("PCMPACK_METRIC: {{ {} }}", parts.join(", "));
        }
    };
}
