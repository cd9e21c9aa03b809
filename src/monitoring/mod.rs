/*!
 * Monitoring Module
 * Structured tracing setup and call spans
 */

mod tracer;

pub use tracer::{init_tracing, try_init_tracing, CallSpan};
