pub mod span;
pub mod span_data;
pub mod trace;
