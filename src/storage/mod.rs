pub mod json;

pub use json::{sanitize_query, RunStore};
