pub mod extract;

pub use extract::{extract, Extracted};
