pub mod clean;
pub mod orp;
pub mod tokenize;

pub use clean::clean_text;
pub use orp::{split_orp, OrpSplit};
pub use tokenize::{tokenize, units_from_chunks, DisplayUnit};
