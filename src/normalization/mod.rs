pub mod date;
pub mod header;

pub use date::{CreatedAt, DateNormalizer};
pub use header::normalize_header;
