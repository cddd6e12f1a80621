pub mod indexes;
pub mod models;

pub use indexes::ensure_indexes;
