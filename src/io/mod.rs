mod export;

pub use export::{DatabaseSnapshot, Exporter};
