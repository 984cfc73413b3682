pub mod defs;
pub mod taxonomy;

pub use defs::*;
pub use taxonomy::{Category, EnumOption, Labelled, Source};
