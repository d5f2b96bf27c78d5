pub mod names;

pub use names::{NameTable, NameTableStats};
