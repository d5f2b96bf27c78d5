pub mod annotation;
pub mod decl;
pub mod name;
pub mod target;
pub mod types;
pub mod well_known;

pub use annotation::*;
pub use decl::*;
pub use name::*;
pub use target::*;
pub use types::*;
