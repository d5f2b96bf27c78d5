//! Names the model refers to by identity.

use super::name::DotName;
use once_cell::sync::Lazy;

pub static OBJECT: Lazy<DotName> = Lazy::new(|| DotName::simple("java.lang.Object"));
pub static RECORD: Lazy<DotName> = Lazy::new(|| DotName::simple("java.lang.Record"));
pub static ENUM: Lazy<DotName> = Lazy::new(|| DotName::simple("java.lang.Enum"));
pub static TARGET: Lazy<DotName> = Lazy::new(|| DotName::simple("java.lang.annotation.Target"));
pub static ELEMENT_TYPE: Lazy<DotName> =
    Lazy::new(|| DotName::simple("java.lang.annotation.ElementType"));
