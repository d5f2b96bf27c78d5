use super::name::DotName;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;

/// Where an annotation instance is declared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnnotationTarget {
    pub class: DotName,
    pub site: TargetSite,
}

impl AnnotationTarget {
    pub fn new(class: DotName, site: TargetSite) -> Self {
        Self { class, site }
    }

    pub fn is_type_use(&self) -> bool {
        matches!(self.site, TargetSite::Type { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetSite {
    Class,
    Field(SmolStr),
    Method(MethodRef),
    MethodParameter { method: MethodRef, position: u16 },
    RecordComponent(SmolStr),
    Type { usage: TypeUsage, path: TypePath },
}

/// Identifies a method inside its class; name plus erased descriptor is unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MethodRef {
    pub name: SmolStr,
    pub descriptor: SmolStr,
}

impl MethodRef {
    pub fn new(name: impl Into<SmolStr>, descriptor: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.descriptor)
    }
}

/// Index of the superclass in [`TypeUsage::Supertype`].
pub const SUPERCLASS_INDEX: u16 = u16::MAX;

/// The type position a type-use annotation is rooted at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeUsage {
    /// `extends`/`implements` clause; [`SUPERCLASS_INDEX`] for the superclass,
    /// otherwise the interface position.
    Supertype { index: u16 },
    ClassTypeParameter { index: u8 },
    ClassTypeParameterBound { parameter: u8, bound: u8 },
    MethodTypeParameter { method: MethodRef, index: u8 },
    MethodTypeParameterBound { method: MethodRef, parameter: u8, bound: u8 },
    Field { field: SmolStr },
    RecordComponent { component: SmolStr },
    MethodReturn { method: MethodRef },
    MethodReceiver { method: MethodRef },
    MethodParameter { method: MethodRef, position: u16 },
    Throws { method: MethodRef, index: u16 },
}

/// One instruction of a type path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypePathStep {
    /// Deeper in an array type.
    Array,
    /// Deeper in a nested type.
    Nested,
    /// On the bound of a wildcard type argument.
    WildcardBound,
    /// On the n-th type argument of a parameterized type.
    TypeArgument(u8),
}

/// Addresses one position inside a type; empty means the type itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypePath(pub Vec<TypePathStep>);

impl TypePath {
    pub fn steps(&self) -> &[TypePathStep] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TypePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.0 {
            match step {
                TypePathStep::Array => f.write_str("[")?,
                TypePathStep::Nested => f.write_str(".")?,
                TypePathStep::WildcardBound => f.write_str("*")?,
                TypePathStep::TypeArgument(i) => write!(f, "{};", i)?,
            }
        }
        Ok(())
    }
}
