use classdex_api::{DotName, TypePathError};
use thiserror::Error;

/// Why a class file was rejected as structurally invalid.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Malformed {
    #[error("unexpected end of data")]
    UnexpectedEof,
    #[error("bad magic number {0:#010x}")]
    BadMagic(u32),
    #[error("class file version {0} predates the class file format")]
    TooOldVersion(u16),
    #[error("invalid constant pool index {0}")]
    InvalidConstantIndex(u16),
    #[error("constant pool entry {index} is not a {expected}")]
    UnexpectedConstant { index: u16, expected: &'static str },
    #[error("unknown constant pool tag {0}")]
    UnknownConstantTag(u8),
    #[error("invalid descriptor `{0}`")]
    InvalidDescriptor(String),
    #[error("invalid modified UTF-8 in constant {0}")]
    InvalidUtf8(u16),
    #[error("type annotation path cannot be applied: {0}")]
    UnresolvedTypePath(#[from] TypePathError),
    #[error("invalid type annotation target {0:#04x}")]
    InvalidTypeAnnotationTarget(u8),
    #[error("invalid annotation element tag `{0}`")]
    InvalidAnnotationValue(char),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassFileError {
    #[error("malformed class file{} at offset {offset}: {reason}", describe(.class))]
    Malformed {
        class: Option<DotName>,
        offset: usize,
        reason: Malformed,
    },
    #[error("unsupported class file version {major}.{minor}{}", describe(.class))]
    UnsupportedVersion {
        class: Option<DotName>,
        major: u16,
        minor: u16,
    },
}

fn describe(class: &Option<DotName>) -> String {
    match class {
        Some(name) => format!(" ({})", name),
        None => String::new(),
    }
}

impl ClassFileError {
    pub fn malformed(offset: usize, reason: Malformed) -> Self {
        ClassFileError::Malformed {
            class: None,
            offset,
            reason,
        }
    }

    pub fn is_unsupported_version(&self) -> bool {
        matches!(self, ClassFileError::UnsupportedVersion { .. })
    }

    pub fn class(&self) -> Option<&DotName> {
        match self {
            ClassFileError::Malformed { class, .. } | ClassFileError::UnsupportedVersion { class, .. } => {
                class.as_ref()
            }
        }
    }

    /// Byte offset of a structural failure.
    pub fn offset(&self) -> Option<usize> {
        match self {
            ClassFileError::Malformed { offset, .. } => Some(*offset),
            ClassFileError::UnsupportedVersion { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&Malformed> {
        match self {
            ClassFileError::Malformed { reason, .. } => Some(reason),
            ClassFileError::UnsupportedVersion { .. } => None,
        }
    }

    /// Fills in the class name once it is known; an existing name is kept.
    pub fn in_class(mut self, name: &DotName) -> Self {
        match &mut self {
            ClassFileError::Malformed { class, .. } | ClassFileError::UnsupportedVersion { class, .. } => {
                if class.is_none() {
                    *class = Some(name.clone());
                }
            }
        }
        self
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("annotation class {0} is not indexed")]
    MissingAnnotationClass(DotName),
    #[error("annotation {annotation} has no member `{member}`")]
    UnknownAnnotationMember { annotation: DotName, member: String },
}

#[derive(Error, Debug)]
pub enum ClassdexError {
    #[error(transparent)]
    ClassFile(#[from] ClassFileError),
    #[error(transparent)]
    Index(#[from] IndexError),
}

impl ClassdexError {
    pub fn is_unsupported_version(&self) -> bool {
        matches!(self, ClassdexError::ClassFile(e) if e.is_unsupported_version())
    }
}

pub type Result<T> = std::result::Result<T, ClassdexError>;
