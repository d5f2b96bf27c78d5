use super::name::DotName;
use super::target::AnnotationTarget;
use super::types::Type;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::hash::{Hash, Hasher};

/// One use of an annotation: its type, where it sits, and its element values.
///
/// Instances attached to [`Type`] nodes carry no target so identical annotated
/// shapes can be interned; the per-declaration lists carry the targeted copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationInstance {
    name: DotName,
    target: Option<AnnotationTarget>,
    values: IndexMap<SmolStr, AnnotationValue>,
    runtime_visible: bool,
}

impl AnnotationInstance {
    pub fn new(name: DotName, runtime_visible: bool) -> Self {
        Self {
            name,
            target: None,
            values: IndexMap::new(),
            runtime_visible,
        }
    }

    /// Adds an element value; a repeated element name keeps its first
    /// position and takes the last value.
    pub fn with_value(mut self, name: impl Into<SmolStr>, value: AnnotationValue) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn with_target(mut self, target: AnnotationTarget) -> Self {
        self.target = Some(target);
        self
    }

    /// The same instance without a target, as stored inside type nodes.
    pub fn detached(&self) -> Self {
        Self {
            target: None,
            ..self.clone()
        }
    }

    pub fn name(&self) -> &DotName {
        &self.name
    }

    pub fn target(&self) -> Option<&AnnotationTarget> {
        self.target.as_ref()
    }

    pub fn runtime_visible(&self) -> bool {
        self.runtime_visible
    }

    pub fn value(&self, name: &str) -> Option<&AnnotationValue> {
        self.values.get(name)
    }

    pub fn values(&self) -> impl Iterator<Item = (&str, &AnnotationValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn value_count(&self) -> usize {
        self.values.len()
    }
}

impl PartialEq for AnnotationInstance {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.runtime_visible == other.runtime_visible
            && self.target == other.target
            && self.values.iter().eq(other.values.iter())
    }
}

impl Eq for AnnotationInstance {}

impl Hash for AnnotationInstance {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.runtime_visible.hash(state);
        self.target.hash(state);
        self.values.len().hash(state);
        for (key, value) in &self.values {
            key.hash(state);
            value.hash(state);
        }
    }
}

/// An element value of an annotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AnnotationValue {
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    /// A UTF-16 code unit; lone surrogates are representable.
    Char(u16),
    String(SmolStr),
    Class(Type),
    Enum { type_name: DotName, constant: SmolStr },
    Nested(Box<AnnotationInstance>),
    Array(Vec<AnnotationValue>),
}

/// The kind of an [`AnnotationValue`], used to describe array elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnnotationValueKind {
    Boolean,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Char,
    String,
    Class,
    Enum,
    Nested,
    Array,
}

impl AnnotationValue {
    pub fn kind(&self) -> AnnotationValueKind {
        match self {
            AnnotationValue::Boolean(_) => AnnotationValueKind::Boolean,
            AnnotationValue::Byte(_) => AnnotationValueKind::Byte,
            AnnotationValue::Short(_) => AnnotationValueKind::Short,
            AnnotationValue::Int(_) => AnnotationValueKind::Int,
            AnnotationValue::Long(_) => AnnotationValueKind::Long,
            AnnotationValue::Float(_) => AnnotationValueKind::Float,
            AnnotationValue::Double(_) => AnnotationValueKind::Double,
            AnnotationValue::Char(_) => AnnotationValueKind::Char,
            AnnotationValue::String(_) => AnnotationValueKind::String,
            AnnotationValue::Class(_) => AnnotationValueKind::Class,
            AnnotationValue::Enum { .. } => AnnotationValueKind::Enum,
            AnnotationValue::Nested(_) => AnnotationValueKind::Nested,
            AnnotationValue::Array(_) => AnnotationValueKind::Array,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AnnotationValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Widens any integral value (including `char`) to `i64`.
    pub fn as_long(&self) -> Option<i64> {
        match self {
            AnnotationValue::Byte(v) => Some(i64::from(*v)),
            AnnotationValue::Short(v) => Some(i64::from(*v)),
            AnnotationValue::Int(v) => Some(i64::from(*v)),
            AnnotationValue::Long(v) => Some(*v),
            AnnotationValue::Char(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            AnnotationValue::Float(v) => Some(f64::from(*v)),
            AnnotationValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_char(&self) -> Option<char> {
        match self {
            AnnotationValue::Char(v) => char::from_u32(u32::from(*v)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AnnotationValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<&Type> {
        match self {
            AnnotationValue::Class(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<(&DotName, &str)> {
        match self {
            AnnotationValue::Enum {
                type_name,
                constant,
            } => Some((type_name, constant)),
            _ => None,
        }
    }

    pub fn as_nested(&self) -> Option<&AnnotationInstance> {
        match self {
            AnnotationValue::Nested(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[AnnotationValue]> {
        match self {
            AnnotationValue::Array(v) => Some(v),
            _ => None,
        }
    }
}

impl PartialEq for AnnotationValue {
    fn eq(&self, other: &Self) -> bool {
        use AnnotationValue::*;
        match (self, other) {
            (Boolean(a), Boolean(b)) => a == b,
            (Byte(a), Byte(b)) => a == b,
            (Short(a), Short(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Long(a), Long(b)) => a == b,
            (Float(a), Float(b)) => a.to_bits() == b.to_bits(),
            (Double(a), Double(b)) => a.to_bits() == b.to_bits(),
            (Char(a), Char(b)) => a == b,
            (String(a), String(b)) => a == b,
            (Class(a), Class(b)) => a == b,
            (
                Enum {
                    type_name: ta,
                    constant: ca,
                },
                Enum {
                    type_name: tb,
                    constant: cb,
                },
            ) => ta == tb && ca == cb,
            (Nested(a), Nested(b)) => a == b,
            (Array(a), Array(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for AnnotationValue {}

impl Hash for AnnotationValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind().hash(state);
        match self {
            AnnotationValue::Boolean(v) => v.hash(state),
            AnnotationValue::Byte(v) => v.hash(state),
            AnnotationValue::Short(v) => v.hash(state),
            AnnotationValue::Int(v) => v.hash(state),
            AnnotationValue::Long(v) => v.hash(state),
            AnnotationValue::Float(v) => v.to_bits().hash(state),
            AnnotationValue::Double(v) => v.to_bits().hash(state),
            AnnotationValue::Char(v) => v.hash(state),
            AnnotationValue::String(v) => v.hash(state),
            AnnotationValue::Class(v) => v.hash(state),
            AnnotationValue::Enum {
                type_name,
                constant,
            } => {
                type_name.hash(state);
                constant.hash(state);
            }
            AnnotationValue::Nested(v) => v.hash(state),
            AnnotationValue::Array(v) => v.hash(state),
        }
    }
}

/// Looks up an annotation in a slice sorted by annotation name.
///
/// Uses the [`DotName`] total order, so the slice may mix name encodings.
pub fn binary_search_annotation<'a>(
    annotations: &'a [AnnotationInstance],
    name: &DotName,
) -> Option<&'a AnnotationInstance> {
    annotations
        .binary_search_by(|candidate| candidate.name().cmp(name))
        .ok()
        .map(|idx| &annotations[idx])
}

/// Sorts a declaration's annotations by name, keeping one instance per name.
///
/// When a name repeats, the instance that came last wins.
pub fn normalize_annotations(annotations: Vec<AnnotationInstance>) -> Vec<AnnotationInstance> {
    let mut deduped: IndexMap<DotName, AnnotationInstance> = IndexMap::new();
    for annotation in annotations {
        deduped.insert(annotation.name().clone(), annotation);
    }
    let mut result: Vec<AnnotationInstance> = deduped.into_values().collect();
    result.sort_by(|a, b| a.name().cmp(b.name()));
    result
}
