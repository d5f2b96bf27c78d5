use super::annotation::AnnotationInstance;
use super::name::DotName;
use super::target::TypePathStep;
use super::well_known;
use crate::error::{PathResult, TypePathError};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;
use std::sync::Arc;

/// Upper bound on enclosing-class expansion, guards against cyclic nesting tables.
const MAX_NESTING_DEPTH: u32 = 64;

/// A shared, immutable type node plus the type-use annotations attached to it.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Type(Arc<TypeNode>);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
struct TypeNode {
    kind: TypeKind,
    annotations: Vec<AnnotationInstance>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Void,
    Primitive(PrimitiveKind),
    Class(DotName),
    Parameterized(ParameterizedType),
    Array(ArrayType),
    TypeVariable(TypeVariable),
    TypeVariableReference(TypeVariableReference),
    UnresolvedTypeVariable(SmolStr),
    Wildcard(WildcardBound),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PrimitiveKind {
    Boolean,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Char,
}

impl PrimitiveKind {
    pub fn from_descriptor(tag: u8) -> Option<Self> {
        Some(match tag {
            b'Z' => PrimitiveKind::Boolean,
            b'B' => PrimitiveKind::Byte,
            b'S' => PrimitiveKind::Short,
            b'I' => PrimitiveKind::Int,
            b'J' => PrimitiveKind::Long,
            b'F' => PrimitiveKind::Float,
            b'D' => PrimitiveKind::Double,
            b'C' => PrimitiveKind::Char,
            _ => return None,
        })
    }

    pub fn descriptor(self) -> char {
        match self {
            PrimitiveKind::Boolean => 'Z',
            PrimitiveKind::Byte => 'B',
            PrimitiveKind::Short => 'S',
            PrimitiveKind::Int => 'I',
            PrimitiveKind::Long => 'J',
            PrimitiveKind::Float => 'F',
            PrimitiveKind::Double => 'D',
            PrimitiveKind::Char => 'C',
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Byte => "byte",
            PrimitiveKind::Short => "short",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
            PrimitiveKind::Char => "char",
        }
    }
}

/// A generic class type; `owner` is set for inner types of a generic (or
/// annotated) enclosing type, e.g. `Outer<X>.Inner<Y>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParameterizedType {
    pub name: DotName,
    pub owner: Option<Type>,
    pub arguments: Vec<Type>,
}

/// `dimensions` array levels around `component`. The component is itself an
/// array only when one of its inner dimensions carries its own annotations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArrayType {
    pub component: Type,
    pub dimensions: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeVariable {
    pub identifier: SmolStr,
    pub bounds: Vec<Type>,
    /// Set when the declaration had no class bound (`T::Ljava/lang/Comparable;`),
    /// so the first stored bound is an interface bound.
    pub implicit_object_bound: bool,
}

/// Which declaration's type-parameter list a reference points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableScope {
    Class,
    Method,
}

/// A self or forward reference to a type parameter of the same list, such as
/// the `T` in `T extends Comparable<T>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeVariableReference {
    pub identifier: SmolStr,
    pub position: u16,
    pub scope: VariableScope,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WildcardBound {
    Unbounded,
    Extends(Type),
    Super(Type),
}

impl Type {
    fn from_parts(kind: TypeKind, annotations: Vec<AnnotationInstance>) -> Self {
        Self(Arc::new(TypeNode { kind, annotations }))
    }

    /// Same annotations, different shape.
    pub fn with_kind(&self, kind: TypeKind) -> Type {
        Type::from_parts(kind, self.0.annotations.clone())
    }

    pub fn void() -> Type {
        Type::from_parts(TypeKind::Void, Vec::new())
    }

    pub fn primitive(kind: PrimitiveKind) -> Type {
        Type::from_parts(TypeKind::Primitive(kind), Vec::new())
    }

    pub fn class(name: DotName) -> Type {
        Type::from_parts(TypeKind::Class(name), Vec::new())
    }

    pub fn parameterized(name: DotName, owner: Option<Type>, arguments: Vec<Type>) -> Type {
        Type::from_parts(
            TypeKind::Parameterized(ParameterizedType {
                name,
                owner,
                arguments,
            }),
            Vec::new(),
        )
    }

    /// Wraps `component` in `dimensions` array levels, merging with an
    /// unannotated array component.
    pub fn array(component: Type, dimensions: u32) -> Type {
        if dimensions == 0 {
            return component;
        }
        if let TypeKind::Array(inner) = component.kind() {
            if component.annotations().is_empty() {
                return Type::from_parts(
                    TypeKind::Array(ArrayType {
                        component: inner.component.clone(),
                        dimensions: inner.dimensions + dimensions,
                    }),
                    Vec::new(),
                );
            }
        }
        Type::from_parts(
            TypeKind::Array(ArrayType {
                component,
                dimensions,
            }),
            Vec::new(),
        )
    }

    pub fn type_variable(
        identifier: impl Into<SmolStr>,
        bounds: Vec<Type>,
        implicit_object_bound: bool,
    ) -> Type {
        Type::from_parts(
            TypeKind::TypeVariable(TypeVariable {
                identifier: identifier.into(),
                bounds,
                implicit_object_bound,
            }),
            Vec::new(),
        )
    }

    pub fn type_variable_reference(
        identifier: impl Into<SmolStr>,
        position: u16,
        scope: VariableScope,
    ) -> Type {
        Type::from_parts(
            TypeKind::TypeVariableReference(TypeVariableReference {
                identifier: identifier.into(),
                position,
                scope,
            }),
            Vec::new(),
        )
    }

    pub fn unresolved_type_variable(identifier: impl Into<SmolStr>) -> Type {
        Type::from_parts(
            TypeKind::UnresolvedTypeVariable(identifier.into()),
            Vec::new(),
        )
    }

    /// Builds a wildcard; an unannotated `extends java.lang.Object` bound is
    /// the same as no bound.
    pub fn wildcard(bound: WildcardBound) -> Type {
        let bound = match bound {
            WildcardBound::Extends(t) if t.is_plain_object() => WildcardBound::Unbounded,
            other => other,
        };
        Type::from_parts(TypeKind::Wildcard(bound), Vec::new())
    }

    fn is_plain_object(&self) -> bool {
        matches!(self.kind(), TypeKind::Class(name) if *name == *well_known::OBJECT)
            && self.annotations().is_empty()
    }

    pub fn kind(&self) -> &TypeKind {
        &self.0.kind
    }

    pub fn annotations(&self) -> &[AnnotationInstance] {
        &self.0.annotations
    }

    pub fn annotation(&self, name: &DotName) -> Option<&AnnotationInstance> {
        self.0.annotations.iter().find(|a| a.name() == name)
    }

    pub fn has_annotation(&self, name: &DotName) -> bool {
        self.annotation(name).is_some()
    }

    /// Adds a type-use annotation to this node; an existing annotation of the
    /// same type is replaced in place.
    pub fn with_annotation(&self, annotation: AnnotationInstance) -> Type {
        let annotation = annotation.detached();
        let mut annotations = self.0.annotations.clone();
        match annotations
            .iter_mut()
            .find(|a| a.name() == annotation.name())
        {
            Some(existing) => *existing = annotation,
            None => annotations.push(annotation),
        }
        Type::from_parts(self.0.kind.clone(), annotations)
    }

    pub fn with_annotations(&self, annotations: &[AnnotationInstance]) -> Type {
        annotations
            .iter()
            .fold(self.clone(), |ty, a| ty.with_annotation(a.clone()))
    }

    pub fn without_annotations(&self) -> Type {
        if self.0.annotations.is_empty() {
            return self.clone();
        }
        Type::from_parts(self.0.kind.clone(), Vec::new())
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self.kind(), TypeKind::Primitive(_))
    }

    pub fn is_void(&self) -> bool {
        matches!(self.kind(), TypeKind::Void)
    }

    pub fn as_parameterized(&self) -> Option<&ParameterizedType> {
        match self.kind() {
            TypeKind::Parameterized(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_type_variable(&self) -> Option<&TypeVariable> {
        match self.kind() {
            TypeKind::TypeVariable(tv) => Some(tv),
            _ => None,
        }
    }

    pub fn as_wildcard(&self) -> Option<&WildcardBound> {
        match self.kind() {
            TypeKind::Wildcard(bound) => Some(bound),
            _ => None,
        }
    }

    /// Type arguments of a parameterized type, empty otherwise.
    pub fn arguments(&self) -> &[Type] {
        match self.kind() {
            TypeKind::Parameterized(p) => &p.arguments,
            _ => &[],
        }
    }

    pub fn owner(&self) -> Option<&Type> {
        match self.kind() {
            TypeKind::Parameterized(p) => p.owner.as_ref(),
            _ => None,
        }
    }

    /// Number of enclosing types recorded above this one.
    pub fn owner_depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.owner();
        while let Some(owner) = current {
            depth += 1;
            current = owner.owner();
        }
        depth
    }

    /// The innermost non-array type of an array, or the type itself.
    pub fn element(&self) -> &Type {
        match self.kind() {
            TypeKind::Array(a) => a.component.element(),
            _ => self,
        }
    }

    /// Total array dimensions, 0 for non-arrays.
    pub fn dimensions(&self) -> u32 {
        match self.kind() {
            TypeKind::Array(a) => a.dimensions + a.component.dimensions(),
            _ => 0,
        }
    }

    /// The type one array level down, `None` for non-arrays.
    pub fn component(&self) -> Option<Type> {
        match self.kind() {
            TypeKind::Array(a) if a.dimensions > 1 => {
                Some(Type::array(a.component.clone(), a.dimensions - 1))
            }
            TypeKind::Array(a) => Some(a.component.clone()),
            _ => None,
        }
    }

    /// The erased name of this type. Arrays use the descriptor form with
    /// dots (`[Ljava.lang.String;`).
    pub fn name(&self) -> DotName {
        match self.kind() {
            TypeKind::Void => DotName::simple("void"),
            TypeKind::Primitive(p) => DotName::simple(p.name()),
            TypeKind::Class(name) => name.clone(),
            TypeKind::Parameterized(p) => p.name.clone(),
            TypeKind::Array(_) => DotName::simple(self.descriptor().replace('/', ".")),
            TypeKind::TypeVariable(tv) => tv
                .bounds
                .first()
                .map(Type::name)
                .unwrap_or_else(|| well_known::OBJECT.clone()),
            TypeKind::TypeVariableReference(_) | TypeKind::UnresolvedTypeVariable(_) => {
                well_known::OBJECT.clone()
            }
            TypeKind::Wildcard(WildcardBound::Extends(t)) => t.name(),
            TypeKind::Wildcard(_) => well_known::OBJECT.clone(),
        }
    }

    /// The descriptor-level type: no generics, no annotations.
    pub fn erasure(&self) -> Type {
        match self.kind() {
            TypeKind::Void | TypeKind::Primitive(_) | TypeKind::Class(_) => {
                self.without_annotations()
            }
            TypeKind::Parameterized(p) => Type::class(p.name.clone()),
            TypeKind::Array(_) => Type::array(self.element().erasure(), self.dimensions()),
            TypeKind::TypeVariable(tv) => tv
                .bounds
                .first()
                .map(Type::erasure)
                .unwrap_or_else(|| Type::class(well_known::OBJECT.clone())),
            TypeKind::Wildcard(WildcardBound::Extends(t)) => t.erasure(),
            TypeKind::TypeVariableReference(_)
            | TypeKind::UnresolvedTypeVariable(_)
            | TypeKind::Wildcard(_) => Type::class(well_known::OBJECT.clone()),
        }
    }

    /// JVM descriptor of the erasure, e.g. `[Ljava/lang/String;`.
    pub fn descriptor(&self) -> String {
        let mut out = String::new();
        self.erasure().write_descriptor(&mut out);
        out
    }

    fn write_descriptor(&self, out: &mut String) {
        match self.kind() {
            TypeKind::Void => out.push('V'),
            TypeKind::Primitive(p) => out.push(p.descriptor()),
            TypeKind::Array(_) => {
                for _ in 0..self.dimensions() {
                    out.push('[');
                }
                self.element().write_descriptor(out);
            }
            _ => {
                out.push('L');
                out.push_str(&self.name().to_string().replace('.', "/"));
                out.push(';');
            }
        }
    }

    /// Rebuilds the tree bottom-up. `f` is asked first for every node; a
    /// returned replacement is used as-is without descending into it.
    pub fn rewrite(&self, f: &mut dyn FnMut(&Type) -> Option<Type>) -> Type {
        if let Some(replaced) = f(self) {
            return replaced;
        }
        let kind = match self.kind() {
            TypeKind::Parameterized(p) => {
                let owner = match &p.owner {
                    Some(owner) => Some(owner.rewrite(f)),
                    None => None,
                };
                let mut arguments = Vec::with_capacity(p.arguments.len());
                for argument in &p.arguments {
                    arguments.push(argument.rewrite(f));
                }
                TypeKind::Parameterized(ParameterizedType {
                    name: p.name.clone(),
                    owner,
                    arguments,
                })
            }
            TypeKind::Array(a) => TypeKind::Array(ArrayType {
                component: a.component.rewrite(f),
                dimensions: a.dimensions,
            }),
            TypeKind::TypeVariable(tv) => {
                let mut bounds = Vec::with_capacity(tv.bounds.len());
                for bound in &tv.bounds {
                    bounds.push(bound.rewrite(f));
                }
                TypeKind::TypeVariable(TypeVariable {
                    identifier: tv.identifier.clone(),
                    bounds,
                    implicit_object_bound: tv.implicit_object_bound,
                })
            }
            TypeKind::Wildcard(bound) => TypeKind::Wildcard(match bound {
                WildcardBound::Unbounded => WildcardBound::Unbounded,
                WildcardBound::Extends(t) => WildcardBound::Extends(t.rewrite(f)),
                WildcardBound::Super(t) => WildcardBound::Super(t.rewrite(f)),
            }),
            _ => return self.clone(),
        };
        self.with_kind(kind)
    }

    /// Returns a copy of this type with `annotation` attached at the position
    /// addressed by `steps`.
    ///
    /// `enclosing` maps a class to its enclosing class when the class is a
    /// non-static inner class; `Nested` steps walk that chain outermost first.
    pub fn annotate_at(
        &self,
        steps: &[TypePathStep],
        annotation: AnnotationInstance,
        enclosing: &dyn Fn(&DotName) -> Option<DotName>,
    ) -> PathResult<Type> {
        match self.kind() {
            TypeKind::Class(_) | TypeKind::Parameterized(_) => {
                self.annotate_class_like(steps, annotation, enclosing)
            }
            TypeKind::Array(a) => match steps.split_first() {
                None => Ok(self.with_annotation(annotation)),
                Some((TypePathStep::Array, rest)) => {
                    let inner = if a.dimensions > 1 {
                        Type::array(a.component.clone(), a.dimensions - 1)
                    } else {
                        a.component.clone()
                    };
                    let inner = inner.annotate_at(rest, annotation, enclosing)?;
                    Ok(Type::array(inner, 1).with_annotations(self.annotations()))
                }
                Some((step, _)) => Err(self.mismatch(*step)),
            },
            TypeKind::Wildcard(bound) => match steps.split_first() {
                None => Ok(self.with_annotation(annotation)),
                Some((TypePathStep::WildcardBound, rest)) => {
                    let bound = match bound {
                        WildcardBound::Unbounded => WildcardBound::Extends(
                            Type::class(well_known::OBJECT.clone())
                                .annotate_at(rest, annotation, enclosing)?,
                        ),
                        WildcardBound::Extends(t) => {
                            WildcardBound::Extends(t.annotate_at(rest, annotation, enclosing)?)
                        }
                        WildcardBound::Super(t) => {
                            WildcardBound::Super(t.annotate_at(rest, annotation, enclosing)?)
                        }
                    };
                    Ok(self.with_kind(TypeKind::Wildcard(bound)))
                }
                Some((step, _)) => Err(self.mismatch(*step)),
            },
            _ => match steps.first() {
                None => Ok(self.with_annotation(annotation)),
                Some(step) => Err(self.mismatch(*step)),
            },
        }
    }

    fn annotate_class_like(
        &self,
        steps: &[TypePathStep],
        annotation: AnnotationInstance,
        enclosing: &dyn Fn(&DotName) -> Option<DotName>,
    ) -> PathResult<Type> {
        let this = self
            .expand_enclosing(enclosing, MAX_NESTING_DEPTH)
            .unwrap_or_else(|| self.clone());
        let nested = steps
            .iter()
            .take_while(|s| matches!(s, TypePathStep::Nested))
            .count();
        let depth = this.owner_depth();
        if nested > depth {
            return Err(TypePathError::NestingTooDeep(this.name()));
        }
        if nested < depth {
            let (Some(p), Some(owner)) = (this.as_parameterized(), this.owner()) else {
                return Err(TypePathError::NestingTooDeep(this.name()));
            };
            let owner = owner.annotate_class_like(steps, annotation, enclosing)?;
            return Ok(this.with_kind(TypeKind::Parameterized(ParameterizedType {
                name: p.name.clone(),
                owner: Some(owner),
                arguments: p.arguments.clone(),
            })));
        }
        match steps[nested..].split_first() {
            None => Ok(this.with_annotation(annotation)),
            Some((TypePathStep::TypeArgument(index), rest)) => {
                let Some(p) = this.as_parameterized() else {
                    return Err(this.mismatch(TypePathStep::TypeArgument(*index)));
                };
                let Some(argument) = p.arguments.get(usize::from(*index)) else {
                    return Err(TypePathError::ArgumentOutOfRange {
                        index: *index,
                        count: p.arguments.len(),
                        found: this.to_string(),
                    });
                };
                let argument = argument.annotate_at(rest, annotation, enclosing)?;
                let mut arguments = p.arguments.clone();
                arguments[usize::from(*index)] = argument;
                Ok(this.with_kind(TypeKind::Parameterized(ParameterizedType {
                    name: p.name.clone(),
                    owner: p.owner.clone(),
                    arguments,
                })))
            }
            Some((step, _)) => Err(this.mismatch(*step)),
        }
    }

    /// Materializes the owner chain of a non-static inner class type.
    fn expand_enclosing(
        &self,
        enclosing: &dyn Fn(&DotName) -> Option<DotName>,
        budget: u32,
    ) -> Option<Type> {
        if budget == 0 {
            return None;
        }
        match self.kind() {
            TypeKind::Parameterized(p) if p.owner.is_some() => {
                let owner = p.owner.as_ref()?.expand_enclosing(enclosing, budget - 1)?;
                Some(self.with_kind(TypeKind::Parameterized(ParameterizedType {
                    name: p.name.clone(),
                    owner: Some(owner),
                    arguments: p.arguments.clone(),
                })))
            }
            TypeKind::Class(name) | TypeKind::Parameterized(ParameterizedType { name, .. }) => {
                let outer = Type::class(enclosing(name)?);
                let outer = outer
                    .expand_enclosing(enclosing, budget - 1)
                    .unwrap_or(outer);
                Some(self.with_kind(TypeKind::Parameterized(ParameterizedType {
                    name: name.clone(),
                    owner: Some(outer),
                    arguments: self.arguments().to_vec(),
                })))
            }
            _ => None,
        }
    }

    fn mismatch(&self, step: TypePathStep) -> TypePathError {
        TypePathError::StepMismatch {
            step,
            found: self.to_string(),
        }
    }
}

fn write_annotations(f: &mut fmt::Formatter<'_>, annotations: &[AnnotationInstance]) -> fmt::Result {
    for annotation in annotations {
        write!(f, "@{} ", annotation.name())?;
    }
    Ok(())
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let TypeKind::Array(_) = self.kind() {
            write!(f, "{}", self.element())?;
            let mut node = self;
            while let TypeKind::Array(a) = node.kind() {
                for dim in 0..a.dimensions {
                    if dim == 0 && !node.annotations().is_empty() {
                        f.write_str(" ")?;
                        write_annotations(f, node.annotations())?;
                    }
                    f.write_str("[]")?;
                }
                node = &a.component;
            }
            return Ok(());
        }

        write_annotations(f, self.annotations())?;
        match self.kind() {
            TypeKind::Void => f.write_str("void"),
            TypeKind::Primitive(p) => f.write_str(p.name()),
            TypeKind::Class(name) => write!(f, "{}", name),
            TypeKind::Parameterized(p) => {
                match &p.owner {
                    Some(owner) => {
                        let full = p.name.to_string();
                        let local = full.rsplit('$').next().unwrap_or(&full);
                        write!(f, "{}.{}", owner, local)?;
                    }
                    None => write!(f, "{}", p.name)?,
                }
                if !p.arguments.is_empty() {
                    f.write_str("<")?;
                    for (i, argument) in p.arguments.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{}", argument)?;
                    }
                    f.write_str(">")?;
                }
                Ok(())
            }
            TypeKind::TypeVariable(tv) => f.write_str(&tv.identifier),
            TypeKind::TypeVariableReference(r) => f.write_str(&r.identifier),
            TypeKind::UnresolvedTypeVariable(identifier) => f.write_str(identifier),
            TypeKind::Wildcard(WildcardBound::Unbounded) => f.write_str("?"),
            TypeKind::Wildcard(WildcardBound::Extends(t)) => write!(f, "? extends {}", t),
            TypeKind::Wildcard(WildcardBound::Super(t)) => write!(f, "? super {}", t),
            TypeKind::Array(_) => Ok(()),
        }
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({})", self)
    }
}
