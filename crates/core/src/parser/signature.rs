//! Generic signatures (`Signature` attribute) and type-variable resolution.
//!
//! Parsing leaves every type-variable use as an `UnresolvedTypeVariable`
//! placeholder. The resolve functions then bind placeholders against the
//! declared type-parameter lists, innermost scope first.

use crate::error::Malformed;
use crate::model::NameTable;
use classdex_api::{
    DotName, PrimitiveKind, Type, TypeKind, TypeVariable, VariableScope, WildcardBound,
    well_known,
};
use smol_str::SmolStr;

const MAX_DEPTH: u32 = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ClassSignature {
    pub type_parameters: Vec<Type>,
    pub superclass: Type,
    pub interfaces: Vec<Type>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MethodSignature {
    pub type_parameters: Vec<Type>,
    pub parameters: Vec<Type>,
    pub return_type: Type,
    pub throws: Vec<Type>,
}

struct SignatureParser<'a, 't> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    depth: u32,
    names: &'t NameTable,
}

impl<'a, 't> SignatureParser<'a, 't> {
    fn new(text: &'a str, names: &'t NameTable) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            pos: 0,
            depth: 0,
            names,
        }
    }

    fn invalid(&self) -> Malformed {
        Malformed::InvalidDescriptor(self.text.to_string())
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn expect(&mut self, byte: u8) -> Result<(), Malformed> {
        if self.peek() != Some(byte) {
            return Err(self.invalid());
        }
        self.pos += 1;
        Ok(())
    }

    fn at_end(&self) -> bool {
        self.pos == self.bytes.len()
    }

    fn finish(&self) -> Result<(), Malformed> {
        if !self.at_end() {
            return Err(self.invalid());
        }
        Ok(())
    }

    /// Reads a non-empty identifier up to (not including) any of `stops`.
    fn identifier(&mut self, stops: &[u8]) -> Result<&'a str, Malformed> {
        let start = self.pos;
        while self.peek().is_some_and(|b| !stops.contains(&b)) {
            self.pos += 1;
        }
        if self.pos == start || self.at_end() {
            return Err(self.invalid());
        }
        Ok(&self.text[start..self.pos])
    }

    fn enter(&mut self) -> Result<(), Malformed> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.invalid());
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn type_parameters(&mut self) -> Result<Vec<Type>, Malformed> {
        if self.peek() != Some(b'<') {
            return Ok(Vec::new());
        }
        self.pos += 1;
        let mut parameters = Vec::new();
        while self.peek().is_some_and(|b| b != b'>') {
            parameters.push(self.type_parameter()?);
        }
        self.expect(b'>')?;
        if parameters.is_empty() {
            return Err(self.invalid());
        }
        Ok(parameters)
    }

    fn type_parameter(&mut self) -> Result<Type, Malformed> {
        let raw = self.identifier(b":>;<")?;
        let identifier = self.names.intern_str(raw);
        self.expect(b':')?;
        let mut bounds = Vec::new();
        let mut implicit_object_bound = false;
        match self.peek() {
            Some(b'L' | b'T' | b'[') => bounds.push(self.reference_type()?),
            Some(b':') => implicit_object_bound = true,
            _ => {}
        }
        while self.peek() == Some(b':') {
            self.pos += 1;
            bounds.push(self.reference_type()?);
        }
        if bounds.is_empty() {
            implicit_object_bound = false;
            bounds.push(Type::class(well_known::OBJECT.clone()));
        }
        Ok(Type::type_variable(identifier, bounds, implicit_object_bound))
    }

    fn java_type(&mut self) -> Result<Type, Malformed> {
        let tag = self.peek().ok_or_else(|| self.invalid())?;
        if let Some(primitive) = PrimitiveKind::from_descriptor(tag) {
            self.pos += 1;
            return Ok(Type::primitive(primitive));
        }
        self.reference_type()
    }

    fn reference_type(&mut self) -> Result<Type, Malformed> {
        self.enter()?;
        let result = match self.peek() {
            Some(b'L') => self.class_type(),
            Some(b'T') => self.type_variable(),
            Some(b'[') => {
                let mut dimensions = 0u32;
                while self.peek() == Some(b'[') {
                    dimensions += 1;
                    self.pos += 1;
                }
                if dimensions > 255 {
                    Err(self.invalid())
                } else {
                    self.java_type().map(|element| Type::array(element, dimensions))
                }
            }
            _ => Err(self.invalid()),
        };
        self.leave();
        result
    }

    fn type_variable(&mut self) -> Result<Type, Malformed> {
        self.expect(b'T')?;
        let raw = self.identifier(b";<>.:/[")?;
        let identifier = self.names.intern_str(raw);
        self.expect(b';')?;
        Ok(Type::unresolved_type_variable(identifier))
    }

    fn class_type(&mut self) -> Result<Type, Malformed> {
        self.expect(b'L')?;
        let outer = self.identifier(b"<.;")?;
        let mut name = self.names.intern_internal_name(outer);
        let mut current = self.with_arguments(name.clone(), None)?;

        while self.peek() == Some(b'.') {
            self.pos += 1;
            let local = self.identifier(b"<.;/")?;
            name = self.names.intern_component(Some(&name), local, true);
            // A plain outer class adds nothing over the inner class's own name.
            let owner = if matches!(current.kind(), TypeKind::Class(_)) {
                None
            } else {
                Some(current)
            };
            current = self.with_arguments(name.clone(), owner)?;
        }
        self.expect(b';')?;
        Ok(current)
    }

    fn with_arguments(&mut self, name: DotName, owner: Option<Type>) -> Result<Type, Malformed> {
        if self.peek() == Some(b'<') {
            let arguments = self.type_arguments()?;
            return Ok(Type::parameterized(name, owner, arguments));
        }
        Ok(match owner {
            Some(owner) => Type::parameterized(name, Some(owner), Vec::new()),
            None => Type::class(name),
        })
    }

    fn type_arguments(&mut self) -> Result<Vec<Type>, Malformed> {
        self.expect(b'<')?;
        let mut arguments = Vec::new();
        while self.peek().is_some_and(|b| b != b'>') {
            let argument = match self.peek() {
                Some(b'*') => {
                    self.pos += 1;
                    Type::wildcard(WildcardBound::Unbounded)
                }
                Some(b'+') => {
                    self.pos += 1;
                    Type::wildcard(WildcardBound::Extends(self.reference_type()?))
                }
                Some(b'-') => {
                    self.pos += 1;
                    Type::wildcard(WildcardBound::Super(self.reference_type()?))
                }
                _ => self.reference_type()?,
            };
            arguments.push(argument);
        }
        self.expect(b'>')?;
        if arguments.is_empty() {
            return Err(self.invalid());
        }
        Ok(arguments)
    }
}

pub(crate) fn parse_class_signature(text: &str, names: &NameTable) -> Result<ClassSignature, Malformed> {
    let mut parser = SignatureParser::new(text, names);
    let type_parameters = parser.type_parameters()?;
    let superclass = parser.class_type()?;
    let mut interfaces = Vec::new();
    while !parser.at_end() {
        interfaces.push(parser.class_type()?);
    }
    Ok(ClassSignature {
        type_parameters,
        superclass,
        interfaces,
    })
}

pub(crate) fn parse_method_signature(text: &str, names: &NameTable) -> Result<MethodSignature, Malformed> {
    let mut parser = SignatureParser::new(text, names);
    let type_parameters = parser.type_parameters()?;
    parser.expect(b'(')?;
    let mut parameters = Vec::new();
    while parser.peek().is_some_and(|b| b != b')') {
        parameters.push(parser.java_type()?);
    }
    parser.expect(b')')?;
    let return_type = if parser.peek() == Some(b'V') {
        parser.pos += 1;
        Type::void()
    } else {
        parser.java_type()?
    };
    let mut throws = Vec::new();
    while parser.peek() == Some(b'^') {
        parser.pos += 1;
        throws.push(match parser.peek() {
            Some(b'T') => parser.type_variable()?,
            _ => parser.class_type()?,
        });
    }
    parser.finish()?;
    Ok(MethodSignature {
        type_parameters,
        parameters,
        return_type,
        throws,
    })
}

/// Field and record component signatures.
pub(crate) fn parse_field_signature(text: &str, names: &NameTable) -> Result<Type, Malformed> {
    let mut parser = SignatureParser::new(text, names);
    let ty = parser.reference_type()?;
    parser.finish()?;
    Ok(ty)
}

fn declaration<'s>(identifier: &str, scopes: &[&'s [Type]]) -> Option<&'s Type> {
    scopes.iter().find_map(|scope| {
        scope.iter().find(|p| {
            p.as_type_variable()
                .is_some_and(|tv| tv.identifier == identifier)
        })
    })
}

fn identifier_of(parameter: &Type) -> SmolStr {
    parameter
        .as_type_variable()
        .map(|tv| tv.identifier.clone())
        .unwrap_or_default()
}

/// Binds the placeholders inside a freshly parsed type-parameter list.
///
/// A reference to an earlier parameter becomes a copy of it, a self or
/// forward reference becomes a `TypeVariableReference`, and anything else is
/// looked up in `outer` (copied) or left unresolved.
pub(crate) fn resolve_type_parameters(
    raw: &[Type],
    scope: VariableScope,
    outer: &[&[Type]],
) -> Vec<Type> {
    let identifiers: Vec<SmolStr> = raw.iter().map(identifier_of).collect();
    let mut resolved: Vec<Type> = Vec::with_capacity(raw.len());
    for (i, parameter) in raw.iter().enumerate() {
        let bound = parameter.rewrite(&mut |t: &Type| {
            let TypeKind::UnresolvedTypeVariable(identifier) = t.kind() else {
                return None;
            };
            match identifiers.iter().position(|x| x == identifier) {
                Some(j) if j < i => Some(resolved[j].clone()),
                Some(j) => Some(Type::type_variable_reference(
                    identifier.clone(),
                    j as u16,
                    scope,
                )),
                None => declaration(identifier, outer).cloned(),
            }
        });
        resolved.push(bound);
    }
    resolved
}

/// Binds the placeholders of a type used in a declaration against the
/// visible type parameters, innermost scope first.
pub(crate) fn resolve_use(ty: &Type, scopes: &[&[Type]]) -> Type {
    ty.rewrite(&mut |t: &Type| match t.kind() {
        TypeKind::UnresolvedTypeVariable(identifier) => declaration(identifier, scopes).cloned(),
        _ => None,
    })
}

fn refresh_with(ty: &Type, scopes: &[&[Type]]) -> Type {
    ty.rewrite(&mut |t: &Type| match t.kind() {
        TypeKind::TypeVariable(tv) => declaration(&tv.identifier, scopes)
            .map(|decl| decl.without_annotations().with_annotations(t.annotations())),
        _ => None,
    })
}

/// Re-copies declarations into a type-parameter list after type annotations
/// were attached, so copies of earlier parameters show annotated bounds.
pub(crate) fn refresh_type_parameters(parameters: &[Type], outer: &[&[Type]]) -> Vec<Type> {
    let mut refreshed: Vec<Type> = Vec::with_capacity(parameters.len());
    for parameter in parameters {
        let Some(tv) = parameter.as_type_variable() else {
            refreshed.push(parameter.clone());
            continue;
        };
        let mut scopes: Vec<&[Type]> = Vec::with_capacity(outer.len() + 1);
        scopes.push(&refreshed);
        scopes.extend_from_slice(outer);
        let bounds = tv.bounds.iter().map(|b| refresh_with(b, &scopes)).collect();
        let updated = parameter.with_kind(TypeKind::TypeVariable(TypeVariable {
            identifier: tv.identifier.clone(),
            bounds,
            implicit_object_bound: tv.implicit_object_bound,
        }));
        refreshed.push(updated);
    }
    refreshed
}

/// Re-copies type-variable declarations into a use site, keeping the
/// annotations placed on the use itself.
pub(crate) fn refresh_use(ty: &Type, scopes: &[&[Type]]) -> Type {
    refresh_with(ty, scopes)
}
