use crate::error::Malformed;
use crate::model::NameTable;
use classdex_api::{DotName, PrimitiveKind, Type};

/// Recursive-descent reader for field and method descriptors.
struct DescriptorParser<'a, 't> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    names: &'t NameTable,
}

impl<'a, 't> DescriptorParser<'a, 't> {
    fn new(text: &'a str, names: &'t NameTable) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            pos: 0,
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

    fn parse_type(&mut self, allow_void: bool) -> Result<Type, Malformed> {
        let tag = self.peek().ok_or_else(|| self.invalid())?;
        if let Some(primitive) = PrimitiveKind::from_descriptor(tag) {
            self.pos += 1;
            return Ok(Type::primitive(primitive));
        }
        match tag {
            b'V' if allow_void => {
                self.pos += 1;
                Ok(Type::void())
            }
            b'L' => {
                self.pos += 1;
                let start = self.pos;
                while self.peek().is_some_and(|b| b != b';') {
                    self.pos += 1;
                }
                if self.pos == start || self.peek().is_none() {
                    return Err(self.invalid());
                }
                let name = &self.text[start..self.pos];
                self.pos += 1;
                Ok(Type::class(self.names.intern_internal_name(name)))
            }
            b'[' => {
                let mut dimensions = 0u32;
                while self.peek() == Some(b'[') {
                    dimensions += 1;
                    self.pos += 1;
                }
                if dimensions > 255 {
                    return Err(self.invalid());
                }
                let element = self.parse_type(false)?;
                Ok(Type::array(element, dimensions))
            }
            _ => Err(self.invalid()),
        }
    }

    fn finish(&self) -> Result<(), Malformed> {
        if self.pos != self.bytes.len() {
            return Err(self.invalid());
        }
        Ok(())
    }
}

pub(crate) fn parse_field_descriptor(text: &str, names: &NameTable) -> Result<Type, Malformed> {
    let mut parser = DescriptorParser::new(text, names);
    let ty = parser.parse_type(false)?;
    parser.finish()?;
    Ok(ty)
}

/// A descriptor as found in `c` element values and annotation type indices:
/// a field descriptor, or `V`.
pub(crate) fn parse_return_descriptor(text: &str, names: &NameTable) -> Result<Type, Malformed> {
    let mut parser = DescriptorParser::new(text, names);
    let ty = parser.parse_type(true)?;
    parser.finish()?;
    Ok(ty)
}

pub(crate) fn parse_method_descriptor(
    text: &str,
    names: &NameTable,
) -> Result<(Vec<Type>, Type), Malformed> {
    let mut parser = DescriptorParser::new(text, names);
    parser.expect(b'(')?;
    let mut parameters = Vec::new();
    while parser.peek().is_some_and(|b| b != b')') {
        parameters.push(parser.parse_type(false)?);
    }
    parser.expect(b')')?;
    let return_type = parser.parse_type(true)?;
    parser.finish()?;
    Ok((parameters, return_type))
}

/// The class named by an annotation's `Lpkg/Name;` type descriptor.
pub(crate) fn annotation_type_name(text: &str, names: &NameTable) -> Result<DotName, Malformed> {
    match parse_field_descriptor(text, names)?.kind() {
        classdex_api::TypeKind::Class(name) => Ok(name.clone()),
        _ => Err(Malformed::InvalidDescriptor(text.to_string())),
    }
}
