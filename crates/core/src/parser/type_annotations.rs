use super::annotations::AnnotationDecoder;
use super::reader::{ByteReader, ParseResult};
use crate::error::{ClassFileError, Malformed};
use classdex_api::{AnnotationInstance, TypePath, TypePathStep};

pub(crate) const CLASS_TYPE_PARAMETER: u8 = 0x00;
pub(crate) const METHOD_TYPE_PARAMETER: u8 = 0x01;
pub(crate) const CLASS_EXTENDS: u8 = 0x10;
pub(crate) const CLASS_TYPE_PARAMETER_BOUND: u8 = 0x11;
pub(crate) const METHOD_TYPE_PARAMETER_BOUND: u8 = 0x12;
pub(crate) const FIELD: u8 = 0x13;
pub(crate) const METHOD_RETURN: u8 = 0x14;
pub(crate) const METHOD_RECEIVER: u8 = 0x15;
pub(crate) const METHOD_FORMAL_PARAMETER: u8 = 0x16;
pub(crate) const THROWS: u8 = 0x17;

/// The `target_info` union of a `type_annotation` structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TargetInfo {
    TypeParameter { index: u8 },
    Supertype { index: u16 },
    TypeParameterBound { parameter: u8, bound: u8 },
    /// Field, record component, return or receiver type, depending on the kind.
    Empty,
    FormalParameter { index: u8 },
    Throws { index: u16 },
    /// Local variables, casts, `new` and friends inside method bodies.
    Code,
}

#[derive(Debug, Clone)]
pub(crate) struct RawTypeAnnotation {
    pub kind: u8,
    pub info: TargetInfo,
    pub path: TypePath,
    pub annotation: AnnotationInstance,
    /// Where the structure starts, for error reporting.
    pub offset: usize,
}

impl RawTypeAnnotation {
    pub fn is_code_target(&self) -> bool {
        matches!(self.info, TargetInfo::Code)
    }
}

fn read_target_info(reader: &mut ByteReader<'_>, kind: u8) -> ParseResult<TargetInfo> {
    Ok(match kind {
        CLASS_TYPE_PARAMETER | METHOD_TYPE_PARAMETER => TargetInfo::TypeParameter {
            index: reader.read_u1()?,
        },
        CLASS_EXTENDS => TargetInfo::Supertype {
            index: reader.read_u2()?,
        },
        CLASS_TYPE_PARAMETER_BOUND | METHOD_TYPE_PARAMETER_BOUND => TargetInfo::TypeParameterBound {
            parameter: reader.read_u1()?,
            bound: reader.read_u1()?,
        },
        FIELD | METHOD_RETURN | METHOD_RECEIVER => TargetInfo::Empty,
        METHOD_FORMAL_PARAMETER => TargetInfo::FormalParameter {
            index: reader.read_u1()?,
        },
        THROWS => TargetInfo::Throws {
            index: reader.read_u2()?,
        },
        // localvar_target
        0x40 | 0x41 => {
            let table_length = reader.read_u2()?;
            reader.skip(usize::from(table_length) * 6)?;
            TargetInfo::Code
        }
        // catch_target, offset_target
        0x42..=0x46 => {
            reader.skip(2)?;
            TargetInfo::Code
        }
        // type_argument_target
        0x47..=0x4B => {
            reader.skip(3)?;
            TargetInfo::Code
        }
        other => {
            return Err(ClassFileError::malformed(
                reader.position().saturating_sub(1),
                Malformed::InvalidTypeAnnotationTarget(other),
            ));
        }
    })
}

fn read_type_path(reader: &mut ByteReader<'_>) -> ParseResult<TypePath> {
    let length = reader.read_u1()?;
    let mut steps = Vec::with_capacity(usize::from(length));
    for _ in 0..length {
        let kind_offset = reader.position();
        let kind = reader.read_u1()?;
        let argument = reader.read_u1()?;
        steps.push(match kind {
            0 => TypePathStep::Array,
            1 => TypePathStep::Nested,
            2 => TypePathStep::WildcardBound,
            3 => TypePathStep::TypeArgument(argument),
            other => {
                return Err(ClassFileError::malformed(
                    kind_offset,
                    Malformed::InvalidTypeAnnotationTarget(other),
                ));
            }
        });
    }
    Ok(TypePath(steps))
}

/// Decodes a `Runtime{Visible,Invisible}TypeAnnotations` body.
pub(crate) fn read_type_annotations<'a>(
    decoder: &mut AnnotationDecoder<'_, 'a, '_>,
    reader: &mut ByteReader<'a>,
    visible: bool,
) -> ParseResult<Vec<RawTypeAnnotation>> {
    let count = reader.read_u2()?;
    let mut result = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let offset = reader.position();
        let kind = reader.read_u1()?;
        let info = read_target_info(reader, kind)?;
        let path = read_type_path(reader)?;
        let annotation = decoder.read_annotation(reader, visible, 0)?;
        result.push(RawTypeAnnotation {
            kind,
            info,
            path,
            annotation,
            offset,
        });
    }
    Ok(result)
}
