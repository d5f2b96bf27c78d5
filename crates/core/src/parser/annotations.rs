use super::constant_pool::ConstantPool;
use super::descriptor::{annotation_type_name, parse_return_descriptor};
use super::reader::{ByteReader, ParseResult};
use crate::error::{ClassFileError, Malformed};
use crate::model::NameTable;
use classdex_api::{AnnotationInstance, AnnotationValue};

/// Nesting limit for annotation values (arrays of nested annotations of ...).
const MAX_VALUE_DEPTH: u32 = 64;

/// Shared state for decoding annotation structures of one class file.
pub(crate) struct AnnotationDecoder<'p, 'a, 't> {
    pub pool: &'p mut ConstantPool<'a>,
    pub names: &'t NameTable,
}

impl<'p, 'a, 't> AnnotationDecoder<'p, 'a, 't> {
    pub fn new(pool: &'p mut ConstantPool<'a>, names: &'t NameTable) -> Self {
        Self { pool, names }
    }

    /// `u2 num_annotations` followed by the annotations.
    pub fn read_table(
        &mut self,
        reader: &mut ByteReader<'a>,
        visible: bool,
    ) -> ParseResult<Vec<AnnotationInstance>> {
        let count = reader.read_u2()?;
        let mut annotations = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            annotations.push(self.read_annotation(reader, visible, 0)?);
        }
        Ok(annotations)
    }

    /// `u1 num_parameters`, then one annotation table per parameter.
    pub fn read_parameter_tables(
        &mut self,
        reader: &mut ByteReader<'a>,
        visible: bool,
    ) -> ParseResult<Vec<Vec<AnnotationInstance>>> {
        let count = reader.read_u1()?;
        let mut tables = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            tables.push(self.read_table(reader, visible)?);
        }
        Ok(tables)
    }

    pub fn read_annotation(
        &mut self,
        reader: &mut ByteReader<'a>,
        visible: bool,
        depth: u32,
    ) -> ParseResult<AnnotationInstance> {
        let type_offset = reader.position();
        let type_index = reader.read_u2()?;
        let descriptor = self.pool.utf8(self.names, type_index)?;
        let name = annotation_type_name(&descriptor, self.names)
            .map_err(|reason| ClassFileError::malformed(type_offset, reason))?;

        let mut annotation = AnnotationInstance::new(name, visible);
        let pairs = reader.read_u2()?;
        for _ in 0..pairs {
            let element_index = reader.read_u2()?;
            let element = self.pool.utf8(self.names, element_index)?;
            let value = self.read_element_value(reader, visible, depth + 1)?;
            annotation = annotation.with_value(element, value);
        }
        Ok(annotation)
    }

    pub fn read_element_value(
        &mut self,
        reader: &mut ByteReader<'a>,
        visible: bool,
        depth: u32,
    ) -> ParseResult<AnnotationValue> {
        let tag_offset = reader.position();
        let tag = reader.read_u1()?;
        let invalid = || {
            ClassFileError::malformed(
                tag_offset,
                Malformed::InvalidAnnotationValue(char::from(tag)),
            )
        };
        if depth > MAX_VALUE_DEPTH {
            return Err(invalid());
        }

        let value = match tag {
            b'B' => AnnotationValue::Byte(self.pool.integer(reader.read_u2()?)? as i8),
            b'C' => AnnotationValue::Char(self.pool.integer(reader.read_u2()?)? as u16),
            b'S' => AnnotationValue::Short(self.pool.integer(reader.read_u2()?)? as i16),
            b'I' => AnnotationValue::Int(self.pool.integer(reader.read_u2()?)?),
            b'Z' => AnnotationValue::Boolean(self.pool.integer(reader.read_u2()?)? != 0),
            b'J' => AnnotationValue::Long(self.pool.long(reader.read_u2()?)?),
            b'F' => AnnotationValue::Float(self.pool.float(reader.read_u2()?)?),
            b'D' => AnnotationValue::Double(self.pool.double(reader.read_u2()?)?),
            b's' => AnnotationValue::String(self.pool.utf8(self.names, reader.read_u2()?)?),
            b'e' => {
                let type_offset = reader.position();
                let type_index = reader.read_u2()?;
                let constant_index = reader.read_u2()?;
                let descriptor = self.pool.utf8(self.names, type_index)?;
                let type_name = annotation_type_name(&descriptor, self.names).map_err(|reason| {
                    ClassFileError::malformed(type_offset, reason)
                })?;
                let constant = self.pool.utf8(self.names, constant_index)?;
                AnnotationValue::Enum {
                    type_name,
                    constant,
                }
            }
            b'c' => {
                let class_offset = reader.position();
                let descriptor = self.pool.utf8(self.names, reader.read_u2()?)?;
                let ty = parse_return_descriptor(&descriptor, self.names).map_err(|reason| {
                    ClassFileError::malformed(class_offset, reason)
                })?;
                AnnotationValue::Class(ty)
            }
            b'@' => AnnotationValue::Nested(Box::new(self.read_annotation(reader, visible, depth)?)),
            b'[' => {
                let count = reader.read_u2()?;
                let mut values = Vec::with_capacity(usize::from(count));
                for _ in 0..count {
                    values.push(self.read_element_value(reader, visible, depth + 1)?);
                }
                AnnotationValue::Array(values)
            }
            _ => return Err(invalid()),
        };
        Ok(value)
    }
}
