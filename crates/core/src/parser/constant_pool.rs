use super::reader::{ByteReader, ParseResult};
use crate::error::{ClassFileError, Malformed};
use crate::model::NameTable;
use classdex_api::DotName;
use smol_str::SmolStr;
use std::collections::HashMap;

pub(crate) const TAG_UTF8: u8 = 1;
pub(crate) const TAG_INTEGER: u8 = 3;
pub(crate) const TAG_FLOAT: u8 = 4;
pub(crate) const TAG_LONG: u8 = 5;
pub(crate) const TAG_DOUBLE: u8 = 6;
pub(crate) const TAG_CLASS: u8 = 7;
pub(crate) const TAG_STRING: u8 = 8;
pub(crate) const TAG_FIELD_REF: u8 = 9;
pub(crate) const TAG_METHOD_REF: u8 = 10;
pub(crate) const TAG_INTERFACE_METHOD_REF: u8 = 11;
pub(crate) const TAG_NAME_AND_TYPE: u8 = 12;
pub(crate) const TAG_METHOD_HANDLE: u8 = 15;
pub(crate) const TAG_METHOD_TYPE: u8 = 16;
pub(crate) const TAG_DYNAMIC: u8 = 17;
pub(crate) const TAG_INVOKE_DYNAMIC: u8 = 18;
pub(crate) const TAG_MODULE: u8 = 19;
pub(crate) const TAG_PACKAGE: u8 = 20;

#[derive(Debug, Clone, Copy)]
struct Entry {
    tag: u8,
    /// Absolute offset of the payload, just past the tag byte.
    offset: usize,
}

/// The constant pool of one class file.
///
/// Parsing only records where each entry starts. Entries are decoded when
/// first asked for and memoized per index.
pub(crate) struct ConstantPool<'a> {
    data: &'a [u8],
    entries: Vec<Option<Entry>>,
    utf8_cache: HashMap<u16, SmolStr>,
    class_cache: HashMap<u16, DotName>,
}

impl<'a> ConstantPool<'a> {
    /// Indexes the pool; `reader` must sit on `constant_pool_count` of the
    /// class file whose full bytes are `data`.
    pub fn parse(data: &'a [u8], reader: &mut ByteReader<'a>) -> ParseResult<Self> {
        let count = usize::from(reader.read_u2()?);
        let mut entries = Vec::with_capacity(count.max(1));
        // index 0 is unusable
        entries.push(None);

        while entries.len() < count {
            let tag_offset = reader.position();
            let tag = reader.read_u1()?;
            let offset = reader.position();
            match tag {
                TAG_UTF8 => {
                    let length = usize::from(reader.read_u2()?);
                    reader.skip(length)?;
                }
                TAG_INTEGER | TAG_FLOAT => reader.skip(4)?,
                TAG_LONG | TAG_DOUBLE => reader.skip(8)?,
                TAG_CLASS | TAG_STRING | TAG_METHOD_TYPE | TAG_MODULE | TAG_PACKAGE => {
                    reader.skip(2)?
                }
                TAG_FIELD_REF
                | TAG_METHOD_REF
                | TAG_INTERFACE_METHOD_REF
                | TAG_NAME_AND_TYPE
                | TAG_DYNAMIC
                | TAG_INVOKE_DYNAMIC => reader.skip(4)?,
                TAG_METHOD_HANDLE => reader.skip(3)?,
                other => {
                    return Err(ClassFileError::malformed(
                        tag_offset,
                        Malformed::UnknownConstantTag(other),
                    ));
                }
            }
            entries.push(Some(Entry { tag, offset }));
            if tag == TAG_LONG || tag == TAG_DOUBLE {
                // 8-byte constants take two slots
                entries.push(None);
            }
        }

        Ok(Self {
            data,
            entries,
            utf8_cache: HashMap::new(),
            class_cache: HashMap::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn entry(&self, index: u16, tag: u8, expected: &'static str) -> ParseResult<Entry> {
        let entry = self
            .entries
            .get(usize::from(index))
            .copied()
            .flatten()
            .ok_or_else(|| self.invalid_index(index))?;
        if entry.tag != tag {
            return Err(ClassFileError::malformed(
                entry.offset.saturating_sub(1),
                Malformed::UnexpectedConstant { index, expected },
            ));
        }
        Ok(entry)
    }

    fn invalid_index(&self, index: u16) -> ClassFileError {
        // offset 8 is where the pool starts
        ClassFileError::malformed(8, Malformed::InvalidConstantIndex(index))
    }

    fn reader_at(&self, offset: usize) -> ByteReader<'a> {
        let mut reader = ByteReader::new(self.data);
        // Offsets were validated while indexing.
        let _ = reader.skip(offset);
        reader
    }

    fn u2_at(&self, offset: usize) -> ParseResult<u16> {
        self.reader_at(offset).read_u2()
    }

    fn u4_at(&self, offset: usize) -> ParseResult<u32> {
        self.reader_at(offset).read_u4()
    }

    pub fn tag(&self, index: u16) -> Option<u8> {
        self.entries
            .get(usize::from(index))
            .copied()
            .flatten()
            .map(|e| e.tag)
    }

    pub fn utf8(&mut self, names: &NameTable, index: u16) -> ParseResult<SmolStr> {
        if let Some(cached) = self.utf8_cache.get(&index) {
            return Ok(cached.clone());
        }
        let entry = self.entry(index, TAG_UTF8, "Utf8")?;
        let mut reader = self.reader_at(entry.offset);
        let length = usize::from(reader.read_u2()?);
        let bytes = reader.read_slice(length)?;
        let value = names.intern_utf8(bytes, decode_modified_utf8).ok_or_else(|| {
            ClassFileError::malformed(entry.offset, Malformed::InvalidUtf8(index))
        })?;
        self.utf8_cache.insert(index, value.clone());
        Ok(value)
    }

    /// Like [`ConstantPool::utf8`], with 0 meaning absent.
    pub fn optional_utf8(&mut self, names: &NameTable, index: u16) -> ParseResult<Option<SmolStr>> {
        if index == 0 {
            return Ok(None);
        }
        self.utf8(names, index).map(Some)
    }

    /// The binary name of a `CONSTANT_Class`, raw (`java/lang/String`, `[I`).
    pub fn class_internal_name(&mut self, names: &NameTable, index: u16) -> ParseResult<SmolStr> {
        let entry = self.entry(index, TAG_CLASS, "Class")?;
        let name_index = self.u2_at(entry.offset)?;
        self.utf8(names, name_index)
    }

    pub fn class_name(&mut self, names: &NameTable, index: u16) -> ParseResult<DotName> {
        if let Some(cached) = self.class_cache.get(&index) {
            return Ok(cached.clone());
        }
        let internal = self.class_internal_name(names, index)?;
        let name = if internal.starts_with('[') {
            DotName::simple(internal.replace('/', "."))
        } else {
            names.intern_internal_name(&internal)
        };
        self.class_cache.insert(index, name.clone());
        Ok(name)
    }

    pub fn optional_class_name(&mut self, names: &NameTable, index: u16) -> ParseResult<Option<DotName>> {
        if index == 0 {
            return Ok(None);
        }
        self.class_name(names, index).map(Some)
    }

    pub fn module_name(&mut self, names: &NameTable, index: u16) -> ParseResult<DotName> {
        let entry = self.entry(index, TAG_MODULE, "Module")?;
        let name_index = self.u2_at(entry.offset)?;
        let raw = self.utf8(names, name_index)?;
        Ok(names.intern_name(&raw))
    }

    pub fn package_name(&mut self, names: &NameTable, index: u16) -> ParseResult<DotName> {
        let entry = self.entry(index, TAG_PACKAGE, "Package")?;
        let name_index = self.u2_at(entry.offset)?;
        let raw = self.utf8(names, name_index)?;
        Ok(names.intern_internal_name(&raw))
    }

    pub fn name_and_type(&mut self, names: &NameTable, index: u16) -> ParseResult<(SmolStr, SmolStr)> {
        let entry = self.entry(index, TAG_NAME_AND_TYPE, "NameAndType")?;
        let name_index = self.u2_at(entry.offset)?;
        let descriptor_index = self.u2_at(entry.offset + 2)?;
        Ok((
            self.utf8(names, name_index)?,
            self.utf8(names, descriptor_index)?,
        ))
    }

    pub fn integer(&self, index: u16) -> ParseResult<i32> {
        let entry = self.entry(index, TAG_INTEGER, "Integer")?;
        Ok(self.u4_at(entry.offset)? as i32)
    }

    pub fn float(&self, index: u16) -> ParseResult<f32> {
        let entry = self.entry(index, TAG_FLOAT, "Float")?;
        Ok(f32::from_bits(self.u4_at(entry.offset)?))
    }

    pub fn long(&self, index: u16) -> ParseResult<i64> {
        let entry = self.entry(index, TAG_LONG, "Long")?;
        Ok(self.reader_at(entry.offset).read_u8()? as i64)
    }

    pub fn double(&self, index: u16) -> ParseResult<f64> {
        let entry = self.entry(index, TAG_DOUBLE, "Double")?;
        Ok(f64::from_bits(self.reader_at(entry.offset).read_u8()?))
    }

    /// Every class named by a `CONSTANT_Class` entry. Array classes are
    /// reduced to their element class; primitive arrays are skipped.
    pub fn referenced_classes(&mut self, names: &NameTable) -> ParseResult<Vec<DotName>> {
        let mut result = Vec::new();
        for index in 1..self.entries.len() {
            let index = index as u16;
            if self.tag(index) != Some(TAG_CLASS) {
                continue;
            }
            let internal = self.class_internal_name(names, index)?;
            let element = internal.trim_start_matches('[');
            if element.len() == internal.len() {
                result.push(self.class_name(names, index)?);
            } else if let Some(object) = element.strip_prefix('L').and_then(|e| e.strip_suffix(';')) {
                result.push(names.intern_internal_name(object));
            }
        }
        Ok(result)
    }
}

/// Decodes the JVM's modified UTF-8: NUL is `C0 80` and supplementary
/// characters are surrogate pairs of 3-byte sequences. Unpaired surrogates
/// become U+FFFD.
pub(crate) fn decode_modified_utf8(bytes: &[u8]) -> Option<String> {
    if bytes.iter().all(|b| *b != 0 && *b < 0x80) {
        return std::str::from_utf8(bytes).ok().map(str::to_owned);
    }

    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b & 0x80 == 0 {
            units.push(u16::from(b));
            i += 1;
        } else if b & 0xE0 == 0xC0 {
            let b2 = *bytes.get(i + 1)?;
            if b2 & 0xC0 != 0x80 {
                return None;
            }
            units.push((u16::from(b & 0x1F) << 6) | u16::from(b2 & 0x3F));
            i += 2;
        } else if b & 0xF0 == 0xE0 {
            let b2 = *bytes.get(i + 1)?;
            let b3 = *bytes.get(i + 2)?;
            if b2 & 0xC0 != 0x80 || b3 & 0xC0 != 0x80 {
                return None;
            }
            units.push(
                (u16::from(b & 0x0F) << 12) | (u16::from(b2 & 0x3F) << 6) | u16::from(b3 & 0x3F),
            );
            i += 3;
        } else {
            return None;
        }
    }
    Some(String::from_utf16_lossy(&units))
}
