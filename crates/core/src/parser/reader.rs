use crate::error::{ClassFileError, Malformed};

pub(crate) type ParseResult<T> = std::result::Result<T, ClassFileError>;

/// Big-endian cursor over a class file or one of its attribute bodies.
///
/// Positions reported in errors are absolute offsets in the class file,
/// also for readers created with [`ByteReader::sub_reader`].
#[derive(Debug, Clone)]
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            base: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.base + self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn error(&self, reason: Malformed) -> ClassFileError {
        ClassFileError::malformed(self.position(), reason)
    }

    fn ensure(&self, len: usize) -> ParseResult<()> {
        if len > self.remaining() {
            return Err(self.error(Malformed::UnexpectedEof));
        }
        Ok(())
    }

    pub fn read_u1(&mut self) -> ParseResult<u8> {
        self.ensure(1)?;
        let value = self.data[self.pos];
        self.pos += 1;
        Ok(value)
    }

    pub fn read_u2(&mut self) -> ParseResult<u16> {
        self.ensure(2)?;
        let value = u16::from_be_bytes([self.data[self.pos], self.data[self.pos + 1]]);
        self.pos += 2;
        Ok(value)
    }

    pub fn read_u4(&mut self) -> ParseResult<u32> {
        self.ensure(4)?;
        let value = u32::from_be_bytes([
            self.data[self.pos],
            self.data[self.pos + 1],
            self.data[self.pos + 2],
            self.data[self.pos + 3],
        ]);
        self.pos += 4;
        Ok(value)
    }

    pub fn read_u8(&mut self) -> ParseResult<u64> {
        let high = u64::from(self.read_u4()?);
        let low = u64::from(self.read_u4()?);
        Ok((high << 32) | low)
    }

    pub fn read_slice(&mut self, len: usize) -> ParseResult<&'a [u8]> {
        self.ensure(len)?;
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn skip(&mut self, len: usize) -> ParseResult<()> {
        self.ensure(len)?;
        self.pos += len;
        Ok(())
    }

    /// Splits off the next `len` bytes as their own reader and advances past them.
    pub fn sub_reader(&mut self, len: usize) -> ParseResult<ByteReader<'a>> {
        let base = self.position();
        let data = self.read_slice(len)?;
        Ok(ByteReader { data, pos: 0, base })
    }
}
