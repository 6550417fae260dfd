//! Big-endian, length-prefixed primitives shared by the side-car codecs.

use crate::{VfsError, VfsResult};

/// Accumulates one side-car record in memory.
#[derive(Debug, Default)]
pub(crate) struct RecordWriter {
    buf: Vec<u8>,
}

impl RecordWriter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn put_str(&mut self, value: &str) -> VfsResult<()> {
        let len = u32::try_from(value.len())
            .map_err(|_| VfsError::server("Side-car string exceeds 4 GiB"))?;
        self.buf.extend_from_slice(&len.to_be_bytes());
        self.buf.extend_from_slice(value.as_bytes());
        Ok(())
    }

    pub(crate) fn put_count(&mut self, count: usize) -> VfsResult<()> {
        let count =
            i32::try_from(count).map_err(|_| VfsError::server("Side-car count overflows i32"))?;
        self.buf.extend_from_slice(&count.to_be_bytes());
        Ok(())
    }

    pub(crate) fn put_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over one side-car record.
#[derive(Debug)]
pub(crate) struct RecordReader<'a> {
    data: &'a [u8],
}

impl<'a> RecordReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn take<const N: usize>(&mut self) -> VfsResult<[u8; N]> {
        let (head, rest) = self.data.split_first_chunk::<N>().ok_or_else(truncated)?;
        self.data = rest;
        Ok(*head)
    }

    pub(crate) fn str(&mut self) -> VfsResult<String> {
        let len = usize::try_from(u32::from_be_bytes(self.take::<4>()?)).map_err(|_| truncated())?;
        if len > self.data.len() {
            return Err(truncated());
        }
        let (bytes, rest) = self.data.split_at(len);
        self.data = rest;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| VfsError::server_with("Corrupt side-car record", e))
    }

    pub(crate) fn count(&mut self) -> VfsResult<usize> {
        let raw = i32::from_be_bytes(self.take::<4>()?);
        usize::try_from(raw).map_err(|_| VfsError::server("Corrupt side-car record: negative count"))
    }

    pub(crate) fn i64(&mut self) -> VfsResult<i64> {
        Ok(i64::from_be_bytes(self.take::<8>()?))
    }
}

fn truncated() -> VfsError {
    VfsError::server("Corrupt side-car record: unexpected end of data")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_is_big_endian() {
        let mut w = RecordWriter::new();
        w.put_str("ab").unwrap();
        w.put_count(3).unwrap();
        w.put_i64(-1);
        let bytes = w.finish();
        assert_eq!(&bytes[..6], &[0, 0, 0, 2, b'a', b'b']);
        assert_eq!(&bytes[6..10], &[0, 0, 0, 3]);
        assert_eq!(&bytes[10..], &[0xff; 8]);
    }

    #[test]
    fn test_truncated_string_rejected() {
        let data = [0, 0, 0, 9, b'x'];
        let mut r = RecordReader::new(&data);
        assert!(matches!(r.str(), Err(VfsError::Server { .. })));
    }

    #[test]
    fn test_negative_count_rejected() {
        let data = (-2_i32).to_be_bytes();
        let mut r = RecordReader::new(&data);
        assert!(r.count().is_err());
    }
}
