//! Bounds-checked little-endian cursor over a byte slice.

use crate::error::{FormatError, FormatResult};
use crate::math::{Matrix3x4, Vec3};

/// Cursor used by every decoder. Reads never panic; running off the end
/// yields [`FormatError::Truncated`] tagged with the current region name.
#[derive(Debug, Clone)]
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
    region: &'static str,
}

impl<'a> ByteReader<'a> {
    pub(crate) const fn new(data: &'a [u8], region: &'static str) -> Self {
        Self { data, pos: 0, region }
    }

    /// Names the region subsequent errors are reported against.
    pub(crate) fn region(&mut self, region: &'static str) {
        self.region = region;
    }

    pub(crate) const fn position(&self) -> usize {
        self.pos
    }

    pub(crate) const fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub(crate) fn take(&mut self, len: usize) -> FormatResult<&'a [u8]> {
        let end = self.pos.checked_add(len).filter(|&end| end <= self.data.len());
        match end {
            Some(end) => {
                let slice = &self.data[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(FormatError::Truncated {
                what: self.region,
                offset: self.pos,
                needed: len,
                available: self.remaining(),
            }),
        }
    }

    pub(crate) fn skip(&mut self, len: usize) -> FormatResult<()> {
        self.take(len).map(|_| ())
    }

    pub(crate) fn read_array<const N: usize>(&mut self) -> FormatResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub(crate) fn read_u8(&mut self) -> FormatResult<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub(crate) fn read_u32(&mut self) -> FormatResult<u32> {
        self.read_array().map(u32::from_le_bytes)
    }

    pub(crate) fn read_i32(&mut self) -> FormatResult<i32> {
        self.read_array().map(i32::from_le_bytes)
    }

    pub(crate) fn read_f32(&mut self) -> FormatResult<f32> {
        self.read_array().map(f32::from_le_bytes)
    }

    pub(crate) fn read_vec3(&mut self) -> FormatResult<Vec3> {
        Ok(Vec3::new(self.read_f32()?, self.read_f32()?, self.read_f32()?))
    }

    pub(crate) fn read_matrix(&mut self) -> FormatResult<Matrix3x4> {
        let mut data = [[0.0f32; 4]; 3];
        for row in &mut data {
            for cell in row.iter_mut() {
                *cell = self.read_f32()?;
            }
        }
        Ok(Matrix3x4::from_rows(data))
    }
}

/// Reads `count` little-endian u32 values starting at `offset`, or `None`
/// when the table does not fit.
pub(crate) fn u32_table(data: &[u8], offset: usize, count: usize) -> Option<Vec<u32>> {
    let len = count.checked_mul(4)?;
    let end = offset.checked_add(len)?;
    let bytes = data.get(offset..end)?;
    Some(
        bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

/// Fixed 16-byte name field trimmed at the first NUL.
pub(crate) fn fixed_name(raw: &[u8; 16]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_little_endian() {
        let mut r = ByteReader::new(&[0x01, 0x02, 0x03, 0x04, 0xFF], "test");
        assert_eq!(r.read_u32().unwrap(), 0x0403_0201);
        assert_eq!(r.read_u8().unwrap(), 0xFF);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_truncation_reports_region() {
        let mut r = ByteReader::new(&[0u8; 3], "header");
        r.skip(1).unwrap();
        let err = r.read_u32().unwrap_err();
        assert_eq!(
            err,
            FormatError::Truncated { what: "header", offset: 1, needed: 4, available: 2 }
        );
        // failed reads do not advance
        assert_eq!(r.position(), 1);
    }

    #[test]
    fn test_u32_table_bounds() {
        let data = [1u8, 0, 0, 0, 2, 0, 0, 0];
        assert_eq!(u32_table(&data, 0, 2), Some(vec![1, 2]));
        assert_eq!(u32_table(&data, 4, 2), None);
        assert_eq!(u32_table(&data, usize::MAX, 1), None);
    }

    #[test]
    fn test_fixed_name() {
        let mut raw = [0u8; 16];
        raw[..4].copy_from_slice(b"body");
        assert_eq!(fixed_name(&raw), "body");
    }
}
