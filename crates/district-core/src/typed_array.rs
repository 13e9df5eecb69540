//! Little-endian typed arrays decoded from static `.buf` files.

use thiserror::Error;

use crate::types::StaticFile;

/// A column of per-unit integers, stored at the width it was written with.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedArray {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
}

#[derive(Debug, Error)]
pub enum TypedArrayError {
    #[error("unsupported element width: {0} bytes")]
    UnsupportedWidth(u8),
    #[error("buffer of {len} bytes is not a multiple of the {width}-byte element width")]
    Misaligned { len: usize, width: u8 },
}

impl TypedArray {
    /// Decode a buffer using the element width and signedness from its metadata.
    pub fn decode(file: &StaticFile, bytes: &[u8]) -> Result<Self, TypedArrayError> {
        Self::from_le_bytes(bytes, file.bytes_per_element, file.is_unsigned())
    }

    pub fn from_le_bytes(
        bytes: &[u8],
        bytes_per_element: u8,
        unsigned: bool,
    ) -> Result<Self, TypedArrayError> {
        let width = bytes_per_element;
        if !matches!(width, 1 | 2 | 4) {
            return Err(TypedArrayError::UnsupportedWidth(width));
        }
        if bytes.len() % width as usize != 0 {
            return Err(TypedArrayError::Misaligned {
                len: bytes.len(),
                width,
            });
        }

        let array = match (width, unsigned) {
            (1, true) => TypedArray::U8(bytes.to_vec()),
            (1, false) => TypedArray::I8(bytes.iter().map(|b| *b as i8).collect()),
            (2, true) => TypedArray::U16(
                bytes
                    .chunks_exact(2)
                    .map(|c| u16::from_le_bytes([c[0], c[1]]))
                    .collect(),
            ),
            (2, false) => TypedArray::I16(
                bytes
                    .chunks_exact(2)
                    .map(|c| i16::from_le_bytes([c[0], c[1]]))
                    .collect(),
            ),
            (_, true) => TypedArray::U32(
                bytes
                    .chunks_exact(4)
                    .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
            (_, false) => TypedArray::I32(
                bytes
                    .chunks_exact(4)
                    .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
        };
        Ok(array)
    }

    pub fn len(&self) -> usize {
        match self {
            TypedArray::U8(v) => v.len(),
            TypedArray::U16(v) => v.len(),
            TypedArray::U32(v) => v.len(),
            TypedArray::I8(v) => v.len(),
            TypedArray::I16(v) => v.len(),
            TypedArray::I32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at `index`, or `None` past the end.
    pub fn get(&self, index: usize) -> Option<i64> {
        match self {
            TypedArray::U8(v) => v.get(index).map(|x| i64::from(*x)),
            TypedArray::U16(v) => v.get(index).map(|x| i64::from(*x)),
            TypedArray::U32(v) => v.get(index).map(|x| i64::from(*x)),
            TypedArray::I8(v) => v.get(index).map(|x| i64::from(*x)),
            TypedArray::I16(v) => v.get(index).map(|x| i64::from(*x)),
            TypedArray::I32(v) => v.get(index).map(|x| i64::from(*x)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }

    /// Resident size of the decoded values.
    pub fn byte_len(&self) -> usize {
        let width = match self {
            TypedArray::U8(_) | TypedArray::I8(_) => 1,
            TypedArray::U16(_) | TypedArray::I16(_) => 2,
            TypedArray::U32(_) | TypedArray::I32(_) => 4,
        };
        self.len() * width
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_u16_little_endian() {
        let arr = TypedArray::from_le_bytes(&[1, 0, 0, 1, 255, 255], 2, true).unwrap();
        assert_eq!(arr.len(), 3);
        assert_eq!(arr.get(0), Some(1));
        assert_eq!(arr.get(1), Some(256));
        assert_eq!(arr.get(2), Some(65535));
        assert_eq!(arr.get(3), None);
    }

    #[test]
    fn decodes_signed_values() {
        let arr = TypedArray::from_le_bytes(&[0xff, 0xff, 0xff, 0xff], 4, false).unwrap();
        assert_eq!(arr.get(0), Some(-1));
        let arr = TypedArray::from_le_bytes(&[0x80], 1, false).unwrap();
        assert_eq!(arr.get(0), Some(-128));
    }

    #[test]
    fn rejects_bad_widths() {
        assert!(matches!(
            TypedArray::from_le_bytes(&[0, 0, 0], 3, true),
            Err(TypedArrayError::UnsupportedWidth(3))
        ));
        assert!(matches!(
            TypedArray::from_le_bytes(&[0, 0, 0], 2, true),
            Err(TypedArrayError::Misaligned { len: 3, width: 2 })
        ));
    }

    #[test]
    fn iter_yields_all_values() {
        let arr = TypedArray::U8(vec![3, 1, 2]);
        assert_eq!(arr.iter().collect::<Vec<_>>(), vec![3, 1, 2]);
        assert_eq!(arr.byte_len(), 3);
    }
}
