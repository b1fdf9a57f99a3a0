use crate::error::PioError;

/// Closed set of element types a decomposition or variable may carry.
///
/// Reference: spec.md Design Notes, "Polymorphism over element type" —
/// replaces the runtime `nc_type` dispatch in `pio_getput_int.c` with a
/// pattern match over this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ElemType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    Char,
    F32,
    F64,
}

impl ElemType {
    /// Byte width of one element, used for all byte-level copy paths.
    pub const fn size(self) -> usize {
        match self {
            ElemType::I8 | ElemType::U8 | ElemType::Char => 1,
            ElemType::I16 | ElemType::U16 => 2,
            ElemType::I32 | ElemType::U32 | ElemType::F32 => 4,
            ElemType::I64 | ElemType::U64 | ElemType::F64 => 8,
        }
    }

    /// Default fill value for this type, as raw little-endian bytes.
    ///
    /// Reference: `pio_darray.c` PIO_FILL_INT / PIO_FILL_FLOAT / PIO_FILL_DOUBLE / PIO_FILL_CHAR.
    pub fn default_fill_bytes(self) -> Vec<u8> {
        match self {
            ElemType::I32 => (-2_147_483_647i32).to_le_bytes().to_vec(),
            ElemType::I64 => (-2_147_483_647i64).to_le_bytes().to_vec(),
            ElemType::U32 => u32::MAX.to_le_bytes().to_vec(),
            ElemType::U64 => u64::MAX.to_le_bytes().to_vec(),
            ElemType::I16 => (-32767i16).to_le_bytes().to_vec(),
            ElemType::U16 => u16::MAX.to_le_bytes().to_vec(),
            ElemType::I8 => (-127i8).to_le_bytes().to_vec(),
            ElemType::U8 => u8::MAX.to_le_bytes().to_vec(),
            ElemType::Char => vec![0u8],
            ElemType::F32 => 9.969_209_968_386_869e36f32.to_le_bytes().to_vec(),
            ElemType::F64 => 9.969_209_968_386_869e36f64.to_le_bytes().to_vec(),
        }
    }

    /// Parse from a short tag string used by the decomposition file format
    /// and the example CLI driver.
    pub fn from_tag(tag: &str) -> Result<Self, PioError> {
        Ok(match tag {
            "i8" => ElemType::I8,
            "u8" => ElemType::U8,
            "i16" => ElemType::I16,
            "u16" => ElemType::U16,
            "i32" => ElemType::I32,
            "u32" => ElemType::U32,
            "i64" => ElemType::I64,
            "u64" => ElemType::U64,
            "char" => ElemType::Char,
            "f32" => ElemType::F32,
            "f64" => ElemType::F64,
            _ => return Err(PioError::BadType),
        })
    }

    pub fn tag(self) -> &'static str {
        match self {
            ElemType::I8 => "i8",
            ElemType::U8 => "u8",
            ElemType::I16 => "i16",
            ElemType::U16 => "u16",
            ElemType::I32 => "i32",
            ElemType::U32 => "u32",
            ElemType::I64 => "i64",
            ElemType::U64 => "u64",
            ElemType::Char => "char",
            ElemType::F32 => "f32",
            ElemType::F64 => "f64",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_matches_width() {
        assert_eq!(ElemType::I32.size(), 4);
        assert_eq!(ElemType::F64.size(), 8);
        assert_eq!(ElemType::Char.size(), 1);
    }

    #[test]
    fn tag_roundtrip() {
        for t in [
            ElemType::I8, ElemType::U8, ElemType::I16, ElemType::U16, ElemType::I32,
            ElemType::U32, ElemType::I64, ElemType::U64, ElemType::Char, ElemType::F32, ElemType::F64,
        ] {
            assert_eq!(ElemType::from_tag(t.tag()).unwrap(), t);
        }
    }

    #[test]
    fn unknown_tag_errors() {
        assert_eq!(ElemType::from_tag("bogus"), Err(PioError::BadType));
    }
}
