use std::fmt;

/// Smallest unsigned integer type able to hold a raster's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IndexWidth {
    U8,
    U16,
    U32,
}

impl IndexWidth {
    pub fn for_max(max: u32) -> Self {
        if max <= u8::MAX as u32 {
            Self::U8
        } else if max <= u16::MAX as u32 {
            Self::U16
        } else {
            Self::U32
        }
    }

    /// Size of one value in bytes.
    pub fn bytes(self) -> u8 {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }

    pub fn from_bytes(n: u8) -> Option<Self> {
        match n {
            1 => Some(Self::U8),
            2 => Some(Self::U16),
            4 => Some(Self::U32),
            _ => None,
        }
    }
}

impl fmt::Display for IndexWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::U8 => "uint8",
            Self::U16 => "uint16",
            Self::U32 => "uint32",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_smallest_width() {
        assert_eq!(IndexWidth::for_max(0), IndexWidth::U8);
        assert_eq!(IndexWidth::for_max(255), IndexWidth::U8);
        assert_eq!(IndexWidth::for_max(256), IndexWidth::U16);
        assert_eq!(IndexWidth::for_max(65_536), IndexWidth::U32);
        assert_eq!(IndexWidth::from_bytes(IndexWidth::U16.bytes()), Some(IndexWidth::U16));
        assert_eq!(IndexWidth::from_bytes(3), None);
    }
}
