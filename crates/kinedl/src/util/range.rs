use crate::error::{KinedlError, KinedlResult};

/// Part of a resource addressed by `@mediaRange` or `Initialization@range`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteRange {
    pub offset: u64,
    /// `None` reads to the end of the resource.
    pub length: Option<u64>,
}

impl ByteRange {
    pub fn new(offset: u64, length: Option<u64>) -> Self {
        Self { offset, length }
    }

    /// Parse `first-last` or `first-`, both positions inclusive.
    pub fn parse(s: &str) -> KinedlResult<Self> {
        let invalid = || KinedlError::InvalidByteRange(s.to_string());
        let (first, last) = s.trim().split_once('-').ok_or_else(invalid)?;
        let offset: u64 = first.parse().map_err(|_| invalid())?;
        if last.is_empty() {
            return Ok(Self::new(offset, None));
        }

        let last: u64 = last.parse().map_err(|_| invalid())?;
        let length = last
            .checked_sub(offset)
            .map(|span| span + 1)
            .ok_or_else(invalid)?;
        Ok(Self::new(offset, Some(length)))
    }

    pub fn last_byte(&self) -> Option<u64> {
        self.length.map(|length| self.offset + length.saturating_sub(1))
    }

    /// Value of the `Range` request header.
    pub fn header_value(&self) -> String {
        match self.last_byte() {
            Some(last) => format!("bytes={}-{last}", self.offset),
            None => format!("bytes={}-", self.offset),
        }
    }
}
