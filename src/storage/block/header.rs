//! Block header fields and layout.
//!
//! Every block starts with a fixed header of 64-bit little-endian fields,
//! followed by the content region:
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       8     NextBlockId   (successor id + 1, 0 = end of chain)
//! 8       8     ContentLength (valid content bytes in this block)
//! 16      8     DeletedFlag   (0 = live, 1 = deleted)
//! 24      8     checksum slot (only when checksums are enabled)
//! H       B-H   content
//! ```
//!
//! The header is sized to exactly the fields in use, so no field can spill
//! into the content region.

use crate::common::config::HEADER_FIELD_SIZE;
use crate::common::{BlockId, Config, Error, Result};

/// Value of `NextBlockId` for the last block of a chain.
///
/// Successors are stored as `id + 1`, so a zero-filled block always ends a
/// chain and block 0 can still be a chain member.
pub const NO_NEXT_BLOCK: i64 = 0;

/// Marks a checksum slot as sealed. The low 32 bits hold the CRC32.
const SEALED_BIT: u64 = 1 << 32;

/// The public header fields of a block.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderField {
    /// Encoded successor in the record chain.
    NextBlockId = 0,
    /// Number of valid content bytes in this block.
    ContentLength = 1,
    /// Set once the block's record is deleted; never cleared.
    DeletedFlag = 2,
}

impl HeaderField {
    /// All public fields, in layout order.
    pub const ALL: [HeaderField; 3] = [
        HeaderField::NextBlockId,
        HeaderField::ContentLength,
        HeaderField::DeletedFlag,
    ];

    /// Byte offset of this field within the block.
    #[inline]
    pub const fn offset(self) -> usize {
        self as usize * HEADER_FIELD_SIZE
    }
}

/// Encode an optional successor for the `NextBlockId` field.
///
/// # Errors
/// `Error::InvariantViolation` if `id + 1` does not fit the field.
pub fn encode_next(next: Option<BlockId>) -> Result<i64> {
    match next {
        Some(id) => id
            .0
            .checked_add(1)
            .and_then(|raw| i64::try_from(raw).ok())
            .ok_or_else(|| Error::invariant(format!("{id} cannot be stored as a next link"))),
        None => Ok(NO_NEXT_BLOCK),
    }
}

/// Decode a raw `NextBlockId` value.
///
/// Negative values cannot come from [`encode_next`]; they are handed back
/// as `Err(raw)` so the caller can report the corrupt link.
pub fn decode_next(raw: i64) -> std::result::Result<Option<BlockId>, i64> {
    match raw {
        NO_NEXT_BLOCK => Ok(None),
        n if n > 0 => Ok(Some(BlockId::new(n as u64 - 1))),
        n => Err(n),
    }
}

/// Size and layout of blocks in one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    block_size: usize,
    header_size: usize,
    checksums: bool,
}

impl BlockLayout {
    /// Derive the layout from a config.
    ///
    /// # Errors
    /// Returns `Error::InvalidConfig` if the config is rejected by
    /// [`Config::validate`].
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            block_size: config.block_size,
            header_size: config.header_size(),
            checksums: config.checksums,
        })
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    #[inline]
    pub fn header_size(&self) -> usize {
        self.header_size
    }

    /// Bytes available for payload in each block.
    #[inline]
    pub fn content_size(&self) -> usize {
        self.block_size - self.header_size
    }

    #[inline]
    pub fn checksums(&self) -> bool {
        self.checksums
    }

    /// Offset of the checksum slot, if this layout has one.
    #[inline]
    pub fn checksum_offset(&self) -> Option<usize> {
        self.checksums.then_some(HeaderField::ALL.len() * HEADER_FIELD_SIZE)
    }

    /// Compute the CRC32 of a block buffer.
    ///
    /// The checksum slot is hashed as zeros so the stored value doesn't
    /// include itself.
    pub fn compute_checksum(&self, buffer: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        match self.checksum_offset() {
            Some(offset) => {
                hasher.update(&buffer[..offset]);
                hasher.update(&[0u8; HEADER_FIELD_SIZE]);
                hasher.update(&buffer[offset + HEADER_FIELD_SIZE..]);
            }
            None => hasher.update(buffer),
        }
        hasher.finalize()
    }

    /// Store a fresh checksum in the buffer. No-op without checksums.
    pub fn seal(&self, buffer: &mut [u8]) {
        if let Some(offset) = self.checksum_offset() {
            let sealed = SEALED_BIT | u64::from(self.compute_checksum(buffer));
            buffer[offset..offset + HEADER_FIELD_SIZE].copy_from_slice(&sealed.to_le_bytes());
        }
    }

    /// Check a buffer's stored checksum.
    ///
    /// Every block written through a handle is sealed, so an unsealed slot
    /// is only accepted in an all-zero block (padding or a freshly grown
    /// block). Anything else was written under a different layout.
    pub fn verify(&self, buffer: &[u8]) -> bool {
        let Some(offset) = self.checksum_offset() else {
            return true;
        };
        let stored = read_u64(buffer, offset);
        if stored & SEALED_BIT == 0 {
            return buffer.iter().all(|&b| b == 0);
        }
        stored == SEALED_BIT | u64::from(self.compute_checksum(buffer))
    }
}

/// Read a little-endian `u64` at `offset`.
pub(crate) fn read_u64(buffer: &[u8], offset: usize) -> u64 {
    let mut raw = [0u8; HEADER_FIELD_SIZE];
    raw.copy_from_slice(&buffer[offset..offset + HEADER_FIELD_SIZE]);
    u64::from_le_bytes(raw)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(block_size: usize, checksums: bool) -> BlockLayout {
        let config = Config::builder()
            .block_size(block_size)
            .checksums(checksums)
            .build();
        BlockLayout::from_config(&config).unwrap()
    }

    // --- HeaderField tests ---

    #[test]
    fn test_field_offsets_do_not_overlap() {
        assert_eq!(HeaderField::NextBlockId.offset(), 0);
        assert_eq!(HeaderField::ContentLength.offset(), 8);
        assert_eq!(HeaderField::DeletedFlag.offset(), 16);

        let plain = layout(64, false);
        for field in HeaderField::ALL {
            assert!(field.offset() + HEADER_FIELD_SIZE <= plain.header_size());
        }
    }

    #[test]
    fn test_next_encoding() {
        assert_eq!(encode_next(None).unwrap(), NO_NEXT_BLOCK);
        assert_eq!(encode_next(Some(BlockId::new(0))).unwrap(), 1);
        assert_eq!(decode_next(1), Ok(Some(BlockId::new(0))));
        assert_eq!(decode_next(0), Ok(None));
        assert_eq!(decode_next(-5), Err(-5));

        for id in [0u64, 1, 7, 1 << 40] {
            let id = Some(BlockId::new(id));
            assert_eq!(decode_next(encode_next(id).unwrap()), Ok(id));
        }
    }

    #[test]
    fn test_next_encoding_rejects_oversized_ids() {
        let largest = BlockId::new(i64::MAX as u64 - 1);
        assert_eq!(encode_next(Some(largest)).unwrap(), i64::MAX);

        for id in [i64::MAX as u64, u64::MAX] {
            let err = encode_next(Some(BlockId::new(id))).unwrap_err();
            assert!(matches!(err, Error::InvariantViolation(_)));
        }
    }

    // --- BlockLayout tests ---

    #[test]
    fn test_layout_sizes() {
        let plain = layout(64, false);
        assert_eq!(plain.header_size(), 24);
        assert_eq!(plain.content_size(), 40);
        assert_eq!(plain.checksum_offset(), None);

        let sealed = layout(4096, true);
        assert_eq!(sealed.header_size(), 32);
        assert_eq!(sealed.content_size(), 4064);
        assert_eq!(sealed.checksum_offset(), Some(24));
    }

    // --- Checksum tests ---

    #[test]
    fn test_checksum_deterministic() {
        let layout = layout(128, true);
        let mut buffer = vec![0u8; 128];
        buffer[100] = 0xAB;

        assert_eq!(
            layout.compute_checksum(&buffer),
            layout.compute_checksum(&buffer)
        );
    }

    #[test]
    fn test_checksum_ignores_checksum_slot() {
        let layout = layout(128, true);
        let mut buffer = vec![0u8; 128];
        buffer[50] = 0x11;

        let before = layout.compute_checksum(&buffer);
        buffer[24..32].copy_from_slice(&[0xFF; 8]);
        assert_eq!(before, layout.compute_checksum(&buffer));
    }

    #[test]
    fn test_seal_and_verify() {
        let layout = layout(128, true);
        let mut buffer = vec![0u8; 128];

        // zeroed, never-written blocks pass
        assert!(layout.verify(&buffer));

        buffer[40] = 0x42;
        layout.seal(&mut buffer);
        assert!(layout.verify(&buffer));

        // corrupt the content
        buffer[40] = 0x43;
        assert!(!layout.verify(&buffer));
    }

    #[test]
    fn test_unsealed_data_is_rejected() {
        let layout = layout(128, true);

        // a 24-byte-header block: content starts where the slot would be
        let mut buffer = vec![0u8; 128];
        buffer[8] = 100;
        buffer[24..32].copy_from_slice(&[2, 2, 4, 4, 6, 6, 8, 8]);
        assert!(!layout.verify(&buffer));

        let mut header_only = vec![0u8; 128];
        header_only[16] = 1;
        assert!(!layout.verify(&header_only));
    }

    #[test]
    fn test_seal_without_checksums_is_noop() {
        let layout = layout(64, false);
        let mut buffer = vec![0u8; 64];
        buffer[30] = 9;
        let before = buffer.clone();

        layout.seal(&mut buffer);
        assert_eq!(before, buffer);
        assert!(layout.verify(&buffer));
    }
}
