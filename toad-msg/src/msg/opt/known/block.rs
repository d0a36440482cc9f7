/// Three items of information may need to be transferred in a
/// Block (Block1 or Block2) option:
/// * the size of the block ([`Block::size`])
/// * whether more blocks are following ([`Block::more`])
/// * the relative number of the block ([`Block::num`]) within a sequence of blocks with the given size.
///
/// The wire representation packs all three into a single integer:
/// `(num << 4) | (more << 3) | szx`, where `szx` is a 3-bit size
/// exponent such that `size = 1 << (szx + 4)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Block(u32);

/// Errors constructing a [`Block`] from a block number, continuation flag
/// and size (or size exponent).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockError {
  /// The size exponent (`szx`) was greater than 6, the largest value RFC7959
  /// permits (corresponding to a 1024-byte block).
  InvalidSzx(u8),
  /// The requested block size was not one of the powers of two RFC7959
  /// permits (16, 32, 64, 128, 256, 512, 1024).
  InvalidSize(u16),
}

fn szx_of_size(size: u16) -> Result<u8, BlockError> {
  match size {
    | 16 => Ok(0),
    | 32 => Ok(1),
    | 64 => Ok(2),
    | 128 => Ok(3),
    | 256 => Ok(4),
    | 512 => Ok(5),
    | 1024 => Ok(6),
    | n => Err(BlockError::InvalidSize(n)),
  }
}

impl Block {
  /// Construct a Block option value from a block number, continuation flag,
  /// and block size in bytes.
  ///
  /// `size` must be one of 16, 32, 64, 128, 256, 512, 1024; any other value
  /// is rejected rather than rounded.
  pub fn new(num: u32, more: bool, size: u16) -> Result<Self, BlockError> {
    let szx = szx_of_size(size)?;
    Self::from_szx(num, more, szx)
  }

  /// Construct a Block option value from a block number, continuation flag,
  /// and raw 3-bit size exponent (`szx`).
  ///
  /// `szx` must be in `0..=6`; `7` is reserved and rejected.
  pub fn from_szx(num: u32, more: bool, szx: u8) -> Result<Self, BlockError> {
    if szx > 6 {
      return Err(BlockError::InvalidSzx(szx));
    }

    let num = num << 4;
    let more = u32::from(more) << 3;
    Ok(Self(num | more | (szx as u32)))
  }

  #[allow(missing_docs)]
  pub fn size(&self) -> u16 {
    1u16 << (self.szx() + 4)
  }

  #[allow(missing_docs)]
  pub fn szx(&self) -> u8 {
    (self.0 & 0b111) as u8
  }

  #[allow(missing_docs)]
  pub fn more(&self) -> bool {
    (self.0 & 0b1000) >> 3 == 1
  }

  #[allow(missing_docs)]
  pub fn num(&self) -> u32 {
    self.0 >> 4
  }
}

impl From<Block> for u32 {
  fn from(b: Block) -> Self {
    b.0
  }
}

/// Parse a raw packed Block value from the wire. Unlike [`Block::new`],
/// this never fails: a `szx` of 7 simply clamps to the largest valid
/// size when read back via [`Block::size`] rather than being rejected,
/// mirroring how option parsing never validates values the catalog
/// doesn't otherwise constrain.
impl From<u32> for Block {
  fn from(n: u32) -> Self {
    Block(n)
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn block() {
    let b = Block::from(33);
    assert_eq!(b.size(), 32);
    assert_eq!(b.num(), 2);
    assert!(!b.more());

    let b = Block::from(59);
    assert_eq!(b.size(), 128);
    assert_eq!(b.num(), 3);
    assert!(b.more());

    assert_eq!(Block::new(2, false, 32).unwrap(), Block::from(33));
    assert_eq!(Block::new(3, true, 128).unwrap(), Block::from(59));
  }

  #[test]
  fn spec_example_block2_packing() {
    let b = Block::new(5, true, 64).unwrap();
    assert_eq!(u32::from(b), 0x5A);

    let b = Block::from(0x5A);
    assert_eq!(b.num(), 5);
    assert!(b.more());
    assert_eq!(b.size(), 64);
  }

  #[test]
  fn rejects_invalid_sizes_and_szx() {
    assert_eq!(Block::new(0, false, 17), Err(BlockError::InvalidSize(17)));
    assert_eq!(Block::from_szx(0, false, 7), Err(BlockError::InvalidSzx(7)));
    assert!(Block::from_szx(0, false, 6).is_ok());
  }
}
