//! Block codec: byte payload ⇄ fixed-width integers.
//!
//! A payload is cut into `block_size`-byte slices.  Every slice but the last
//! becomes one [`BlockNumber`] verbatim (big-endian).  The last slice is
//! left-padded to a full block with `P` copies of the byte `P`, where `P` is
//! the number of padding bytes.  Decoding renders the last number back to
//! `block_size` bytes, reads `P` from its first byte and drops that many.
//!
//! # Padding convention
//! `P = 0` means "no padding": the last block is a full data block.  That
//! reading is only correct when the block's first data byte is itself `0`.
//! When the payload ends on a block boundary and the final block starts with
//! any other byte, or when the payload is empty, the encoder appends a
//! terminator block of `block_size` copies of `block_size` (`P = block_size`),
//! which decodes to nothing.  A terminator needs `block_size <= 255`; with a
//! 256-byte block those payloads are rejected with
//! [`BlockError::PaddingRange`].

use thiserror::Error;

use crate::number::BlockNumber;

/// Block size used when the caller does not pick one.
pub const DEFAULT_BLOCK_SIZE: usize = 128;
/// Largest block whose padding count still fits in one byte.
pub const MAX_BLOCK_SIZE: usize = 256;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockError {
    #[error("Block size {0} out of range (1..=256)")]
    BlockSize(usize),
    #[error("Padding count {padding} does not fit in one byte (block size {block_size})")]
    PaddingRange { padding: usize, block_size: usize },
    #[error("Number #{position} needs {len} bytes, block size is {block_size}")]
    Oversized { position: usize, len: usize, block_size: usize },
    #[error("Padding count {padding} exceeds block size {block_size}")]
    PaddingOverflow { padding: usize, block_size: usize },
}

impl BlockError {
    /// True for failures raised while decoding (corrupt input), as opposed to
    /// encode-side range errors.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, BlockError::Oversized { .. } | BlockError::PaddingOverflow { .. })
    }
}

fn check_block_size(block_size: usize) -> Result<(), BlockError> {
    if block_size == 0 || block_size > MAX_BLOCK_SIZE {
        return Err(BlockError::BlockSize(block_size));
    }
    Ok(())
}

fn padded_block(tail: &[u8], block_size: usize) -> Result<BlockNumber, BlockError> {
    let padding = block_size - tail.len();
    let marker = u8::try_from(padding)
        .map_err(|_| BlockError::PaddingRange { padding, block_size })?;
    let mut buf = vec![marker; padding];
    buf.extend_from_slice(tail);
    Ok(BlockNumber::from_be_bytes(&buf))
}

/// Encode `data` into block numbers.
pub fn bytes_to_numbers(data: &[u8], block_size: usize) -> Result<Vec<BlockNumber>, BlockError> {
    check_block_size(block_size)?;

    let mut numbers = Vec::with_capacity(data.len() / block_size + 1);
    let mut chunks = data.chunks(block_size).peekable();
    while let Some(chunk) = chunks.next() {
        if chunks.peek().is_some() {
            numbers.push(BlockNumber::from_be_bytes(chunk));
            continue;
        }
        if chunk.len() < block_size {
            numbers.push(padded_block(chunk, block_size)?);
        } else {
            // Full final block: only self-describing if its first byte reads
            // as "no padding".
            numbers.push(BlockNumber::from_be_bytes(chunk));
            if chunk[0] != 0 {
                numbers.push(padded_block(&[], block_size)?);
            }
        }
    }
    if data.is_empty() {
        numbers.push(padded_block(&[], block_size)?);
    }
    Ok(numbers)
}

/// Decode block numbers back into the payload.  An empty sequence decodes to
/// an empty payload.
pub fn numbers_to_bytes(numbers: &[BlockNumber], block_size: usize) -> Result<Vec<u8>, BlockError> {
    check_block_size(block_size)?;

    let Some((last, body)) = numbers.split_last() else {
        return Ok(Vec::new());
    };

    let render = |position: usize, n: &BlockNumber| {
        n.to_be_bytes_padded(block_size).ok_or(BlockError::Oversized {
            position,
            len: n.byte_len(),
            block_size,
        })
    };

    let mut data = Vec::with_capacity(numbers.len() * block_size);
    for (position, n) in body.iter().enumerate() {
        data.extend_from_slice(&render(position, n)?);
    }

    let tail = render(body.len(), last)?;
    let padding = tail[0] as usize;
    if padding > block_size {
        return Err(BlockError::PaddingOverflow { padding, block_size });
    }
    data.extend_from_slice(&tail[padding..]);
    Ok(data)
}

/// Padding count carried by the last block of an encoded sequence.
pub fn trailing_padding(numbers: &[BlockNumber], block_size: usize) -> Option<usize> {
    let last = numbers.last()?;
    let rendered = last.to_be_bytes_padded(block_size)?;
    rendered.first().map(|&b| b as usize)
}
