//! Decode path: instruction stream → payload.
//!
//! [`recover_payload`] resolves the marker channel (through the stream's
//! relabeling when it has one), walks the stream with
//! [`scanner::scan_channel`] and feeds the collected numbers through the
//! inverse block codec.  A stream with no marker channel or no marker gates
//! decodes to an empty payload.

pub mod scanner;

use thiserror::Error;
use tracing::debug;

use crate::block::{numbers_to_bytes, BlockError};
use crate::circuit::{resolve_channel_for, InstructionStream, Relabeling, ResolveError};
use crate::embed::CodecOptions;
use crate::number::ParameterError;

pub use scanner::{extract_parameters, scan_channel, ChannelScan};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecoveryError {
    #[error("Resolution error: {0}")]
    Resolve(#[from] ResolveError),
    #[error("Marker at instruction {position} has {count} parameters, expected 1")]
    ParameterCount { position: usize, count: usize },
    #[error("Marker at instruction {position}: {source}")]
    Parameter {
        position: usize,
        #[source]
        source:   ParameterError,
    },
    #[error("Block error: {0}")]
    Block(#[from] BlockError),
}

impl RecoveryError {
    /// True when the stream was found but its contents could not be decoded.
    pub fn is_corrupt(&self) -> bool {
        match self {
            RecoveryError::Resolve(_) => false,
            RecoveryError::Block(e)   => e.is_corrupt(),
            _                         => true,
        }
    }
}

/// Recover the payload using the relabeling recorded on the stream.
pub fn recover_payload(stream: &InstructionStream, options: &CodecOptions) -> Result<Vec<u8>, RecoveryError> {
    recover_payload_with(stream, stream.layout.as_ref(), options)
}

/// Recover the payload with an explicitly supplied relabeling.
pub fn recover_payload_with(
    stream:     &InstructionStream,
    relabeling: Option<&Relabeling>,
    options:    &CodecOptions,
) -> Result<Vec<u8>, RecoveryError> {
    let Some(marker) = resolve_channel_for(&options.binding, stream, relabeling)? else {
        debug!("stream declares no channels; nothing to recover");
        return Ok(Vec::new());
    };

    let scan = scan_channel(stream, marker, &options.vocabulary)?;
    debug!(
        channel = %marker,
        markers = scan.numbers.len(),
        resets = scan.resets,
        other = scan.other,
        "scanned marker channel"
    );

    let data = numbers_to_bytes(&scan.numbers, options.block_size)?;
    Ok(data)
}
