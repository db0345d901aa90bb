//! Instruction walk over the marker channel.
//!
//! The scanner visits every instruction once, in stream order.  Only
//! instructions whose first operand is the marker channel are considered;
//! on that channel resets are barriers, marker gates carry one parameter
//! each, and anything else is noise.  Nothing is an error except a marker
//! gate whose parameter cannot be read back as an exact integer.

use crate::circuit::{ChannelId, InstructionStream, OpKind, Vocabulary};
use crate::number::BlockNumber;

use super::RecoveryError;

/// What one walk over the stream saw.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelScan {
    /// Marker parameters, in stream order.
    pub numbers: Vec<BlockNumber>,
    pub resets:  usize,
    /// Instructions on the marker channel that are neither markers nor resets.
    pub other:   usize,
    /// Instructions whose first operand is some other channel.
    pub foreign: usize,
}

pub fn scan_channel(
    stream:     &InstructionStream,
    marker:     ChannelId,
    vocabulary: &Vocabulary,
) -> Result<ChannelScan, RecoveryError> {
    let mut scan = ChannelScan::default();

    for (position, instruction) in stream.instructions.iter().enumerate() {
        if instruction.first_channel() != Some(marker) {
            scan.foreign += 1;
            continue;
        }
        match vocabulary.classify(instruction) {
            OpKind::Reset => scan.resets += 1,
            OpKind::Other => scan.other += 1,
            OpKind::Marker => {
                let [param] = instruction.params.as_slice() else {
                    return Err(RecoveryError::ParameterCount {
                        position,
                        count: instruction.params.len(),
                    });
                };
                let n = param
                    .to_block_number()
                    .map_err(|source| RecoveryError::Parameter { position, source })?;
                scan.numbers.push(n);
            }
        }
    }
    Ok(scan)
}

/// Marker parameters on `marker`, in stream order.
pub fn extract_parameters(
    stream:     &InstructionStream,
    marker:     ChannelId,
    vocabulary: &Vocabulary,
) -> Result<Vec<BlockNumber>, RecoveryError> {
    scan_channel(stream, marker, vocabulary).map(|scan| scan.numbers)
}
