//! Encode path: payload → marker program.
//!
//! The payload is cut into block numbers and each number becomes one marker
//! gate, followed by a reset so neighbouring markers cannot be merged by later
//! rewriting.  The result is a stand-alone [`MarkerProgram`] on one fresh
//! channel; the host decides where it ends up.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::block::{bytes_to_numbers, BlockError, DEFAULT_BLOCK_SIZE};
use crate::circuit::{Binding, ChannelId, Instruction, InstructionStream, Vocabulary};
use crate::number::BlockNumber;

// ── CodecOptions ─────────────────────────────────────────────────────────────

/// Settings shared by the encode and decode paths.  Both sides must agree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecOptions {
    pub block_size: usize,
    pub vocabulary: Vocabulary,
    /// Symbolic identity given to the marker channel.
    pub binding:    Binding,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            vocabulary: Vocabulary::default(),
            binding:    Binding::marker(),
        }
    }
}

// ── MarkerProgram ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerOp {
    Marker(BlockNumber),
    Reset,
}

/// Ordered marker/reset pairs destined for one freshly declared channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerProgram {
    pub binding: Binding,
    pub ops:     Vec<MarkerOp>,
}

impl MarkerProgram {
    pub fn marker_count(&self) -> usize {
        self.numbers().count()
    }

    pub fn numbers(&self) -> impl Iterator<Item = &BlockNumber> {
        self.ops.iter().filter_map(|op| match op {
            MarkerOp::Marker(n) => Some(n),
            MarkerOp::Reset     => None,
        })
    }

    /// Materialize the ops as instructions on `channel`.
    pub fn to_instructions(&self, channel: ChannelId, vocabulary: &Vocabulary) -> Vec<Instruction> {
        self.ops
            .iter()
            .map(|op| match op {
                MarkerOp::Marker(n) => {
                    Instruction::new(vocabulary.marker.clone(), vec![channel], vec![n.clone().into()])
                }
                MarkerOp::Reset => Instruction::new(vocabulary.reset.clone(), vec![channel], vec![]),
            })
            .collect()
    }

    /// Declare a new last channel on `stream` and append the program to it.
    ///
    /// If the stream already carries a relabeling, the binding is registered
    /// at a new initial position pointing at the new channel so it still
    /// resolves.
    pub fn append_to(&self, stream: &mut InstructionStream, vocabulary: &Vocabulary) -> ChannelId {
        let channel = stream.add_channel();
        if let Some(layout) = stream.layout.as_mut() {
            let position = layout.initial_layout.len() as u32;
            layout.initial_layout.push(channel.0);
            layout.input_mapping.retain(|(b, _)| b != &self.binding);
            layout.input_mapping.push((self.binding.clone(), position));
        }
        stream.instructions.extend(self.to_instructions(channel, vocabulary));
        channel
    }
}

/// Build the marker program for `data`.
pub fn embed_payload(data: &[u8], options: &CodecOptions) -> Result<MarkerProgram, BlockError> {
    let numbers = bytes_to_numbers(data, options.block_size)?;
    debug!(
        bytes = data.len(),
        blocks = numbers.len(),
        block_size = options.block_size,
        "embedding payload"
    );

    let mut ops = Vec::with_capacity(numbers.len() * 2);
    for n in numbers {
        ops.push(MarkerOp::Marker(n));
        ops.push(MarkerOp::Reset);
    }
    Ok(MarkerProgram { binding: options.binding.clone(), ops })
}

// ── Gate selection ───────────────────────────────────────────────────────────

/// A gate offered by the target instruction set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateSpec {
    pub name:       String,
    pub num_params: usize,
}

impl GateSpec {
    pub fn new(name: impl Into<String>, num_params: usize) -> Self {
        Self { name: name.into(), num_params }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid gate spec {0:?}: expected NAME:PARAMS")]
pub struct GateSpecError(pub String);

/// `NAME:PARAMS`, e.g. `rz:1`.
impl FromStr for GateSpec {
    type Err = GateSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, params) = s
            .split_once(':')
            .ok_or_else(|| GateSpecError(s.to_owned()))?;
        let num_params = params
            .trim()
            .parse()
            .map_err(|_| GateSpecError(s.to_owned()))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(GateSpecError(s.to_owned()));
        }
        Ok(Self::new(name, num_params))
    }
}

/// First gate in `basis` that takes exactly one parameter.
pub fn select_marker_gate(basis: &[GateSpec]) -> Option<&GateSpec> {
    basis.iter().find(|g| g.num_params == 1)
}

/// Vocabulary built from a basis: its first one-parameter gate as marker.
pub fn vocabulary_for_basis(basis: &[GateSpec], reset: &str) -> Option<Vocabulary> {
    select_marker_gate(basis).map(|g| Vocabulary {
        marker: g.name.clone(),
        reset:  reset.to_owned(),
    })
}
