//! Instruction-stream model and marker-channel resolution.
//!
//! An [`InstructionStream`] is a flat, ordered list of instructions over
//! `num_channels` declared channels.  Channels are addressed by position
//! ([`ChannelId`]).  A channel may also carry a symbolic [`Binding`] — a
//! `(group, group_size, index)` triple — which survives a placement step that
//! reorders channels.  Such a step leaves a [`Relabeling`] behind: bindings map
//! to initial positions, and initial positions map to the channel each one
//! ended up on.
//!
//! # Resolution
//! Without a relabeling the marker is the last declared channel.  With one,
//! the marker binding (`leak`, size 1, index 0) is looked up and followed
//! through both tables.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::number::Parameter;

/// Group name of the marker binding.
pub const MARKER_GROUP: &str = "leak";
/// Default instruction name of the payload-carrying gate.
pub const DEFAULT_MARKER_GATE: &str = "rz";
/// Default instruction name of the barrier placed after every marker gate.
pub const DEFAULT_RESET_GATE: &str = "reset";

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Binding {binding} not present in relabeling")]
    MissingBinding { binding: String },
    #[error("Initial position {position} has no entry in the layout")]
    UnmappedPosition { position: u32 },
    #[error("Channel {channel} out of range ({declared} declared)")]
    ChannelOutOfRange { channel: u32, declared: u32 },
}

// ── Identities ───────────────────────────────────────────────────────────────

/// Position of a channel in the stream's declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub u32);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}", self.0)
    }
}

/// Symbolic channel identity: element `index` of a named group of
/// `group_size` channels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Binding {
    pub group:      String,
    pub group_size: u32,
    pub index:      u32,
}

impl Binding {
    pub fn new(group: impl Into<String>, group_size: u32, index: u32) -> Self {
        Self { group: group.into(), group_size, index }
    }

    /// The one-channel `leak` group the payload lives on.
    pub fn marker() -> Self {
        Self::new(MARKER_GROUP, 1, 0)
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})[{}]", self.group, self.group_size, self.index)
    }
}

/// Channel reordering left behind by a placement step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relabeling {
    /// Binding → initial position.
    pub input_mapping:  Vec<(Binding, u32)>,
    /// Initial position → current channel index.
    pub initial_layout: Vec<u32>,
}

impl Relabeling {
    pub fn initial_position(&self, binding: &Binding) -> Option<u32> {
        self.input_mapping
            .iter()
            .find(|(b, _)| b == binding)
            .map(|&(_, pos)| pos)
    }

    pub fn current_index(&self, position: u32) -> Option<u32> {
        self.initial_layout.get(position as usize).copied()
    }
}

// ── Instructions ─────────────────────────────────────────────────────────────

/// Classification of an instruction relative to the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    /// Barrier between consecutive markers; carries nothing.
    Reset,
    /// Payload-carrying gate with one parameter.
    Marker,
    Other,
}

/// Instruction names that identify marker and reset operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vocabulary {
    pub marker: String,
    pub reset:  String,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            marker: DEFAULT_MARKER_GATE.to_owned(),
            reset:  DEFAULT_RESET_GATE.to_owned(),
        }
    }
}

impl Vocabulary {
    pub fn classify(&self, instruction: &Instruction) -> OpKind {
        if instruction.name == self.reset {
            OpKind::Reset
        } else if instruction.name == self.marker {
            OpKind::Marker
        } else {
            OpKind::Other
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub name:     String,
    pub channels: Vec<ChannelId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params:   Vec<Parameter>,
}

impl Instruction {
    pub fn new(name: impl Into<String>, channels: Vec<ChannelId>, params: Vec<Parameter>) -> Self {
        Self { name: name.into(), channels, params }
    }

    /// The operand tested against the marker channel.
    #[inline]
    pub fn first_channel(&self) -> Option<ChannelId> {
        self.channels.first().copied()
    }
}

// ── InstructionStream ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstructionStream {
    pub num_channels: u32,
    #[serde(default)]
    pub instructions: Vec<Instruction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout:       Option<Relabeling>,
}

impl InstructionStream {
    pub fn new(num_channels: u32) -> Self {
        Self { num_channels, ..Self::default() }
    }

    /// Declare one more channel at the end of the channel order.
    pub fn add_channel(&mut self) -> ChannelId {
        let id = ChannelId(self.num_channels);
        self.num_channels += 1;
        id
    }

    pub fn last_channel(&self) -> Option<ChannelId> {
        self.num_channels.checked_sub(1).map(ChannelId)
    }

    pub fn push(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

// ── Resolution ───────────────────────────────────────────────────────────────

/// Find the channel that carries the payload.
///
/// Returns `Ok(None)` only when no relabeling is given and the stream
/// declares no channels.
pub fn resolve_marker_channel(
    stream:     &InstructionStream,
    relabeling: Option<&Relabeling>,
) -> Result<Option<ChannelId>, ResolveError> {
    resolve_channel_for(&Binding::marker(), stream, relabeling)
}

/// Resolve an arbitrary binding.  Without a relabeling the positional
/// convention applies (last declared channel) regardless of `binding`.
pub fn resolve_channel_for(
    binding:    &Binding,
    stream:     &InstructionStream,
    relabeling: Option<&Relabeling>,
) -> Result<Option<ChannelId>, ResolveError> {
    let Some(relabeling) = relabeling else {
        return Ok(stream.last_channel());
    };

    let position = relabeling
        .initial_position(binding)
        .ok_or_else(|| ResolveError::MissingBinding { binding: binding.to_string() })?;
    let channel = relabeling
        .current_index(position)
        .ok_or(ResolveError::UnmappedPosition { position })?;
    if channel >= stream.num_channels {
        return Err(ResolveError::ChannelOutOfRange {
            channel,
            declared: stream.num_channels,
        });
    }
    Ok(Some(ChannelId(channel)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn swapped_layout() -> Relabeling {
        Relabeling {
            input_mapping: vec![
                (Binding::new("q", 2, 0), 0),
                (Binding::new("q", 2, 1), 1),
                (Binding::marker(), 2),
            ],
            initial_layout: vec![2, 0, 1],
        }
    }

    #[test]
    fn positional_marker_is_last_channel() {
        let stream = InstructionStream::new(4);
        assert_eq!(resolve_marker_channel(&stream, None), Ok(Some(ChannelId(3))));
    }

    #[test]
    fn no_channels_resolves_to_nothing() {
        let stream = InstructionStream::new(0);
        assert_eq!(resolve_marker_channel(&stream, None), Ok(None));
    }

    #[test]
    fn relabeled_marker_follows_both_tables() {
        let stream = InstructionStream::new(3);
        let layout = swapped_layout();
        assert_eq!(resolve_marker_channel(&stream, Some(&layout)), Ok(Some(ChannelId(1))));
        assert_eq!(
            resolve_channel_for(&Binding::new("q", 2, 0), &stream, Some(&layout)),
            Ok(Some(ChannelId(2)))
        );
    }

    #[test]
    fn resolution_is_deterministic() {
        let stream = InstructionStream::new(3);
        let layout = swapped_layout();
        let first = resolve_marker_channel(&stream, Some(&layout));
        for _ in 0..10 {
            assert_eq!(resolve_marker_channel(&stream, Some(&layout)), first);
        }
    }

    #[test]
    fn missing_binding_is_an_error() {
        let stream = InstructionStream::new(2);
        let layout = Relabeling {
            input_mapping: vec![(Binding::new("q", 2, 0), 0)],
            initial_layout: vec![0, 1],
        };
        assert_eq!(
            resolve_marker_channel(&stream, Some(&layout)),
            Err(ResolveError::MissingBinding { binding: "leak(1)[0]".into() })
        );
    }

    #[test]
    fn binding_identity_includes_group_size() {
        let stream = InstructionStream::new(2);
        let layout = Relabeling {
            input_mapping: vec![(Binding::new(MARKER_GROUP, 2, 0), 0)],
            initial_layout: vec![0, 1],
        };
        assert!(matches!(
            resolve_marker_channel(&stream, Some(&layout)),
            Err(ResolveError::MissingBinding { .. })
        ));
    }

    #[test]
    fn layout_holes_and_ranges_are_checked() {
        let stream = InstructionStream::new(2);
        let short = Relabeling {
            input_mapping: vec![(Binding::marker(), 5)],
            initial_layout: vec![0, 1],
        };
        assert_eq!(
            resolve_marker_channel(&stream, Some(&short)),
            Err(ResolveError::UnmappedPosition { position: 5 })
        );

        let wide = Relabeling {
            input_mapping: vec![(Binding::marker(), 0)],
            initial_layout: vec![7],
        };
        assert_eq!(
            resolve_marker_channel(&stream, Some(&wide)),
            Err(ResolveError::ChannelOutOfRange { channel: 7, declared: 2 })
        );
    }

    #[test]
    fn vocabulary_classifies_by_name() {
        let vocab = Vocabulary::default();
        let q = vec![ChannelId(0)];
        assert_eq!(vocab.classify(&Instruction::new("reset", q.clone(), vec![])), OpKind::Reset);
        assert_eq!(vocab.classify(&Instruction::new("rz", q.clone(), vec![])), OpKind::Marker);
        assert_eq!(vocab.classify(&Instruction::new("cx", q, vec![])), OpKind::Other);
    }

    #[test]
    fn stream_json_keeps_layout() {
        let mut stream = InstructionStream::new(3);
        stream.push(Instruction::new("h", vec![ChannelId(0)], vec![]));
        stream.layout = Some(swapped_layout());
        let back = InstructionStream::from_bytes(&stream.to_bytes().unwrap()).unwrap();
        assert_eq!(back, stream);
    }
}
