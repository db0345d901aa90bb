pub mod number;
pub mod block;
pub mod circuit;
pub mod embed;
pub mod recovery;
pub mod archive;

pub use number::{BlockNumber, Parameter, ParameterError};
pub use block::{bytes_to_numbers, numbers_to_bytes, BlockError, DEFAULT_BLOCK_SIZE, MAX_BLOCK_SIZE};
pub use circuit::{
    resolve_marker_channel, Binding, ChannelId, Instruction, InstructionStream, Relabeling,
    ResolveError, Vocabulary,
};
pub use embed::{embed_payload, CodecOptions, MarkerOp, MarkerProgram};
pub use recovery::{extract_parameters, recover_payload, RecoveryError};
pub use archive::{pack_archive, unpack_archive, ArchiveError, PackOptions, UnpackReport};
