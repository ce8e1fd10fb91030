pub mod asset;
pub mod codec;
pub mod pipeline;

pub use asset::{parse_frames, AssetError};
pub use codec::{CodecError, NullDecoder, NullEncoder, OpusDecoder, OpusEncoder};
pub use pipeline::{AudioPipeline, DecoderFactory};
