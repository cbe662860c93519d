//! Input side: resolver compilation, whole-buffer decoding and streaming.

pub mod compile;
mod engine;
mod program;
pub(crate) mod scan;
mod stream;

pub use compile::compile_decoder;
pub use engine::consume_input;
pub use program::DecodeProgram;
pub use scan::valid;
pub use stream::{StreamDecoder, Token};
