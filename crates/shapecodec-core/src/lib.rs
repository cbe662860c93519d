//! # shapecodec-core
//!
//! Type-directed JSON codec. A type's shape is described once, compiled into
//! an output program and an input resolver, cached by type identity, and then
//! re-run against any number of values.
//!
//! ## Quick start
//!
//! ```rust
//! use shapecodec_core::describe::{Describe, StructBuilder, TypeDescriptor};
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Job {
//!     id: u64,
//!     tags: Vec<String>,
//!     owner: Option<String>,
//! }
//!
//! impl Describe for Job {
//!     fn describe() -> TypeDescriptor {
//!         StructBuilder::<Job>::new()
//!             .field("id", |j: &Job| &j.id, |j: &mut Job| &mut j.id)
//!             .field("tags", |j: &Job| &j.tags, |j: &mut Job| &mut j.tags)
//!             .field_tagged("owner", "owner,omitempty", |j: &Job| &j.owner, |j: &mut Job| &mut j.owner)
//!             .build()
//!     }
//!
//!     fn zero() -> Option<Self> {
//!         Some(Job::default())
//!     }
//! }
//!
//! let job = Job { id: 7, tags: vec!["a".into()], owner: None };
//! let json = shapecodec_core::to_string(&job).unwrap();
//! assert_eq!(json, r#"{"id":7,"tags":["a"]}"#);
//!
//! let back: Job = shapecodec_core::from_str(&json).unwrap();
//! assert_eq!(back, job);
//! ```
//!
//! ## Modules
//!
//! - [`describe`]: `Describe` trait, type descriptors, struct builder
//! - [`encoder`]: output program compiler and interpreter
//! - [`decoder`]: input resolver compiler, engine and stream decoder
//! - [`cache`]: process-wide program cache
//! - [`context`]: pooled per-call runtime contexts
//! - [`options`]: encode/decode options, colour schemes, cancellation
//! - [`types`]: `Number`, `RawValue` and `Dynamic`
//! - [`error`]: error type for every stage

pub mod cache;
mod codec;
pub mod context;
pub mod decoder;
pub mod describe;
pub mod encoder;
pub mod error;
pub mod options;
pub mod types;

pub use codec::{
    from_slice, from_slice_into, from_slice_into_with, from_slice_with, from_str, to_string, to_string_with, to_vec,
    to_vec_pretty, to_vec_with, StreamEncoder,
};
pub use decoder::{valid, StreamDecoder, Token};
pub use describe::{Describe, TypeDescriptor};
pub use error::{CodecError, Result};
pub use options::{CancelToken, ColorScheme, DecodeOptions, DuplicateKeyPolicy, EncodeOptions};
pub use types::{Dynamic, Number, RawValue};
