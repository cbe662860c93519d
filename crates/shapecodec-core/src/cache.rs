//! Process-wide caches keyed by type identity.
//!
//! Three sharded maps: field-selected descriptors, encode programs and decode
//! programs. Nothing is ever evicted; the set of types in a process is finite.
//!
//! Compilation runs outside every map lock. Two threads that miss on the same
//! type both compile it; the programs are behaviourally identical and the
//! first one published is returned to both, so no call ever waits on another
//! call's compilation.

use std::any::TypeId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};

use dashmap::DashMap;

use crate::decoder::{compile_decoder, DecodeProgram};
use crate::describe::{self, Describe, TypeDescriptor, TypeRef};
use crate::encoder::{compile_encoder, EncodeProgram};
use crate::error::Result;

static DESCRIPTORS: LazyLock<DashMap<TypeId, Arc<TypeDescriptor>>> = LazyLock::new(DashMap::new);
static ENCODERS: LazyLock<DashMap<TypeId, Arc<EncodeProgram>>> = LazyLock::new(DashMap::new);
static DECODERS: LazyLock<DashMap<TypeId, Arc<DecodeProgram>>> = LazyLock::new(DashMap::new);

static HITS: AtomicU64 = AtomicU64::new(0);
static MISSES: AtomicU64 = AtomicU64::new(0);

/// Snapshot of program cache activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub descriptors: usize,
    pub encoders: usize,
    pub decoders: usize,
}

pub fn stats() -> CacheStats {
    CacheStats {
        hits: HITS.load(Ordering::Relaxed),
        misses: MISSES.load(Ordering::Relaxed),
        descriptors: DESCRIPTORS.len(),
        encoders: ENCODERS.len(),
        decoders: DECODERS.len(),
    }
}

/// Field-selected descriptor for a type, built on first request.
pub fn descriptor_of(tref: TypeRef) -> Arc<TypeDescriptor> {
    let id = tref.key().id();
    if let Some(found) = DESCRIPTORS.get(&id) {
        return found.clone();
    }
    let built = Arc::new(describe::build(tref));
    DESCRIPTORS.entry(id).or_insert(built).clone()
}

pub fn encoder_for<T: Describe>() -> Result<Arc<EncodeProgram>> {
    encoder_for_ref(TypeRef::of::<T>())
}

pub fn decoder_for<T: Describe>() -> Result<Arc<DecodeProgram>> {
    decoder_for_ref(TypeRef::of::<T>())
}

/// Cached encode program for `tref`, compiling it on a miss.
pub fn encoder_for_ref(tref: TypeRef) -> Result<Arc<EncodeProgram>> {
    let id = tref.key().id();
    if let Some(found) = ENCODERS.get(&id) {
        HITS.fetch_add(1, Ordering::Relaxed);
        return Ok(found.clone());
    }
    MISSES.fetch_add(1, Ordering::Relaxed);
    let compiled = compile_encoder(tref)?;
    let published = ENCODERS.entry(id).or_insert(compiled).clone();
    tracing::debug!(type_name = tref.name(), ops = published.len(), "encode program cached");
    Ok(published)
}

/// Cached decode program for `tref`, compiling it on a miss.
pub fn decoder_for_ref(tref: TypeRef) -> Result<Arc<DecodeProgram>> {
    let id = tref.key().id();
    if let Some(found) = DECODERS.get(&id) {
        HITS.fetch_add(1, Ordering::Relaxed);
        return Ok(found.clone());
    }
    MISSES.fetch_add(1, Ordering::Relaxed);
    let compiled = compile_decoder(tref)?;
    let published = DECODERS.entry(id).or_insert(compiled).clone();
    tracing::debug!(type_name = tref.name(), nodes = published.node_count(), "decode program cached");
    Ok(published)
}
