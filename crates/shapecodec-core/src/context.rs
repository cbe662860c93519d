//! Pooled per-call scratch state.
//!
//! Every top-level encode or decode call borrows one [`RuntimeContext`] from a
//! process-wide lock-free pool and gives it back when the [`PooledContext`]
//! guard drops, on success, error and cancellation alike. A returned context
//! is reset first, so nothing from one call (buffers, flags, the in-flight
//! set, a colour scheme or cancellation token) is visible to the next.

use std::collections::HashSet;
use std::ops::{Deref, DerefMut};
use std::sync::LazyLock;

use bitflags::bitflags;
use crossbeam::queue::SegQueue;

use crate::error::{CodecError, Result};
use crate::options::{
    CancelToken, ColorScheme, DecodeOptions, DuplicateKeyPolicy, EncodeOptions, DEFAULT_ENCODE_MAX_DEPTH,
};

/// Buffers above this capacity are shrunk before a context is pooled.
const MAX_POOLED_CAPACITY: usize = 64 * 1024;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct OptionFlags: u16 {
        const ESCAPE_HTML   = 1 << 0;
        const UNORDERED_MAP = 1 << 1;
        const DEBUG         = 1 << 2;
        const COLORIZE      = 1 << 3;
        const INDENT        = 1 << 4;
        const FIRST_WINS    = 1 << 5;
        const DENY_UNKNOWN  = 1 << 6;
        const USE_NUMBER    = 1 << 7;
        const CANCELLABLE   = 1 << 8;
    }
}

/// Scratch state for one call.
#[derive(Debug)]
pub struct RuntimeContext {
    pub(crate) buf: Vec<u8>,
    pub(crate) scratch: Vec<u8>,
    pub(crate) flags: OptionFlags,
    pub(crate) colors: Option<ColorScheme>,
    pub(crate) prefix: String,
    pub(crate) indent: String,
    pub(crate) max_depth: usize,
    pub(crate) in_flight: HashSet<usize>,
    pub(crate) cancel: Option<CancelToken>,
}

impl Default for RuntimeContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeContext {
    pub fn new() -> Self {
        RuntimeContext {
            buf: Vec::with_capacity(1024),
            scratch: Vec::new(),
            flags: OptionFlags::empty(),
            colors: None,
            prefix: String::new(),
            indent: String::new(),
            max_depth: DEFAULT_ENCODE_MAX_DEPTH,
            in_flight: HashSet::new(),
            cancel: None,
        }
    }

    pub fn flags(&self) -> OptionFlags {
        self.flags
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// Load encode options into the context.
    pub fn apply_encode(&mut self, opts: &EncodeOptions) {
        let mut flags = OptionFlags::empty();
        flags.set(OptionFlags::ESCAPE_HTML, opts.escape_html);
        flags.set(OptionFlags::UNORDERED_MAP, opts.unordered_map);
        flags.set(OptionFlags::DEBUG, opts.debug);
        flags.set(OptionFlags::COLORIZE, opts.colorize.is_some());
        flags.set(OptionFlags::INDENT, opts.indent.is_some());
        flags.set(OptionFlags::CANCELLABLE, opts.cancel.is_some());
        self.flags = flags;
        self.colors = opts.colorize.clone();
        self.prefix.clear();
        self.indent.clear();
        if let Some(indent) = &opts.indent {
            self.prefix.push_str(&indent.prefix);
            self.indent.push_str(&indent.indent);
        }
        self.max_depth = opts.max_depth;
        self.cancel = opts.cancel.clone();
    }

    /// Load decode options into the context.
    pub fn apply_decode(&mut self, opts: &DecodeOptions) {
        let mut flags = OptionFlags::empty();
        flags.set(OptionFlags::FIRST_WINS, opts.duplicate_keys == DuplicateKeyPolicy::FirstWins);
        flags.set(OptionFlags::DENY_UNKNOWN, opts.deny_unknown_fields);
        flags.set(OptionFlags::USE_NUMBER, opts.use_number);
        flags.set(OptionFlags::CANCELLABLE, opts.cancel.is_some());
        self.flags = flags;
        self.max_depth = opts.max_depth;
        self.cancel = opts.cancel.clone();
    }

    #[inline]
    pub(crate) fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(CodecError::Cancelled),
            _ => Ok(()),
        }
    }

    /// Clear all per-call state.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.scratch.clear();
        if self.buf.capacity() > MAX_POOLED_CAPACITY {
            self.buf.shrink_to(MAX_POOLED_CAPACITY);
        }
        if self.scratch.capacity() > MAX_POOLED_CAPACITY {
            self.scratch.shrink_to(MAX_POOLED_CAPACITY);
        }
        self.flags = OptionFlags::empty();
        self.colors = None;
        self.prefix.clear();
        self.indent.clear();
        self.max_depth = DEFAULT_ENCODE_MAX_DEPTH;
        self.in_flight.clear();
        self.cancel = None;
    }
}

static POOL: LazyLock<SegQueue<RuntimeContext>> = LazyLock::new(SegQueue::new);

/// A context on loan from the pool; returned (after reset) on drop.
pub struct PooledContext {
    inner: Option<RuntimeContext>,
}

impl Deref for PooledContext {
    type Target = RuntimeContext;

    fn deref(&self) -> &RuntimeContext {
        // Only `Drop` takes the context out.
        self.inner.as_ref().unwrap_or_else(|| unreachable!("pooled context used after release"))
    }
}

impl DerefMut for PooledContext {
    fn deref_mut(&mut self) -> &mut RuntimeContext {
        self.inner.as_mut().unwrap_or_else(|| unreachable!("pooled context used after release"))
    }
}

impl Drop for PooledContext {
    fn drop(&mut self) {
        if let Some(mut ctx) = self.inner.take() {
            ctx.reset();
            POOL.push(ctx);
        }
    }
}

/// Take a context from the pool, creating one if the pool is empty.
pub fn acquire() -> PooledContext {
    let ctx = match POOL.pop() {
        Some(ctx) => ctx,
        None => {
            tracing::trace!("context pool empty, allocating a new runtime context");
            RuntimeContext::new()
        }
    };
    PooledContext { inner: Some(ctx) }
}

/// Number of idle contexts currently pooled.
pub fn pooled() -> usize {
    POOL.len()
}
