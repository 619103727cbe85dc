//! Recursion depth guard for deeply nested pattern trees.

/// Raised when a recursive traversal exceeds its depth budget. The API
/// boundary converts this into a `PatternTooComplex` diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TooComplex;

/// Counts recursion depth so a pathological pattern fails with a
/// diagnostic instead of overflowing the host stack.
#[derive(Debug)]
pub struct StackGuard {
    depth: u32,
    limit: u32,
}

/// The lowering and normalization frames are large; the budget must
/// bottom out well inside a default 2 MiB thread stack.
pub const DEFAULT_DEPTH_LIMIT: u32 = 200;

impl StackGuard {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_DEPTH_LIMIT)
    }

    pub fn with_limit(limit: u32) -> Self {
        Self { depth: 0, limit }
    }

    /// Enter one recursion level. Callers pair this with [`Self::exit`] on
    /// every return path that did not bail out.
    pub fn enter(&mut self) -> Result<(), TooComplex> {
        if self.depth >= self.limit {
            return Err(TooComplex);
        }
        self.depth += 1;
        Ok(())
    }

    pub fn exit(&mut self) {
        debug_assert!(self.depth > 0);
        self.depth -= 1;
    }
}

impl Default for StackGuard {
    fn default() -> Self {
        Self::new()
    }
}
