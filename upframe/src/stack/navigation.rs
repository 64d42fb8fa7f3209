//! Walking from a frame toward the root.
//!
//! Every query takes a starting point: either a handle, or `None` for "the
//! routine enclosing the current point", which is the nearest call frame below
//! the top of the stack (or the top itself when no call is active).

use super::FrameStack;
use crate::error::ScopeError;
use crate::frame::FrameKind;
use crate::handle::Handle;

impl FrameStack {
    /// Handle to the frame `n` levels above the start, toward the root.
    pub fn up(&self, from: impl Into<Option<Handle>>, n: usize) -> Result<Handle, ScopeError> {
        let start = self.start(from.into())?;
        if n > start.depth() {
            return Err(ScopeError::NoSuchAncestor {
                requested: n,
                available: start.depth(),
                kind: "enclosing",
            });
        }
        Ok(self.handle_at(start.depth() - n))
    }

    /// Handle to the `n`-th nearest call frame, counting the start itself.
    pub fn enclosing_call(&self, from: impl Into<Option<Handle>>, n: usize) -> Result<Handle, ScopeError> {
        self.nth_of_kind(self.start(from.into())?, FrameKind::Call, n)
    }

    /// Handle to the `n`-th nearest guarded frame, counting the start itself.
    pub fn enclosing_guarded(
        &self,
        from: impl Into<Option<Handle>>,
        n: usize,
    ) -> Result<Handle, ScopeError> {
        self.nth_of_kind(self.start(from.into())?, FrameKind::Guarded, n)
    }

    /// Resolves a starting point to a valid handle.
    pub(crate) fn start(&self, from: Option<Handle>) -> Result<Handle, ScopeError> {
        match from {
            Some(h) => {
                self.assert_valid(h)?;
                Ok(h)
            }
            None => {
                let top = self.capture();
                Ok(self
                    .nth_of_kind(top, FrameKind::Call, 0)
                    .unwrap_or(top))
            }
        }
    }

    pub(crate) fn nth_of_kind(
        &self,
        start: Handle,
        kind: FrameKind,
        n: usize,
    ) -> Result<Handle, ScopeError> {
        let mut found = 0;
        for depth in (0..=start.depth()).rev() {
            if self.frames[depth].kind() == kind {
                if found == n {
                    return Ok(self.handle_at(depth));
                }
                found += 1;
            }
        }
        Err(ScopeError::NoSuchAncestor {
            requested: n,
            available: found,
            kind: kind.name(),
        })
    }
}
