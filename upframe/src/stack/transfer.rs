//! Non-local transfers toward an ancestor frame.
//!
//! `unwind` and `leave` never return normally: they validate the target and
//! hand back an [`Unwind::Transfer`] that the body propagates with `?` or
//! `return`. Each scoped entry it passes through pops its frame on the way,
//! and the target's own scoped entry consumes it.

use super::FrameStack;
use crate::error::{Flow, ScopeError, Transfer, TransferKind, Unwind};
use crate::frame::{FrameKind, Scope};
use crate::handle::Handle;
use crate::value::Values;
use tracing::debug;

impl FrameStack {
    /// Returns `values` from the call frame at (or nearest above) the start,
    /// as if that call had returned normally.
    ///
    /// The call's evaluation context decides how many values its caller sees.
    pub fn unwind<T>(&self, from: impl Into<Option<Handle>>, values: Values) -> Flow<T> {
        let target = self.returnable_call(from.into(), "unwind")?;
        self.transfer(target, TransferKind::Unwind, "unwind", values)
    }

    /// Exits the frame at the start with `values` as its result.
    ///
    /// Substitution blocks cannot be left this way.
    pub fn leave<T>(&self, from: impl Into<Option<Handle>>, values: Values) -> Flow<T> {
        let target = self.start(from.into())?;
        if let Scope::Block(info) = &self.frames[target.depth()].scope
            && info.substitution
        {
            return Err(ScopeError::not_returnable("leave", "target is a substitution scope").into());
        }
        self.transfer(target, TransferKind::Leave, "leave", values)
    }

    /// Runs `callback(args)` in place of the body of the call frame at (or
    /// nearest above) the start, then returns its results to this call site.
    ///
    /// Frames between the call site and the target are hidden while the
    /// callback runs, so it observes the target's identity and evaluation
    /// context. A transfer the callback aims at the target or above proceeds
    /// exactly as if it had been issued inside the target.
    ///
    /// # Panics
    /// If the callback returns normally but leaves frames of its own on the
    /// stack.
    pub fn uplevel<F>(&mut self, from: impl Into<Option<Handle>>, args: Values, callback: F) -> Flow<Values>
    where
        F: FnOnce(&mut FrameStack, Values) -> Flow<Values>,
    {
        let target = self.returnable_call(from.into(), "uplevel")?;
        let visible = target.depth() + 1;
        let hidden = self.frames.split_off(visible);
        debug!(context = %target, hidden = hidden.len(), "Uplevel: detached frames");
        self.detached.push(hidden);

        let outcome = callback(self, args);
        let outcome = self.pop_above(target.frame_id(), outcome);

        assert_eq!(
            self.frames.len(),
            visible,
            "Uplevel callback left frames on the stack"
        );
        let hidden = self
            .detached
            .pop()
            .expect("Uplevel segment should still be detached");
        debug!(context = %target, hidden = hidden.len(), "Uplevel: reattached frames");
        self.frames.extend(hidden);
        outcome
    }

    /// Resolves the start to its nearest call frame.
    fn returnable_call(&self, from: Option<Handle>, operation: &'static str) -> Result<Handle, ScopeError> {
        let start = self.start(from)?;
        self.nth_of_kind(start, FrameKind::Call, 0)
            .map_err(|_| ScopeError::not_returnable(operation, "no enclosing call frame"))
    }

    fn transfer<T>(
        &self,
        target: Handle,
        kind: TransferKind,
        operation: &'static str,
        values: Values,
    ) -> Flow<T> {
        if !self.frames[target.depth()].boundary {
            let reason = if target.depth() == 0 {
                "target is the root frame".to_string()
            } else {
                format!("frame {} was pushed without a scoped entry", target.frame_id())
            };
            return Err(ScopeError::not_returnable(operation, reason).into());
        }
        debug!(context = %target, ?kind, count = values.len(), "Starting transfer");
        Err(Unwind::Transfer(Transfer {
            target,
            kind,
            values,
        }))
    }
}
