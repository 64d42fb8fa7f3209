//! The frame stack.
//!
//! Frames are kept in a growable array indexed by depth, with the root frame at
//! index 0. Scoped entries ([`FrameStack::block`], [`FrameStack::call`] and
//! [`FrameStack::guarded`]) push a frame, run a body against the stack, then
//! pop the frame and run its deferred actions before handing control back.
//! The pop is also where non-local transfers aimed at the frame are consumed
//! and where guarded frames catch failures.

mod introspect;
mod navigation;
mod transfer;

use crate::error::{Flow, ScopeError, Unwind};
use crate::frame::{BlockInfo, CallInfo, Frame, FrameId, FrameKind, GuardInfo, Origin, Scope};
use crate::handle::{Handle, next_generation};
use crate::value::Values;
use std::panic::Location;
use tracing::{debug, trace, warn};

/// Stack of active frames for one thread of control.
///
/// The stack is not `Send`: handles and deferred actions only make sense on
/// the thread that created them.
pub struct FrameStack {
    frames: Vec<Frame>,
    /// Segments hidden while an uplevel callback runs, innermost last.
    detached: Vec<Vec<Frame>>,
}

impl FrameStack {
    /// Creates a stack holding only the root frame.
    ///
    /// The root frame reports the caller's location under the `main`
    /// namespace.
    #[track_caller]
    pub fn new() -> Self {
        let caller = Location::caller();
        Self::with_root(Origin::new("main", caller.file(), caller.line()))
    }

    /// Creates a stack whose root frame reports the given origin.
    pub fn with_root(origin: Origin) -> Self {
        let root = Frame::new(
            next_generation(),
            Scope::Block(BlockInfo::default()),
            origin,
            false,
        );
        trace!(generation = root.generation, "Created root frame");
        Self {
            frames: vec![root],
            detached: Vec::new(),
        }
    }

    /// Pushes a frame and returns its id.
    ///
    /// Frames pushed this way have no transfer boundary: `unwind` and `leave`
    /// refuse to target them. Prefer the scoped entries.
    pub fn push(&mut self, scope: Scope, origin: Origin) -> FrameId {
        self.push_frame(scope, origin, false)
    }

    /// Pops the top frame and runs its deferred actions.
    ///
    /// # Panics
    /// If `id` is not the top frame or is the root frame, since scopes must
    /// nest strictly.
    pub fn pop(&mut self, id: FrameId) -> Result<(), ScopeError> {
        let frame = self.take_top(id);
        self.run_deferred(frame)
    }

    /// The frame at the top of the stack.
    pub fn current(&self) -> FrameId {
        FrameId::new(self.frames.len() - 1)
    }

    /// Number of visible frames, including the root.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Handle to the outermost frame.
    pub fn root(&self) -> Handle {
        self.handle_at(0)
    }

    /// Runs `body` inside a new block frame.
    pub fn block<F>(&mut self, info: BlockInfo, origin: Origin, body: F) -> Flow<Values>
    where
        F: FnOnce(&mut FrameStack) -> Flow<Values>,
    {
        self.enter(Scope::Block(info), origin, body)?
            .map_err(Unwind::Failure)
    }

    /// Runs `body` as the body of a routine call.
    ///
    /// The values it produces, or that an `unwind` aimed at the frame carries,
    /// are trimmed to the call's evaluation context.
    pub fn call<F>(&mut self, info: CallInfo, origin: Origin, body: F) -> Flow<Values>
    where
        F: FnOnce(&mut FrameStack) -> Flow<Values>,
    {
        self.enter(Scope::Call(info), origin, body)?
            .map_err(Unwind::Failure)
    }

    /// Runs `body` inside a guarded frame.
    ///
    /// A failure raised by the body is caught and returned as the inner
    /// `Err`. Transfers that do not target this frame keep propagating.
    pub fn guarded<F>(
        &mut self,
        info: GuardInfo,
        origin: Origin,
        body: F,
    ) -> Flow<Result<Values, ScopeError>>
    where
        F: FnOnce(&mut FrameStack) -> Flow<Values>,
    {
        self.enter(Scope::Guarded(info), origin, body)
    }

    fn enter<F>(&mut self, scope: Scope, origin: Origin, body: F) -> Flow<Result<Values, ScopeError>>
    where
        F: FnOnce(&mut FrameStack) -> Flow<Values>,
    {
        let id = self.push_frame(scope, origin, true);
        let outcome = body(self);
        let outcome = self.pop_above(id, outcome);

        let frame = self.take_top(id);
        let generation = frame.generation;
        let want = frame.scope.want();
        let catches_failures = frame.kind() == FrameKind::Guarded;
        let cleanup = self.run_deferred(frame);

        let deliver = |values: Values| match want {
            Some(want) => want.deliver(values),
            None => values,
        };
        let settled = match outcome {
            Ok(values) => Ok(Ok(deliver(values))),
            Err(Unwind::Transfer(transfer)) if transfer.target.generation() == generation => {
                debug!(context = %transfer.target, kind = ?transfer.kind, "Transfer reached its frame");
                Ok(Ok(deliver(transfer.values)))
            }
            Err(Unwind::Failure(error)) if catches_failures => {
                debug!(%error, "Guarded frame caught failure");
                Ok(Err(error))
            }
            Err(unwind) => Err(unwind),
        };

        match (cleanup, settled) {
            (Ok(()), settled) => settled,
            (Err(error), Err(Unwind::Failure(in_flight))) => {
                warn!(%error, "Deferred action failed while a failure was propagating");
                Err(Unwind::Failure(in_flight))
            }
            (Err(error), _) => Err(Unwind::Failure(error)),
        }
    }

    fn push_frame(&mut self, scope: Scope, origin: Origin, boundary: bool) -> FrameId {
        let id = FrameId::new(self.frames.len());
        let frame = Frame::new(next_generation(), scope, origin, boundary);
        trace!(%id, generation = frame.generation, kind = %frame.kind(), "Push");
        self.frames.push(frame);
        id
    }

    /// Removes the top frame, checking that it is the one the caller expects.
    fn take_top(&mut self, id: FrameId) -> Frame {
        assert!(id.depth() > 0, "The root frame cannot be popped");
        assert_eq!(
            id,
            self.current(),
            "Frame {id} popped while frame {} is on top",
            self.current()
        );
        // The root frame is never popped, so this always holds a frame.
        let frame = self.frames.pop().unwrap();
        trace!(%id, generation = frame.generation, "Pop");
        frame
    }

    /// Pops the frames a body left above `id` while a transfer or failure is
    /// propagating, innermost first, running their deferred actions.
    ///
    /// A normal result with frames left behind still trips the nesting check
    /// in `take_top`.
    pub(crate) fn pop_above<T>(&mut self, id: FrameId, outcome: Flow<T>) -> Flow<T> {
        if outcome.is_ok() {
            return outcome;
        }
        let mut first_error = None;
        while self.frames.len() > id.depth() + 1 {
            let frame = self.take_top(self.current());
            debug!(generation = frame.generation, "Popping frame left by an unwinding body");
            if let Err(error) = self.run_deferred(frame) {
                if first_error.is_none() {
                    first_error = Some(error);
                } else {
                    warn!(%error, "Suppressed failure of a later deferred action");
                }
            }
        }
        match (first_error, outcome) {
            (None, outcome) => outcome,
            (Some(error), Err(Unwind::Failure(in_flight))) => {
                warn!(%error, "Deferred action failed while a failure was propagating");
                Err(Unwind::Failure(in_flight))
            }
            (Some(error), _) => Err(Unwind::Failure(error)),
        }
    }

    /// Runs every deferred entry of a popped frame in registration order.
    ///
    /// A failing entry does not stop the remaining ones; the first failure is
    /// returned.
    fn run_deferred(&mut self, mut frame: Frame) -> Result<(), ScopeError> {
        let mut first_error = None;
        for deferred in std::mem::take(&mut frame.deferred) {
            if let Err(error) = deferred.run(self) {
                if first_error.is_none() {
                    first_error = Some(error);
                } else {
                    warn!(%error, "Suppressed failure of a later deferred action");
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    pub(crate) fn handle_at(&self, depth: usize) -> Handle {
        Handle::new(depth, self.frames[depth].generation)
    }

    pub(crate) fn frame(&self, h: Handle) -> Result<&Frame, ScopeError> {
        self.assert_valid(h)?;
        Ok(&self.frames[h.depth()])
    }

    pub(crate) fn frame_mut(&mut self, h: Handle) -> Result<&mut Frame, ScopeError> {
        self.assert_valid(h)?;
        Ok(&mut self.frames[h.depth()])
    }
}

impl Default for FrameStack {
    #[track_caller]
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FrameStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameStack")
            .field("frames", &self.frames)
            .field("detached", &self.detached.len())
            .finish()
    }
}

/// Tears the stack down as the thread would on exit: leftover frames pop
/// innermost first, then the root's actions run. Failures can only be logged.
impl Drop for FrameStack {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }
        while self.frames.len() > 1 {
            let frame = self.take_top(self.current());
            if let Err(error) = self.run_deferred(frame) {
                warn!(%error, "Deferred action failed during stack teardown");
            }
        }
        // Root actions may register further root actions.
        while !self.frames[0].deferred.is_empty() {
            for deferred in std::mem::take(&mut self.frames[0].deferred) {
                if let Err(error) = deferred.run(self) {
                    warn!(%error, "Root exit action failed during stack teardown");
                }
            }
        }
    }
}
