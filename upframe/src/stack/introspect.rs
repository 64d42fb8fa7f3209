//! Handle capture, validity checks and read-only frame queries.

use super::FrameStack;
use crate::error::ScopeError;
use crate::frame::{FrameId, FrameInfo, FrameKind, Origin, Scope};
use crate::handle::Handle;
use crate::value::Want;

impl FrameStack {
    /// Captures a handle to the current top frame.
    pub fn capture(&self) -> Handle {
        self.handle_at(self.frames.len() - 1)
    }

    /// Captures a handle to the frame at `id`, if it is on the stack.
    pub fn handle_of(&self, id: FrameId) -> Option<Handle> {
        (id.depth() < self.frames.len()).then(|| self.handle_at(id.depth()))
    }

    /// Whether the frame referenced by `h` is still on the stack.
    pub fn is_valid(&self, h: Handle) -> bool {
        self.frames
            .get(h.depth())
            .is_some_and(|frame| frame.generation == h.generation())
    }

    /// Fails with [`ScopeError::ExpiredContext`] unless `h` is valid.
    pub fn assert_valid(&self, h: Handle) -> Result<(), ScopeError> {
        if self.is_valid(h) {
            return Ok(());
        }
        let hidden = self
            .detached
            .iter()
            .flatten()
            .any(|frame| frame.generation == h.generation());
        let reason = if hidden {
            "frame is hidden by an uplevel in progress"
        } else {
            "frame has already been popped"
        };
        Err(ScopeError::ExpiredContext {
            uid: h.uid(),
            reason,
        })
    }

    /// Whether the frame named by a uid string is still on the stack.
    pub fn validate_uid(&self, uid: &str) -> Result<bool, ScopeError> {
        let h: Handle = uid.parse()?;
        Ok(self.is_valid(h))
    }

    pub fn kind(&self, h: Handle) -> Result<FrameKind, ScopeError> {
        Ok(self.frame(h)?.kind())
    }

    pub fn origin(&self, h: Handle) -> Result<Origin, ScopeError> {
        Ok(self.frame(h)?.origin.clone())
    }

    /// Evaluation context recorded by a call or guarded frame.
    pub fn evaluation_context(&self, h: Handle) -> Result<Option<Want>, ScopeError> {
        Ok(self.frame(h)?.scope.want())
    }

    /// Name of the routine a call frame runs.
    pub fn routine(&self, h: Handle) -> Result<Option<String>, ScopeError> {
        Ok(match &self.frame(h)?.scope {
            Scope::Call(info) => Some(info.routine.clone()),
            _ => None,
        })
    }

    /// Whether a call frame bound a fresh argument list.
    pub fn has_args(&self, h: Handle) -> Result<Option<bool>, ScopeError> {
        Ok(match &self.frame(h)?.scope {
            Scope::Call(info) => Some(info.has_args),
            _ => None,
        })
    }

    /// Text compiled at runtime by a guarded frame.
    pub fn source_text(&self, h: Handle) -> Result<Option<String>, ScopeError> {
        Ok(match &self.frame(h)?.scope {
            Scope::Guarded(info) => info.source.clone(),
            _ => None,
        })
    }

    /// Whether a guarded frame was created by a module load.
    pub fn is_module_load(&self, h: Handle) -> Result<Option<bool>, ScopeError> {
        Ok(match &self.frame(h)?.scope {
            Scope::Guarded(info) => Some(info.module_load),
            _ => None,
        })
    }

    pub fn frame_info(&self, h: Handle) -> Result<FrameInfo, ScopeError> {
        Ok(self.frame(h)?.info(h.depth()))
    }

    /// Describes every visible frame, top first.
    pub fn backtrace(&self) -> Vec<FrameInfo> {
        self.frames
            .iter()
            .enumerate()
            .rev()
            .map(|(depth, frame)| frame.info(depth))
            .collect()
    }
}
