//! Generation-stamped references to frames.
//!
//! A [`Handle`] pairs a frame's position in the stack with the generation it
//! received when it was pushed. Generations come from a process-wide counter
//! and are never reused, so a handle can only ever match the push that
//! produced it, the same way an arena detects use of a freed index.

use crate::error::ScopeError;
use crate::frame::FrameId;
use crate::value::Value;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global generation counter shared by every frame stack.
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Hands out the next unused generation.
pub(crate) fn next_generation() -> u64 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

/// Copyable reference to a frame.
///
/// Equality and hashing only look at the generation.
#[derive(Debug, Clone, Copy, Eq)]
pub struct Handle {
    depth: usize,
    generation: u64,
}

impl Handle {
    pub(crate) fn new(depth: usize, generation: u64) -> Self {
        Self { depth, generation }
    }

    /// Position of the referenced frame, counted from the root.
    pub fn frame_id(&self) -> FrameId {
        FrameId::new(self.depth)
    }

    pub(crate) fn depth(&self) -> usize {
        self.depth
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Textual identifier of the referenced frame, `"<depth>:<generation>"`.
    pub fn uid(&self) -> String {
        self.to_string()
    }

    /// Compares this handle with a dynamic value.
    ///
    /// # Returns
    /// * `Ok(bool)` - If `other` holds a handle
    /// * `Err(ScopeError::InvalidComparison)` - If `other` holds anything else
    pub fn equals(&self, other: &Value) -> Result<bool, ScopeError> {
        match other {
            Value::Context(h) => Ok(self == h),
            _ => Err(ScopeError::InvalidComparison {
                found: other.type_name(),
            }),
        }
    }
}

impl PartialEq for Handle {
    fn eq(&self, other: &Self) -> bool {
        self.generation == other.generation
    }
}

impl Hash for Handle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.generation.hash(state);
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.depth, self.generation)
    }
}

impl FromStr for Handle {
    type Err = ScopeError;

    fn from_str(uid: &str) -> Result<Self, Self::Err> {
        let malformed = || ScopeError::MalformedUid(uid.to_string());
        let (depth, generation) = uid.split_once(':').ok_or_else(malformed)?;
        let depth = depth.parse().map_err(|_| malformed())?;
        let generation = generation.parse().map_err(|_| malformed())?;
        Ok(Handle::new(depth, generation))
    }
}
