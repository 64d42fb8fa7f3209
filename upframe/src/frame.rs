//! Frame records and the descriptors captured when a frame is pushed.

use crate::deferred::Deferred;
use crate::value::Want;
use std::fmt;

/// Position of a frame in the stack, counted from the root (0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(usize);

impl FrameId {
    pub(crate) fn new(depth: usize) -> Self {
        Self(depth)
    }

    pub fn depth(&self) -> usize {
        self.0
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of scope a frame models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// Plain lexical block
    Block,
    /// Subroutine call
    Call,
    /// Exception-handling scope
    Guarded,
}

impl FrameKind {
    pub fn name(&self) -> &'static str {
        match self {
            FrameKind::Block => "block",
            FrameKind::Call => "call",
            FrameKind::Guarded => "guarded",
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a frame was entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub namespace: String,
    pub file: String,
    pub line: u32,
}

impl Origin {
    pub fn new(namespace: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        Self {
            namespace: namespace.into(),
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {} line {}", self.namespace, self.file, self.line)
    }
}

/// Captures the [`Origin`] of the invocation site.
#[macro_export]
macro_rules! origin {
    () => {
        $crate::Origin::new(module_path!(), file!(), line!())
    };
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockInfo {
    pub label: Option<String>,
    /// Set for scopes used purely for text substitution, which cannot be left
    /// with values.
    pub substitution: bool,
}

impl BlockInfo {
    pub fn substitution() -> Self {
        Self {
            label: None,
            substitution: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallInfo {
    /// Name of the routine being called
    pub routine: String,
    /// Whether a fresh argument list was bound for this call
    pub has_args: bool,
    /// What the caller expects back
    pub want: Want,
}

impl CallInfo {
    pub fn new(routine: impl Into<String>, want: Want) -> Self {
        Self {
            routine: routine.into(),
            has_args: true,
            want,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuardInfo {
    /// Text being evaluated, when the guarded scope compiles code at runtime
    pub source: Option<String>,
    /// Whether the scope was created by a module load
    pub module_load: bool,
    /// What the caller expects back
    pub want: Want,
}

impl GuardInfo {
    pub fn new(want: Want) -> Self {
        Self {
            want,
            ..Self::default()
        }
    }
}

/// Descriptor of the scope being entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Block(BlockInfo),
    Call(CallInfo),
    Guarded(GuardInfo),
}

impl Scope {
    pub fn kind(&self) -> FrameKind {
        match self {
            Scope::Block(_) => FrameKind::Block,
            Scope::Call(_) => FrameKind::Call,
            Scope::Guarded(_) => FrameKind::Guarded,
        }
    }

    /// Evaluation context of the frame's caller; blocks have none.
    pub fn want(&self) -> Option<Want> {
        match self {
            Scope::Block(_) => None,
            Scope::Call(info) => Some(info.want),
            Scope::Guarded(info) => Some(info.want),
        }
    }
}

/// One activation record owned by the frame stack.
pub(crate) struct Frame {
    pub(crate) generation: u64,
    pub(crate) scope: Scope,
    pub(crate) origin: Origin,
    /// Whether a scoped entry is waiting to consume transfers aimed at this
    /// frame. Frames pushed with the raw `push` have no such boundary.
    pub(crate) boundary: bool,
    pub(crate) deferred: Vec<Deferred>,
}

impl Frame {
    pub(crate) fn new(generation: u64, scope: Scope, origin: Origin, boundary: bool) -> Self {
        Self {
            generation,
            scope,
            origin,
            boundary,
            deferred: Vec::new(),
        }
    }

    pub(crate) fn kind(&self) -> FrameKind {
        self.scope.kind()
    }

    pub(crate) fn info(&self, depth: usize) -> FrameInfo {
        FrameInfo {
            id: FrameId::new(depth),
            generation: self.generation,
            scope: self.scope.clone(),
            origin: self.origin.clone(),
            pending: self.deferred.len(),
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("generation", &self.generation)
            .field("scope", &self.scope)
            .field("origin", &self.origin)
            .field("boundary", &self.boundary)
            .field("deferred", &self.deferred.len())
            .finish()
    }
}

/// Owned snapshot of a frame's descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameInfo {
    pub id: FrameId,
    pub generation: u64,
    pub scope: Scope,
    pub origin: Origin,
    /// Number of deferred actions registered so far
    pub pending: usize,
}

impl FrameInfo {
    pub fn kind(&self) -> FrameKind {
        self.scope.kind()
    }
}

impl fmt::Display for FrameInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.kind())?;
        match &self.scope {
            Scope::Block(BlockInfo {
                label: Some(label), ..
            }) => write!(f, " '{label}'")?,
            Scope::Block(_) => {}
            Scope::Call(info) => write!(f, " {} ({})", info.routine, info.want)?,
            Scope::Guarded(info) => write!(f, " ({})", info.want)?,
        }
        write!(f, " from {}", self.origin)
    }
}
