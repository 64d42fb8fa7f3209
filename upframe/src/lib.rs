//! Upframe: frame introspection and non-local control transfer.
//!
//! A [`FrameStack`] models the scopes active on one thread of control. Code
//! running inside a frame can capture a [`Handle`] to it (or to any ancestor),
//! walk to relatives, query what kind of scope a frame is, attach actions and
//! dynamic-state overlays to a frame's exit, and transfer control straight to
//! an ancestor:
//!
//! * [`FrameStack::unwind`] returns values from an enclosing call,
//! * [`FrameStack::leave`] exits an arbitrary enclosing frame with values,
//! * [`FrameStack::uplevel`] runs a callback as if it were the body of an
//!   enclosing call.
//!
//! Handles are generation-stamped. Once a frame pops, every handle to it is
//! permanently invalid and every operation on it fails with
//! [`ScopeError::ExpiredContext`].
//!
//! # Examples
//! ```
//! use upframe::{origin, values, BlockInfo, CallInfo, FrameStack, Value, Want};
//!
//! let mut stack = FrameStack::new();
//! let result = stack.call(CallInfo::new("main::lookup", Want::Scalar), origin!(), |stack| {
//!     stack.block(BlockInfo::default(), origin!(), |stack| {
//!         // Return straight out of `main::lookup`.
//!         stack.unwind(None, values![1, 2, 3])
//!     })?;
//!     Ok(values!["never reached"])
//! });
//! assert_eq!(result.unwrap().as_slice(), &[Value::Int(3)]);
//! ```

mod deferred;
mod error;
mod frame;
mod handle;
mod stack;
mod value;

pub use crate::deferred::{Container, ExitAction, VecSlot};
pub use crate::error::{Flow, ScopeError, Transfer, TransferKind, Unwind};
pub use crate::frame::{BlockInfo, CallInfo, FrameId, FrameInfo, FrameKind, GuardInfo, Origin, Scope};
pub use crate::handle::Handle;
pub use crate::stack::FrameStack;
pub use crate::value::{Value, Values, Want};
