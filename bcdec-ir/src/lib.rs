//! Data model shared by the decompiler passes: operations, types, frames,
//! the CFG arena, expression and statement trees, and recovered structures.

pub mod cfg;
pub mod expr;
pub mod frame;
pub mod method;
pub mod op;
pub mod stmt;
pub mod structs;
pub mod types;

pub use cfg::{BasicBlock, BbId, CaseValue, Cfg, Edge, EdgeId, EdgeKind, StackValue};
pub use expr::{BinOp, Expr, PostOp, UnOp};
pub use frame::{Frame, FrameError, R, RKind, Sub};
pub use method::{ExceptionRange, LocalVar, MethodInfo, MethodInput};
pub use op::{CmpType, DupKind, Literal, MonitorKind, Op, Operation, PopKind};
pub use stmt::Stmt;
pub use structs::{CondKind, LoopKind, MemberKey, Struct, StructKind, SwitchCase, SwitchKind};
pub use types::{AccessFlags, FieldRef, MethodRef, Type};
