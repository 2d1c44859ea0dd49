//! Symbolic register/stack frames for the dataflow analysis.

use std::fmt;
use std::sync::Arc;

use crate::types::Type;

/// Origin of a symbolic value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RKind {
    /// Defined by the operation at `pc`.
    Const,
    /// Join of differing values arriving at `pc`.
    Merge,
    MethodParam,
    /// Return address pushed by a JSR.
    Subroutine,
}

/// A symbolic value in one register or stack slot.
///
/// Identity is `(pc, slot, kind)`: two values are the same value exactly when
/// they were defined at the same point.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct R {
    pub pc: usize,
    /// Register index, or `regs + depth` for stack slots.
    pub slot: usize,
    pub t: Type,
    pub kind: RKind,
}

impl R {
    pub fn new(pc: usize, slot: usize, t: Type, kind: RKind) -> Self {
        R { pc, slot, t, kind }
    }

    pub fn param(reg: usize, t: Type) -> Self {
        R::new(0, reg, t, RKind::MethodParam)
    }

    pub fn is_merge(&self) -> bool {
        self.kind == RKind::Merge
    }

    /// Merge with a value arriving from another predecessor. Monotone: once a
    /// slot is a merge value it stays one, only its type widens.
    fn merged(&self, other: &R, pc: usize, slot: usize) -> R {
        if self == other {
            return self.clone();
        }
        R::new(pc, slot, self.t.join(&other.t), RKind::Merge)
    }
}

impl fmt::Display for R {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.kind {
            RKind::Const => "c",
            RKind::Merge => "m",
            RKind::MethodParam => "p",
            RKind::Subroutine => "s",
        };
        write!(f, "{}:{tag}{}", self.t, self.pc)
    }
}

/// A subroutine entered through JSR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sub {
    /// Entry pc of the subroutine.
    pub pc: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("operand stack underflow")]
    Underflow,
    #[error("operand stack overflow (max {0})")]
    Overflow(usize),
    #[error("register r{0} out of range")]
    InvalidRegister(usize),
    #[error("stack depth mismatch at join ({0} vs {1})")]
    DepthMismatch(usize, usize),
}

pub type Result<T> = std::result::Result<T, FrameError>;

/// Registers plus operand stack at one pc.
///
/// Clones share storage; mutation copies on write, so frames stored per pc
/// are never changed through another handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    regs: Arc<Vec<Option<R>>>,
    stack: Arc<Vec<R>>,
    subs: Arc<Vec<Sub>>,
    max_stack: usize,
}

impl Frame {
    /// Empty frame; `max_stack == 0` leaves the stack unbounded.
    pub fn new(regs: usize, max_stack: usize) -> Self {
        Frame {
            regs: Arc::new(vec![None; regs]),
            stack: Arc::new(Vec::new()),
            subs: Arc::new(Vec::new()),
            max_stack,
        }
    }

    pub fn regs_len(&self) -> usize {
        self.regs.len()
    }

    pub fn max_stack(&self) -> usize {
        self.max_stack
    }

    pub fn reg(&self, reg: usize) -> Option<&R> {
        self.regs.get(reg).and_then(Option::as_ref)
    }

    pub fn set_reg(&mut self, reg: usize, value: Option<R>) -> Result<()> {
        if reg >= self.regs.len() {
            return Err(FrameError::InvalidRegister(reg));
        }
        Arc::make_mut(&mut self.regs)[reg] = value;
        Ok(())
    }

    pub fn stack_size(&self) -> usize {
        self.stack.len()
    }

    pub fn stack(&self) -> &[R] {
        &self.stack
    }

    /// Slot index the next pushed value will occupy.
    pub fn next_slot(&self) -> usize {
        self.regs.len() + self.stack.len()
    }

    pub fn push(&mut self, value: R) -> Result<()> {
        if self.max_stack != 0 && self.stack.len() >= self.max_stack {
            return Err(FrameError::Overflow(self.max_stack));
        }
        Arc::make_mut(&mut self.stack).push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<R> {
        if self.stack.is_empty() {
            return Err(FrameError::Underflow);
        }
        Arc::make_mut(&mut self.stack)
            .pop()
            .ok_or(FrameError::Underflow)
    }

    pub fn peek(&self) -> Option<&R> {
        self.stack.last()
    }

    /// Value `depth` entries below the top, `peek_at(0) == peek()`.
    pub fn peek_at(&self, depth: usize) -> Option<&R> {
        self.stack.len().checked_sub(depth + 1).map(|i| &self.stack[i])
    }

    pub fn clear_stack(&mut self) {
        if !self.stack.is_empty() {
            self.stack = Arc::new(Vec::new());
        }
    }

    pub fn subs(&self) -> &[Sub] {
        &self.subs
    }

    pub fn push_sub(&mut self, sub: Sub) {
        Arc::make_mut(&mut self.subs).push(sub);
    }

    pub fn pop_sub(&mut self) -> Option<Sub> {
        if self.subs.is_empty() {
            return None;
        }
        Arc::make_mut(&mut self.subs).pop()
    }

    /// Frame seen by a call site after the subroutine returns.
    ///
    /// `self` is the frame at the RET, `entry` the subroutine's input frame and
    /// `call` the frame before the JSR. Registers still holding their entry
    /// value were not written by the subroutine and keep the call site's value.
    pub fn returned_to(&self, entry: &Frame, call: &Frame) -> Frame {
        let regs = self
            .regs
            .iter()
            .enumerate()
            .map(|(reg, value)| {
                if value.as_ref() == entry.reg(reg) {
                    call.reg(reg).cloned()
                } else {
                    value.clone()
                }
            })
            .collect();
        Frame {
            regs: Arc::new(regs),
            stack: Arc::clone(&self.stack),
            subs: Arc::clone(&call.subs),
            max_stack: self.max_stack,
        }
    }

    /// Join this frame with one from another predecessor of `pc`.
    pub fn merge(&self, other: &Frame, pc: usize) -> Result<Frame> {
        if self.stack.len() != other.stack.len() {
            return Err(FrameError::DepthMismatch(
                self.stack.len(),
                other.stack.len(),
            ));
        }
        if self == other {
            return Ok(self.clone());
        }
        let regs = self
            .regs
            .iter()
            .zip(other.regs.iter())
            .enumerate()
            .map(|(slot, pair)| match pair {
                (Some(a), Some(b)) => Some(a.merged(b, pc, slot)),
                _ => None,
            })
            .collect();
        let base = self.regs.len();
        let stack = self
            .stack
            .iter()
            .zip(other.stack.iter())
            .enumerate()
            .map(|(depth, (a, b))| a.merged(b, pc, base + depth))
            .collect();
        let subs = self
            .subs
            .iter()
            .zip(other.subs.iter())
            .take_while(|(a, b)| a == b)
            .map(|(a, _)| *a)
            .collect();
        Ok(Frame {
            regs: Arc::new(regs),
            stack: Arc::new(stack),
            subs: Arc::new(subs),
            max_stack: self.max_stack,
        })
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, reg) in self.regs.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match reg {
                Some(r) => write!(f, "{r}")?,
                None => f.write_str("-")?,
            }
        }
        f.write_str("] {")?;
        for (i, value) in self.stack.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str("}")?;
        if !self.subs.is_empty() {
            write!(f, " subs={:?}", self.subs.iter().map(|s| s.pc).collect::<Vec<_>>())?;
        }
        Ok(())
    }
}
