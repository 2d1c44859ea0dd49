//! Canonical operation model.
//!
//! Readers for concrete bytecode formats lower their instructions into this
//! closed set. Branch targets are operation indexes (pcs), never byte offsets.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{FieldRef, MethodRef, Type};

/// A constant operand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Class { class: Type },
    String(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => f.write_str("null"),
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Int(i) => write!(f, "{i}"),
            Literal::Float(v) => write!(f, "{v:?}"),
            Literal::Class { class } => write!(f, "{class}.class"),
            Literal::String(s) => write!(f, "{s:?}"),
        }
    }
}

/// Comparison used by conditional jumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CmpType {
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
}

impl CmpType {
    pub fn negate(self) -> Self {
        match self {
            CmpType::Eq => CmpType::Ne,
            CmpType::Ne => CmpType::Eq,
            CmpType::Lt => CmpType::Ge,
            CmpType::Ge => CmpType::Lt,
            CmpType::Gt => CmpType::Le,
            CmpType::Le => CmpType::Gt,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DupKind {
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Dup2X1,
    Dup2X2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PopKind {
    Pop,
    Pop2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MonitorKind {
    Enter,
    Exit,
}

/// Operation variants.
///
/// Stack sizes count values: a `long` is one stack value. The JVM's
/// slot-counting forms (`Dup2`, `Pop2`, ...) are rewritten to value form by
/// the dataflow analyzer once it knows which values are wide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum Op {
    Add { t: Type },
    Sub { t: Type },
    Mul { t: Type },
    Div { t: Type },
    Rem { t: Type },
    And { t: Type },
    Or { t: Type },
    Xor { t: Type },
    Shl { t: Type },
    Shr {
        t: Type,
        #[serde(default)]
        unsigned: bool,
    },
    Neg { t: Type },
    ArrayLoad { t: Type },
    ArrayStore { t: Type },
    ArrayLength,
    Cast { from: Type, to: Type },
    /// Three-way compare of long/float/double, pushes -1, 0 or 1.
    Cmp { t: Type },
    Dup { kind: DupKind },
    Pop { kind: PopKind },
    Swap,
    /// Fill the array on top of the stack with constants, leaves the array.
    FillArray { values: Vec<Literal> },
    Get { field: FieldRef },
    Put { field: FieldRef },
    Goto { target: usize },
    /// Increment a register in place.
    Inc { t: Type, reg: usize, value: i64 },
    InstanceOf { t: Type },
    Invoke {
        method: MethodRef,
        /// Non-virtual dispatch: constructors, private and super calls.
        #[serde(default)]
        direct: bool,
    },
    /// Compare two stack values and jump.
    Jcmp { t: Type, cmp: CmpType, target: usize },
    /// Compare one stack value against zero/null and jump.
    Jcnd { t: Type, cmp: CmpType, target: usize },
    Jsr { target: usize },
    Ret { reg: usize },
    Load { t: Type, reg: usize },
    Store { t: Type, reg: usize },
    Monitor { kind: MonitorKind },
    New { t: Type },
    /// Array creation, `t` is the element type of the created array.
    NewArray {
        t: Type,
        #[serde(default = "one")]
        dims: usize,
    },
    Push { t: Type, value: Literal },
    Return { t: Type },
    Switch {
        keys: Vec<i32>,
        targets: Vec<usize>,
        default_target: usize,
    },
    Throw,
}

fn one() -> usize {
    1
}

impl Op {
    /// Number of stack values consumed.
    pub fn in_stack_size(&self) -> usize {
        match self {
            Op::Add { .. }
            | Op::Sub { .. }
            | Op::Mul { .. }
            | Op::Div { .. }
            | Op::Rem { .. }
            | Op::And { .. }
            | Op::Or { .. }
            | Op::Xor { .. }
            | Op::Shl { .. }
            | Op::Shr { .. }
            | Op::Cmp { .. }
            | Op::ArrayLoad { .. }
            | Op::Jcmp { .. }
            | Op::Swap => 2,
            Op::Neg { .. }
            | Op::ArrayLength
            | Op::Cast { .. }
            | Op::FillArray { .. }
            | Op::InstanceOf { .. }
            | Op::Jcnd { .. }
            | Op::Store { .. }
            | Op::Monitor { .. }
            | Op::Switch { .. }
            | Op::Throw => 1,
            Op::ArrayStore { .. } => 3,
            Op::Dup { kind } => match kind {
                DupKind::Dup => 1,
                DupKind::DupX1 | DupKind::Dup2 => 2,
                DupKind::DupX2 | DupKind::Dup2X1 => 3,
                DupKind::Dup2X2 => 4,
            },
            Op::Pop { kind } => match kind {
                PopKind::Pop => 1,
                PopKind::Pop2 => 2,
            },
            Op::Get { field } => usize::from(!field.is_static()),
            Op::Put { field } => 1 + usize::from(!field.is_static()),
            Op::Invoke { method, .. } => method.params.len() + usize::from(!method.is_static()),
            Op::Return { t } => usize::from(*t != Type::Void),
            Op::NewArray { dims, .. } => *dims,
            Op::Goto { .. }
            | Op::Inc { .. }
            | Op::Jsr { .. }
            | Op::Ret { .. }
            | Op::Load { .. }
            | Op::New { .. }
            | Op::Push { .. } => 0,
        }
    }

    /// Number of stack values produced.
    pub fn out_stack_size(&self) -> usize {
        match self {
            Op::Add { .. }
            | Op::Sub { .. }
            | Op::Mul { .. }
            | Op::Div { .. }
            | Op::Rem { .. }
            | Op::And { .. }
            | Op::Or { .. }
            | Op::Xor { .. }
            | Op::Shl { .. }
            | Op::Shr { .. }
            | Op::Neg { .. }
            | Op::Cmp { .. }
            | Op::ArrayLoad { .. }
            | Op::ArrayLength
            | Op::Cast { .. }
            | Op::FillArray { .. }
            | Op::Get { .. }
            | Op::InstanceOf { .. }
            | Op::Jsr { .. }
            | Op::Load { .. }
            | Op::New { .. }
            | Op::NewArray { .. }
            | Op::Push { .. } => 1,
            Op::Swap => 2,
            Op::Dup { kind } => match kind {
                DupKind::Dup => 2,
                DupKind::DupX1 => 3,
                DupKind::DupX2 | DupKind::Dup2 => 4,
                DupKind::Dup2X1 => 5,
                DupKind::Dup2X2 => 6,
            },
            Op::Invoke { method, .. } => usize::from(!method.returns_void()),
            Op::ArrayStore { .. }
            | Op::Pop { .. }
            | Op::Put { .. }
            | Op::Goto { .. }
            | Op::Inc { .. }
            | Op::Jcmp { .. }
            | Op::Jcnd { .. }
            | Op::Ret { .. }
            | Op::Store { .. }
            | Op::Monitor { .. }
            | Op::Return { .. }
            | Op::Switch { .. }
            | Op::Throw => 0,
        }
    }

    /// Control never falls through to the next operation.
    pub fn ends_flow(&self) -> bool {
        matches!(
            self,
            Op::Goto { .. }
                | Op::Return { .. }
                | Op::Throw
                | Op::Switch { .. }
                | Op::Ret { .. }
                | Op::Jsr { .. }
        )
    }

    /// The operation ends a basic block.
    pub fn ends_block(&self) -> bool {
        self.ends_flow() || matches!(self, Op::Jcmp { .. } | Op::Jcnd { .. } | Op::Monitor { .. })
    }

    /// Explicit jump targets, in declaration order.
    pub fn targets(&self) -> Vec<usize> {
        match self {
            Op::Goto { target }
            | Op::Jcmp { target, .. }
            | Op::Jcnd { target, .. }
            | Op::Jsr { target } => vec![*target],
            Op::Switch {
                targets,
                default_target,
                ..
            } => {
                let mut all = targets.clone();
                all.push(*default_target);
                all
            }
            _ => Vec::new(),
        }
    }

    /// Upper-case mnemonic for listings.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Op::Add { .. } => "ADD",
            Op::Sub { .. } => "SUB",
            Op::Mul { .. } => "MUL",
            Op::Div { .. } => "DIV",
            Op::Rem { .. } => "REM",
            Op::And { .. } => "AND",
            Op::Or { .. } => "OR",
            Op::Xor { .. } => "XOR",
            Op::Shl { .. } => "SHL",
            Op::Shr { .. } => "SHR",
            Op::Neg { .. } => "NEG",
            Op::ArrayLoad { .. } => "ALOAD",
            Op::ArrayStore { .. } => "ASTORE",
            Op::ArrayLength => "ARRAYLENGTH",
            Op::Cast { .. } => "CAST",
            Op::Cmp { .. } => "CMP",
            Op::Dup { .. } => "DUP",
            Op::Pop { .. } => "POP",
            Op::Swap => "SWAP",
            Op::FillArray { .. } => "FILLARRAY",
            Op::Get { .. } => "GET",
            Op::Put { .. } => "PUT",
            Op::Goto { .. } => "GOTO",
            Op::Inc { .. } => "INC",
            Op::InstanceOf { .. } => "INSTANCEOF",
            Op::Invoke { .. } => "INVOKE",
            Op::Jcmp { .. } => "JCMP",
            Op::Jcnd { .. } => "JCND",
            Op::Jsr { .. } => "JSR",
            Op::Ret { .. } => "RET",
            Op::Load { .. } => "LOAD",
            Op::Store { .. } => "STORE",
            Op::Monitor { .. } => "MONITOR",
            Op::New { .. } => "NEW",
            Op::NewArray { .. } => "NEWARRAY",
            Op::Push { .. } => "PUSH",
            Op::Return { .. } => "RETURN",
            Op::Switch { .. } => "SWITCH",
            Op::Throw => "THROW",
        }
    }
}

/// One operation of a method, addressed by its index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub pc: usize,
    /// Raw opcode of the source format, informational only.
    #[serde(default)]
    pub opcode: u16,
    #[serde(default = "no_line")]
    pub line: i32,
    #[serde(flatten)]
    pub op: Op,
}

fn no_line() -> i32 {
    -1
}

impl Operation {
    pub fn new(pc: usize, op: Op) -> Self {
        Operation {
            pc,
            opcode: 0,
            line: -1,
            op,
        }
    }

    pub fn with_line(mut self, line: i32) -> Self {
        self.line = line;
        self
    }

    pub fn in_stack_size(&self) -> usize {
        self.op.in_stack_size()
    }

    pub fn out_stack_size(&self) -> usize {
        self.op.out_stack_size()
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>4}: {}", self.pc, self.op.mnemonic())?;
        match &self.op {
            Op::Add { t }
            | Op::Sub { t }
            | Op::Mul { t }
            | Op::Div { t }
            | Op::Rem { t }
            | Op::And { t }
            | Op::Or { t }
            | Op::Xor { t }
            | Op::Shl { t }
            | Op::Neg { t }
            | Op::ArrayLoad { t }
            | Op::ArrayStore { t }
            | Op::Cmp { t }
            | Op::InstanceOf { t }
            | Op::New { t }
            | Op::Return { t } => write!(f, " {t}"),
            Op::Shr { t, unsigned } => {
                write!(f, " {t}{}", if *unsigned { " unsigned" } else { "" })
            }
            Op::Cast { from, to } => write!(f, " {from} -> {to}"),
            Op::Dup { kind } => write!(f, " {kind:?}"),
            Op::Pop { kind } => write!(f, " {kind:?}"),
            Op::FillArray { values } => write!(f, " [{} values]", values.len()),
            Op::Get { field } | Op::Put { field } => {
                write!(f, " {}.{}: {}", field.owner, field.name, field.ty)
            }
            Op::Goto { target } | Op::Jsr { target } => write!(f, " {target}"),
            Op::Inc { reg, value, .. } => write!(f, " r{reg} {value:+}"),
            Op::Invoke { method, direct } => write!(
                f,
                " {}{}.{}({})",
                if *direct { "direct " } else { "" },
                method.owner,
                method.name,
                method.params.len()
            ),
            Op::Jcmp { t, cmp, target } | Op::Jcnd { t, cmp, target } => {
                write!(f, " {t} {cmp:?} {target}")
            }
            Op::Ret { reg } => write!(f, " r{reg}"),
            Op::Load { t, reg } | Op::Store { t, reg } => write!(f, " {t} r{reg}"),
            Op::Monitor { kind } => write!(f, " {kind:?}"),
            Op::NewArray { t, dims } => write!(f, " {t} dims={dims}"),
            Op::Push { t, value } => write!(f, " {t} {value}"),
            Op::Switch {
                keys,
                targets,
                default_target,
            } => {
                for (key, target) in keys.iter().zip(targets) {
                    write!(f, " {key}->{target}")?;
                }
                write!(f, " default->{default_target}")
            }
            Op::ArrayLength | Op::Swap | Op::Throw => Ok(()),
        }
    }
}
