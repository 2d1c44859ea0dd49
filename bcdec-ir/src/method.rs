use serde::{Deserialize, Serialize};

use crate::op::Operation;
use crate::types::Type;

/// Debug-info hint naming a register over a pc range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalVar {
    pub reg: usize,
    pub name: String,
    pub ty: Type,
    /// First pc where the name is valid (the pc after the defining store).
    pub start_pc: usize,
    /// Exclusive end pc.
    pub end_pc: usize,
}

impl LocalVar {
    pub fn covers(&self, pc: usize) -> bool {
        self.start_pc <= pc && pc < self.end_pc
    }
}

/// One row of the exception table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionRange {
    pub start_pc: usize,
    /// Exclusive end pc.
    pub end_pc: usize,
    pub handler_pc: usize,
    /// `None` catches everything (`finally`).
    #[serde(default)]
    pub catch_type: Option<Type>,
}

/// Method metadata supplied by the reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodInfo {
    pub name: String,
    #[serde(default = "unknown_owner")]
    pub owner: Type,
    pub regs: usize,
    /// 0 means unbounded, used for register-machine input.
    #[serde(default)]
    pub max_stack: usize,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub params: Vec<Type>,
    #[serde(default = "void")]
    pub ret: Type,
    #[serde(default)]
    pub locals: Vec<LocalVar>,
}

fn unknown_owner() -> Type {
    Type::Object("Unknown".into())
}

fn void() -> Type {
    Type::Void
}

impl MethodInfo {
    pub fn new(name: &str, regs: usize, max_stack: usize) -> Self {
        MethodInfo {
            name: name.to_string(),
            owner: unknown_owner(),
            regs,
            max_stack,
            is_static: true,
            params: Vec::new(),
            ret: Type::Void,
            locals: Vec::new(),
        }
    }

    /// Register-machine methods have no operand stack limit and right-aligned parameters.
    pub fn is_register_machine(&self) -> bool {
        self.max_stack == 0
    }

    /// Debug name of `reg` at `pc`, if any.
    pub fn local_at(&self, reg: usize, pc: usize) -> Option<&LocalVar> {
        self.locals
            .iter()
            .find(|var| var.reg == reg && var.covers(pc))
    }

    /// Register holding each declared parameter, `this` excluded.
    pub fn param_regs(&self) -> Vec<usize> {
        let width: usize = self.params.iter().map(Type::slot_count).sum::<usize>()
            + usize::from(!self.is_static);
        let mut reg = if self.is_register_machine() {
            self.regs.saturating_sub(width)
        } else {
            0
        };
        if !self.is_static {
            reg += 1;
        }
        self.params
            .iter()
            .map(|t| {
                let r = reg;
                reg += t.slot_count();
                r
            })
            .collect()
    }

    /// Register holding `this`, if the method has one.
    pub fn this_reg(&self) -> Option<usize> {
        if self.is_static {
            return None;
        }
        if self.is_register_machine() {
            let width: usize = self.params.iter().map(Type::slot_count).sum::<usize>() + 1;
            Some(self.regs.saturating_sub(width))
        } else {
            Some(0)
        }
    }
}

/// Everything the core needs to decompile one method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodInput {
    pub info: MethodInfo,
    pub ops: Vec<Operation>,
    #[serde(default)]
    pub exceptions: Vec<ExceptionRange>,
}
