use crate::expr::Expr;
use crate::op::MonitorKind;
use crate::types::Type;

/// Statement nodes attached to basic blocks.
///
/// Control statements only carry their head expression; their bodies are the
/// CFG successors, grouped later by the structural analysis.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Expression statement: `expr;`
    Expr(Expr),
    /// Local declaration: `ty name = init;`
    Declare {
        ty: Type,
        name: String,
        init: Option<Expr>,
    },
    /// Return statement: `return expr;`
    Return(Option<Expr>),
    /// Throw statement: `throw expr;`
    Throw(Expr),
    /// Two-way branch on `cond`; true and false are the block's cond edges.
    If { cond: Expr },
    /// Multi-way branch; cases are the block's switch edges.
    Switch { discriminant: Expr },
    /// Monitor enter/exit, the marker of a synchronized region.
    Monitor { kind: MonitorKind, object: Expr },
    /// Explicit `super(args...)`.
    SuperInit { args: Vec<Expr> },
    /// A comment (for unreconstructed regions).
    Comment(String),
}

impl Stmt {
    pub fn is_if(&self) -> bool {
        matches!(self, Stmt::If { .. })
    }

    pub fn is_switch(&self) -> bool {
        matches!(self, Stmt::Switch { .. })
    }

    pub fn monitor_kind(&self) -> Option<MonitorKind> {
        match self {
            Stmt::Monitor { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}
