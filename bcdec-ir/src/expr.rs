use crate::op::CmpType;
use crate::types::Type;

/// Expression tree nodes for reconstructed code.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `null`
    Null,
    BoolLit(bool),
    /// `int`, `short`, `byte` literal.
    IntLit(i64),
    LongLit(i64),
    FloatLit(f64),
    DoubleLit(f64),
    /// UTF-16 code unit.
    CharLit(u16),
    StringLit(String),
    /// `T.class`
    ClassLit(Type),
    /// A named local or register.
    Var(String),
    /// `this`
    This,
    /// A type used as qualifier: static field, static call.
    TypeName(Type),
    /// Binary operation: `lhs op rhs`
    BinaryOp {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Prefix operation: `op expr`
    UnaryOp { op: UnOp, expr: Box<Expr> },
    /// `expr++` / `expr--`
    Postfix { op: PostOp, expr: Box<Expr> },
    /// `(ty) expr`
    Cast { ty: Type, expr: Box<Expr> },
    /// `expr instanceof ty`
    InstanceOf { expr: Box<Expr>, ty: Type },
    /// `object.name`, `object` is a `TypeName` for static fields.
    Field { object: Box<Expr>, name: String },
    /// `array[index]`
    ArrayAccess { array: Box<Expr>, index: Box<Expr> },
    /// `array.length`
    ArrayLength(Box<Expr>),
    /// `receiver.name(args...)`
    Call {
        receiver: Box<Expr>,
        name: String,
        args: Vec<Expr>,
    },
    /// `super.name(args...)`
    SuperCall { name: String, args: Vec<Expr> },
    /// `new ty(args...)`
    New { ty: Type, args: Vec<Expr> },
    /// `new ty[dims]...` or `new ty[] { init... }`, `ty` is the element type.
    NewArray {
        ty: Type,
        dims: Vec<Expr>,
        init: Option<Vec<Expr>>,
    },
    /// `cond ? then_expr : else_expr`
    Conditional {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    /// `target = value` or compound `target op= value`.
    Assign {
        target: Box<Expr>,
        op: Option<BinOp>,
        value: Box<Expr>,
    },
    /// Three-way compare of long/float/double; folded into a relation by a
    /// following conditional jump.
    Compare {
        t: Type,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Placeholder for something that could not be reconstructed.
    Unknown(String),
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
}

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnOp {
    Neg,
    Not,
    BitNot,
    PreInc,
    PreDec,
}

/// Postfix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostOp {
    Inc,
    Dec,
}

impl BinOp {
    pub fn from_cmp(cmp: CmpType) -> Self {
        match cmp {
            CmpType::Eq => BinOp::Eq,
            CmpType::Ne => BinOp::NotEq,
            CmpType::Lt => BinOp::Lt,
            CmpType::Ge => BinOp::Ge,
            CmpType::Gt => BinOp::Gt,
            CmpType::Le => BinOp::Le,
        }
    }

    pub fn is_relational(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::NotEq | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }

    /// Negated relation, `None` for non-relational operators.
    pub fn negate_relation(self) -> Option<BinOp> {
        Some(match self {
            BinOp::Eq => BinOp::NotEq,
            BinOp::NotEq => BinOp::Eq,
            BinOp::Lt => BinOp::Ge,
            BinOp::Ge => BinOp::Lt,
            BinOp::Gt => BinOp::Le,
            BinOp::Le => BinOp::Gt,
            _ => return None,
        })
    }

    /// Operators that have a compound assignment form.
    pub fn has_compound_form(self) -> bool {
        matches!(
            self,
            BinOp::Add
                | BinOp::Sub
                | BinOp::Mul
                | BinOp::Div
                | BinOp::Rem
                | BinOp::BitAnd
                | BinOp::BitOr
                | BinOp::BitXor
                | BinOp::Shl
                | BinOp::Shr
                | BinOp::UShr
        )
    }

    /// Java precedence, higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinOp::Or => 3,
            BinOp::And => 4,
            BinOp::BitOr => 5,
            BinOp::BitXor => 6,
            BinOp::BitAnd => 7,
            BinOp::Eq | BinOp::NotEq => 8,
            BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => 9,
            BinOp::Shl | BinOp::Shr | BinOp::UShr => 10,
            BinOp::Add | BinOp::Sub => 11,
            BinOp::Mul | BinOp::Div | BinOp::Rem => 12,
        }
    }
}

impl Expr {
    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var(name.into())
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::BinaryOp {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn unary(op: UnOp, expr: Expr) -> Self {
        Expr::UnaryOp {
            op,
            expr: Box::new(expr),
        }
    }

    pub fn assign(target: Expr, value: Expr) -> Self {
        Expr::Assign {
            target: Box::new(target),
            op: None,
            value: Box::new(value),
        }
    }

    pub fn conditional(cond: Expr, then_expr: Expr, else_expr: Expr) -> Self {
        Expr::Conditional {
            cond: Box::new(cond),
            then_expr: Box::new(then_expr),
            else_expr: Box::new(else_expr),
        }
    }

    /// Logical negation with simplification: `!!a` becomes `a`, relations
    /// flip, `&&`/`||` follow De Morgan.
    pub fn negate(self) -> Expr {
        match self {
            Expr::UnaryOp {
                op: UnOp::Not,
                expr,
            } => *expr,
            Expr::BoolLit(b) => Expr::BoolLit(!b),
            Expr::BinaryOp { op, lhs, rhs } => {
                if let Some(neg) = op.negate_relation() {
                    return Expr::BinaryOp { op: neg, lhs, rhs };
                }
                match op {
                    BinOp::And => Expr::binary(BinOp::Or, lhs.negate(), rhs.negate()),
                    BinOp::Or => Expr::binary(BinOp::And, lhs.negate(), rhs.negate()),
                    _ => Expr::unary(UnOp::Not, Expr::BinaryOp { op, lhs, rhs }),
                }
            }
            other => Expr::unary(UnOp::Not, other),
        }
    }

    /// Whether the expression certainly has boolean type.
    pub fn is_boolean(&self) -> bool {
        match self {
            Expr::BoolLit(_) | Expr::InstanceOf { .. } => true,
            Expr::BinaryOp { op, .. } => op.is_relational() || op.is_logical(),
            Expr::UnaryOp { op: UnOp::Not, .. } => true,
            Expr::Conditional {
                then_expr,
                else_expr,
                ..
            } => then_expr.is_boolean() && else_expr.is_boolean(),
            _ => false,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Expr::Null
                | Expr::BoolLit(_)
                | Expr::IntLit(_)
                | Expr::LongLit(_)
                | Expr::FloatLit(_)
                | Expr::DoubleLit(_)
                | Expr::CharLit(_)
                | Expr::StringLit(_)
                | Expr::ClassLit(_)
        )
    }

    /// Integer value of an integral literal.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Expr::IntLit(v) | Expr::LongLit(v) => Some(*v),
            Expr::CharLit(c) => Some(i64::from(*c)),
            _ => None,
        }
    }

    /// Java precedence of the expression's top node, higher binds tighter.
    pub fn precedence(&self) -> u8 {
        match self {
            Expr::Assign { .. } => 1,
            Expr::Conditional { .. } => 2,
            Expr::BinaryOp { op, .. } => op.precedence(),
            Expr::InstanceOf { .. } => 9,
            Expr::UnaryOp { .. } | Expr::Cast { .. } => 13,
            Expr::Postfix { .. } => 14,
            _ => 15,
        }
    }
}

impl std::fmt::Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Eq => "==",
            BinOp::NotEq => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::UShr => ">>>",
        };
        f.write_str(s)
    }
}

impl std::fmt::Display for UnOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UnOp::Neg => "-",
            UnOp::Not => "!",
            UnOp::BitNot => "~",
            UnOp::PreInc => "++",
            UnOp::PreDec => "--",
        };
        f.write_str(s)
    }
}

impl std::fmt::Display for PostOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            PostOp::Inc => "++",
            PostOp::Dec => "--",
        })
    }
}
