use std::collections::BTreeMap;

use bcdec_ir::{
    BbId, BinOp, Cfg, CmpType, DupKind, Expr, Literal, MethodRef, Op, Operation, PopKind, PostOp,
    StackValue, Stmt, Type, UnOp,
};

use crate::error::{DecompileError, Diagnostics, Result};
use crate::options::DecompileOptions;
use crate::rewrite;
use crate::switch_types;

/// Class-level knowledge the method body alone does not carry.
pub trait ClassResolver {
    /// Declaring type of the method, if it differs from the method info.
    fn declaring_type(&self) -> Option<Type> {
        None
    }

    /// Case index to enum constant map behind a `$SwitchMap$...` field or a
    /// `$SWITCH_TABLE$...` method of `owner`.
    fn enum_switch_map(
        &self,
        _owner: &Type,
        _member: &str,
        _enum_type: &Type,
    ) -> Option<BTreeMap<i32, String>> {
        None
    }
}

/// Resolver that knows nothing beyond the method itself.
pub struct NoResolver;

impl ClassResolver for NoResolver {}

/// Reconstruct statements and expressions for every block of the CFG.
///
/// Blocks are visited in reverse postorder. Before a block is converted,
/// conditional-expression diamonds feeding it are folded; after it,
/// short-circuit conditions ending in it are fused. A block whose operations
/// need more values than its own stack holds is left unreconstructed with an
/// error diagnostic.
pub fn reconstruct(
    cfg: &mut Cfg,
    resolver: &dyn ClassResolver,
    options: &DecompileOptions,
    diags: &mut Diagnostics,
) -> Result<()> {
    let declaring_type = resolver
        .declaring_type()
        .unwrap_or_else(|| cfg.info.owner.clone());
    let mut ctx = Reconstructor {
        cfg,
        resolver,
        options,
        diags,
        declaring_type,
    };
    ctx.run()
}

struct Reconstructor<'a> {
    cfg: &'a mut Cfg,
    resolver: &'a dyn ClassResolver,
    options: &'a DecompileOptions,
    diags: &'a mut Diagnostics,
    declaring_type: Type,
}

impl Reconstructor<'_> {
    fn run(&mut self) -> Result<()> {
        for bb in self.cfg.reverse_postorder() {
            if self.cfg.block(bb).is_removed() {
                continue;
            }
            self.repeat("conditional rewrite", bb, rewrite::rewrite_conditional)?;
            if !self.convert(bb) {
                if rewrite::rewrite_cached_class_literal(self.cfg, bb) {
                    continue;
                }
                let pc = self.cfg.block(bb).ops.front().map(|op| op.pc);
                self.diags.error(&self.cfg.info.name, pc, "stack underflow");
                self.cfg.block_mut(bb).unreconstructed = true;
            }
            self.repeat("short-circuit rewrite", bb, rewrite::rewrite_short_circuit)?;
        }
        self.cfg.calculate_postorder();
        Ok(())
    }

    fn repeat(&mut self, pass: &'static str, bb: BbId, rewrite: fn(&mut Cfg, BbId) -> bool) -> Result<()> {
        let limit = self.options.max_rewrite_iterations.max(self.cfg.block_count());
        let mut n = 0;
        while rewrite(self.cfg, bb) {
            n += 1;
            if n > limit {
                return Err(DecompileError::IterationLimit { pass, limit });
            }
        }
        Ok(())
    }

    /// Simulate the block's operations on its expression stack. Returns
    /// `false`, leaving the remaining operations in place, when an operation
    /// needs more values than the stack holds.
    fn convert(&mut self, bb: BbId) -> bool {
        self.enter_handler(bb);
        while let Some(operation) = self.cfg.block(bb).ops.front().cloned() {
            // Return addresses only exist in the dataflow frames.
            if self.is_return_address_op(&operation) {
                self.cfg.block_mut(bb).ops.pop_front();
                continue;
            }
            let depth = self.cfg.block(bb).stack.len();
            let (ins, outs) = (operation.in_stack_size(), operation.out_stack_size());
            if ins > depth {
                return false;
            }
            self.cfg.block_mut(bb).ops.pop_front();
            self.execute(bb, &operation);
            if self.cfg.block(bb).stack.len() + ins != depth + outs {
                let message = format!("stack balance violated by {}", operation.op.mnemonic());
                self.diags.error(&self.cfg.info.name, Some(operation.pc), message);
            }
        }
        true
    }

    /// A catch handler starts with the exception on the stack; its usual
    /// first operation stores it into the catch variable.
    fn enter_handler(&mut self, bb: BbId) {
        if !self.cfg.is_catch_handler(bb) || !self.cfg.block(bb).stack.is_empty() {
            return;
        }
        let Some(first) = self.cfg.block(bb).ops.front().cloned() else {
            return;
        };
        let exception = self.frame_top(first.pc).unwrap_or_else(Type::throwable);
        match first.op {
            Op::Store { reg, .. } => {
                let name = self.var_name(reg, first.pc + 1);
                self.cfg.block_mut(bb).ops.pop_front();
                self.stmt(
                    bb,
                    Stmt::Declare {
                        ty: exception,
                        name,
                        init: None,
                    },
                );
            }
            Op::Pop { .. } => {
                self.cfg.block_mut(bb).ops.pop_front();
            }
            _ => self.push(bb, Expr::var(format!("e{}", first.pc))),
        }
    }

    fn is_return_address_op(&self, operation: &Operation) -> bool {
        match operation.op {
            Op::Jsr { .. } => true,
            Op::Store { .. } | Op::Pop { .. } => {
                self.frame_top(operation.pc) == Some(Type::ReturnAddress)
            }
            _ => false,
        }
    }

    // === Stack helpers ===

    fn pop(&mut self, bb: BbId) -> StackValue {
        self.cfg
            .block_mut(bb)
            .stack
            .pop()
            .unwrap_or_else(|| StackValue {
                id: u32::MAX,
                expr: Expr::Unknown("underflow".into()),
            })
    }

    fn pop_expr(&mut self, bb: BbId) -> Expr {
        self.pop(bb).expr
    }

    fn push(&mut self, bb: BbId, expr: Expr) {
        let value = self.cfg.new_value(expr);
        self.cfg.block_mut(bb).stack.push(value);
    }

    fn peek_id(&self, bb: BbId) -> Option<u32> {
        self.cfg.block(bb).peek().map(|v| v.id)
    }

    fn stmt(&mut self, bb: BbId, stmt: Stmt) {
        self.cfg.block_mut(bb).stmts.push(stmt);
    }

    /// Type of the top stack value before the operation at `pc` runs.
    fn frame_top(&self, pc: usize) -> Option<Type> {
        self.cfg
            .frames
            .get(pc)
            .and_then(Option::as_ref)
            .and_then(|frame| frame.peek())
            .map(|r| r.t.clone())
    }

    fn var_name(&self, reg: usize, pc: usize) -> String {
        if let Some(local) = self.cfg.info.local_at(reg, pc) {
            return local.name.clone();
        }
        if self.cfg.info.this_reg() == Some(reg) {
            return "this".into();
        }
        format!("r{reg}")
    }

    fn reg_expr(&self, reg: usize, pc: usize) -> Expr {
        let name = self.var_name(reg, pc);
        if name == "this" && self.cfg.info.this_reg() == Some(reg) {
            Expr::This
        } else {
            Expr::Var(name)
        }
    }

    // === Operations ===

    fn execute(&mut self, bb: BbId, operation: &Operation) {
        let pc = operation.pc;
        match &operation.op {
            Op::Add { .. } => self.binary(bb, BinOp::Add),
            Op::Sub { .. } => self.binary(bb, BinOp::Sub),
            Op::Mul { .. } => self.binary(bb, BinOp::Mul),
            Op::Div { .. } => self.binary(bb, BinOp::Div),
            Op::Rem { .. } => self.binary(bb, BinOp::Rem),
            Op::And { .. } => self.binary(bb, BinOp::BitAnd),
            Op::Or { .. } => self.binary(bb, BinOp::BitOr),
            Op::Shl { .. } => self.binary(bb, BinOp::Shl),
            Op::Shr { unsigned, .. } => {
                self.binary(bb, if *unsigned { BinOp::UShr } else { BinOp::Shr })
            }
            Op::Xor { .. } => {
                let rhs = self.pop_expr(bb);
                let lhs = self.pop_expr(bb);
                let expr = if rhs.as_int() == Some(-1) {
                    Expr::unary(UnOp::BitNot, lhs)
                } else {
                    Expr::binary(BinOp::BitXor, lhs, rhs)
                };
                self.push(bb, expr);
            }
            Op::Neg { .. } => {
                let expr = self.pop_expr(bb);
                self.push(bb, Expr::unary(UnOp::Neg, expr));
            }
            Op::Cmp { t } => {
                let rhs = self.pop_expr(bb);
                let lhs = self.pop_expr(bb);
                self.push(
                    bb,
                    Expr::Compare {
                        t: t.clone(),
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                );
            }
            Op::ArrayLoad { .. } => {
                let index = self.pop_expr(bb);
                let array = self.pop_expr(bb);
                self.push(
                    bb,
                    Expr::ArrayAccess {
                        array: Box::new(array),
                        index: Box::new(index),
                    },
                );
            }
            Op::ArrayStore { .. } => {
                let value = self.pop(bb);
                let index = self.pop_expr(bb);
                let array = self.pop(bb);
                if self.store_into_new_array(bb, &array, &index, &value.expr) {
                    return;
                }
                let target = Expr::ArrayAccess {
                    array: Box::new(array.expr),
                    index: Box::new(index),
                };
                self.store_into(bb, target, value);
            }
            Op::ArrayLength => {
                let array = self.pop_expr(bb);
                self.push(bb, Expr::ArrayLength(Box::new(array)));
            }
            Op::Cast { to, .. } => {
                let expr = self.pop_expr(bb);
                self.push(
                    bb,
                    Expr::Cast {
                        ty: to.clone(),
                        expr: Box::new(expr),
                    },
                );
            }
            Op::InstanceOf { t } => {
                let expr = self.pop_expr(bb);
                self.push(
                    bb,
                    Expr::InstanceOf {
                        expr: Box::new(expr),
                        ty: t.clone(),
                    },
                );
            }
            Op::Dup { kind } => self.dup(bb, *kind),
            Op::Pop { kind } => {
                let top = self.pop_expr(bb);
                if *kind == PopKind::Pop2 {
                    let below = self.pop_expr(bb);
                    self.stmt(bb, Stmt::Expr(below));
                }
                self.stmt(bb, Stmt::Expr(top));
            }
            Op::Swap => {
                let stack = &mut self.cfg.block_mut(bb).stack;
                let len = stack.len();
                stack.swap(len - 2, len - 1);
            }
            Op::FillArray { values } => {
                let array = self.pop_expr(bb);
                let expr = match array {
                    Expr::NewArray { ty, dims, .. } => {
                        let init = values.iter().map(|v| literal(v, &ty)).collect();
                        Expr::NewArray {
                            ty,
                            dims,
                            init: Some(init),
                        }
                    }
                    other => other,
                };
                self.push(bb, expr);
            }
            Op::Get { field } => {
                let object = if field.is_static() {
                    Expr::TypeName(field.owner.clone())
                } else {
                    self.pop_expr(bb)
                };
                self.push(
                    bb,
                    Expr::Field {
                        object: Box::new(object),
                        name: field.name.clone(),
                    },
                );
            }
            Op::Put { field } => {
                let mut value = self.pop(bb);
                value.expr = coerce(value.expr, &field.ty);
                let object = if field.is_static() {
                    Expr::TypeName(field.owner.clone())
                } else {
                    self.pop_expr(bb)
                };
                let target = Expr::Field {
                    object: Box::new(object),
                    name: field.name.clone(),
                };
                self.store_into(bb, target, value);
            }
            Op::Goto { .. } | Op::Jsr { .. } | Op::Ret { .. } => {}
            Op::Inc { reg, value, .. } => self.inc(bb, *reg, *value, pc),
            Op::Invoke { method, direct } => self.invoke(bb, method, *direct),
            Op::Jcmp { cmp, .. } => {
                let rhs = self.pop_expr(bb);
                let lhs = self.pop_expr(bb);
                let cond = Expr::binary(BinOp::from_cmp(*cmp), lhs, rhs);
                self.stmt(bb, Stmt::If { cond });
            }
            Op::Jcnd { t, cmp, .. } => {
                let ty = self.frame_top(pc).unwrap_or_else(|| t.clone());
                let value = self.pop_expr(bb);
                let cond = jcnd_cond(value, &ty, *cmp);
                self.stmt(bb, Stmt::If { cond });
            }
            Op::Load { reg, .. } => {
                let expr = self.reg_expr(*reg, pc);
                self.push(bb, expr);
            }
            Op::Store { reg, .. } => self.store(bb, *reg, pc),
            Op::Monitor { kind } => {
                let object = self.pop_expr(bb);
                self.stmt(bb, Stmt::Monitor { kind: *kind, object });
            }
            Op::New { t } => self.push(
                bb,
                Expr::New {
                    ty: t.clone(),
                    args: Vec::new(),
                },
            ),
            Op::NewArray { t, dims } => {
                let mut sizes: Vec<Expr> = (0..*dims).map(|_| self.pop_expr(bb)).collect();
                sizes.reverse();
                self.push(
                    bb,
                    Expr::NewArray {
                        ty: t.clone(),
                        dims: sizes,
                        init: None,
                    },
                );
            }
            Op::Push { t, value } => {
                let ty = match self.frame_top(pc + 1) {
                    Some(out) if out != Type::Unknown => out,
                    _ => t.clone(),
                };
                self.push(bb, literal(value, &ty));
            }
            Op::Return { t } => {
                let value = if *t == Type::Void {
                    None
                } else {
                    let expr = self.pop_expr(bb);
                    Some(coerce(expr, &self.cfg.info.ret))
                };
                self.stmt(bb, Stmt::Return(value));
            }
            Op::Switch { .. } => self.switch(bb, pc),
            Op::Throw => {
                let expr = self.pop_expr(bb);
                self.stmt(bb, Stmt::Throw(expr));
            }
        }
    }

    fn binary(&mut self, bb: BbId, op: BinOp) {
        let rhs = self.pop_expr(bb);
        let lhs = self.pop_expr(bb);
        self.push(bb, Expr::binary(op, lhs, rhs));
    }

    /// Value-form dups: copy the top `n` values below the `n + skip` topmost.
    /// Copies keep the identity of their original.
    fn dup(&mut self, bb: BbId, kind: DupKind) {
        let (n, skip) = match kind {
            DupKind::Dup => (1, 0),
            DupKind::DupX1 => (1, 1),
            DupKind::DupX2 => (1, 2),
            DupKind::Dup2 => (2, 0),
            DupKind::Dup2X1 => (2, 1),
            DupKind::Dup2X2 => (2, 2),
        };
        let stack = &mut self.cfg.block_mut(bb).stack;
        let len = stack.len();
        let copies: Vec<StackValue> = stack[len - n..].to_vec();
        let at = len - n - skip;
        stack.splice(at..at, copies);
    }

    fn store(&mut self, bb: BbId, reg: usize, pc: usize) {
        let value = self.pop(bb);
        let inline = self.peek_id(bb) == Some(value.id);
        let local = self.cfg.info.local_at(reg, pc + 1).cloned();
        let name = self.var_name(reg, pc + 1);
        let init = match &local {
            Some(local) => coerce(value.expr, &local.ty),
            None => value.expr,
        };
        if inline {
            self.pop(bb);
            self.push(bb, Expr::assign(Expr::Var(name), init));
            return;
        }
        match local {
            Some(local) if local.start_pc == pc + 1 => self.stmt(
                bb,
                Stmt::Declare {
                    ty: local.ty,
                    name,
                    init: Some(init),
                },
            ),
            _ => {
                let target = if name == "this" { Expr::This } else { Expr::Var(name) };
                self.stmt(bb, Stmt::Expr(Expr::assign(target, init)));
            }
        }
    }

    /// Assignment to a field or array element: inline if the value's copy is
    /// still on the stack, postfix if the copy is the old value of the target.
    fn store_into(&mut self, bb: BbId, target: Expr, value: StackValue) {
        let peek = self.cfg.block(bb).peek().cloned();
        if let Some(peek) = &peek {
            if peek.id == value.id {
                self.pop(bb);
                let assign = self.assignment(target, value.expr);
                self.push(bb, assign);
                return;
            }
            if let Expr::BinaryOp { op, lhs, rhs } = &value.expr {
                let post = match op {
                    BinOp::Add => Some(PostOp::Inc),
                    BinOp::Sub => Some(PostOp::Dec),
                    _ => None,
                };
                if let Some(post) = post {
                    if rhs.as_int() == Some(1) && **lhs == peek.expr && **lhs == target {
                        if let Some(top) = self.cfg.block_mut(bb).stack.last_mut() {
                            top.expr = Expr::Postfix {
                                op: post,
                                expr: Box::new(target),
                            };
                        }
                        return;
                    }
                }
            }
        }
        let assign = self.assignment(target, value.expr);
        self.stmt(bb, Stmt::Expr(assign));
    }

    fn assignment(&self, target: Expr, value: Expr) -> Expr {
        if self.options.compound_assignments {
            if let Expr::BinaryOp { op, lhs, rhs } = &value {
                if op.has_compound_form() && **lhs == target {
                    return Expr::Assign {
                        target: Box::new(target),
                        op: Some(*op),
                        value: rhs.clone(),
                    };
                }
            }
        }
        Expr::assign(target, value)
    }

    /// `ASTORE` into a freshly created array whose `DUP` copy is still on
    /// the stack becomes part of the array initializer.
    fn store_into_new_array(
        &mut self,
        bb: BbId,
        array: &StackValue,
        index: &Expr,
        value: &Expr,
    ) -> bool {
        let Some(i) = index.as_int().and_then(|i| usize::try_from(i).ok()) else {
            return false;
        };
        let Expr::NewArray { ty, dims, init } = &array.expr else {
            return false;
        };
        let size = match (init, dims.as_slice()) {
            (Some(values), _) => values.len(),
            (None, [size]) => match size.as_int().and_then(|s| usize::try_from(s).ok()) {
                Some(size) => size,
                None => return false,
            },
            _ => return false,
        };
        if i >= size || size > MAX_INITIALIZER {
            return false;
        }
        let Some(slot) = self
            .cfg
            .block_mut(bb)
            .stack
            .iter_mut()
            .rev()
            .find(|v| v.id == array.id)
        else {
            return false;
        };
        let mut values = init.clone().unwrap_or_else(|| vec![default_value(ty); size]);
        values[i] = value.clone();
        slot.expr = Expr::NewArray {
            ty: ty.clone(),
            dims: dims.clone(),
            init: Some(values),
        };
        true
    }

    fn inc(&mut self, bb: BbId, reg: usize, value: i64, pc: usize) {
        let var = self.reg_expr(reg, pc);
        let top_is_var = self.cfg.block(bb).peek().is_some_and(|v| v.expr == var);
        if top_is_var && (value == 1 || value == -1) {
            if let Some(top) = self.cfg.block_mut(bb).stack.last_mut() {
                let op = if value == 1 { PostOp::Inc } else { PostOp::Dec };
                top.expr = Expr::Postfix {
                    op,
                    expr: Box::new(var),
                };
            }
            return;
        }
        let expr = match value {
            1 => Expr::unary(UnOp::PreInc, var),
            -1 => Expr::unary(UnOp::PreDec, var),
            v => {
                // i64::MIN has no positive counterpart
                let (op, amount) = match v.checked_neg() {
                    Some(neg) if v < 0 => (BinOp::Sub, neg),
                    _ => (BinOp::Add, v),
                };
                Expr::Assign {
                    target: Box::new(var),
                    op: Some(op),
                    value: Box::new(Expr::IntLit(amount)),
                }
            }
        };
        self.stmt(bb, Stmt::Expr(expr));
    }

    // === Calls ===

    fn invoke(&mut self, bb: BbId, method: &MethodRef, direct: bool) {
        let mut args: Vec<Expr> = method
            .params
            .iter()
            .rev()
            .map(|t| {
                let arg = self.pop_expr(bb);
                coerce(arg, t)
            })
            .collect();
        args.reverse();

        let call = if method.is_static() {
            Expr::Call {
                receiver: Box::new(Expr::TypeName(method.owner.clone())),
                name: method.name.clone(),
                args,
            }
        } else if direct {
            let object = self.pop(bb);
            if method.is_constructor() {
                self.construct(bb, object, args);
                return;
            }
            if object.expr == Expr::This && method.owner != self.declaring_type {
                Expr::SuperCall {
                    name: method.name.clone(),
                    args,
                }
            } else {
                Expr::Call {
                    receiver: Box::new(object.expr),
                    name: method.name.clone(),
                    args,
                }
            }
        } else {
            if method.name == "toString" && args.is_empty() && is_string_builder(&method.owner) {
                let concat = self.cfg.block(bb).peek().and_then(|v| string_concat(&v.expr));
                if let Some(concat) = concat {
                    self.pop(bb);
                    self.push(bb, concat);
                    return;
                }
            }
            let object = self.pop_expr(bb);
            Expr::Call {
                receiver: Box::new(object),
                name: method.name.clone(),
                args,
            }
        };
        if method.returns_void() {
            self.stmt(bb, Stmt::Expr(call));
        } else {
            self.push(bb, call);
        }
    }

    /// `<init>` on `this` is the super constructor call; on a `NEW` value it
    /// supplies the constructor arguments to the copy left by `DUP`.
    fn construct(&mut self, bb: BbId, object: StackValue, args: Vec<Expr>) {
        match object.expr {
            Expr::This => {
                if !args.is_empty() {
                    self.stmt(bb, Stmt::SuperInit { args });
                }
            }
            Expr::New { ty, .. } => {
                let created = Expr::New { ty, args };
                let mut found = false;
                for value in self.cfg.block_mut(bb).stack.iter_mut() {
                    if value.id == object.id {
                        value.expr = created.clone();
                        found = true;
                    }
                }
                if !found {
                    self.stmt(bb, Stmt::Expr(created));
                }
            }
            other => self.stmt(
                bb,
                Stmt::Expr(Expr::Call {
                    receiver: Box::new(other),
                    name: "<init>".into(),
                    args,
                }),
            ),
        }
    }

    fn switch(&mut self, bb: BbId, pc: usize) {
        let mut discriminant = self.pop_expr(bb);
        if self.options.string_switch {
            if let Some(reg) = switch_types::string_hash_reg(&self.cfg.ops, pc) {
                if let Expr::Call { receiver, .. } = &discriminant {
                    let string = receiver.as_ref().clone();
                    if switch_types::rewrite_string_switch(self.cfg, bb, reg) {
                        discriminant = string;
                    }
                }
            }
        }
        if self.options.enum_switch {
            if let Some(switch) = switch_types::match_enum_switch(&discriminant) {
                let enum_type = switch_types::ordinal_owner(&self.cfg.ops, pc);
                if let Some(enum_type) = enum_type {
                    if switch_types::rewrite_enum_switch(self.cfg, bb, &switch, &enum_type, self.resolver) {
                        discriminant = switch.value;
                    }
                }
            }
        }
        self.stmt(bb, Stmt::Switch { discriminant });
    }
}

const MAX_INITIALIZER: usize = 1 << 12;

fn jcnd_cond(value: Expr, ty: &Type, cmp: CmpType) -> Expr {
    let op = BinOp::from_cmp(cmp);
    match value {
        Expr::Compare { lhs, rhs, .. } => Expr::BinaryOp { op, lhs, rhs },
        value if ty.is_reference() => Expr::binary(op, value, Expr::Null),
        value if *ty == Type::Boolean || value.is_boolean() => match cmp {
            CmpType::Eq => value.negate(),
            CmpType::Ne => value,
            _ => Expr::binary(op, value, Expr::IntLit(0)),
        },
        value => Expr::binary(op, value, Expr::IntLit(0)),
    }
}

/// Literal expression for a pushed constant of type `t`.
fn literal(value: &Literal, t: &Type) -> Expr {
    match value {
        Literal::Null => Expr::Null,
        Literal::Bool(b) => Expr::BoolLit(*b),
        Literal::Int(i) => match t {
            Type::Boolean => Expr::BoolLit(*i != 0),
            Type::Char => u16::try_from(*i).map_or(Expr::IntLit(*i), Expr::CharLit),
            Type::Long => Expr::LongLit(*i),
            Type::Float => Expr::FloatLit(*i as f64),
            Type::Double => Expr::DoubleLit(*i as f64),
            _ => Expr::IntLit(*i),
        },
        Literal::Float(v) => {
            if *t == Type::Float {
                Expr::FloatLit(*v)
            } else {
                Expr::DoubleLit(*v)
            }
        }
        Literal::Class { class } => Expr::ClassLit(class.clone()),
        Literal::String(s) => Expr::StringLit(s.clone()),
    }
}

/// Retype an int literal flowing into a boolean or char slot.
fn coerce(expr: Expr, t: &Type) -> Expr {
    match (t, &expr) {
        (Type::Boolean, Expr::IntLit(0)) => Expr::BoolLit(false),
        (Type::Boolean, Expr::IntLit(1)) => Expr::BoolLit(true),
        (Type::Char, Expr::IntLit(c)) => u16::try_from(*c).map_or(expr.clone(), Expr::CharLit),
        _ => expr,
    }
}

fn default_value(t: &Type) -> Expr {
    match t {
        Type::Boolean => Expr::BoolLit(false),
        Type::Char => Expr::CharLit(0),
        Type::Long => Expr::LongLit(0),
        Type::Float => Expr::FloatLit(0.0),
        Type::Double => Expr::DoubleLit(0.0),
        Type::Byte | Type::Short | Type::Int => Expr::IntLit(0),
        _ => Expr::Null,
    }
}

fn is_string_builder(t: &Type) -> bool {
    t.is_object("java.lang.StringBuilder") || t.is_object("java.lang.StringBuffer")
}

/// `new StringBuilder(a).append(b).append(c)` as `a + b + c`.
fn string_concat(expr: &Expr) -> Option<Expr> {
    let mut parts = Vec::new();
    let mut cur = expr;
    loop {
        match cur {
            Expr::Call {
                receiver,
                name,
                args,
            } if name == "append" && args.len() == 1 => {
                parts.push(args[0].clone());
                cur = receiver;
            }
            Expr::New { ty, args } if is_string_builder(ty) && args.len() <= 1 => {
                parts.extend(args.iter().cloned());
                break;
            }
            _ => return None,
        }
    }
    parts.reverse();
    if !parts.iter().any(|p| matches!(p, Expr::StringLit(_))) {
        parts.insert(0, Expr::StringLit(String::new()));
    }
    parts
        .into_iter()
        .reduce(|acc, part| Expr::binary(BinOp::Add, acc, part))
}
