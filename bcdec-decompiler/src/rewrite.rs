//! Graph rewrites that fold small diamond shapes back into expressions.
//!
//! Each rewrite returns `true` if it changed the graph; callers repeat until
//! nothing applies.

use bcdec_ir::{BbId, BinOp, Cfg, Expr, Literal, Op, Stmt, Type};

/// `cond ? a : b`: a cond head whose two arms each leave one value for `bb`.
pub fn rewrite_conditional(cfg: &mut Cfg, bb: BbId) -> bool {
    let preds = cfg.preds(bb);
    if preds.len() < 2 {
        return false;
    }
    let mut cond_head: Option<BbId> = None;
    for &pred in &preds {
        if cfg.succ(pred).is_none() {
            return false;
        }
        let pred_preds = cfg.preds(pred);
        if pred_preds.len() != 1 {
            return false;
        }
        let block = cfg.block(pred);
        if block.stack.len() != 1 || !block.stmts.is_empty() || !block.ops.is_empty() {
            return false;
        }
        let pred_pred = pred_preds[0];
        let lower = cond_head
            .is_none_or(|head| cfg.block(pred_pred).postorder < cfg.block(head).postorder);
        if lower {
            cond_head = Some(pred_pred);
        }
    }
    let Some(head) = cond_head else {
        return false;
    };
    if !cfg.is_cond(head) {
        return false;
    }
    let (Some(true_bb), Some(false_bb)) = (cfg.true_succ(head), cfg.false_succ(head)) else {
        return false;
    };
    if true_bb == false_bb || !preds.contains(&true_bb) || !preds.contains(&false_bb) {
        return false;
    }
    let Some(Stmt::If { cond }) = cfg.block(head).final_stmt().cloned() else {
        return false;
    };
    let (Some(then_value), Some(else_value)) = (
        cfg.block(true_bb).peek().map(|v| v.expr.clone()),
        cfg.block(false_bb).peek().map(|v| v.expr.clone()),
    ) else {
        return false;
    };

    let expr = match (&then_value, &else_value) {
        (Expr::BoolLit(true), Expr::BoolLit(false)) => cond,
        (Expr::BoolLit(false), Expr::BoolLit(true)) => cond.negate(),
        _ => cached_class_literal(&cond, &then_value, &else_value)
            .unwrap_or_else(|| Expr::conditional(cond, then_value, else_value)),
    };

    cfg.block_mut(head).stmts.pop();
    cfg.remove_bb(true_bb);
    cfg.remove_bb(false_bb);
    if cfg.preds(bb).is_empty() {
        // last arms: pull the head into bb
        cfg.join_pred_bb(bb, head);
        let value = cfg.new_value(expr);
        cfg.block_mut(bb).stack.push(value);
    } else {
        let value = cfg.new_value(expr);
        cfg.block_mut(head).stack.push(value);
        cfg.set_succ(head, bb);
    }
    true
}

/// `class$0 == null ? (class$0 = class$("T")) : class$0` becomes `T.class`.
fn cached_class_literal(cond: &Expr, then_value: &Expr, else_value: &Expr) -> Option<Expr> {
    let Expr::BinaryOp { op, rhs, .. } = cond else {
        return None;
    };
    if **rhs != Expr::Null {
        return None;
    }
    let assignment = match op {
        BinOp::Eq => then_value,
        BinOp::NotEq => else_value,
        _ => return None,
    };
    let Expr::Assign { value, .. } = assignment else {
        return None;
    };
    let Expr::Call { name, args, .. } = value.as_ref() else {
        return None;
    };
    match args.as_slice() {
        [Expr::StringLit(class)] if name == "class$" => Type::from_class_name(class).map(Expr::ClassLit),
        _ => None,
    }
}

/// Fuse a cond block into its single cond predecessor: `a && b`, `a || b`.
pub fn rewrite_short_circuit(cfg: &mut Cfg, bb: BbId) -> bool {
    let preds = cfg.preds(bb);
    let [pred] = preds.as_slice() else {
        return false;
    };
    let pred = *pred;
    {
        let block = cfg.block(bb);
        if block.stmts.len() != 1 || !block.ops.is_empty() || !block.stack.is_empty() {
            return false;
        }
    }
    if pred == bb || !cfg.is_cond(bb) || !cfg.is_cond(pred) {
        return false;
    }
    let (Some(t), Some(f)) = (cfg.true_succ(bb), cfg.false_succ(bb)) else {
        return false;
    };
    let (Some(pred_t), Some(pred_f)) = (cfg.true_succ(pred), cfg.false_succ(pred)) else {
        return false;
    };
    let (Some(Stmt::If { cond: a }), Some(Stmt::If { cond: b })) = (
        cfg.block(pred).final_stmt().cloned(),
        cfg.block(bb).final_stmt().cloned(),
    ) else {
        return false;
    };

    let fused = if pred_t == bb && pred_f != bb {
        if pred_f == t {
            Expr::binary(BinOp::Or, a.negate(), b)
        } else if pred_f == f {
            Expr::binary(BinOp::And, a, b)
        } else {
            return false;
        }
    } else if pred_f == bb && pred_t != bb {
        if pred_t == t {
            Expr::binary(BinOp::Or, a, b)
        } else if pred_t == f {
            Expr::binary(BinOp::And, a.negate(), b)
        } else {
            return false;
        }
    } else {
        return false;
    };

    if let Some(Stmt::If { cond }) = cfg.block_mut(pred).stmts.last_mut() {
        *cond = fused;
    }
    cfg.block_mut(bb).stmts.remove(0);
    cfg.join_pred_bb(bb, pred);
    true
}

/// The JDK 1.4 cached class literal:
///
/// ```text
/// GET class$0; DUP; JCND NE follow
/// POP; PUSH "T"; INVOKE class$; DUP; PUT class$0; (GOTO follow)
/// ```
///
/// `bb` is the second block, which fails to convert because its `POP` needs
/// the value left on the head's stack.
pub fn rewrite_cached_class_literal(cfg: &mut Cfg, bb: BbId) -> bool {
    let class = {
        let ops: Vec<&Op> = cfg.block(bb).ops.iter().map(|op| &op.op).collect();
        let ops = match ops.as_slice() {
            [rest @ .., Op::Goto { .. }] => rest.to_vec(),
            all => all.to_vec(),
        };
        match ops.as_slice() {
            [
                Op::Pop { .. },
                Op::Push {
                    value: Literal::String(class),
                    ..
                },
                Op::Invoke { .. },
                Op::Dup { .. },
                Op::Put { .. },
            ] => class.clone(),
            _ => return false,
        }
    };
    let Some(follow) = cfg.succ(bb) else {
        return false;
    };
    let preds = cfg.preds(bb);
    let [head] = preds.as_slice() else {
        return false;
    };
    let head = *head;
    if !cfg.is_cond(head) {
        return false;
    }
    let (t, f) = (cfg.true_succ(head), cfg.false_succ(head));
    let shaped = (f == Some(bb) && t == Some(follow)) || (t == Some(bb) && f == Some(follow));
    if !shaped || cfg.preds(follow).iter().any(|&p| p != head && p != bb) {
        return false;
    }
    let Some(literal) = Type::from_class_name(&class).map(Expr::ClassLit) else {
        return false;
    };

    let head_block = cfg.block_mut(head);
    head_block.stack.pop();
    head_block.stmts.pop();
    cfg.remove_bb(bb);
    cfg.join_pred_bb(follow, head);
    let value = cfg.new_value(literal);
    cfg.block_mut(follow).stack.push(value);
    true
}
