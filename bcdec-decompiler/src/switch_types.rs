//! Recovery of `switch` on strings and enums.
//!
//! Both forms compile to an integer switch: strings switch on `hashCode()`
//! with `equals` chains in the case blocks, enums index a synthetic
//! ordinal-to-case-index map. Recovery rewrites the case edges in place.

use std::collections::BTreeMap;

use bcdec_ir::{BbId, CaseValue, Cfg, CmpType, EdgeId, EdgeKind, Expr, Literal, Op, Operation, Type};

use crate::expr_recovery::ClassResolver;

/// Switch head of the hash form: `LOAD s; INVOKE String.hashCode(); SWITCH`.
/// Returns the string register.
pub fn string_hash_reg(ops: &[Operation], switch_pc: usize) -> Option<usize> {
    let invoke = ops.get(switch_pc.checked_sub(1)?)?;
    let load = ops.get(switch_pc.checked_sub(2)?)?;
    match (&invoke.op, &load.op) {
        (Op::Invoke { method, .. }, Op::Load { reg, .. })
            if method.name == "hashCode"
                && method.params.is_empty()
                && method.owner == Type::string() =>
        {
            Some(*reg)
        }
        _ => None,
    }
}

/// Rewrite a `switch (s.hashCode())` head to string cases. Case edges are
/// rebuilt in target pc order, the hash blocks become unreachable and are
/// removed. Returns `false` and leaves the graph alone if any case does not
/// match the `equals` chain shape.
pub fn rewrite_string_switch(cfg: &mut Cfg, head: BbId, string_reg: usize) -> bool {
    let Some(default_bb) = cfg.switch_default_out(head).map(|e| e.end) else {
        return false;
    };
    let default_end = relevant_end(cfg, default_bb);
    let cases: Vec<(BbId, Vec<CaseValue>)> = cfg
        .outs(head)
        .filter_map(|e| e.case_values().map(|values| (e.end, values.to_vec())))
        .collect();

    let mut string_to_bb: Vec<(String, BbId)> = Vec::new();
    for (target, values) in cases {
        for value in values {
            match value {
                CaseValue::Int(hash) => {
                    if !execute_hash_cond(cfg, target, string_reg, hash, default_end, &mut string_to_bb, 0) {
                        return false;
                    }
                }
                CaseValue::Default => {}
                CaseValue::Str(_) | CaseValue::Enum(_) => return false,
            }
        }
    }
    if string_to_bb.is_empty() {
        return false;
    }

    // unique case pc -> (target, values), pc sorted
    let mut by_pc: BTreeMap<usize, (BbId, Vec<CaseValue>)> = BTreeMap::new();
    for (s, bb) in string_to_bb {
        let pc = cfg.block(bb).pc;
        by_pc.entry(pc).or_insert_with(|| (bb, Vec::new())).1.push(CaseValue::Str(s));
    }
    let default_pc = cfg.block(default_bb).pc;
    by_pc
        .entry(default_pc)
        .or_insert_with(|| (default_bb, Vec::new()))
        .1
        .push(CaseValue::Default);

    let old: Vec<EdgeId> = cfg
        .outs(head)
        .filter(|e| e.is_switch_case())
        .map(|e| e.id)
        .collect();
    for (_, (target, values)) in by_pc {
        cfg.add_switch_case(head, target, values);
    }
    for e in old {
        cfg.remove_edge(e);
    }
    let removed = cfg.remove_unreachable();
    log::debug!(
        "{}: string switch at BB{} recovered, {removed} hash blocks removed",
        cfg.info.name,
        cfg.block(head).pc
    );
    true
}

enum Sim {
    Reg(usize),
    Lit(Literal),
    Equals(String),
}

/// Match one hash case block: `LOAD s; PUSH "lit"; INVOKE equals; JCND`,
/// following the chain of colliding hashes until the default is reached.
fn execute_hash_cond(
    cfg: &Cfg,
    bb: BbId,
    string_reg: usize,
    hash: i32,
    default_end: BbId,
    string_to_bb: &mut Vec<(String, BbId)>,
    depth: usize,
) -> bool {
    if depth > cfg.ops.len() {
        return false;
    }
    let mut stack: Vec<Sim> = Vec::new();
    for operation in &cfg.block(bb).ops {
        match &operation.op {
            Op::Load { reg, .. } => stack.push(Sim::Reg(*reg)),
            Op::Push { value, .. } => stack.push(Sim::Lit(value.clone())),
            Op::Invoke { method, .. } => {
                if method.name != "equals"
                    || method.params != [Type::object("java.lang.Object")]
                    || method.ret != Type::Boolean
                {
                    return false;
                }
                let Some(Sim::Lit(Literal::String(value))) = stack.pop() else {
                    return false;
                };
                if bcdec_ir::types::java_string_hash(&value) != hash {
                    return false;
                }
                match stack.pop() {
                    Some(Sim::Reg(reg)) if reg == string_reg => {}
                    _ => return false,
                }
                stack.push(Sim::Equals(value));
            }
            Op::Jcnd { cmp, .. } => {
                let Some(Sim::Equals(value)) = stack.pop() else {
                    return false;
                };
                // NE jumps when equal
                let when_equal = *cmp != CmpType::Eq;
                let (matched, other) = if when_equal {
                    (cfg.true_succ(bb), cfg.false_succ(bb))
                } else {
                    (cfg.false_succ(bb), cfg.true_succ(bb))
                };
                let (Some(matched), Some(other)) = (matched, other) else {
                    return false;
                };
                string_to_bb.push((value, matched));
                if relevant_end(cfg, other) == default_end {
                    return true;
                }
                return execute_hash_cond(
                    cfg,
                    other,
                    string_reg,
                    hash,
                    default_end,
                    string_to_bb,
                    depth + 1,
                );
            }
            _ => return false,
        }
    }
    false
}

/// Skip blocks that only jump on.
fn relevant_end(cfg: &Cfg, mut bb: BbId) -> BbId {
    for _ in 0..cfg.block_count() {
        let block = cfg.block(bb);
        let only_goto = block.stmts.is_empty()
            && block.ops.iter().all(|op| matches!(op.op, Op::Goto { .. }));
        match cfg.succ(bb) {
            Some(next) if only_goto && cfg.outs(bb).count() == 1 => bb = next,
            _ => break,
        }
    }
    bb
}

/// The pieces of `switch (Map[e.ordinal()])`.
pub struct EnumSwitch {
    /// Class holding the map field or table method.
    pub owner: Type,
    /// `$SwitchMap$...` field or `$SWITCH_TABLE$...` method name.
    pub member: String,
    /// The switched enum value.
    pub value: Expr,
}

/// Match the discriminant of an enum switch.
pub fn match_enum_switch(discriminant: &Expr) -> Option<EnumSwitch> {
    let Expr::ArrayAccess { array, index } = discriminant else {
        return None;
    };
    let Expr::Call {
        receiver,
        name,
        args,
    } = index.as_ref()
    else {
        return None;
    };
    if name != "ordinal" || !args.is_empty() {
        return None;
    }
    let (owner, member) = match array.as_ref() {
        Expr::Field { object, name } if name.starts_with("$SwitchMap$") => (object, name),
        Expr::Call {
            receiver: object,
            name,
            args,
        } if name.starts_with("$SWITCH_TABLE$") && args.is_empty() => (object, name),
        _ => return None,
    };
    let Expr::TypeName(owner) = owner.as_ref() else {
        return None;
    };
    Some(EnumSwitch {
        owner: owner.clone(),
        member: member.clone(),
        value: receiver.as_ref().clone(),
    })
}

/// Enum type whose `ordinal()` feeds the switch at `switch_pc`.
pub fn ordinal_owner(ops: &[Operation], switch_pc: usize) -> Option<Type> {
    ops[..switch_pc.min(ops.len())]
        .iter()
        .rev()
        .take(8)
        .find_map(|operation| match &operation.op {
            Op::Invoke { method, .. } if method.name == "ordinal" && method.params.is_empty() => {
                Some(method.owner.clone())
            }
            _ => None,
        })
}

/// Rewrite integer case values to enum constant names. All or nothing: if
/// any case index is missing from the map, nothing changes.
pub fn rewrite_enum_switch(
    cfg: &mut Cfg,
    head: BbId,
    switch: &EnumSwitch,
    enum_type: &Type,
    resolver: &dyn ClassResolver,
) -> bool {
    let Some(index_to_enum) = resolver.enum_switch_map(&switch.owner, &switch.member, enum_type)
    else {
        return false;
    };
    let cases: Vec<EdgeId> = cfg
        .outs(head)
        .filter(|e| e.is_switch_case())
        .map(|e| e.id)
        .collect();
    let complete = cases.iter().all(|&e| {
        cfg.edge(e).case_values().is_some_and(|values| {
            values.iter().all(|value| match value {
                CaseValue::Int(i) => index_to_enum.contains_key(i),
                _ => true,
            })
        })
    });
    if !complete {
        return false;
    }
    for e in cases {
        if let EdgeKind::SwitchCase(values) = cfg.edge_kind_mut(e) {
            for value in values.iter_mut() {
                if let CaseValue::Int(i) = value {
                    if let Some(name) = index_to_enum.get(i) {
                        *value = CaseValue::Enum(name.clone());
                    }
                }
            }
        }
    }
    true
}

/// Extract the case index to enum constant map from the operations of the
/// synthetic initializer that fills a switch map:
/// `GET E.X; INVOKE E.ordinal(); PUSH i; ASTORE`.
pub fn extract_index_to_enum(ops: &[Operation], enum_type: &Type) -> BTreeMap<i32, String> {
    let mut index_to_enum = BTreeMap::new();
    let mut i = 0;
    while i + 3 < ops.len() {
        if let (
            Op::Get { field },
            Op::Invoke { method, .. },
            Op::Push {
                value: Literal::Int(index),
                ..
            },
            Op::ArrayStore { .. },
        ) = (&ops[i].op, &ops[i + 1].op, &ops[i + 2].op, &ops[i + 3].op)
        {
            if field.ty == *enum_type
                && method.owner == *enum_type
                && method.name == "ordinal"
                && method.params.is_empty()
            {
                if let Ok(index) = i32::try_from(*index) {
                    index_to_enum.insert(index, field.name.clone());
                }
                i += 4;
                continue;
            }
        }
        i += 1;
    }
    index_to_enum
}
