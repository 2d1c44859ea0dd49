use std::collections::BTreeSet;

use bcdec_ir::{BbId, CaseValue, Cfg, EdgeKind, MethodInput, Op, Sub};

use crate::error::{DecompileError, Result};

/// Out edge recorded during the scan and resolved once every block exists.
enum Link {
    Sequence(usize),
    Cond { target: usize, fall_through: usize },
    Switch { cases: Vec<(usize, CaseValue)> },
    Jsr(usize),
}

/// Build the CFG of a method: split the operations into basic blocks, add
/// typed edges and compute the postorder.
pub fn build(input: &MethodInput) -> Result<Cfg> {
    let ops = &input.ops;
    if ops.is_empty() {
        return Err(DecompileError::EmptyMethod);
    }
    let len = ops.len();
    validate(input)?;

    let mut cfg = Cfg::new(input.info.clone(), ops.clone());
    for (pc, op) in cfg.ops.iter_mut().enumerate() {
        op.pc = pc;
    }

    // Step 1: Known leaders. Forward jump targets are added while scanning.
    let mut leaders = BTreeSet::new();
    leaders.insert(0);
    for range in &input.exceptions {
        leaders.insert(range.start_pc);
        leaders.insert(range.handler_pc);
        if range.end_pc < len {
            leaders.insert(range.end_pc);
        }
    }

    // Step 2: Scan, opening a block at each leader. A backward target inside
    // an existing block splits it.
    let mut block_of: Vec<Option<BbId>> = vec![None; len];
    let mut links: Vec<(BbId, usize, Link)> = Vec::new();
    let mut current: Option<BbId> = None;
    for pc in 0..len {
        let bb = match current {
            Some(bb) if !leaders.contains(&pc) => bb,
            prev => {
                let bb = cfg.new_bb(pc);
                if let Some(prev) = prev {
                    links.push((prev, pc - 1, Link::Sequence(pc)));
                }
                bb
            }
        };
        let operation = cfg.ops[pc].clone();
        let op = operation.op.clone();
        cfg.block_mut(bb).ops.push_back(operation);
        block_of[pc] = Some(bb);

        for target in op.targets() {
            if target > pc {
                leaders.insert(target);
            } else if !leaders.contains(&target) {
                leaders.insert(target);
                split_at(&mut cfg, &mut block_of, target);
            }
        }

        let next = pc + 1;
        let link = match &op {
            Op::Goto { target } => Some(Link::Sequence(*target)),
            Op::Jcmp { target, .. } | Op::Jcnd { target, .. } => Some(Link::Cond {
                target: *target,
                fall_through: next,
            }),
            Op::Switch {
                keys,
                targets,
                default_target,
            } => {
                let mut cases: Vec<(usize, CaseValue)> = keys
                    .iter()
                    .zip(targets)
                    .map(|(key, target)| (*target, CaseValue::Int(*key)))
                    .collect();
                cases.push((*default_target, CaseValue::Default));
                Some(Link::Switch { cases })
            }
            Op::Jsr { target } => Some(Link::Jsr(*target)),
            Op::Monitor { .. } => Some(Link::Sequence(next)),
            _ => None,
        };
        if op.ends_block() {
            if next < len {
                leaders.insert(next);
            }
            if let Some(link) = link {
                links.push((bb, pc, link));
            }
            current = None;
        } else {
            current = Some(bb);
        }
    }
    if let Some(bb) = current {
        // Last operation falls off the end of the method.
        links.push((bb, len - 1, Link::Sequence(len)));
    }

    // Step 3: Resolve the recorded links.
    let resolve = |block_of: &[Option<BbId>], pc: usize, target: usize| {
        block_of
            .get(target)
            .copied()
            .flatten()
            .ok_or(DecompileError::UnresolvedTarget { pc, target })
    };
    for (bb, pc, link) in links {
        match link {
            Link::Sequence(target) => {
                let succ = resolve(&block_of, pc, target)?;
                cfg.set_succ(bb, succ);
            }
            Link::Cond {
                target,
                fall_through,
            } => {
                let true_bb = resolve(&block_of, pc, target)?;
                let false_bb = resolve(&block_of, pc, fall_through)?;
                cfg.set_conds(bb, true_bb, false_bb);
            }
            Link::Switch { mut cases } => {
                cases.sort_by_key(|(target, _)| *target);
                let mut grouped: Vec<(usize, Vec<CaseValue>)> = Vec::new();
                for (target, value) in cases {
                    match grouped.last_mut() {
                        Some((last, values)) if *last == target => values.push(value),
                        _ => grouped.push((target, vec![value])),
                    }
                }
                for (target, values) in grouped {
                    let succ = resolve(&block_of, pc, target)?;
                    cfg.add_switch_case(bb, succ, values);
                }
            }
            Link::Jsr(target) => {
                let succ = resolve(&block_of, pc, target)?;
                cfg.add_edge(bb, succ, EdgeKind::Jsr(Sub { pc: target }));
            }
        }
    }

    // Step 4: Catch edges from every block wholly inside a range.
    for range in &input.exceptions {
        let handler = resolve(&block_of, range.start_pc, range.handler_pc)?;
        let covered: Vec<BbId> = cfg
            .blocks()
            .filter(|bb| {
                let last = bb.ops.back().map_or(bb.pc, |op| op.pc);
                range.start_pc <= bb.pc && last < range.end_pc
            })
            .map(|bb| bb.id)
            .collect();
        for bb in covered {
            cfg.add_catch(bb, handler, range.catch_type.clone());
        }
    }

    let start = resolve(&block_of, 0, 0)?;
    cfg.set_start(start);
    cfg.calculate_postorder();
    log::debug!(
        "{}: built CFG with {} blocks",
        input.info.name,
        cfg.block_count()
    );
    Ok(cfg)
}

/// Make `pc` the first operation of a block. The block containing it keeps
/// its identity for the tail; the head moves to a new predecessor.
fn split_at(cfg: &mut Cfg, block_of: &mut [Option<BbId>], pc: usize) {
    let Some(bb) = block_of[pc] else {
        return;
    };
    if cfg.block(bb).pc == pc {
        return;
    }
    let pred = cfg.split_pred_bb(bb, pc);
    for op in &cfg.block(pred).ops {
        block_of[op.pc] = Some(pred);
    }
}

fn validate(input: &MethodInput) -> Result<()> {
    let len = input.ops.len();
    for (pc, op) in input.ops.iter().enumerate() {
        if let Some(&target) = op.op.targets().iter().find(|&&t| t >= len) {
            return Err(DecompileError::UnresolvedTarget { pc, target });
        }
    }
    for range in &input.exceptions {
        if range.start_pc >= range.end_pc || range.end_pc > len || range.handler_pc >= len {
            return Err(DecompileError::MalformedExceptionRange {
                start: range.start_pc,
                end: range.end_pc,
                handler: range.handler_pc,
            });
        }
    }
    Ok(())
}
