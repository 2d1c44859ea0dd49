use bcdec_ir::*;

/// A CFG with `n` single-op blocks at pcs 0..n; no edges.
fn blocks(n: usize) -> (Cfg, Vec<BbId>) {
    let ops = (0..n)
        .map(|pc| Operation::new(pc, Op::Swap).with_line(10 + pc as i32))
        .collect();
    let mut cfg = Cfg::new(MethodInfo::new("m", 1, 2), ops);
    let ids = (0..n)
        .map(|pc| {
            let bb = cfg.new_bb(pc);
            let op = cfg.ops[pc].clone();
            cfg.block_mut(bb).ops.push_back(op);
            bb
        })
        .collect();
    (cfg, ids)
}

fn kinds(cfg: &Cfg, bb: BbId) -> Vec<(usize, EdgeKind)> {
    cfg.outs(bb)
        .map(|e| (cfg.block(e.end).pc, e.kind.clone()))
        .collect()
}

#[test]
fn cond_edges_are_ordered_by_target_pc() {
    let (mut cfg, b) = blocks(3);
    cfg.set_conds(b[0], b[1], b[2]);
    assert_eq!(
        kinds(&cfg, b[0]),
        vec![(1, EdgeKind::CondTrue), (2, EdgeKind::CondFalse)]
    );
    let (mut cfg, b) = blocks(3);
    cfg.set_conds(b[0], b[2], b[1]);
    assert_eq!(
        kinds(&cfg, b[0]),
        vec![(1, EdgeKind::CondFalse), (2, EdgeKind::CondTrue)]
    );
    assert_eq!(cfg.true_succ(b[0]), Some(b[2]));
    assert_eq!(cfg.false_succ(b[0]), Some(b[1]));
}

#[test]
fn newer_edges_replace_stale_ones() {
    let (mut cfg, b) = blocks(4);
    cfg.set_succ(b[0], b[1]);
    cfg.set_succ(b[0], b[2]);
    assert_eq!(cfg.succs(b[0]), vec![b[2]]);
    assert!(cfg.preds(b[1]).is_empty());

    // a sequence edge next to cond edges is stale
    cfg.set_conds(b[0], b[3], b[1]);
    assert_eq!(cfg.sequence_out(b[0]).map(|e| e.id), None);
    assert_eq!(cfg.outs(b[0]).count(), 2);
}

#[test]
fn catch_edges_merge_per_handler() {
    let (mut cfg, b) = blocks(2);
    let io = Type::object("java.io.IOException");
    let first = cfg.add_catch(b[0], b[1], Some(io.clone()));
    let second = cfg.add_catch(b[0], b[1], None);
    let again = cfg.add_catch(b[0], b[1], Some(io.clone()));
    assert_eq!(first, second);
    assert_eq!(first, again);
    assert_eq!(cfg.edge(first).kind, EdgeKind::Catch(vec![Some(io), None]));
    assert!(cfg.is_catch_handler(b[1]));
}

#[test]
fn switch_default_edge() {
    let (mut cfg, b) = blocks(3);
    cfg.add_switch_case(b[0], b[1], vec![CaseValue::Int(1), CaseValue::Int(2)]);
    let default = cfg.add_switch_case(b[0], b[2], vec![CaseValue::Int(3), CaseValue::Default]);
    assert_eq!(cfg.switch_default_out(b[0]).map(|e| e.id), Some(default));
    assert!(cfg.outs(b[0]).all(Edge::is_switch_case));
}

#[test]
fn join_pred_moves_contents_to_the_front() {
    let (mut cfg, b) = blocks(3);
    cfg.set_succ(b[0], b[1]);
    cfg.set_succ(b[1], b[2]);
    cfg.block_mut(b[0]).stmts.push(Stmt::Comment("first".into()));
    cfg.block_mut(b[1]).stmts.push(Stmt::Comment("second".into()));

    cfg.join_pred_bb(b[1], b[0]);
    assert!(cfg.block(b[0]).is_removed());
    let joined = cfg.block(b[1]);
    assert_eq!(joined.pc, 0);
    assert_eq!(joined.line, 10);
    assert_eq!(joined.ops.iter().map(|op| op.pc).collect::<Vec<_>>(), vec![0, 1]);
    assert_eq!(
        joined.stmts,
        vec![Stmt::Comment("first".into()), Stmt::Comment("second".into())]
    );
    assert_eq!(cfg.start(), b[1]);
    assert_eq!(cfg.block_at(0), Some(b[1]));
    assert_eq!(cfg.block_count(), 2);
    assert_eq!(cfg.id_bound(), 3);
}

#[test]
fn split_pred_keeps_the_block_identity() {
    let ops = (0..3).map(|pc| Operation::new(pc, Op::Swap)).collect();
    let mut cfg = Cfg::new(MethodInfo::new("m", 1, 2), ops);
    let entry = cfg.new_bb(0);
    let bb = cfg.new_bb(1);
    cfg.set_succ(entry, bb);
    for pc in 1..3 {
        let op = cfg.ops[pc].clone();
        cfg.block_mut(bb).ops.push_back(op);
    }
    let pred = cfg.split_pred_bb(bb, 2);
    assert_eq!(cfg.block(pred).pc, 1);
    assert_eq!(cfg.block(bb).pc, 2);
    assert_eq!(cfg.succ(entry), Some(pred));
    assert_eq!(cfg.succ(pred), Some(bb));
    assert_eq!(cfg.block(bb).ops.len(), 1);
}

#[test]
fn unreachable_blocks_are_removed() {
    let (mut cfg, b) = blocks(4);
    cfg.set_succ(b[0], b[1]);
    cfg.set_succ(b[2], b[3]);
    assert_eq!(cfg.remove_unreachable(), 2);
    assert_eq!(cfg.block_count(), 2);
    assert!(cfg.preds(b[3]).is_empty());
    assert_eq!(cfg.block_at(2), None);
    assert_eq!(cfg.remove_unreachable(), 0);
}

/// 0 -> 1 -> 2 -> 1, 1 -> 3
fn looped() -> (Cfg, Vec<BbId>) {
    let (mut cfg, b) = blocks(4);
    cfg.set_succ(b[0], b[1]);
    cfg.set_conds(b[1], b[3], b[2]);
    cfg.set_succ(b[2], b[1]);
    cfg.calculate_postorder();
    (cfg, b)
}

#[test]
fn postorder_flags_back_edges() {
    let (cfg, b) = looped();
    assert_eq!(cfg.postorder(), [b[2], b[3], b[1], b[0]]);
    assert_eq!(cfg.reverse_postorder()[0], b[0]);
    let back: Vec<(BbId, BbId)> = cfg
        .blocks()
        .flat_map(|bb| cfg.outs(bb.id))
        .filter(|e| e.back)
        .map(|e| (e.start, e.end))
        .collect();
    assert_eq!(back, vec![(b[2], b[1])]);
    assert!(cfg.is_loop_head(b[1]));
    assert!(!cfg.is_loop_head(b[2]));
}

#[test]
fn dominators() {
    let (cfg, b) = looped();
    let idoms = cfg.immediate_dominators();
    assert_eq!(idoms[b[0]], Some(b[0]));
    assert_eq!(idoms[b[1]], Some(b[0]));
    assert_eq!(idoms[b[2]], Some(b[1]));
    assert_eq!(idoms[b[3]], Some(b[1]));
    assert!(cfg.dominates(&idoms, b[1], b[2]));
    assert!(!cfg.dominates(&idoms, b[2], b[3]));
    assert!(cfg.has_pred(b[2], b[0]));
    assert!(!cfg.has_pred(b[1], b[2]));
}

#[test]
fn positional_order_prefers_lines() {
    let (mut cfg, b) = blocks(3);
    assert!(cfg.is_before(b[0], Some(b[1])));
    assert!(cfg.is_before(b[2], None));
    // a block moved to an earlier line sorts first
    cfg.block_mut(b[2]).line = 1;
    assert!(cfg.is_before(b[2], Some(b[0])));
    assert!(!cfg.is_before(b[1], Some(b[2])));
}

#[test]
fn dot_output() {
    let (cfg, _) = looped();
    let dot = cfg.to_dot();
    assert!(dot.starts_with("digraph \"m\" {"));
    assert!(dot.contains("bb0 [label=\"BB0 (l10)\", style=bold];"));
    assert!(dot.contains("bb2 -> bb1 [label=\"\", style=dashed];"));
    assert!(dot.contains("bb1 -> bb3 [label=\"T\"];"));
}
