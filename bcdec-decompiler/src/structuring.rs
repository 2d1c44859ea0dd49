use std::collections::{HashSet, VecDeque};

use bcdec_ir::{
    BbId, Cfg, CondKind, EdgeId, LoopKind, MemberKey, MonitorKind, Stmt, Struct, StructKind,
    SwitchCase, SwitchKind,
};

use crate::error::Diagnostics;

/// Moves of switch cases to the end of the case order before giving up.
const MAX_CASE_DEFERRALS: usize = 10;

/// Recover loops, conditionals, switches and synchronized regions.
///
/// Blocks are visited in reverse postorder so that outer structs are found
/// before inner ones. Results replace `cfg.structs`.
pub fn analyze(cfg: &mut Cfg, diags: &mut Diagnostics) {
    cfg.structs.clear();
    let structs = {
        let mut ctx = StructCtx {
            cfg: &*cfg,
            diags,
            structs: Vec::new(),
        };
        ctx.check_reducible();
        ctx.transform();
        ctx.structs
    };
    log::debug!("{}: {} structs", cfg.info.name, structs.len());
    cfg.structs = structs;
}

struct StructCtx<'a> {
    cfg: &'a Cfg,
    diags: &'a mut Diagnostics,
    structs: Vec<Struct>,
}

impl StructCtx<'_> {
    fn transform(&mut self) {
        for bb in self.cfg.reverse_postorder() {
            if self.cfg.block(bb).is_removed() {
                continue;
            }
            if self.cfg.is_loop_head(bb) {
                let lp = self.create_loop(bb);
                let pre = lp.loop_kind().is_some_and(LoopKind::is_pre);
                self.add(lp);
                if pre {
                    continue;
                }
            }
            if self.cfg.is_sync_head(bb) {
                let sync = self.create_sync(bb);
                self.add(sync);
                continue;
            }
            if self.cfg.is_switch_head(bb) {
                let switch = self.create_switch(bb);
                self.add(switch);
                continue;
            }
            if self.cfg.is_cond(bb) {
                // condition already used as the post-test of a loop
                let is_loop_last = self.structs.iter().any(|s| {
                    s.loop_kind().is_some_and(LoopKind::is_post) && s.loop_last() == Some(bb)
                });
                if !is_loop_last {
                    if let Some(cond) = self.create_cond(bb) {
                        self.add(cond);
                    }
                }
            }
        }
    }

    /// Record a struct; its parent is the latest struct containing its head.
    fn add(&mut self, mut s: Struct) {
        s.parent = self.structs.iter().rposition(|p| p.is_member(s.head));
        self.structs.push(s);
    }

    fn warn(&mut self, bb: BbId, message: String) {
        let pc = self.cfg.block(bb).pc;
        self.diags.warning(&self.cfg.info.name, Some(pc), message);
    }

    /// Retreating edges whose target does not dominate their source.
    fn check_reducible(&mut self) {
        let idoms = self.cfg.immediate_dominators();
        let irreducible: Vec<(BbId, BbId)> = self
            .cfg
            .blocks()
            .flat_map(|bb| self.cfg.outs(bb.id))
            .filter(|e| e.back && !self.cfg.dominates(&idoms, e.end, e.start))
            .map(|e| (e.start, e.end))
            .collect();
        for (start, end) in irreducible {
            let message = format!(
                "irreducible loop: BB{} -> BB{}",
                self.cfg.block(start).pc,
                self.cfg.block(end).pc
            );
            self.warn(start, message);
        }
    }

    fn earliest(&self, bbs: &[BbId]) -> Option<BbId> {
        bbs.iter().fold(None, |best, &bb| {
            if self.cfg.is_before(bb, best) {
                Some(bb)
            } else {
                best
            }
        })
    }

    // === Conditionals ===

    fn create_cond(&mut self, head: BbId) -> Option<Struct> {
        let t = self.cfg.true_succ(head)?;
        let f = self.cfg.false_succ(head)?;
        let mut cond = Struct::new(head, StructKind::Cond(CondKind::If));

        // the second part handles iterations in a loop last
        let negated = self.cfg.is_before(f, Some(t)) || self.cfg.is_before(t, Some(head));
        let (first, second) = if negated { (f, t) } else { (t, f) };
        let (first_key, second_key) = (MemberKey::Branch(!negated), MemberKey::Branch(negated));

        let mut first_members = Vec::new();
        let mut first_follows = Vec::new();
        self.find_branch(head, first, &mut first_members, &mut first_follows);
        if first_follows.is_empty() || first_follows.contains(&second) {
            cond.kind = StructKind::Cond(if negated { CondKind::IfNot } else { CondKind::If });
            cond.follow = Some(second);
            cond.add_members(first_key, first_members);
            return Some(cond);
        }

        let mut second_members = Vec::new();
        let mut second_follows = Vec::new();
        self.find_branch(head, second, &mut second_members, &mut second_follows);
        if second_follows.is_empty() || second_follows.contains(&first) {
            cond.kind = StructKind::Cond(if negated { CondKind::If } else { CondKind::IfNot });
            cond.follow = Some(first);
            cond.add_members(second_key, second_members);
            return Some(cond);
        }

        let first_follow = self.earliest(&first_follows);
        let second_follow = self.earliest(&second_follows);
        if first_follow == second_follow {
            cond.kind = StructKind::Cond(if negated {
                CondKind::IfNotElse
            } else {
                CondKind::IfElse
            });
            cond.follow = first_follow;
            cond.add_members(first_key, first_members);
            cond.add_members(second_key, second_members);
            return Some(cond);
        }
        self.warn(head, "no common follow for conditional branches".into());
        Some(cond)
    }

    /// Collect the blocks reachable from `bb` whose forward predecessors are
    /// all inside the branch. A block with a predecessor outside becomes a
    /// potential follow instead.
    fn find_branch(&self, head: BbId, bb: BbId, members: &mut Vec<BbId>, follows: &mut Vec<BbId>) {
        if !members.contains(&bb) {
            let ins: Vec<(BbId, bool)> = self.cfg.ins(bb).map(|e| (e.start, e.back)).collect();
            if ins.len() > 1 {
                for (pred, back) in ins {
                    // incoming back edges: sub loop heads belong to the branch
                    if back || members.contains(&pred) {
                        continue;
                    }
                    if pred == head {
                        if members.is_empty() {
                            continue;
                        }
                    } else if !self.cfg.has_pred(pred, head) {
                        return;
                    }
                    if follows.contains(&bb) || self.cfg.is_catch_handler(bb) {
                        return;
                    }
                    follows.push(bb);
                    return;
                }
                follows.retain(|&f| f != bb);
            }
            members.push(bb);
        }
        let succs: Vec<BbId> = self
            .cfg
            .outs(bb)
            .filter(|e| !e.back)
            .map(|e| e.end)
            .collect();
        for succ in succs {
            if !members.contains(&succ) {
                self.find_branch(head, succ, members, follows);
            }
        }
    }

    // === Loops ===

    fn create_loop(&mut self, head: BbId) -> Struct {
        let mut lp = Struct::new(
            head,
            StructKind::Loop {
                kind: LoopKind::Endless,
                last: None,
            },
        );
        let mut traversed = vec![false; self.cfg.id_bound()];
        self.find_loop(&mut lp, head, &mut traversed);
        let last = lp.loop_last();

        let mut head_shape: Option<(LoopKind, BbId)> = None;
        if self.cfg.block(head).stmts.len() == 1 && self.cfg.is_cond(head) {
            if let (Some(t), Some(f)) = (self.cfg.true_succ(head), self.cfg.false_succ(head)) {
                if lp.is_member(t) && !lp.is_member(f) {
                    head_shape = Some((LoopKind::While, f));
                } else if lp.is_member(f) && !lp.is_member(t) {
                    head_shape = Some((LoopKind::WhileNot, t));
                }
            }
        }
        let mut last_shape: Option<(LoopKind, BbId)> = None;
        if let Some(last) = last.filter(|&last| self.cfg.is_cond(last)) {
            if let (Some(t), Some(f)) = (self.cfg.true_succ(last), self.cfg.false_succ(last)) {
                if t == head {
                    last_shape = Some((LoopKind::DoWhile, f));
                } else if f == head {
                    last_shape = Some((LoopKind::DoWhileNot, t));
                }
            }
        }

        let (kind, follow) = match (head_shape, last_shape) {
            (Some(shape), None) | (None, Some(shape)) => shape,
            (Some((head_kind, head_follow)), Some((last_kind, last_follow))) => {
                let mut members = Vec::new();
                let mut follows = Vec::new();
                self.find_branch(head, head_follow, &mut members, &mut follows);
                if follows.contains(&last_follow) {
                    (last_kind, last_follow)
                } else {
                    let mut members = Vec::new();
                    let mut follows = Vec::new();
                    self.find_branch(head, last_follow, &mut members, &mut follows);
                    if !follows.contains(&head_follow) {
                        self.warn(head, "ambiguous loop kind, choosing pre-test".into());
                    }
                    (head_kind, head_follow)
                }
            }
            (None, None) => {
                return lp;
            }
        };
        lp.kind = StructKind::Loop { kind, last };
        lp.follow = Some(follow);
        lp
    }

    /// DFS over forward non-catch edges. A block is a member if it reaches a
    /// member or branches back to the head.
    fn find_loop(&self, lp: &mut Struct, bb: BbId, traversed: &mut [bool]) -> bool {
        traversed[bb] = true;
        let mut loop_succ = false;
        let mut back_edge = false;
        let outs: Vec<(BbId, bool, bool)> = self
            .cfg
            .outs(bb)
            .map(|e| (e.end, e.back, e.is_catch()))
            .collect();
        for (succ, back, catch) in outs {
            if catch {
                continue;
            }
            if back {
                if succ == lp.head {
                    back_edge = true;
                }
                continue;
            }
            if lp.is_member(succ) {
                loop_succ = true;
                continue;
            }
            if !traversed[succ] && self.find_loop(lp, succ, traversed) {
                loop_succ = true;
            }
        }
        if !loop_succ && !back_edge {
            return false;
        }
        if bb != lp.head {
            lp.add_member(MemberKey::Body, bb);
        }
        if !loop_succ {
            // latest back-edge source is the loop last
            let later = lp
                .loop_last()
                .is_none_or(|last| self.cfg.is_before(last, Some(bb)));
            if later {
                if let StructKind::Loop { last, .. } = &mut lp.kind {
                    *last = Some(bb);
                }
            }
        }
        true
    }

    // === Switches ===

    fn create_switch(&mut self, head: BbId) -> Struct {
        let mut switch = Struct::new(
            head,
            StructKind::Switch {
                kind: SwitchKind::WithDefault,
                cases: Vec::new(),
            },
        );
        let mut case_outs: Vec<EdgeId> = self
            .cfg
            .outs(head)
            .filter(|e| e.is_switch_case())
            .map(|e| e.id)
            .collect();
        let size = case_outs.len();
        let mut follows: Vec<BbId> = Vec::new();
        let mut no_default_follow: Option<BbId> = None;
        let mut fall_into: HashSet<EdgeId> = HashSet::new();

        let mut deferrals = MAX_CASE_DEFERRALS;
        let mut i = 0;
        'cases: while i < size && deferrals > 0 {
            let case_out = case_outs[i];
            let edge = self.cfg.edge(case_out);
            let (case_bb, is_default) = (edge.end, edge.is_switch_default());
            let ins: Vec<(EdgeId, BbId, bool)> = self
                .cfg
                .ins(case_bb)
                .map(|e| (e.id, e.start, e.back))
                .collect();

            let mut is_fall_through = false;
            if ins.len() > 1 {
                // a fall-through target is entered from exactly one previous case
                let mut prev_case: Option<usize> = None;
                for (in_edge, in_bb, back) in ins {
                    if in_edge == case_out || back {
                        continue;
                    }
                    for j in (0..i).rev() {
                        if !switch.is_member_of(&MemberKey::Case(case_outs[j]), in_bb) {
                            continue;
                        }
                        if prev_case == Some(j) {
                            continue;
                        }
                        if prev_case.is_none() {
                            prev_case = Some(j);
                            continue;
                        }
                        // several previous cases: a real follow
                        if is_default {
                            no_default_follow = Some(case_bb);
                        }
                        i += 1;
                        continue 'cases;
                    }
                    if prev_case.is_none() {
                        if is_default {
                            no_default_follow = Some(case_bb);
                            i += 1;
                            continue 'cases;
                        }
                        // not a fall-through yet, maybe later
                        let deferred = case_outs.remove(i);
                        case_outs.push(deferred);
                        deferrals -= 1;
                        continue 'cases;
                    }
                }
                if let Some(prev) = prev_case {
                    if prev + 1 < i {
                        let moved = case_outs.remove(i);
                        case_outs.insert(prev + 1, moved);
                    }
                    if is_default && follows.len() == 1 && follows.contains(&case_bb) {
                        no_default_follow = Some(case_bb);
                        i += 1;
                        continue 'cases;
                    }
                    is_fall_through = true;
                }
            }

            let key = MemberKey::Case(case_out);
            let mut members = switch.members_of(&key).to_vec();
            if is_fall_through {
                follows.retain(|&f| f != case_bb);
                members.push(case_bb);
                fall_into.insert(case_out);
            }
            self.find_branch(head, case_bb, &mut members, &mut follows);
            *switch.members_mut(key) = members;
            i += 1;
        }

        let (kind, follow) = match no_default_follow {
            Some(follow) => (SwitchKind::NoDefault, Some(follow)),
            None => (SwitchKind::WithDefault, self.earliest(&follows)),
        };
        let cases = case_outs
            .iter()
            .enumerate()
            .map(|(k, &e)| SwitchCase {
                edge: e,
                values: self.cfg.edge(e).case_values().map(<[_]>::to_vec).unwrap_or_default(),
                fall_through: case_outs
                    .get(k + 1)
                    .is_some_and(|next| fall_into.contains(next)),
            })
            .collect();
        switch.kind = StructKind::Switch { kind, cases };
        switch.follow = follow;
        switch
    }

    // === Synchronized ===

    /// Explore from the block after the monitor enter, tracking the monitor
    /// depth, until the matching exits.
    fn create_sync(&mut self, head: BbId) -> Struct {
        let mut sync = Struct::new(head, StructKind::Sync);
        let mut follow: Option<BbId> = None;
        let mut visited = vec![false; self.cfg.id_bound()];
        let mut queue: VecDeque<(BbId, usize)> = VecDeque::new();
        if let Some(first) = self.cfg.succ(head) {
            queue.push_back((first, 1));
        }
        while let Some((bb, mut level)) = queue.pop_front() {
            if std::mem::replace(&mut visited[bb], true) {
                continue;
            }
            let mut exited = false;
            for stmt in &self.cfg.block(bb).stmts {
                match Stmt::monitor_kind(stmt) {
                    Some(MonitorKind::Enter) => level += 1,
                    Some(MonitorKind::Exit) => {
                        level = level.saturating_sub(1);
                        if level == 0 {
                            exited = true;
                            break;
                        }
                    }
                    None => {}
                }
            }
            if exited {
                if !self.cfg.is_catch_handler(bb) {
                    sync.add_member(MemberKey::Body, bb);
                    let succs: Vec<BbId> = self
                        .cfg
                        .outs(bb)
                        .filter(|e| !e.is_catch() && !e.back)
                        .map(|e| e.end)
                        .collect();
                    if let Some(succ) = self.earliest(&succs) {
                        if self.cfg.is_before(succ, follow) {
                            follow = Some(succ);
                        }
                    }
                }
                continue;
            }
            sync.add_member(MemberKey::Body, bb);
            for e in self.cfg.outs(bb) {
                if !e.back {
                    queue.push_back((e.end, level));
                }
            }
        }
        sync.follow = follow;
        sync
    }
}
