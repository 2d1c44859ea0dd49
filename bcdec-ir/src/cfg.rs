use std::collections::VecDeque;
use std::fmt::Write;

use crate::expr::Expr;
use crate::frame::{Frame, Sub};
use crate::method::MethodInfo;
use crate::op::{MonitorKind, Operation};
use crate::stmt::Stmt;
use crate::structs::Struct;
use crate::types::Type;

/// Index of a basic block within the CFG arena. Stable for the life of the CFG.
pub type BbId = usize;

/// Index of an edge within the CFG arena.
pub type EdgeId = usize;

/// One value of a switch case edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CaseValue {
    Int(i32),
    /// Recovered string switch label.
    Str(String),
    /// Recovered enum switch label (constant name).
    Enum(String),
    Default,
}

/// Edge types.
///
/// Back edges are not a separate kind: any edge may be flagged `back` by the
/// last postorder computation.
#[derive(Debug, Clone, PartialEq)]
pub enum EdgeKind {
    Sequence,
    CondTrue,
    CondFalse,
    /// Case values leading to the same target; a `CaseValue::Default` entry
    /// makes this the switch default edge.
    SwitchCase(Vec<CaseValue>),
    /// Caught types, `None` is catch-all.
    Catch(Vec<Option<Type>>),
    Jsr(Sub),
    Ret(Sub),
}

/// A directed, typed edge between two blocks.
#[derive(Debug, Clone)]
pub struct Edge {
    pub id: EdgeId,
    pub start: BbId,
    pub end: BbId,
    pub kind: EdgeKind,
    /// Target was on the DFS path when this edge was visited.
    pub back: bool,
    removed: bool,
}

impl Edge {
    pub fn is_removed(&self) -> bool {
        self.removed
    }

    pub fn is_sequence(&self) -> bool {
        self.kind == EdgeKind::Sequence
    }

    pub fn is_cond(&self) -> bool {
        matches!(self.kind, EdgeKind::CondTrue | EdgeKind::CondFalse)
    }

    pub fn is_catch(&self) -> bool {
        matches!(self.kind, EdgeKind::Catch(_))
    }

    pub fn is_switch_case(&self) -> bool {
        matches!(self.kind, EdgeKind::SwitchCase(_))
    }

    pub fn is_switch_default(&self) -> bool {
        matches!(&self.kind, EdgeKind::SwitchCase(values) if values.contains(&CaseValue::Default))
    }

    pub fn case_values(&self) -> Option<&[CaseValue]> {
        match &self.kind {
            EdgeKind::SwitchCase(values) => Some(values),
            _ => None,
        }
    }
}

/// An entry of a block-local expression stack.
///
/// `id` identifies the pushed value: copies made by DUP share the id, which
/// lets stores recognize inline assignments.
#[derive(Debug, Clone, PartialEq)]
pub struct StackValue {
    pub id: u32,
    pub expr: Expr,
}

/// A basic block: a maximal sequence of operations with one entry and one exit.
#[derive(Debug, Clone)]
pub struct BasicBlock {
    /// Arena index.
    pub id: BbId,
    /// Pc of the first operation, the block's identity while it is live.
    pub pc: usize,
    /// Source line of the first operation, or -1.
    pub line: i32,
    /// Operations not yet reconstructed.
    pub ops: VecDeque<Operation>,
    /// Reconstructed statements.
    pub stmts: Vec<Stmt>,
    /// Block-local expression stack.
    pub stack: Vec<StackValue>,
    /// Postorder number from the last traversal.
    pub postorder: usize,
    pub ins: Vec<EdgeId>,
    pub outs: Vec<EdgeId>,
    /// Reconstruction stopped early in this block.
    pub unreconstructed: bool,
    removed: bool,
}

impl BasicBlock {
    pub fn is_removed(&self) -> bool {
        self.removed
    }

    pub fn final_stmt(&self) -> Option<&Stmt> {
        self.stmts.last()
    }

    pub fn peek(&self) -> Option<&StackValue> {
        self.stack.last()
    }
}

/// Control flow graph for a single method.
#[derive(Debug, Clone)]
pub struct Cfg {
    pub info: MethodInfo,
    /// The method's operations, indexed by pc.
    pub ops: Vec<Operation>,
    /// Input frame per pc, filled by the dataflow analysis.
    pub frames: Vec<Option<Frame>>,
    /// Structures found by the last structural analysis.
    pub structs: Vec<Struct>,
    blocks: Vec<BasicBlock>,
    edges: Vec<Edge>,
    start: BbId,
    postorder: Vec<BbId>,
    next_value: u32,
}

impl Cfg {
    pub fn new(info: MethodInfo, ops: Vec<Operation>) -> Self {
        let frames = vec![None; ops.len()];
        Cfg {
            info,
            ops,
            frames,
            structs: Vec::new(),
            blocks: Vec::new(),
            edges: Vec::new(),
            start: 0,
            postorder: Vec::new(),
            next_value: 0,
        }
    }

    /// Create an empty block starting at `pc`.
    pub fn new_bb(&mut self, pc: usize) -> BbId {
        let id = self.blocks.len();
        let line = self.ops.get(pc).map_or(-1, |op| op.line);
        self.blocks.push(BasicBlock {
            id,
            pc,
            line,
            ops: VecDeque::new(),
            stmts: Vec::new(),
            stack: Vec::new(),
            postorder: 0,
            ins: Vec::new(),
            outs: Vec::new(),
            unreconstructed: false,
            removed: false,
        });
        id
    }

    pub fn block(&self, id: BbId) -> &BasicBlock {
        &self.blocks[id]
    }

    pub fn block_mut(&mut self, id: BbId) -> &mut BasicBlock {
        &mut self.blocks[id]
    }

    /// Live blocks in arena order.
    pub fn blocks(&self) -> impl Iterator<Item = &BasicBlock> {
        self.blocks.iter().filter(|bb| !bb.removed)
    }

    pub fn block_count(&self) -> usize {
        self.blocks().count()
    }

    /// Number of block ids handed out, removed blocks included.
    pub fn id_bound(&self) -> usize {
        self.blocks.len()
    }

    /// Live block starting at `pc`.
    pub fn block_at(&self, pc: usize) -> Option<BbId> {
        self.blocks().find(|bb| bb.pc == pc).map(|bb| bb.id)
    }

    pub fn start(&self) -> BbId {
        self.start
    }

    pub fn set_start(&mut self, bb: BbId) {
        self.start = bb;
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id]
    }

    /// Payload of an edge; endpoints are changed only through the graph operations.
    pub fn edge_kind_mut(&mut self, id: EdgeId) -> &mut EdgeKind {
        &mut self.edges[id].kind
    }

    /// Live outgoing edges in order.
    pub fn outs(&self, bb: BbId) -> impl Iterator<Item = &Edge> {
        self.blocks[bb].outs.iter().map(|&e| &self.edges[e])
    }

    /// Live incoming edges in order.
    pub fn ins(&self, bb: BbId) -> impl Iterator<Item = &Edge> {
        self.blocks[bb].ins.iter().map(|&e| &self.edges[e])
    }

    /// Start block of every incoming edge.
    pub fn preds(&self, bb: BbId) -> Vec<BbId> {
        self.ins(bb).map(|e| e.start).collect()
    }

    /// End block of every outgoing edge.
    pub fn succs(&self, bb: BbId) -> Vec<BbId> {
        self.outs(bb).map(|e| e.end).collect()
    }

    pub fn sequence_out(&self, bb: BbId) -> Option<&Edge> {
        self.outs(bb).find(|e| e.is_sequence())
    }

    /// Sequence successor.
    pub fn succ(&self, bb: BbId) -> Option<BbId> {
        self.sequence_out(bb).map(|e| e.end)
    }

    pub fn true_out(&self, bb: BbId) -> Option<&Edge> {
        self.outs(bb).find(|e| e.kind == EdgeKind::CondTrue)
    }

    pub fn false_out(&self, bb: BbId) -> Option<&Edge> {
        self.outs(bb).find(|e| e.kind == EdgeKind::CondFalse)
    }

    pub fn true_succ(&self, bb: BbId) -> Option<BbId> {
        self.true_out(bb).map(|e| e.end)
    }

    pub fn false_succ(&self, bb: BbId) -> Option<BbId> {
        self.false_out(bb).map(|e| e.end)
    }

    pub fn switch_default_out(&self, bb: BbId) -> Option<&Edge> {
        self.outs(bb).find(|e| e.is_switch_default())
    }

    /// Allocate a fresh block-stack value.
    pub fn new_value(&mut self, expr: Expr) -> StackValue {
        let id = self.next_value;
        self.next_value += 1;
        StackValue { id, expr }
    }

    // === Edge insertion ===

    pub fn add_edge(&mut self, start: BbId, end: BbId, kind: EdgeKind) -> EdgeId {
        let id = self.edges.len();
        self.edges.push(Edge {
            id,
            start,
            end,
            kind,
            back: false,
            removed: false,
        });
        self.blocks[start].outs.push(id);
        self.blocks[end].ins.push(id);
        id
    }

    /// Set the sequence successor, replacing an existing one.
    pub fn set_succ(&mut self, bb: BbId, succ: BbId) -> EdgeId {
        let e = self.add_edge(bb, succ, EdgeKind::Sequence);
        self.cleanup_outs(bb);
        e
    }

    /// Set both conditional successors. The edge to the lower pc comes first.
    pub fn set_conds(&mut self, bb: BbId, true_bb: BbId, false_bb: BbId) {
        if self.blocks[false_bb].pc <= self.blocks[true_bb].pc {
            self.add_edge(bb, false_bb, EdgeKind::CondFalse);
            self.add_edge(bb, true_bb, EdgeKind::CondTrue);
        } else {
            self.add_edge(bb, true_bb, EdgeKind::CondTrue);
            self.add_edge(bb, false_bb, EdgeKind::CondFalse);
        }
        self.cleanup_outs(bb);
    }

    pub fn add_switch_case(&mut self, bb: BbId, target: BbId, values: Vec<CaseValue>) -> EdgeId {
        self.add_edge(bb, target, EdgeKind::SwitchCase(values))
    }

    /// Add a catch edge, merging into an existing one to the same handler.
    pub fn add_catch(&mut self, bb: BbId, handler: BbId, catch_type: Option<Type>) -> EdgeId {
        let existing = self.blocks[bb]
            .outs
            .iter()
            .copied()
            .find(|&e| self.edges[e].end == handler && self.edges[e].is_catch());
        if let Some(e) = existing {
            if let EdgeKind::Catch(types) = &mut self.edges[e].kind {
                if !types.contains(&catch_type) {
                    types.push(catch_type);
                }
            }
            return e;
        }
        self.add_edge(bb, handler, EdgeKind::Catch(vec![catch_type]))
    }

    /// Keep at most one sequence edge and one edge of each cond kind; the most
    /// recently added edge of a kind wins.
    pub fn cleanup_outs(&mut self, bb: BbId) {
        let mut has_seq = false;
        let mut has_true = false;
        let mut has_false = false;
        let outs = self.blocks[bb].outs.clone();
        for &e in outs.iter().rev() {
            let stale = match self.edges[e].kind {
                EdgeKind::Sequence => {
                    let stale = has_seq || has_true || has_false;
                    has_seq = true;
                    stale
                }
                EdgeKind::CondTrue => std::mem::replace(&mut has_true, true),
                EdgeKind::CondFalse => std::mem::replace(&mut has_false, true),
                _ => false,
            };
            if stale {
                self.remove_edge(e);
            }
        }
    }

    // === Removal ===

    /// Detach an edge from both endpoints.
    pub fn remove_edge(&mut self, e: EdgeId) {
        if self.edges[e].removed {
            return;
        }
        let (start, end) = (self.edges[e].start, self.edges[e].end);
        self.blocks[start].outs.retain(|&o| o != e);
        self.blocks[end].ins.retain(|&i| i != e);
        self.edges[e].removed = true;
    }

    /// Tombstone a block and detach all its edges.
    pub fn remove_bb(&mut self, bb: BbId) {
        let edges: Vec<EdgeId> = self.blocks[bb]
            .ins
            .iter()
            .chain(self.blocks[bb].outs.iter())
            .copied()
            .collect();
        for e in edges {
            self.remove_edge(e);
        }
        self.blocks[bb].removed = true;
    }

    /// Redirect all incoming edges of `from` to `to`.
    pub fn move_ins(&mut self, from: BbId, to: BbId) {
        let ins = std::mem::take(&mut self.blocks[from].ins);
        for e in ins {
            self.edges[e].end = to;
            self.blocks[to].ins.push(e);
        }
        if self.start == from {
            self.start = to;
        }
    }

    /// Fold `pred` into the front of `bb`: ops, statements and stack of `pred`
    /// come first, `pred`'s incoming edges move to `bb`, `pred` is removed.
    pub fn join_pred_bb(&mut self, bb: BbId, pred: BbId) {
        let pred_block = &mut self.blocks[pred];
        let ops = std::mem::take(&mut pred_block.ops);
        let stmts = std::mem::take(&mut pred_block.stmts);
        let stack = std::mem::take(&mut pred_block.stack);
        let (pc, line, unreconstructed) = (pred_block.pc, pred_block.line, pred_block.unreconstructed);

        let block = &mut self.blocks[bb];
        let mut merged_ops = ops;
        merged_ops.extend(block.ops.drain(..));
        block.ops = merged_ops;
        let mut merged_stmts = stmts;
        merged_stmts.append(&mut block.stmts);
        block.stmts = merged_stmts;
        let mut merged_stack = stack;
        merged_stack.append(&mut block.stack);
        block.stack = merged_stack;
        block.pc = pc;
        block.line = line;
        block.unreconstructed |= unreconstructed;

        self.move_ins(pred, bb);
        self.remove_bb(pred);
    }

    /// Split the operations of `bb` before `pc` into a new predecessor block.
    ///
    /// `bb` keeps its identity (and its outgoing edges) so that back edges
    /// found later still target it; its incoming edges move to the new block.
    pub fn split_pred_bb(&mut self, bb: BbId, pc: usize) -> BbId {
        let head_pc = self.blocks[bb].pc;
        let pred = self.new_bb(head_pc);
        let split_at = self.blocks[bb]
            .ops
            .iter()
            .position(|op| op.pc >= pc)
            .unwrap_or(self.blocks[bb].ops.len());
        let head_ops: VecDeque<Operation> = self.blocks[bb].ops.drain(..split_at).collect();
        self.blocks[pred].ops = head_ops;
        self.move_ins(bb, pred);
        self.set_succ(pred, bb);
        let line = self.ops.get(pc).map_or(-1, |op| op.line);
        let block = &mut self.blocks[bb];
        block.pc = pc;
        block.line = line;
        pred
    }

    /// Remove all blocks not reachable from the start block.
    pub fn remove_unreachable(&mut self) -> usize {
        let mut reachable = vec![false; self.blocks.len()];
        let mut work = vec![self.start];
        reachable[self.start] = true;
        while let Some(bb) = work.pop() {
            for succ in self.succs(bb) {
                if !reachable[succ] {
                    reachable[succ] = true;
                    work.push(succ);
                }
            }
        }
        let dead: Vec<BbId> = self
            .blocks()
            .filter(|bb| !reachable[bb.id])
            .map(|bb| bb.id)
            .collect();
        for &bb in &dead {
            self.remove_bb(bb);
        }
        dead.len()
    }

    // === Queries ===

    /// Positional order: by line first, then by pc. `None` sorts last.
    pub fn is_before(&self, a: BbId, b: Option<BbId>) -> bool {
        let Some(b) = b else {
            return true;
        };
        let (a, b) = (&self.blocks[a], &self.blocks[b]);
        a.line < b.line || (a.line == b.line && a.pc <= b.pc)
    }

    /// Final statement is an `if` and both cond edges exist.
    pub fn is_cond(&self, bb: BbId) -> bool {
        matches!(self.blocks[bb].final_stmt(), Some(Stmt::If { .. }))
            && self.true_out(bb).is_some()
            && self.false_out(bb).is_some()
    }

    pub fn is_catch_handler(&self, bb: BbId) -> bool {
        self.ins(bb).any(Edge::is_catch)
    }

    pub fn is_loop_head(&self, bb: BbId) -> bool {
        self.ins(bb).any(|e| e.back)
    }

    pub fn is_switch_head(&self, bb: BbId) -> bool {
        matches!(self.blocks[bb].final_stmt(), Some(Stmt::Switch { .. }))
    }

    /// Final statement enters a monitor.
    pub fn is_sync_head(&self, bb: BbId) -> bool {
        self.blocks[bb]
            .final_stmt()
            .and_then(Stmt::monitor_kind)
            .is_some_and(|kind| kind == MonitorKind::Enter)
    }

    /// `head` reaches `bb` along forward (non-back) edges.
    pub fn has_pred(&self, bb: BbId, head: BbId) -> bool {
        let mut seen = vec![false; self.blocks.len()];
        let mut work = vec![bb];
        seen[bb] = true;
        while let Some(cur) = work.pop() {
            for e in self.ins(cur) {
                if e.back {
                    continue;
                }
                if e.start == head {
                    return true;
                }
                if !seen[e.start] {
                    seen[e.start] = true;
                    work.push(e.start);
                }
            }
        }
        false
    }

    // === Orders ===

    /// Recompute postorder numbers and back-edge flags by DFS from the start block.
    pub fn calculate_postorder(&mut self) {
        for edge in &mut self.edges {
            edge.back = false;
        }
        let n = self.blocks.len();
        let mut visited = vec![false; n];
        let mut on_path = vec![false; n];
        let mut order = Vec::new();
        let mut stack: Vec<(BbId, usize)> = vec![(self.start, 0)];
        visited[self.start] = true;
        on_path[self.start] = true;
        while let Some(&(bb, i)) = stack.last() {
            if let Some(&e) = self.blocks[bb].outs.get(i) {
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }
                let end = self.edges[e].end;
                if !visited[end] {
                    visited[end] = true;
                    on_path[end] = true;
                    stack.push((end, 0));
                } else if on_path[end] {
                    self.edges[e].back = true;
                }
            } else {
                stack.pop();
                on_path[bb] = false;
                self.blocks[bb].postorder = order.len();
                order.push(bb);
            }
        }
        self.postorder = order;
    }

    /// Reachable blocks in postorder from the last traversal.
    pub fn postorder(&self) -> &[BbId] {
        &self.postorder
    }

    pub fn reverse_postorder(&self) -> Vec<BbId> {
        self.postorder.iter().rev().copied().collect()
    }

    /// Immediate dominators indexed by block id (Cooper, Harvey, Kennedy).
    /// The start block dominates itself; unreachable blocks have `None`.
    pub fn immediate_dominators(&self) -> Vec<Option<BbId>> {
        let mut idoms: Vec<Option<BbId>> = vec![None; self.blocks.len()];
        idoms[self.start] = Some(self.start);
        let rpo = self.reverse_postorder();
        let mut changed = true;
        while changed {
            changed = false;
            for &bb in rpo.iter().skip(1) {
                let mut new_idom: Option<BbId> = None;
                for pred in self.preds(bb) {
                    if idoms[pred].is_none() || self.blocks[pred].removed {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => pred,
                        Some(cur) => self.intersect(&idoms, pred, cur),
                    });
                }
                if new_idom.is_some() && idoms[bb] != new_idom {
                    idoms[bb] = new_idom;
                    changed = true;
                }
            }
        }
        idoms
    }

    fn intersect(&self, idoms: &[Option<BbId>], mut a: BbId, mut b: BbId) -> BbId {
        while a != b {
            while self.blocks[a].postorder < self.blocks[b].postorder {
                match idoms[a] {
                    Some(next) if next != a => a = next,
                    _ => return b,
                }
            }
            while self.blocks[b].postorder < self.blocks[a].postorder {
                match idoms[b] {
                    Some(next) if next != b => b = next,
                    _ => return a,
                }
            }
        }
        a
    }

    /// `a` dominates `b` according to `idoms`.
    pub fn dominates(&self, idoms: &[Option<BbId>], a: BbId, b: BbId) -> bool {
        let mut cur = b;
        loop {
            if cur == a {
                return true;
            }
            match idoms[cur] {
                Some(next) if next != cur => cur = next,
                _ => return false,
            }
        }
    }

    /// Structures headed by `bb`, outermost first.
    pub fn structs_of(&self, bb: BbId) -> impl Iterator<Item = &Struct> {
        self.structs.iter().filter(move |s| s.head == bb)
    }

    /// Graphviz rendering of the live graph.
    pub fn to_dot(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "digraph \"{}\" {{", self.info.name);
        let _ = writeln!(out, "  node [shape=box, fontname=monospace];");
        for bb in self.blocks() {
            let mut label = format!("BB{}", bb.pc);
            if bb.line >= 0 {
                let _ = write!(label, " (l{})", bb.line);
            }
            let shape = if bb.id == self.start { ", style=bold" } else { "" };
            let _ = writeln!(out, "  bb{} [label=\"{label}\"{shape}];", bb.id);
            for e in self.outs(bb.id) {
                let label = match &e.kind {
                    EdgeKind::Sequence => String::new(),
                    EdgeKind::CondTrue => "T".to_string(),
                    EdgeKind::CondFalse => "F".to_string(),
                    EdgeKind::SwitchCase(values) => values
                        .iter()
                        .map(|v| match v {
                            CaseValue::Int(i) => i.to_string(),
                            CaseValue::Str(s) => format!("\\\"{s}\\\""),
                            CaseValue::Enum(name) => name.clone(),
                            CaseValue::Default => "default".to_string(),
                        })
                        .collect::<Vec<_>>()
                        .join(","),
                    EdgeKind::Catch(types) => types
                        .iter()
                        .map(|t| t.as_ref().map_or("*".to_string(), Type::simple_name))
                        .collect::<Vec<_>>()
                        .join("|"),
                    EdgeKind::Jsr(sub) => format!("jsr {}", sub.pc),
                    EdgeKind::Ret(sub) => format!("ret {}", sub.pc),
                };
                let style = if e.back {
                    ", style=dashed"
                } else if e.is_catch() {
                    ", color=red"
                } else {
                    ""
                };
                let _ = writeln!(
                    out,
                    "  bb{} -> bb{} [label=\"{label}\"{style}];",
                    e.start, e.end
                );
            }
        }
        out.push_str("}\n");
        out
    }
}
