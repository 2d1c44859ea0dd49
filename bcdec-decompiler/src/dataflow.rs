//! Frame propagation to a fixpoint.
//!
//! Every reachable pc gets an input frame. Joins merge per slot, RET edges are
//! discovered while propagating, and once stable the JVM's slot-counting
//! DUP/POP forms are rewritten to their value-counting equivalents.

use bcdec_ir::{
    BbId, Cfg, DupKind, EdgeKind, Frame, Op, Operation, PopKind, R, RKind, Sub, Type,
};

use crate::error::{DecompileError, Result};
use crate::options::DecompileOptions;

/// Run the dataflow analysis, filling `cfg.frames`.
pub fn analyze(cfg: &mut Cfg, options: &DecompileOptions) -> Result<()> {
    let mut analyzer = Analyzer {
        cfg,
        changed: false,
        edges_changed: false,
    };
    let start = analyzer.start_frame()?;
    let start_pc = analyzer.cfg.block(analyzer.cfg.start()).pc;
    analyzer.merge_into(start_pc, start)?;

    let mut passes = 0;
    loop {
        passes += 1;
        if passes > options.max_dataflow_iterations {
            return Err(DecompileError::IterationLimit {
                pass: "dataflow",
                limit: options.max_dataflow_iterations,
            });
        }
        analyzer.changed = false;
        analyzer.edges_changed = false;
        for bb in analyzer.cfg.reverse_postorder() {
            analyzer.propagate_block(bb)?;
        }
        if analyzer.edges_changed {
            analyzer.cfg.calculate_postorder();
        }
        if !analyzer.changed && !analyzer.edges_changed {
            break;
        }
    }
    log::debug!(
        "{}: dataflow stable after {passes} passes",
        analyzer.cfg.info.name
    );
    analyzer.rewrite_wide_forms()
}

struct Analyzer<'a> {
    cfg: &'a mut Cfg,
    changed: bool,
    edges_changed: bool,
}

impl Analyzer<'_> {
    /// Parameters as `METHOD_PARAM` values; wide parameters leave their
    /// second register undefined.
    fn start_frame(&self) -> Result<Frame> {
        let info = &self.cfg.info;
        let mut frame = Frame::new(info.regs, info.max_stack);
        if let Some(reg) = info.this_reg() {
            frame
                .set_reg(reg, Some(R::param(reg, info.owner.clone())))
                .map_err(|e| DecompileError::frame(0, e))?;
        }
        for (reg, t) in info.param_regs().into_iter().zip(&info.params) {
            frame
                .set_reg(reg, Some(R::param(reg, t.clone())))
                .map_err(|e| DecompileError::frame(0, e))?;
        }
        Ok(frame)
    }

    /// Merge `frame` into the stored input frame at `pc`.
    fn merge_into(&mut self, pc: usize, frame: Frame) -> Result<()> {
        let merged = match &self.cfg.frames[pc] {
            None => frame,
            Some(old) => {
                let merged = old.merge(&frame, pc).map_err(|e| DecompileError::frame(pc, e))?;
                if merged == *old {
                    return Ok(());
                }
                merged
            }
        };
        self.cfg.frames[pc] = Some(merged);
        self.changed = true;
        Ok(())
    }

    fn propagate_block(&mut self, bb: BbId) -> Result<()> {
        let block = self.cfg.block(bb);
        let Some(mut frame) = self.cfg.frames[block.pc].clone() else {
            return Ok(());
        };
        let ops: Vec<Operation> = block.ops.iter().cloned().collect();
        let mut op_frames = Vec::with_capacity(ops.len());
        for op in &ops {
            if self.cfg.frames[op.pc].as_ref() != Some(&frame) {
                self.cfg.frames[op.pc] = Some(frame.clone());
                self.changed = true;
            }
            op_frames.push(frame.clone());
            frame = self.execute(bb, op, frame)?;
        }

        let outs: Vec<(BbId, EdgeKind)> = self
            .cfg
            .outs(bb)
            .map(|e| (e.end, e.kind.clone()))
            .collect();
        for (succ, kind) in outs {
            let succ_pc = self.cfg.block(succ).pc;
            match kind {
                EdgeKind::Catch(types) => {
                    let t = match types.as_slice() {
                        [Some(t)] => t.clone(),
                        _ => Type::throwable(),
                    };
                    for op_frame in &op_frames {
                        let mut handler = op_frame.clone();
                        handler.clear_stack();
                        let slot = handler.next_slot();
                        handler
                            .push(R::new(succ_pc, slot, t.clone(), RKind::Const))
                            .map_err(|e| DecompileError::frame(succ_pc, e))?;
                        self.merge_into(succ_pc, handler)?;
                    }
                }
                // Return frames are produced when the RET itself is executed.
                EdgeKind::Ret(_) => {}
                _ => self.merge_into(succ_pc, frame.clone())?,
            }
        }
        Ok(())
    }

    /// Apply the effect of one operation.
    fn execute(&mut self, bb: BbId, operation: &Operation, mut frame: Frame) -> Result<Frame> {
        let pc = operation.pc;
        let err = |e| DecompileError::frame(pc, e);
        match &operation.op {
            Op::Add { t }
            | Op::Sub { t }
            | Op::Mul { t }
            | Op::Div { t }
            | Op::Rem { t }
            | Op::And { t }
            | Op::Or { t }
            | Op::Xor { t }
            | Op::Shl { t }
            | Op::Shr { t, .. } => {
                frame.pop().map_err(err)?;
                frame.pop().map_err(err)?;
                push(&mut frame, pc, t.clone()).map_err(err)?;
            }
            Op::Neg { t } => {
                frame.pop().map_err(err)?;
                push(&mut frame, pc, t.clone()).map_err(err)?;
            }
            Op::ArrayLoad { t } => {
                frame.pop().map_err(err)?;
                let array = frame.pop().map_err(err)?;
                let elem = match array.t.elem_type() {
                    Some(elem) if !t.is_int_like() || elem.is_int_like() => elem.clone(),
                    _ => t.clone(),
                };
                push(&mut frame, pc, elem).map_err(err)?;
            }
            Op::ArrayStore { .. } => {
                for _ in 0..3 {
                    frame.pop().map_err(err)?;
                }
            }
            Op::ArrayLength => {
                frame.pop().map_err(err)?;
                push(&mut frame, pc, Type::Int).map_err(err)?;
            }
            Op::Cast { to, .. } => {
                frame.pop().map_err(err)?;
                push(&mut frame, pc, to.clone()).map_err(err)?;
            }
            Op::Cmp { .. } => {
                frame.pop().map_err(err)?;
                frame.pop().map_err(err)?;
                push(&mut frame, pc, Type::Int).map_err(err)?;
            }
            Op::Dup { kind } => {
                let kind = value_dup_kind(*kind, &frame);
                dup(&mut frame, kind).map_err(err)?;
            }
            Op::Pop { kind } => {
                let count = match value_pop_kind(*kind, &frame) {
                    PopKind::Pop => 1,
                    PopKind::Pop2 => 2,
                };
                for _ in 0..count {
                    frame.pop().map_err(err)?;
                }
            }
            Op::Swap => {
                let a = frame.pop().map_err(err)?;
                let b = frame.pop().map_err(err)?;
                frame.push(a).map_err(err)?;
                frame.push(b).map_err(err)?;
            }
            Op::FillArray { .. } => {
                let array = frame.pop().map_err(err)?;
                frame.push(array).map_err(err)?;
            }
            Op::Get { field } => {
                if !field.is_static() {
                    frame.pop().map_err(err)?;
                }
                push(&mut frame, pc, field.ty.clone()).map_err(err)?;
            }
            Op::Put { field } => {
                frame.pop().map_err(err)?;
                if !field.is_static() {
                    frame.pop().map_err(err)?;
                }
            }
            Op::Goto { .. } => {}
            Op::Inc { t, reg, .. } => {
                let value = R::new(pc, *reg, t.clone(), RKind::Const);
                frame.set_reg(*reg, Some(value)).map_err(err)?;
            }
            Op::InstanceOf { .. } => {
                frame.pop().map_err(err)?;
                push(&mut frame, pc, Type::Boolean).map_err(err)?;
            }
            Op::Invoke { method, .. } => {
                for _ in 0..operation.in_stack_size() {
                    frame.pop().map_err(err)?;
                }
                if !method.returns_void() {
                    push(&mut frame, pc, method.ret.clone()).map_err(err)?;
                }
            }
            Op::Jcmp { .. } => {
                frame.pop().map_err(err)?;
                frame.pop().map_err(err)?;
            }
            Op::Jcnd { .. } | Op::Monitor { .. } | Op::Switch { .. } | Op::Throw => {
                frame.pop().map_err(err)?;
            }
            Op::Jsr { target } => {
                let slot = frame.next_slot();
                frame
                    .push(R::new(pc, slot, Type::ReturnAddress, RKind::Subroutine))
                    .map_err(err)?;
                frame.push_sub(Sub { pc: *target });
            }
            Op::Ret { reg } => {
                if *reg >= frame.regs_len() {
                    return Err(DecompileError::InvalidRegister { pc, reg: *reg });
                }
                self.execute_ret(bb, pc, &frame)?;
            }
            Op::Load { t, reg } => {
                if *reg >= frame.regs_len() {
                    return Err(DecompileError::InvalidRegister { pc, reg: *reg });
                }
                let value = match frame.reg(*reg) {
                    Some(value) => value.clone(),
                    None => R::new(pc, frame.next_slot(), t.clone(), RKind::Const),
                };
                frame.push(value).map_err(err)?;
            }
            Op::Store { t, reg } => {
                let value = frame.pop().map_err(err)?;
                let ty = if value.t == Type::Unknown || (value.t == Type::Null && !t.is_reference()) {
                    t.clone()
                } else {
                    value.t.clone()
                };
                let wide = ty.is_wide();
                frame
                    .set_reg(*reg, Some(R::new(pc, *reg, ty, RKind::Const)))
                    .map_err(err)?;
                if wide && reg + 1 < frame.regs_len() {
                    frame.set_reg(reg + 1, None).map_err(err)?;
                }
            }
            Op::New { t } => push(&mut frame, pc, t.clone()).map_err(err)?,
            Op::NewArray { t, dims } => {
                for _ in 0..*dims {
                    frame.pop().map_err(err)?;
                }
                push(&mut frame, pc, Type::array_of(t.clone())).map_err(err)?;
            }
            Op::Push { t, value } => {
                let t = if *value == bcdec_ir::Literal::Null {
                    Type::Null
                } else {
                    t.clone()
                };
                push(&mut frame, pc, t).map_err(err)?;
            }
            Op::Return { t } => {
                if *t != Type::Void {
                    frame.pop().map_err(err)?;
                }
            }
        }
        Ok(frame)
    }

    /// Return to every call site of the innermost subroutine that has been
    /// reached, adding the RET edges on first sight. Each call site continues
    /// from its own frame, updated with the registers the subroutine wrote.
    fn execute_ret(&mut self, bb: BbId, pc: usize, frame: &Frame) -> Result<()> {
        let Some(sub) = frame.subs().last().copied() else {
            log::debug!("{}: RET at pc {pc} outside of a subroutine", self.cfg.info.name);
            return Ok(());
        };
        let Some(entry) = self.cfg.frames[sub.pc].clone() else {
            return Ok(());
        };
        let return_pcs: Vec<usize> = self
            .cfg
            .ops
            .iter()
            .filter(|op| matches!(op.op, Op::Jsr { target } if target == sub.pc))
            .map(|op| op.pc + 1)
            .collect();
        for return_pc in return_pcs {
            let Some(call) = self.cfg.frames[return_pc - 1].clone() else {
                continue;
            };
            let Some(target) = self.cfg.block_at(return_pc) else {
                return Err(DecompileError::UnresolvedTarget {
                    pc,
                    target: return_pc,
                });
            };
            let known = self
                .cfg
                .outs(bb)
                .any(|e| e.end == target && e.kind == EdgeKind::Ret(sub));
            if !known {
                self.cfg.add_edge(bb, target, EdgeKind::Ret(sub));
                self.edges_changed = true;
            }
            self.merge_into(return_pc, frame.returned_to(&entry, &call))?;
        }
        Ok(())
    }

    /// Replace slot-counting DUP/POP forms by their value-counting forms.
    fn rewrite_wide_forms(&mut self) -> Result<()> {
        let mut rewritten = Vec::new();
        for (pc, operation) in self.cfg.ops.iter().enumerate() {
            let Some(frame) = &self.cfg.frames[pc] else {
                continue;
            };
            let op = match operation.op {
                Op::Dup { kind } => {
                    let value = value_dup_kind(kind, frame);
                    if value == kind {
                        continue;
                    }
                    Op::Dup { kind: value }
                }
                Op::Pop { kind } => {
                    let value = value_pop_kind(kind, frame);
                    if value == kind {
                        continue;
                    }
                    Op::Pop { kind: value }
                }
                _ => continue,
            };
            rewritten.push((pc, op));
        }
        if rewritten.is_empty() {
            return Ok(());
        }
        let ids: Vec<BbId> = self.cfg.blocks().map(|bb| bb.id).collect();
        for (pc, op) in rewritten {
            self.cfg.ops[pc].op = op.clone();
            for &id in &ids {
                if let Some(operation) = self
                    .cfg
                    .block_mut(id)
                    .ops
                    .iter_mut()
                    .find(|operation| operation.pc == pc)
                {
                    operation.op = op.clone();
                }
            }
        }
        Ok(())
    }
}

fn push(frame: &mut Frame, pc: usize, t: Type) -> std::result::Result<(), bcdec_ir::FrameError> {
    let slot = frame.next_slot();
    frame.push(R::new(pc, slot, t, RKind::Const))
}

fn is_wide_at(frame: &Frame, depth: usize) -> bool {
    frame.peek_at(depth).is_some_and(|r| r.t.is_wide())
}

/// Value-counting equivalent of a DUP form given the current stack.
pub fn value_dup_kind(kind: DupKind, frame: &Frame) -> DupKind {
    match kind {
        DupKind::DupX2 if is_wide_at(frame, 1) => DupKind::DupX1,
        DupKind::Dup2 if is_wide_at(frame, 0) => DupKind::Dup,
        DupKind::Dup2X1 if is_wide_at(frame, 0) => DupKind::DupX1,
        DupKind::Dup2X2 if is_wide_at(frame, 0) => {
            if is_wide_at(frame, 1) {
                DupKind::DupX1
            } else {
                DupKind::DupX2
            }
        }
        DupKind::Dup2X2 if is_wide_at(frame, 2) => DupKind::Dup2X1,
        other => other,
    }
}

pub fn value_pop_kind(kind: PopKind, frame: &Frame) -> PopKind {
    match kind {
        PopKind::Pop2 if is_wide_at(frame, 0) => PopKind::Pop,
        other => other,
    }
}

/// Apply a value-counting DUP: copies keep the identity of the original.
fn dup(frame: &mut Frame, kind: DupKind) -> std::result::Result<(), bcdec_ir::FrameError> {
    let (copied, below) = match kind {
        DupKind::Dup => (1, 0),
        DupKind::DupX1 => (1, 1),
        DupKind::DupX2 => (1, 2),
        DupKind::Dup2 => (2, 0),
        DupKind::Dup2X1 => (2, 1),
        DupKind::Dup2X2 => (2, 2),
    };
    let mut top = Vec::with_capacity(copied);
    for _ in 0..copied {
        top.push(frame.pop()?);
    }
    let mut under = Vec::with_capacity(below);
    for _ in 0..below {
        under.push(frame.pop()?);
    }
    for value in top.iter().rev() {
        frame.push(value.clone())?;
    }
    for value in under.into_iter().rev() {
        frame.push(value)?;
    }
    for value in top.into_iter().rev() {
        frame.push(value)?;
    }
    Ok(())
}
