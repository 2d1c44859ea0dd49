#![allow(dead_code)]

use bcdec_decompiler::{
    ClassResolver, DecompileOptions, DecompiledMethod, NoResolver, decompile_method, render,
};
use bcdec_ir::*;

pub const OWNER: &str = "demo.Sample";

/// Instance method of `demo.Sample`: `this` in r0, parameters from r1.
pub fn method(name: &str, regs: usize, params: Vec<Type>, ops: Vec<Op>) -> MethodInput {
    let mut info = MethodInfo::new(name, regs, 4);
    info.owner = Type::object(OWNER);
    info.is_static = false;
    info.params = params;
    MethodInput {
        info,
        ops: ops
            .into_iter()
            .enumerate()
            .map(|(pc, op)| Operation::new(pc, op))
            .collect(),
        exceptions: Vec::new(),
    }
}

pub fn decompile(input: &MethodInput) -> DecompiledMethod {
    decompile_method(input, &NoResolver, &DecompileOptions::default())
}

pub fn decompile_with(input: &MethodInput, resolver: &dyn ClassResolver) -> DecompiledMethod {
    decompile_method(input, resolver, &DecompileOptions::default())
}

/// Decompile and require a clean result.
pub fn decompile_ok(input: &MethodInput) -> Cfg {
    let result = decompile(input);
    assert!(
        !result.error,
        "unexpected errors: {:?}",
        result.diagnostics
    );
    result.cfg.expect("cfg")
}

/// Rendered statements of all live blocks in pc order.
pub fn all_stmts(cfg: &Cfg) -> Vec<String> {
    let mut blocks: Vec<&BasicBlock> = cfg.blocks().collect();
    blocks.sort_by_key(|bb| bb.pc);
    blocks
        .into_iter()
        .flat_map(|bb| bb.stmts.iter().map(render::stmt))
        .collect()
}

pub fn bb_at(cfg: &Cfg, pc: usize) -> BbId {
    cfg.block_at(pc)
        .unwrap_or_else(|| panic!("no block at pc {pc}"))
}

// === Operation builders ===

pub fn load(t: Type, reg: usize) -> Op {
    Op::Load { t, reg }
}

pub fn iload(reg: usize) -> Op {
    load(Type::Int, reg)
}

pub fn store(t: Type, reg: usize) -> Op {
    Op::Store { t, reg }
}

pub fn istore(reg: usize) -> Op {
    store(Type::Int, reg)
}

pub fn push_int(value: i64) -> Op {
    Op::Push {
        t: Type::Int,
        value: Literal::Int(value),
    }
}

pub fn push_str(value: &str) -> Op {
    Op::Push {
        t: Type::string(),
        value: Literal::String(value.into()),
    }
}

pub fn goto(target: usize) -> Op {
    Op::Goto { target }
}

pub fn jcnd(cmp: CmpType, target: usize) -> Op {
    Op::Jcnd {
        t: Type::Int,
        cmp,
        target,
    }
}

pub fn jcmp(cmp: CmpType, target: usize) -> Op {
    Op::Jcmp {
        t: Type::Int,
        cmp,
        target,
    }
}

pub fn ret_void() -> Op {
    Op::Return { t: Type::Void }
}

pub fn static_method(owner: &str, name: &str, params: Vec<Type>, ret: Type) -> MethodRef {
    MethodRef {
        owner: Type::object(owner),
        name: name.into(),
        params,
        ret,
        flags: AccessFlags::STATIC,
    }
}

pub fn virtual_method(owner: &str, name: &str, params: Vec<Type>, ret: Type) -> MethodRef {
    MethodRef {
        owner: Type::object(owner),
        name: name.into(),
        params,
        ret,
        flags: AccessFlags::PUBLIC,
    }
}

/// `demo.Sample.name()`, static and void.
pub fn call(name: &str) -> Op {
    Op::Invoke {
        method: static_method(OWNER, name, Vec::new(), Type::Void),
        direct: false,
    }
}

pub fn invoke(method: MethodRef) -> Op {
    Op::Invoke {
        method,
        direct: false,
    }
}

pub fn invoke_direct(method: MethodRef) -> Op {
    Op::Invoke {
        method,
        direct: true,
    }
}
