//! Java-like text for expressions, statements and whole CFGs.
//!
//! This is a debugging view: control statements print only their heads, the
//! bodies are the block successors listed under each block.

use std::fmt::Write;

use bcdec_ir::{
    BbId, CaseValue, Cfg, Edge, EdgeKind, Expr, MonitorKind, Stmt, Struct, StructKind, Type,
};

/// Render one expression.
pub fn expr(e: &Expr) -> String {
    match e {
        Expr::Null => "null".into(),
        Expr::BoolLit(b) => b.to_string(),
        Expr::IntLit(v) => v.to_string(),
        Expr::LongLit(v) => format!("{v}L"),
        Expr::FloatLit(v) => format!("{v:?}F"),
        Expr::DoubleLit(v) => format!("{v:?}"),
        Expr::CharLit(c) => match char::from_u32(u32::from(*c)) {
            Some(ch) => format!("'{}'", escape(&ch.to_string(), '\'')),
            None => format!("'\\u{c:04x}'"),
        },
        Expr::StringLit(s) => format!("\"{}\"", escape(s, '"')),
        Expr::ClassLit(t) => format!("{}.class", t.simple_name()),
        Expr::Var(name) => name.clone(),
        Expr::This => "this".into(),
        Expr::TypeName(t) => t.simple_name(),
        Expr::BinaryOp { op, lhs, rhs } => {
            let p = op.precedence();
            format!("{} {op} {}", operand(lhs, p), operand(rhs, p + 1))
        }
        Expr::UnaryOp { op, expr: inner } => format!("{op}{}", operand(inner, 13)),
        Expr::Postfix { op, expr: inner } => format!("{}{op}", operand(inner, 14)),
        Expr::Cast { ty, expr: inner } => format!("({}) {}", ty.simple_name(), operand(inner, 13)),
        Expr::InstanceOf { expr: inner, ty } => {
            format!("{} instanceof {}", operand(inner, 9), ty.simple_name())
        }
        Expr::Field { object, name } => format!("{}.{name}", operand(object, 15)),
        Expr::ArrayAccess { array, index } => format!("{}[{}]", operand(array, 15), expr(index)),
        Expr::ArrayLength(array) => format!("{}.length", operand(array, 15)),
        Expr::Call {
            receiver,
            name,
            args,
        } => format!("{}.{name}({})", operand(receiver, 15), list(args)),
        Expr::SuperCall { name, args } => format!("super.{name}({})", list(args)),
        Expr::New { ty, args } => format!("new {}({})", ty.simple_name(), list(args)),
        Expr::NewArray { ty, dims, init } => new_array(ty, dims, init.as_deref()),
        Expr::Conditional {
            cond,
            then_expr,
            else_expr,
        } => format!(
            "{} ? {} : {}",
            operand(cond, 3),
            operand(then_expr, 3),
            operand(else_expr, 2)
        ),
        Expr::Assign { target, op, value } => {
            let op = op.map(|op| op.to_string()).unwrap_or_default();
            format!("{} {op}= {}", operand(target, 15), operand(value, 1))
        }
        Expr::Compare { lhs, rhs, .. } => format!("{} <=> {}", operand(lhs, 10), operand(rhs, 10)),
        Expr::Unknown(s) => format!("/* {s} */"),
    }
}

/// Parenthesize `e` if it binds looser than `min`.
fn operand(e: &Expr, min: u8) -> String {
    let s = expr(e);
    if e.precedence() < min { format!("({s})") } else { s }
}

fn list(args: &[Expr]) -> String {
    args.iter().map(expr).collect::<Vec<_>>().join(", ")
}

fn new_array(ty: &Type, dims: &[Expr], init: Option<&[Expr]>) -> String {
    let mut base = ty;
    let mut depth = 1;
    while let Some(elem) = base.elem_type() {
        base = elem;
        depth += 1;
    }
    let base = base.simple_name();
    if let Some(init) = init {
        let brackets = "[]".repeat(depth);
        return format!("new {base}{brackets} {{{}}}", list(init));
    }
    let mut out = format!("new {base}");
    for dim in dims {
        let _ = write!(out, "[{}]", expr(dim));
    }
    out.push_str(&"[]".repeat(depth.saturating_sub(dims.len())));
    out
}

fn escape(s: &str, quote: char) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// Render one statement, without trailing newline.
pub fn stmt(s: &Stmt) -> String {
    match s {
        Stmt::Expr(e) => format!("{};", expr(e)),
        Stmt::Declare { ty, name, init } => match init {
            Some(init) => format!("{} {name} = {};", ty.simple_name(), expr(init)),
            None => format!("{} {name};", ty.simple_name()),
        },
        Stmt::Return(None) => "return;".into(),
        Stmt::Return(Some(e)) => format!("return {};", expr(e)),
        Stmt::Throw(e) => format!("throw {};", expr(e)),
        Stmt::If { cond } => format!("if ({})", expr(cond)),
        Stmt::Switch { discriminant } => format!("switch ({})", expr(discriminant)),
        Stmt::Monitor { kind, object } => match kind {
            MonitorKind::Enter => format!("synchronized ({}) {{", expr(object)),
            MonitorKind::Exit => format!("}} // synchronized ({})", expr(object)),
        },
        Stmt::SuperInit { args } => format!("super({});", list(args)),
        Stmt::Comment(text) => format!("// {text}"),
    }
}

/// Statements of one block, one per line.
pub fn block_stmts(cfg: &Cfg, bb: BbId) -> Vec<String> {
    cfg.block(bb).stmts.iter().map(stmt).collect()
}

fn bb_name(cfg: &Cfg, bb: BbId) -> String {
    format!("BB{}", cfg.block(bb).pc)
}

fn edge_label(cfg: &Cfg, e: &Edge) -> String {
    let target = bb_name(cfg, e.end);
    let tag = match &e.kind {
        EdgeKind::Sequence => String::new(),
        EdgeKind::CondTrue => " [T]".into(),
        EdgeKind::CondFalse => " [F]".into(),
        EdgeKind::SwitchCase(values) => format!(" [{}]", case_values(values)),
        EdgeKind::Catch(types) => {
            let types: Vec<String> = types
                .iter()
                .map(|t| t.as_ref().map_or("*".to_string(), Type::simple_name))
                .collect();
            format!(" [catch {}]", types.join("|"))
        }
        EdgeKind::Jsr(sub) => format!(" [jsr {}]", sub.pc),
        EdgeKind::Ret(sub) => format!(" [ret {}]", sub.pc),
    };
    let back = if e.back { " back" } else { "" };
    format!("{target}{tag}{back}")
}

/// `1,2,default` style label of a case edge.
pub fn case_values(values: &[CaseValue]) -> String {
    values
        .iter()
        .map(|v| match v {
            CaseValue::Int(i) => i.to_string(),
            CaseValue::Str(s) => format!("\"{}\"", escape(s, '"')),
            CaseValue::Enum(name) => name.clone(),
            CaseValue::Default => "default".into(),
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn struct_line(cfg: &Cfg, s: &Struct) -> String {
    let mut line = s.label();
    if let Some(follow) = s.follow {
        let _ = write!(line, " follow={}", bb_name(cfg, follow));
    }
    if let StructKind::Loop {
        last: Some(last), ..
    } = s.kind
    {
        let _ = write!(line, " last={}", bb_name(cfg, last));
    }
    let members: Vec<String> = s.all_members().iter().map(|&m| bb_name(cfg, m)).collect();
    if !members.is_empty() {
        let _ = write!(line, " members=[{}]", members.join(", "));
    }
    if let StructKind::Switch { cases, .. } = &s.kind {
        let order: Vec<String> = cases
            .iter()
            .map(|c| {
                let tail = if c.fall_through { "~" } else { "" };
                format!("{}{tail}", case_values(&c.values))
            })
            .collect();
        let _ = write!(line, " cases=[{}]", order.join(" | "));
    }
    line
}

/// The reconstructed method: every live block in pc order with its
/// statements, leftover operations, struct annotations and successors.
pub fn method(cfg: &Cfg) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "method {}:", cfg.info.name);
    let mut blocks: Vec<BbId> = cfg.blocks().map(|bb| bb.id).collect();
    blocks.sort_by_key(|&bb| cfg.block(bb).pc);
    for bb in blocks {
        let block = cfg.block(bb);
        let _ = write!(out, "  {}", bb_name(cfg, bb));
        if block.line >= 0 {
            let _ = write!(out, " (line {})", block.line);
        }
        if block.unreconstructed {
            out.push_str(" UNRECONSTRUCTED");
        }
        out.push('\n');
        for s in cfg.structs_of(bb) {
            let _ = writeln!(out, "    @ {}", struct_line(cfg, s));
        }
        for line in block_stmts(cfg, bb) {
            let _ = writeln!(out, "    {line}");
        }
        for op in &block.ops {
            let _ = writeln!(out, "    ! {op}");
        }
        for v in &block.stack {
            let _ = writeln!(out, "    ^ {}", expr(&v.expr));
        }
        let succs: Vec<String> = cfg.outs(bb).map(|e| edge_label(cfg, e)).collect();
        if !succs.is_empty() {
            let _ = writeln!(out, "    -> {}", succs.join(", "));
        }
    }
    out
}

/// Blocks with their raw operations and typed out edges.
pub fn cfg_listing(cfg: &Cfg) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "cfg {}:", cfg.info.name);
    for &bb in cfg.postorder().iter().rev() {
        let block = cfg.block(bb);
        let start = if bb == cfg.start() { " start" } else { "" };
        let _ = writeln!(out, "  {} po={}{start}", bb_name(cfg, bb), block.postorder);
        for op in &block.ops {
            let _ = writeln!(out, "    {op}");
        }
        for e in cfg.outs(bb) {
            let _ = writeln!(out, "    -> {}", edge_label(cfg, e));
        }
    }
    out
}

/// The dataflow frame before each operation.
pub fn frames(cfg: &Cfg) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "frames {}:", cfg.info.name);
    for (op, frame) in cfg.ops.iter().zip(&cfg.frames) {
        match frame {
            Some(frame) => {
                let _ = writeln!(out, "  {op:<32} {frame}");
            }
            None => {
                let _ = writeln!(out, "  {op:<32} unreachable");
            }
        }
    }
    out
}
