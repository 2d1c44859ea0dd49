mod common;

use bcdec_decompiler::{DecompileOptions, decompile_method, render};
use bcdec_ir::*;
use common::*;

#[test]
fn scenario_add_and_assign() {
    let input = method(
        "add",
        3,
        vec![Type::Int, Type::Int],
        vec![iload(1), iload(2), Op::Add { t: Type::Int }, istore(1), ret_void()],
    );
    let cfg = decompile_ok(&input);
    assert_eq!(cfg.block_count(), 1);
    assert_eq!(all_stmts(&cfg), vec!["r1 = r1 + r2;", "return;"]);
    assert!(cfg.blocks().all(|bb| bb.ops.is_empty() && bb.stack.is_empty()));
}

#[test]
fn scenario_ternary() {
    // 0: LOAD r1; 1: PUSH 0; 2: JCMP GT 5; 3: PUSH 0; 4: GOTO 6; 5: PUSH 1; 6: STORE r2; 7: RETURN
    let input = method(
        "sign",
        3,
        vec![Type::Int],
        vec![
            iload(1),
            push_int(0),
            jcmp(CmpType::Gt, 5),
            push_int(0),
            goto(6),
            push_int(1),
            istore(2),
            ret_void(),
        ],
    );
    let cfg = decompile_ok(&input);
    assert_eq!(all_stmts(&cfg), vec!["r2 = r1 > 0 ? 1 : 0;", "return;"]);
    assert_eq!(cfg.block_count(), 1);
    assert!(cfg.structs.is_empty());
}

#[test]
fn boolean_ternary_collapses_to_condition() {
    // boolean b = a > 0;
    let input = method(
        "positive",
        3,
        vec![Type::Int],
        vec![
            iload(1),
            jcnd(CmpType::Le, 4),
            Op::Push {
                t: Type::Boolean,
                value: Literal::Int(1),
            },
            goto(5),
            Op::Push {
                t: Type::Boolean,
                value: Literal::Int(0),
            },
            store(Type::Boolean, 2),
            ret_void(),
        ],
    );
    let cfg = decompile_ok(&input);
    assert_eq!(all_stmts(&cfg), vec!["r2 = r1 > 0;", "return;"]);
}

#[test]
fn dup_store_is_an_inline_assignment() {
    // r1 = r2 = 5;
    let input = method(
        "chain",
        3,
        vec![],
        vec![
            push_int(5),
            Op::Dup {
                kind: DupKind::Dup,
            },
            istore(2),
            istore(1),
            ret_void(),
        ],
    );
    let cfg = decompile_ok(&input);
    assert_eq!(all_stmts(&cfg), vec!["r1 = r2 = 5;", "return;"]);
}

#[test]
fn short_circuit_or() {
    // if (r1 <= 0 || r2 <= 0) return; a();
    let input = method(
        "either",
        3,
        vec![Type::Int, Type::Int],
        vec![
            iload(1),
            jcnd(CmpType::Le, 5),
            iload(2),
            jcnd(CmpType::Le, 5),
            call("a"),
            ret_void(),
        ],
    );
    let cfg = decompile_ok(&input);
    let head = bb_at(&cfg, 0);
    assert_eq!(
        render::block_stmts(&cfg, head),
        vec!["if (r1 <= 0 || r2 <= 0)"]
    );
    assert_eq!(cfg.true_succ(head), Some(bb_at(&cfg, 5)));
    assert_eq!(cfg.false_succ(head), Some(bb_at(&cfg, 4)));
    assert!(cfg.block_at(2).is_none(), "second condition block should be fused");
}

#[test]
fn short_circuit_and() {
    // if (r1 > 0 && r2 > 0) a();
    let input = method(
        "both",
        3,
        vec![Type::Int, Type::Int],
        vec![
            iload(1),
            jcnd(CmpType::Le, 4),
            iload(2),
            jcnd(CmpType::Gt, 5),
            ret_void(),
            call("a"),
            ret_void(),
        ],
    );
    let cfg = decompile_ok(&input);
    let head = bb_at(&cfg, 0);
    assert_eq!(
        render::block_stmts(&cfg, head),
        vec!["if (r1 > 0 && r2 > 0)"]
    );
    assert_eq!(cfg.true_succ(head), Some(bb_at(&cfg, 5)));
    assert_eq!(cfg.false_succ(head), Some(bb_at(&cfg, 4)));
}

#[test]
fn string_builder_chain_is_concatenation() {
    // return "a" + r1;
    let sb = "java.lang.StringBuilder";
    let mut input = method(
        "describe",
        2,
        vec![Type::Int],
        vec![
            Op::New {
                t: Type::object(sb),
            },
            Op::Dup {
                kind: DupKind::Dup,
            },
            invoke_direct(virtual_method(sb, "<init>", vec![], Type::Void)),
            push_str("a"),
            invoke(virtual_method(sb, "append", vec![Type::string()], Type::object(sb))),
            iload(1),
            invoke(virtual_method(sb, "append", vec![Type::Int], Type::object(sb))),
            invoke(virtual_method(sb, "toString", vec![], Type::string())),
            Op::Return { t: Type::string() },
        ],
    );
    input.info.ret = Type::string();
    let cfg = decompile_ok(&input);
    assert_eq!(all_stmts(&cfg), vec!["return \"a\" + r1;"]);
}

#[test]
fn constructor_arguments_fill_the_new_expression() {
    // Object o = new Point(1, 2);
    let point = "demo.Point";
    let input = method(
        "make",
        2,
        vec![],
        vec![
            Op::New {
                t: Type::object(point),
            },
            Op::Dup {
                kind: DupKind::Dup,
            },
            push_int(1),
            push_int(2),
            invoke_direct(virtual_method(
                point,
                "<init>",
                vec![Type::Int, Type::Int],
                Type::Void,
            )),
            store(Type::object(point), 1),
            ret_void(),
        ],
    );
    let cfg = decompile_ok(&input);
    assert_eq!(all_stmts(&cfg), vec!["r1 = new Point(1, 2);", "return;"]);
}

#[test]
fn cached_class_literal_becomes_class_expression() {
    // JDK 1.4: class$java$lang$String == null ? (class$... = class$("java.lang.String")) : ...
    let class_type = Type::object("java.lang.Class");
    let cache = FieldRef {
        owner: Type::object(OWNER),
        name: "class$java$lang$String".into(),
        ty: class_type.clone(),
        flags: AccessFlags::STATIC | AccessFlags::SYNTHETIC,
    };
    let input = method(
        "literal",
        2,
        vec![],
        vec![
            Op::Get {
                field: cache.clone(),
            },
            Op::Dup {
                kind: DupKind::Dup,
            },
            Op::Jcnd {
                t: class_type.clone(),
                cmp: CmpType::Ne,
                target: 8,
            },
            Op::Pop {
                kind: PopKind::Pop,
            },
            push_str("java.lang.String"),
            invoke(static_method(
                OWNER,
                "class$",
                vec![Type::string()],
                class_type.clone(),
            )),
            Op::Dup {
                kind: DupKind::Dup,
            },
            Op::Put { field: cache },
            store(class_type, 1),
            ret_void(),
        ],
    );
    let cfg = decompile_ok(&input);
    assert_eq!(all_stmts(&cfg), vec!["r1 = String.class;", "return;"]);
    assert_eq!(cfg.block_count(), 1);
}

#[test]
fn field_increment_is_postfix() {
    // r1 = this.count++;
    let count = FieldRef {
        owner: Type::object(OWNER),
        name: "count".into(),
        ty: Type::Int,
        flags: AccessFlags::PRIVATE,
    };
    let input = method(
        "next",
        2,
        vec![],
        vec![
            load(Type::object(OWNER), 0),
            Op::Dup {
                kind: DupKind::Dup,
            },
            Op::Get {
                field: count.clone(),
            },
            Op::Dup {
                kind: DupKind::DupX1,
            },
            push_int(1),
            Op::Add { t: Type::Int },
            Op::Put { field: count },
            istore(1),
            ret_void(),
        ],
    );
    let cfg = decompile_ok(&input);
    assert_eq!(all_stmts(&cfg), vec!["r1 = this.count++;", "return;"]);
}

#[test]
fn field_update_uses_compound_form() {
    // this.total += r1;
    let total = FieldRef {
        owner: Type::object(OWNER),
        name: "total".into(),
        ty: Type::Int,
        flags: AccessFlags::PRIVATE,
    };
    let ops = vec![
        load(Type::object(OWNER), 0),
        load(Type::object(OWNER), 0),
        Op::Get {
            field: total.clone(),
        },
        iload(1),
        Op::Add { t: Type::Int },
        Op::Put { field: total },
        ret_void(),
    ];
    let input = method("accumulate", 2, vec![Type::Int], ops);
    let cfg = decompile_ok(&input);
    assert_eq!(all_stmts(&cfg), vec!["this.total += r1;", "return;"]);

    let plain = DecompileOptions {
        compound_assignments: false,
        ..DecompileOptions::default()
    };
    let result = decompile_method(&input, &bcdec_decompiler::NoResolver, &plain);
    let cfg = result.cfg.unwrap();
    assert_eq!(
        all_stmts(&cfg),
        vec!["this.total = this.total + r1;", "return;"]
    );
}

#[test]
fn register_increment_forms() {
    let input = method(
        "bump",
        3,
        vec![Type::Int],
        vec![
            Op::Inc {
                t: Type::Int,
                reg: 1,
                value: 1,
            },
            Op::Inc {
                t: Type::Int,
                reg: 1,
                value: -3,
            },
            iload(1),
            Op::Inc {
                t: Type::Int,
                reg: 1,
                value: 1,
            },
            istore(2),
            ret_void(),
        ],
    );
    let cfg = decompile_ok(&input);
    assert_eq!(
        all_stmts(&cfg),
        vec!["++r1;", "r1 -= 3;", "r2 = r1++;", "return;"]
    );
}

#[test]
fn array_initializer_is_collected() {
    // int[] a = {7, 8};
    let input = method(
        "pair",
        2,
        vec![],
        vec![
            push_int(2),
            Op::NewArray {
                t: Type::Int,
                dims: 1,
            },
            Op::Dup {
                kind: DupKind::Dup,
            },
            push_int(0),
            push_int(7),
            Op::ArrayStore { t: Type::Int },
            Op::Dup {
                kind: DupKind::Dup,
            },
            push_int(1),
            push_int(8),
            Op::ArrayStore { t: Type::Int },
            store(Type::array_of(Type::Int), 1),
            ret_void(),
        ],
    );
    let cfg = decompile_ok(&input);
    assert_eq!(all_stmts(&cfg), vec!["r1 = new int[] {7, 8};", "return;"]);
}

#[test]
fn local_names_and_declarations_come_from_hints() {
    let mut input = method(
        "named",
        3,
        vec![Type::Int],
        vec![iload(1), push_int(2), Op::Mul { t: Type::Int }, istore(2), ret_void()],
    );
    input.info.locals = vec![
        LocalVar {
            reg: 1,
            name: "width".into(),
            ty: Type::Int,
            start_pc: 0,
            end_pc: 5,
        },
        LocalVar {
            reg: 2,
            name: "area".into(),
            ty: Type::Int,
            start_pc: 4,
            end_pc: 5,
        },
    ];
    let cfg = decompile_ok(&input);
    assert_eq!(all_stmts(&cfg), vec!["int area = width * 2;", "return;"]);
}

#[test]
fn catch_handler_declares_the_exception() {
    let io = Type::object("java.io.IOException");
    let mut input = method(
        "guarded",
        2,
        vec![],
        vec![
            call("a"),
            goto(4),
            store(io.clone(), 1),
            call("b"),
            ret_void(),
        ],
    );
    input.exceptions.push(ExceptionRange {
        start_pc: 0,
        end_pc: 2,
        handler_pc: 2,
        catch_type: Some(io),
    });
    let cfg = decompile_ok(&input);
    assert_eq!(
        render::block_stmts(&cfg, bb_at(&cfg, 2)),
        vec!["IOException r1;", "Sample.b();"]
    );
}

#[test]
fn stack_balance_holds_for_every_operation() {
    let input = method(
        "sign",
        3,
        vec![Type::Int],
        vec![
            iload(1),
            push_int(0),
            jcmp(CmpType::Gt, 5),
            push_int(0),
            goto(6),
            push_int(1),
            istore(2),
            ret_void(),
        ],
    );
    let result = decompile_method(
        &input,
        &bcdec_decompiler::NoResolver,
        &DecompileOptions::default(),
    );
    assert!(
        result
            .diagnostics
            .iter()
            .all(|d| !d.message.contains("stack balance")),
        "unexpected diagnostics: {:?}",
        result.diagnostics
    );
}

#[test]
fn register_increment_by_min_value() {
    let input = method(
        "wrap",
        2,
        vec![Type::Int],
        vec![
            Op::Inc {
                t: Type::Int,
                reg: 1,
                value: i64::MIN,
            },
            ret_void(),
        ],
    );
    let cfg = decompile_ok(&input);
    assert_eq!(
        all_stmts(&cfg),
        vec!["r1 += -9223372036854775808;", "return;"]
    );
}

#[test]
fn nested_handlers_name_their_exceptions_apart() {
    // 0: CALL a; 1: RETURN; 2: THROW (catches IOException); 3: THROW (catches any)
    let mut input = method(
        "rethrow",
        1,
        vec![],
        vec![call("a"), ret_void(), Op::Throw, Op::Throw],
    );
    input.exceptions.push(ExceptionRange {
        start_pc: 0,
        end_pc: 1,
        handler_pc: 2,
        catch_type: Some(Type::object("java.io.IOException")),
    });
    input.exceptions.push(ExceptionRange {
        start_pc: 0,
        end_pc: 3,
        handler_pc: 3,
        catch_type: None,
    });
    let cfg = decompile_ok(&input);
    assert_eq!(render::block_stmts(&cfg, bb_at(&cfg, 2)), vec!["throw e2;"]);
    assert_eq!(render::block_stmts(&cfg, bb_at(&cfg, 3)), vec!["throw e3;"]);
}

#[test]
fn jsr_leaves_no_value_in_the_calling_block() {
    // r2 holds an int at the first call site and a String at the second
    let object = Type::object("java.lang.Object");
    let input = method(
        "twoSites",
        4,
        vec![],
        vec![
            push_int(1),
            istore(2),
            Op::Jsr { target: 12 },
            push_str("s"),
            store(Type::string(), 2),
            Op::Jsr { target: 12 },
            load(object.clone(), 2),
            Op::Jcnd {
                t: object,
                cmp: CmpType::Ne,
                target: 10,
            },
            call("a"),
            ret_void(),
            call("b"),
            ret_void(),
            store(Type::ReturnAddress, 3),
            call("c"),
            Op::Ret { reg: 3 },
        ],
    );
    let cfg = decompile_ok(&input);
    assert!(cfg.blocks().all(|bb| bb.ops.is_empty() && bb.stack.is_empty()));
    assert_eq!(render::block_stmts(&cfg, bb_at(&cfg, 0)), vec!["r2 = 1;"]);
    assert_eq!(render::block_stmts(&cfg, bb_at(&cfg, 6)), vec!["if (r2 != null)"]);
    assert_eq!(render::block_stmts(&cfg, bb_at(&cfg, 12)), vec!["Sample.c();"]);
}

#[test]
fn small_rewrite_cap_still_folds_a_ternary() {
    let options = DecompileOptions {
        max_rewrite_iterations: 1,
        ..DecompileOptions::default()
    };
    let input = method(
        "sign",
        3,
        vec![Type::Int],
        vec![
            iload(1),
            push_int(0),
            jcmp(CmpType::Gt, 5),
            push_int(0),
            goto(6),
            push_int(1),
            istore(2),
            ret_void(),
        ],
    );
    let result = decompile_method(&input, &bcdec_decompiler::NoResolver, &options);
    assert!(!result.error, "unexpected errors: {:?}", result.diagnostics);
    assert_eq!(
        all_stmts(result.cfg.as_ref().unwrap()),
        vec!["r2 = r1 > 0 ? 1 : 0;", "return;"]
    );
}
