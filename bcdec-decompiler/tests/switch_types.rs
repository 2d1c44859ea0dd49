mod common;

use std::collections::BTreeMap;

use bcdec_decompiler::ClassResolver;
use bcdec_decompiler::switch_types::{extract_index_to_enum, match_enum_switch};
use bcdec_ir::*;
use common::*;

fn case_labels(cfg: &Cfg, head: BbId) -> Vec<(usize, Vec<CaseValue>)> {
    cfg.outs(head)
        .filter_map(|e| Some((cfg.block(e.end).pc, e.case_values()?.to_vec())))
        .collect()
}

/// `switch (s) { case "a": a(); break; case "b": b(); break; default: c(); }`
/// in the single-switch hash form.
fn string_switch() -> MethodInput {
    let string = "java.lang.String";
    let hash_code = virtual_method(string, "hashCode", vec![], Type::Int);
    let equals = virtual_method(
        string,
        "equals",
        vec![Type::object("java.lang.Object")],
        Type::Boolean,
    );
    let equals_jump = |target| Op::Jcnd {
        t: Type::Boolean,
        cmp: CmpType::Ne,
        target,
    };
    method(
        "dispatch",
        2,
        vec![Type::string()],
        vec![
            load(Type::string(), 1),
            invoke(hash_code),
            Op::Switch {
                keys: vec![types::java_string_hash("a"), types::java_string_hash("b")],
                targets: vec![3, 8],
                default_target: 17,
            },
            load(Type::string(), 1),
            push_str("a"),
            invoke(equals.clone()),
            equals_jump(13),
            goto(17),
            load(Type::string(), 1),
            push_str("b"),
            invoke(equals),
            equals_jump(15),
            goto(17),
            call("a"),
            goto(18),
            call("b"),
            goto(18),
            call("c"),
            ret_void(),
        ],
    )
}

#[test]
fn string_switch_is_recovered() {
    let cfg = decompile_ok(&string_switch());
    let head = bb_at(&cfg, 0);
    assert_eq!(render_head(&cfg, head), "switch (r1)");
    assert_eq!(
        case_labels(&cfg, head),
        vec![
            (13, vec![CaseValue::Str("a".into())]),
            (15, vec![CaseValue::Str("b".into())]),
            (17, vec![CaseValue::Default]),
        ]
    );
    for pc in [3, 7, 8, 12] {
        assert!(cfg.block_at(pc).is_none(), "hash block at {pc} should be gone");
    }
}

#[test]
fn string_switch_can_be_disabled() {
    let options = bcdec_decompiler::DecompileOptions {
        string_switch: false,
        ..Default::default()
    };
    let result = bcdec_decompiler::decompile_method(
        &string_switch(),
        &bcdec_decompiler::NoResolver,
        &options,
    );
    let cfg = result.cfg.unwrap();
    let head = bb_at(&cfg, 0);
    assert_eq!(render_head(&cfg, head), "switch (r1.hashCode())");
    assert!(cfg.block_at(3).is_some());
}

fn render_head(cfg: &Cfg, head: BbId) -> String {
    bcdec_decompiler::render::block_stmts(cfg, head)
        .pop()
        .unwrap_or_default()
}

struct ColorMaps;

impl ClassResolver for ColorMaps {
    fn enum_switch_map(
        &self,
        owner: &Type,
        member: &str,
        enum_type: &Type,
    ) -> Option<BTreeMap<i32, String>> {
        if owner != &Type::object("demo.Sample$1")
            || member != "$SwitchMap$demo$Color"
            || enum_type != &Type::object("demo.Color")
        {
            return None;
        }
        Some(BTreeMap::from([(1, "RED".into()), (2, "GREEN".into())]))
    }
}

/// `switch (color) { case RED: a(); break; case GREEN: b(); break; default: c(); }`
fn enum_switch(keys: Vec<i32>) -> MethodInput {
    let color = Type::object("demo.Color");
    let targets = vec![5, 7][..keys.len()].to_vec();
    method(
        "paint",
        2,
        vec![color.clone()],
        vec![
            Op::Get {
                field: FieldRef {
                    owner: Type::object("demo.Sample$1"),
                    name: "$SwitchMap$demo$Color".into(),
                    ty: Type::array_of(Type::Int),
                    flags: AccessFlags::STATIC | AccessFlags::SYNTHETIC,
                },
            },
            load(color, 1),
            invoke(virtual_method("demo.Color", "ordinal", vec![], Type::Int)),
            Op::ArrayLoad { t: Type::Int },
            Op::Switch {
                keys,
                targets,
                default_target: 9,
            },
            call("a"),
            goto(10),
            call("b"),
            goto(10),
            call("c"),
            ret_void(),
        ],
    )
}

#[test]
fn enum_switch_is_recovered() {
    let result = decompile_with(&enum_switch(vec![1, 2]), &ColorMaps);
    assert!(!result.error, "{:?}", result.diagnostics);
    let cfg = result.cfg.unwrap();
    let head = bb_at(&cfg, 0);
    assert_eq!(render_head(&cfg, head), "switch (r1)");
    assert_eq!(
        case_labels(&cfg, head),
        vec![
            (5, vec![CaseValue::Enum("RED".into())]),
            (7, vec![CaseValue::Enum("GREEN".into())]),
            (9, vec![CaseValue::Default]),
        ]
    );
}

#[test]
fn enum_switch_is_all_or_nothing() {
    // index 3 is not in the map
    let result = decompile_with(&enum_switch(vec![1, 3]), &ColorMaps);
    let cfg = result.cfg.unwrap();
    let head = bb_at(&cfg, 0);
    assert!(
        render_head(&cfg, head).ends_with(".$SwitchMap$demo$Color[r1.ordinal()])"),
        "{}",
        render_head(&cfg, head)
    );
    assert_eq!(
        case_labels(&cfg, head)[..2],
        [(5, vec![CaseValue::Int(1)]), (7, vec![CaseValue::Int(3)])]
    );
}

#[test]
fn enum_switch_without_resolver_keeps_int_cases() {
    let cfg = decompile_ok(&enum_switch(vec![1, 2]));
    let head = bb_at(&cfg, 0);
    assert!(
        case_labels(&cfg, head)
            .iter()
            .all(|(_, values)| !values.iter().any(|v| matches!(v, CaseValue::Enum(_))))
    );
}

#[test]
fn enum_switch_discriminant_shapes() {
    let ordinal = Expr::Call {
        receiver: Box::new(Expr::var("c")),
        name: "ordinal".into(),
        args: vec![],
    };
    let field_map = Expr::ArrayAccess {
        array: Box::new(Expr::Field {
            object: Box::new(Expr::TypeName(Type::object("demo.Sample$1"))),
            name: "$SwitchMap$demo$Color".into(),
        }),
        index: Box::new(ordinal.clone()),
    };
    let switch = match_enum_switch(&field_map).unwrap();
    assert_eq!(switch.owner, Type::object("demo.Sample$1"));
    assert_eq!(switch.member, "$SwitchMap$demo$Color");
    assert_eq!(switch.value, Expr::var("c"));

    let table = Expr::ArrayAccess {
        array: Box::new(Expr::Call {
            receiver: Box::new(Expr::TypeName(Type::object("demo.Sample"))),
            name: "$SWITCH_TABLE$demo$Color".into(),
            args: vec![],
        }),
        index: Box::new(ordinal),
    };
    assert_eq!(
        match_enum_switch(&table).map(|s| s.member),
        Some("$SWITCH_TABLE$demo$Color".to_string())
    );

    assert!(match_enum_switch(&Expr::var("x")).is_none());
}

#[test]
fn switch_map_initializer_is_decoded() {
    let color = Type::object("demo.Color");
    let map = FieldRef {
        owner: Type::object("demo.Sample$1"),
        name: "$SwitchMap$demo$Color".into(),
        ty: Type::array_of(Type::Int),
        flags: AccessFlags::STATIC,
    };
    let constant = |name: &str| Op::Get {
        field: FieldRef {
            owner: color.clone(),
            name: name.into(),
            ty: color.clone(),
            flags: AccessFlags::STATIC | AccessFlags::ENUM,
        },
    };
    let ordinal = || invoke(virtual_method("demo.Color", "ordinal", vec![], Type::Int));
    let ops: Vec<Operation> = [
        Op::Get { field: map.clone() },
        constant("RED"),
        ordinal(),
        push_int(1),
        Op::ArrayStore { t: Type::Int },
        Op::Get { field: map },
        constant("GREEN"),
        ordinal(),
        push_int(2),
        Op::ArrayStore { t: Type::Int },
        ret_void(),
    ]
    .into_iter()
    .enumerate()
    .map(|(pc, op)| Operation::new(pc, op))
    .collect();

    let map = extract_index_to_enum(&ops, &color);
    assert_eq!(
        map,
        BTreeMap::from([(1, "RED".to_string()), (2, "GREEN".to_string())])
    );
    assert!(extract_index_to_enum(&ops, &Type::object("demo.Shape")).is_empty());
}
