mod common;

use bcdec_decompiler::{DecompileOptions, NoResolver, decompile_method};
use bcdec_ir::*;
use common::all_stmts;

const FIXTURE: &str = r#"
- info:
    name: sign
    owner: demo.Sample
    regs: 3
    max_stack: 1
    params: [int]
  ops:
    - {pc: 0, op: Load, t: int, reg: 1}
    - {pc: 1, op: Jcnd, t: int, cmp: Le, target: 4}
    - {pc: 2, op: Push, t: int, value: 1}
    - {pc: 3, op: Goto, target: 5}
    - {pc: 4, op: Push, t: int, value: 0}
    - {pc: 5, op: Store, t: int, reg: 2}
    - {pc: 6, op: Return, t: void}
- info:
    name: greet
    owner: demo.Sample
    regs: 1
    max_stack: 2
    is_static: true
    ret: java.lang.String
  ops:
    - {pc: 0, op: Push, t: java.lang.String, value: "hi", line: 3}
    - {pc: 1, op: Invoke, method: {owner: demo.Sample, name: wrap, params: [java.lang.String], ret: java.lang.String, flags: STATIC}, line: 3}
    - {pc: 2, op: Return, t: java.lang.String, line: 4}
"#;

fn load() -> Vec<MethodInput> {
    serde_yaml::from_str(FIXTURE).expect("fixture parses")
}

#[test]
fn fixture_fields_are_read() {
    let methods = load();
    assert_eq!(methods.len(), 2);

    let sign = &methods[0].info;
    assert!(!sign.is_static);
    assert_eq!(sign.params, vec![Type::Int]);
    assert_eq!(sign.param_regs(), vec![1]);
    assert_eq!(sign.ret, Type::Void);

    let greet = &methods[1];
    assert!(greet.info.is_static);
    assert_eq!(greet.info.ret, Type::string());
    assert_eq!(greet.ops[0].line, 3);
    assert_eq!(methods[0].ops[0].line, -1);
    let Op::Invoke { method, direct } = &greet.ops[1].op else {
        panic!("expected invoke, got {:?}", greet.ops[1].op);
    };
    assert!(!direct);
    assert!(method.is_static());
    assert_eq!(method.params, vec![Type::string()]);
}

#[test]
fn fixture_methods_decompile() {
    let options = DecompileOptions::default();
    let stmts: Vec<Vec<String>> = load()
        .iter()
        .map(|m| {
            let result = decompile_method(m, &NoResolver, &options);
            assert!(!result.error, "{}: {:?}", result.name, result.diagnostics);
            all_stmts(result.cfg.as_ref().unwrap())
        })
        .collect();
    // the jump condition stays as written, arms in jump order
    assert_eq!(stmts[0], vec!["r2 = r1 <= 0 ? 0 : 1;", "return;"]);
    assert_eq!(stmts[1], vec!["return Sample.wrap(\"hi\");"]);
}

#[test]
fn options_default_missing_fields() {
    let options: DecompileOptions = serde_yaml::from_str("compound_assignments: false").unwrap();
    assert!(!options.compound_assignments);
    assert!(options.string_switch);
    assert_eq!(options.max_dataflow_iterations, 1000);
}
