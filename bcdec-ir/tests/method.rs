use bcdec_ir::{MethodInfo, Type};

fn instance(regs: usize, max_stack: usize, params: Vec<Type>) -> MethodInfo {
    let mut info = MethodInfo::new("m", regs, max_stack);
    info.is_static = false;
    info.params = params;
    info
}

#[test]
fn stack_machine_params_start_after_this() {
    let info = instance(6, 4, vec![Type::Long, Type::Int]);
    assert_eq!(info.this_reg(), Some(0));
    assert_eq!(info.param_regs(), vec![1, 3]);
}

#[test]
fn register_machine_params_are_right_aligned() {
    // r0, r1 locals; r2 this; r3-r4 long; r5 int
    let info = instance(6, 0, vec![Type::Long, Type::Int]);
    assert!(info.is_register_machine());
    assert_eq!(info.this_reg(), Some(2));
    assert_eq!(info.param_regs(), vec![3, 5]);

    let mut info = info;
    info.is_static = true;
    assert_eq!(info.this_reg(), None);
    assert_eq!(info.param_regs(), vec![3, 5]);
}

#[test]
fn register_machine_fills_from_the_top() {
    let info = instance(3, 0, vec![Type::Double]);
    assert_eq!(info.this_reg(), Some(0));
    assert_eq!(info.param_regs(), vec![1]);

    let info = instance(4, 0, Vec::new());
    assert_eq!(info.this_reg(), Some(3));
    assert!(info.param_regs().is_empty());
}
