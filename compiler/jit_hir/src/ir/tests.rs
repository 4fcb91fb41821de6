use pretty_assertions::assert_eq;

use super::*;

fn v(n: u32) -> ValueId {
    ValueId::new(n)
}

fn b(n: u32) -> BlockId {
    BlockId::new(n)
}

fn attr(name: &str) -> AttrRef {
    AttrRef::new(0, name)
}

// ── ID newtypes ─────────────────────────────────────────────

#[test]
fn value_id_display_and_index() {
    assert_eq!(v(7).to_string(), "v7");
    assert_eq!(v(7).index(), 7);
    assert_eq!(v(7).raw(), 7);
    assert!(v(1) < v(2));
}

// ── Effects ─────────────────────────────────────────────────

#[test]
fn side_effects_exclude_allocation() {
    assert!(!Effects::MAY_ALLOCATE.has_side_effects());
    assert!(Effects::MAY_RAISE.has_side_effects());
    assert!(Effects::MAY_DEOPT.has_side_effects());
    assert!(Effects::WRITES_MEMORY.has_side_effects());
    assert!(!Effects::empty().has_side_effects());
}

#[test]
fn effects_per_opcode() {
    let load = InstrKind::LoadAttr {
        dst: v(1),
        obj: v(0),
        attr: attr("x"),
    };
    assert_eq!(load.effects(), Effects::MAY_RAISE);

    let list = InstrKind::MakeSeq {
        dst: v(2),
        kind: SeqKind::List,
        items: vec![v(0)],
    };
    assert_eq!(list.effects(), Effects::MAY_ALLOCATE);

    let generic = InstrKind::Compare {
        dst: v(3),
        kind: CompareKind::Generic,
        op: CompareOp::Equal,
        left: v(0),
        right: v(1),
    };
    let long = InstrKind::Compare {
        kind: CompareKind::Long,
        dst: v(3),
        op: CompareOp::Equal,
        left: v(0),
        right: v(1),
    };
    assert!(generic.effects().has_side_effects());
    assert!(long.effects().is_empty());
}

// ── Operands ────────────────────────────────────────────────

#[test]
fn operand_uses_mark_steals() {
    let store = InstrKind::StoreField {
        obj: v(0),
        value: v(1),
        field: FieldRef {
            offset: 16,
            name: "x".into(),
        },
    };
    assert_eq!(
        store.operand_uses().to_vec(),
        vec![(v(0), Use::Borrow), (v(1), Use::Steal)]
    );

    let call = InstrKind::CallMethod {
        dst: v(5),
        method: v(1),
        receiver: v(2),
        args: vec![v(3), v(3)],
    };
    assert_eq!(call.operands().to_vec(), vec![v(1), v(2), v(3), v(3)]);
    assert_eq!(call.dst(), Some(v(5)));
}

#[test]
fn phi_inputs_are_operands_but_not_uses() {
    let phi = InstrKind::Phi {
        dst: v(3),
        inputs: vec![(b(0), v(1)), (b(1), v(2))],
    };
    assert!(phi.operand_uses().is_empty());
    assert_eq!(phi.operands().to_vec(), vec![v(1), v(2)]);
}

#[test]
fn substitute_leaves_dst_alone() {
    let mut op = InstrKind::BinaryOp {
        dst: v(1),
        op: BinaryOpKind::Add,
        left: v(1),
        right: v(0),
    };
    op.substitute(v(1), v(9));
    assert_eq!(
        op,
        InstrKind::BinaryOp {
            dst: v(1),
            op: BinaryOpKind::Add,
            left: v(9),
            right: v(0),
        }
    );
}

// ── Ownership and types ─────────────────────────────────────

#[test]
fn output_ownership() {
    let arg = InstrKind::LoadArg {
        dst: v(0),
        index: 0,
        name: "x".into(),
    };
    assert_eq!(arg.output_ownership(), OutputOwnership::StableBorrow);
    let field = InstrKind::LoadField {
        dst: v(1),
        obj: v(0),
        field: FieldRef {
            offset: 16,
            name: "x".into(),
        },
        ty: Type::OBJECT,
    };
    assert_eq!(field.output_ownership(), OutputOwnership::BorrowedFromInput);
    assert_eq!(
        InstrKind::Assign { dst: v(2), src: v(1) }.output_ownership(),
        OutputOwnership::AliasOfInput
    );
    assert_eq!(
        InstrKind::Decref { value: v(1) }.output_ownership(),
        OutputOwnership::None
    );
}

#[test]
fn natural_types() {
    let truthy = InstrKind::IsTruthy {
        dst: v(1),
        value: v(0),
    };
    assert_eq!(truthy.natural_type(), Some(Type::of(TypeKind::CBool)));
    let konst = InstrKind::LoadConst {
        dst: v(1),
        ty: Type::long_const(3),
    };
    assert_eq!(konst.natural_type(), Some(Type::long_const(3)));
    assert_eq!(InstrKind::Assign { dst: v(1), src: v(0) }.natural_type(), None);
}

#[test]
fn compare_op_evaluate() {
    assert!(CompareOp::LessThan.evaluate(&1, &2));
    assert!(!CompareOp::GreaterThanEqual.evaluate(&1, &2));
    assert!(CompareOp::Equal.evaluate(&"a", &"a"));
    assert_eq!(CompareOp::from_name("NotEqual"), Some(CompareOp::NotEqual));
    assert_eq!(BinaryOpKind::from_name("Xor"), Some(BinaryOpKind::Xor));
    assert_eq!(BinaryOpKind::from_name("Pow"), None);
}

// ── Terminators ─────────────────────────────────────────────

#[test]
fn terminator_redirect() {
    let mut t = Terminator::CondBranch {
        cond: v(0),
        if_true: b(1),
        if_false: b(1),
    };
    t.redirect(b(1), b(4));
    assert_eq!(t.successors().to_vec(), vec![b(4), b(4)]);
    assert_eq!(t.operand(), Some(v(0)));
    assert!(Terminator::Unreachable.successors().is_empty());
}

// ── Function ────────────────────────────────────────────────

fn diamond() -> Function {
    let mut func = Function::new("f", CompileMode::Dynamic);
    func.push_block(
        vec![Instr::new(InstrKind::LoadArg {
            dst: v(0),
            index: 0,
            name: "x".into(),
        })],
        Terminator::CondBranch {
            cond: v(0),
            if_true: b(1),
            if_false: b(2),
        },
    );
    func.push_block(vec![], Terminator::Branch { target: b(3) });
    func.push_block(vec![], Terminator::Branch { target: b(3) });
    func.push_block(
        vec![Instr::new(InstrKind::Phi {
            dst: v(1),
            inputs: vec![(b(1), v(0)), (b(2), v(0))],
        })],
        Terminator::Return { value: v(1) },
    );
    func
}

#[test]
fn push_block_assigns_labels() {
    let func = diamond();
    let labels: Vec<u32> = func.blocks.iter().map(|b| b.label).collect();
    assert_eq!(labels, vec![0, 1, 2, 3]);
    assert_eq!(func.next_label(), 4);
    assert_eq!(func.block_by_label(2), Some(b(2)));
    assert_eq!(func.block_by_label(9), None);
}

#[test]
fn retain_blocks_remaps_targets_and_phis() {
    let mut func = diamond();
    // Make bb 2 unreachable, then drop it.
    func.block_mut(b(0)).terminator = Terminator::Branch { target: b(1) };
    func.retain_blocks(&[true, true, false, true]);

    assert_eq!(func.blocks.len(), 3);
    assert_eq!(func.blocks[2].label, 3);
    assert_eq!(
        func.blocks[1].terminator,
        Terminator::Branch { target: b(2) }
    );
    assert_eq!(
        func.blocks[2].body[0].kind,
        InstrKind::Phi {
            dst: v(1),
            inputs: vec![(b(1), v(0))],
        }
    );
}

#[test]
fn value_types_default_to_object() {
    let mut func = Function::new("f", CompileMode::Dynamic);
    assert_eq!(func.value_type(v(3)), &Type::OBJECT);
    func.set_value_type(v(3), Type::long_const(1));
    assert_eq!(func.value_type(v(3)), &Type::long_const(1));
    assert_eq!(func.value_type(v(2)), &Type::OBJECT);
    let fresh = func.fresh_value(Type::of(TypeKind::CBool));
    assert_eq!(fresh, v(4));
}

#[test]
fn replace_uses_reaches_terminators() {
    let mut func = diamond();
    func.replace_uses(v(1), v(0));
    assert_eq!(func.blocks[3].terminator, Terminator::Return { value: v(0) });
}

#[test]
fn has_refcounts_sees_unwind() {
    let mut func = diamond();
    assert!(!func.has_refcounts());
    func.blocks[0].body[0].unwind.push(v(0));
    assert!(func.has_refcounts());
}

#[test]
fn class_chain_resolution() {
    let mut func = Function::new("f", CompileMode::Static);
    let mut base = ClassDef::new("Base");
    base.slots.push(Slot {
        name: "x".into(),
        ty: Type::of(TypeKind::Long),
        offset: 16,
    });
    base.methods.push("area".into());
    let mut derived = ClassDef::new("Derived");
    derived.base = Some("Base".into());
    derived.methods.push("name".into());
    func.classes = vec![base, derived];

    assert_eq!(func.resolve_slot("Derived", "x").map(|s| s.offset), Some(16));
    assert_eq!(
        func.resolve_method("Derived", "area").map(|c| c.name.as_str()),
        Some("Base")
    );
    assert!(func.resolve_method("Base", "name").is_none());
    assert!(func.resolve_slot("Missing", "x").is_none());
}

#[test]
fn class_chain_stops_on_cycle() {
    let mut func = Function::new("f", CompileMode::Static);
    let mut a = ClassDef::new("A");
    a.base = Some("B".into());
    let mut c = ClassDef::new("B");
    c.base = Some("A".into());
    func.classes = vec![a, c];
    assert_eq!(func.class_chain("A").len(), 2);
}
