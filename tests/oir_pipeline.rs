//! End-to-end OIR fixtures (§8.3): a hand-built module stands in for
//! whatever SIR -> OIR lowering stage a driver puts in front of this
//! crate, since that lowering isn't this crate's own responsibility (see
//! the pipeline note in `gaupel_core::lib`).

use gaupel_core::ast::CastKind;
use gaupel_core::oir::pass_manager::{run_guarded_pass_once, PassOutcome};
use gaupel_core::oir::verifier::verify_pipeline_invariants;
use gaupel_core::oir::{passes, EffectTag, EscapeHint, InstKind, Module, Terminator};
use gaupel_core::types::{Builtin, TypePool};

fn int_ty() -> (TypePool, gaupel_core::ids::TypeId, gaupel_core::ids::TypeId) {
    let mut types = TypePool::default();
    let i32_ty = types.builtin(Builtin::I32);
    let bool_ty = types.builtin(Builtin::Bool);
    (types, i32_ty, bool_ty)
}

/// `entry` allocas a counter, stores 0, then loops incrementing it in
/// `body` until `header`'s guard is false; `exit` reads the final value.
/// `global_mem2reg_ssa` should erase every `alloca`/`Load`/`Store` against
/// it and thread the value through a single block parameter on `header`.
#[test]
fn mem2reg_promotes_local_counter() {
    let (_types, i32_ty, bool_ty) = int_ty();
    let mut m = Module::new();
    let f = m.new_func("count_up".into(), vec![], i32_ty);
    let entry = m.func(f).entry;
    let header = m.new_block();
    let body = m.new_block();
    let exit = m.new_block();
    m.add_block_to_func(f, header);
    m.add_block_to_func(f, body);
    m.add_block_to_func(f, exit);

    let (_, zero) = m.push_inst(entry, InstKind::ConstInt(0), EffectTag::Pure, Some(i32_ty));
    let (_, slot) = m.push_inst(
        entry,
        InstKind::AllocaLocal(gaupel_core::oir::AllocaLocal { ty: i32_ty }),
        EffectTag::Pure,
        Some(i32_ty),
    );
    let slot = slot.unwrap();
    m.push_inst(entry, InstKind::Store { addr: slot, value: zero.unwrap() }, EffectTag::MayWriteMem, None);
    m.set_terminator(entry, Terminator::Br { target: header, args: vec![] });

    let (_, hv) = m.push_inst(header, InstKind::Load { addr: slot }, EffectTag::MayReadMem, Some(i32_ty));
    let (_, ten) = m.push_inst(header, InstKind::ConstInt(10), EffectTag::Pure, Some(i32_ty));
    let (_, cond) = m.push_inst(
        header,
        InstKind::Binop { op: gaupel_core::ast::Op::Lt, lhs: hv.unwrap(), rhs: ten.unwrap() },
        EffectTag::Pure,
        Some(bool_ty),
    );
    m.set_terminator(
        header,
        Terminator::CondBr { cond: cond.unwrap(), then_bb: body, then_args: vec![], else_bb: exit, else_args: vec![] },
    );

    let (_, bv) = m.push_inst(body, InstKind::Load { addr: slot }, EffectTag::MayReadMem, Some(i32_ty));
    let (_, one) = m.push_inst(body, InstKind::ConstInt(1), EffectTag::Pure, Some(i32_ty));
    let (_, next) = m.push_inst(
        body,
        InstKind::Binop { op: gaupel_core::ast::Op::Add, lhs: bv.unwrap(), rhs: one.unwrap() },
        EffectTag::Pure,
        Some(i32_ty),
    );
    m.push_inst(body, InstKind::Store { addr: slot, value: next.unwrap() }, EffectTag::MayWriteMem, None);
    m.set_terminator(body, Terminator::Br { target: header, args: vec![] });

    let (_, fv) = m.push_inst(exit, InstKind::Load { addr: slot }, EffectTag::MayReadMem, Some(i32_ty));
    m.set_terminator(exit, Terminator::Ret { has_value: true, value: fv.unwrap() });

    assert!(verify_pipeline_invariants(&m, true).is_empty(), "fixture itself must start out legal");

    let (outcome, violations) = run_guarded_pass_once(&mut m, true, passes::global_mem2reg_ssa);
    assert_eq!(outcome, PassOutcome::Applied, "mem2reg should commit: {violations:?}");

    assert_eq!(m.block(header).params.len(), 1, "header should gain exactly one phi param for the counter");
    for b in [entry, header, body, exit] {
        for iid in m.block(b).insts.iter().copied() {
            assert!(
                !matches!(m.inst(iid).kind, InstKind::AllocaLocal(_) | InstKind::Load { .. } | InstKind::Store { .. }),
                "promoted local should leave no alloca/load/store behind in {b:?}"
            );
        }
    }
    assert!(verify_pipeline_invariants(&m, true).is_empty());
}

/// A `CondBr` out of `entry` into a shared `join` block with two
/// predecessors is a critical edge; `split_critical_edges` must insert a
/// forwarding block on it rather than leaving the edge critical.
#[test]
fn split_critical_edges_inserts_a_forwarding_block() {
    let (_types, i32_ty, bool_ty) = int_ty();
    let mut m = Module::new();
    let f = m.new_func("branch".into(), vec![], i32_ty);
    let entry = m.func(f).entry;
    let other_pred = m.new_block();
    let join = m.new_block();
    m.add_block_to_func(f, other_pred);
    m.add_block_to_func(f, join);

    let (_, c) = m.push_inst(entry, InstKind::ConstBool(true), EffectTag::Pure, Some(bool_ty));
    m.set_terminator(
        entry,
        Terminator::CondBr { cond: c.unwrap(), then_bb: join, then_args: vec![], else_bb: other_pred, else_args: vec![] },
    );
    m.set_terminator(other_pred, Terminator::Br { target: join, args: vec![] });
    let (_, zero) = m.push_inst(join, InstKind::ConstInt(0), EffectTag::Pure, Some(i32_ty));
    m.set_terminator(join, Terminator::Ret { has_value: true, value: zero.unwrap() });

    let before = m.block_count();
    let (outcome, violations) = run_guarded_pass_once(&mut m, true, passes::split_critical_edges);
    assert_eq!(outcome, PassOutcome::Applied, "split should commit: {violations:?}");
    assert!(m.block_count() > before, "a new forwarding block should have been created");

    match m.block(entry).term.as_ref().unwrap() {
        Terminator::CondBr { then_bb, .. } => assert_ne!(*then_bb, join, "the then-edge into `join` should be redirected through the split block"),
        _ => panic!("expected CondBr"),
    }
}

/// `total = fixed_cost * 2` is loop-invariant inside a natural loop whose
/// header already has a single external predecessor (the canonical
/// preheader); `licm` should hoist it there.
#[test]
fn licm_hoists_invariant_computation_to_preheader() {
    let (_types, i32_ty, bool_ty) = int_ty();
    let mut m = Module::new();
    let f = m.new_func("loopy".into(), vec![], i32_ty);
    let preheader = m.func(f).entry;
    let header = m.new_block();
    let exit = m.new_block();
    m.add_block_to_func(f, header);
    m.add_block_to_func(f, exit);

    let (_, fixed_cost) = m.push_inst(preheader, InstKind::ConstInt(21), EffectTag::Pure, Some(i32_ty));
    m.set_terminator(preheader, Terminator::Br { target: header, args: vec![] });

    let (_, two) = m.push_inst(header, InstKind::ConstInt(2), EffectTag::Pure, Some(i32_ty));
    let (invariant_iid, _total) = m.push_inst(
        header,
        InstKind::Binop { op: gaupel_core::ast::Op::Mul, lhs: fixed_cost.unwrap(), rhs: two.unwrap() },
        EffectTag::Pure,
        Some(i32_ty),
    );
    let (_, cond) = m.push_inst(header, InstKind::ConstBool(false), EffectTag::Pure, Some(bool_ty));
    m.set_terminator(
        header,
        Terminator::CondBr { cond: cond.unwrap(), then_bb: header, then_args: vec![], else_bb: exit, else_args: vec![] },
    );
    m.set_terminator(exit, Terminator::Ret { has_value: false, value: gaupel_core::ids::ValueId::INVALID });

    assert!(verify_pipeline_invariants(&m, true).is_empty());
    let (outcome, violations) = run_guarded_pass_once(&mut m, true, passes::licm);
    assert_eq!(outcome, PassOutcome::Applied, "licm should commit: {violations:?}");
    assert!(!m.block(header).insts.contains(&invariant_iid), "invariant computation should move out of the header");
    assert!(m.block(preheader).insts.contains(&invariant_iid), "invariant computation should land in the preheader");
}

/// A pass closure that corrupts a terminator's argument arity must never
/// be allowed to commit: the guarded runner snapshots, runs, re-verifies,
/// and rolls back to the pre-pass module on any violation.
#[test]
fn guarded_pass_rolls_back_on_injected_violation() {
    let (_types, i32_ty, _bool_ty) = int_ty();
    let mut m = Module::new();
    let f = m.new_func("broken".into(), vec![], i32_ty);
    let entry = m.func(f).entry;
    let target = m.new_block();
    m.add_block_to_func(f, target);
    m.add_block_param(target, i32_ty, EffectTag::Pure);
    let (_, zero) = m.push_inst(entry, InstKind::ConstInt(0), EffectTag::Pure, Some(i32_ty));
    m.set_terminator(entry, Terminator::Br { target, args: vec![zero.unwrap()] });
    let (_, one) = m.push_inst(target, InstKind::ConstInt(1), EffectTag::Pure, Some(i32_ty));
    m.set_terminator(target, Terminator::Ret { has_value: true, value: one.unwrap() });
    assert!(verify_pipeline_invariants(&m, true).is_empty());

    let before = m.clone();
    let (outcome, violations) = run_guarded_pass_once(&mut m, true, |m| {
        // Drop the branch argument entirely: `target` still expects one.
        m.set_terminator(entry, Terminator::Br { target, args: vec![] });
        true
    });
    assert_eq!(outcome, PassOutcome::RolledBack);
    assert!(!violations.is_empty());
    assert_eq!(m.block(entry).term, before.block(entry).term, "module must be restored to its pre-pass state");
}

/// `gvn_cse` reuses a dominating pure computation instead of recomputing
/// the same operator over the same operands.
#[test]
fn gvn_cse_deduplicates_identical_pure_computation() {
    let (_types, i32_ty, _bool_ty) = int_ty();
    let mut m = Module::new();
    let f = m.new_func("dup".into(), vec![], i32_ty);
    let entry = m.func(f).entry;
    let (_, a) = m.push_inst(entry, InstKind::ConstInt(3), EffectTag::Pure, Some(i32_ty));
    let (_, b) = m.push_inst(entry, InstKind::ConstInt(4), EffectTag::Pure, Some(i32_ty));
    let (first, _) = m.push_inst(
        entry,
        InstKind::Binop { op: gaupel_core::ast::Op::Add, lhs: a.unwrap(), rhs: b.unwrap() },
        EffectTag::Pure,
        Some(i32_ty),
    );
    let (second, _) = m.push_inst(
        entry,
        InstKind::Binop { op: gaupel_core::ast::Op::Add, lhs: a.unwrap(), rhs: b.unwrap() },
        EffectTag::Pure,
        Some(i32_ty),
    );
    let v2 = m.inst(second).result.unwrap();
    m.set_terminator(entry, Terminator::Ret { has_value: true, value: v2 });

    let (outcome, violations) = run_guarded_pass_once(&mut m, true, passes::gvn_cse);
    assert_eq!(outcome, PassOutcome::Applied, "gvn_cse should commit: {violations:?}");
    assert!(!m.block(entry).insts.contains(&second), "the duplicate add should be removed");
    match m.block(entry).term.as_ref().unwrap() {
        Terminator::Ret { value, .. } => {
            assert_eq!(*value, m.inst(first).result.unwrap(), "the return should now read the first add's result");
        }
        _ => panic!("expected Ret"),
    }
}

/// An escape-hinted value cast back to its own type with `as` is a pure
/// peephole: `optimize_escape_handles` should retire the cast and rewrite
/// its uses to read the hinted value directly.
#[test]
fn optimize_escape_handles_retires_identity_cast_over_hinted_value() {
    let (_types, i32_ty, _bool_ty) = int_ty();
    let mut m = Module::new();
    let f = m.new_func("passthrough".into(), vec![], i32_ty);
    let entry = m.func(f).entry;
    let (_, escaped) = m.push_inst(entry, InstKind::ConstInt(7), EffectTag::Pure, Some(i32_ty));
    let escaped = escaped.unwrap();
    m.escape_hints.push(EscapeHint { value_id: escaped });

    let (cast_iid, cast_result) = m.push_inst(
        entry,
        InstKind::Cast { kind: CastKind::Strict, operand: escaped, target_ty: i32_ty },
        EffectTag::Pure,
        Some(i32_ty),
    );
    m.set_terminator(entry, Terminator::Ret { has_value: true, value: cast_result.unwrap() });

    let (outcome, violations) = run_guarded_pass_once(&mut m, true, passes::optimize_escape_handles);
    assert_eq!(outcome, PassOutcome::Applied, "escape-handle peephole should commit: {violations:?}");
    assert!(!m.block(entry).insts.contains(&cast_iid), "the identity cast should be retired");
    match m.block(entry).term.as_ref().unwrap() {
        Terminator::Ret { value, .. } => assert_eq!(*value, escaped, "the return should read the hinted value directly"),
        _ => panic!("expected Ret"),
    }
}
