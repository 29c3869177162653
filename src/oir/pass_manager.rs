//! The guarded pass runner (§4.6.2, §4.6.4): every pass in [`super::passes`]
//! runs through [`run_guarded_pass_once`] or [`run_guarded_pass_fixpoint`]
//! rather than being called directly, so a pass that leaves the module in
//! an invalid state never escapes [`super::pipeline::run_pipeline`].

use std::collections::HashMap;

use crate::ids::{InstId, ValueId};

use super::verifier::{verify_pipeline_invariants, Violation};
use super::Module;

/// Whether a guarded pass run changed the module (used by the fixpoint
/// runner to stop early, and by the pipeline driver's `tracing::debug!`
/// trail).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    Applied,
    NoChange,
    RolledBack,
}

/// Runs `pass` once against a snapshot of `m`. If the result still
/// satisfies [`verify_pipeline_invariants`], the snapshot is committed back
/// into `m`; otherwise `m` is left untouched and the violations are
/// returned for the caller to log (§4.6.4: rollback is always safe, the
/// verifier is authoritative).
pub fn run_guarded_pass_once(
    m: &mut Module,
    require_loop_fixpoint: bool,
    pass: impl FnOnce(&mut Module) -> bool,
) -> (PassOutcome, Vec<Violation>) {
    let mut candidate = m.clone();
    let changed = pass(&mut candidate);
    if !changed {
        return (PassOutcome::NoChange, Vec::new());
    }
    let violations = verify_pipeline_invariants(&candidate, require_loop_fixpoint);
    if violations.is_empty() {
        *m = candidate;
        (PassOutcome::Applied, Vec::new())
    } else {
        (PassOutcome::RolledBack, violations)
    }
}

/// Runs `pass` repeatedly, re-verifying and re-snapshotting each round,
/// until it reports no change, a round fails verification, or
/// `max_rounds` is reached (§4.6.2). Stops at the last known-good state;
/// never leaves `m` mutated by a round that failed to verify.
pub fn run_guarded_pass_fixpoint(
    m: &mut Module,
    require_loop_fixpoint: bool,
    max_rounds: u32,
    mut pass: impl FnMut(&mut Module) -> bool,
) -> u32 {
    let mut rounds = 0;
    while rounds < max_rounds {
        let (outcome, _violations) = run_guarded_pass_once(m, require_loop_fixpoint, &mut pass);
        rounds += 1;
        match outcome {
            PassOutcome::Applied => continue,
            PassOutcome::NoChange | PassOutcome::RolledBack => break,
        }
    }
    rounds
}

/// Fixed-point operand replacement (§4.6.3): rewrites every operand in
/// `repl`'s domain to its image, chasing chains (`a -> b -> c` rewrites a
/// direct use of `a` to `c`) up to 64 hops to guard against an
/// accidentally cyclic replacement map.
pub fn rewrite_operands(m: &mut Module, repl: &HashMap<ValueId, ValueId>) {
    const MAX_HOPS: u32 = 64;
    let resolve = |mut v: ValueId| -> ValueId {
        let mut hops = 0;
        while let Some(&next) = repl.get(&v) {
            if next == v || hops >= MAX_HOPS {
                break;
            }
            v = next;
            hops += 1;
        }
        v
    };

    for iid in m.inst_ids() {
        let rewritten = rewrite_inst_operands(m, iid, &resolve);
        if let Some((kind, effect)) = rewritten {
            m.replace_inst(iid, kind, effect);
        }
    }

    for b in m.block_ids() {
        let new_term = m.block(b).term.clone().map(|t| rewrite_terminator(t, &resolve));
        if let Some(t) = new_term {
            m.set_terminator(b, t);
        }
    }
}

fn rewrite_inst_operands(
    m: &Module,
    iid: InstId,
    resolve: &impl Fn(ValueId) -> ValueId,
) -> Option<(super::InstKind, super::EffectTag)> {
    use super::InstKind::*;
    let inst = m.inst(iid);
    let effect = inst.effect;
    let kind = match &inst.kind {
        Unary { op, operand } => Unary { op: *op, operand: resolve(*operand) },
        Binop { op, lhs, rhs } => Binop { op: *op, lhs: resolve(*lhs), rhs: resolve(*rhs) },
        Cast { kind, operand, target_ty } => Cast { kind: *kind, operand: resolve(*operand), target_ty: *target_ty },
        Call { target, args } => Call {
            target: match target {
                super::CallTarget::Indirect(v) => super::CallTarget::Indirect(resolve(*v)),
                super::CallTarget::Direct(f) => super::CallTarget::Direct(*f),
            },
            args: args.iter().map(|&a| resolve(a)).collect(),
        },
        Index { base, index } => Index { base: resolve(*base), index: resolve(*index) },
        Field { base, field_index } => Field { base: resolve(*base), field_index: *field_index },
        Load { addr } => Load { addr: resolve(*addr) },
        Store { addr, value } => Store { addr: resolve(*addr), value: resolve(*value) },
        ConstInt(_) | ConstBool(_) | ConstText(_) | ConstNull | AllocaLocal(_) | FuncRef(_) | GlobalRef(_) => {
            return None
        }
    };
    Some((kind, effect))
}

fn rewrite_terminator(t: super::Terminator, resolve: &impl Fn(ValueId) -> ValueId) -> super::Terminator {
    use super::Terminator::*;
    match t {
        Ret { has_value, value } => Ret { has_value, value: resolve(value) },
        Br { target, args } => Br { target, args: args.into_iter().map(resolve).collect() },
        CondBr { cond, then_bb, then_args, else_bb, else_args } => CondBr {
            cond: resolve(cond),
            then_bb,
            then_args: then_args.into_iter().map(resolve).collect(),
            else_bb,
            else_args: else_args.into_iter().map(resolve).collect(),
        },
    }
}

/// Dense, `ValueId`-indexed use counts across the whole module (§4.6.3).
/// `dce_pure_insts` removes an instruction once its result's count drops
/// to zero and its effect is `Pure`.
pub fn build_use_count(m: &Module) -> Vec<u32> {
    let mut counts = vec![0u32; m.value_count()];
    let mut bump = |v: ValueId| counts[v.index()] += 1;

    for iid in m.inst_ids() {
        use super::InstKind::*;
        match &m.inst(iid).kind {
            Unary { operand, .. } => bump(*operand),
            Binop { lhs, rhs, .. } => {
                bump(*lhs);
                bump(*rhs);
            }
            Cast { operand, .. } => bump(*operand),
            Call { target, args } => {
                if let super::CallTarget::Indirect(v) = target {
                    bump(*v);
                }
                for &a in args {
                    bump(a);
                }
            }
            Index { base, index } => {
                bump(*base);
                bump(*index);
            }
            Field { base, .. } => bump(*base),
            Load { addr } => bump(*addr),
            Store { addr, value } => {
                bump(*addr);
                bump(*value);
            }
            ConstInt(_) | ConstBool(_) | ConstText(_) | ConstNull | AllocaLocal(_) | FuncRef(_) | GlobalRef(_) => {}
        }
    }
    for b in m.block_ids() {
        if let Some(term) = &m.block(b).term {
            match term {
                super::Terminator::Ret { has_value: true, value } => bump(*value),
                super::Terminator::Ret { has_value: false, .. } => {}
                super::Terminator::Br { args, .. } => args.iter().for_each(|&a| bump(a)),
                super::Terminator::CondBr { cond, then_args, else_args, .. } => {
                    bump(*cond);
                    then_args.iter().chain(else_args).for_each(|&a| bump(a));
                }
            }
        }
    }
    counts
}

/// §4.6.3's constant-detection rule: only an instruction's result can be a
/// constant-foldable value — a block parameter is, by construction, never
/// one (it may be bound to different values on different incoming edges).
pub fn is_constant_candidate(m: &Module, v: ValueId) -> bool {
    m.value_is_inst_result(v)
}
