//! The thirteen fixed-order passes (§4.6.1). Every function here is a raw
//! transform — `true` if it changed the module, `false` otherwise — meant
//! to be called only through [`super::pass_manager::run_guarded_pass_once`]
//! / [`run_guarded_pass_fixpoint`](super::pass_manager::run_guarded_pass_fixpoint),
//! never directly: none of them re-verify their own output.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::ast::Op;
use crate::ids::{BlockId, FuncId, InstId, ValueId};

use super::pass_manager::{build_use_count, rewrite_operands};
use super::verifier::{dominance_frontiers, dominators, immediate_dominators, inst_operands, natural_loops};
use super::{EffectTag, InstKind, Module, Terminator, ValueDef};

fn reachable_blocks(m: &Module, f: FuncId) -> HashSet<BlockId> {
    let entry = m.func(f).entry;
    let mut seen = HashSet::new();
    let mut work = VecDeque::from([entry]);
    seen.insert(entry);
    while let Some(b) = work.pop_front() {
        if let Some(term) = &m.block(b).term {
            for s in term.successors() {
                if seen.insert(s) {
                    work.push_back(s);
                }
            }
        }
    }
    seen
}

/// 1. Drops blocks unreachable from the entry, and threads an
/// unconditional jump through an empty pass-through block (zero
/// instructions, terminator is a bare `Br` forwarding exactly its own
/// params) so callers land directly on the real target.
pub fn simplify_cfg(m: &mut Module) -> bool {
    let mut changed = false;
    for f in m.func_ids() {
        let reachable = reachable_blocks(m, f);
        let before = m.func(f).blocks.len();
        m.func_mut(f).blocks.retain(|b| reachable.contains(b));
        if m.func(f).blocks.len() != before {
            changed = true;
        }
    }

    // Pass-through block threading: find blocks whose body is empty and
    // whose Br forwards exactly their own params in order, then repoint
    // every edge that targets them.
    let mut thread: HashMap<BlockId, (BlockId, Vec<usize>)> = HashMap::new();
    for b in m.block_ids() {
        let block = m.block(b);
        if !block.insts.is_empty() {
            continue;
        }
        if let Some(Terminator::Br { target, args }) = &block.term {
            if args.len() == block.params.len() && args.iter().zip(&block.params).all(|(a, p)| a == p) {
                thread.insert(b, (*target, (0..block.params.len()).collect()));
            }
        }
    }
    if thread.is_empty() {
        return changed;
    }
    for b in m.block_ids() {
        if thread.contains_key(&b) {
            continue;
        }
        if let Some(term) = m.block(b).term.clone() {
            let new_term = reroute_through(term, &thread);
            if new_term != m.block(b).term.clone().unwrap() {
                m.set_terminator(b, new_term);
                changed = true;
            }
        }
    }
    changed
}

fn reroute_through(term: Terminator, thread: &HashMap<BlockId, (BlockId, Vec<usize>)>) -> Terminator {
    let reroute = |target: BlockId, args: Vec<ValueId>| -> (BlockId, Vec<ValueId>) {
        let mut target = target;
        let mut args = args;
        let mut hops = 0;
        while let Some((next, perm)) = thread.get(&target) {
            if hops >= 64 {
                break;
            }
            args = perm.iter().map(|&i| args[i]).collect();
            target = *next;
            hops += 1;
        }
        (target, args)
    };
    match term {
        Terminator::Ret { .. } => term,
        Terminator::Br { target, args } => {
            let (t, a) = reroute(target, args);
            Terminator::Br { target: t, args: a }
        }
        Terminator::CondBr { cond, then_bb, then_args, else_bb, else_args } => {
            let (tb, ta) = reroute(then_bb, then_args);
            let (eb, ea) = reroute(else_bb, else_args);
            Terminator::CondBr { cond, then_bb: tb, then_args: ta, else_bb: eb, else_args: ea }
        }
    }
}

/// 2. Splits every critical edge (a branch out of a multi-successor block
/// into a multi-predecessor block) by inserting a fresh block on the edge
/// that does nothing but forward the branch's arguments.
pub fn split_critical_edges(m: &mut Module) -> bool {
    let mut changed = false;
    for f in m.func_ids() {
        let mut preds: HashMap<BlockId, u32> = HashMap::new();
        for &b in &m.func(f).blocks {
            if let Some(term) = &m.block(b).term {
                for s in term.successors() {
                    *preds.entry(s).or_default() += 1;
                }
            }
        }
        for &b in m.func(f).blocks.clone().iter() {
            let term = match m.block(b).term.clone() {
                Some(t) => t,
                None => continue,
            };
            let is_multi_source = matches!(term, Terminator::CondBr { .. });
            if !is_multi_source {
                continue;
            }
            let new_term = match term {
                Terminator::CondBr { cond, then_bb, then_args, else_bb, else_args } => {
                    let then_bb2 = maybe_split(m, f, then_bb, then_args, &preds, &mut changed);
                    let else_bb2 = maybe_split(m, f, else_bb, else_args, &preds, &mut changed);
                    Terminator::CondBr {
                        cond,
                        then_bb: then_bb2.0,
                        then_args: then_bb2.1,
                        else_bb: else_bb2.0,
                        else_args: else_bb2.1,
                    }
                }
                other => other,
            };
            m.set_terminator(b, new_term);
        }
    }
    changed
}

fn maybe_split(
    m: &mut Module,
    f: FuncId,
    target: BlockId,
    args: Vec<ValueId>,
    preds: &HashMap<BlockId, u32>,
    changed: &mut bool,
) -> (BlockId, Vec<ValueId>) {
    if preds.get(&target).copied().unwrap_or(0) < 2 {
        return (target, args);
    }
    let split = m.new_block();
    m.add_block_to_func(f, split);
    m.set_terminator(split, Terminator::Br { target, args: args.clone() });
    *changed = true;
    (split, args.iter().copied().collect())
}

/// 3. Ensures every natural loop header has a single preheader
/// predecessor outside the loop body. Only synthesizes a preheader when
/// the header takes no block parameters of its own (a parameterized
/// header would need per-predecessor argument reconciliation this pass
/// doesn't attempt); loops with parameterized headers are left for a
/// later round once `global_mem2reg_ssa` has simplified them.
pub fn canonicalize_loops(m: &mut Module) -> bool {
    let mut changed = false;
    for f in m.func_ids() {
        for lp in natural_loops(m, f) {
            if !m.block(lp.header).params.is_empty() {
                continue;
            }
            let mut preds: HashMap<BlockId, Vec<BlockId>> = HashMap::new();
            for &b in &m.func(f).blocks {
                if let Some(term) = &m.block(b).term {
                    for s in term.successors() {
                        preds.entry(s).or_default().push(b);
                    }
                }
            }
            let outside: Vec<BlockId> =
                preds.get(&lp.header).into_iter().flatten().copied().filter(|p| !lp.body.contains(p)).collect();
            if outside.len() <= 1 {
                continue;
            }
            let preheader = m.new_block();
            m.add_block_to_func(f, preheader);
            m.set_terminator(preheader, Terminator::Br { target: lp.header, args: vec![] });
            for p in outside {
                let term = m.block(p).term.clone().unwrap();
                let rewired = redirect(term, lp.header, preheader);
                m.set_terminator(p, rewired);
            }
            changed = true;
        }
    }
    changed
}

fn redirect(term: Terminator, from: BlockId, to: BlockId) -> Terminator {
    match term {
        Terminator::Ret { .. } => term,
        Terminator::Br { target, args } if target == from => Terminator::Br { target: to, args },
        Terminator::Br { .. } => term,
        Terminator::CondBr { cond, then_bb, then_args, else_bb, else_args } => Terminator::CondBr {
            cond,
            then_bb: if then_bb == from { to } else { then_bb },
            then_args,
            else_bb: if else_bb == from { to } else { else_bb },
            else_args,
        },
    }
}

/// 4. Inserts an explicit `Cast` on a branch argument whose static type
/// doesn't match the receiving block parameter's type, so every block
/// parameter's incoming values are uniformly typed before SSA-sensitive
/// passes (mem2reg, GVN) run.
pub fn normalize_phi_edge_casts(m: &mut Module) -> bool {
    let mut changed = false;
    for b in m.block_ids() {
        let term = match m.block(b).term.clone() {
            Some(t) => t,
            None => continue,
        };
        let mut edited = false;
        let fix_args = |m: &mut Module, target: BlockId, args: Vec<ValueId>, edited: &mut bool| -> Vec<ValueId> {
            let param_tys: Vec<_> = m.block(target).params.iter().map(|&p| m.value(p).ty).collect();
            args.into_iter()
                .enumerate()
                .map(|(i, a)| {
                    let want = param_tys.get(i).copied();
                    let got = m.value(a).ty;
                    match want {
                        Some(w) if w != got => {
                            let (_, v) = m.push_inst(
                                b,
                                InstKind::Cast { kind: crate::ast::CastKind::Strict, operand: a, target_ty: w },
                                EffectTag::MayTrap,
                                Some(w),
                            );
                            *edited = true;
                            v.unwrap()
                        }
                        _ => a,
                    }
                })
                .collect()
        };
        let new_term = match term {
            Terminator::Br { target, args } => {
                let a = fix_args(m, target, args, &mut edited);
                Terminator::Br { target, args: a }
            }
            Terminator::CondBr { cond, then_bb, then_args, else_bb, else_args } => {
                let ta = fix_args(m, then_bb, then_args, &mut edited);
                let ea = fix_args(m, else_bb, else_args, &mut edited);
                Terminator::CondBr { cond, then_bb, then_args: ta, else_bb, else_args: ea }
            }
            other => other,
        };
        if edited {
            m.set_terminator(b, new_term);
            changed = true;
        }
    }
    changed
}

fn as_const_int(m: &Module, v: ValueId) -> Option<i64> {
    match m.value(v).def {
        ValueDef::Inst(iid) => match &m.inst(iid).kind {
            InstKind::ConstInt(n) => Some(*n),
            _ => None,
        },
        ValueDef::Param { .. } => None,
    }
}

fn as_const_bool(m: &Module, v: ValueId) -> Option<bool> {
    match m.value(v).def {
        ValueDef::Inst(iid) => match &m.inst(iid).kind {
            InstKind::ConstBool(b) => Some(*b),
            _ => None,
        },
        ValueDef::Param { .. } => None,
    }
}

/// 5. Folds a binary/unary instruction over constant operands into a
/// single constant of the same result value, and folds a `CondBr` whose
/// condition is constant into an unconditional `Br`.
pub fn const_fold(m: &mut Module) -> bool {
    let mut changed = false;
    for iid in m.inst_ids() {
        let inst = m.inst(iid);
        if inst.effect != EffectTag::Pure {
            continue;
        }
        let folded = match &inst.kind {
            InstKind::Binop { op, lhs, rhs } => match (as_const_int(m, *lhs), as_const_int(m, *rhs)) {
                (Some(a), Some(b)) => fold_int_binop(*op, a, b).map(InstKind::ConstInt),
                _ => match (as_const_bool(m, *lhs), as_const_bool(m, *rhs)) {
                    (Some(a), Some(b)) => fold_bool_binop(*op, a, b).map(InstKind::ConstBool),
                    _ => None,
                },
            },
            InstKind::Unary { op, operand } => match as_const_int(m, *operand) {
                Some(a) => fold_int_unary(*op, a).map(InstKind::ConstInt),
                None => as_const_bool(m, *operand).and_then(|a| fold_bool_unary(*op, a)).map(InstKind::ConstBool),
            },
            _ => None,
        };
        if let Some(kind) = folded {
            m.replace_inst(iid, kind, EffectTag::Pure);
            changed = true;
        }
    }

    for b in m.block_ids() {
        if let Some(Terminator::CondBr { cond, then_bb, then_args, else_bb, else_args }) = m.block(b).term.clone() {
            if let Some(c) = as_const_bool(m, cond) {
                let term = if c {
                    Terminator::Br { target: then_bb, args: then_args }
                } else {
                    Terminator::Br { target: else_bb, args: else_args }
                };
                m.set_terminator(b, term);
                changed = true;
            }
        }
    }
    changed
}

fn fold_int_binop(op: Op, a: i64, b: i64) -> Option<i64> {
    Some(match op {
        Op::Add => a.checked_add(b)?,
        Op::Sub => a.checked_sub(b)?,
        Op::Mul => a.checked_mul(b)?,
        Op::Div if b != 0 => a.checked_div(b)?,
        Op::Rem if b != 0 => a.checked_rem(b)?,
        Op::BitAnd => a & b,
        Op::BitOr => a | b,
        Op::BitXor => a ^ b,
        Op::Shl => a.checked_shl(b as u32)?,
        Op::Shr => a.checked_shr(b as u32)?,
        _ => return None,
    })
}

fn fold_bool_binop(op: Op, a: bool, b: bool) -> Option<bool> {
    Some(match op {
        Op::And => a && b,
        Op::Or => a || b,
        Op::Eq => a == b,
        Op::Ne => a != b,
        _ => return None,
    })
}

fn fold_int_unary(op: Op, a: i64) -> Option<i64> {
    Some(match op {
        Op::Neg => a.checked_neg()?,
        Op::Plus => a,
        Op::BitNot => !a,
        _ => return None,
    })
}

fn fold_bool_unary(op: Op, a: bool) -> Option<bool> {
    Some(match op {
        Op::Not => !a,
        _ => return None,
    })
}

/// 6. Store-to-load forwarding within a single block: a `Load` whose
/// address is a `Store`d-to (or just-`alloca`d, still zero-initialized)
/// earlier in the *same* block, with nothing memory-effecting in between,
/// forwards the stored value directly instead of re-reading memory.
/// Bounded to 32 instructions of backward search per load (§5).
pub fn local_load_forward(m: &mut Module) -> bool {
    const MAX_DEPTH: usize = 32;
    let mut repl = HashMap::new();
    let mut dead = Vec::new();

    for b in m.block_ids() {
        let insts = m.block(b).insts.clone();
        for (pos, &iid) in insts.iter().enumerate() {
            let addr = match &m.inst(iid).kind {
                InstKind::Load { addr } => *addr,
                _ => continue,
            };
            let start = pos.saturating_sub(MAX_DEPTH);
            let mut forwarded = None;
            for &prior in insts[start..pos].iter().rev() {
                match &m.inst(prior).kind {
                    InstKind::Store { addr: a, value } if *a == addr => {
                        forwarded = Some(*value);
                        break;
                    }
                    other if other_may_alias(other, addr) => break,
                    _ => continue,
                }
            }
            if let (Some(value), Some(result)) = (forwarded, m.inst(iid).result) {
                repl.insert(result, value);
                dead.push((b, iid));
            }
        }
    }

    if repl.is_empty() {
        return false;
    }
    rewrite_operands(m, &repl);
    for (b, iid) in dead {
        m.remove_inst_from_block(b, iid);
    }
    true
}

fn other_may_alias(kind: &InstKind, addr: ValueId) -> bool {
    match kind {
        InstKind::Store { addr: a, .. } => *a != addr,
        InstKind::Call { .. } => true,
        _ => false,
    }
}

fn promotable_allocas(m: &Module, f: FuncId) -> HashSet<InstId> {
    let mut candidates: HashSet<InstId> = HashSet::new();
    for &b in &m.func(f).blocks {
        for &iid in &m.block(b).insts {
            if matches!(m.inst(iid).kind, InstKind::AllocaLocal(_)) {
                candidates.insert(iid);
            }
        }
    }
    let mut escaped = HashSet::new();
    for &b in &m.func(f).blocks {
        for &iid in &m.block(b).insts {
            for operand in inst_operands(m, iid) {
                if let ValueDef::Inst(def) = m.value(operand).def {
                    if candidates.contains(&def) {
                        let is_direct_addr = matches!(
                            &m.inst(iid).kind,
                            InstKind::Load { addr } if *addr == operand
                        ) || matches!(
                            &m.inst(iid).kind,
                            InstKind::Store { addr, .. } if *addr == operand
                        );
                        if !is_direct_addr {
                            escaped.insert(def);
                        }
                    }
                }
            }
        }
    }
    candidates.difference(&escaped).copied().collect()
}

/// 7. Promotes every non-escaping stack local to pure SSA: inserts block
/// parameters at each promoted alloca's dominance-frontier blocks, and
/// rewrites every `Load` to the value reaching it along the dominator
/// tree, removing the `alloca`/`Load`/`Store` triples entirely.
pub fn global_mem2reg_ssa(m: &mut Module) -> bool {
    let mut changed = false;
    for f in m.func_ids() {
        let promotable = promotable_allocas(m, f);
        if promotable.is_empty() {
            continue;
        }

        let dom = dominators(m, f);
        let idom = immediate_dominators(m.func(f).entry, &m.func(f).blocks.clone(), &dom);
        let df = dominance_frontiers(m, f, &idom);

        for &alloca in &promotable {
            changed |= promote_one_alloca(m, f, alloca, &df, &idom);
        }
    }
    changed
}

fn promote_one_alloca(
    m: &mut Module,
    f: FuncId,
    alloca: InstId,
    df: &HashMap<BlockId, HashSet<BlockId>>,
    idom: &HashMap<BlockId, BlockId>,
) -> bool {
    let ty = match &m.inst(alloca).kind {
        InstKind::AllocaLocal(a) => a.ty,
        _ => return false,
    };

    let alloca_value = match m.inst(alloca).result {
        Some(v) => v,
        None => return false,
    };

    let mut store_blocks = HashSet::new();
    let mut alloca_block = None;
    for &b in &m.func(f).blocks {
        for &iid in &m.block(b).insts {
            match &m.inst(iid).kind {
                InstKind::Store { addr, .. } if *addr == alloca_value => {
                    store_blocks.insert(b);
                }
                _ if iid == alloca => alloca_block = Some(b),
                _ => {}
            }
        }
    }

    let mut phi_blocks = HashSet::new();
    let mut worklist: Vec<BlockId> = store_blocks.iter().copied().collect();
    while let Some(b) = worklist.pop() {
        for &w in df.get(&b).into_iter().flatten() {
            if phi_blocks.insert(w) {
                worklist.push(w);
            }
        }
    }

    let mut phi_params: HashMap<BlockId, ValueId> = HashMap::new();
    for &b in &phi_blocks {
        let p = m.add_block_param(b, ty, EffectTag::Pure);
        phi_params.insert(b, p);
    }

    let mut visited: HashSet<BlockId> = HashSet::new();
    let mut children: HashMap<BlockId, Vec<BlockId>> = HashMap::new();
    for (&b, &d) in idom.iter() {
        if b != d {
            children.entry(d).or_default().push(b);
        }
    }
    let mut stack = vec![m.func(f).entry];
    let mut order = Vec::new();
    while let Some(b) = stack.pop() {
        if !visited.insert(b) {
            continue;
        }
        order.push(b);
        for &c in children.get(&b).into_iter().flatten() {
            stack.push(c);
        }
    }

    let mut repl: HashMap<ValueId, ValueId> = HashMap::new();
    let mut dead: Vec<(BlockId, InstId)> = Vec::new();
    let mut current: HashMap<BlockId, ValueId> = HashMap::new();

    fn reaching(cur: &HashMap<BlockId, ValueId>, idom: &HashMap<BlockId, BlockId>, mut b: BlockId, fallback: ValueId) -> ValueId {
        loop {
            if let Some(&v) = cur.get(&b) {
                return v;
            }
            match idom.get(&b) {
                Some(&p) if p != b => b = p,
                _ => return fallback,
            }
        }
    }

    for &b in &order {
        let mut value_here = if let Some(&p) = phi_params.get(&b) {
            Some(p)
        } else {
            None
        };
        for &iid in &m.block(b).insts.clone() {
            match &m.inst(iid).kind {
                InstKind::Store { addr, value } if *addr == alloca_value => {
                    value_here = Some(*value);
                    dead.push((b, iid));
                }
                InstKind::Load { addr } if *addr == alloca_value => {
                    let v = value_here.unwrap_or_else(|| reaching(&current, idom, b, alloca_value));
                    if let Some(result) = m.inst(iid).result {
                        repl.insert(result, v);
                    }
                    dead.push((b, iid));
                }
                _ => {}
            }
        }
        if let Some(v) = value_here {
            current.insert(b, v);
        }
        if b == alloca_block.unwrap_or(b) {
            dead.push((b, alloca));
        }
    }

    if dead.is_empty() && repl.is_empty() && phi_params.is_empty() {
        return false;
    }
    rewrite_operands(m, &repl);
    for (b, iid) in dead {
        m.remove_inst_from_block(b, iid);
    }

    // Every edge landing on a block that just gained a phi param for this
    // alloca needs that param fed: append the source block's live-out
    // value for this alloca to the edge's argument list.
    if !phi_params.is_empty() {
        for &b in &order {
            let term = match m.block(b).term.clone() {
                Some(t) => t,
                None => continue,
            };
            let live_out = reaching(&current, idom, b, alloca_value);
            let feed = |target: BlockId, mut args: Vec<ValueId>| -> Vec<ValueId> {
                if phi_params.contains_key(&target) {
                    args.push(live_out);
                }
                args
            };
            let new_term = match term {
                Terminator::Ret { .. } => continue,
                Terminator::Br { target, args } => Terminator::Br { target, args: feed(target, args) },
                Terminator::CondBr { cond, then_bb, then_args, else_bb, else_args } => Terminator::CondBr {
                    cond,
                    then_bb,
                    then_args: feed(then_bb, then_args),
                    else_bb,
                    else_args: feed(else_bb, else_args),
                },
            };
            m.set_terminator(b, new_term);
        }
    }
    true
}

/// Operators for which `a OP b` and `b OP a` compute the same value, so
/// `gvn_cse`'s key must not distinguish operand order (§4.6.1 step 8).
fn is_commutative(op: Op) -> bool {
    matches!(op, Op::Add | Op::Mul | Op::BitAnd | Op::BitOr | Op::BitXor | Op::Eq | Op::Ne | Op::And | Op::Or)
}

fn inst_key(m: &Module, iid: InstId) -> Option<(String, Vec<ValueId>)> {
    let inst = m.inst(iid);
    if inst.effect != EffectTag::Pure {
        return None;
    }
    let (tag, operands): (String, Vec<ValueId>) = match &inst.kind {
        InstKind::Unary { op, operand } => (format!("unary:{:?}", op), vec![*operand]),
        InstKind::Binop { op, lhs, rhs } => {
            let mut operands = vec![*lhs, *rhs];
            if is_commutative(*op) {
                operands.sort();
            }
            (format!("binop:{:?}", op), operands)
        }
        InstKind::Cast { kind, operand, target_ty } => (format!("cast:{:?}:{}", kind, target_ty), vec![*operand]),
        InstKind::Field { base, field_index } => (format!("field:{}", field_index), vec![*base]),
        InstKind::ConstInt(n) => (format!("int:{}", n), vec![]),
        InstKind::ConstBool(b) => (format!("bool:{}", b), vec![]),
        InstKind::ConstText(s) => (format!("text:{}", s), vec![]),
        InstKind::ConstNull => ("null".into(), vec![]),
        _ => return None,
    };
    Some((tag, operands))
}

/// 8. Global value numbering + common-subexpression elimination: within a
/// function, a pure instruction whose (operator, operand) key matches one
/// already computed at a dominating point is replaced by that earlier
/// result instead of being recomputed.
pub fn gvn_cse(m: &mut Module) -> bool {
    let mut changed = false;
    for f in m.func_ids() {
        let dom = dominators(m, f);
        let mut seen: HashMap<(String, Vec<ValueId>), (BlockId, ValueId)> = HashMap::new();
        let mut repl = HashMap::new();
        let mut dead = Vec::new();

        let mut order: Vec<BlockId> = m.func(f).blocks.clone();
        order.sort_by_key(|b| dom.get(b).map(|d| d.len()).unwrap_or(0));

        for &b in &order {
            for &iid in &m.block(b).insts.clone() {
                let key = match inst_key(m, iid) {
                    Some(k) => k,
                    None => continue,
                };
                let result = match m.inst(iid).result {
                    Some(r) => r,
                    None => continue,
                };
                match seen.get(&key) {
                    Some(&(def_block, canonical)) if dom.get(&b).map(|d| d.contains(&def_block)).unwrap_or(false) => {
                        repl.insert(result, canonical);
                        dead.push((b, iid));
                    }
                    _ => {
                        seen.insert(key, (b, result));
                    }
                }
            }
        }
        if repl.is_empty() {
            continue;
        }
        rewrite_operands(m, &repl);
        for (b, iid) in dead {
            m.remove_inst_from_block(b, iid);
        }
        changed = true;
    }
    changed
}

/// 9. Loop-invariant code motion: hoists a pure instruction out of a
/// natural loop's body into its canonical preheader once every operand is
/// either defined outside the loop or already hoisted this round. Loops
/// without a canonical single-predecessor preheader (see
/// [`canonicalize_loops`]) are skipped.
pub fn licm(m: &mut Module) -> bool {
    let mut changed = false;
    for f in m.func_ids() {
        for lp in natural_loops(m, f) {
            let mut preds: HashMap<BlockId, Vec<BlockId>> = HashMap::new();
            for &b in &m.func(f).blocks {
                if let Some(term) = &m.block(b).term {
                    for s in term.successors() {
                        preds.entry(s).or_default().push(b);
                    }
                }
            }
            let outside: Vec<BlockId> =
                preds.get(&lp.header).into_iter().flatten().copied().filter(|p| !lp.body.contains(p)).collect();
            let preheader = match outside.as_slice() {
                [only] => *only,
                _ => continue,
            };

            let mut invariant_vals: HashSet<ValueId> = HashSet::new();
            let mut moved = true;
            while moved {
                moved = false;
                for &b in &lp.body {
                    for &iid in &m.block(b).insts.clone() {
                        if m.inst(iid).effect != EffectTag::Pure {
                            continue;
                        }
                        let operands = inst_operands(m, iid);
                        let all_outside = operands.iter().all(|&v| match m.value(v).def {
                            ValueDef::Inst(def_iid) => {
                                !lp.body.iter().any(|&bb| m.block(bb).insts.contains(&def_iid)) || invariant_vals.contains(&v)
                            }
                            ValueDef::Param { block, .. } => !lp.body.contains(&block),
                        });
                        if all_outside {
                            if let Some(result) = m.inst(iid).result {
                                if invariant_vals.insert(result) {
                                    m.remove_inst_from_block(b, iid);
                                    m.block_mut(preheader).insts.push(iid);
                                    moved = true;
                                    changed = true;
                                }
                            }
                        }
                    }
                }
            }
        }
    }
    changed
}

/// 10. Escape-handle peephole: for each escape-hinted value, finds an
/// identity `as`-cast over it (`Cast{kind: Strict, ..}` whose result type
/// equals the hinted value's own type) and retires the cast, rewriting
/// its uses to the hinted value directly.
pub fn optimize_escape_handles(m: &mut Module) -> bool {
    let mut repl: HashMap<ValueId, ValueId> = HashMap::new();
    let mut dead: Vec<InstId> = Vec::new();

    for hint in m.escape_hints.clone() {
        for iid in m.inst_ids() {
            let inst = m.inst(iid);
            let InstKind::Cast { kind: crate::ast::CastKind::Strict, operand, target_ty } = inst.kind else {
                continue;
            };
            if operand != hint.value_id || m.value(operand).ty != target_ty {
                continue;
            }
            if let Some(result) = inst.result {
                repl.insert(result, operand);
                dead.push(iid);
            }
        }
    }

    if dead.is_empty() {
        return false;
    }
    rewrite_operands(m, &repl);
    for iid in dead {
        for b in m.block_ids() {
            if m.block(b).insts.contains(&iid) {
                m.remove_inst_from_block(b, iid);
                break;
            }
        }
    }
    true
}

/// 11. Removes a pure instruction whose result has a zero use count,
/// repeating until no more candidates remain in this round.
pub fn dce_pure_insts(m: &mut Module) -> bool {
    let mut changed = false;
    loop {
        let counts = build_use_count(m);
        let mut dead = Vec::new();
        for iid in m.inst_ids() {
            let inst = m.inst(iid);
            if inst.effect != EffectTag::Pure {
                continue;
            }
            if let Some(result) = inst.result {
                if counts[result.index()] == 0 {
                    dead.push(iid);
                }
            }
        }
        if dead.is_empty() {
            break;
        }
        for iid in dead {
            for b in m.block_ids() {
                if m.block(b).insts.contains(&iid) {
                    m.remove_inst_from_block(b, iid);
                    break;
                }
            }
        }
        changed = true;
    }
    changed
}
