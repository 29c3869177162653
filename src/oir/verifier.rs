//! Structural, dominance and loop-fixpoint verification (§4.5).
//!
//! The pass manager treats this module as authoritative (§4.6.4): every
//! guarded pass snapshots the module, runs, then asks [`verify_pipeline_invariants`]
//! whether the result is still legal before committing it.

use std::collections::{HashMap, HashSet};

use crate::ids::{BlockId, FuncId, InstId, ValueId};

use super::{Module, Terminator, ValueDef};

/// One structural, dominance or loop-fixpoint defect (§4.5.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    InvalidBlockId { func: FuncId, block: BlockId },
    InvalidValueId { context: &'static str, value: ValueId },
    InvalidInstId { block: BlockId, inst: InstId },
    UntypedValue { value: ValueId },
    MissingTerminator { block: BlockId },
    TerminatorArityMismatch { from: BlockId, to: BlockId, expected: usize, got: usize },
    DanglingInstResult { inst: InstId, value: ValueId },
    DuplicateInstResult { value: ValueId, insts: Vec<InstId> },
    UseNotDominatedByDef { value: ValueId, use_block: BlockId },
    LoopHeaderWithoutPreheader { header: BlockId },
}

/// §4.5.1: structural checks only — invalid ids, untyped values,
/// terminator/parameter arity mismatches, unreferenced/duplicated
/// instruction results. Does not touch dominance or loops (see
/// [`verify_function_dominance`] / [`verify_function_loop_fixpoint`]).
pub fn verify(m: &Module) -> Vec<Violation> {
    let mut out = Vec::new();
    let mut result_owners: HashMap<ValueId, Vec<InstId>> = HashMap::new();

    for vid in m.value_ids() {
        if !m.value(vid).ty.is_valid() {
            out.push(Violation::UntypedValue { value: vid });
        }
    }

    for iid in m.inst_ids() {
        if let Some(rv) = m.inst(iid).result {
            result_owners.entry(rv).or_default().push(iid);
            match m.value(rv).def {
                ValueDef::Inst(owner) if owner == iid => {}
                _ => out.push(Violation::DanglingInstResult { inst: iid, value: rv }),
            }
        }
    }
    for (value, insts) in result_owners {
        if insts.len() > 1 {
            out.push(Violation::DuplicateInstResult { value, insts });
        }
    }

    for f in m.func_ids() {
        let func = m.func(f);
        for &b in &func.blocks {
            if b.index() >= m.block_count() {
                out.push(Violation::InvalidBlockId { func: f, block: b });
                continue;
            }
            let block = m.block(b);
            match &block.term {
                None => out.push(Violation::MissingTerminator { block: b }),
                Some(term) => {
                    for (target, args) in term.successor_edges() {
                        let expected = m.block(target).params.len();
                        if expected != args.len() {
                            out.push(Violation::TerminatorArityMismatch {
                                from: b,
                                to: target,
                                expected,
                                got: args.len(),
                            });
                        }
                    }
                }
            }
        }
    }

    out
}

/// Maps every `InstId` owned by `f` to the block that contains it. Built
/// on demand since the module doesn't keep a standing back-pointer (§3.6
/// only names the forward `Block.insts` direction).
fn inst_owner_blocks(m: &Module, f: FuncId) -> HashMap<InstId, BlockId> {
    let mut owners = HashMap::new();
    for &b in &m.func(f).blocks {
        for &iid in &m.block(b).insts {
            owners.insert(iid, b);
        }
    }
    owners
}

fn preds_of(m: &Module, f: FuncId) -> HashMap<BlockId, Vec<BlockId>> {
    let mut preds: HashMap<BlockId, Vec<BlockId>> = HashMap::new();
    for &b in &m.func(f).blocks {
        preds.entry(b).or_default();
    }
    for &b in &m.func(f).blocks {
        if let Some(term) = &m.block(b).term {
            for s in term.successors() {
                preds.entry(s).or_default().push(b);
            }
        }
    }
    preds
}

/// §4.5.2: iterative dominator data-flow. `dom[entry] = {entry}`,
/// `dom[b] = {b} ∪ ⋂ dom[preds(b)]` until fixpoint.
pub fn dominators(m: &Module, f: FuncId) -> HashMap<BlockId, HashSet<BlockId>> {
    let func = m.func(f);
    let all: HashSet<BlockId> = func.blocks.iter().copied().collect();
    let preds = preds_of(m, f);

    let mut dom: HashMap<BlockId, HashSet<BlockId>> = HashMap::new();
    for &b in &func.blocks {
        if b == func.entry {
            dom.insert(b, [b].into_iter().collect());
        } else {
            dom.insert(b, all.clone());
        }
    }

    let mut changed = true;
    while changed {
        changed = false;
        for &b in &func.blocks {
            if b == func.entry {
                continue;
            }
            let mut new_set: Option<HashSet<BlockId>> = None;
            for &p in preds.get(&b).into_iter().flatten() {
                let pd = &dom[&p];
                new_set = Some(match new_set {
                    None => pd.clone(),
                    Some(acc) => acc.intersection(pd).copied().collect(),
                });
            }
            let mut new_set = new_set.unwrap_or_default();
            new_set.insert(b);
            if new_set != dom[&b] {
                dom.insert(b, new_set);
                changed = true;
            }
        }
    }
    dom
}

/// Immediate dominators recovered from the dominator sets: `idom[b]` is the
/// unique member of `dom[b] \ {b}` that dominates no other member of that
/// set. `idom[entry] == entry` by convention.
pub fn immediate_dominators(
    func_entry: BlockId,
    func_blocks: &[BlockId],
    dom: &HashMap<BlockId, HashSet<BlockId>>,
) -> HashMap<BlockId, BlockId> {
    let mut idom = HashMap::new();
    idom.insert(func_entry, func_entry);
    for &b in func_blocks {
        if b == func_entry {
            continue;
        }
        let strict: Vec<BlockId> = dom[&b].iter().copied().filter(|&d| d != b).collect();
        let mut candidate = None;
        for &d in &strict {
            let dominates_another = strict.iter().any(|&other| other != d && dom[&other].contains(&d));
            if !dominates_another {
                candidate = Some(d);
                break;
            }
        }
        if let Some(d) = candidate {
            idom.insert(b, d);
        }
    }
    idom
}

/// Cooper–Harvey–Kennedy dominance frontiers (§4.5.2), computed from the
/// immediate-dominator tree.
pub fn dominance_frontiers(
    m: &Module,
    f: FuncId,
    idom: &HashMap<BlockId, BlockId>,
) -> HashMap<BlockId, HashSet<BlockId>> {
    let func = m.func(f);
    let preds = preds_of(m, f);
    let mut df: HashMap<BlockId, HashSet<BlockId>> = func.blocks.iter().map(|&b| (b, HashSet::new())).collect();

    for &b in &func.blocks {
        let ps = preds.get(&b).cloned().unwrap_or_default();
        if ps.len() < 2 {
            continue;
        }
        for p in ps {
            let mut runner = p;
            while Some(&runner) != idom.get(&b) && runner != b {
                df.entry(runner).or_default().insert(b);
                match idom.get(&runner) {
                    Some(&next) if next != runner => runner = next,
                    _ => break,
                }
            }
        }
    }
    df
}

fn dominates(dom: &HashMap<BlockId, HashSet<BlockId>>, a: BlockId, b: BlockId) -> bool {
    dom.get(&b).map(|d| d.contains(&a)).unwrap_or(false)
}

/// §4.5.1/V2: every use of a value must be dominated by its definition.
/// Instruction operands are "used" at the block that contains the
/// instruction; a terminator's branch arguments are "used" at the block
/// that branches, not the successor that receives them.
pub fn verify_function_dominance(m: &Module, f: FuncId) -> Vec<Violation> {
    let mut out = Vec::new();
    let dom = dominators(m, f);
    let owners = inst_owner_blocks(m, f);
    let mut inst_pos: HashMap<InstId, usize> = HashMap::new();
    for &b in &m.func(f).blocks {
        for (i, &iid) in m.block(b).insts.iter().enumerate() {
            inst_pos.insert(iid, i);
        }
    }

    let def_block = |v: ValueId| -> Option<BlockId> {
        match m.value(v).def {
            ValueDef::Inst(iid) => owners.get(&iid).copied(),
            ValueDef::Param { block, .. } => Some(block),
        }
    };
    // A block parameter is defined "before" every instruction in its own
    // block; an instruction's ordinal is its position in `Block::insts`.
    let def_ordinal = |v: ValueId| -> Option<isize> {
        match m.value(v).def {
            ValueDef::Inst(iid) => inst_pos.get(&iid).map(|&p| p as isize),
            ValueDef::Param { .. } => Some(-1),
        }
    };

    // `use_pos` is the using instruction's own ordinal within `use_block`,
    // or `block.insts.len()` for a terminator use (after every instruction).
    let mut check_use = |operand: ValueId, use_block: BlockId, use_pos: usize, out: &mut Vec<Violation>| {
        if let Some(db) = def_block(operand) {
            if db != use_block {
                if !dominates(&dom, db, use_block) {
                    out.push(Violation::UseNotDominatedByDef { value: operand, use_block });
                }
            } else if def_ordinal(operand).is_some_and(|d| d >= use_pos as isize) {
                out.push(Violation::UseNotDominatedByDef { value: operand, use_block });
            }
        }
    };

    for &b in &m.func(f).blocks {
        let block = m.block(b);
        for (pos, &iid) in block.insts.iter().enumerate() {
            for operand in inst_operands(m, iid) {
                check_use(operand, b, pos, &mut out);
            }
        }
        let term_pos = block.insts.len();
        if let Some(term) = &block.term {
            match term {
                Terminator::Ret { has_value: true, value } => check_use(*value, b, term_pos, &mut out),
                Terminator::Ret { has_value: false, .. } => {}
                Terminator::Br { args, .. } => {
                    for &a in args {
                        check_use(a, b, term_pos, &mut out);
                    }
                }
                Terminator::CondBr { cond, then_args, else_args, .. } => {
                    check_use(*cond, b, term_pos, &mut out);
                    for &a in then_args.iter().chain(else_args) {
                        check_use(a, b, term_pos, &mut out);
                    }
                }
            }
        }
    }
    out
}

/// Every value operand an instruction reads, in no particular order.
/// Shared with [`super::passes`]'s escape/alias/invariant analyses so they
/// don't re-derive this per-kind match themselves.
pub(crate) fn inst_operands(m: &Module, iid: InstId) -> Vec<ValueId> {
    use super::InstKind::*;
    match &m.inst(iid).kind {
        ConstInt(_) | ConstBool(_) | ConstText(_) | ConstNull | AllocaLocal(_) | FuncRef(_) | GlobalRef(_) => vec![],
        Unary { operand, .. } => vec![*operand],
        Binop { lhs, rhs, .. } => vec![*lhs, *rhs],
        Cast { operand, .. } => vec![*operand],
        Call { target, args } => {
            let mut v = args.clone();
            if let super::CallTarget::Indirect(callee) = target {
                v.push(*callee);
            }
            v
        }
        Index { base, index } => vec![*base, *index],
        Field { base, .. } => vec![*base],
        Load { addr } => vec![*addr],
        Store { addr, value } => vec![*addr, *value],
    }
}

/// A natural loop (§4.5.3): the header every backedge targets, plus every
/// block that can reach the backedge source without first passing back
/// through the header.
#[derive(Debug, Clone)]
pub struct NaturalLoop {
    pub header: BlockId,
    pub body: HashSet<BlockId>,
}

/// Backedge detection: an edge `pred -> succ` is a backedge iff `succ`
/// dominates `pred`. Multiple backedges to the same header merge into one
/// [`NaturalLoop`].
pub fn natural_loops(m: &Module, f: FuncId) -> Vec<NaturalLoop> {
    let dom = dominators(m, f);
    let preds = preds_of(m, f);
    let mut by_header: HashMap<BlockId, HashSet<BlockId>> = HashMap::new();

    for &b in &m.func(f).blocks {
        if let Some(term) = &m.block(b).term {
            for succ in term.successors() {
                if dominates(&dom, succ, b) {
                    let body = by_header.entry(succ).or_insert_with(|| [succ].into_iter().collect());
                    body.insert(b);
                    let mut worklist = vec![b];
                    while let Some(cur) = worklist.pop() {
                        for &p in preds.get(&cur).into_iter().flatten() {
                            if body.insert(p) {
                                worklist.push(p);
                            }
                        }
                    }
                }
            }
        }
    }

    by_header.into_iter().map(|(header, body)| NaturalLoop { header, body }).collect()
}

/// §4.5.3 preheader-canonical form: a loop header has exactly one
/// predecessor from outside its own body (the preheader), and that
/// preheader's only successor is the header.
fn is_preheader_canonical(m: &Module, f: FuncId, lp: &NaturalLoop) -> bool {
    let preds = preds_of(m, f);
    let outside: Vec<BlockId> =
        preds.get(&lp.header).into_iter().flatten().copied().filter(|p| !lp.body.contains(p)).collect();
    if outside.len() != 1 {
        return false;
    }
    let preheader = outside[0];
    match &m.block(preheader).term {
        Some(Terminator::Br { target, .. }) => *target == lp.header,
        _ => false,
    }
}

/// §4.5.1/V4: every natural loop is in preheader-canonical form. Checked
/// after the `canonicalize_loops` re-run inside the guarded pass runner.
pub fn verify_function_loop_fixpoint(m: &Module, f: FuncId) -> Vec<Violation> {
    natural_loops(m, f)
        .into_iter()
        .filter(|lp| !is_preheader_canonical(m, f, lp))
        .map(|lp| Violation::LoopHeaderWithoutPreheader { header: lp.header })
        .collect()
}

/// The combined predicate the guarded pass runner checks after every pass
/// (§4.6.2, §4.6.4): structural checks over the whole module, dominance and
/// (optionally) loop-fixpoint per function.
pub fn verify_pipeline_invariants(m: &Module, require_loop_fixpoint: bool) -> Vec<Violation> {
    let mut out = verify(m);
    for f in m.func_ids() {
        out.extend(verify_function_dominance(m, f));
        if require_loop_fixpoint {
            out.extend(verify_function_loop_fixpoint(m, f));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oir::{EffectTag, Terminator};
    use crate::types::{Builtin, TypePool};

    fn diamond_module() -> (Module, FuncId) {
        let mut types = TypePool::default();
        let unit = types.builtin(Builtin::Unit);
        let mut m = Module::new();
        let f = m.new_func("diamond".into(), vec![], unit);
        let entry = m.func(f).entry;
        let then_b = m.new_block();
        let else_b = m.new_block();
        let join = m.new_block();
        m.add_block_to_func(f, then_b);
        m.add_block_to_func(f, else_b);
        m.add_block_to_func(f, join);

        let (_, cond) = m.push_inst(entry, crate::oir::InstKind::ConstBool(true), EffectTag::Pure, Some(types.builtin(Builtin::Bool)));
        m.set_terminator(
            entry,
            Terminator::CondBr { cond: cond.unwrap(), then_bb: then_b, then_args: vec![], else_bb: else_b, else_args: vec![] },
        );
        m.set_terminator(then_b, Terminator::Br { target: join, args: vec![] });
        m.set_terminator(else_b, Terminator::Br { target: join, args: vec![] });
        m.set_terminator(join, Terminator::Ret { has_value: false, value: ValueId::INVALID });
        (m, f)
    }

    #[test]
    fn diamond_has_no_structural_violations() {
        let (m, _) = diamond_module();
        assert!(verify(&m).is_empty());
    }

    #[test]
    fn entry_dominates_every_block_in_a_diamond() {
        let (m, f) = diamond_module();
        let dom = dominators(&m, f);
        let entry = m.func(f).entry;
        for &b in &m.func(f).blocks {
            assert!(dom[&b].contains(&entry));
        }
    }

    #[test]
    fn diamond_has_no_natural_loops() {
        let (m, f) = diamond_module();
        assert!(natural_loops(&m, f).is_empty());
        assert!(verify_function_loop_fixpoint(&m, f).is_empty());
    }
}
