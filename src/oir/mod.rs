//! The Optimization IR (§3.6): a control-flow-graph, SSA-form module that
//! sits downstream of [`crate::sir::Module`]. Lowering SIR into this shape
//! is an external collaborator's job (see the crate-level pipeline note in
//! [`crate@crate`](crate)); this module only owns the arena, its
//! [`verifier`] and the guarded [`pass_manager`] that optimizes it in
//! place.

pub mod pass_manager;
pub mod passes;
pub mod pipeline;
pub mod verifier;

use crate::ast::Op;
use crate::ids::{BlockId, FuncId, InstId, TypeId, ValueId};

/// Tags a value/instruction's side effects (§3.6). Ranked the same way
/// [`crate::sir::EffectClass`] is, but with the finer buckets the OIR
/// verifier and passes (mem2reg, GVN-CSE, LICM) need to distinguish a pure
/// load from a trapping one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EffectTag {
    Pure,
    MayReadMem,
    MayWriteMem,
    Call,
    MayTrap,
}

impl EffectTag {
    pub fn is_pure(self) -> bool {
        matches!(self, EffectTag::Pure)
    }

    /// Whether an instruction with this tag may be freely reordered across
    /// another memory-effecting instruction. Used by `local_load_forward`,
    /// `gvn_cse` and `licm` to decide what they may hoist or forward past.
    pub fn may_touch_memory(self) -> bool {
        matches!(self, EffectTag::MayReadMem | EffectTag::MayWriteMem | EffectTag::Call)
    }
}

/// Where a `Call` instruction's callee comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallTarget {
    Direct(FuncId),
    Indirect(ValueId),
}

/// A binding site for stack-allocated local storage (`alloca-local`).
/// `global_mem2reg_ssa` promotes a local whose address never escapes into
/// pure SSA block parameters; one left over after the pipeline runs means
/// either its address escaped or it survived for a reason the escape-hint
/// table records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocaLocal {
    pub ty: TypeId,
}

/// One instruction's tagged payload (§3.6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstKind {
    ConstInt(i64),
    ConstBool(bool),
    ConstText(String),
    ConstNull,
    AllocaLocal(AllocaLocal),
    Unary { op: Op, operand: ValueId },
    Binop { op: Op, lhs: ValueId, rhs: ValueId },
    Cast { kind: crate::ast::CastKind, operand: ValueId, target_ty: TypeId },
    Call { target: CallTarget, args: Vec<ValueId> },
    Index { base: ValueId, index: ValueId },
    Field { base: ValueId, field_index: u32 },
    Load { addr: ValueId },
    Store { addr: ValueId, value: ValueId },
    FuncRef(FuncId),
    /// Referenced by qualified name rather than an id of its own; this
    /// crate has no dedicated OIR global arena, mirroring how the module
    /// only owns what §3.6 actually names.
    GlobalRef(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inst {
    pub kind: InstKind,
    pub effect: EffectTag,
    pub result: Option<ValueId>,
}

/// Where a value is defined (§3.6's `def_a`/`def_b` convention, recovered
/// as an enum instead of a raw sentinel pair — every other two-shape
/// union in this crate already prefers a small enum over overloading two
/// plain fields, e.g. [`crate::oir::CallTarget`] itself).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueDef {
    /// The result of an instruction.
    Inst(InstId),
    /// Parameter `index` of block `block`.
    Param { block: BlockId, index: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Value {
    pub ty: TypeId,
    pub effect: EffectTag,
    pub def: ValueDef,
}

/// A block's terminator (§3.6). `None` on a [`Block`] means "not yet
/// terminated" — only reachable mid-construction, never after a pass
/// leaves the module (V1 rejects it).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminator {
    Ret { has_value: bool, value: ValueId },
    Br { target: BlockId, args: Vec<ValueId> },
    CondBr {
        cond: ValueId,
        then_bb: BlockId,
        then_args: Vec<ValueId>,
        else_bb: BlockId,
        else_args: Vec<ValueId>,
    },
}

impl Terminator {
    /// The blocks this terminator may transfer control to, in no
    /// particular order. Used throughout the verifier, dominance analysis
    /// and CFG-shaping passes.
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Ret { .. } => Vec::new(),
            Terminator::Br { target, .. } => vec![*target],
            Terminator::CondBr { then_bb, else_bb, .. } => vec![*then_bb, *else_bb],
        }
    }

    /// The argument list carried to each successor, paired with its
    /// target, for block-parameter arity checking (V3) and operand
    /// rewriting.
    pub fn successor_edges(&self) -> Vec<(BlockId, &[ValueId])> {
        match self {
            Terminator::Ret { .. } => Vec::new(),
            Terminator::Br { target, args } => vec![(*target, args.as_slice())],
            Terminator::CondBr { then_bb, then_args, else_bb, else_args, .. } => {
                vec![(*then_bb, then_args.as_slice()), (*else_bb, else_args.as_slice())]
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub params: Vec<ValueId>,
    pub insts: Vec<InstId>,
    pub term: Option<Terminator>,
}

impl Block {
    pub fn has_term(&self) -> bool {
        self.term.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct Func {
    pub name: String,
    pub param_types: Vec<TypeId>,
    pub ret_type: TypeId,
    pub entry: BlockId,
    /// Every block id owned by this function, in the order they were
    /// created. The entry block is always `blocks[0]`.
    pub blocks: Vec<BlockId>,
}

/// An escape-boundary hint (§3.6): a value the pipeline's callers have
/// flagged as participating in escape-analysis-guided optimization
/// (`optimize_escape_handles`). Purely advisory — the verifier never
/// rejects a module over this table's contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscapeHint {
    pub value_id: ValueId,
}

/// The SSA-form optimization module (§3.6). Unlike [`crate::sir::Module`],
/// this arena is mutated in place by the guarded pass manager, so its
/// builders are `pub` rather than `pub(crate)` — tests and the external
/// SIR -> OIR lowering stage both need to construct one directly.
#[derive(Debug, Clone, Default)]
pub struct Module {
    values: Vec<Value>,
    insts: Vec<Inst>,
    blocks: Vec<Block>,
    funcs: Vec<Func>,
    pub escape_hints: Vec<EscapeHint>,
    pub top_level_funcs: Vec<FuncId>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- accessors ---------------------------------------------------

    pub fn value(&self, id: ValueId) -> &Value {
        &self.values[id.index()]
    }

    pub fn inst(&self, id: InstId) -> &Inst {
        &self.insts[id.index()]
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    pub fn func(&self, id: FuncId) -> &Func {
        &self.funcs[id.index()]
    }

    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn func_ids(&self) -> impl Iterator<Item = FuncId> + '_ {
        (0..self.funcs.len()).map(FuncId::from_index)
    }

    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> + '_ {
        (0..self.blocks.len()).map(BlockId::from_index)
    }

    pub fn inst_ids(&self) -> impl Iterator<Item = InstId> + '_ {
        (0..self.insts.len()).map(InstId::from_index)
    }

    pub fn value_ids(&self) -> impl Iterator<Item = ValueId> + '_ {
        (0..self.values.len()).map(ValueId::from_index)
    }

    /// The defining value of an instruction, if it produces one; the
    /// constant-detection rule from §4.6.3 (only instruction results are
    /// constant-foldable, never block parameters) reads this.
    pub fn value_is_inst_result(&self, id: ValueId) -> bool {
        matches!(self.value(id).def, ValueDef::Inst(_))
    }

    // ---- builders ------------------------------------------------------
    // Used both by the external SIR -> OIR lowering stage and by the
    // passes themselves, which rewrite the module in place.

    pub fn new_func(&mut self, name: String, param_types: Vec<TypeId>, ret_type: TypeId) -> FuncId {
        let entry = self.new_block();
        let id = FuncId::from_index(self.funcs.len());
        self.funcs.push(Func { name, param_types, ret_type, entry, blocks: vec![entry] });
        id
    }

    pub fn add_block_to_func(&mut self, f: FuncId, b: BlockId) {
        self.funcs[f.index()].blocks.push(b);
    }

    pub fn new_block(&mut self) -> BlockId {
        let id = BlockId::from_index(self.blocks.len());
        self.blocks.push(Block::default());
        id
    }

    pub fn add_block_param(&mut self, block: BlockId, ty: TypeId, effect: EffectTag) -> ValueId {
        let index = self.block(block).params.len() as u32;
        let vid = self.push_value(Value { ty, effect, def: ValueDef::Param { block, index } });
        self.blocks[block.index()].params.push(vid);
        vid
    }

    pub(crate) fn push_value(&mut self, v: Value) -> ValueId {
        let id = ValueId::from_index(self.values.len());
        self.values.push(v);
        id
    }

    /// Appends `inst` to the end of `block`'s instruction list and, if it
    /// produces a result, interns the corresponding SSA value.
    pub fn push_inst(&mut self, block: BlockId, kind: InstKind, effect: EffectTag, ty: Option<TypeId>) -> (InstId, Option<ValueId>) {
        let iid = InstId::from_index(self.insts.len());
        let result = ty.map(|ty| self.push_value(Value { ty, effect, def: ValueDef::Inst(iid) }));
        self.insts.push(Inst { kind, effect, result });
        self.blocks[block.index()].insts.push(iid);
        (iid, result)
    }

    pub fn set_terminator(&mut self, block: BlockId, term: Terminator) {
        self.blocks[block.index()].term = Some(term);
    }

    /// Replaces instruction `id`'s payload/effect in place, leaving its
    /// result value (if any) untouched — the shape `const_fold`,
    /// `local_load_forward` and `gvn_cse` all need when they narrow an
    /// instruction to something cheaper without renumbering values.
    pub fn replace_inst(&mut self, id: InstId, kind: InstKind, effect: EffectTag) {
        let inst = &mut self.insts[id.index()];
        inst.kind = kind;
        inst.effect = effect;
    }

    /// Removes `inst` from `block`'s instruction list (but not from the
    /// arena — ids stay stable). Used by `dce_pure_insts` once an
    /// instruction's result has a zero use count.
    pub fn remove_inst_from_block(&mut self, block: BlockId, inst: InstId) {
        self.blocks[block.index()].insts.retain(|&i| i != inst);
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.index()]
    }

    pub fn func_mut(&mut self, id: FuncId) -> &mut Func {
        &mut self.funcs[id.index()]
    }
}
