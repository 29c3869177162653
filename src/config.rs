//! Ambient configuration for the pipeline (builder options, pass-manager
//! bounds, diagnostic language). Mirrors the role `CompilerConfig` plays for
//! the teacher toolchain's codegen stage, but scoped to the knobs this
//! core's three subsystems actually expose.
//!
//! # Concurrency & resource model (§5)
//!
//! The core is single-threaded cooperative: one compilation unit is driven
//! by one logical task, nothing here suspends, and nothing is a
//! process-wide singleton. A driver compiling many units in parallel must
//! give each its own [`TypeChecker`](crate::tyck::TypeChecker), arenas and
//! `TypePool` — none of the state below is shared across units.

/// Output language for rendered diagnostic templates (§4.3.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLanguage {
    English,
    Korean,
}

impl Default for DiagnosticLanguage {
    fn default() -> Self {
        DiagnosticLanguage::English
    }
}

/// Options threaded through `check_program` purely for diagnostic
/// rendering; none of them affect type-checking semantics.
#[derive(Debug, Clone)]
pub struct TyckOptions {
    pub diagnostic_language: DiagnosticLanguage,
}

impl Default for TyckOptions {
    fn default() -> Self {
        TyckOptions { diagnostic_language: DiagnosticLanguage::default() }
    }
}

/// Options passed to [`crate::sir::build_sir_module`] (§4.4.1's `opts`).
#[derive(Debug, Clone)]
pub struct SirBuilderOptions {
    /// When true, every lowered `Func` keeps a `has_any_write` summary even
    /// for pure-looking bodies, useful for downstream diagnostics that want
    /// to double check the join. Off by default since SIR already records
    /// this per §4.4.2.
    pub verbose_effect_summary: bool,
}

impl Default for SirBuilderOptions {
    fn default() -> Self {
        SirBuilderOptions { verbose_effect_summary: false }
    }
}

/// Bounds for the OIR guarded pass runner (§4.6.2, §4.6.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassManagerConfig {
    /// Round cap for `run_guarded_pass_fixpoint_` (mem2reg / GVN-CSE / LICM
    /// / loop-canonicalization re-runs). The original pipeline uses 4.
    pub max_opt_rounds: u32,
    /// Whether `verify_pipeline_invariants` also checks the loop-fixpoint
    /// invariant (V4) after every guarded advanced pass.
    pub require_loop_fixpoint: bool,
}

impl Default for PassManagerConfig {
    fn default() -> Self {
        PassManagerConfig { max_opt_rounds: 4, require_loop_fixpoint: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_pipeline() {
        let cfg = PassManagerConfig::default();
        assert_eq!(cfg.max_opt_rounds, 4);
        assert!(cfg.require_loop_fixpoint);
    }
}
