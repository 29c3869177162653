//! The pipeline driver (§4.6.1, §4.6.4): wires the fixed thirteen-step
//! pass order through the guarded runner. This is the one place in the
//! core with a genuine Rust-level fallible boundary — everywhere else
//! (type checking, SIR lowering) reports failure in-band via a
//! diagnostic bag and an `ok` flag, never `Result` — so [`PipelineError`]
//! is hand-rolled rather than derived, the same way the teacher
//! toolchain's own codegen errors are.

use std::fmt;

use crate::config::PassManagerConfig;

use super::pass_manager::{run_guarded_pass_fixpoint, run_guarded_pass_once};
use super::passes;
use super::verifier::verify_pipeline_invariants;
use super::Module;

/// Why the pipeline refused to run, or stopped partway through (§4.6.4).
#[derive(Debug)]
pub enum PipelineError {
    /// `max_opt_rounds == 0`: there is no budget to run even one fixpoint
    /// round of the SSA-sensitive passes, so the driver refuses outright
    /// rather than silently skipping them.
    ZeroOptRounds,
    /// The module failed structural/dominance verification before any
    /// pass had a chance to run — the caller handed in an already-invalid
    /// module.
    InvalidInput(Vec<String>),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::ZeroOptRounds => {
                write!(f, "pass manager config requires max_opt_rounds > 0")
            }
            PipelineError::InvalidInput(violations) => {
                write!(f, "module failed verification before any pass ran: {}", violations.join("; "))
            }
        }
    }
}

impl std::error::Error for PipelineError {}

/// Runs the fixed §4.6.1 pipeline over `m` in place, returning the number
/// of fixpoint rounds each SSA-sensitive re-run actually took (mostly
/// useful for `tracing::debug!` trails and tests, not load-bearing).
#[tracing::instrument(skip_all)]
pub fn run_pipeline(m: &mut Module, cfg: &PassManagerConfig) -> Result<(), PipelineError> {
    if cfg.max_opt_rounds == 0 {
        return Err(PipelineError::ZeroOptRounds);
    }

    let initial = verify_pipeline_invariants(m, cfg.require_loop_fixpoint);
    if !initial.is_empty() {
        return Err(PipelineError::InvalidInput(initial.iter().map(|v| format!("{:?}", v)).collect()));
    }

    let req_lf = cfg.require_loop_fixpoint;
    let (outcome, _) = run_guarded_pass_once(m, req_lf, passes::simplify_cfg);
    tracing::debug!(?outcome, pass = "simplify_cfg");

    let (outcome, _) = run_guarded_pass_once(m, req_lf, passes::split_critical_edges);
    tracing::debug!(?outcome, pass = "split_critical_edges");

    run_guarded_pass_fixpoint(m, req_lf, cfg.max_opt_rounds, passes::canonicalize_loops);
    run_guarded_pass_fixpoint(m, req_lf, cfg.max_opt_rounds, passes::normalize_phi_edge_casts);

    run_guarded_pass_fixpoint(m, req_lf, cfg.max_opt_rounds, passes::const_fold);
    run_guarded_pass_fixpoint(m, req_lf, cfg.max_opt_rounds, passes::local_load_forward);
    run_guarded_pass_fixpoint(m, req_lf, cfg.max_opt_rounds, passes::global_mem2reg_ssa);
    run_guarded_pass_fixpoint(m, req_lf, cfg.max_opt_rounds, passes::gvn_cse);
    run_guarded_pass_fixpoint(m, req_lf, cfg.max_opt_rounds, passes::licm);

    // Re-runs (§4.6.1 step 10): loop shape and phi-edge types can shift
    // again once mem2reg/GVN/LICM have moved things around.
    run_guarded_pass_fixpoint(m, req_lf, cfg.max_opt_rounds, passes::canonicalize_loops);
    run_guarded_pass_fixpoint(m, req_lf, cfg.max_opt_rounds, passes::local_load_forward);
    run_guarded_pass_fixpoint(m, req_lf, cfg.max_opt_rounds, passes::normalize_phi_edge_casts);

    let (outcome, _) = run_guarded_pass_once(m, req_lf, passes::optimize_escape_handles);
    tracing::debug!(?outcome, pass = "optimize_escape_handles");

    run_guarded_pass_fixpoint(m, req_lf, cfg.max_opt_rounds, passes::dce_pure_insts);

    let (outcome, _) = run_guarded_pass_once(m, req_lf, passes::simplify_cfg);
    tracing::debug!(?outcome, pass = "final simplify_cfg");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_opt_rounds_is_rejected_before_any_pass_runs() {
        let mut m = Module::new();
        let cfg = PassManagerConfig { max_opt_rounds: 0, require_loop_fixpoint: true };
        let err = run_pipeline(&mut m, &cfg).unwrap_err();
        assert!(matches!(err, PipelineError::ZeroOptRounds));
    }
}
