//! Overload resolution over positional / labeled / positional+named-group
//! call forms (§4.3.4), grounded in
//! `type_check_expr_call_cast.cpp::check_expr_call_`'s candidate
//! construction and two-stage matching.

use std::collections::HashSet;

use crate::ast::{Arg, ArgKind};
use crate::diagnostics::DiagnosticCode;
use crate::ids::StmtId;
use crate::source::Span;
use crate::types::{FnSig, Type, TypeId};

use super::state::TypeChecker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallForm {
    Positional,
    Labeled,
    PositionalPlusNamedGroup,
    MixedInvalid,
}

/// One flattened call-site argument: its expression and, for labeled /
/// named-group entries, its label.
#[derive(Debug, Clone, Copy)]
pub struct FlatArg<'ast> {
    pub label: Option<&'ast str>,
    pub expr: Option<crate::ids::ExprId>,
    pub span: Span,
}

pub struct ClassifiedCall<'ast> {
    pub form: CallForm,
    pub positional: Vec<FlatArg<'ast>>,
    pub labeled: Vec<FlatArg<'ast>>,
    pub group: Vec<FlatArg<'ast>>,
    pub duplicate_group_span: Option<Span>,
}

impl<'a> TypeChecker<'a> {
    pub(crate) fn classify_call<'ast>(&self, args: &'ast [Arg]) -> ClassifiedCall<'ast> {
        let mut positional = Vec::new();
        let mut labeled = Vec::new();
        let mut group = Vec::new();
        let mut saw_group = false;
        let mut duplicate_group_span = None;

        for a in args {
            match a.kind {
                ArgKind::NamedGroup => {
                    if saw_group {
                        duplicate_group_span.get_or_insert(a.span);
                    } else {
                        saw_group = true;
                        for child in self.ast.named_group_children(a) {
                            group.push(FlatArg { label: child.label.as_deref(), expr: child.expr, span: child.span });
                        }
                    }
                }
                ArgKind::Labeled => {
                    labeled.push(FlatArg { label: a.label.as_deref(), expr: a.expr, span: a.span });
                }
                ArgKind::Positional => {
                    positional.push(FlatArg { label: None, expr: a.expr, span: a.span });
                }
            }
        }

        let form = if saw_group {
            if labeled.is_empty() { CallForm::PositionalPlusNamedGroup } else { CallForm::MixedInvalid }
        } else if !labeled.is_empty() && !positional.is_empty() {
            CallForm::MixedInvalid
        } else if !labeled.is_empty() {
            CallForm::Labeled
        } else {
            CallForm::Positional
        };

        ClassifiedCall { form, positional, labeled, group, duplicate_group_span }
    }

    /// Diagnoses the first duplicate label across `args`, if any.
    pub(crate) fn find_duplicate_label(&mut self, args: &[FlatArg]) -> bool {
        let mut seen = HashSet::new();
        for a in args {
            if let Some(label) = a.label {
                if !seen.insert(label) {
                    self.err(DiagnosticCode::DuplicateDecl, a.span, vec![label.to_string()]);
                    return true;
                }
            }
        }
        false
    }

    /// Runs the two-stage (A: no defaults, B: allow defaults) matching
    /// over `candidates` for a classified call, returning the single
    /// surviving declaration, or `None` with a diagnostic already emitted
    /// (§4.3.4).
    pub(crate) fn resolve_overload(
        &mut self,
        callee_name: &str,
        call_span: Span,
        call: &ClassifiedCall,
        candidates: &[StmtId],
        mut arg_type: impl FnMut(&mut Self, crate::ids::ExprId, TypeId) -> TypeId,
    ) -> Option<StmtId> {
        let filtered: Vec<StmtId> = candidates
            .iter()
            .copied()
            .filter(|sid| self.candidate_matches_form(*sid, call.form))
            .collect();

        let mut stage_a = Vec::new();
        for sid in &filtered {
            if self.candidate_matches_no_defaults(*sid, call, &mut arg_type) {
                stage_a.push(*sid);
            }
        }
        let mut stage_winners = stage_a;
        if stage_winners.is_empty() {
            for sid in &filtered {
                if self.candidate_matches_allow_defaults(*sid, call, &mut arg_type) {
                    stage_winners.push(*sid);
                }
            }
        }

        match stage_winners.len() {
            0 => {
                self.err(DiagnosticCode::OverloadNoMatch, call_span, vec![callee_name.to_string()]);
                None
            }
            1 => Some(stage_winners[0]),
            _ => {
                self.err(DiagnosticCode::OverloadAmbiguous, call_span, vec![callee_name.to_string()]);
                None
            }
        }
    }

    /// Same two-stage matching as [`Self::resolve_overload`], but against
    /// dot-call candidates whose leading `self` parameter (if any) is
    /// matched against the receiver separately, not against `call`'s
    /// argument list (§4.3.5).
    pub(crate) fn resolve_method_overload_call(
        &mut self,
        name: &str,
        call_span: Span,
        call: &ClassifiedCall,
        candidates: &[StmtId],
        mut arg_type: impl FnMut(&mut Self, crate::ids::ExprId, TypeId) -> TypeId,
    ) -> Option<StmtId> {
        let filtered: Vec<StmtId> = candidates
            .iter()
            .copied()
            .filter(|sid| self.method_candidate_matches_form(*sid, call.form))
            .collect();

        let mut stage_winners: Vec<StmtId> = Vec::new();
        for sid in &filtered {
            if self.method_candidate_matches(*sid, call, false, &mut arg_type) {
                stage_winners.push(*sid);
            }
        }
        if stage_winners.is_empty() {
            for sid in &filtered {
                if self.method_candidate_matches(*sid, call, true, &mut arg_type) {
                    stage_winners.push(*sid);
                }
            }
        }

        match stage_winners.len() {
            0 => {
                self.err(DiagnosticCode::OverloadNoMatch, call_span, vec![name.to_string()]);
                None
            }
            1 => Some(stage_winners[0]),
            _ => {
                self.err(DiagnosticCode::OverloadAmbiguous, call_span, vec![name.to_string()]);
                None
            }
        }
    }

    fn candidate_sig(&self, sid: StmtId) -> Option<FnSig> {
        let ty = *self.fn_decl_type.get(&sid)?;
        match self.types.get(ty) {
            Type::Fn(sig) => Some(sig.clone()),
            _ => None,
        }
    }

    /// Like [`Self::candidate_sig`], but with the leading `self` parameter
    /// stripped when `sid` takes one — the shape a dot-call's
    /// caller-supplied argument list actually has to match against, since
    /// the receiver is supplied by the base expression, not a call arg
    /// (§4.3.5, §4.4.2).
    fn method_candidate_sig(&self, sid: StmtId) -> Option<FnSig> {
        let mut sig = self.candidate_sig(sid)?;
        if self.candidate_takes_self(sid) && !sig.params.is_empty() {
            sig.params.remove(0);
            sig.labels.remove(0);
            sig.has_default.remove(0);
            sig.positional_param_count = sig.positional_param_count.saturating_sub(1);
        }
        Some(sig)
    }

    fn candidate_matches_form(&self, sid: StmtId, form: CallForm) -> bool {
        let Some(sig) = self.candidate_sig(sid) else { return false };
        Self::sig_matches_form(&sig, form)
    }

    fn method_candidate_matches_form(&self, sid: StmtId, form: CallForm) -> bool {
        let Some(sig) = self.method_candidate_sig(sid) else { return false };
        Self::sig_matches_form(&sig, form)
    }

    fn sig_matches_form(sig: &FnSig, form: CallForm) -> bool {
        let has_named = sig.positional_param_count as usize != sig.params.len();
        match form {
            CallForm::Positional => !has_named,
            CallForm::Labeled => !has_named,
            CallForm::PositionalPlusNamedGroup => has_named,
            CallForm::MixedInvalid => false,
        }
    }

    fn candidate_matches_no_defaults(
        &mut self,
        sid: StmtId,
        call: &ClassifiedCall,
        arg_type: &mut impl FnMut(&mut Self, crate::ids::ExprId, TypeId) -> TypeId,
    ) -> bool {
        let Some(sig) = self.candidate_sig(sid) else { return false };
        Self::sig_matches(self, &sig, call, false, arg_type)
    }

    fn candidate_matches_allow_defaults(
        &mut self,
        sid: StmtId,
        call: &ClassifiedCall,
        arg_type: &mut impl FnMut(&mut Self, crate::ids::ExprId, TypeId) -> TypeId,
    ) -> bool {
        let Some(sig) = self.candidate_sig(sid) else { return false };
        Self::sig_matches(self, &sig, call, true, arg_type)
    }

    fn method_candidate_matches(
        &mut self,
        sid: StmtId,
        call: &ClassifiedCall,
        allow_defaults: bool,
        arg_type: &mut impl FnMut(&mut Self, crate::ids::ExprId, TypeId) -> TypeId,
    ) -> bool {
        let Some(sig) = self.method_candidate_sig(sid) else { return false };
        Self::sig_matches(self, &sig, call, allow_defaults, arg_type)
    }

    fn sig_matches(
        &mut self,
        sig: &FnSig,
        call: &ClassifiedCall,
        allow_defaults: bool,
        arg_type: &mut impl FnMut(&mut Self, crate::ids::ExprId, TypeId) -> TypeId,
    ) -> bool {
        let pos_count = sig.positional_param_count as usize;

        match call.form {
            CallForm::Positional => {
                if call.positional.len() > pos_count {
                    return false;
                }
                if call.positional.len() < pos_count && !allow_defaults {
                    return false;
                }
                if call.positional.len() < pos_count
                    && !(pos_count - call.positional.len()..pos_count)
                        .all(|i| sig.has_default[i])
                {
                    return false;
                }
                for (i, a) in call.positional.iter().enumerate() {
                    let expected = sig.params[i];
                    let Some(expr) = a.expr else { return false };
                    let actual = arg_type(self, expr, expected);
                    if !self.can_assign(expected, actual) {
                        return false;
                    }
                }
                true
            }
            CallForm::Labeled => {
                if call.labeled.len() != sig.labels.len() {
                    return false;
                }
                for a in &call.labeled {
                    let Some(label) = a.label else { return false };
                    let Some(idx) = sig.labels.iter().position(|l| l == label) else { return false };
                    let expected = sig.params[idx];
                    let Some(expr) = a.expr else { return false };
                    let actual = arg_type(self, expr, expected);
                    if !self.can_assign(expected, actual) {
                        return false;
                    }
                }
                true
            }
            CallForm::PositionalPlusNamedGroup => {
                if call.positional.len() > pos_count {
                    return false;
                }
                if call.positional.len() < pos_count && !allow_defaults {
                    return false;
                }
                for (i, a) in call.positional.iter().enumerate() {
                    let expected = sig.params[i];
                    let Some(expr) = a.expr else { return false };
                    let actual = arg_type(self, expr, expected);
                    if !self.can_assign(expected, actual) {
                        return false;
                    }
                }
                let named_labels = sig.named_labels().to_vec();
                let named_params = sig.named_params().to_vec();
                let named_defaults = &sig.has_default[pos_count..];
                let mut supplied = vec![false; named_labels.len()];
                for a in &call.group {
                    let Some(label) = a.label else { return false };
                    let Some(idx) = named_labels.iter().position(|l| l == label) else { return false };
                    supplied[idx] = true;
                    let expected = named_params[idx];
                    let Some(expr) = a.expr else { return false };
                    let actual = arg_type(self, expr, expected);
                    if !self.can_assign(expected, actual) {
                        return false;
                    }
                }
                for (idx, got) in supplied.iter().enumerate() {
                    if !*got {
                        if !allow_defaults || !named_defaults[idx] {
                            return false;
                        }
                    }
                }
                true
            }
            CallForm::MixedInvalid => false,
        }
    }
}
