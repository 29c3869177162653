//! Structured diagnostics (§4.3.8, §7).
//!
//! The checker never aborts on the first error: every error path records a
//! typed [`DiagnosticCode`] plus positional `args` for a templated message,
//! pushes it into whatever [`DiagnosticBag`] the driver supplies, marks the
//! surrounding result `ok = false`, and continues with `error`-typed
//! fallbacks. Diagnostic rendering itself (picking a language, formatting
//! the final string with a [`crate::source::SourceManager`] snippet) is the
//! driver's job; this module only owns the codes and the two message
//! templates per code.

use crate::source::Span;

/// Diagnostic severity. Only `Fatal` ends the compilation unit early (it
/// never aborts the process, per §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Hint,
    Warning,
    Error,
    Fatal,
}

/// Every structured error kind the core can emit, grouped as in §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCode {
    // type mismatch
    TypeMismatch,
    TypeNotCallable,
    TypeArgCountMismatch,
    TypeArgTypeMismatch,
    TypeNullCoalesceRhsMismatch,
    TypeErrorGeneric,

    // name resolution
    NameNotFound,
    DuplicateDecl,
    Shadowing,

    // overload resolution
    OverloadNoMatch,
    OverloadAmbiguous,
    OverloadDeclConflict,
    OverloadMangleCollision,
    CallOnlyOneNamedGroupAllowed,
    CallArgMixNotAllowed,

    // C-ABI
    CAbiOverloadNotAllowed,
    CAbiNamedGroupNotAllowed,
    CAbiNotFfiSafe,
    CAbiGlobalNotStatic,

    // integer literals
    IntLiteralInvalid,
    IntLiteralOverflow,
    IntNeedsContext,
    IntDoesNotFit,
    IntToFloatNotImplicit,

    // control flow
    BreakOutsideLoop,
    ContinueOutsideLoop,
    MissingReturn,
    ReturnOutsideFn,
    ReturnTypeMismatch,

    // place / mutability
    WriteToImmutable,
    LhsMustBePlace,

    // casts
    CastMissingOperand,
    CastMissingTarget,
    CastNullToNonOptional,
    CastNotAllowed,

    // generics / proto / class / acts
    GenericViolation,
    ProtoViolation,
    ClassViolation,
    ActsViolation,

    // borrow calculus (produced by the downstream capability pass, but the
    // code is declared here so the bag has one stable vocabulary)
    BorrowViolation,

    // IR verifier
    IrVerifierDominance,
    IrVerifierLoopFixpoint,
    IrVerifierStructural,

    // top-level policy
    TopLevelMustBeBlock,
}

impl DiagnosticCode {
    /// English message template. `{0}`, `{1}`, ... are replaced positionally
    /// by [`Diagnostic::render`].
    pub fn template_en(self) -> &'static str {
        use DiagnosticCode::*;
        match self {
            TypeMismatch => "type mismatch: expected {0}, found {1}",
            TypeNotCallable => "value of type {0} is not callable",
            TypeArgCountMismatch => "argument count mismatch: expected {0}, got {1}",
            TypeArgTypeMismatch => "argument {0} type mismatch: expected {1}, found {2}",
            TypeNullCoalesceRhsMismatch => "`??` element type {0} does not match rhs type {1}",
            TypeErrorGeneric => "{0}",
            NameNotFound => "name '{0}' not found",
            DuplicateDecl => "duplicate declaration of '{0}' in this scope",
            Shadowing => "declaration of '{0}' shadows an outer binding",
            OverloadNoMatch => "no matching overload for call to '{0}'",
            OverloadAmbiguous => "ambiguous call to overloaded '{0}'",
            OverloadDeclConflict => "overload of '{0}' conflicts with an existing declaration",
            OverloadMangleCollision => "overload of '{0}' produces a duplicate mangled name",
            CallOnlyOneNamedGroupAllowed => "only one named-group '{ ... }' is allowed in a call",
            CallArgMixNotAllowed => "mixing labeled and positional arguments is not allowed",
            CAbiOverloadNotAllowed => "C-ABI function '{0}' may not be overloaded",
            CAbiNamedGroupNotAllowed => "C-ABI function '{0}' may not use named-group parameters",
            CAbiNotFfiSafe => "type {0} is not FFI-safe",
            CAbiGlobalNotStatic => "C-ABI global '{0}' must be declared static",
            IntLiteralInvalid => "invalid integer literal '{0}'",
            IntLiteralOverflow => "integer literal '{0}' overflows {1}",
            IntNeedsContext => "integer literal needs a type context to resolve",
            IntDoesNotFit => "integer literal {0} does not fit in {1}",
            IntToFloatNotImplicit => "no implicit integer-to-float conversion (found {0}, expected {1})",
            BreakOutsideLoop => "'break' outside of a loop",
            ContinueOutsideLoop => "'continue' outside of a loop",
            MissingReturn => "missing return in function expected to return {0}",
            ReturnOutsideFn => "'return' outside of a function",
            ReturnTypeMismatch => "return type mismatch: expected {0}, found {1}",
            WriteToImmutable => "cannot write to immutable binding '{0}'",
            LhsMustBePlace => "left-hand side must be a place expression",
            CastMissingOperand => "cast is missing an operand",
            CastMissingTarget => "cast is missing a target type",
            CastNullToNonOptional => "cannot cast 'null' to non-optional type {0}",
            CastNotAllowed => "cast from {0} to {1} is not allowed",
            GenericViolation => "generic constraint violation: {0}",
            ProtoViolation => "protocol conformance violation: {0}",
            ClassViolation => "class declaration violation: {0}",
            ActsViolation => "acts declaration violation: {0}",
            BorrowViolation => "borrow calculus violation: {0}",
            IrVerifierDominance => "SSA dominance violated for value {0}",
            IrVerifierLoopFixpoint => "loop header {0} is missing a unique preheader",
            IrVerifierStructural => "OIR structural invariant violated: {0}",
            TopLevelMustBeBlock => "top-level program must be a block",
        }
    }

    /// Korean message template, mirroring `template_en` (§4.3.8: "two-language
    /// message templates").
    pub fn template_ko(self) -> &'static str {
        use DiagnosticCode::*;
        match self {
            TypeMismatch => "타입 불일치: {0}이(가) 필요하지만 {1}이(가) 있습니다",
            TypeNotCallable => "{0} 타입은 호출할 수 없습니다",
            TypeArgCountMismatch => "인자 개수 불일치: {0}개가 필요하지만 {1}개가 있습니다",
            TypeArgTypeMismatch => "{0}번째 인자 타입 불일치: {1}이(가) 필요하지만 {2}이(가) 있습니다",
            TypeNullCoalesceRhsMismatch => "`??` 요소 타입 {0}과(와) 우변 타입 {1}이(가) 일치하지 않습니다",
            TypeErrorGeneric => "{0}",
            NameNotFound => "이름 '{0}'을(를) 찾을 수 없습니다",
            DuplicateDecl => "이 스코프에서 '{0}'이(가) 중복 선언되었습니다",
            Shadowing => "'{0}' 선언이 바깥쪽 바인딩을 가립니다",
            OverloadNoMatch => "'{0}' 호출에 일치하는 오버로드가 없습니다",
            OverloadAmbiguous => "오버로드된 '{0}' 호출이 모호합니다",
            OverloadDeclConflict => "'{0}'의 오버로드가 기존 선언과 충돌합니다",
            OverloadMangleCollision => "'{0}'의 오버로드가 중복된 맹글링 이름을 생성합니다",
            CallOnlyOneNamedGroupAllowed => "호출에는 하나의 named-group '{ ... }'만 허용됩니다",
            CallArgMixNotAllowed => "라벨 인자와 위치 인자를 혼합할 수 없습니다",
            CAbiOverloadNotAllowed => "C-ABI 함수 '{0}'은(는) 오버로드될 수 없습니다",
            CAbiNamedGroupNotAllowed => "C-ABI 함수 '{0}'은(는) named-group 매개변수를 사용할 수 없습니다",
            CAbiNotFfiSafe => "{0} 타입은 FFI-safe하지 않습니다",
            CAbiGlobalNotStatic => "C-ABI 전역 '{0}'은(는) static으로 선언되어야 합니다",
            IntLiteralInvalid => "잘못된 정수 리터럴 '{0}'",
            IntLiteralOverflow => "정수 리터럴 '{0}'이(가) {1} 범위를 넘습니다",
            IntNeedsContext => "정수 리터럴을 해소하려면 타입 컨텍스트가 필요합니다",
            IntDoesNotFit => "정수 리터럴 {0}은(는) {1}에 맞지 않습니다",
            IntToFloatNotImplicit => "암묵적 정수->실수 변환은 없습니다 ({0}에서 {1}로)",
            BreakOutsideLoop => "루프 밖에서의 'break'",
            ContinueOutsideLoop => "루프 밖에서의 'continue'",
            MissingReturn => "{0}을(를) 반환해야 하는 함수에 return이 누락되었습니다",
            ReturnOutsideFn => "함수 밖에서의 'return'",
            ReturnTypeMismatch => "반환 타입 불일치: {0}이(가) 필요하지만 {1}이(가) 있습니다",
            WriteToImmutable => "불변 바인딩 '{0}'에 쓸 수 없습니다",
            LhsMustBePlace => "좌변은 place 표현식이어야 합니다",
            CastMissingOperand => "캐스트에 피연산자가 없습니다",
            CastMissingTarget => "캐스트에 대상 타입이 없습니다",
            CastNullToNonOptional => "'null'을 옵셔널이 아닌 {0} 타입으로 캐스트할 수 없습니다",
            CastNotAllowed => "{0}에서 {1}(으)로의 캐스트는 허용되지 않습니다",
            GenericViolation => "제네릭 제약 위반: {0}",
            ProtoViolation => "프로토콜 준수 위반: {0}",
            ClassViolation => "클래스 선언 위반: {0}",
            ActsViolation => "acts 선언 위반: {0}",
            BorrowViolation => "borrow 계산 위반: {0}",
            IrVerifierDominance => "값 {0}에 대한 SSA 지배 관계 위반",
            IrVerifierLoopFixpoint => "루프 헤더 {0}에 고유한 preheader가 없습니다",
            IrVerifierStructural => "OIR 구조적 불변식 위반: {0}",
            TopLevelMustBeBlock => "최상위 프로그램은 블록이어야 합니다",
        }
    }
}

/// One structured diagnostic: severity, code, source span and positional
/// template arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub span: Span,
    pub args: Vec<String>,
}

impl Diagnostic {
    pub fn new(severity: Severity, code: DiagnosticCode, span: Span, args: Vec<String>) -> Self {
        Diagnostic { severity, code, span, args }
    }

    pub fn error(code: DiagnosticCode, span: Span, args: Vec<String>) -> Self {
        Self::new(Severity::Error, code, span, args)
    }

    /// Render the message template for a given language, substituting
    /// `{0}`, `{1}`, ... with `self.args`.
    pub fn render(&self, korean: bool) -> String {
        let template = if korean { self.code.template_ko() } else { self.code.template_en() };
        let mut out = String::with_capacity(template.len());
        let mut chars = template.char_indices().peekable();
        let bytes = template.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'{' {
                if let Some(close) = template[i..].find('}') {
                    let idx_str = &template[i + 1..i + close];
                    if let Ok(idx) = idx_str.parse::<usize>() {
                        out.push_str(self.args.get(idx).map(String::as_str).unwrap_or(""));
                        i += close + 1;
                        continue;
                    }
                }
            }
            // advance by one full UTF-8 char, not one byte
            let ch = template[i..].chars().next().unwrap();
            out.push(ch);
            i += ch.len_utf8();
        }
        let _ = &mut chars; // silence unused peekable warning in some toolchains
        out
    }
}

/// Sink for structured diagnostics (§6.1). The core pushes into this trait
/// and never reads it back; rendering/sorting/deduplication is the
/// driver's job.
pub trait DiagnosticBag {
    fn push(&mut self, diag: Diagnostic);

    fn has_errors(&self) -> bool;
}

/// A simple in-memory `DiagnosticBag`, used by the core's own unit tests
/// and suitable as a default for drivers that just want a `Vec`.
#[derive(Debug, Default, Clone)]
pub struct VecDiagnosticBag {
    pub diagnostics: Vec<Diagnostic>,
}

impl DiagnosticBag for VecDiagnosticBag {
    fn push(&mut self, diag: Diagnostic) {
        self.diagnostics.push(diag);
    }

    fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity >= Severity::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_positional_args() {
        let d = Diagnostic::error(
            DiagnosticCode::TypeMismatch,
            Span::DUMMY,
            vec!["i32".to_string(), "i64".to_string()],
        );
        assert_eq!(d.render(false), "type mismatch: expected i32, found i64");
        assert!(d.render(true).contains("i32"));
    }

    #[test]
    fn bag_tracks_error_severity() {
        let mut bag = VecDiagnosticBag::default();
        assert!(!bag.has_errors());
        bag.push(Diagnostic::new(
            Severity::Warning,
            DiagnosticCode::Shadowing,
            Span::DUMMY,
            vec!["x".into()],
        ));
        assert!(!bag.has_errors());
        bag.push(Diagnostic::error(DiagnosticCode::NameNotFound, Span::DUMMY, vec!["y".into()]));
        assert!(bag.has_errors());
    }
}
