use crate::ast::Span;
use thiserror::Error;

/// Why a method was not lowered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LowerError {
    /// The method contains no yield() calls. Never reported.
    #[error("method does not use yield()")]
    NotApplicable,
    /// The method uses yield() in a way that cannot be lowered.
    #[error("{} yield() usage error(s)", .0.len())]
    Usage(Vec<UsageError>),
    /// An AST shape the engine cannot analyze. Logged, never reported.
    #[error("internal lowering error: {0}")]
    Internal(String),
}

impl From<Vec<UsageError>> for LowerError {
    fn from(errors: Vec<UsageError>) -> Self {
        LowerError::Usage(errors)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error(
        "method '{method}' uses yield() but does not return java.util.Iterator or java.lang.Iterable"
    )]
    WrongReturnType { method: String, span: Span },

    #[error("yield() cannot be used in a constructor")]
    Constructor { span: Span },

    #[error("parameter '{name}' must be final to be used in a method with yield()")]
    NonFinalParameter { name: String, span: Span },

    #[error("return statements are not allowed in a method with yield()")]
    Return { span: Span },

    #[error(
        "unqualified 'this' is not allowed in a method with yield(); qualify it with the class name"
    )]
    UnqualifiedThis { span: Span },

    #[error("unqualified 'super' is not allowed in a method with yield()")]
    UnqualifiedSuper { span: Span },

    #[error("call to '{name}()' would bind to the generated iterator; qualify it")]
    ShadowedMethod { name: String, span: Span },

    #[error("'{name}' is reserved for the generated iterator")]
    ReservedName { name: String, span: Span },

    #[error("yield() must be used as a statement")]
    YieldInExpression { span: Span },

    #[error("yield() takes exactly one argument, found {found}")]
    YieldArity { found: usize, span: Span },

    #[error("yield() is not supported inside try, catch or finally")]
    YieldInTry { span: Span },

    #[error("break/continue out of try in a method with yield()")]
    JumpOutOfTry { span: Span },

    #[error("break outside of a loop or switch")]
    BreakOutsideLoop { span: Span },

    #[error("continue outside of a loop")]
    ContinueOutsideLoop { span: Span },

    #[error("undefined label '{label}'")]
    UndefinedLabel { label: String, span: Span },

    #[error("label '{label}' is ambiguous")]
    AmbiguousLabel { label: String, span: Span },

    #[error("'{label}' does not label a loop")]
    NotALoopLabel { label: String, span: Span },

    #[error("variable '{name}' is declared as both {first} and {second}")]
    ConflictingCapture {
        name: String,
        first: String,
        second: String,
        span: Span,
    },
}

impl UsageError {
    pub fn span(&self) -> Span {
        match self {
            UsageError::WrongReturnType { span, .. }
            | UsageError::Constructor { span }
            | UsageError::NonFinalParameter { span, .. }
            | UsageError::Return { span }
            | UsageError::UnqualifiedThis { span }
            | UsageError::UnqualifiedSuper { span }
            | UsageError::ShadowedMethod { span, .. }
            | UsageError::ReservedName { span, .. }
            | UsageError::YieldInExpression { span }
            | UsageError::YieldArity { span, .. }
            | UsageError::YieldInTry { span }
            | UsageError::JumpOutOfTry { span }
            | UsageError::BreakOutsideLoop { span }
            | UsageError::ContinueOutsideLoop { span }
            | UsageError::UndefinedLabel { span, .. }
            | UsageError::AmbiguousLabel { span, .. }
            | UsageError::NotALoopLabel { span, .. }
            | UsageError::ConflictingCapture { span, .. } => *span,
        }
    }
}
