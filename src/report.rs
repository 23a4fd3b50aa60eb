use std::collections::HashSet;
use std::fmt;

use crate::scope::{Kind, Type};
use crate::token::TokenKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Syntax,
    Scope,
    Kind,
    Type,
    Internal,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Category::Syntax => "syntax",
            Category::Scope => "scope",
            Category::Kind => "kind",
            Category::Type => "type",
            Category::Internal => "internal",
        };
        f.write_str(label)
    }
}

pub const SYNTAX_ERROR_CODE: u16 = 100;

#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeFault {
    UndefinedName = 201,
    AmbiguousName = 202,
}

impl ScopeFault {
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn message(self) -> &'static str {
        match self {
            ScopeFault::UndefinedName => "Undefined name.",
            ScopeFault::AmbiguousName => "Ambiguous name.",
        }
    }
}

#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindFault {
    ConstantExpected = 301,
    ArrayBoundNotPositive = 302,
    AssignToConstant = 303,
    AssignmentCountMismatch = 304,
    ReadIntoConstant = 305,
    RandomizeConstant = 306,
    ReceiveIntoConstant = 307,
    NotAProcedure = 308,
    ProcedureIsNotAValue = 309,
    ArrayIndexMissing = 310,
    NotAnArray = 311,
    ArgumentCountMismatch = 312,
    ArgumentKindMismatch = 313,
    ParallelReturnsValue = 314,
    ParallelReferenceParameter = 315,
    ParallelWithoutChannel = 316,
    ParallelUsesIo = 317,
    ParallelTouchesOuterScope = 318,
    ParallelCallsUnfriendly = 319,
}

impl KindFault {
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn message(self) -> &'static str {
        match self {
            KindFault::ConstantExpected => "Constant expected.",
            KindFault::ArrayBoundNotPositive => "Array bound must be positive.",
            KindFault::AssignToConstant => "Cannot assign to a constant.",
            KindFault::AssignmentCountMismatch => {
                "Assignment targets and expressions must match in number."
            }
            KindFault::ReadIntoConstant => "Cannot read into a constant.",
            KindFault::RandomizeConstant => "Cannot randomize a constant.",
            KindFault::ReceiveIntoConstant => "Cannot receive into a constant.",
            KindFault::NotAProcedure => "Name is not a procedure.",
            KindFault::ProcedureIsNotAValue => "Procedure name is not a value.",
            KindFault::ArrayIndexMissing => "Array access requires an index.",
            KindFault::NotAnArray => "Indexed object is not an array.",
            KindFault::ArgumentCountMismatch => {
                "Argument count does not match parameter count."
            }
            KindFault::ArgumentKindMismatch => {
                "Argument kind does not match parameter kind."
            }
            KindFault::ParallelReturnsValue => {
                "Parallel procedure must not return a value."
            }
            KindFault::ParallelReferenceParameter => {
                "Parallel procedure must not have reference parameters."
            }
            KindFault::ParallelWithoutChannel => {
                "Parallel procedure must have a channel parameter."
            }
            KindFault::ParallelUsesIo => {
                "Parallel procedure must not use input or output."
            }
            KindFault::ParallelTouchesOuterScope => {
                "Parallel procedure must not use objects of enclosing scopes."
            }
            KindFault::ParallelCallsUnfriendly => {
                "Parallel procedure must not call a parallel-unfriendly procedure."
            }
        }
    }
}

#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFault {
    NegatedConstantNotInteger = 401,
    ArrayBoundNotInteger = 402,
    IndexNotInteger = 403,
    NotOperandNotBoolean = 404,
    MinusOperandNotInteger = 405,
    ConditionNotBoolean = 406,
    ReceiveTargetNotInteger = 407,
    AssignmentMismatch = 408,
    ArgumentTypeMismatch = 409,
    ReadTargetNotReadable = 410,
    WriteValueNotWritable = 411,
    RandomizeTargetNotInteger = 412,
    OpenTargetNotChannel = 413,
    SendValueNotInteger = 414,
    SendChannelNotChannel = 415,
    ReceiveChannelNotChannel = 416,
}

impl TypeFault {
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn message(self) -> &'static str {
        match self {
            TypeFault::NegatedConstantNotInteger => "Negated constant must be an integer.",
            TypeFault::ArrayBoundNotInteger => "Array bound must be an integer.",
            TypeFault::IndexNotInteger => "Array index must be an integer.",
            TypeFault::NotOperandNotBoolean => "Operand of ! must be a boolean.",
            TypeFault::MinusOperandNotInteger => "Operand of unary - must be an integer.",
            TypeFault::ConditionNotBoolean => "Condition must be a boolean.",
            TypeFault::ReceiveTargetNotInteger => "Receive target must be an integer.",
            TypeFault::AssignmentMismatch => "Assignment operands must have the same type.",
            TypeFault::ArgumentTypeMismatch => {
                "Argument type does not match parameter type."
            }
            TypeFault::ReadTargetNotReadable => {
                "Read target must be a boolean or an integer."
            }
            TypeFault::WriteValueNotWritable => {
                "Written value must be a boolean or an integer."
            }
            TypeFault::RandomizeTargetNotInteger => "Randomize target must be an integer.",
            TypeFault::OpenTargetNotChannel => "Open target must be a channel.",
            TypeFault::SendValueNotInteger => "Sent value must be an integer.",
            TypeFault::SendChannelNotChannel => "Send operand after -> must be a channel.",
            TypeFault::ReceiveChannelNotChannel => {
                "Receive operand after -> must be a channel."
            }
        }
    }
}

/// Type faults of the two-operand operators. The operator's source
/// spelling is embedded in the rendered message.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiadicFault {
    EqualityMismatch = 451,
    LogicalLeftNotBoolean = 452,
    LogicalRightNotBoolean = 453,
    RelationalLeftNotInteger = 454,
    RelationalRightNotInteger = 455,
    AdditiveLeftNotInteger = 456,
    AdditiveRightNotInteger = 457,
    MultiplicativeLeftNotInteger = 458,
    MultiplicativeRightNotInteger = 459,
    EqualityOnVoid = 460,
}

impl DiadicFault {
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn message(self, operator: TokenKind) -> String {
        let op = operator.spelling();
        match self {
            DiadicFault::EqualityMismatch => {
                format!("Operands of {op} must have the same type.")
            }
            DiadicFault::LogicalLeftNotBoolean => {
                format!("Left operand of {op} must be a boolean.")
            }
            DiadicFault::LogicalRightNotBoolean => {
                format!("Right operand of {op} must be a boolean.")
            }
            DiadicFault::RelationalLeftNotInteger
            | DiadicFault::AdditiveLeftNotInteger
            | DiadicFault::MultiplicativeLeftNotInteger => {
                format!("Left operand of {op} must be an integer.")
            }
            DiadicFault::RelationalRightNotInteger
            | DiadicFault::AdditiveRightNotInteger
            | DiadicFault::MultiplicativeRightNotInteger => {
                format!("Right operand of {op} must be an integer.")
            }
            DiadicFault::EqualityOnVoid => {
                format!("Operands of {op} must not be void.")
            }
        }
    }
}

/// Compiler-bug diagnostics. Always reported.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalFault {
    InvalidDispatchTarget = 1,
    CodeBufferTooLarge = 2,
    ParameterBookkeeping = 3,
}

impl InternalFault {
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn message(self) -> &'static str {
        match self {
            InternalFault::InvalidDispatchTarget => "Invalid dispatch target.",
            InternalFault::CodeBufferTooLarge => "Code buffer too large.",
            InternalFault::ParameterBookkeeping => "Inconsistent parameter bookkeeping.",
        }
    }
}

/// Receiver of compile diagnostics. The driver plugs in a stderr writer;
/// tests plug in a recorder.
pub trait DiagnosticSink {
    fn report(&mut self, line: u32, category: Category, code: u16, message: &str);
}

pub struct StderrSink;

impl DiagnosticSink for StderrSink {
    fn report(&mut self, line: u32, category: Category, code: u16, message: &str) {
        eprintln!("line {line}: {category} error {code}: {message}");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub line: u32,
    pub category: Category,
    pub code: u16,
    pub message: String,
}

#[derive(Default)]
pub struct RecordingSink {
    pub reports: Vec<Report>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn codes(&self) -> Vec<u16> {
        self.reports.iter().map(|r| r.code).collect()
    }
}

impl DiagnosticSink for RecordingSink {
    fn report(&mut self, line: u32, category: Category, code: u16, message: &str) {
        self.reports.push(Report {
            line,
            category,
            code,
            message: message.to_string(),
        });
    }
}

/// The error reporter. Owns the compilation-wide error latch and the
/// per-line deduplication that keeps one bad line from producing a
/// cascade of messages.
///
/// Kind faults skip the per-line dedup on purpose: the parallel
/// statement's friendliness audit lists every violation of one call in
/// order. Their cascade protection is the Undefined-kind suppression
/// instead.
pub struct Reporter<'s> {
    sink: &'s mut dyn DiagnosticSink,
    error_free: bool,
    dirty_lines: HashSet<u32>,
}

impl<'s> Reporter<'s> {
    pub fn new(sink: &'s mut dyn DiagnosticSink) -> Self {
        Reporter {
            sink,
            error_free: true,
            dirty_lines: HashSet::new(),
        }
    }

    pub fn is_error_free(&self) -> bool {
        self.error_free
    }

    /// Flag a line as already handled; recovery skipping uses this so the
    /// line it lands on stays quiet.
    pub fn mark_line(&mut self, line: u32) {
        self.dirty_lines.insert(line);
    }

    fn deduped(&mut self, line: u32, category: Category, code: u16, message: &str) {
        self.error_free = false;
        if self.dirty_lines.insert(line) {
            self.sink.report(line, category, code, message);
        }
    }

    pub fn syntax_error(&mut self, line: u32) {
        self.deduped(line, Category::Syntax, SYNTAX_ERROR_CODE, "Syntax error.");
    }

    pub fn scope_error(&mut self, line: u32, fault: ScopeFault) {
        self.deduped(line, Category::Scope, fault.code(), fault.message());
    }

    /// Suppressed when the offending kind is Undefined: the missing
    /// definition was already reported.
    pub fn kind_error(&mut self, line: u32, kind: Kind, fault: KindFault) {
        if kind == Kind::Undefined {
            return;
        }
        self.error_free = false;
        self.dirty_lines.insert(line);
        self.sink
            .report(line, Category::Kind, fault.code(), fault.message());
    }

    /// Suppressed when the offending type is Universal: the expression
    /// already carries an error.
    pub fn type_error(&mut self, line: u32, typ: Type, fault: TypeFault) {
        if typ.is_universal() {
            return;
        }
        self.deduped(line, Category::Type, fault.code(), fault.message());
    }

    pub fn diadic_error(
        &mut self,
        line: u32,
        left: Type,
        right: Type,
        fault: DiadicFault,
        operator: TokenKind,
    ) {
        if left.is_universal() || right.is_universal() {
            return;
        }
        let message = fault.message(operator);
        self.deduped(line, Category::Type, fault.code(), &message);
    }

    pub fn internal_error(&mut self, line: u32, fault: InternalFault) {
        self.error_free = false;
        self.sink
            .report(line, Category::Internal, fault.code(), fault.message());
    }
}
