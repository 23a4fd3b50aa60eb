use super::{Parser, EXPRESSION_FIRST};
use crate::assembler::Opcode;
use crate::names::NameId;
use crate::report::{DiadicFault, KindFault, TypeFault};
use crate::scope::{Kind, Type};
use crate::symbols::SymbolSet;
use crate::token::{TokenArg, TokenKind};

const LOGICAL_OPS: SymbolSet = SymbolSet::of(&[TokenKind::And, TokenKind::Or]);

const RELATIONAL_OPS: SymbolSet = SymbolSet::of(&[
    TokenKind::Less,
    TokenKind::LessOrEqual,
    TokenKind::Equal,
    TokenKind::NotEqual,
    TokenKind::Greater,
    TokenKind::GreaterOrEqual,
]);

const ADDITIVE_OPS: SymbolSet = SymbolSet::of(&[TokenKind::Plus, TokenKind::Minus]);

const MULTIPLICATIVE_OPS: SymbolSet = SymbolSet::of(&[
    TokenKind::Multiply,
    TokenKind::Divide,
    TokenKind::Modulo,
    TokenKind::Power,
]);

/// What an object access found, for the site-specific checks of the
/// statement that asked for it.
#[derive(Debug, Clone, Copy)]
pub struct Access {
    pub kind: Kind,
    pub typ: Type,
    pub line: u32,
    /// Whether the access emitted an address onto the operand stack.
    /// Constants, procedures, and undefined placeholders emit nothing.
    pub pushed_address: bool,
}

/// Expression grammar: typing is bottom-up and emission is inline, left
/// operand first, so every operator opcode pops its right operand off
/// the top. A reported operand is forced to the operator's expected type
/// so enclosing expressions stay quiet.
pub trait ExpressionParsing {
    fn expression(&mut self, stop: SymbolSet) -> Type;
    fn object_access(&mut self, stop: SymbolSet) -> Access;
    fn procedure_call(&mut self, parallel: bool, stop: SymbolSet) -> Type;
}

impl<'s> ExpressionParsing for Parser<'s> {
    fn expression(&mut self, stop: SymbolSet) -> Type {
        let mut left = self.prim_expression(stop.union(LOGICAL_OPS));
        while LOGICAL_OPS.contains(self.kind()) {
            let operator = self.kind();
            let line = self.line();
            self.advance();
            let right = self.prim_expression(stop.union(LOGICAL_OPS));
            if !left.matches(Type::Boolean) {
                self.reporter.diadic_error(
                    line,
                    left,
                    right,
                    DiadicFault::LogicalLeftNotBoolean,
                    operator,
                );
            } else if !right.matches(Type::Boolean) {
                self.reporter.diadic_error(
                    line,
                    left,
                    right,
                    DiadicFault::LogicalRightNotBoolean,
                    operator,
                );
            }
            self.asm.emit(match operator {
                TokenKind::And => Opcode::And,
                _ => Opcode::Or,
            });
            left = Type::Boolean;
        }
        left
    }

    fn object_access(&mut self, stop: SymbolSet) -> Access {
        let line = self.line();
        let name = self.expect_name(stop.with(&[TokenKind::LeftBracket]));
        let handle = self.lookup(name, line);
        let meta = self.scope.record(handle).meta;
        match meta.kind {
            Kind::Constant | Kind::Procedure | Kind::Undefined => {
                if meta.kind == Kind::Procedure {
                    self.reporter
                        .kind_error(line, meta.kind, KindFault::ProcedureIsNotAValue);
                }
                self.discard_selector(stop, line, meta.kind);
                let typ = match meta.kind {
                    Kind::Constant => meta.typ,
                    _ => Type::Universal,
                };
                Access {
                    kind: meta.kind,
                    typ,
                    line,
                    pushed_address: false,
                }
            }
            Kind::Array => {
                self.note_scope_use(meta.level);
                let delta = (self.scope.block_level() - meta.level) as i64;
                self.asm.emit2(Opcode::Variable, delta, meta.displacement);
                if self.kind() == TokenKind::LeftBracket {
                    self.advance();
                    let index_line = self.line();
                    let index_type = self.expression(stop.with(&[TokenKind::RightBracket]));
                    if !index_type.matches(Type::Integer) {
                        self.reporter
                            .type_error(index_line, index_type, TypeFault::IndexNotInteger);
                    }
                    self.expect(TokenKind::RightBracket, stop);
                    self.asm.emit1(Opcode::Index, meta.upper_bound);
                } else {
                    self.reporter
                        .kind_error(line, meta.kind, KindFault::ArrayIndexMissing);
                }
                Access {
                    kind: Kind::Array,
                    typ: meta.typ,
                    line,
                    pushed_address: true,
                }
            }
            _ => {
                self.note_scope_use(meta.level);
                let delta = (self.scope.block_level() - meta.level) as i64;
                let opcode = if meta.kind == Kind::ReferenceParameter {
                    Opcode::ReferenceParameter
                } else {
                    Opcode::Variable
                };
                self.asm.emit2(opcode, delta, meta.displacement);
                self.discard_selector(stop, line, meta.kind);
                Access {
                    kind: meta.kind,
                    typ: meta.typ,
                    line,
                    pushed_address: true,
                }
            }
        }
    }

    fn procedure_call(&mut self, parallel: bool, stop: SymbolSet) -> Type {
        let line = self.line();
        let name = self.expect_name(stop.with(&[TokenKind::LeftParen]));
        let handle = self.lookup(name, line);
        let meta = self.scope.record(handle).meta;
        let signature = self.scope.record(handle).params.clone();
        let is_procedure = meta.kind == Kind::Procedure;
        if !is_procedure {
            self.reporter
                .kind_error(line, meta.kind, KindFault::NotAProcedure);
        } else {
            if parallel {
                self.parallel_audit(line, handle);
            }
            self.note_call(handle);
        }

        self.expect(
            TokenKind::LeftParen,
            stop.union(EXPRESSION_FIRST)
                .with(&[TokenKind::Reference, TokenKind::Comma, TokenKind::RightParen]),
        );
        let argument_stop = stop.with(&[TokenKind::Comma, TokenKind::RightParen]);
        let mut arguments: Vec<(bool, Type, u32)> = Vec::new();
        if self.kind() != TokenKind::RightParen && self.kind() != TokenKind::EndOfText {
            loop {
                let argument_line = self.line();
                if self.kind() == TokenKind::Reference {
                    self.advance();
                    let access = self.object_access(argument_stop);
                    if access.kind == Kind::Constant {
                        self.reporter.kind_error(
                            access.line,
                            access.kind,
                            KindFault::ArgumentKindMismatch,
                        );
                    }
                    arguments.push((true, access.typ, argument_line));
                } else {
                    let typ = self.expression(argument_stop);
                    arguments.push((false, typ, argument_line));
                }
                if self.kind() == TokenKind::Comma {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightParen, stop);

        if is_procedure {
            if arguments.len() != signature.len() {
                self.reporter
                    .kind_error(line, Kind::Procedure, KindFault::ArgumentCountMismatch);
            } else {
                for ((by_reference, typ, argument_line), param) in
                    arguments.iter().zip(signature.iter())
                {
                    if *by_reference != param.by_reference {
                        self.reporter.kind_error(
                            *argument_line,
                            Kind::Procedure,
                            KindFault::ArgumentKindMismatch,
                        );
                    } else if !typ.matches(param.typ) {
                        self.reporter.type_error(
                            *argument_line,
                            *typ,
                            TypeFault::ArgumentTypeMismatch,
                        );
                    }
                }
            }
            if parallel {
                self.asm.emit(Opcode::Parallel);
            }
            let delta = (self.scope.block_level() - meta.level) as i64;
            self.asm
                .emit2(Opcode::ProcedureInvocation, delta, meta.label as i64);
            meta.typ
        } else {
            Type::Universal
        }
    }
}

impl<'s> Parser<'s> {
    fn prim_expression(&mut self, stop: SymbolSet) -> Type {
        let left = self.simple_expression(stop.union(RELATIONAL_OPS));
        if !RELATIONAL_OPS.contains(self.kind()) {
            return left;
        }
        let operator = self.kind();
        let line = self.line();
        self.advance();
        let right = self.simple_expression(stop);
        match operator {
            TokenKind::Equal | TokenKind::NotEqual => {
                if left == Type::Void || right == Type::Void {
                    self.reporter
                        .diadic_error(line, left, right, DiadicFault::EqualityOnVoid, operator);
                } else if !left.matches(right) {
                    self.reporter.diadic_error(
                        line,
                        left,
                        right,
                        DiadicFault::EqualityMismatch,
                        operator,
                    );
                }
            }
            _ => {
                if !left.matches(Type::Integer) {
                    self.reporter.diadic_error(
                        line,
                        left,
                        right,
                        DiadicFault::RelationalLeftNotInteger,
                        operator,
                    );
                } else if !right.matches(Type::Integer) {
                    self.reporter.diadic_error(
                        line,
                        left,
                        right,
                        DiadicFault::RelationalRightNotInteger,
                        operator,
                    );
                }
            }
        }
        self.asm.emit(match operator {
            TokenKind::Less => Opcode::Less,
            TokenKind::LessOrEqual => Opcode::LessOrEqual,
            TokenKind::Equal => Opcode::Equal,
            TokenKind::NotEqual => Opcode::NotEqual,
            TokenKind::Greater => Opcode::Greater,
            _ => Opcode::GreaterOrEqual,
        });
        Type::Boolean
    }

    fn simple_expression(&mut self, stop: SymbolSet) -> Type {
        let negate_line = self.line();
        let negate = self.kind() == TokenKind::Minus;
        if negate {
            self.advance();
        }
        let mut left = self.term(stop.union(ADDITIVE_OPS));
        if negate {
            if !left.matches(Type::Integer) {
                self.reporter
                    .type_error(negate_line, left, TypeFault::MinusOperandNotInteger);
            }
            self.asm.emit(Opcode::Minus);
            left = Type::Integer;
        }
        while ADDITIVE_OPS.contains(self.kind()) {
            let operator = self.kind();
            let line = self.line();
            self.advance();
            let right = self.term(stop.union(ADDITIVE_OPS));
            if !left.matches(Type::Integer) {
                self.reporter.diadic_error(
                    line,
                    left,
                    right,
                    DiadicFault::AdditiveLeftNotInteger,
                    operator,
                );
            } else if !right.matches(Type::Integer) {
                self.reporter.diadic_error(
                    line,
                    left,
                    right,
                    DiadicFault::AdditiveRightNotInteger,
                    operator,
                );
            }
            self.asm.emit(match operator {
                TokenKind::Plus => Opcode::Add,
                _ => Opcode::Subtract,
            });
            left = Type::Integer;
        }
        left
    }

    fn term(&mut self, stop: SymbolSet) -> Type {
        let mut left = self.factor(stop.union(MULTIPLICATIVE_OPS));
        while MULTIPLICATIVE_OPS.contains(self.kind()) {
            let operator = self.kind();
            let line = self.line();
            self.advance();
            let right = self.factor(stop.union(MULTIPLICATIVE_OPS));
            if !left.matches(Type::Integer) {
                self.reporter.diadic_error(
                    line,
                    left,
                    right,
                    DiadicFault::MultiplicativeLeftNotInteger,
                    operator,
                );
            } else if !right.matches(Type::Integer) {
                self.reporter.diadic_error(
                    line,
                    left,
                    right,
                    DiadicFault::MultiplicativeRightNotInteger,
                    operator,
                );
            }
            self.asm.emit(match operator {
                TokenKind::Multiply => Opcode::Multiply,
                TokenKind::Divide => Opcode::Divide,
                TokenKind::Modulo => Opcode::Modulo,
                _ => Opcode::Power,
            });
            left = Type::Integer;
        }
        left
    }

    fn factor(&mut self, stop: SymbolSet) -> Type {
        match self.kind() {
            TokenKind::Numeral => {
                let value = self.numeral_value();
                self.advance();
                self.asm.emit1(Opcode::Constant, value);
                Type::Integer
            }
            TokenKind::IntegerOutOfBounds => {
                self.reporter.syntax_error(self.line());
                self.advance();
                self.asm.emit1(Opcode::Constant, 0);
                Type::Integer
            }
            TokenKind::True => {
                self.advance();
                self.asm.emit1(Opcode::Constant, 1);
                Type::Boolean
            }
            TokenKind::False => {
                self.advance();
                self.asm.emit1(Opcode::Constant, 0);
                Type::Boolean
            }
            TokenKind::Name => {
                if self.peek_kind(1) == TokenKind::LeftParen {
                    return self.procedure_call(false, stop);
                }
                let line = self.line();
                let name_is_constant = {
                    let name = match self.tokens[self.current].arg {
                        TokenArg::Name(id) => id,
                        _ => NameId::NONE,
                    };
                    self.scope
                        .find(name)
                        .map(|h| self.scope.record(h).meta.kind == Kind::Constant)
                        .unwrap_or(false)
                };
                if name_is_constant {
                    let name = self.expect_name(stop);
                    let handle = self.lookup(name, line);
                    let meta = self.scope.record(handle).meta;
                    self.asm.emit1(Opcode::Constant, meta.value);
                    meta.typ
                } else {
                    let access = self.object_access(stop);
                    if access.pushed_address {
                        self.asm.emit(Opcode::Value);
                    }
                    access.typ
                }
            }
            TokenKind::LeftParen => {
                self.advance();
                let typ = self.expression(stop.with(&[TokenKind::RightParen]));
                self.expect(TokenKind::RightParen, stop);
                typ
            }
            TokenKind::Not => {
                let line = self.line();
                self.advance();
                let typ = self.factor(stop);
                if !typ.matches(Type::Boolean) {
                    self.reporter
                        .type_error(line, typ, TypeFault::NotOperandNotBoolean);
                }
                self.asm.emit(Opcode::Not);
                Type::Boolean
            }
            _ => {
                self.reporter.syntax_error(self.line());
                self.skip_to(stop);
                Type::Universal
            }
        }
    }

    fn numeral_value(&self) -> i64 {
        match self.tokens[self.current].arg {
            TokenArg::Int(value) => value,
            _ => 0,
        }
    }

    /// A selector on something that is not an array: complain, then
    /// parse the index anyway so recovery stays in step.
    fn discard_selector(&mut self, stop: SymbolSet, line: u32, kind: Kind) {
        if self.kind() == TokenKind::LeftBracket {
            self.reporter.kind_error(line, kind, KindFault::NotAnArray);
            self.advance();
            self.expression(stop.with(&[TokenKind::RightBracket]));
            self.expect(TokenKind::RightBracket, stop);
        }
    }
}
