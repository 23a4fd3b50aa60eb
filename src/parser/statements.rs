use super::{ExpressionParsing, Parser, EXPRESSION_FIRST, STATEMENT_FIRST};
use crate::assembler::Opcode;
use crate::report::{KindFault, TypeFault};
use crate::scope::{Handle, Kind, Type};
use crate::symbols::SymbolSet;
use crate::token::TokenKind;

/// Statement grammar. If and while carry their own nested blocks and no
/// terminating semicolon; every other statement is followed by one.
pub trait StatementParsing {
    fn statement_part(&mut self, stop: SymbolSet);
}

impl<'s> StatementParsing for Parser<'s> {
    fn statement_part(&mut self, stop: SymbolSet) {
        loop {
            self.check(STATEMENT_FIRST.union(stop));
            match self.kind() {
                TokenKind::If => self.if_statement(stop.union(STATEMENT_FIRST)),
                TokenKind::While => self.while_statement(stop.union(STATEMENT_FIRST)),
                kind if STATEMENT_FIRST.contains(kind) => {
                    self.statement(
                        stop.union(STATEMENT_FIRST).with(&[TokenKind::SemiColon]),
                    );
                    self.expect(TokenKind::SemiColon, stop.union(STATEMENT_FIRST));
                }
                _ => break,
            }
        }
    }
}

impl<'s> Parser<'s> {
    fn statement(&mut self, stop: SymbolSet) {
        match self.kind() {
            TokenKind::Read => self.read_statement(stop),
            TokenKind::Write => self.write_statement(stop),
            TokenKind::Randomize => self.randomize_statement(stop),
            TokenKind::Open => self.open_statement(stop),
            TokenKind::Send => self.send_statement(stop),
            TokenKind::Receive => self.receive_statement(stop),
            TokenKind::Parallel => self.parallel_statement(stop),
            TokenKind::Name => {
                if self.peek_kind(1) == TokenKind::LeftParen {
                    self.procedure_call(false, stop);
                } else {
                    self.assignment(stop);
                }
            }
            _ => self.statement_dispatch_failure(),
        }
    }

    fn if_statement(&mut self, stop: SymbolSet) {
        self.expect(
            TokenKind::If,
            stop.union(EXPRESSION_FIRST)
                .with(&[TokenKind::LeftParen, TokenKind::Begin]),
        );
        self.expect(
            TokenKind::LeftParen,
            stop.union(EXPRESSION_FIRST).with(&[TokenKind::Begin]),
        );
        let line = self.line();
        let condition = self.expression(stop.with(&[TokenKind::RightParen, TokenKind::Begin]));
        if !condition.matches(Type::Boolean) {
            self.reporter
                .type_error(line, condition, TypeFault::ConditionNotBoolean);
        }
        self.expect(TokenKind::RightParen, stop.with(&[TokenKind::Begin]));
        let do_slot = self.asm.emit1(Opcode::Do, 0);
        self.nested_block(stop.with(&[TokenKind::Else]));
        if self.kind() == TokenKind::Else {
            self.advance();
            let goto_slot = self.asm.emit1(Opcode::Goto, 0);
            self.asm.resolve_address(do_slot);
            self.nested_block(stop);
            self.asm.resolve_address(goto_slot);
        } else {
            self.asm.resolve_address(do_slot);
        }
    }

    fn while_statement(&mut self, stop: SymbolSet) {
        self.expect(
            TokenKind::While,
            stop.union(EXPRESSION_FIRST)
                .with(&[TokenKind::LeftParen, TokenKind::Begin]),
        );
        self.expect(
            TokenKind::LeftParen,
            stop.union(EXPRESSION_FIRST).with(&[TokenKind::Begin]),
        );
        let start = self.asm.current_address();
        let line = self.line();
        let condition = self.expression(stop.with(&[TokenKind::RightParen, TokenKind::Begin]));
        if !condition.matches(Type::Boolean) {
            self.reporter
                .type_error(line, condition, TypeFault::ConditionNotBoolean);
        }
        self.expect(TokenKind::RightParen, stop.with(&[TokenKind::Begin]));
        let do_slot = self.asm.emit1(Opcode::Do, 0);
        self.nested_block(stop);
        self.asm.emit1(Opcode::Goto, start as i64);
        self.asm.resolve_address(do_slot);
    }

    /// Targets first (addresses), then values, then one store of the
    /// whole vector, so `x, y = y, x` swaps.
    fn assignment(&mut self, stop: SymbolSet) {
        let line = self.line();
        let target_stop = stop
            .union(EXPRESSION_FIRST)
            .with(&[TokenKind::Comma, TokenKind::Becomes]);
        let mut targets = Vec::new();
        loop {
            let access = self.object_access(target_stop);
            if access.kind == Kind::Constant {
                self.reporter
                    .kind_error(access.line, access.kind, KindFault::AssignToConstant);
            }
            targets.push(access);
            if self.kind() == TokenKind::Comma {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(TokenKind::Becomes, stop.union(EXPRESSION_FIRST));
        let mut values = Vec::new();
        loop {
            let value_line = self.line();
            let typ = self.expression(stop.with(&[TokenKind::Comma]));
            values.push((typ, value_line));
            if self.kind() == TokenKind::Comma {
                self.advance();
            } else {
                break;
            }
        }
        if targets.len() != values.len() {
            self.reporter
                .kind_error(line, Kind::Variable, KindFault::AssignmentCountMismatch);
        } else {
            for (target, (typ, value_line)) in targets.iter().zip(values.iter()) {
                if !target.typ.matches(*typ) {
                    self.reporter
                        .type_error(*value_line, *typ, TypeFault::AssignmentMismatch);
                }
            }
        }
        self.asm.emit1(Opcode::Assign, targets.len() as i64);
    }

    fn read_statement(&mut self, stop: SymbolSet) {
        self.expect(TokenKind::Read, stop.with(&[TokenKind::Name, TokenKind::Comma]));
        self.note_io();
        loop {
            let access = self.object_access(stop.with(&[TokenKind::Comma]));
            if access.kind == Kind::Constant {
                self.reporter
                    .kind_error(access.line, access.kind, KindFault::ReadIntoConstant);
            }
            match access.typ {
                Type::Boolean => self.asm.emit(Opcode::ReadBoolean),
                Type::Integer => self.asm.emit(Opcode::ReadInteger),
                Type::Universal => {}
                other => {
                    self.reporter
                        .type_error(access.line, other, TypeFault::ReadTargetNotReadable);
                }
            }
            if self.kind() == TokenKind::Comma {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn write_statement(&mut self, stop: SymbolSet) {
        self.expect(TokenKind::Write, stop.union(EXPRESSION_FIRST).with(&[TokenKind::Comma]));
        self.note_io();
        loop {
            let line = self.line();
            let typ = self.expression(stop.with(&[TokenKind::Comma]));
            match typ {
                Type::Boolean => self.asm.emit(Opcode::WriteBoolean),
                Type::Integer => self.asm.emit(Opcode::WriteInteger),
                Type::Universal => {}
                other => {
                    self.reporter
                        .type_error(line, other, TypeFault::WriteValueNotWritable);
                }
            }
            if self.kind() == TokenKind::Comma {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn randomize_statement(&mut self, stop: SymbolSet) {
        self.expect(
            TokenKind::Randomize,
            stop.with(&[TokenKind::Name, TokenKind::Comma]),
        );
        self.note_io();
        loop {
            let access = self.object_access(stop.with(&[TokenKind::Comma]));
            if access.kind == Kind::Constant {
                self.reporter
                    .kind_error(access.line, access.kind, KindFault::RandomizeConstant);
            }
            if !access.typ.matches(Type::Integer) {
                self.reporter.type_error(
                    access.line,
                    access.typ,
                    TypeFault::RandomizeTargetNotInteger,
                );
            } else {
                self.asm.emit(Opcode::Randomize);
            }
            if self.kind() == TokenKind::Comma {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn open_statement(&mut self, stop: SymbolSet) {
        self.expect(TokenKind::Open, stop.with(&[TokenKind::Name, TokenKind::Comma]));
        loop {
            let access = self.object_access(stop.with(&[TokenKind::Comma]));
            if !access.typ.matches(Type::Channel) {
                self.reporter
                    .type_error(access.line, access.typ, TypeFault::OpenTargetNotChannel);
            } else {
                self.asm.emit(Opcode::Open);
            }
            if self.kind() == TokenKind::Comma {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn send_statement(&mut self, stop: SymbolSet) {
        self.expect(TokenKind::Send, stop.union(EXPRESSION_FIRST).with(&[TokenKind::Through]));
        let value_line = self.line();
        let value = self.expression(stop.union(EXPRESSION_FIRST).with(&[TokenKind::Through]));
        if !value.matches(Type::Integer) {
            self.reporter
                .type_error(value_line, value, TypeFault::SendValueNotInteger);
        }
        self.expect(TokenKind::Through, stop.union(EXPRESSION_FIRST));
        let channel_line = self.line();
        let channel = self.expression(stop);
        if !channel.matches(Type::Channel) {
            self.reporter
                .type_error(channel_line, channel, TypeFault::SendChannelNotChannel);
        }
        self.asm.emit(Opcode::Send);
    }

    fn receive_statement(&mut self, stop: SymbolSet) {
        self.expect(
            TokenKind::Receive,
            stop.with(&[TokenKind::Name, TokenKind::Through]),
        );
        let access = self.object_access(stop.union(EXPRESSION_FIRST).with(&[TokenKind::Through]));
        if access.kind == Kind::Constant {
            self.reporter
                .kind_error(access.line, access.kind, KindFault::ReceiveIntoConstant);
        }
        if !access.typ.matches(Type::Integer) {
            self.reporter
                .type_error(access.line, access.typ, TypeFault::ReceiveTargetNotInteger);
        }
        self.expect(TokenKind::Through, stop.union(EXPRESSION_FIRST));
        let channel_line = self.line();
        let channel = self.expression(stop);
        if !channel.matches(Type::Channel) {
            self.reporter
                .type_error(channel_line, channel, TypeFault::ReceiveChannelNotChannel);
        }
        self.asm.emit(Opcode::Receive);
    }

    fn parallel_statement(&mut self, stop: SymbolSet) {
        self.expect(TokenKind::Parallel, stop.with(&[TokenKind::Name]));
        self.procedure_call(true, stop);
    }

    /// The friendliness audit of `parallel P(...)`. Every violated
    /// requirement is listed, in a fixed order, against the procedure's
    /// record and the flags gathered while its body parsed.
    pub(super) fn parallel_audit(&mut self, line: u32, procedure: Handle) {
        let record = self.scope.record(procedure);
        let meta = record.meta;
        let has_reference = record.params.iter().any(|p| p.by_reference);
        let has_channel = record.params.iter().any(|p| p.typ == Type::Channel);
        let traits = record.traits;

        if meta.typ != Type::Void {
            self.reporter
                .kind_error(line, Kind::Procedure, KindFault::ParallelReturnsValue);
        }
        if has_reference {
            self.reporter
                .kind_error(line, Kind::Procedure, KindFault::ParallelReferenceParameter);
        }
        if !has_channel {
            self.reporter
                .kind_error(line, Kind::Procedure, KindFault::ParallelWithoutChannel);
        }
        if traits.uses_io {
            self.reporter
                .kind_error(line, Kind::Procedure, KindFault::ParallelUsesIo);
        }
        if traits.touches_outer(meta.level) {
            self.reporter
                .kind_error(line, Kind::Procedure, KindFault::ParallelTouchesOuterScope);
        }
        if traits.calls_unfriendly {
            self.reporter
                .kind_error(line, Kind::Procedure, KindFault::ParallelCallsUnfriendly);
        }
    }
}
