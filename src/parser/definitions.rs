use super::{Parser, DEFINITION_FIRST};
use crate::assembler::Opcode;
use crate::names::NameId;
use crate::report::{KindFault, ScopeFault, TypeFault};
use crate::scope::{Kind, Metadata, Param, Type};
use crate::symbols::SymbolSet;
use crate::token::{TokenArg, TokenKind};

const CONSTANT_FIRST: SymbolSet = SymbolSet::of(&[
    TokenKind::Numeral,
    TokenKind::IntegerOutOfBounds,
    TokenKind::True,
    TokenKind::False,
    TokenKind::Name,
]);

const TYPE_SYMBOLS: SymbolSet = SymbolSet::of(&[
    TokenKind::Integer,
    TokenKind::Boolean,
    TokenKind::Channel,
]);

struct DeclaredParam {
    name: NameId,
    typ: Type,
    by_reference: bool,
    line: u32,
}

/// Definition grammar: constants fold at compile time, variables and
/// arrays claim activation-record slots, and procedures emit their body
/// inline behind a Goto so sequential execution falls past them.
pub trait DefinitionParsing {
    fn definition_part(&mut self, stop: SymbolSet);
}

impl<'s> DefinitionParsing for Parser<'s> {
    fn definition_part(&mut self, stop: SymbolSet) {
        loop {
            self.check(DEFINITION_FIRST.union(stop));
            match self.kind() {
                TokenKind::Constant => {
                    self.constant_definition(
                        stop.union(DEFINITION_FIRST).with(&[TokenKind::SemiColon]),
                    );
                    self.expect(TokenKind::SemiColon, stop.union(DEFINITION_FIRST));
                }
                TokenKind::Integer | TokenKind::Boolean | TokenKind::Channel => {
                    self.variable_definition(
                        stop.union(DEFINITION_FIRST).with(&[TokenKind::SemiColon]),
                    );
                    self.expect(TokenKind::SemiColon, stop.union(DEFINITION_FIRST));
                }
                TokenKind::Procedure => {
                    self.procedure_definition(stop.union(DEFINITION_FIRST));
                }
                _ => break,
            }
        }
    }
}

impl<'s> Parser<'s> {
    /// `"constant" Name "=" ["-"] Constant`. The name is defined only
    /// after the right-hand side is evaluated, so it cannot name itself.
    fn constant_definition(&mut self, stop: SymbolSet) {
        self.expect(
            TokenKind::Constant,
            stop.union(CONSTANT_FIRST)
                .with(&[TokenKind::Name, TokenKind::Becomes]),
        );
        let line = self.line();
        let name = self.expect_name(stop.union(CONSTANT_FIRST).with(&[TokenKind::Becomes]));
        self.expect(TokenKind::Becomes, stop.union(CONSTANT_FIRST).with(&[TokenKind::Minus]));
        let negate = self.kind() == TokenKind::Minus;
        if negate {
            self.advance();
        }
        let negate_line = self.line();
        let (mut typ, mut value) = self.constant(stop);
        if negate {
            if typ.matches(Type::Integer) {
                value = -value;
            } else {
                self.reporter
                    .type_error(negate_line, typ, TypeFault::NegatedConstantNotInteger);
            }
            typ = Type::Integer;
        }
        if self.scope.define(name, Metadata::constant(typ, value)).is_none() {
            self.reporter.scope_error(line, ScopeFault::AmbiguousName);
        }
    }

    /// `TypeSymbol (ArrayDeclaration | VariableList)`.
    fn variable_definition(&mut self, stop: SymbolSet) {
        let typ = self.type_symbol(stop.with(&[
            TokenKind::LeftBracket,
            TokenKind::Name,
            TokenKind::Comma,
        ]));
        if self.kind() == TokenKind::LeftBracket {
            self.advance();
            let bound_line = self.line();
            let (bound_type, bound) = self.constant(stop.with(&[
                TokenKind::RightBracket,
                TokenKind::Name,
                TokenKind::Comma,
            ]));
            let bound = if !bound_type.matches(Type::Integer) {
                self.reporter
                    .type_error(bound_line, bound_type, TypeFault::ArrayBoundNotInteger);
                1
            } else if bound_type == Type::Integer && bound < 1 {
                self.reporter
                    .kind_error(bound_line, Kind::Constant, KindFault::ArrayBoundNotPositive);
                1
            } else if bound_type.is_universal() {
                1
            } else {
                bound
            };
            self.expect(
                TokenKind::RightBracket,
                stop.with(&[TokenKind::Name, TokenKind::Comma]),
            );
            self.variable_list(stop, |typ| Metadata::array(typ, bound), typ);
        } else {
            self.variable_list(stop, Metadata::variable, typ);
        }
    }

    fn variable_list(
        &mut self,
        stop: SymbolSet,
        make: impl Fn(Type) -> Metadata,
        typ: Type,
    ) {
        loop {
            let line = self.line();
            let name = self.expect_name(stop.with(&[TokenKind::Comma]));
            if self.scope.define(name, make(typ)).is_none() {
                self.reporter.scope_error(line, ScopeFault::AmbiguousName);
            }
            if self.kind() == TokenKind::Comma {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// `"@" ["[" TypeSymbol Name "]"] Name "(" [Parameters] ")" Block`.
    ///
    /// The entry label is recorded on the procedure's record before the
    /// body parses, so the body may invoke it recursively. The label is
    /// the address of the ProcedureBlock instruction, two slots past the
    /// Goto that carries sequential execution over the body.
    fn procedure_definition(&mut self, stop: SymbolSet) {
        self.expect(
            TokenKind::Procedure,
            stop.with(&[TokenKind::LeftBracket, TokenKind::Name, TokenKind::LeftParen]),
        );
        let mut returns: Option<(Type, NameId)> = None;
        if self.kind() == TokenKind::LeftBracket {
            self.advance();
            let typ = self.type_symbol(stop.with(&[
                TokenKind::Name,
                TokenKind::RightBracket,
                TokenKind::LeftParen,
            ]));
            let name = self.expect_name(stop.with(&[TokenKind::RightBracket, TokenKind::LeftParen]));
            self.expect(
                TokenKind::RightBracket,
                stop.with(&[TokenKind::Name, TokenKind::LeftParen]),
            );
            returns = Some((typ, name));
        }
        let line = self.line();
        let name = self.expect_name(stop.with(&[TokenKind::LeftParen, TokenKind::Begin]));
        let return_type = returns.map(|(t, _)| t).unwrap_or(Type::Void);
        let label = self.asm.current_address() + 2;
        let handle = match self.scope.define(name, Metadata::procedure(return_type, label)) {
            Some(handle) => handle,
            None => {
                self.reporter.scope_error(line, ScopeFault::AmbiguousName);
                // Parse the duplicate's body against a scratch record.
                self.scope
                    .define(NameId::NONE, Metadata::procedure(return_type, label))
                    .expect("anonymous records cannot collide")
            }
        };
        let goto_slot = self.asm.emit1(Opcode::Goto, 0);
        let length_slot = self.asm.emit1(Opcode::ProcedureBlock, 0);

        self.scope.new_block();
        match returns {
            Some((typ, return_name)) => {
                if self.scope.define(return_name, Metadata::return_slot(typ)).is_none() {
                    self.reporter.scope_error(line, ScopeFault::AmbiguousName);
                }
            }
            None => {
                let _ = self
                    .scope
                    .define(NameId::NONE, Metadata::return_slot(Type::Void));
            }
        }

        self.expect(
            TokenKind::LeftParen,
            stop.union(TYPE_SYMBOLS)
                .with(&[TokenKind::Reference, TokenKind::RightParen, TokenKind::Begin]),
        );
        let params = if self.kind() == TokenKind::RightParen {
            Vec::new()
        } else {
            self.parameter_definition(stop.with(&[TokenKind::RightParen, TokenKind::Begin]))
        };
        self.expect(TokenKind::RightParen, stop.with(&[TokenKind::Begin]));

        // Defined back to front so the first parameter lands deepest
        // below the frame base, matching left-to-right argument pushes.
        for param in params.iter().rev() {
            if self
                .scope
                .define(param.name, Metadata::parameter(param.typ, param.by_reference))
                .is_none()
            {
                self.reporter.scope_error(param.line, ScopeFault::AmbiguousName);
            }
        }
        self.scope.record_mut(handle).params = params
            .iter()
            .map(|param| Param {
                typ: param.typ,
                by_reference: param.by_reference,
            })
            .collect();

        self.active_procedures.push(handle);
        self.block_body(length_slot, stop);
        let params_length = self.scope.params_length();
        self.scope.end_block();
        self.active_procedures.pop();

        self.asm.emit1(Opcode::EndProcedureBlock, params_length);
        self.asm.resolve_address(goto_slot);
    }

    fn parameter_definition(&mut self, stop: SymbolSet) -> Vec<DeclaredParam> {
        let mut params = Vec::new();
        loop {
            let by_reference = self.kind() == TokenKind::Reference;
            if by_reference {
                self.advance();
            }
            let typ = self.type_symbol(stop.with(&[TokenKind::Name, TokenKind::Comma]));
            let line = self.line();
            let name = self.expect_name(stop.with(&[TokenKind::Comma]));
            params.push(DeclaredParam {
                name,
                typ,
                by_reference,
                line,
            });
            if self.kind() == TokenKind::Comma {
                self.advance();
            } else {
                break;
            }
        }
        params
    }

    fn type_symbol(&mut self, stop: SymbolSet) -> Type {
        let typ = match self.kind() {
            TokenKind::Integer => Type::Integer,
            TokenKind::Boolean => Type::Boolean,
            TokenKind::Channel => Type::Channel,
            _ => {
                self.reporter.syntax_error(self.line());
                self.skip_to(stop);
                return Type::Universal;
            }
        };
        self.advance();
        typ
    }

    /// `Numeral | "true" | "false" | Name`, folded to a value at compile
    /// time. Names must name constants.
    fn constant(&mut self, stop: SymbolSet) -> (Type, i64) {
        match self.kind() {
            TokenKind::Numeral => {
                let value = match self.tokens[self.current].arg {
                    TokenArg::Int(value) => value,
                    _ => 0,
                };
                self.advance();
                (Type::Integer, value)
            }
            TokenKind::IntegerOutOfBounds => {
                self.reporter.syntax_error(self.line());
                self.advance();
                (Type::Integer, 0)
            }
            TokenKind::True => {
                self.advance();
                (Type::Boolean, 1)
            }
            TokenKind::False => {
                self.advance();
                (Type::Boolean, 0)
            }
            TokenKind::Name => {
                let line = self.line();
                let name = self.expect_name(stop);
                let handle = self.lookup(name, line);
                let meta = self.scope.record(handle).meta;
                match meta.kind {
                    Kind::Constant => (meta.typ, meta.value),
                    other => {
                        self.reporter
                            .kind_error(line, other, KindFault::ConstantExpected);
                        (Type::Universal, 0)
                    }
                }
            }
            _ => {
                self.reporter.syntax_error(self.line());
                self.skip_to(stop);
                (Type::Universal, 0)
            }
        }
    }
}
