mod definitions;
mod expressions;
mod statements;


pub use definitions::DefinitionParsing;
pub use expressions::{Access, ExpressionParsing};
pub use statements::StatementParsing;

use crate::assembler::{Assembler, Opcode, MAX_PROGRAM_WORDS};
use crate::names::NameId;
use crate::report::{InternalFault, Reporter, ScopeFault};
use crate::scope::{Handle, ScopeTable};
use crate::symbols::SymbolSet;
use crate::token::{Token, TokenArg, TokenKind};

pub(super) const DEFINITION_FIRST: SymbolSet = SymbolSet::of(&[
    TokenKind::Constant,
    TokenKind::Integer,
    TokenKind::Boolean,
    TokenKind::Channel,
    TokenKind::Procedure,
]);

pub(super) const STATEMENT_FIRST: SymbolSet = SymbolSet::of(&[
    TokenKind::Name,
    TokenKind::If,
    TokenKind::While,
    TokenKind::Read,
    TokenKind::Write,
    TokenKind::Randomize,
    TokenKind::Open,
    TokenKind::Send,
    TokenKind::Receive,
    TokenKind::Parallel,
]);

pub(super) const EXPRESSION_FIRST: SymbolSet = SymbolSet::of(&[
    TokenKind::Numeral,
    TokenKind::IntegerOutOfBounds,
    TokenKind::True,
    TokenKind::False,
    TokenKind::Name,
    TokenKind::LeftParen,
    TokenKind::Not,
    TokenKind::Minus,
]);

/// The single pass of the compiler: recursive descent with one token of
/// lookahead, driving scope analysis, kind and type checking, and code
/// emission as it goes. Forward references are resolved by back-patching
/// the assembler's buffer, so there is no second pass.
///
/// Recovery is panic mode with stop sets. Every nonterminal receives the
/// union of the symbols its callers can resume on; skipping never
/// consumes a symbol an enclosing construct is waiting for.
pub struct Parser<'s> {
    pub(super) tokens: Vec<Token>,
    pub(super) current: usize,
    pub(super) scope: ScopeTable,
    pub(super) reporter: Reporter<'s>,
    pub(super) asm: Assembler,
    /// Procedures whose bodies are currently being parsed, innermost
    /// last. Carries the I/O, outer-scope, and call flags that the
    /// parallel statement's audit consumes.
    pub(super) active_procedures: Vec<Handle>,
}

impl<'s> Parser<'s> {
    pub fn new(tokens: Vec<Token>, reporter: Reporter<'s>) -> Self {
        Parser {
            tokens,
            current: 0,
            scope: ScopeTable::new(),
            reporter,
            asm: Assembler::new(),
            active_procedures: Vec::new(),
        }
    }

    /// Parse the whole program. Returns the code buffer only when no
    /// error of any category was reported.
    pub fn run(mut self) -> Option<Vec<i64>> {
        const STOP: SymbolSet = SymbolSet::of(&[TokenKind::EndOfText]);
        self.program(STOP);
        if self.asm.len() > MAX_PROGRAM_WORDS {
            self.reporter
                .internal_error(self.line(), InternalFault::CodeBufferTooLarge);
        }
        if self.reporter.is_error_free() {
            Some(self.asm.into_code())
        } else {
            None
        }
    }

    fn program(&mut self, stop: SymbolSet) {
        let length_slot = self.asm.emit1(Opcode::Program, 0);
        self.scope.new_block();
        self.block_body(length_slot, stop);
        self.scope.end_block();
        self.asm.emit(Opcode::EndProgram);
        self.expect(TokenKind::EndOfText, stop);
    }

    /// `"{" DefinitionPart StatementPart "}"` into an already-open scope
    /// level, resolving the enclosing frame instruction's length operand
    /// once the definitions are known.
    pub(super) fn block_body(&mut self, length_slot: usize, stop: SymbolSet) {
        self.expect(
            TokenKind::Begin,
            stop.union(DEFINITION_FIRST)
                .union(STATEMENT_FIRST)
                .with(&[TokenKind::End]),
        );
        self.definition_part(stop.union(STATEMENT_FIRST).with(&[TokenKind::End]));
        let objects_length = self.scope.objects_length();
        self.asm.resolve_argument(length_slot, objects_length);
        self.statement_part(stop.with(&[TokenKind::End]));
        self.expect(TokenKind::End, stop);
    }

    /// A block in statement position: if and while bodies. Gets its own
    /// scope level and activation record.
    pub(super) fn nested_block(&mut self, stop: SymbolSet) {
        let length_slot = self.asm.emit1(Opcode::Block, 0);
        self.scope.new_block();
        self.block_body(length_slot, stop);
        self.scope.end_block();
        self.asm.emit(Opcode::EndBlock);
    }

    pub(super) fn kind(&self) -> TokenKind {
        self.tokens[self.current].kind
    }

    pub(super) fn line(&self) -> u32 {
        self.tokens[self.current].line
    }

    pub(super) fn peek_kind(&self, ahead: usize) -> TokenKind {
        self.tokens
            .get(self.current + ahead)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::EndOfText)
    }

    pub(super) fn advance(&mut self) {
        if self.kind() != TokenKind::EndOfText {
            self.current += 1;
        }
    }

    /// Consume the expected symbol or report and resynchronize.
    pub(super) fn expect(&mut self, expected: TokenKind, stop: SymbolSet) {
        if self.kind() == expected {
            self.advance();
        } else {
            self.reporter.syntax_error(self.line());
            self.skip_to(stop);
        }
    }

    /// Consume a name and return its key; the anonymous key on failure.
    pub(super) fn expect_name(&mut self, stop: SymbolSet) -> NameId {
        if self.kind() == TokenKind::Name {
            let id = match self.tokens[self.current].arg {
                TokenArg::Name(id) => id,
                _ => NameId::NONE,
            };
            self.advance();
            id
        } else {
            self.reporter.syntax_error(self.line());
            self.skip_to(stop);
            NameId::NONE
        }
    }

    /// Report a syntax error if the current symbol cannot start what the
    /// caller wants, then resynchronize.
    pub(super) fn check(&mut self, expected: SymbolSet) {
        if !expected.contains(self.kind()) {
            self.reporter.syntax_error(self.line());
            self.skip_to(expected);
        }
    }

    /// Panic-mode recovery: skip to a stop symbol and flag the line the
    /// skip lands on so it does not report again.
    pub(super) fn skip_to(&mut self, stop: SymbolSet) {
        if !stop.contains(self.kind()) && self.kind() != TokenKind::EndOfText {
            while !stop.contains(self.kind()) && self.kind() != TokenKind::EndOfText {
                self.advance();
            }
            let line = self.line();
            self.reporter.mark_line(line);
        }
    }

    /// Find a name or report it undefined once and synthesize a
    /// placeholder so every later check on it stays silent.
    pub(super) fn lookup(&mut self, name: NameId, line: u32) -> Handle {
        if name == NameId::NONE {
            // A failed expect_name already reported; stay quiet.
            return self.scope.define_undefined(NameId::NONE);
        }
        match self.scope.find(name) {
            Some(handle) => handle,
            None => {
                self.reporter.scope_error(line, ScopeFault::UndefinedName);
                self.scope.define_undefined(name)
            }
        }
    }

    /// read, write, and randomize taint the enclosing procedure for the
    /// parallel audit. Channel traffic does not count as I/O.
    pub(super) fn note_io(&mut self) {
        if let Some(&current) = self.active_procedures.last() {
            self.scope.record_mut(current).traits.uses_io = true;
        }
    }

    /// An object access at or outside the enclosing procedure's defining
    /// level widens its outer-scope water mark.
    pub(super) fn note_scope_use(&mut self, object_level: i32) {
        if let Some(&current) = self.active_procedures.last() {
            let defining_level = self.scope.record(current).meta.level;
            if object_level <= defining_level {
                let traits = &mut self.scope.record_mut(current).traits;
                traits.outermost_level_used = Some(match traits.outermost_level_used {
                    Some(seen) => seen.min(object_level),
                    None => object_level,
                });
            }
        }
    }

    /// A call from inside a procedure body inherits the callee's
    /// unfriendliness. A procedure calling itself sees its own still
    /// clean flags, so parallel recursion stays legal.
    pub(super) fn note_call(&mut self, callee: Handle) {
        if let Some(&current) = self.active_procedures.last() {
            let record = self.scope.record(callee);
            let unfriendly = record.traits.uses_io
                || record.traits.touches_outer(record.meta.level)
                || record.traits.calls_unfriendly;
            if unfriendly {
                self.scope.record_mut(current).traits.calls_unfriendly = true;
            }
        }
    }

    pub(super) fn statement_dispatch_failure(&mut self) {
        let line = self.line();
        self.reporter
            .internal_error(line, InternalFault::InvalidDispatchTarget);
        self.advance();
    }
}
