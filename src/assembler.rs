use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use num_enum::TryFromPrimitive;

/// Upper bound on the code buffer. The compiler refuses to emit past it
/// and the loader rejects artifacts over it with "Program too big."
pub const MAX_PROGRAM_WORDS: usize = 16_384;

/// Instructions of the intermediate code. Each opcode is stored as one
/// integer in the code buffer with its operands in the adjacent slots.
#[repr(i64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
pub enum Opcode {
    /// Operand: objectsLength. Opens the outermost activation record.
    Program = 1,
    EndProgram,
    /// Operand: objectsLength. Opens a nested block's activation record.
    Block,
    EndBlock,
    /// Operand: objectsLength. Allocates a procedure frame's locals; the
    /// frame itself is built by ProcedureInvocation.
    ProcedureBlock,
    /// Operand: paramsLength. Returns, popping frame and arguments and
    /// leaving the return slot's content on the operand stack.
    EndProcedureBlock,
    /// Operands: levelDelta, entryAddr.
    ProcedureInvocation,
    /// Operands: levelDelta, displacement. Pushes an address.
    Variable,
    /// Operands: levelDelta, displacement. Pushes the address stored in
    /// the parameter slot.
    ReferenceParameter,
    /// Operand: upperBound. Pops index and base address, validates
    /// 1 <= i <= bound, pushes the element address.
    Index,
    /// Operand: value.
    Constant,
    /// Replaces a top-of-stack address with its content.
    Value,
    Not,
    And,
    Or,
    Multiply,
    Divide,
    Modulo,
    Power,
    Less,
    LessOrEqual,
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    Add,
    Subtract,
    Minus,
    ReadBoolean,
    ReadInteger,
    WriteBoolean,
    WriteInteger,
    Randomize,
    Open,
    Send,
    Receive,
    /// Operand: total number of target/value pairs.
    Assign,
    /// Operand: address. Pops a boolean and jumps there on false.
    Do,
    /// Operand: address.
    Goto,
    /// Spawns a sibling node that runs the following invocation.
    Parallel,
}

impl Opcode {
    pub fn operand_count(self) -> usize {
        match self {
            Opcode::ProcedureInvocation | Opcode::Variable | Opcode::ReferenceParameter => 2,
            Opcode::Program
            | Opcode::Block
            | Opcode::ProcedureBlock
            | Opcode::EndProcedureBlock
            | Opcode::Index
            | Opcode::Constant
            | Opcode::Assign
            | Opcode::Do
            | Opcode::Goto => 1,
            _ => 0,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The code generator's output side: an append-only buffer of integers
/// with support for resolving forward references in place.
pub struct Assembler {
    buffer: Vec<i64>,
}

impl Assembler {
    pub fn new() -> Self {
        Assembler { buffer: Vec::new() }
    }

    /// Index of the next free slot.
    pub fn current_address(&self) -> usize {
        self.buffer.len()
    }

    pub fn emit(&mut self, op: Opcode) {
        self.buffer.push(op as i64);
    }

    /// Emit an opcode with one operand; returns the operand's slot so a
    /// placeholder can be resolved later.
    pub fn emit1(&mut self, op: Opcode, operand: i64) -> usize {
        self.buffer.push(op as i64);
        let slot = self.buffer.len();
        self.buffer.push(operand);
        slot
    }

    pub fn emit2(&mut self, op: Opcode, first: i64, second: i64) {
        self.buffer.push(op as i64);
        self.buffer.push(first);
        self.buffer.push(second);
    }

    /// Write the current address into a previously emitted placeholder.
    pub fn resolve_address(&mut self, slot: usize) {
        self.buffer[slot] = self.buffer.len() as i64;
    }

    pub fn resolve_argument(&mut self, slot: usize, value: i64) {
        self.buffer[slot] = value;
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn into_code(self) -> Vec<i64> {
        self.buffer
    }

    /// Write the executable artifact: one decimal integer per line.
    pub fn write_executable(&self, path: &Path) -> io::Result<()> {
        fs::write(path, render_executable(&self.buffer))
    }
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

pub fn render_executable(code: &[i64]) -> String {
    let mut text = String::new();
    for word in code {
        text.push_str(&word.to_string());
        text.push('\n');
    }
    text
}

/// Human-readable listing of a code buffer, one instruction per line.
/// Unknown opcodes are listed raw so a corrupt buffer still disassembles.
pub fn disassemble(code: &[i64]) -> String {
    let mut text = String::new();
    let mut pc = 0;
    while pc < code.len() {
        match Opcode::try_from(code[pc]) {
            Ok(op) => {
                text.push_str(&format!("{pc:5}: {op}"));
                for i in 1..=op.operand_count() {
                    match code.get(pc + i) {
                        Some(operand) => text.push_str(&format!(" {operand}")),
                        None => text.push_str(" <truncated>"),
                    }
                }
                text.push('\n');
                pc += 1 + op.operand_count();
            }
            Err(_) => {
                text.push_str(&format!("{pc:5}: <{}>\n", code[pc]));
                pc += 1;
            }
        }
    }
    text
}
