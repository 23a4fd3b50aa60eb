use std::sync::Arc;
use std::thread;

use rand::Rng;

use super::{RuntimeError, Shared, STACK_SIZE};
use crate::assembler::Opcode;

/// One stack machine. The main node runs on the caller's thread; every
/// parallel statement clones the live stack prefix into a fresh
/// translator on a detached thread.
///
/// Frame layout at base B: B+0 static link, B+1 dynamic link, B+2 return
/// address, B+3 return-value slot, locals above, parameters below at
/// negative displacements.
pub(super) struct Translator {
    shared: Arc<Shared>,
    stack: Vec<i64>,
    pc: usize,
    base: usize,
    /// Index of the top-of-stack slot; 0 means empty (slot 0 is unused,
    /// so a zeroed cell can never be mistaken for a live address).
    sp: usize,
    /// Set on spawned nodes: the first invocation returns to the
    /// end-of-program marker so the top-level procedure terminates the
    /// node instead of falling back into the parent's code.
    main_procedure: bool,
}

impl Translator {
    pub(super) fn new(shared: Arc<Shared>, pc: usize, main_procedure: bool) -> Self {
        Translator {
            shared,
            stack: vec![0; STACK_SIZE],
            pc,
            base: 0,
            sp: 0,
            main_procedure,
        }
    }

    pub(super) fn run(&mut self) {
        loop {
            if self.shared.has_failed() {
                break;
            }
            match self.step() {
                Ok(true) => {}
                Ok(false) => break,
                Err(error) => {
                    self.shared.fail(error);
                    break;
                }
            }
        }
    }

    /// Dispatch one instruction. `Ok(false)` ends this node's loop.
    fn step(&mut self) -> Result<bool, RuntimeError> {
        let word = self.code(self.pc)?;
        let op = Opcode::try_from(word).map_err(|_| RuntimeError::IncorrectOpcode)?;
        match op {
            Opcode::Program => {
                let length = self.operand(1)?;
                self.open_frame(0, 0, self.shared.end_address() as i64, length)?;
                self.pc += 2;
            }
            Opcode::EndProgram => return Ok(false),
            Opcode::Block => {
                let length = self.operand(1)?;
                let base = self.base as i64;
                self.open_frame(base, base, 0, length)?;
                self.pc += 2;
            }
            Opcode::EndBlock => {
                let closing = self.base;
                if closing == 0 {
                    return Err(RuntimeError::IncorrectOpcode);
                }
                self.base = self.address(self.cell(closing as i64 + 1)?)?;
                self.sp = closing - 1;
                self.pc += 1;
            }
            Opcode::ProcedureBlock => {
                let length = self.operand(1)?;
                self.grow(length)?;
                self.pc += 2;
            }
            Opcode::EndProcedureBlock => {
                let params = self.operand(1)?;
                let closing = self.base;
                let result = self.cell(closing as i64 + 3)?;
                self.pc = self.address(self.cell(closing as i64 + 2)?)?;
                self.base = self.address(self.cell(closing as i64 + 1)?)?;
                let popped = 1 + params as usize;
                if closing < popped {
                    return Err(RuntimeError::IncorrectOpcode);
                }
                self.sp = closing - popped;
                self.push(result)?;
            }
            Opcode::ProcedureInvocation => {
                let delta = self.operand(1)?;
                let entry = self.operand(2)?;
                let static_link = self.follow(delta)?;
                let return_address = if self.main_procedure {
                    self.main_procedure = false;
                    self.shared.end_address()
                } else {
                    self.pc + 3
                };
                let frame_base = self.sp + 1;
                self.push(static_link as i64)?;
                self.push(self.base as i64)?;
                self.push(return_address as i64)?;
                self.base = frame_base;
                self.pc = self.address(entry)?;
            }
            Opcode::Variable => {
                let delta = self.operand(1)?;
                let displacement = self.operand(2)?;
                let frame = self.follow(delta)?;
                self.push(frame as i64 + displacement)?;
                self.pc += 3;
            }
            Opcode::ReferenceParameter => {
                let delta = self.operand(1)?;
                let displacement = self.operand(2)?;
                let frame = self.follow(delta)?;
                let indirect = self.cell(frame as i64 + displacement)?;
                self.push(indirect)?;
                self.pc += 3;
            }
            Opcode::Index => {
                let bound = self.operand(1)?;
                let index = self.pop()?;
                let array = self.pop()?;
                if index < 1 || index > bound {
                    return Err(RuntimeError::ArrayIndexOutOfBounds);
                }
                self.push(array + index - 1)?;
                self.pc += 2;
            }
            Opcode::Constant => {
                let value = self.operand(1)?;
                self.push(value)?;
                self.pc += 2;
            }
            Opcode::Value => {
                let location = self.pop()?;
                let value = self.cell(location)?;
                self.push(value)?;
                self.pc += 1;
            }
            Opcode::Not => {
                let value = self.pop()?;
                self.push((value == 0) as i64)?;
                self.pc += 1;
            }
            Opcode::And => self.binary(|a, b| Ok(((a != 0) && (b != 0)) as i64))?,
            Opcode::Or => self.binary(|a, b| Ok(((a != 0) || (b != 0)) as i64))?,
            Opcode::Multiply => self.binary(|a, b| {
                a.checked_mul(b).ok_or(RuntimeError::ArithmeticOverflow)
            })?,
            Opcode::Divide => self.binary(|a, b| {
                if b == 0 {
                    Err(RuntimeError::DivisionByZero)
                } else {
                    a.checked_div(b).ok_or(RuntimeError::ArithmeticOverflow)
                }
            })?,
            Opcode::Modulo => self.binary(|a, b| {
                if b == 0 {
                    Err(RuntimeError::DivisionByZero)
                } else {
                    a.checked_rem(b).ok_or(RuntimeError::ArithmeticOverflow)
                }
            })?,
            Opcode::Power => self.binary(|a, b| {
                let exponent =
                    u32::try_from(b).map_err(|_| RuntimeError::ArithmeticOverflow)?;
                a.checked_pow(exponent)
                    .ok_or(RuntimeError::ArithmeticOverflow)
            })?,
            Opcode::Less => self.binary(|a, b| Ok((a < b) as i64))?,
            Opcode::LessOrEqual => self.binary(|a, b| Ok((a <= b) as i64))?,
            Opcode::Equal => self.binary(|a, b| Ok((a == b) as i64))?,
            Opcode::NotEqual => self.binary(|a, b| Ok((a != b) as i64))?,
            Opcode::Greater => self.binary(|a, b| Ok((a > b) as i64))?,
            Opcode::GreaterOrEqual => self.binary(|a, b| Ok((a >= b) as i64))?,
            Opcode::Add => self.binary(|a, b| {
                a.checked_add(b).ok_or(RuntimeError::ArithmeticOverflow)
            })?,
            Opcode::Subtract => self.binary(|a, b| {
                a.checked_sub(b).ok_or(RuntimeError::ArithmeticOverflow)
            })?,
            Opcode::Minus => {
                let value = self.pop()?;
                let negated = value
                    .checked_neg()
                    .ok_or(RuntimeError::ArithmeticOverflow)?;
                self.push(negated)?;
                self.pc += 1;
            }
            Opcode::ReadBoolean => {
                let location = self.pop()?;
                let line = self.shared.read_line();
                let value = match line.trim() {
                    t if t.eq_ignore_ascii_case("true") => 1,
                    t if t.eq_ignore_ascii_case("false") => 0,
                    _ => return Err(RuntimeError::BooleanInputIncorrectFormat),
                };
                self.set_cell(location, value)?;
                self.pc += 1;
            }
            Opcode::ReadInteger => {
                let location = self.pop()?;
                let line = self.shared.read_line();
                let value = line
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| RuntimeError::IntegerInputIncorrectFormat)?;
                self.set_cell(location, value)?;
                self.pc += 1;
            }
            Opcode::WriteBoolean => {
                let value = self.pop()?;
                self.shared
                    .write_line(if value != 0 { "true" } else { "false" });
                self.pc += 1;
            }
            Opcode::WriteInteger => {
                let value = self.pop()?;
                self.shared.write_line(&value.to_string());
                self.pc += 1;
            }
            Opcode::Randomize => {
                let location = self.pop()?;
                let value = rand::thread_rng().gen_range(0..=i32::MAX as i64);
                self.set_cell(location, value)?;
                self.pc += 1;
            }
            Opcode::Open => {
                let location = self.pop()?;
                let key = self.shared.open_channel();
                self.set_cell(location, key)?;
                self.pc += 1;
            }
            Opcode::Send => {
                let key = self.pop()?;
                let value = self.pop()?;
                let channel = self
                    .shared
                    .channel(key)
                    .ok_or(RuntimeError::SendThroughUnopenedChannel)?;
                channel.send(value);
                self.pc += 1;
            }
            Opcode::Receive => {
                let key = self.pop()?;
                let location = self.pop()?;
                let channel = self
                    .shared
                    .channel(key)
                    .ok_or(RuntimeError::ReceiveThroughUnopenedChannel)?;
                let value = channel.receive();
                self.set_cell(location, value)?;
                self.pc += 1;
            }
            Opcode::Assign => {
                let total = self.address(self.operand(1)?)?;
                if self.sp < 2 * total {
                    return Err(RuntimeError::IncorrectOpcode);
                }
                for i in 0..total {
                    let location = self.stack[self.sp - 2 * total + 1 + i];
                    let value = self.stack[self.sp - total + 1 + i];
                    self.set_cell(location, value)?;
                }
                self.sp -= 2 * total;
                self.pc += 2;
            }
            Opcode::Do => {
                let target = self.operand(1)?;
                let condition = self.pop()?;
                if condition == 0 {
                    self.pc = self.address(target)?;
                } else {
                    self.pc += 2;
                }
            }
            Opcode::Goto => {
                let target = self.operand(1)?;
                self.pc = self.address(target)?;
            }
            Opcode::Parallel => {
                let mut child = self.clone_for_spawn();
                thread::spawn(move || child.run());
                // Skip past this opcode and the invocation the child
                // executes in our stead.
                self.pc += 4;
            }
        }
        Ok(true)
    }

    /// Copy of the live stack prefix, program counter on the following
    /// invocation, marked so its top-level return terminates it.
    fn clone_for_spawn(&self) -> Translator {
        let mut stack = vec![0; STACK_SIZE];
        stack[..=self.sp].copy_from_slice(&self.stack[..=self.sp]);
        Translator {
            shared: Arc::clone(&self.shared),
            stack,
            pc: self.pc + 1,
            base: self.base,
            sp: self.sp,
            main_procedure: true,
        }
    }

    fn code(&self, index: usize) -> Result<i64, RuntimeError> {
        self.shared
            .code_at(index)
            .ok_or(RuntimeError::IncorrectOpcode)
    }

    fn operand(&self, offset: usize) -> Result<i64, RuntimeError> {
        self.code(self.pc + offset)
    }

    /// A code or cell address taken from the buffer or the stack; a
    /// value that cannot be one means the artifact is corrupt.
    fn address(&self, value: i64) -> Result<usize, RuntimeError> {
        usize::try_from(value).map_err(|_| RuntimeError::IncorrectOpcode)
    }

    fn cell(&self, location: i64) -> Result<i64, RuntimeError> {
        let index = self.address(location)?;
        self.stack
            .get(index)
            .copied()
            .ok_or(RuntimeError::IncorrectOpcode)
    }

    fn set_cell(&mut self, location: i64, value: i64) -> Result<(), RuntimeError> {
        let index = self.address(location)?;
        match self.stack.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(RuntimeError::IncorrectOpcode),
        }
    }

    fn push(&mut self, value: i64) -> Result<(), RuntimeError> {
        if self.sp + 1 >= STACK_SIZE {
            return Err(RuntimeError::StackOverflow);
        }
        self.sp += 1;
        self.stack[self.sp] = value;
        Ok(())
    }

    fn pop(&mut self) -> Result<i64, RuntimeError> {
        if self.sp == 0 {
            return Err(RuntimeError::IncorrectOpcode);
        }
        let value = self.stack[self.sp];
        self.sp -= 1;
        Ok(value)
    }

    fn grow(&mut self, slots: i64) -> Result<(), RuntimeError> {
        let slots = self.address(slots)?;
        if self.sp + slots >= STACK_SIZE {
            return Err(RuntimeError::StackOverflow);
        }
        self.sp += slots;
        Ok(())
    }

    /// Build a frame: static link, dynamic link, return address, then
    /// room for the block's objects.
    fn open_frame(
        &mut self,
        static_link: i64,
        dynamic_link: i64,
        return_address: i64,
        length: i64,
    ) -> Result<(), RuntimeError> {
        let frame_base = self.sp + 1;
        self.push(static_link)?;
        self.push(dynamic_link)?;
        self.push(return_address)?;
        self.base = frame_base;
        self.grow(length)
    }

    /// Hop `delta` static links outward from the current frame.
    fn follow(&self, delta: i64) -> Result<usize, RuntimeError> {
        let mut frame = self.base;
        let mut hops = delta;
        while hops > 0 {
            frame = self.address(self.cell(frame as i64)?)?;
            hops -= 1;
        }
        Ok(frame)
    }

    fn binary(
        &mut self,
        apply: impl Fn(i64, i64) -> Result<i64, RuntimeError>,
    ) -> Result<(), RuntimeError> {
        let right = self.pop()?;
        let left = self.pop()?;
        let value = apply(left, right)?;
        self.push(value)?;
        self.pc += 1;
        Ok(())
    }
}
