//! The runtime: one stack machine per node over a shared code buffer,
//! with rendezvous channels and a process-wide failure flag.

mod channel;
mod translator;

pub use channel::Channel;

use std::fmt;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::assembler::MAX_PROGRAM_WORDS;
use translator::Translator;

/// Fixed size of every node's stack, in integer slots.
pub const STACK_SIZE: usize = 10_000;

/// Errors that abort a node. The offending node writes the message to
/// the output sink and raises the process-wide flag; siblings observe it
/// between dispatches and stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeError {
    IncorrectOpcode,
    ArrayIndexOutOfBounds,
    BooleanInputIncorrectFormat,
    IntegerInputIncorrectFormat,
    SendThroughUnopenedChannel,
    ReceiveThroughUnopenedChannel,
    StackOverflow,
    ArithmeticOverflow,
    DivisionByZero,
}

impl RuntimeError {
    pub fn message(self) -> &'static str {
        match self {
            RuntimeError::IncorrectOpcode => "Incorrect opcode.",
            RuntimeError::ArrayIndexOutOfBounds => "Array index is out of bounds.",
            RuntimeError::BooleanInputIncorrectFormat => {
                "Boolean input was not in the correct format."
            }
            RuntimeError::IntegerInputIncorrectFormat => {
                "Integer input was not in the correct format."
            }
            RuntimeError::SendThroughUnopenedChannel => "Send through unopened channel.",
            RuntimeError::ReceiveThroughUnopenedChannel => {
                "Receive through unopened channel."
            }
            RuntimeError::StackOverflow => "Stack overflow.",
            RuntimeError::ArithmeticOverflow => "Arithmetic overflow.",
            RuntimeError::DivisionByZero => "Division by zero.",
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for RuntimeError {}

/// Errors loading an executable artifact.
#[derive(Debug)]
pub enum LoadError {
    TooBig,
    Malformed { line: usize },
    Io(io::Error),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::TooBig => write!(f, "Program too big."),
            LoadError::Malformed { line } => {
                write!(f, "Program file is not in the correct format (line {line}).")
            }
            LoadError::Io(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<io::Error> for LoadError {
    fn from(e: io::Error) -> Self {
        LoadError::Io(e)
    }
}

/// Parse an artifact's text: one decimal integer per line.
pub fn parse_executable(text: &str) -> Result<Vec<i64>, LoadError> {
    let mut code = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let word = line
            .trim()
            .parse::<i64>()
            .map_err(|_| LoadError::Malformed { line: index + 1 })?;
        code.push(word);
    }
    if code.len() > MAX_PROGRAM_WORDS {
        return Err(LoadError::TooBig);
    }
    Ok(code)
}

pub fn load_executable(path: &Path) -> Result<Vec<i64>, LoadError> {
    parse_executable(&fs::read_to_string(path)?)
}

pub(crate) struct RuntimeIo {
    input: Box<dyn BufRead + Send>,
    output: Box<dyn Write + Send>,
}

/// State shared by every node of one run: the read-only code buffer, the
/// channel registry, the failure flag, and the serialized I/O streams.
pub(crate) struct Shared {
    code: Vec<i64>,
    /// Address of the final EndProgram; a spawned node's top-level
    /// return goes here so it terminates instead of rejoining its
    /// parent's code.
    end_address: usize,
    /// Registry of channels. Slot 0 is a reserved sentinel so that an
    /// uninitialized cell (zero) never names a real channel.
    channels: Mutex<Vec<Arc<Channel>>>,
    failed: AtomicBool,
    error: Mutex<Option<RuntimeError>>,
    io: Mutex<RuntimeIo>,
}

fn relock<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(|e| e.into_inner())
}

impl Shared {
    pub(crate) fn code_at(&self, index: usize) -> Option<i64> {
        self.code.get(index).copied()
    }

    pub(crate) fn end_address(&self) -> usize {
        self.end_address
    }

    pub(crate) fn has_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    /// Abort the calling node: one message line to the output sink, the
    /// first error kept for the run's result, flag raised for siblings.
    pub(crate) fn fail(&self, error: RuntimeError) {
        self.write_line(error.message());
        let mut slot = relock(&self.error);
        if slot.is_none() {
            *slot = Some(error);
        }
        self.failed.store(true, Ordering::SeqCst);
    }

    /// Append a channel and return its 1-based key.
    pub(crate) fn open_channel(&self) -> i64 {
        let mut channels = relock(&self.channels);
        channels.push(Arc::new(Channel::new()));
        (channels.len() - 1) as i64
    }

    /// Validate a key under the registry lock and hand out the channel.
    pub(crate) fn channel(&self, key: i64) -> Option<Arc<Channel>> {
        let channels = relock(&self.channels);
        if key >= 1 && (key as usize) < channels.len() {
            Some(Arc::clone(&channels[key as usize]))
        } else {
            None
        }
    }

    pub(crate) fn read_line(&self) -> String {
        let mut io = relock(&self.io);
        let mut line = String::new();
        let _ = io.input.read_line(&mut line);
        line
    }

    pub(crate) fn write_line(&self, text: &str) {
        let mut io = relock(&self.io);
        let _ = writeln!(io.output, "{text}");
        let _ = io.output.flush();
    }
}

/// Run a loaded program to completion. The calling thread becomes the
/// main node; parallel statements spawn detached sibling threads that
/// die with the process, so a child blocked forever on a channel cannot
/// hang the exit.
pub fn run_program(
    code: Vec<i64>,
    input: impl BufRead + Send + 'static,
    output: impl Write + Send + 'static,
) -> Result<(), RuntimeError> {
    if code.is_empty() {
        return Ok(());
    }
    let end_address = code.len() - 1;
    let shared = Arc::new(Shared {
        code,
        end_address,
        channels: Mutex::new(vec![Arc::new(Channel::new())]),
        failed: AtomicBool::new(false),
        error: Mutex::new(None),
        io: Mutex::new(RuntimeIo {
            input: Box::new(input),
            output: Box::new(output),
        }),
    });
    let mut main = Translator::new(Arc::clone(&shared), 0, false);
    main.run();
    let error = *relock(&shared.error);
    match error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::Opcode;
    use std::io::Cursor;

    /// Test writer that keeps its bytes reachable after the run.
    #[derive(Clone, Default)]
    struct SharedOutput(Arc<Mutex<Vec<u8>>>);

    impl SharedOutput {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedOutput {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn parse_executable_round_trips() {
        let code = parse_executable("1\n0\n-5\n2\n").unwrap();
        assert_eq!(code, vec![1, 0, -5, 2]);
    }

    #[test]
    fn parse_executable_rejects_garbage() {
        assert!(matches!(
            parse_executable("1\nx\n"),
            Err(LoadError::Malformed { line: 2 })
        ));
    }

    #[test]
    fn parse_executable_rejects_oversized_programs() {
        let text = "0\n".repeat(MAX_PROGRAM_WORDS + 1);
        assert!(matches!(parse_executable(&text), Err(LoadError::TooBig)));
    }

    #[test]
    fn minimal_program_writes_a_constant() {
        let code = vec![
            Opcode::Program as i64,
            0,
            Opcode::Constant as i64,
            7,
            Opcode::WriteInteger as i64,
            Opcode::EndProgram as i64,
        ];
        let output = SharedOutput::default();
        run_program(code, Cursor::new(""), output.clone()).unwrap();
        assert_eq!(output.text(), "7\n");
    }

    #[test]
    fn incorrect_opcode_aborts_with_message() {
        let code = vec![Opcode::Program as i64, 0, 999, Opcode::EndProgram as i64];
        let output = SharedOutput::default();
        let result = run_program(code, Cursor::new(""), output.clone());
        assert_eq!(result, Err(RuntimeError::IncorrectOpcode));
        assert_eq!(output.text(), "Incorrect opcode.\n");
    }

    #[test]
    fn boolean_input_must_be_true_or_false() {
        // read one boolean at displacement 3 of the program frame.
        let code = vec![
            Opcode::Program as i64,
            1,
            Opcode::Variable as i64,
            0,
            3,
            Opcode::ReadBoolean as i64,
            Opcode::EndProgram as i64,
        ];
        let output = SharedOutput::default();
        let result = run_program(code, Cursor::new("0\n"), output.clone());
        assert_eq!(result, Err(RuntimeError::BooleanInputIncorrectFormat));
        assert_eq!(output.text(), "Boolean input was not in the correct format.\n");
    }

    #[test]
    fn empty_code_is_a_no_op() {
        assert!(run_program(Vec::new(), Cursor::new(""), Vec::new()).is_ok());
    }
}
