//! Shared harness: compile source, run programs against in-memory
//! streams, and collect diagnostics and output for assertions.
#![allow(dead_code)]

use std::io::{self, Cursor, Write};
use std::sync::{Arc, Mutex};

use rill::report::RecordingSink;
use rill::{compile_source, run_program, RuntimeError};

/// Writer whose bytes stay reachable after the runtime consumed it.
#[derive(Clone, Default)]
pub struct SharedOutput(Arc<Mutex<Vec<u8>>>);

impl SharedOutput {
    pub fn text(&self) -> String {
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

pub fn compile(source: &str) -> (Option<Vec<i64>>, RecordingSink) {
    let mut sink = RecordingSink::new();
    let code = compile_source(source, &mut sink).ok();
    (code, sink)
}

pub fn compile_ok(source: &str) -> Vec<i64> {
    let (code, sink) = compile(source);
    match code {
        Some(code) => code,
        None => panic!("expected clean compile, got {:?}", sink.reports),
    }
}

pub fn error_codes(source: &str) -> Vec<u16> {
    let (code, sink) = compile(source);
    assert!(code.is_none(), "expected errors, compiled cleanly");
    sink.codes()
}

pub struct RunOutcome {
    pub output: String,
    pub result: Result<(), RuntimeError>,
}

/// Compile and run against the given input, capturing all output.
pub fn run(source: &str, input: &str) -> RunOutcome {
    let code = compile_ok(source);
    let output = SharedOutput::default();
    let result = run_program(code, Cursor::new(input.to_string()), output.clone());
    RunOutcome {
        output: output.text(),
        result,
    }
}
