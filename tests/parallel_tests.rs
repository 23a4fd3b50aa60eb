//! End-to-end tests for channels and parallel nodes: rendezvous
//! ordering, the recursive pipeline scenario, and channel runtime
//! errors.

mod common;

use common::run;
use rill::RuntimeError;

#[test]
fn parallel_worker_sends_a_result_back() {
    let outcome = run(
        "{\n\
         @ Echo(channel c) { send 42 -> c; }\n\
         channel c;\n\
         integer v;\n\
         open c;\n\
         parallel Echo(c);\n\
         receive v -> c;\n\
         write v;\n\
         }",
        "",
    );
    assert_eq!(outcome.result, Ok(()));
    assert_eq!(outcome.output, "42\n");
}

#[test]
fn rendezvous_preserves_order_over_one_channel() {
    let outcome = run(
        "{\n\
         @ Counter(channel c, integer upto)\n\
         {\n\
         integer i;\n\
         i = 1;\n\
         while (i <= upto) { send i -> c; i = i + 1; }\n\
         }\n\
         channel c;\n\
         integer v, i;\n\
         open c;\n\
         parallel Counter(c, 4);\n\
         i = 1;\n\
         while (i <= 4) { receive v -> c; write v; i = i + 1; }\n\
         }",
        "",
    );
    assert_eq!(outcome.result, Ok(()));
    assert_eq!(outcome.output, "1\n2\n3\n4\n");
}

#[test]
fn digit_square_sum_pipeline() {
    // A recursive pipeline: each node splits off its last digit, spawns
    // itself on the quotient, and forwards the running sum downstream.
    let outcome = run(
        "{\n\
         @ Node(integer number, channel bottom)\n\
         {\n\
         integer digit, rest, sum;\n\
         channel top;\n\
         digit = number % 10;\n\
         rest = number / 10;\n\
         if (rest > 0) {\n\
         open top;\n\
         parallel Node(rest, top);\n\
         receive sum -> top;\n\
         } else {\n\
         sum = 0;\n\
         }\n\
         send sum + digit * digit -> bottom;\n\
         }\n\
         integer total;\n\
         channel bottom;\n\
         open bottom;\n\
         parallel Node(13597, bottom);\n\
         receive total -> bottom;\n\
         write total;\n\
         }",
        "",
    );
    assert_eq!(outcome.result, Ok(()));
    assert_eq!(outcome.output, "165\n");
}

#[test]
fn two_workers_on_separate_channels() {
    let outcome = run(
        "{\n\
         @ Square(channel c, integer n) { send n * n -> c; }\n\
         channel a, b;\n\
         integer x, y;\n\
         open a, b;\n\
         parallel Square(a, 5);\n\
         parallel Square(b, 6);\n\
         receive x -> a;\n\
         receive y -> b;\n\
         write x + y;\n\
         }",
        "",
    );
    assert_eq!(outcome.result, Ok(()));
    assert_eq!(outcome.output, "61\n");
}

#[test]
fn channel_can_carry_repeated_rendezvous_both_ways() {
    // Request/response over two channels: the worker doubles whatever
    // arrives until told to stop.
    let outcome = run(
        "{\n\
         @ Doubler(channel req, channel rsp)\n\
         {\n\
         integer v;\n\
         receive v -> req;\n\
         while (v != 0) {\n\
         send v * 2 -> rsp;\n\
         receive v -> req;\n\
         }\n\
         }\n\
         channel req, rsp;\n\
         integer r;\n\
         open req, rsp;\n\
         parallel Doubler(req, rsp);\n\
         send 3 -> req;\n\
         receive r -> rsp;\n\
         write r;\n\
         send 7 -> req;\n\
         receive r -> rsp;\n\
         write r;\n\
         send 0 -> req;\n\
         }",
        "",
    );
    assert_eq!(outcome.result, Ok(()));
    assert_eq!(outcome.output, "6\n14\n");
}

#[test]
fn send_through_unopened_channel_aborts() {
    let outcome = run("{ channel c; send 1 -> c; }", "");
    assert_eq!(outcome.result, Err(RuntimeError::SendThroughUnopenedChannel));
    assert_eq!(outcome.output, "Send through unopened channel.\n");
}

#[test]
fn receive_through_unopened_channel_aborts() {
    let outcome = run("{ channel c; integer v; receive v -> c; }", "");
    assert_eq!(
        outcome.result,
        Err(RuntimeError::ReceiveThroughUnopenedChannel)
    );
    assert_eq!(outcome.output, "Receive through unopened channel.\n");
}

#[test]
fn channel_values_copy_like_integers() {
    // Passing a channel through a value parameter aliases the same
    // rendezvous slot.
    let outcome = run(
        "{\n\
         @ Relay(channel from, channel to)\n\
         {\n\
         integer v;\n\
         receive v -> from;\n\
         send v + 1 -> to;\n\
         }\n\
         channel a, b;\n\
         integer r;\n\
         open a, b;\n\
         parallel Relay(a, b);\n\
         send 9 -> a;\n\
         receive r -> b;\n\
         write r;\n\
         }",
        "",
    );
    assert_eq!(outcome.result, Ok(()));
    assert_eq!(outcome.output, "10\n");
}

#[test]
fn error_in_main_node_reports_once() {
    // The main node hits an array error while a worker is still
    // blocked; the run ends with exactly one message.
    let outcome = run(
        "{\n\
         @ Waiter(channel c) { send 1 -> c; }\n\
         channel c;\n\
         integer[2] xs;\n\
         open c;\n\
         parallel Waiter(c);\n\
         xs[3] = 1;\n\
         }",
        "",
    );
    assert_eq!(outcome.result, Err(RuntimeError::ArrayIndexOutOfBounds));
    assert_eq!(outcome.output, "Array index is out of bounds.\n");
}
