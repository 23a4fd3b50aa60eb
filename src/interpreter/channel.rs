use std::sync::{Condvar, Mutex, MutexGuard};

/// Rendezvous protocol: Idle until a sender deposits, Sent until the
/// receiver takes, Received until the sender observes the hand-off and
/// resets to Idle. Both sides block until their transition is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Sent,
    Received,
}

struct Slot {
    state: State,
    payload: i64,
}

/// Synchronous channel for a single integer. One sender and one receiver
/// synchronize per rendezvous; repeated use is allowed, and with several
/// waiters the broadcast on every transition keeps selection
/// starvation-free under a fair host scheduler.
pub struct Channel {
    slot: Mutex<Slot>,
    signal: Condvar,
}

impl Channel {
    pub fn new() -> Self {
        Channel {
            slot: Mutex::new(Slot {
                state: State::Idle,
                payload: 0,
            }),
            signal: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        // A sibling node that panicked cannot corrupt a two-field slot;
        // keep rendezvousing rather than poisoning the whole run.
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Deposit a value and block until a receiver has taken it.
    pub fn send(&self, value: i64) {
        let mut slot = self.lock();
        while slot.state != State::Idle {
            slot = self.signal.wait(slot).unwrap_or_else(|e| e.into_inner());
        }
        slot.state = State::Sent;
        slot.payload = value;
        self.signal.notify_all();
        while slot.state != State::Received {
            slot = self.signal.wait(slot).unwrap_or_else(|e| e.into_inner());
        }
        slot.state = State::Idle;
        self.signal.notify_all();
    }

    /// Block until a value is deposited, then take it.
    pub fn receive(&self) -> i64 {
        let mut slot = self.lock();
        while slot.state != State::Sent {
            slot = self.signal.wait(slot).unwrap_or_else(|e| e.into_inner());
        }
        let value = slot.payload;
        slot.state = State::Received;
        self.signal.notify_all();
        value
    }
}

impl Default for Channel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn send_hands_value_to_receive() {
        let channel = Arc::new(Channel::new());
        let sender = {
            let channel = Arc::clone(&channel);
            thread::spawn(move || channel.send(42))
        };
        assert_eq!(channel.receive(), 42);
        sender.join().unwrap();
    }

    #[test]
    fn repeated_rendezvous_in_order() {
        let channel = Arc::new(Channel::new());
        let sender = {
            let channel = Arc::clone(&channel);
            thread::spawn(move || {
                for value in 1..=5 {
                    channel.send(value);
                }
            })
        };
        let received: Vec<i64> = (0..5).map(|_| channel.receive()).collect();
        assert_eq!(received, vec![1, 2, 3, 4, 5]);
        sender.join().unwrap();
    }

    #[test]
    fn send_blocks_until_received() {
        let channel = Arc::new(Channel::new());
        let sender = {
            let channel = Arc::clone(&channel);
            thread::spawn(move || {
                channel.send(7);
                // Only reachable after the receiver took the value.
                true
            })
        };
        thread::sleep(std::time::Duration::from_millis(20));
        assert!(!sender.is_finished());
        assert_eq!(channel.receive(), 7);
        assert!(sender.join().unwrap());
    }

    #[test]
    fn pipeline_of_two_channels() {
        let first = Arc::new(Channel::new());
        let second = Arc::new(Channel::new());
        let relay = {
            let first = Arc::clone(&first);
            let second = Arc::clone(&second);
            thread::spawn(move || {
                let value = first.receive();
                second.send(value * 2);
            })
        };
        let feeder = {
            let first = Arc::clone(&first);
            thread::spawn(move || first.send(21))
        };
        assert_eq!(second.receive(), 42);
        relay.join().unwrap();
        feeder.join().unwrap();
    }
}
