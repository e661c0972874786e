//! Session Facade — `consume` scoped acquisition. Binds a popped message to
//! a success/failure outcome: ACK on clean return, NACK on error or panic,
//! on every exit path.

use crate::config::ConsumeOptions;
use crate::error::BrokerError;
use crate::queue::{Message, Queue};

impl Queue {
    /// Pop a message from `opts.queue_name` and run `f` against it. `Ok`
    /// from `f` deletes the message; `Err` reports it through
    /// `process_failed` with the error's `Display` text as the reason and
    /// then propagates the error; a panic inside `f` still resolves the
    /// lease (with a fixed reason) before the panic continues to unwind.
    /// `None` if `pop` yielded nothing — `f` is never called.
    pub fn consume<F, T>(&self, opts: &ConsumeOptions, f: F) -> Result<Option<T>, BrokerError>
    where
        F: FnOnce(&Message) -> Result<T, BrokerError>,
    {
        let msg = match self.pop(&opts.queue_name, &opts.to_pop_options())? {
            Some(msg) => msg,
            None => return Ok(None),
        };

        let mut lease = Lease::new(self, &msg);
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| f(&msg))) {
            Ok(Ok(value)) => {
                lease.settle(Outcome::Ack);
                Ok(Some(value))
            }
            Ok(Err(err)) => {
                lease.settle(Outcome::Nack(err.to_string()));
                Err(err)
            }
            Err(panic) => {
                lease.settle(Outcome::Nack("processing panicked".to_string()));
                drop(lease);
                std::panic::resume_unwind(panic);
            }
        }
    }
}

enum Outcome {
    Ack,
    Nack(String),
}

/// Guarantees exactly one of `delete`/`process_failed` fires for the
/// message it wraps, on every exit path — including ones the caller never
/// explicitly settled (a bug upstream still resolves to a NACK, never a
/// silently lost lease).
struct Lease<'a> {
    queue: &'a Queue,
    msg: &'a Message,
    outcome: Option<Outcome>,
}

impl<'a> Lease<'a> {
    fn new(queue: &'a Queue, msg: &'a Message) -> Self {
        Self {
            queue,
            msg,
            outcome: None,
        }
    }

    fn settle(&mut self, outcome: Outcome) {
        self.outcome = Some(outcome);
    }
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        let outcome = self
            .outcome
            .take()
            .unwrap_or_else(|| Outcome::Nack("dropped without settling".to_string()));
        match outcome {
            Outcome::Ack => {
                let _ = self.queue.delete(&self.msg.id);
            }
            Outcome::Nack(reason) => {
                let _ = self.queue.process_failed(self.msg, &reason);
            }
        }
    }
}
