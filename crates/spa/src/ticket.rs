//! Completion tracking for asynchronous save/load/restore requests.
//!
//! Plugins hand slow work to a [`TicketBook`], which runs it on a worker
//! thread and records the outcome per ticket. The `*_check` calls then only
//! look the ticket up.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Sender};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};

use crate::plugin::Ticket;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Save,
    Load,
    Restore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketStatus {
    Pending,
    Done,
    Failed,
}

type Job = Box<dyn FnOnce() -> io::Result<()> + Send>;
type Key = (Operation, Ticket);

#[derive(Default)]
struct Ledger {
    statuses: Mutex<HashMap<Key, TicketStatus>>,
    changed: Condvar,
}

impl Ledger {
    fn record(&self, key: Key, status: TicketStatus) {
        self.statuses.lock().insert(key, status);
        self.changed.notify_all();
    }
}

pub struct TicketBook {
    jobs: Option<Sender<(Key, Job)>>,
    ledger: Arc<Ledger>,
    worker: Option<JoinHandle<()>>,
}

impl TicketBook {
    pub fn new() -> io::Result<Self> {
        let (jobs, queue) = unbounded::<(Key, Job)>();
        let ledger = Arc::new(Ledger::default());
        let worker_ledger = Arc::clone(&ledger);
        let worker = thread::Builder::new()
            .name("spa-tickets".into())
            .spawn(move || {
                for (key, job) in queue.iter() {
                    let status = match job() {
                        Ok(()) => TicketStatus::Done,
                        Err(err) => {
                            log::warn!("{:?} request {} failed: {err}", key.0, key.1);
                            TicketStatus::Failed
                        }
                    };
                    worker_ledger.record(key, status);
                }
            })?;

        Ok(Self {
            jobs: Some(jobs),
            ledger,
            worker: Some(worker),
        })
    }

    /// Queues `job` for `ticket`. Returns `false` when the request could not
    /// be queued.
    pub fn submit<F>(&self, operation: Operation, ticket: Ticket, job: F) -> bool
    where
        F: FnOnce() -> io::Result<()> + Send + 'static,
    {
        let Some(jobs) = &self.jobs else {
            return false;
        };
        let key = (operation, ticket);
        self.ledger.record(key, TicketStatus::Pending);
        if jobs.send((key, Box::new(job))).is_err() {
            self.ledger.record(key, TicketStatus::Failed);
            return false;
        }
        true
    }

    /// Records an outcome for work that completed synchronously.
    pub fn complete(&self, operation: Operation, ticket: Ticket, ok: bool) {
        let status = if ok {
            TicketStatus::Done
        } else {
            TicketStatus::Failed
        };
        self.ledger.record((operation, ticket), status);
    }

    /// `None` for tickets that were never submitted.
    pub fn status(&self, operation: Operation, ticket: Ticket) -> Option<TicketStatus> {
        self.ledger.statuses.lock().get(&(operation, ticket)).copied()
    }

    pub fn is_done(&self, operation: Operation, ticket: Ticket) -> bool {
        self.status(operation, ticket) == Some(TicketStatus::Done)
    }

    /// Forgets the ticket if it finished with `outcome`, returning whether it
    /// did. Plugins call this from their `*_check` methods so the ledger only
    /// holds requests nobody has observed yet.
    pub fn settle(&self, operation: Operation, ticket: Ticket, outcome: TicketStatus) -> bool {
        if outcome == TicketStatus::Pending {
            return false;
        }
        let mut statuses = self.ledger.statuses.lock();
        let key = (operation, ticket);
        if statuses.get(&key) == Some(&outcome) {
            statuses.remove(&key);
            true
        } else {
            false
        }
    }

    /// Number of tickets still recorded.
    pub fn len(&self) -> usize {
        self.ledger.statuses.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Blocks until the ticket leaves `Pending` or `timeout` elapses.
    pub fn wait(
        &self,
        operation: Operation,
        ticket: Ticket,
        timeout: Duration,
    ) -> Option<TicketStatus> {
        let deadline = Instant::now() + timeout;
        let key = (operation, ticket);
        let mut statuses = self.ledger.statuses.lock();
        loop {
            let status = statuses.get(&key).copied();
            if status != Some(TicketStatus::Pending) {
                return status;
            }
            if self
                .ledger
                .changed
                .wait_until(&mut statuses, deadline)
                .timed_out()
            {
                return statuses.get(&key).copied();
            }
        }
    }
}

impl Drop for TicketBook {
    fn drop(&mut self) {
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("ticket worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn jobs_complete_on_the_worker() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let book = TicketBook::new().unwrap();

        let target = path.clone();
        assert!(book.submit(Operation::Save, 1, move || fs::write(target, b"{}")));
        assert_eq!(
            book.wait(Operation::Save, 1, Duration::from_secs(5)),
            Some(TicketStatus::Done)
        );
        assert!(book.is_done(Operation::Save, 1));
        assert_eq!(fs::read(&path).unwrap(), b"{}");
    }

    #[test]
    fn failures_are_recorded_per_ticket() {
        let book = TicketBook::new().unwrap();
        book.submit(Operation::Load, 4, || {
            Err(io::Error::new(io::ErrorKind::NotFound, "missing"))
        });
        assert_eq!(
            book.wait(Operation::Load, 4, Duration::from_secs(5)),
            Some(TicketStatus::Failed)
        );
        assert_eq!(book.status(Operation::Save, 4), None);
    }

    #[test]
    fn settled_tickets_are_forgotten() {
        let book = TicketBook::new().unwrap();
        book.complete(Operation::Save, 1, true);
        book.complete(Operation::Load, 2, false);
        assert_eq!(book.len(), 2);

        assert!(!book.settle(Operation::Save, 1, TicketStatus::Failed));
        assert!(book.settle(Operation::Save, 1, TicketStatus::Done));
        assert!(!book.settle(Operation::Save, 1, TicketStatus::Done));
        assert!(book.settle(Operation::Load, 2, TicketStatus::Failed));
        assert!(book.is_empty());

        book.submit(Operation::Restore, 3, || Ok(()));
        assert!(!book.settle(Operation::Restore, 3, TicketStatus::Pending));
    }

    #[test]
    fn synchronous_completion() {
        let book = TicketBook::new().unwrap();
        book.complete(Operation::Restore, 9, true);
        assert!(book.is_done(Operation::Restore, 9));
    }
}
