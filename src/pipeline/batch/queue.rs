//! Task queue: pre-filled, multi-consumer, drained with try-pop.

use crossbeam_channel::{Receiver, TryRecvError};

use crate::models::Task;

/// Shared pool of pending tasks.
///
/// All tasks are enqueued at construction and the sending side is closed,
/// so `try_pop` is a single atomic dequeue: a task is handed to exactly one
/// caller and `None` means the pool is drained for good.
#[derive(Clone)]
pub struct TaskQueue {
    rx: Receiver<Task>,
}

impl TaskQueue {
    pub fn new(tasks: impl IntoIterator<Item = Task>) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        for task in tasks {
            // The receiver is alive in this scope, so send cannot fail.
            let _ = tx.send(task);
        }
        Self { rx }
    }

    /// Take one task, or `None` once the queue is empty.
    pub fn try_pop(&self) -> Option<Task> {
        match self.rx.try_recv() {
            Ok(task) => Some(task),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Tasks not yet claimed.
    pub fn remaining(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
