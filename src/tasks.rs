//! Deferred next-iteration callbacks
//!
//! Work that must not run re-entrantly (from inside a request handler or a
//! constructor) is pushed here and executed on the next event loop pass.

use std::collections::VecDeque;
use std::fmt;

type Task<T> = Box<dyn FnOnce(&mut T)>;

pub struct TaskQueue<T> {
    tasks: VecDeque<Task<T>>,
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self {
            tasks: VecDeque::new(),
        }
    }
}

impl<T> fmt::Debug for TaskQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("pending", &self.tasks.len())
            .finish()
    }
}

impl<T> TaskQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn defer<F>(&mut self, task: F)
    where
        F: FnOnce(&mut T) + 'static,
    {
        self.tasks.push_back(Box::new(task));
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Takes the tasks queued so far, leaving the queue empty for tasks
    /// enqueued while these run.
    pub fn take_batch(&mut self) -> VecDeque<Task<T>> {
        std::mem::take(&mut self.tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_runs_in_enqueue_order() {
        let mut queue: TaskQueue<Vec<u32>> = TaskQueue::new();
        queue.defer(|log| log.push(1));
        queue.defer(|log| log.push(2));
        queue.defer(|log| log.push(3));

        let mut log = Vec::new();
        for task in queue.take_batch() {
            task(&mut log);
        }
        assert_eq!(log, vec![1, 2, 3]);
        assert!(queue.is_empty());
    }
}
