use std::collections::VecDeque;

/// Token for a scheduled idle task. Cancelling a handle whose task already ran
/// is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdleHandle(u64);

/// Work deferred to the host's next idle opportunity, run in FIFO order.
#[derive(Debug)]
pub struct IdleQueue<T> {
    next_id: u64,
    pending: VecDeque<(IdleHandle, T)>,
}

impl<T> Default for IdleQueue<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            pending: VecDeque::new(),
        }
    }
}

impl<T> IdleQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, task: T) -> IdleHandle {
        self.next_id += 1;
        let handle = IdleHandle(self.next_id);
        self.pending.push_back((handle, task));
        handle
    }

    /// Returns whether the task was still pending.
    pub fn cancel(&mut self, handle: IdleHandle) -> bool {
        let before = self.pending.len();
        self.pending.retain(|(pending, _)| *pending != handle);
        self.pending.len() != before
    }

    pub fn cancel_all(&mut self) {
        self.pending.clear();
    }

    pub fn is_pending(&self, handle: IdleHandle) -> bool {
        self.pending.iter().any(|(pending, _)| *pending == handle)
    }

    pub fn pop(&mut self) -> Option<(IdleHandle, T)> {
        self.pending.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
