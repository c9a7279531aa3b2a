// Single-slot mailbox: a new value overwrites the pending one, nothing is queued

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox<T> {
    slot: Option<T>,
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self { slot: None }
    }
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value`, returning the unread value it replaced
    pub fn post(&mut self, value: T) -> Option<T> {
        self.slot.replace(value)
    }

    /// Drain the slot
    pub fn take(&mut self) -> Option<T> {
        self.slot.take()
    }
}
