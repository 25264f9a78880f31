//! Notification sink: the pluggable callback set for session operations.
//!
//! Handlers run synchronously on the calling thread, interleaved with
//! transport I/O. Returning `false` from any handler aborts the running
//! operation with `UserAborted`. The sink is borrowed by the session for
//! the duration of one operation only; the caller owns it and may swap
//! handlers between operations.

use crate::oid::ObjectId;

/// Counters describing the last fetch, overwritten per operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransferStats {
    pub indexed_objects: u32,
    pub received_objects: u32,
    pub received_bytes: usize,
}

/// Optional handler set invoked during fetch and push.
///
/// Built in the builder style of the callback structs it replaces:
///
/// ```
/// use refsync::remote::NotifySink;
///
/// let mut sink = NotifySink::new();
/// sink.progress(|text| {
///     eprint!("{text}");
///     true
/// });
/// ```
#[derive(Default)]
pub struct NotifySink<'a> {
    progress: Option<Box<dyn FnMut(&str) -> bool + 'a>>,
    transfer_progress: Option<Box<dyn FnMut(TransferStats) -> bool + 'a>>,
    update_tip: Option<Box<dyn FnMut(&str, ObjectId, ObjectId) -> bool + 'a>>,
    push_status: Option<Box<dyn FnMut(&str, Option<&str>) -> bool + 'a>>,
}

impl<'a> NotifySink<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Textual sideband output from the server.
    pub fn progress<F>(&mut self, handler: F) -> &mut Self
    where
        F: FnMut(&str) -> bool + 'a,
    {
        self.progress = Some(Box::new(handler));
        self
    }

    /// Transfer counters, once per received pack chunk.
    pub fn transfer_progress<F>(&mut self, handler: F) -> &mut Self
    where
        F: FnMut(TransferStats) -> bool + 'a,
    {
        self.transfer_progress = Some(Box::new(handler));
        self
    }

    /// A local ref moved: `(name, old, new)`. `old` is zero for a new ref.
    /// Invoked after the update is applied; aborting stops further refs but
    /// does not roll back the ones already applied.
    pub fn update_tip<F>(&mut self, handler: F) -> &mut Self
    where
        F: FnMut(&str, ObjectId, ObjectId) -> bool + 'a,
    {
        self.update_tip = Some(Box::new(handler));
        self
    }

    /// Per-ref push status report entry; the message is the rejection
    /// reason, `None` for an accepted ref.
    pub fn push_status<F>(&mut self, handler: F) -> &mut Self
    where
        F: FnMut(&str, Option<&str>) -> bool + 'a,
    {
        self.push_status = Some(Box::new(handler));
        self
    }

    // Absent handlers never abort.

    pub(crate) fn notify_progress(&mut self, text: &str) -> bool {
        self.progress.as_mut().is_none_or(|f| f(text))
    }

    pub(crate) fn notify_transfer(&mut self, stats: TransferStats) -> bool {
        self.transfer_progress.as_mut().is_none_or(|f| f(stats))
    }

    pub(crate) fn notify_update_tip(&mut self, name: &str, old: ObjectId, new: ObjectId) -> bool {
        self.update_tip.as_mut().is_none_or(|f| f(name, old, new))
    }

    pub(crate) fn notify_push_status(&mut self, name: &str, message: Option<&str>) -> bool {
        self.push_status.as_mut().is_none_or(|f| f(name, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_handlers_do_not_abort() {
        let mut sink = NotifySink::new();
        assert!(sink.notify_progress("counting objects"));
        assert!(sink.notify_transfer(TransferStats::default()));
        assert!(sink.notify_update_tip("refs/heads/main", ObjectId::ZERO, ObjectId::ZERO));
        assert!(sink.notify_push_status("refs/heads/main", None));
    }

    #[test]
    fn handler_return_value_propagates() {
        let mut sink = NotifySink::new();
        sink.progress(|_| false);
        assert!(!sink.notify_progress("stop"));
    }

    #[test]
    fn handlers_can_be_replaced_between_operations() {
        let mut calls = 0usize;
        let mut sink = NotifySink::new();
        sink.progress(|_| true);
        sink.progress(|_| {
            calls += 1;
            true
        });
        assert!(sink.notify_progress("x"));
        drop(sink);
        assert_eq!(calls, 1);
    }
}
