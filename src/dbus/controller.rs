//! Queueing and authorization of `setUpdatesEnabled` calls

use std::collections::VecDeque;

use log::debug;

/// Answer for a resolved call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatesReply {
    /// Caller is the authorized owner; apply the value and reply success.
    Granted(bool),
    /// Reply with `org.freedesktop.DBus.Error.AccessDenied`.
    Denied,
}

#[derive(Debug)]
pub struct ResolvedCall<R> {
    pub sender: String,
    pub reply: UpdatesReply,
    /// Whatever the caller needs to address the reply (the bus message)
    pub token: R,
}

#[derive(Debug)]
struct PendingCall<R> {
    sender: String,
    enabled: bool,
    token: R,
}

/// Holds `setUpdatesEnabled` calls until the owner of the authorized service
/// is known, then resolves them strictly in arrival order.
#[derive(Debug)]
pub struct UpdatesController<R> {
    queue: VecDeque<PendingCall<R>>,
    owner: Option<String>,
}

impl<R> Default for UpdatesController<R> {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
            owner: None,
        }
    }
}

impl<R> UpdatesController<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a call. It is resolved by the next [`drain`](Self::drain)
    /// that happens while an owner is known.
    pub fn submit(&mut self, sender: impl Into<String>, enabled: bool, token: R) {
        self.queue.push_back(PendingCall {
            sender: sender.into(),
            enabled,
            token,
        });
    }

    /// Records the unique bus name now owning the authorized service, or
    /// `None` when it has no owner.
    pub fn authorized_owner_changed(&mut self, owner: Option<String>) {
        let owner = owner.filter(|o| !o.is_empty());
        if owner != self.owner {
            debug!("Authorized service owner: {:?}", owner);
            self.owner = owner;
        }
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Resolves every queued call against the current owner. Nothing is
    /// resolved while the owner is unknown.
    pub fn drain(&mut self) -> Vec<ResolvedCall<R>> {
        let Some(owner) = self.owner.as_deref() else {
            return Vec::new();
        };
        self.queue
            .drain(..)
            .map(|call| {
                let reply = if call.sender == owner {
                    UpdatesReply::Granted(call.enabled)
                } else {
                    UpdatesReply::Denied
                };
                ResolvedCall {
                    sender: call.sender,
                    reply,
                    token: call.token,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calls_wait_for_owner() {
        let mut controller = UpdatesController::new();
        controller.submit(":1.10", false, 1);
        controller.submit(":1.10", true, 2);
        assert!(controller.drain().is_empty());
        assert_eq!(controller.pending(), 2);

        controller.authorized_owner_changed(Some(":1.10".into()));
        let resolved = controller.drain();
        let tokens: Vec<_> = resolved.iter().map(|c| c.token).collect();
        let replies: Vec<_> = resolved.iter().map(|c| c.reply).collect();
        assert_eq!(tokens, vec![1, 2]);
        assert_eq!(
            replies,
            vec![UpdatesReply::Granted(false), UpdatesReply::Granted(true)]
        );
        assert_eq!(controller.pending(), 0);
    }

    #[test]
    fn foreign_callers_are_denied_in_order() {
        let mut controller = UpdatesController::new();
        controller.authorized_owner_changed(Some(":1.10".into()));
        controller.submit(":1.99", false, "a");
        controller.submit(":1.10", false, "b");
        controller.submit(":1.42", true, "c");

        let resolved = controller.drain();
        let summary: Vec<_> = resolved.iter().map(|c| (c.token, c.reply)).collect();
        assert_eq!(
            summary,
            vec![
                ("a", UpdatesReply::Denied),
                ("b", UpdatesReply::Granted(false)),
                ("c", UpdatesReply::Denied),
            ]
        );
        assert_eq!(resolved[0].sender, ":1.99");
    }

    #[test]
    fn owner_loss_queues_again() {
        let mut controller = UpdatesController::new();
        controller.authorized_owner_changed(Some(":1.10".into()));
        controller.authorized_owner_changed(None);
        controller.submit(":1.10", true, ());
        assert!(controller.drain().is_empty());
        assert_eq!(controller.owner(), None);

        controller.authorized_owner_changed(Some(":1.11".into()));
        let resolved = controller.drain();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].reply, UpdatesReply::Denied);
    }

    #[test]
    fn empty_owner_means_no_owner() {
        let mut controller: UpdatesController<()> = UpdatesController::new();
        controller.authorized_owner_changed(Some(String::new()));
        assert_eq!(controller.owner(), None);
    }
}
