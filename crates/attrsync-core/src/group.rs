//! Broadcast groups of actor recipients.
//!
//! An [`EventGroup<E>`] fans one event out to every member, in the order the
//! members joined. Members are [`Recipient`]s, so actors with unrelated
//! message types can share a group. A member whose actor has stopped is
//! dropped on the next broadcast.

use crate::actor::{ActorId, Recipient};
use crate::error::ActorError;
use crate::logging::targets;

/// An ordered set of recipients that receive every broadcast event.
pub struct EventGroup<E> {
    members: Vec<Recipient<E>>,
}

impl<E> Default for EventGroup<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for EventGroup<E> {
    fn clone(&self) -> Self {
        Self {
            members: self.members.clone(),
        }
    }
}

impl<E> std::fmt::Debug for EventGroup<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.members.iter().map(|m| m.id()))
            .finish()
    }
}

impl<E> EventGroup<E> {
    pub fn new() -> Self {
        Self {
            members: Vec::new(),
        }
    }

    /// Add a recipient. Returns false if it was already a member.
    pub fn join(&mut self, recipient: Recipient<E>) -> bool {
        if self.members.contains(&recipient) {
            return false;
        }
        self.members.push(recipient);
        true
    }

    /// Remove the member belonging to `actor`. Returns true if it was a member.
    pub fn leave(&mut self, actor: ActorId) -> bool {
        let before = self.members.len();
        self.members.retain(|r| r.id() != actor);
        before != self.members.len()
    }

    pub fn contains(&self, actor: ActorId) -> bool {
        self.members.iter().any(|r| r.id() == actor)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn clear(&mut self) {
        self.members.clear();
    }

    pub fn recipients(&self) -> impl Iterator<Item = &Recipient<E>> {
        self.members.iter()
    }

    /// Drop members whose actor has stopped.
    pub fn prune(&mut self) -> usize {
        let before = self.members.len();
        self.members.retain(Recipient::is_alive);
        before - self.members.len()
    }
}

impl<E: Clone> EventGroup<E> {
    /// Send `event` to every member. Returns the number of deliveries.
    pub fn broadcast(&mut self, event: &E) -> usize {
        self.broadcast_except(event, None)
    }

    /// Send `event` to every member except `skip`.
    pub fn broadcast_except(&mut self, event: &E, skip: Option<ActorId>) -> usize {
        let mut delivered = 0;
        self.members.retain(|recipient| {
            if Some(recipient.id()) == skip {
                return true;
            }
            match recipient.send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(ActorError::Stopped) => {
                    tracing::debug!(target: targets::GROUP, member = %recipient.id(), "pruned stopped member");
                    false
                }
                Err(err) => {
                    tracing::warn!(
                        target: targets::GROUP,
                        member = %recipient.id(),
                        error = %err,
                        "failed to deliver group event"
                    );
                    true
                }
            }
        });
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{Actor, ActorConfig, Context, Reply, RequestTimeout, spawn};
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct Sink(Arc<Mutex<Vec<String>>>);

    enum SinkMsg {
        Event(String),
        Sync(Reply<()>),
    }

    impl Actor for Sink {
        type Message = SinkMsg;

        fn handle(&mut self, msg: SinkMsg, _ctx: &mut Context<SinkMsg>) {
            match msg {
                SinkMsg::Event(e) => self.0.lock().push(e),
                SinkMsg::Sync(reply) => reply.send(()),
            }
        }
    }

    #[test]
    fn test_broadcast_and_prune() {
        let got_a = Arc::new(Mutex::new(Vec::new()));
        let got_b = Arc::new(Mutex::new(Vec::new()));
        let a = spawn(Sink(got_a.clone()), ActorConfig::with_name("a")).unwrap();
        let b = spawn(Sink(got_b.clone()), ActorConfig::with_name("b")).unwrap();

        let mut group = EventGroup::new();
        assert!(group.join(a.address().recipient_with(SinkMsg::Event)));
        assert!(group.join(b.address().recipient_with(SinkMsg::Event)));
        assert!(!group.join(a.address().recipient_with(SinkMsg::Event)));
        assert_eq!(group.len(), 2);

        assert_eq!(group.broadcast(&"one".to_string()), 2);
        assert_eq!(group.broadcast_except(&"two".to_string(), Some(b.id())), 1);

        b.stop_and_join();
        assert_eq!(group.broadcast(&"three".to_string()), 1);
        assert_eq!(group.len(), 1);
        assert!(!group.contains(b.id()));

        a.address()
            .request(SinkMsg::Sync, RequestTimeout::Infinite)
            .unwrap();
        assert_eq!(*got_a.lock(), vec!["one", "two", "three"]);
        assert_eq!(*got_b.lock(), vec!["one"]);
        a.stop_and_join();
    }

    #[test]
    fn test_leave_and_prune() {
        let a = spawn(Sink(Arc::default()), ActorConfig::with_name("a")).unwrap();
        let b = spawn(Sink(Arc::default()), ActorConfig::with_name("b")).unwrap();
        let mut group: EventGroup<String> = EventGroup::new();
        group.join(a.address().recipient_with(SinkMsg::Event));
        group.join(b.address().recipient_with(SinkMsg::Event));
        assert!(group.leave(a.id()));
        assert!(!group.leave(a.id()));

        b.stop_and_join();
        assert_eq!(group.prune(), 1);
        assert!(group.is_empty());
        a.stop_and_join();
    }
}
