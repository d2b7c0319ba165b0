//! Listener tree and notification plumbing.
//!
//! The listener tree mirrors the shape of the data tree for every path that
//! has ever had a listener registered beneath it, but the two trees have
//! independent lifetimes: data nodes come and go with writes, listener nodes
//! come and go with registration. During a write the listener tree is only
//! traversed; the single exception is a change listener returned by a
//! key-addition listener, which is attached to the newly present child.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use serde_json::Value;

/// Change listeners receive the new effective value at their path, or
/// `None` once the path has become absent.
pub type ChangeListener = Box<dyn FnMut(Option<&Value>) + Send + Sync>;

/// Key-addition listeners fire with `(key, value)` when an immediate child
/// key of their path appears. The returned change listener, if any, is
/// attached to the new child's node.
pub type KeyAdditionListener =
    Box<dyn FnMut(&str, &Value) -> Option<ChangeListener> + Send + Sync>;

/// Identifier handed out by `add_*_listener` and consumed by
/// `remove_*_listener`. Ids are store-scoped and never reused.
pub type ListenerId = u64;

#[derive(Default)]
pub(crate) struct ListenerNode {
    pub(crate) change: BTreeMap<ListenerId, ChangeListener>,
    pub(crate) key_addition: BTreeMap<ListenerId, KeyAdditionListener>,
    pub(crate) children: BTreeMap<String, ListenerNode>,
}

impl ListenerNode {
    pub(crate) fn is_empty(&self) -> bool {
        self.change.is_empty() && self.key_addition.is_empty() && self.children.is_empty()
    }

    /// Walks to the node at `path`, creating intermediates as needed.
    pub(crate) fn materialize(&mut self, path: &[String]) -> &mut ListenerNode {
        let mut node = self;
        for key in path {
            node = node.children.entry(key.clone()).or_default();
        }
        node
    }
}

/// Invokes every change listener on `node` with `value`, in registration
/// order. A panicking listener is logged and does not stop the rest.
pub(crate) fn invoke_change_listeners(node: &mut ListenerNode, value: Option<&Value>) {
    for (id, listener) in node.change.iter_mut() {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| listener(value))) {
            tracing::error!(
                listener_id = *id,
                "change listener panicked: {}",
                panic_message(payload.as_ref())
            );
        }
    }
}

/// Invokes the key-addition listeners on `node` for a freshly present
/// immediate child, then attaches any change listeners the callbacks
/// returned to that child's node under fresh ids.
pub(crate) fn invoke_key_addition_listeners(
    node: &mut ListenerNode,
    key: &str,
    value: &Value,
    next_id: &mut ListenerId,
) {
    if node.key_addition.is_empty() {
        return;
    }
    let mut attached: Vec<ChangeListener> = Vec::new();
    for (id, listener) in node.key_addition.iter_mut() {
        match catch_unwind(AssertUnwindSafe(|| listener(key, value))) {
            Ok(Some(change_listener)) => attached.push(change_listener),
            Ok(None) => {}
            Err(payload) => {
                tracing::error!(
                    listener_id = *id,
                    "key-addition listener panicked: {}",
                    panic_message(payload.as_ref())
                );
            }
        }
    }
    if !attached.is_empty() {
        let child = node.children.entry(key.to_string()).or_default();
        for listener in attached {
            let id = *next_id;
            *next_id = next_id.saturating_add(1);
            child.change.insert(id, listener);
        }
    }
}

/// Notifies every listener node below `node` that its value is gone,
/// deepest first. Used when a complex value is discarded wholesale; the
/// discarded node's own listeners are the caller's responsibility.
pub(crate) fn sweep_absent(node: &mut ListenerNode) {
    for child in node.children.values_mut() {
        sweep_absent(child);
        invoke_change_listeners(child, None);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "opaque panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn listeners_fire_in_registration_order() {
        let mut node = ListenerNode::default();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        for tag in [1, 2, 3] {
            let order = order.clone();
            node.change.insert(
                tag,
                Box::new(move |_| order.lock().unwrap().push(tag)),
            );
        }
        invoke_change_listeners(&mut node, None);
        assert_eq!(*order.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn panicking_listener_does_not_stop_the_rest() {
        let mut node = ListenerNode::default();
        let calls = Arc::new(AtomicUsize::new(0));
        node.change.insert(1, Box::new(|_| panic!("boom")));
        let calls2 = calls.clone();
        node.change.insert(
            2,
            Box::new(move |_| {
                calls2.fetch_add(1, Ordering::SeqCst);
            }),
        );
        invoke_change_listeners(&mut node, None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn key_addition_attaches_returned_change_listener() {
        let mut node = ListenerNode::default();
        node.key_addition.insert(
            1,
            Box::new(|_key, _value| Some(Box::new(|_: Option<&Value>| {}) as ChangeListener)),
        );
        let mut next_id = 10;
        invoke_key_addition_listeners(&mut node, "alice", &serde_json::json!(1), &mut next_id);
        assert_eq!(next_id, 11);
        assert_eq!(node.children["alice"].change.len(), 1);
    }

    #[test]
    fn materialize_creates_the_full_path() {
        let mut root = ListenerNode::default();
        let path = vec!["a".to_string(), "b".to_string()];
        root.materialize(&path).change.insert(1, Box::new(|_| {}));
        assert!(!root.is_empty());
        assert!(!root.children["a"].is_empty());
        assert!(root.children["a"].children["b"].change.contains_key(&1));
        assert!(root.children["a"].change.is_empty());
    }
}
