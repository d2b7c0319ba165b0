//! The dual-tree store engine.
//!
//! `ReactiveStore` composes two trees: the data tree holds the materialized
//! values, the listener tree holds per-path listener registries. A write
//! classifies every touched slot (leaf/complex/absent before and after),
//! applies the minimal structural change, and notifies exactly the
//! listeners whose observable value changed — terminal node first, then
//! each ancestor up to the root.

use serde_json::{Map, Value};

use reactive_data_pointer::parse_pointer;

use crate::listener::{
    invoke_change_listeners, invoke_key_addition_listeners, sweep_absent, ChangeListener,
    ListenerId, ListenerNode,
};
use crate::node::{Children, DataNode};

/// In-process, path-addressable hierarchical value store with fine-grained
/// change notification.
///
/// Values are JSON-like: string-keyed objects are traversable by path,
/// everything else (primitives, arrays, nested arrays) is an opaque leaf.
/// `Value::Null` on the write side means "delete"; reads report absence as
/// `None` and never surface a stored null.
///
/// The store is a single-owner, single-threaded container: all operations
/// run synchronously on the caller's thread, and listener callbacks run
/// nested inside the triggering [`set_value`](ReactiveStore::set_value).
///
/// # Example
///
/// ```
/// use reactive_data::ReactiveStore;
/// use serde_json::json;
///
/// let mut store = ReactiveStore::new();
/// store.set_value(&["player".into(), "health".into()], json!(100));
/// assert_eq!(store.get_value(&["player".into()]), Some(json!({"health": 100})));
///
/// store.set_value(&["player".into()], json!(null));
/// assert_eq!(store.get_value(&["player".into()]), None);
/// ```
pub struct ReactiveStore {
    root: Option<DataNode>,
    listeners: ListenerNode,
    next_listener_id: ListenerId,
}

impl Default for ReactiveStore {
    fn default() -> Self {
        Self {
            root: None,
            listeners: ListenerNode::default(),
            next_listener_id: 1,
        }
    }
}

impl ReactiveStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value observable at `path`, or `None` when the path is
    /// absent. Complex values are synthesized from the tree on each call;
    /// the caller owns the returned snapshot.
    pub fn get_value(&self, path: &[String]) -> Option<Value> {
        let mut node = self.root.as_ref()?;
        for key in path {
            match node {
                DataNode::Branch(children) => node = children.get(key)?,
                DataNode::Leaf(_) => return None,
            }
        }
        node.export()
    }

    /// Registers a change listener at `path`. Returns the listener id and
    /// the current value at the path, so the caller can seed its own state
    /// without a separate read.
    ///
    /// The listener fires with the new effective value each time the value
    /// observable at `path` changes (including to `None` when the path
    /// becomes absent), and stays registered until removed.
    pub fn add_change_listener<F>(
        &mut self,
        path: &[String],
        listener: F,
    ) -> (ListenerId, Option<Value>)
    where
        F: FnMut(Option<&Value>) + Send + Sync + 'static,
    {
        let current = self.get_value(path);
        let id = self.fresh_listener_id();
        let node = self.listeners.materialize(path);
        node.change.insert(id, Box::new(listener));
        (id, current)
    }

    /// Removes a change listener registration. Returns `false` (a no-op,
    /// not an error) when the path or id was never registered. Listener
    /// nodes left with no listeners and no children are pruned bottom-up.
    pub fn remove_change_listener(&mut self, path: &[String], id: ListenerId) -> bool {
        remove_listener(&mut self.listeners, path, id, ListenerKind::Change)
    }

    /// Registers a key-addition listener at `path`: it fires with
    /// `(key, value)` whenever an immediate child key of `path` transitions
    /// from absent to present. The callback may return a change listener,
    /// which is then attached (persistently) to the new child — lazy
    /// subscription to keys discovered at runtime.
    ///
    /// Returns the listener id and the current value at `path`.
    pub fn add_key_addition_listener<F>(
        &mut self,
        path: &[String],
        listener: F,
    ) -> (ListenerId, Option<Value>)
    where
        F: FnMut(&str, &Value) -> Option<ChangeListener> + Send + Sync + 'static,
    {
        let current = self.get_value(path);
        let id = self.fresh_listener_id();
        let node = self.listeners.materialize(path);
        node.key_addition.insert(id, Box::new(listener));
        (id, current)
    }

    /// Removes a key-addition listener registration; same mechanics as
    /// [`remove_change_listener`](ReactiveStore::remove_change_listener).
    pub fn remove_key_addition_listener(&mut self, path: &[String], id: ListenerId) -> bool {
        remove_listener(&mut self.listeners, path, id, ListenerKind::KeyAddition)
    }

    /// Writes `value` at `path`; `Value::Null` deletes the subtree there.
    ///
    /// Missing intermediate containers are created on the way down (and
    /// pruned again before returning if the write left them empty); leaf
    /// values in intermediate position are displaced by fresh containers.
    /// Listeners are notified terminal-first, then ancestors strictly
    /// deepest to shallowest, ending at the root; within one node,
    /// registration order. A panicking listener is caught and logged and
    /// stops nothing else.
    pub fn set_value(&mut self, path: &[String], value: Value) {
        let Self {
            root,
            listeners,
            next_listener_id,
        } = self;

        if path.is_empty() {
            if apply_root(root, value, listeners, next_listener_id) {
                let effective = root.as_ref().and_then(DataNode::export);
                invoke_change_listeners(listeners, effective.as_ref());
            }
            return;
        }

        // A leaf root displaced by a deeper write is itself an observable
        // change at the root, even when the terminal application is clean.
        let root_displaced = matches!(root, Some(DataNode::Leaf(_)));
        if !matches!(root, Some(DataNode::Branch(_))) {
            *root = Some(DataNode::empty_branch());
        }
        let (changed_below, new_child) = {
            let Some(DataNode::Branch(children)) = root.as_mut() else {
                unreachable!("root was just materialized as a branch");
            };
            set_descend(children, Some(listeners), path, value, next_listener_id)
        };
        let changed = changed_below || root_displaced;

        if root.as_ref().is_some_and(DataNode::is_empty_branch) {
            *root = None;
        }
        if changed {
            let effective = root.as_ref().and_then(DataNode::export);
            invoke_change_listeners(listeners, effective.as_ref());
            if let Some((key, child_value)) = new_child {
                invoke_key_addition_listeners(listeners, &key, &child_value, next_listener_id);
            }
        }
    }

    /// [`get_value`](ReactiveStore::get_value) addressed by pointer string.
    pub fn get_ptr(&self, pointer: &str) -> Option<Value> {
        self.get_value(&parse_pointer(pointer))
    }

    /// [`set_value`](ReactiveStore::set_value) addressed by pointer string.
    pub fn set_ptr(&mut self, pointer: &str, value: Value) {
        self.set_value(&parse_pointer(pointer), value)
    }

    pub fn add_change_listener_ptr<F>(&mut self, pointer: &str, listener: F) -> (ListenerId, Option<Value>)
    where
        F: FnMut(Option<&Value>) + Send + Sync + 'static,
    {
        self.add_change_listener(&parse_pointer(pointer), listener)
    }

    pub fn remove_change_listener_ptr(&mut self, pointer: &str, id: ListenerId) -> bool {
        self.remove_change_listener(&parse_pointer(pointer), id)
    }

    pub fn add_key_addition_listener_ptr<F>(
        &mut self,
        pointer: &str,
        listener: F,
    ) -> (ListenerId, Option<Value>)
    where
        F: FnMut(&str, &Value) -> Option<ChangeListener> + Send + Sync + 'static,
    {
        self.add_key_addition_listener(&parse_pointer(pointer), listener)
    }

    pub fn remove_key_addition_listener_ptr(&mut self, pointer: &str, id: ListenerId) -> bool {
        self.remove_key_addition_listener(&parse_pointer(pointer), id)
    }

    fn fresh_listener_id(&mut self) -> ListenerId {
        let id = self.next_listener_id;
        self.next_listener_id = self.next_listener_id.saturating_add(1);
        id
    }
}

#[derive(Clone, Copy)]
enum ListenerKind {
    Change,
    KeyAddition,
}

fn remove_listener(
    node: &mut ListenerNode,
    path: &[String],
    id: ListenerId,
    kind: ListenerKind,
) -> bool {
    let Some((key, rest)) = path.split_first() else {
        return match kind {
            ListenerKind::Change => node.change.remove(&id).is_some(),
            ListenerKind::KeyAddition => node.key_addition.remove(&id).is_some(),
        };
    };
    let Some(child) = node.children.get_mut(key) else {
        return false;
    };
    let removed = remove_listener(child, rest, id, kind);
    if child.is_empty() {
        node.children.remove(key);
    }
    removed
}

/// One level of the write path. `children` and `listeners` belong to the
/// node whose child named `path[0]` is descended into; returns whether the
/// subtree changed observably, plus the freshly created child (key and
/// exported value) the caller still has to announce to its key-addition
/// listeners.
fn set_descend(
    children: &mut Children,
    mut listeners: Option<&mut ListenerNode>,
    path: &[String],
    value: Value,
    next_id: &mut ListenerId,
) -> (bool, Option<(String, Value)>) {
    let Some((key, rest)) = path.split_first() else {
        return (false, None);
    };
    if rest.is_empty() {
        let dirty = apply_child(children, key, value, listeners, next_id);
        return (dirty, None);
    }

    let was_absent = !children.contains_key(key);
    let displaced_leaf = matches!(children.get(key), Some(DataNode::Leaf(_)));
    if !matches!(children.get(key), Some(DataNode::Branch(_))) {
        children.insert(key.clone(), DataNode::empty_branch());
    }

    let (below, new_grandchild) = {
        let Some(DataNode::Branch(child_children)) = children.get_mut(key) else {
            unreachable!("slot was just materialized as a branch");
        };
        let child_node = listeners
            .as_deref_mut()
            .and_then(|node| node.children.get_mut(key));
        set_descend(child_children, child_node, rest, value, next_id)
    };
    let changed = below || displaced_leaf;

    if children.get(key).is_some_and(DataNode::is_empty_branch) {
        children.shift_remove(key);
    }

    let mut announced = None;
    if changed {
        let effective = children.get(key).and_then(DataNode::export);
        if let Some(node) = listeners.and_then(|n| n.children.get_mut(key)) {
            invoke_change_listeners(node, effective.as_ref());
            if let Some((grandchild_key, grandchild_value)) = new_grandchild {
                invoke_key_addition_listeners(node, &grandchild_key, &grandchild_value, next_id);
            }
        }
        if was_absent {
            if let Some(child_value) = effective {
                announced = Some((key.clone(), child_value));
            }
        }
    }
    (changed, announced)
}

/// Applies `value` to the slot `children[key]` per the transition matrix
/// and returns whether the slot's observable value changed. Fires the
/// slot's change listeners and, on an absent → present transition, the
/// owning node's key-addition listeners.
fn apply_child(
    children: &mut Children,
    key: &str,
    value: Value,
    listeners: Option<&mut ListenerNode>,
    next_id: &mut ListenerId,
) -> bool {
    if value.is_null() {
        return remove_child(children, key, listeners);
    }
    match value {
        Value::Object(map) => apply_complex(children, key, map, listeners, next_id),
        leaf => apply_leaf(children, key, leaf, listeners, next_id),
    }
}

fn remove_child(children: &mut Children, key: &str, listeners: Option<&mut ListenerNode>) -> bool {
    let Some(old) = children.get(key) else {
        return false;
    };
    let had_branch = matches!(old, DataNode::Branch(_));
    children.shift_remove(key);
    if let Some(node) = listeners.and_then(|n| n.children.get_mut(key)) {
        if had_branch {
            sweep_absent(node);
        }
        invoke_change_listeners(node, None);
    }
    true
}

fn apply_leaf(
    children: &mut Children,
    key: &str,
    value: Value,
    mut listeners: Option<&mut ListenerNode>,
    next_id: &mut ListenerId,
) -> bool {
    if let Some(DataNode::Leaf(old)) = children.get_mut(key) {
        if *old == value {
            return false;
        }
        *old = value;
        let stored: &Value = old;
        if let Some(node) = listeners.and_then(|n| n.children.get_mut(key)) {
            invoke_change_listeners(node, Some(stored));
        }
        return true;
    }

    let was_absent = !children.contains_key(key);
    children.insert(key.to_string(), DataNode::Leaf(value));
    if !was_absent {
        // A whole complex subtree is being discarded for this leaf; every
        // descendant listener learns its value is gone, deepest first.
        if let Some(node) = listeners.as_deref_mut().and_then(|n| n.children.get_mut(key)) {
            sweep_absent(node);
        }
    }
    if let Some(DataNode::Leaf(stored)) = children.get(key) {
        if let Some(node) = listeners.as_deref_mut().and_then(|n| n.children.get_mut(key)) {
            invoke_change_listeners(node, Some(stored));
        }
        if was_absent {
            if let Some(node) = listeners {
                invoke_key_addition_listeners(node, key, stored, next_id);
            }
        }
    }
    true
}

fn apply_complex(
    children: &mut Children,
    key: &str,
    map: Map<String, Value>,
    mut listeners: Option<&mut ListenerNode>,
    next_id: &mut ListenerId,
) -> bool {
    let was_absent = !children.contains_key(key);
    let displaced_leaf = matches!(children.get(key), Some(DataNode::Leaf(_)));
    if !matches!(children.get(key), Some(DataNode::Branch(_))) {
        children.insert(key.to_string(), DataNode::empty_branch());
    }
    let mut dirty = displaced_leaf;

    {
        let Some(DataNode::Branch(branch)) = children.get_mut(key) else {
            unreachable!("slot was just materialized as a branch");
        };
        let mut child_node = listeners
            .as_deref_mut()
            .and_then(|node| node.children.get_mut(key));

        // Keys present before but missing from the incoming object are
        // deletions; then every incoming key is applied in object order.
        let removed: Vec<String> = branch
            .keys()
            .filter(|k| !map.contains_key(k.as_str()))
            .cloned()
            .collect();
        for child_key in &removed {
            if apply_child(branch, child_key, Value::Null, child_node.as_deref_mut(), next_id) {
                dirty = true;
            }
        }
        for (child_key, child_value) in map {
            if apply_child(branch, &child_key, child_value, child_node.as_deref_mut(), next_id) {
                dirty = true;
            }
        }
    }

    if children.get(key).is_some_and(DataNode::is_empty_branch) {
        children.shift_remove(key);
    }
    if dirty {
        let effective = children.get(key).and_then(DataNode::export);
        if let Some(node) = listeners.as_deref_mut().and_then(|n| n.children.get_mut(key)) {
            invoke_change_listeners(node, effective.as_ref());
        }
        if was_absent {
            if let (Some(node), Some(child_value)) = (listeners, effective.as_ref()) {
                invoke_key_addition_listeners(node, key, child_value, next_id);
            }
        }
    }
    dirty
}

/// The transition matrix applied at the root slot itself; child-level
/// notifications happen inside the recursive application, the root's own
/// change listeners are the caller's responsibility.
fn apply_root(
    root: &mut Option<DataNode>,
    value: Value,
    listeners: &mut ListenerNode,
    next_id: &mut ListenerId,
) -> bool {
    if value.is_null() {
        return match root.take() {
            None => false,
            Some(DataNode::Leaf(_)) => true,
            Some(DataNode::Branch(_)) => {
                sweep_absent(listeners);
                true
            }
        };
    }
    match value {
        Value::Object(map) => {
            let displaced_leaf = matches!(root, Some(DataNode::Leaf(_)));
            if !matches!(root, Some(DataNode::Branch(_))) {
                *root = Some(DataNode::empty_branch());
            }
            let mut dirty = displaced_leaf;
            {
                let Some(DataNode::Branch(branch)) = root.as_mut() else {
                    unreachable!("root was just materialized as a branch");
                };
                let removed: Vec<String> = branch
                    .keys()
                    .filter(|k| !map.contains_key(k.as_str()))
                    .cloned()
                    .collect();
                for key in &removed {
                    if apply_child(branch, key, Value::Null, Some(listeners), next_id) {
                        dirty = true;
                    }
                }
                for (key, child_value) in map {
                    if apply_child(branch, &key, child_value, Some(listeners), next_id) {
                        dirty = true;
                    }
                }
            }
            if root.as_ref().is_some_and(DataNode::is_empty_branch) {
                *root = None;
            }
            dirty
        }
        leaf => match root {
            Some(DataNode::Leaf(old)) => {
                if *old == leaf {
                    false
                } else {
                    *old = leaf;
                    true
                }
            }
            Some(DataNode::Branch(_)) => {
                sweep_absent(listeners);
                *root = Some(DataNode::Leaf(leaf));
                true
            }
            None => {
                *root = Some(DataNode::Leaf(leaf));
                true
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn set_and_get_simple_value() {
        let mut store = ReactiveStore::new();
        store.set_value(&path(&["user", "name"]), json!("Alice"));
        assert_eq!(store.get_value(&path(&["user", "name"])), Some(json!("Alice")));
    }

    #[test]
    fn set_and_get_nested_object() {
        let mut store = ReactiveStore::new();
        let user = json!({
            "name": "Alice",
            "age": 25,
            "address": {"city": "Beijing", "country": "China"}
        });
        store.set_value(&path(&["user"]), user.clone());
        assert_eq!(store.get_value(&path(&["user"])), Some(user));
    }

    #[test]
    fn partial_paths_merge_into_one_view() {
        let mut store = ReactiveStore::new();
        store.set_value(&path(&["a", "b"]), json!(1));
        store.set_value(&path(&["a", "c"]), json!(2));
        assert_eq!(store.get_value(&path(&["a"])), Some(json!({"b": 1, "c": 2})));
    }

    #[test]
    fn whole_object_write_replaces_missing_keys() {
        let mut store = ReactiveStore::new();
        store.set_value(&path(&["a"]), json!({"x": 1, "y": 2}));
        store.set_value(&path(&["a"]), json!({"y": 3}));
        assert_eq!(store.get_value(&path(&["a"])), Some(json!({"y": 3})));
    }

    #[test]
    fn missing_paths_are_absent() {
        let store = ReactiveStore::new();
        assert_eq!(store.get_value(&path(&["nonexistent"])), None);
        assert_eq!(store.get_value(&path(&["user", "nonexistent"])), None);
        assert_eq!(store.get_value(&[]), None);
    }

    #[test]
    fn null_write_deletes_subtree() {
        let mut store = ReactiveStore::new();
        store.set_value(&path(&["a"]), json!({"x": 1}));
        store.set_value(&path(&["a"]), json!(null));
        assert_eq!(store.get_value(&path(&["a"])), None);
        assert_eq!(store.get_value(&path(&["a", "x"])), None);
        assert_eq!(store.get_value(&[]), None);
    }

    #[test]
    fn nested_null_keys_are_never_stored() {
        let mut store = ReactiveStore::new();
        store.set_value(&path(&["a"]), json!({"x": null, "y": 1}));
        assert_eq!(store.get_value(&path(&["a"])), Some(json!({"y": 1})));
        assert_eq!(store.get_value(&path(&["a", "x"])), None);
    }

    #[test]
    fn root_can_hold_a_leaf() {
        let mut store = ReactiveStore::new();
        store.set_value(&[], json!(42));
        assert_eq!(store.get_value(&[]), Some(json!(42)));
        assert_eq!(store.get_value(&path(&["any"])), None);

        // A deeper write displaces the leaf root.
        store.set_value(&path(&["a"]), json!(1));
        assert_eq!(store.get_value(&[]), Some(json!({"a": 1})));
    }

    #[test]
    fn arrays_are_opaque_leaves() {
        let mut store = ReactiveStore::new();
        store.set_value(&path(&["list"]), json!([1, 2, 3]));
        assert_eq!(store.get_value(&path(&["list"])), Some(json!([1, 2, 3])));
        assert_eq!(store.get_value(&path(&["list", "0"])), None);
    }

    #[test]
    fn empty_object_write_on_absent_slot_is_a_clean_no_op() {
        let mut store = ReactiveStore::new();
        store.set_value(&path(&["a"]), json!({}));
        assert_eq!(store.get_value(&path(&["a"])), None);
        assert_eq!(store.get_value(&[]), None);
    }

    #[test]
    fn empty_object_write_deletes_an_existing_leaf() {
        let mut store = ReactiveStore::new();
        store.set_value(&path(&["a"]), json!(5));
        store.set_value(&path(&["a"]), json!({}));
        assert_eq!(store.get_value(&path(&["a"])), None);
    }

    #[test]
    fn deep_write_then_delete_leaves_no_placeholders() {
        let mut store = ReactiveStore::new();
        store.set_value(&path(&["a", "b", "c"]), json!(1));
        store.set_value(&path(&["a", "b", "c"]), json!(null));
        assert_eq!(store.get_value(&path(&["a", "b"])), None);
        assert_eq!(store.get_value(&path(&["a"])), None);
        assert_eq!(store.get_value(&[]), None);
    }

    #[test]
    fn delete_on_missing_path_does_not_materialize_intermediates() {
        let mut store = ReactiveStore::new();
        store.set_value(&path(&["a", "b"]), json!(null));
        assert_eq!(store.get_value(&path(&["a"])), None);
        assert_eq!(store.get_value(&[]), None);
    }

    #[test]
    fn leaf_intermediate_is_displaced_by_deeper_write() {
        let mut store = ReactiveStore::new();
        store.set_value(&path(&["a"]), json!(5));
        store.set_value(&path(&["a", "b"]), json!(1));
        assert_eq!(store.get_value(&path(&["a"])), Some(json!({"b": 1})));
    }

    #[test]
    fn pointer_string_convenience() {
        let mut store = ReactiveStore::new();
        store.set_ptr("/game/settings/difficulty", json!("hard"));
        assert_eq!(store.get_ptr("/game/settings"), Some(json!({"difficulty": "hard"})));
        assert_eq!(store.get_ptr(""), Some(json!({"game": {"settings": {"difficulty": "hard"}}})));
    }
}
