//! In-process, path-addressable hierarchical value store with fine-grained
//! change notification.
//!
//! Callers read and write JSON-like values at arbitrary key paths into one
//! nested structure and subscribe to changes at any path prefix, receiving
//! callbacks only when the value actually observable at that prefix
//! changes:
//!
//! - [`ReactiveStore::get_value`] / [`ReactiveStore::set_value`] — reads
//!   and writes; `Value::Null` on the write side deletes.
//! - [`ReactiveStore::add_change_listener`] — per-path change
//!   subscriptions, notified with the new effective value.
//! - [`ReactiveStore::add_key_addition_listener`] — notified when an
//!   immediate child key appears; may lazily attach a change listener to
//!   the new child.
//!
//! Internally the store keeps two trees of identical shape but independent
//! lifetimes: the data tree is pruned on emptiness as writes come and go,
//! the listener tree is pruned on explicit listener removal. Everything is
//! synchronous and single-owner; see the [`ReactiveStore`] docs.

mod listener;
mod node;
mod store;

pub use listener::{ChangeListener, KeyAdditionListener, ListenerId};
pub use store::ReactiveStore;

pub use reactive_data_pointer::{format_pointer, parse_pointer};
