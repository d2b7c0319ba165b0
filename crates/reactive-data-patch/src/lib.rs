//! Ordered path/value patch records and the pure merge fold.
//!
//! [`merge_patches`] folds an ordered list of writes into a single nested
//! snapshot without going through a store. It is bound to
//! `reactive_data::ReactiveStore` by an equivalence contract: replaying the
//! patches one by one through `set_value` observes the same root value as
//! merging first and writing the merged snapshot once (the contract is
//! verified in this crate's test suite).
//!
//! One asymmetry is deliberate and load-bearing: the merged snapshot keeps
//! literal `null` values as explicit deletion markers, while the store
//! collapses `null` to absence on write and never stores it. Consumers
//! comparing against merged output must treat `null` as a meaningful leaf.
//!
//! # Example
//!
//! ```
//! use reactive_data_patch::{merge_patches, DataPatch};
//! use serde_json::json;
//!
//! let patches = vec![
//!     DataPatch { path: vec!["p".into()], value: json!({"n": "A"}) },
//!     DataPatch { path: vec!["p".into()], value: json!(null) },
//! ];
//! assert_eq!(merge_patches(&patches).unwrap(), json!({"p": null}));
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// One ordered write instruction: assign `value` at `path`.
///
/// A `null` value denotes deletion. Paths address string keys only; arrays
/// are opaque values, never indexed into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPatch {
    pub path: Vec<String>,
    pub value: Value,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MergeError {
    /// There is no well-defined merged root for zero writes.
    #[error("no patches to merge")]
    EmptyPatchList,
}

/// Folds `patches` in order into one fresh nested object.
///
/// Intermediate containers are created on demand; a non-object intermediate
/// (leaf, array, or an earlier `null` marker) is replaced with a fresh
/// empty object. The terminal key is assigned verbatim — `null` included,
/// stored as an explicit deletion marker rather than removed. Later patches
/// at the same path fully replace earlier ones; a child-path patch leaves
/// siblings from an earlier parent patch intact. A patch addressing the
/// root is a no-op.
///
/// # Errors
///
/// [`MergeError::EmptyPatchList`] when `patches` is empty.
pub fn merge_patches(patches: &[DataPatch]) -> Result<Value, MergeError> {
    if patches.is_empty() {
        return Err(MergeError::EmptyPatchList);
    }
    let mut merged = Map::new();
    for patch in patches {
        apply_patch(&mut merged, &patch.path, &patch.value);
    }
    Ok(Value::Object(merged))
}

fn apply_patch(root: &mut Map<String, Value>, path: &[String], value: &Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut current = root;
    for key in parents {
        if !matches!(current.get(key), Some(Value::Object(_))) {
            current.insert(key.clone(), Value::Object(Map::new()));
        }
        let Some(Value::Object(next)) = current.get_mut(key) else {
            unreachable!("intermediate was just materialized as an object");
        };
        current = next;
    }
    current.insert(last.clone(), value.clone());
}
