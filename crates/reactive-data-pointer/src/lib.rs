//! Path and pointer-string utilities for reactive-data.
//!
//! A path is an ordered sequence of string keys addressing a node in a
//! nested string-keyed structure; the empty path addresses the root. This
//! crate implements the textual pointer rendering of such paths (`"/a/b"`,
//! with `~0`/`~1` escaping borrowed from RFC 6901) plus the small set of
//! path predicates the store and patch crates share.
//!
//! Array elements are never addressed by path: arrays are opaque leaf
//! values everywhere in reactive-data, so there is no index syntax here.
//!
//! # Example
//!
//! ```
//! use reactive_data_pointer::{parse_pointer, format_pointer, get};
//!
//! let path = parse_pointer("/players/alice");
//! assert_eq!(path, vec!["players".to_string(), "alice".to_string()]);
//! assert_eq!(format_pointer(&path), "/players/alice");
//!
//! let doc = serde_json::json!({"players": {"alice": {"health": 100}}});
//! let val = get(&doc, &path);
//! assert_eq!(val, Some(&serde_json::json!({"health": 100})));
//! ```

use serde_json::Value;
use thiserror::Error;

/// Unescapes a pointer component.
///
/// `~1` is replaced with `/` and `~0` is replaced with `~`.
///
/// # Example
///
/// ```
/// use reactive_data_pointer::unescape_component;
///
/// assert_eq!(unescape_component("a~0b"), "a~b");
/// assert_eq!(unescape_component("c~1d"), "c/d");
/// assert_eq!(unescape_component("no-escapes"), "no-escapes");
/// ```
pub fn unescape_component(component: &str) -> String {
    if !component.contains('~') {
        return component.to_string();
    }
    // Order matters: ~1 must be replaced before ~0
    component.replace("~1", "/").replace("~0", "~")
}

/// Escapes a pointer component.
///
/// `/` is replaced with `~1` and `~` is replaced with `~0`.
///
/// # Example
///
/// ```
/// use reactive_data_pointer::escape_component;
///
/// assert_eq!(escape_component("a~b"), "a~0b");
/// assert_eq!(escape_component("c/d"), "c~1d");
/// ```
pub fn escape_component(component: &str) -> String {
    if !component.contains('/') && !component.contains('~') {
        return component.to_string();
    }
    // Order matters: ~ must be escaped before /
    component.replace('~', "~0").replace('/', "~1")
}

/// Parse a pointer string into path components.
///
/// - Empty string returns the empty (root) path
/// - The leading `/` is stripped
/// - Each component is unescaped
///
/// # Example
///
/// ```
/// use reactive_data_pointer::parse_pointer;
///
/// assert_eq!(parse_pointer(""), Vec::<String>::new());
/// assert_eq!(parse_pointer("/"), vec![""]);
/// assert_eq!(parse_pointer("/foo/bar"), vec!["foo", "bar"]);
/// assert_eq!(parse_pointer("/a~0b/c~1d"), vec!["a~b", "c/d"]);
/// ```
pub fn parse_pointer(pointer: &str) -> Vec<String> {
    if pointer.is_empty() {
        return Vec::new();
    }
    pointer[1..].split('/').map(unescape_component).collect()
}

/// Format path components into a pointer string.
///
/// Returns an empty string for the root path.
///
/// # Example
///
/// ```
/// use reactive_data_pointer::format_pointer;
///
/// assert_eq!(format_pointer(&[]), "");
/// assert_eq!(format_pointer(&["foo".to_string(), "bar".to_string()]), "/foo/bar");
/// assert_eq!(format_pointer(&["a~b".to_string()]), "/a~0b");
/// ```
pub fn format_pointer(path: &[String]) -> String {
    if path.is_empty() {
        return String::new();
    }
    let mut out = String::new();
    for component in path {
        out.push('/');
        out.push_str(&escape_component(component));
    }
    out
}

/// Check if a path addresses the root.
///
/// # Example
///
/// ```
/// use reactive_data_pointer::is_root;
///
/// assert!(is_root(&[]));
/// assert!(!is_root(&["foo".to_string()]));
/// ```
pub fn is_root(path: &[String]) -> bool {
    path.is_empty()
}

/// Check if `parent` is a strict prefix of `child`.
///
/// # Example
///
/// ```
/// use reactive_data_pointer::is_child;
///
/// let parent = vec!["foo".to_string()];
/// let child = vec!["foo".to_string(), "bar".to_string()];
/// assert!(is_child(&parent, &child));
/// assert!(!is_child(&child, &parent));
/// assert!(!is_child(&parent, &parent));
/// ```
pub fn is_child(parent: &[String], child: &[String]) -> bool {
    if parent.len() >= child.len() {
        return false;
    }
    parent.iter().zip(child).all(|(p, c)| p == c)
}

/// Check if two paths address the same node.
pub fn is_path_equal(p1: &[String], p2: &[String]) -> bool {
    p1.len() == p2.len() && p1.iter().zip(p2).all(|(a, b)| a == b)
}

/// Get the parent path of a given path.
///
/// # Errors
///
/// Returns [`PointerError::NoParent`] for the root path.
///
/// # Example
///
/// ```
/// use reactive_data_pointer::parent;
///
/// assert_eq!(parent(&["foo".to_string(), "bar".to_string()]).unwrap(), vec!["foo"]);
/// assert!(parent(&[]).is_err());
/// ```
pub fn parent(path: &[String]) -> Result<Vec<String>, PointerError> {
    if path.is_empty() {
        return Err(PointerError::NoParent);
    }
    Ok(path[..path.len() - 1].to_vec())
}

/// Walk a plain JSON value along a key path.
///
/// Only objects are traversable; any other value part-way down the path
/// (including arrays, which are opaque) yields `None`.
///
/// # Example
///
/// ```
/// use reactive_data_pointer::get;
/// use serde_json::json;
///
/// let doc = json!({"foo": {"bar": 42}});
/// assert_eq!(get(&doc, &["foo".to_string(), "bar".to_string()]), Some(&json!(42)));
/// assert_eq!(get(&doc, &["missing".to_string()]), None);
/// assert_eq!(get(&json!([1, 2]), &["0".to_string()]), None);
/// ```
pub fn get<'a>(val: &'a Value, path: &[String]) -> Option<&'a Value> {
    let mut current = val;
    for key in path {
        match current {
            Value::Object(map) => current = map.get(key)?,
            _ => return None,
        }
    }
    Some(current)
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PointerError {
    #[error("NO_PARENT")]
    NoParent,
}
