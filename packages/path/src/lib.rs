//! Burrow paths: the key space of a burrow store.
//!
//! A [`Fp`] ("filepath") is an immutable, normalized sequence of components rooted at the
//! conceptual root of a store. Every navigation (`child`, `sibling`, `parent`) returns a new
//! `Fp`; nothing here touches the filesystem.
//!
//! ```rust
//! use burrow_path::{fp, Fp};
//!
//! let users = fp!("users");
//! let alice = users.child("alice/profile").unwrap();
//!
//! assert!(users.contains(&alice));
//! assert_eq!(alice.parent(), fp!("users/alice"));
//! assert_eq!(alice.to_string(), "file://users/alice/profile");
//! ```

mod path;

pub use path::{Fp, Lineage, PathError};
