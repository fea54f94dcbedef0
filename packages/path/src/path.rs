//! The `Fp` type and its structural operations.

use std::fmt;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // A component needs at least one character that isn't "."
    static ref ILLEGAL_COMPONENT: Regex = Regex::new(r"^\.+$").unwrap();
    static ref SEPARATORS: Regex = Regex::new(r"[/\\]+").unwrap();
}

/// Errors raised while building or relating paths.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("illegal path component {component:?} at position {position}")]
    InvalidComponent { component: String, position: usize },

    #[error("{path} is not contained within {ancestor}")]
    NotContained { ancestor: Fp, path: Fp },
}

/// An absolute, normalized path into a burrow store.
///
/// Equality, ordering and containment are purely structural: two paths are equal iff their
/// component sequences are equal, and `a.contains(b)` iff `b`'s components start with `a`'s.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Fp {
    components: Vec<String>,
}

impl Fp {
    /// The conceptual root of a store.
    pub fn root() -> Self {
        Fp::default()
    }

    /// Parse a path string.
    ///
    /// Both `/` and `\` separate components; empty components are dropped, so leading,
    /// trailing and doubled separators all normalize away.
    pub fn parse(s: &str) -> Result<Self, PathError> {
        Self::root().child(s)
    }

    /// Build a path from a sequence of components; each may itself contain separators.
    pub fn try_from_components<I, S>(components: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::root().child_components(components)
    }

    fn push_validated(components: &mut Vec<String>, raw: &str) -> Result<(), PathError> {
        for component in SEPARATORS.split(raw).filter(|c| !c.is_empty()) {
            if ILLEGAL_COMPONENT.is_match(component) {
                return Err(PathError::InvalidComponent {
                    component: component.to_string(),
                    position: components.len(),
                });
            }
            components.push(component.to_string());
        }
        Ok(())
    }

    /// Descend by a relative path string (e.g. `"a"` or `"a/b"`).
    pub fn child(&self, rel: &str) -> Result<Fp, PathError> {
        self.child_components([rel])
    }

    /// Descend by a sequence of relative components.
    pub fn child_components<I, S>(&self, rel: I) -> Result<Fp, PathError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut components = self.components.clone();
        for raw in rel {
            Self::push_validated(&mut components, raw.as_ref())?;
        }
        Ok(Fp { components })
    }

    /// Append an already validated path.
    #[must_use]
    pub fn join(&self, other: &Fp) -> Fp {
        let mut components = self.components.clone();
        components.extend(other.components.iter().cloned());
        Fp { components }
    }

    /// The path sharing this path's parent, with a different final component.
    pub fn sibling(&self, component: &str) -> Result<Fp, PathError> {
        self.parent().child(component)
    }

    /// The immediate parent; the root is its own parent.
    #[must_use]
    pub fn parent(&self) -> Fp {
        self.ancestor(1)
    }

    /// The ancestor `n` levels up, saturating at the root.
    #[must_use]
    pub fn ancestor(&self, n: usize) -> Fp {
        let keep = self.components.len().saturating_sub(n);
        Fp {
            components: self.components[..keep].to_vec(),
        }
    }

    /// True iff `other` is this path or one of its descendants.
    pub fn contains(&self, other: &Fp) -> bool {
        self.components.len() <= other.components.len()
            && self.components[..] == other.components[..self.components.len()]
    }

    /// Every path from `self` (inclusive) down to `target` (exclusive), shallowest first.
    ///
    /// Fails if `target` is not contained by `self`. The sequence is produced lazily.
    pub fn lineage<'a>(&self, target: &'a Fp) -> Result<Lineage<'a>, PathError> {
        if !self.contains(target) {
            return Err(PathError::NotContained {
                ancestor: self.clone(),
                path: target.clone(),
            });
        }
        Ok(Lineage {
            target,
            depth: self.components.len(),
        })
    }

    /// The `..`-style traversal leading from this path to `target`.
    pub fn relative_components(&self, target: &Fp) -> Vec<String> {
        let common = self
            .components
            .iter()
            .zip(target.components.iter())
            .take_while(|(a, b)| a == b)
            .count();

        std::iter::repeat_n("..".to_string(), self.components.len() - common)
            .chain(target.components[common..].iter().cloned())
            .collect()
    }

    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// Number of components (the depth below the root).
    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.is_root()
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.components.iter()
    }

    /// The final component, if any.
    pub fn name(&self) -> Option<&str> {
        self.components.last().map(String::as_str)
    }

    /// The on-disk location of this path beneath `base`.
    pub fn to_fs_path(&self, base: &Path) -> PathBuf {
        let mut fs_path = base.to_path_buf();
        fs_path.extend(self.components.iter());
        fs_path
    }
}

impl fmt::Display for Fp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file://{}", self.components.join("/"))
    }
}

impl std::ops::Index<usize> for Fp {
    type Output = String;

    fn index(&self, i: usize) -> &Self::Output {
        &self.components[i]
    }
}

/// Lazy walk produced by [`Fp::lineage`].
#[derive(Debug, Clone)]
pub struct Lineage<'a> {
    target: &'a Fp,
    depth: usize,
}

impl Iterator for Lineage<'_> {
    type Item = Fp;

    fn next(&mut self) -> Option<Fp> {
        if self.depth >= self.target.components.len() {
            return None;
        }
        let fp = self.target.ancestor(self.target.components.len() - self.depth);
        self.depth += 1;
        Some(fp)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.target.components.len().saturating_sub(self.depth);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Lineage<'_> {}

/// Build an [`Fp`] from a literal, panicking on illegal components.
///
/// ```rust
/// use burrow_path::fp;
///
/// let p = fp!("a/b/c");
/// assert_eq!(p.len(), 3);
/// ```
#[macro_export]
macro_rules! fp {
    ($s:expr) => {
        $crate::Fp::parse($s).expect("invalid path literal")
    };
}
