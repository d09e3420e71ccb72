//! Path cleaning for traversal stacks.

use smallvec::SmallVec;

/// A traversal stack; most paths are short.
pub type TraversalStack = SmallVec<[String; 8]>;

/// A path split into traversal names.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CleanPath {
    /// Names, last-to-first (the first segment is popped first)
    pub stack: TraversalStack,
    /// Whether the raw path ended with `/`
    pub ends_with_slash: bool,
}

/// Split `path` into a traversal stack.
///
/// Empty and `.` segments are dropped. `..` removes the preceding segment,
/// and is kept as a name when nothing precedes it.
///
/// ```rust
/// use publisher_runtime::path::clean_path;
///
/// let clean = clean_path("/a/./b/../c/");
/// assert_eq!(clean.stack.as_slice(), ["c", "a"]);
/// assert!(clean.ends_with_slash);
/// ```
#[must_use]
pub fn clean_path(path: &str) -> CleanPath {
    let ends_with_slash = path.ends_with('/');
    let mut stack = TraversalStack::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if stack.pop().is_none() {
                    stack.push(segment.to_string());
                }
            }
            name => stack.push(name.to_string()),
        }
    }

    stack.reverse();
    CleanPath {
        stack,
        ends_with_slash,
    }
}
