use crate::{
    error::{Error, Result},
    MAX_DEPTH,
};

/// Tracks which objects are currently open, innermost last.
///
/// An empty tracker is the idle state. Each entry is the position that identifies one open object:
/// the content start for a writer, the end offset for a reader.
#[derive(Clone, Debug, Default)]
pub struct DepthTracker {
    base: usize,
    open: Vec<usize>,
}

impl DepthTracker {
    /// Create a new depth tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh tracker for a payload nested inside the current innermost object. It starts idle
    /// but still counts the parent's depth against the limit.
    pub fn nested(&self) -> Self {
        Self {
            base: self.depth(),
            open: Vec::new(),
        }
    }

    pub fn depth(&self) -> usize {
        self.base + self.open.len()
    }

    pub fn is_idle(&self) -> bool {
        self.open.is_empty()
    }

    /// Mark of the innermost open object, if any.
    pub fn innermost(&self) -> Option<usize> {
        self.open.last().copied()
    }

    /// Record a newly opened object.
    pub fn enter(&mut self, mark: usize) -> Result<()> {
        if self.depth() >= MAX_DEPTH {
            return Err(Error::ParseLimit("Depth limit exceeded".to_string()));
        }
        self.open.push(mark);
        Ok(())
    }

    /// Close the innermost object, which must be the one identified by `mark`.
    pub fn exit(&mut self, mark: usize) -> Result<()> {
        match self.open.last() {
            Some(v) if *v == mark => {
                self.open.pop();
                Ok(())
            }
            Some(v) => Err(Error::Misuse(format!(
                "closed object at {} while object at {} is still open",
                mark, v
            ))),
            None => Err(Error::Misuse(format!(
                "closed object at {} but no object is open",
                mark
            ))),
        }
    }
}
