/*!
 * Pipe Types
 * Descriptor specifications and pipe directions
 */

use crate::core::types::Descriptor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a descriptor is wired up, from the caller's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipeMode {
    /// Child shares the caller's handle; no buffer is kept
    Inherit,
    /// Caller reads what the child writes (stdout/stderr style)
    Read,
    /// Caller writes what the child reads (stdin style)
    Write,
}

/// Transfer direction of a buffered pipe, from the caller's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Read,
    Write,
}

/// Mapping from descriptor numbers to pipe modes
///
/// The default mirrors stdin/stdout/stderr: `{0: Write, 1: Read, 2: Read}`.
/// Descriptors missing from the spec are inherited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorSpec {
    entries: BTreeMap<Descriptor, PipeMode>,
}

impl Default for DescriptorSpec {
    fn default() -> Self {
        Self::stdio()
    }
}

impl DescriptorSpec {
    /// An empty spec: every descriptor inherited, nothing buffered
    pub fn inherit_all() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// The conventional stdin/stdout/stderr wiring
    pub fn stdio() -> Self {
        Self::inherit_all()
            .with(0, PipeMode::Write)
            .with(1, PipeMode::Read)
            .with(2, PipeMode::Read)
    }

    #[must_use]
    pub fn with(mut self, descriptor: Descriptor, mode: PipeMode) -> Self {
        self.entries.insert(descriptor, mode);
        self
    }

    pub fn mode(&self, descriptor: Descriptor) -> Option<PipeMode> {
        self.entries.get(&descriptor).copied()
    }

    /// Declared descriptors in ascending order
    pub fn iter(&self) -> impl Iterator<Item = (Descriptor, PipeMode)> + '_ {
        self.entries.iter().map(|(d, m)| (*d, *m))
    }

    /// Descriptors declared with a buffered pipe mode, with their direction
    pub(crate) fn pipes(&self) -> impl Iterator<Item = (Descriptor, Direction)> + '_ {
        self.entries.iter().filter_map(|(d, m)| match m {
            PipeMode::Read => Some((*d, Direction::Read)),
            PipeMode::Write => Some((*d, Direction::Write)),
            PipeMode::Inherit => None,
        })
    }
}
