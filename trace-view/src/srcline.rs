// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Source line that annotations are keyed by.
///
/// Orders by file, then by line, so all lines of one file form a contiguous range.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct SrcLine {
    pub path: PathBuf,

    /// 1-indexed.
    pub line: u32,
}

impl SrcLine {
    pub fn new(path: impl AsRef<Path>, line: u32) -> Self {
        Self {
            path: path.as_ref().to_owned(),
            line,
        }
    }
}

impl fmt::Display for SrcLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path.display(), self.line)
    }
}
