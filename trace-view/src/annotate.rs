// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Per-line grouping of trace samples for inline display.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{SrcLine, TraceSample};

/// Every count observed for one source line, in sample order.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineCounts(pub Vec<u64>);

impl LineCounts {
    pub fn push(&mut self, count: u64) {
        self.0.push(count);
    }
}

impl fmt::Display for LineCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;

        for count in &self.0 {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "{}", count)?;
            first = false;
        }

        Ok(())
    }
}

/// Text to display at the end of a source line.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Line number (1-indexed).
    pub line: u32,

    pub text: String,
}

impl Annotation {
    pub fn new(line: u32, text: impl Into<String>) -> Self {
        Self {
            line,
            text: text.into(),
        }
    }
}

/// Group samples by source line.
///
/// This is the only place where samples of instructions sharing a line are combined. Samples
/// that cannot be placed on a line (zero count, no file, or line 0) are dropped.
pub fn group(samples: &[TraceSample]) -> BTreeMap<SrcLine, LineCounts> {
    let mut grouped: BTreeMap<SrcLine, LineCounts> = BTreeMap::new();

    for sample in samples {
        if sample.count == 0 || sample.file.is_empty() || sample.line == 0 {
            continue;
        }

        grouped
            .entry(SrcLine::new(&sample.file, sample.line))
            .or_default()
            .push(sample.count);
    }

    grouped
}

/// Annotations for one file, ordered by line.
pub fn annotations_for(
    grouped: &BTreeMap<SrcLine, LineCounts>,
    file: impl AsRef<Path>,
) -> Vec<Annotation> {
    let lo = SrcLine::new(file.as_ref(), 0);
    let hi = SrcLine::new(file.as_ref(), u32::MAX);

    grouped
        .range(lo..=hi)
        .map(|(srcline, counts)| Annotation::new(srcline.line, counts.to_string()))
        .collect()
}
