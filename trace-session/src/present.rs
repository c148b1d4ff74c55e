// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::path::{Path, PathBuf};

use downcast_rs::Downcast;
use trace_view::{
    annotate::{self, Annotation},
    TraceSample,
};

/// Editor surface that displays counts next to source lines.
pub trait IPresenter: Downcast + Send {
    /// Files currently open in an editor.
    fn visible_files(&self) -> Vec<PathBuf>;

    /// Replace the annotations of `file`. An empty list clears it.
    fn render(&mut self, file: &Path, annotations: Vec<Annotation>);

    fn show_error(&mut self, message: &str);
}

impl_downcast!(IPresenter);

/// Render `samples` into every visible file.
///
/// Files without samples are cleared.
pub fn present(samples: &[TraceSample], presenter: &mut dyn IPresenter) {
    let grouped = annotate::group(samples);

    for file in presenter.visible_files() {
        let annotations = annotate::annotations_for(&grouped, &file);
        debug!("rendering {} lines in {}", annotations.len(), file.display());
        presenter.render(&file, annotations);
    }
}

#[cfg(test)]
pub mod double;
