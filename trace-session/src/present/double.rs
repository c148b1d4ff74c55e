// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::*;

#[derive(Clone, Debug, Default)]
pub struct PresenterDouble {
    pub files: Vec<PathBuf>,
    pub renders: Vec<(PathBuf, Vec<Annotation>)>,
    pub errors: Vec<String>,
}

impl PresenterDouble {
    pub fn with_files(files: &[&str]) -> Self {
        Self {
            files: files.iter().map(|f| PathBuf::from(*f)).collect(),
            ..Self::default()
        }
    }

    /// Annotations most recently rendered into `file`.
    pub fn last_render(&self, file: impl AsRef<Path>) -> Option<Vec<Annotation>> {
        self.renders
            .iter()
            .rev()
            .find(|(f, _)| f == file.as_ref())
            .map(|(_, a)| a.clone())
    }

    /// Number of annotations across all renders.
    pub fn rendered_counts(&self) -> usize {
        self.renders.iter().map(|(_, a)| a.len()).sum()
    }
}

impl IPresenter for PresenterDouble {
    fn visible_files(&self) -> Vec<PathBuf> {
        self.files.clone()
    }

    fn render(&mut self, file: &Path, annotations: Vec<Annotation>) {
        self.renders.push((file.to_owned(), annotations));
    }

    fn show_error(&mut self, message: &str) {
        self.errors.push(message.to_owned());
    }
}
