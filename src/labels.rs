//! Label vocabulary and watch-list resolution
//!
//! The model's class index space is described by a line-oriented label file
//! (one label per line, index = line number). The watch-list — the subset of
//! classes allowed to trigger recording — is resolved against it exactly once
//! at startup and is immutable for the rest of the run. An unresolvable name
//! is a fatal configuration error.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::detector::Inference;
use crate::errors::AgentError;

/// Load the label vocabulary from a line-oriented file.
pub fn load_labels(path: &Path) -> Result<Vec<String>, AgentError> {
    let contents = fs::read_to_string(path).map_err(|e| {
        AgentError::ConfigError(format!("failed to read label file {:?}: {}", path, e))
    })?;
    Ok(contents.lines().map(|l| l.trim().to_string()).collect())
}

/// One watched class: its configured name and resolved model index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchEntry {
    pub name: String,
    pub class_id: usize,
}

/// The ordered set of classes that can trigger recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchList {
    entries: Vec<WatchEntry>,
}

impl WatchList {
    /// Resolve watched names against the vocabulary. Fails on the first name
    /// that does not appear — starting the loop with a silently missing class
    /// would record nothing without anyone noticing.
    pub fn resolve(labels: &[String], watched: &[String]) -> Result<Self, AgentError> {
        let mut entries = Vec::with_capacity(watched.len());
        for name in watched {
            let class_id = labels.iter().position(|l| l == name).ok_or_else(|| {
                AgentError::ConfigError(format!("watched class {:?} not in label vocabulary", name))
            })?;
            entries.push(WatchEntry {
                name: name.clone(),
                class_id,
            });
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[WatchEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn name_of(&self, class_id: usize) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.class_id == class_id)
            .map(|e| e.name.as_str())
    }

    /// Project an inference onto the watched classes: class index to top
    /// score, for classes the frame actually contained.
    pub fn scores(&self, inference: &Inference) -> BTreeMap<usize, f32> {
        let mut out = BTreeMap::new();
        for entry in &self.entries {
            if let Some(score) = inference.top_score(entry.class_id) {
                out.insert(entry.class_id, score);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab() -> Vec<String> {
        vec!["person", "bicycle", "car", "cat", "dog"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_resolve_maps_line_numbers() {
        let watch = WatchList::resolve(&vocab(), &["cat".into(), "person".into()]).unwrap();
        assert_eq!(
            watch.entries(),
            &[
                WatchEntry {
                    name: "cat".into(),
                    class_id: 3
                },
                WatchEntry {
                    name: "person".into(),
                    class_id: 0
                },
            ]
        );
    }

    #[test]
    fn test_resolve_unknown_name_is_fatal() {
        let err = WatchList::resolve(&vocab(), &["unicorn".into()]).unwrap_err();
        assert!(matches!(err, AgentError::ConfigError(_)));
    }

    #[test]
    fn test_scores_projection() {
        let watch = WatchList::resolve(&vocab(), &["cat".into(), "dog".into()]).unwrap();
        let inference = Inference::new(vec![
            vec![0.9], // person: not watched
            vec![],
            vec![],
            vec![0.3, 0.6], // cat
            vec![],         // dog: no detections
        ]);
        let scores = watch.scores(&inference);
        assert_eq!(scores.len(), 1);
        assert_eq!(scores.get(&3), Some(&0.6));
    }
}
