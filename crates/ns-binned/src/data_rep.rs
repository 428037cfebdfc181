//! Dimension labels shared between densities, systematics and raw events.

use ns_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Ordered set of observable labels a density or systematic spans.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataRepresentation {
    labels: Vec<String>,
}

impl DataRepresentation {
    /// Representation from labels; labels must be unique.
    pub fn new<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        for (i, l) in labels.iter().enumerate() {
            if labels[..i].contains(l) {
                return Err(Error::Validation(format!("duplicate data representation label '{l}'")));
            }
        }
        Ok(Self { labels })
    }

    /// Labels in order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Number of labels.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// `true` when no labels are set.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Position of `label`, if present.
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    /// Positions in `full` of each of this representation's labels, in this
    /// representation's order.
    pub fn relative_indices(&self, full: &DataRepresentation) -> Result<Vec<usize>> {
        self.labels
            .iter()
            .map(|l| {
                full.index_of(l).ok_or_else(|| {
                    Error::NotFound(format!(
                        "label '{l}' not present in data representation {:?}",
                        full.labels
                    ))
                })
            })
            .collect()
    }
}
