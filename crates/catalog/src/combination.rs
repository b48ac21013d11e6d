//! Combination enumeration.
//!
//! Iterates lead (outermost), middle, then body (innermost), each in the
//! order clips were added. The resulting order and labels feed directly into
//! output filenames and must not change between runs.

use std::path::Path;

use serde::Serialize;

use crate::catalog::Catalog;
use crate::clip::{Category, Clip};

/// Separator between the per-category parts of a label.
pub const LABEL_SEPARATOR: &str = "_";

/// One output variant: at most one clip per category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Combination<'a> {
    pub lead: Option<&'a Clip>,
    pub middle: Option<&'a Clip>,
    pub body: Option<&'a Clip>,
    label: String,
}

impl<'a> Combination<'a> {
    pub fn new(lead: Option<&'a Clip>, middle: Option<&'a Clip>, body: Option<&'a Clip>) -> Self {
        let label = [
            (Category::Lead, lead),
            (Category::Middle, middle),
            (Category::Body, body),
        ]
        .iter()
        .map(|(category, clip)| match clip {
            Some(clip) => clip.label.as_str(),
            None => category.skip_token(),
        })
        .collect::<Vec<_>>()
        .join(LABEL_SEPARATOR);

        Self {
            lead,
            middle,
            body,
            label,
        }
    }

    /// Output label, e.g. `A_lead-skip_C`.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Present clips in concatenation order.
    pub fn clips(&self) -> Vec<&'a Clip> {
        [self.lead, self.middle, self.body]
            .into_iter()
            .flatten()
            .collect()
    }

    /// Paths of the present clips in concatenation order.
    pub fn clip_paths(&self) -> Vec<&'a Path> {
        self.clips().into_iter().map(|c| c.path.as_path()).collect()
    }

    /// File name of the artifact this combination produces.
    pub fn output_filename(&self, extension: &str) -> String {
        format!("{}.{}", self.label, extension.trim_start_matches('.'))
    }
}

/// Enumerate every combination of the catalog's clips.
///
/// Returns an empty vector when all three categories are empty.
pub fn enumerate(catalog: &Catalog) -> Vec<Combination<'_>> {
    if catalog.is_empty() {
        return Vec::new();
    }

    let leads = catalog.lead.entries();
    let middles = catalog.middle.entries();
    let bodies = catalog.body.entries();

    let mut combinations = Vec::with_capacity(leads.len() * middles.len() * bodies.len());
    for lead in &leads {
        for middle in &middles {
            for body in &bodies {
                combinations.push(Combination::new(*lead, *middle, *body));
            }
        }
    }
    combinations
}

/// Number of combinations [`enumerate`] will produce.
pub fn combination_count(catalog: &Catalog) -> usize {
    if catalog.is_empty() {
        return 0;
    }
    Category::ALL
        .iter()
        .map(|c| catalog.slot(*c).len().max(1))
        .product()
}
