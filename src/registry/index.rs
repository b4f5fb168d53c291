//! Ranked full-text search over the registry snapshot.
//!
//! A small inverted index with TF-IDF scoring, built once from the
//! `registry/list` snapshot and read-only thereafter. Each entry is indexed
//! under three weighted fields: name, categories (joined), and the full
//! description. Exact-name lookup bypasses the index entirely so callers
//! checking "is X registered" never see ranking false positives.

use std::collections::{HashMap, HashSet};

use arc_swap::ArcSwapOption;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

use super::types::RegistryEntry;
use crate::error::{BridgeError, BridgeResult};

/// Upper bound on ranked search hits.
pub const SEARCH_LIMIT: usize = 10;

const NAME_WEIGHT: f32 = 3.0;
const CATEGORY_WEIGHT: f32 = 2.0;
const DESCRIPTION_WEIGHT: f32 = 1.0;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "in", "into", "is",
    "it", "its", "of", "on", "or", "that", "the", "this", "to", "was", "will", "with", "you",
    "your",
];

/// Search projection returned to callers: a reduced view of the entry plus
/// the env template from its launch config.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolSummary {
    pub name: String,
    pub full_description: String,
    pub id: String,
    pub installed: bool,
    pub categories: Vec<String>,
    pub config: Map<String, Value>,
}

impl From<&RegistryEntry> for ToolSummary {
    fn from(entry: &RegistryEntry) -> Self {
        Self {
            name: entry.name.clone(),
            full_description: entry.full_description.clone(),
            id: entry.name.clone(),
            installed: entry.installed,
            categories: entry.categories.clone(),
            config: entry.config.env.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Posting {
    doc: usize,
    weight: f32,
}

pub struct SearchIndex {
    entries: Vec<RegistryEntry>,
    by_name: HashMap<String, usize>,
    postings: HashMap<String, Vec<Posting>>,
    idf: HashMap<String, f32>,
    norms: Vec<f32>,
}

impl SearchIndex {
    /// Index every entry under its weighted fields. The index is a pure
    /// function of the snapshot; refresh means rebuilding wholesale.
    pub fn build(entries: Vec<RegistryEntry>) -> Self {
        let mut postings: HashMap<String, Vec<Posting>> = HashMap::new();
        let mut by_name: HashMap<String, usize> = HashMap::new();

        for (doc, entry) in entries.iter().enumerate() {
            by_name.entry(entry.name.to_lowercase()).or_insert(doc);

            let mut weights: HashMap<String, f32> = HashMap::new();
            accumulate(&mut weights, &entry.name, NAME_WEIGHT);
            accumulate(&mut weights, &entry.categories.join(", "), CATEGORY_WEIGHT);
            accumulate(&mut weights, &entry.full_description, DESCRIPTION_WEIGHT);

            for (term, weight) in weights {
                postings.entry(term).or_default().push(Posting { doc, weight });
            }
        }

        let doc_count = entries.len() as f32;
        let idf: HashMap<String, f32> = postings
            .iter()
            .map(|(term, list)| {
                let df = list.len() as f32;
                (term.clone(), 1.0 + ((doc_count + 1.0) / (df + 1.0)).ln())
            })
            .collect();

        let mut norms = vec![0.0f32; entries.len()];
        for (term, list) in &postings {
            let idf_t = idf[term];
            for posting in list {
                norms[posting.doc] += (posting.weight * idf_t).powi(2);
            }
        }
        for norm in &mut norms {
            *norm = if *norm > 0.0 { norm.sqrt() } else { 1.0 };
        }

        debug!(
            entries = entries.len(),
            terms = postings.len(),
            "search index built"
        );

        Self {
            entries,
            by_name,
            postings,
            idf,
            norms,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Top hits for a free-text query, best first, at most [`SEARCH_LIMIT`].
    pub fn search(&self, query: &str) -> Vec<ToolSummary> {
        self.ranked(query)
            .into_iter()
            .map(|(doc, _)| ToolSummary::from(&self.entries[doc]))
            .collect()
    }

    /// Case-insensitive exact match against entry names only.
    pub fn lookup_exact(&self, name: &str) -> Option<ToolSummary> {
        self.by_name
            .get(&name.to_lowercase())
            .map(|&doc| ToolSummary::from(&self.entries[doc]))
    }

    fn ranked(&self, query: &str) -> Vec<(usize, f32)> {
        let terms: HashSet<String> = tokenize(query).into_iter().collect();

        let mut scores: HashMap<usize, f32> = HashMap::new();
        for term in &terms {
            let (Some(list), Some(idf_t)) = (self.postings.get(term), self.idf.get(term)) else {
                continue;
            };
            for posting in list {
                *scores.entry(posting.doc).or_default() += posting.weight * idf_t * idf_t;
            }
        }

        let mut hits: Vec<(usize, f32)> = scores
            .into_iter()
            .map(|(doc, score)| (doc, score / self.norms[doc]))
            .collect();
        // Ties resolve to snapshot order so results are stable across runs.
        hits.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        hits.truncate(SEARCH_LIMIT);
        hits
    }
}

fn accumulate(weights: &mut HashMap<String, f32>, text: &str, field_weight: f32) {
    for token in tokenize(text) {
        *weights.entry(token).or_default() += field_weight;
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .filter(|t| t.len() > 1 && !STOPWORDS.contains(&t.as_str()))
        .collect()
}

/// Holder for the once-installed index. Empty until the dispatcher's
/// one-shot initialization stores the built index; every read before that
/// fails with a not-initialized error.
pub struct SearchService {
    index: ArcSwapOption<SearchIndex>,
}

impl SearchService {
    pub fn new() -> Self {
        Self {
            index: ArcSwapOption::empty(),
        }
    }

    pub fn install(&self, index: SearchIndex) {
        self.index.store(Some(Arc::new(index)));
    }

    pub fn is_ready(&self) -> bool {
        self.index.load().is_some()
    }

    pub fn search(&self, query: &str) -> BridgeResult<Vec<ToolSummary>> {
        Ok(self.loaded()?.search(query))
    }

    pub fn lookup_exact(&self, name: &str) -> BridgeResult<Option<ToolSummary>> {
        Ok(self.loaded()?.lookup_exact(name))
    }

    fn loaded(&self) -> BridgeResult<Arc<SearchIndex>> {
        self.index
            .load_full()
            .ok_or(BridgeError::NotInitialized("search index"))
    }
}

impl Default for SearchService {
    fn default() -> Self {
        Self::new()
    }
}
