//! Identity resolution and merging across sources.
//!
//! Records from different backends describe the same paper with no shared
//! reliable identifier, so identity is resolved in three tiers, in order:
//! normalized DOI, then PMID, then fuzzy title similarity. The tier order
//! and the similarity cutoff are part of the service contract.

use std::collections::HashMap;

use crate::models::{PaperRecord, SourceId};
use crate::normalize::{normalize_doi, normalize_title, titles_match};

/// Resolve duplicates in `records` and merge them, preserving first-seen
/// order of the surviving entries.
///
/// Deduplicating an already-deduplicated list returns it unchanged.
pub fn dedupe_and_merge(records: Vec<PaperRecord>) -> Vec<PaperRecord> {
    let mut entries: Vec<PaperRecord> = Vec::new();
    // Normalized titles for the accumulator, kept in lockstep with entries
    let mut titles: Vec<String> = Vec::new();
    let mut by_doi: HashMap<String, usize> = HashMap::new();
    let mut by_pmid: HashMap<String, usize> = HashMap::new();

    for record in records {
        let doi = record
            .doi
            .as_deref()
            .map(normalize_doi)
            .filter(|d| !d.is_empty());
        let pmid = record.pmid.clone().filter(|p| !p.is_empty());
        let title = normalize_title(&record.title);

        let matched = doi
            .as_ref()
            .and_then(|d| by_doi.get(d).copied())
            .or_else(|| pmid.as_ref().and_then(|p| by_pmid.get(p).copied()))
            .or_else(|| titles.iter().position(|known| titles_match(known, &title)));

        match matched {
            Some(idx) => {
                merge_into(&mut entries[idx], record);
                // Back-fill identifiers the entry was missing so later
                // records can match on them.
                if let Some(d) = entries[idx]
                    .doi
                    .as_deref()
                    .map(normalize_doi)
                    .filter(|d| !d.is_empty())
                {
                    by_doi.entry(d).or_insert(idx);
                }
                if let Some(p) = entries[idx].pmid.clone().filter(|p| !p.is_empty()) {
                    by_pmid.entry(p).or_insert(idx);
                }
            }
            None => {
                let idx = entries.len();
                if let Some(d) = doi {
                    by_doi.insert(d, idx);
                }
                if let Some(p) = pmid {
                    by_pmid.insert(p, idx);
                }
                titles.push(title);
                entries.push(record);
            }
        }
    }

    entries
}

/// Whether the incoming value should displace the existing one for
/// structured bibliographic fields: a non-empty value from PubMed wins,
/// a value PubMed already contributed is kept, otherwise the longer value
/// wins. Keeping PubMed values sticky on both sides makes the outcome
/// independent of arrival order.
fn prefer_incoming(
    existing_len: usize,
    incoming_len: usize,
    existing_is_pubmed: bool,
    incoming_is_pubmed: bool,
) -> bool {
    if incoming_len == 0 {
        return false;
    }
    if incoming_is_pubmed {
        return true;
    }
    !existing_is_pubmed && incoming_len > existing_len
}

/// Merge `incoming` into `existing` under the field-priority policy.
fn merge_into(existing: &mut PaperRecord, incoming: PaperRecord) {
    let incoming_is_pubmed = incoming.source == SourceId::PubMed;
    let existing_is_pubmed = existing.sources.contains(&SourceId::PubMed);

    for source in &incoming.sources {
        if !existing.sources.contains(source) {
            existing.sources.push(*source);
        }
    }

    // Structured bibliographic metadata: PubMed is authoritative whenever
    // it contributed to either side.
    if prefer_incoming(
        existing.title.len(),
        incoming.title.len(),
        existing_is_pubmed,
        incoming_is_pubmed,
    ) {
        existing.title = incoming.title;
    }
    if prefer_incoming(
        existing.authors.len(),
        incoming.authors.len(),
        existing_is_pubmed,
        incoming_is_pubmed,
    ) {
        existing.authors = incoming.authors;
    }
    let existing_journal_len = existing.journal.as_deref().map_or(0, str::len);
    let incoming_journal_len = incoming.journal.as_deref().map_or(0, str::len);
    if prefer_incoming(
        existing_journal_len,
        incoming_journal_len,
        existing_is_pubmed,
        incoming_is_pubmed,
    ) {
        existing.journal = incoming.journal;
    }
    let existing_type_len = existing.publication_type.as_deref().map_or(0, str::len);
    let incoming_type_len = incoming.publication_type.as_deref().map_or(0, str::len);
    if prefer_incoming(
        existing_type_len,
        incoming_type_len,
        existing_is_pubmed,
        incoming_is_pubmed,
    ) {
        existing.publication_type = incoming.publication_type;
    }

    if existing.year.is_none() {
        existing.year = incoming.year;
    }

    let existing_abstract_len = existing.abstract_text.as_deref().map_or(0, str::len);
    let incoming_abstract_len = incoming.abstract_text.as_deref().map_or(0, str::len);
    if incoming_abstract_len > existing_abstract_len {
        existing.abstract_text = incoming.abstract_text;
    }

    if existing.doi.is_none() {
        existing.doi = incoming.doi;
    }
    if existing.pmid.is_none() {
        existing.pmid = incoming.pmid;
    }
    if existing.url.is_none() {
        existing.url = incoming.url;
    }

    existing.open_access = existing.open_access || incoming.open_access;

    // Semantic Scholar is the citation-graph authority; under the
    // monotonicity rule its preference can only act upward, so the merged
    // count is the maximum of the two.
    existing.citations = existing.citations.max(incoming.citations);
}
