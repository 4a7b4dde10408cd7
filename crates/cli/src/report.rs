use chemsearch_index::{MoleculeLookup, MoleculeRecord};
use chemsearch_indexer::{BuildStatus, RebuildJob, RebuildOutcome};
use chemsearch_search::{ResultPage, SavedQuery};
use std::path::Path;
use std::sync::Arc;

pub fn render_outcome(outcome: &RebuildOutcome) -> String {
    let stats = &outcome.stats;
    let mut out = format!(
        "Rebuild {} published generation {} in {} ms\n",
        outcome.job, outcome.generation, stats.time_ms
    );
    out.push_str(&format!(
        "- Files: {} ({} valid, {} invalid)\n",
        stats.files, stats.valid, stats.invalid
    ));
    out.push_str(&format!("- Duplicated keys: {}\n", stats.duplicated_keys));
    for (category, count) in &stats.categories {
        out.push_str(&format!("- {category}: {count}\n"));
    }
    out
}

pub fn render_status(status: &BuildStatus) -> String {
    let state = if status.is_complete { "complete" } else { "in progress" };
    if status.status.is_empty() {
        return format!("No rebuilds recorded ({state})");
    }
    format!("{} ({state})", status.status)
}

pub fn render_history(jobs: &[RebuildJob]) -> String {
    if jobs.is_empty() {
        return "No rebuilds recorded".to_string();
    }
    let mut out = String::new();
    for job in jobs {
        out.push_str(&format!(
            "{}  {:<9}  {}  {}  {}\n",
            job.id(),
            job.completion().to_string(),
            job.started_at().format("%Y-%m-%d %H:%M"),
            job.initiated_by().unwrap_or("-"),
            job.progress_message()
        ));
    }
    out
}

pub fn render_page(page: &ResultPage) -> String {
    let mut out = format!(
        "Page {}/{} ({} molecules, sort {})\n",
        page.page, page.page_count, page.total, page.sort
    );
    if !page.filters.is_empty() {
        let active: Vec<String> = page
            .filters
            .iter()
            .map(|(attr, value)| format!("{}={value}", attr.name()))
            .collect();
        out.push_str(&format!("Filters: {}\n", active.join(", ")));
    }
    for hit in &page.hits {
        let score = hit
            .score
            .map(|score| format!("{score:.3}  "))
            .unwrap_or_default();
        out.push_str(&format!("{score}{}\n", record_line(&hit.record)));
    }
    for (attr, counts) in &page.filterable {
        let values: Vec<String> = counts
            .iter()
            .map(|(value, count)| format!("{value} ({count})"))
            .collect();
        out.push_str(&format!("{}: {}\n", attr.name(), values.join(", ")));
    }
    out
}

pub fn render_invalid(records: &[Arc<MoleculeRecord>], archive_root: &Path) -> String {
    if records.is_empty() {
        return "No invalid structure files".to_string();
    }
    let mut out = String::new();
    for record in records {
        out.push_str(&format!(
            "{}: {}\n",
            relative(record.path(), archive_root),
            record.parse_error().unwrap_or("unreadable")
        ));
    }
    out
}

pub fn render_molecule(lookup: &MoleculeLookup<'_>, files: &[String], archive_root: &Path) -> String {
    let record = lookup.record;
    let mut out = format!("{}\n", record.name());
    if let Some(key) = record.identity() {
        out.push_str(&format!("- Key: {key}\n"));
    }
    out.push_str(&format!("- Category: {}\n", record.category()));
    if let Some(owner) = record.owner() {
        out.push_str(&format!("- User: {owner}\n"));
    }
    out.push_str(&format!(
        "- Modified: {}\n",
        record.modified().format("%Y-%m-%d %H:%M")
    ));
    out.push_str(&format!("- Path: {}\n", relative(record.path(), archive_root)));
    if !files.is_empty() {
        out.push_str(&format!("- Files: {}\n", files.join(", ")));
    }
    if let Some(warning) = lookup.duplicate_warning() {
        out.push_str(&warning);
        out.push('\n');
    }
    out
}

pub fn render_queries(queries: &[SavedQuery]) -> String {
    if queries.is_empty() {
        return "No saved queries configured".to_string();
    }
    let mut out = String::new();
    for saved in queries {
        let request = &saved.request;
        out.push_str(&format!(
            "{}: {:?} search for {} ({:?})\n",
            saved.name, request.search_type, request.query, request.query_type
        ));
    }
    out
}

fn record_line(record: &MoleculeRecord) -> String {
    format!(
        "{:<24} {:<16} {:<12} {}  {}",
        record.name(),
        record.category(),
        record.owner().unwrap_or("-"),
        record.modified().format("%Y-%m-%d"),
        record.identity().map(|key| key.as_str()).unwrap_or("-")
    )
}

fn relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}
