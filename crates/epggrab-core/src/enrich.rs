//! Program detail enrichment.

use epggrab_api::feed::{LocalFeedApi, ProgramDetail};
use tracing::{debug, warn};

use crate::model::{CreditRole, Credits, Program};

/// Outcome of an enrichment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enrichment {
    /// Detail document fetched and applied.
    Applied,
    /// No usable detail document; the program keeps its basic fields.
    Unavailable,
}

/// Fetches the detail document of `program` and applies it.
///
/// Never fails: a missing document, a transport failure that survived the
/// retry or an undecodable body all leave the program as it was.
pub async fn enrich<A: LocalFeedApi>(api: &A, program: &mut Program) -> Enrichment {
    match api.fetch_detail(&program.id).await {
        Ok(Some(detail)) => {
            apply_detail(program, detail);
            Enrichment::Applied
        }
        Ok(None) => {
            debug!(program_id = %program.id, "no program detail published");
            Enrichment::Unavailable
        }
        Err(e) => {
            warn!(
                program_id = %program.id,
                error = %format!("{e:#}"),
                "skipping program detail"
            );
            Enrichment::Unavailable
        }
    }
}

/// Copies every present, non-empty field of `detail` onto `program`.
///
/// Fields absent from the document leave the program untouched.
pub fn apply_detail(program: &mut Program, detail: ProgramDetail) {
    if let Some(subtitle) = non_empty(detail.episode_title) {
        program.subtitle = Some(subtitle);
    }
    if let Some(description) = non_empty(detail.description) {
        program.description = Some(description);
    }

    let mut credits = Credits::new();
    for (role, names) in [
        (CreditRole::Director, detail.directors),
        (CreditRole::Actor, detail.actors),
        (CreditRole::Presenter, detail.presenters),
        (CreditRole::Commentator, detail.commentators),
    ] {
        let names = unique_names(names.unwrap_or_default());
        if !names.is_empty() {
            credits.insert(role, names);
        }
    }
    if !credits.is_empty() {
        program.credits = Some(credits);
    }

    let categories = unique_names(detail.genres.unwrap_or_default());
    if !categories.is_empty() {
        program.categories = Some(categories);
    }

    if let Some(aspect) = non_empty(detail.aspect_ratio) {
        program.aspect_ratio = Some(aspect);
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}

/// Trims names, drops empty ones and duplicates, keeping first occurrence.
fn unique_names(names: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        let name = name.trim();
        if !name.is_empty() && !unique.iter().any(|seen| seen == name) {
            unique.push(name.to_owned());
        }
    }
    unique
}
