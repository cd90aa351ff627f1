//! Pure transformations from backend results into cache shapes.

use super::{LanguageMap, Registry, TermMap};
use crate::error::CacheError;
use crate::poeditor::{LanguagesResult, TermsResult};

/// Language codes of one project, in backend order.
pub fn language_codes(result: &LanguagesResult) -> Vec<String> {
    result
        .languages
        .iter()
        .map(|language| language.code.clone())
        .collect()
}

/// Pair each project id with the language list found at the same position.
pub fn build_registry(project_ids: &[String], results: &[LanguagesResult]) -> Registry {
    project_ids
        .iter()
        .zip(results)
        .map(|(project_id, result)| (project_id.clone(), language_codes(result)))
        .collect()
}

/// Collapse one term list per language into `language -> term -> content`.
///
/// `results[i]` must hold the terms fetched for `languages[i]`. Output
/// languages keep input order; a term key seen twice keeps its last value.
pub fn normalize(
    project_id: &str,
    languages: &[String],
    results: &[TermsResult],
) -> Result<LanguageMap, CacheError> {
    if languages.len() != results.len() {
        return Err(CacheError::Normalize {
            project_id: project_id.to_string(),
            reason: format!(
                "expected {} term lists, got {}",
                languages.len(),
                results.len()
            ),
        });
    }

    Ok(languages
        .iter()
        .zip(results)
        .map(|(language, result)| {
            let terms: TermMap = result
                .terms
                .iter()
                .map(|term| (term.term.clone(), term.content()))
                .collect();
            (language.clone(), terms)
        })
        .collect())
}
