//! Classification code suggestions.
//!
//! Summaries are scored against a reference table of classification codes
//! by keyword overlap. Suggestions are advisory; matching never fails a
//! submission.

mod matcher;
mod reference;

pub use matcher::{KodeCandidate, KodeMatcher, MAX_CANDIDATES, score_entries};
pub use reference::{ReferenceEntry, ReferenceSource, ReferenceTable};
