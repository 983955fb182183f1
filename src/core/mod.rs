// Core algorithm exports
pub mod dedup;
pub mod filters;
pub mod matcher;
pub mod normalize;
pub mod scoring;
pub mod similarity;

pub use dedup::{DedupOutcome, Deduplicator, KeyLocks};
pub use filters::{contains_keyword, matches_criterion, within_bounds, FieldResolver};
pub use matcher::Matcher;
pub use normalize::normalize;
pub use scoring::score_shared_tail;
pub use similarity::partial_ratio;
