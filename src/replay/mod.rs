mod executor;
mod resolver;
mod script;
mod scoring;

pub use executor::ReplayRunner;
pub use resolver::Resolver;
pub use scoring::{
    Category, CategoryScore, DomCandidate, Penalty, Rect, Resolution, ScoreTable, ScoredCandidate, Unresolved,
};
pub use script::SCAN_SCRIPT;
