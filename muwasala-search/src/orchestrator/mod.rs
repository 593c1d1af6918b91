//! Search orchestration: concurrent fan-out, scoring, dedup and ranking.
//!
//! [`fanout`] sends one query to every routed source under a shared
//! deadline; [`ranking`] turns the merged candidates into a sorted,
//! deduplicated page.

pub mod fanout;
pub mod normalize;
pub mod ranking;
pub mod scoring;

pub use fanout::{FanOutCoordinator, FanOutOutcome};
pub use ranking::{RankedPage, Ranker, RankerConfig};
