pub mod ranker;
pub mod strategy;
