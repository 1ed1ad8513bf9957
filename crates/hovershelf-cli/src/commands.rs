pub mod arxiv;
pub mod browse;
pub mod run;
