mod arxiv;
mod browse;

pub use arxiv::{ArxivSession, ARXIV_COMMANDS};
pub use browse::BrowseSession;
