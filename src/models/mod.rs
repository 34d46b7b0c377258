pub mod paper;
pub mod session;

pub use paper::{Paper, PaperAnalysis, PaperWithAnalysis, SortBy, Source};
pub use session::{DateRange, SearchRequest, SearchSession, SessionStatus};
