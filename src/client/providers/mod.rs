//! Source adapters for the supported paper catalogs

mod arxiv;
mod google_scholar;
mod pubmed;
mod traits;

pub use arxiv::ArxivAdapter;
pub use google_scholar::GoogleScholarAdapter;
pub use pubmed::PubMedAdapter;
pub use traits::{SearchContext, SourceAdapter, SourceError};
