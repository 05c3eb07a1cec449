pub mod bio;
pub mod candidate_source;
pub mod catalog;
pub mod curation;
pub mod route_segmenter;
pub mod scoring;
pub mod selection;
pub mod stop;
pub mod supabase;

pub use candidate_source::{CandidatePool, CandidateSource};
pub use catalog::{Catalog, CatalogCandidateSource};
pub use curation::{CurationEngine, CurationOutcome, RadiusAttempt};
pub use route_segmenter::{segment_route, RouteSegments};
pub use selection::{SelectionEngine, SelectionState};
pub use stop::StopSignal;
pub use supabase::SupabaseCandidateSource;
