pub mod geo;
pub mod journey;
pub mod playlist;
pub mod track;

pub use geo::{haversine_km, GeoPoint};
pub use journey::CurationRequest;
pub use playlist::{ItemKind, PlaylistItem};
pub use track::{normalize_duration, CandidateTrack};
