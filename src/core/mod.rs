pub mod archive;
pub mod candidates;
pub mod decision;
pub mod image_ref;
pub mod session;

pub use archive::{ArchiveOutcome, ArchiveStore};
pub use candidates::{normalize, resolve_raw_map, SimilarityEdge, DEFAULT_THRESHOLD};
pub use decision::Decision;
pub use image_ref::{ImageRef, PairKey};
pub use session::{ResolutionSession, SessionOutcome, SessionReport, SessionState};
