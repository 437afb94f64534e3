//! Domain logic - pure business rules independent of the Bitbucket API

pub mod prerelease;
pub mod refs;
pub mod version;

pub use prerelease::PreRelease;
pub use refs::{
    ActionKind, BatchPlan, RefAction, RefActionOutcome, RefActionRequest, RefDetails, RefKind,
    RepositoryId,
};
pub use version::{compute_candidates, is_valid_semver, ReleaseChannel, ReleaseType, VersionCandidate};
