/// Database access layer
///
/// Repositories own all SQL behind per-concern store traits. Correctness
/// under concurrent requests comes from store-level uniqueness constraints
/// and atomic increments, never from application-side locking; a losing
/// guarded insert rolls its transaction back and surfaces as the idempotent
/// `None` outcome rather than as an error.
pub mod content_repo;
pub mod counter_repo;
pub mod like_repo;
pub mod session_repo;
pub mod view_repo;

pub use content_repo::{ContentRepository, ContentStore};
pub use counter_repo::{CounterField, CounterRepository, CounterStore};
pub use like_repo::{LikeRepository, LikeStore};
pub use session_repo::{SessionRepository, SessionStore};
pub use view_repo::{ViewEventRepository, ViewStore};
