pub mod memory;
pub mod pg;
pub mod state_machine;
#[cfg(feature = "test-utils")]
pub mod testutil;
pub mod traits;

pub use memory::MemoryStore;
pub use pg::PgStore;
pub use state_machine::{article_transition_allowed, candidate_transition_allowed};
pub use traits::{NewArticle, SourceMetaPatch, Store};
