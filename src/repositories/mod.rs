//! # Repository Layer
//!
//! Typed access to the pipeline tables and read projections. Repositories
//! translate between model structs and store rows; they hold no business
//! rules beyond how a record is addressed.

pub mod content;
pub mod content_state;
pub mod generated_comment;
pub mod posting_event;
pub mod queue;

pub use content::ContentRepository;
pub use content_state::ContentStateRepository;
pub use generated_comment::GeneratedCommentRepository;
pub use posting_event::PostingEventRepository;
pub use queue::QueueRepository;
