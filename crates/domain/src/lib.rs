mod clock;
mod events;
mod models;
pub mod store;

pub use clock::{Clock, SystemClock};
pub use events::{HookEvent, HookSink, NoopHooks};
pub use models::{Comment, CommentId, Commenter, ModeratorIdentity, Page, Project, ProjectId};
