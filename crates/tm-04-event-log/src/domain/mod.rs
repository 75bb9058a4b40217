pub mod journal;
pub mod projector;

pub use journal::EventJournal;
pub use projector::{apply, init, project, project_prefix};
