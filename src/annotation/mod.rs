pub mod channel;
pub mod collection;
pub mod diff;
pub mod labels;
pub mod session;
pub mod store;
pub mod types;

pub use channel::{AnnotationSet, Channel, Stream};
pub use collection::{AnnotationCollection, LockState};
pub use labels::{Category, Label};
pub use session::AnnotationSession;
pub use types::Annotation;
