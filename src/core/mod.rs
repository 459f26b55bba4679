//! Request coordination core

pub mod coordinator;
pub mod error;
pub mod state;
pub mod transcript;

pub use coordinator::{Request, RequestCoordinator, RequestPhase, Response};
pub use error::{CoreError, ErrorKind};
pub use state::AppState;
pub use transcript::Transcript;
