pub mod types;

pub use types::{AppError, CollaboratorError, RegistrationError, StageError};
