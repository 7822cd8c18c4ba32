/// Errors from task registration.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// The name is already registered, as a factory or an instance.
    #[error("task name already registered: {0}")]
    DuplicateName(String),
}

pub type Result<T> = std::result::Result<T, TaskError>;
