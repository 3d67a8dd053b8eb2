//! Loading / error / ready state for fetched data.

use crate::error::Result;

/// A fetched resource. It never holds stale data alongside an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource<T> {
    Loading,
    Failed(String),
    Ready(T),
}

impl<T> Default for Resource<T> {
    fn default() -> Self {
        Resource::Loading
    }
}

impl<T> Resource<T> {
    /// Turn a fetch result into a resource, logging the error detail.
    pub fn from_result(result: Result<T>) -> Self {
        match result {
            Ok(value) => Resource::Ready(value),
            Err(e) => {
                tracing::warn!(error = %e, "Fetch failed");
                Resource::Failed(e.user_message())
            }
        }
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Resource::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Resource::Failed(message) => Some(message),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Resource::Loading)
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Resource<U> {
        match self {
            Resource::Loading => Resource::Loading,
            Resource::Failed(message) => Resource::Failed(message),
            Resource::Ready(value) => Resource::Ready(f(value)),
        }
    }
}

impl<T> From<Result<T>> for Resource<T> {
    fn from(result: Result<T>) -> Self {
        Resource::from_result(result)
    }
}
