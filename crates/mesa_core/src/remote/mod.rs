use std::sync::Arc;

use crate::domain::{NewReport, Report, ReportId};
use crate::error::AppError;
use crate::mutation::diff::ReportPatch;

pub mod memory;

pub use memory::{MemoryRemote, RemoteOp};

/// Remote report collection, keyed by id.
///
/// Implementations convert transport failures into `AppError` kinds at this boundary; the engine
/// never sees panics or raw transport errors. `Sync` because bulk import submits from worker threads.
pub trait RemoteStore: Sync {
    /// Every report visible to the caller's role.
    fn list(&self) -> Result<Vec<Report>, AppError>;

    /// Returns the server-assigned id.
    fn create(&self, payload: &NewReport) -> Result<ReportId, AppError>;

    /// Applies only the fields present in `patch`.
    fn patch(&self, id: &ReportId, patch: &ReportPatch) -> Result<(), AppError>;

    /// Deleting an unknown id yields a `NotFound` error, which callers treat as benign.
    fn delete(&self, id: &ReportId) -> Result<(), AppError>;
}

impl<T: RemoteStore + ?Sized> RemoteStore for &T {
    fn list(&self) -> Result<Vec<Report>, AppError> {
        (**self).list()
    }

    fn create(&self, payload: &NewReport) -> Result<ReportId, AppError> {
        (**self).create(payload)
    }

    fn patch(&self, id: &ReportId, patch: &ReportPatch) -> Result<(), AppError> {
        (**self).patch(id, patch)
    }

    fn delete(&self, id: &ReportId) -> Result<(), AppError> {
        (**self).delete(id)
    }
}

impl<T: RemoteStore + Send + ?Sized> RemoteStore for Arc<T> {
    fn list(&self) -> Result<Vec<Report>, AppError> {
        (**self).list()
    }

    fn create(&self, payload: &NewReport) -> Result<ReportId, AppError> {
        (**self).create(payload)
    }

    fn patch(&self, id: &ReportId, patch: &ReportPatch) -> Result<(), AppError> {
        (**self).patch(id, patch)
    }

    fn delete(&self, id: &ReportId) -> Result<(), AppError> {
        (**self).delete(id)
    }
}
