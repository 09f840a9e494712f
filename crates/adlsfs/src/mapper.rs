//! Translation of backend failures into the adapter's error taxonomy.
//!
//! Every backend call made by the crate goes through [`ErrorMapper::map`];
//! [`BackendError`] never crosses the public API except as the `source` of
//! an [`Error`].

use crate::backend::BackendError;
use crate::error::Error;

/// What the failed call was trying to do. A 409 from a create means the
/// target already exists; from a delete or rename it is a precondition
/// conflict such as a non-empty directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallContext {
    Lookup,
    Create,
    Modify,
}

const NOT_FOUND_CODES: [&str; 7] = [
    "PathNotFound",
    "FilesystemNotFound",
    "ContainerNotFound",
    "ResourceNotFound",
    "BlobNotFound",
    "SourcePathNotFound",
    "RenameDestinationParentPathNotFound",
];

const EXISTS_CODES: [&str; 4] = [
    "PathAlreadyExists",
    "FilesystemAlreadyExists",
    "ContainerAlreadyExists",
    "ResourceAlreadyExists",
];

const CONFLICT_CODES: [&str; 6] = [
    "DirectoryNotEmpty",
    "PathConflict",
    "LeaseIdMissing",
    "LeaseAlreadyPresent",
    "FilesystemBeingDeleted",
    "ContainerBeingDeleted",
];

const PERMISSION_CODES: [&str; 5] = [
    "AuthorizationFailure",
    "AuthenticationFailed",
    "AuthorizationPermissionMismatch",
    "AuthorizationSourceIPMismatch",
    "InsufficientAccountPermissions",
];

pub struct ErrorMapper;

impl ErrorMapper {
    #[must_use]
    pub fn map(err: BackendError, path: &str, context: CallContext) -> Error {
        let path = path.to_string();
        let code = err.code().unwrap_or_default().to_string();
        let status = err.status.unwrap_or_default();
        let is = |codes: &[&str]| codes.contains(&code.as_str());

        if err.timed_out || code == "OperationTimedOut" || matches!(status, 408 | 504) {
            return Error::Timeout {
                path,
                source: Some(Box::new(err)),
            };
        }
        if is(&PERMISSION_CODES) || matches!(status, 401 | 403) {
            return Error::PermissionDenied {
                path,
                source: Some(Box::new(err)),
            };
        }
        if is(&NOT_FOUND_CODES) || status == 404 {
            return Error::NotFound {
                path,
                source: Some(Box::new(err)),
            };
        }
        if is(&EXISTS_CODES)
            || (context == CallContext::Create && matches!(status, 409 | 412) && !is(&CONFLICT_CODES))
        {
            return Error::AlreadyExists {
                path,
                source: Some(Box::new(err)),
            };
        }
        if is(&CONFLICT_CODES) || matches!(status, 409 | 412) {
            return Error::Conflict {
                path,
                reason: if code.is_empty() { err.message.clone() } else { code },
                source: Some(Box::new(err)),
            };
        }
        Error::Backend {
            path,
            source: Box::new(err),
        }
    }
}
