use crate::domain_model::*;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("subject {subject} does not own {resource}")]
    Ownership {
        subject: SubjectId,
        resource: String,
    },
    #[error("role {required} required, subject has {actual}")]
    InsufficientPermission { required: Role, actual: Role },
}

/// A mutable resource bound to the subject that created it.
///
/// Use cases that update or delete such a resource pass it through
/// `OwnershipGuard::check` with the request's principal before mutating it.
pub trait OwnedResource {
    fn owner_id(&self) -> &SubjectId;
    fn resource_id(&self) -> String;
}
