use crate::application_port::{AccessError, OwnedResource};
use crate::domain_model::{Principal, Role};

/// Binds a mutable resource to the subject that created it.
pub struct OwnershipGuard;

impl OwnershipGuard {
    pub fn check<R>(resource: &R, principal: &Principal) -> Result<(), AccessError>
    where
        R: OwnedResource + ?Sized,
    {
        if resource.owner_id() == &principal.subject_id {
            Ok(())
        } else {
            Err(AccessError::Ownership {
                subject: principal.subject_id.clone(),
                resource: resource.resource_id(),
            })
        }
    }
}

pub struct RoleGuard;

impl RoleGuard {
    pub fn check(principal: &Principal, required: Role) -> Result<(), AccessError> {
        if principal.role >= required {
            Ok(())
        } else {
            Err(AccessError::InsufficientPermission {
                required,
                actual: principal.role,
            })
        }
    }
}
