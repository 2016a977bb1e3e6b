//! Access policy engine.
//!
//! Pure decision functions: given a principal and a loaded conversation,
//! decide whether an operation is allowed. Nothing here touches storage or
//! produces side effects; callers enforce the decision by refusing the
//! operation, and existence checks always run before policy so a missing
//! resource is reported as not-found rather than denied.

use crate::conversations::Conversation;
use crate::identity::{UserId, UserRole};

/// The authenticated identity making a request.
#[derive(Clone, Copy, Debug)]
pub struct Principal {
    pub id: UserId,
    pub role: UserRole,
}

impl Principal {
    pub fn new(id: UserId, role: UserRole) -> Self {
        Self { id, role }
    }
}

/// General read/write access to a conversation's content.
///
/// Patients reach only their own conversations; doctors only conversations
/// they are assigned to. Admins get no general content access — their only
/// privilege is the doctor-assignment operation below.
pub fn can_access(principal: &Principal, conversation: &Conversation) -> bool {
    match principal.role {
        UserRole::Patient => conversation.patient_id == principal.id,
        UserRole::Doctor => conversation.doctor_id == Some(principal.id),
        UserRole::Admin => false,
    }
}

/// Access to the doctor-assignment (and removal) operation.
///
/// Allowed for the owning patient and for any admin. The requirement that
/// the assignment target actually is a doctor is validated by the caller
/// before any mutation.
pub fn can_assign_doctor(principal: &Principal, conversation: &Conversation) -> bool {
    match principal.role {
        UserRole::Patient => conversation.patient_id == principal.id,
        UserRole::Doctor => false,
        UserRole::Admin => true,
    }
}
