//! Row-level visibility rules shared by project and task reads.
//!
//! Every list/getById path filters through [`can_access`] after fetching;
//! entities the caller may not see are reported as not-found, never as
//! forbidden.

use uuid::Uuid;

pub const VISIBILITY_PRIVATE: &str = "private";
pub const VISIBILITY_SPECIFIC: &str = "specific";
pub const VISIBILITY_ALL: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Private,
    Specific,
    All,
}

impl Visibility {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            VISIBILITY_PRIVATE => Some(Self::Private),
            VISIBILITY_SPECIFIC => Some(Self::Specific),
            VISIBILITY_ALL => Some(Self::All),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Private => VISIBILITY_PRIVATE,
            Self::Specific => VISIBILITY_SPECIFIC,
            Self::All => VISIBILITY_ALL,
        }
    }
}

/// Anything with an owner, a visibility tier and a share list.
pub trait Shareable {
    fn owner_id(&self) -> Uuid;
    fn visibility(&self) -> &str;
    fn shared_with(&self) -> &[Uuid];
}

impl Shareable for crate::models::Project {
    fn owner_id(&self) -> Uuid {
        self.user_id
    }
    fn visibility(&self) -> &str {
        &self.visibility
    }
    fn shared_with(&self) -> &[Uuid] {
        &self.shared_with
    }
}

impl Shareable for crate::models::Task {
    fn owner_id(&self) -> Uuid {
        self.user_id
    }
    fn visibility(&self) -> &str {
        &self.visibility
    }
    fn shared_with(&self) -> &[Uuid] {
        &self.shared_with
    }
}

/// The read predicate: owner, or `all`, or `specific` with the caller on
/// the share list. Unknown visibility strings fall back to owner-only.
pub fn can_access<E: Shareable>(entity: &E, caller: Uuid) -> bool {
    if entity.owner_id() == caller {
        return true;
    }
    match Visibility::parse(entity.visibility()) {
        Some(Visibility::All) => true,
        Some(Visibility::Specific) => entity.shared_with().contains(&caller),
        Some(Visibility::Private) | None => false,
    }
}

/// Mutating a project requires ownership; a failed check reads as 404.
pub fn can_mutate_project(project: &crate::models::Project, caller: Uuid) -> bool {
    project.user_id == caller
}
