//! Collaborator bundle the service components are generic over.

use hivemesh_core::external::{AuthAuthority, IdProvider, UserDirectory};
use hivemesh_core::repository::{
    GroupInviteRepository, GroupMembershipRepository, GroupRepository, MembershipCache,
    ProfileRepository, ThingRepository,
};

/// Storage, cache and external collaborators of the things core.
///
/// Implementations are shared behind an `Arc` by every component so
/// that a single value wires the whole service.
pub trait Backend: Send + Sync + 'static {
    type Groups: GroupRepository;
    type Things: ThingRepository;
    type Profiles: ProfileRepository;
    type Memberships: GroupMembershipRepository;
    type Invites: GroupInviteRepository;
    type Cache: MembershipCache;
    type Auth: AuthAuthority;
    type Users: UserDirectory;
    type Ids: IdProvider;

    fn groups(&self) -> &Self::Groups;
    fn things(&self) -> &Self::Things;
    fn profiles(&self) -> &Self::Profiles;
    fn memberships(&self) -> &Self::Memberships;
    fn invites(&self) -> &Self::Invites;
    fn cache(&self) -> &Self::Cache;
    fn auth(&self) -> &Self::Auth;
    fn users(&self) -> &Self::Users;
    fn ids(&self) -> &Self::Ids;
}
