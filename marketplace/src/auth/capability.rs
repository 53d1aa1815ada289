//! Role capabilities and the authenticated actor.
//!
//! Authorization is decided from an explicit capability table rather than
//! from role strings scattered through handlers.
//!
//! | Capability       | customer | vendor | admin |
//! |------------------|:--------:|:------:|:-----:|
//! | `BookServices`   |    ✓     |        |       |
//! | `PayBookings`    |    ✓     |        |       |
//! | `SubmitFeedback` |    ✓     |        |       |
//! | `ListServices`   |          |   ✓    |       |
//! | `ManageAccounts` |          |        |   ✓   |

use crate::types::{AccountId, Role};
use serde::Serialize;

/// Something an account may do
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    /// List, delete and clean up accounts; see every booking
    ManageAccounts,
    /// Create service listings
    ListServices,
    /// Place bookings
    BookServices,
    /// Pay for bookings
    PayBookings,
    /// Submit ratings and reviews
    SubmitFeedback,
}

impl Role {
    /// Capabilities granted to this role
    #[must_use]
    pub const fn capabilities(self) -> &'static [Capability] {
        match self {
            Self::Customer => &[
                Capability::BookServices,
                Capability::PayBookings,
                Capability::SubmitFeedback,
            ],
            Self::Vendor => &[Capability::ListServices],
            Self::Admin => &[Capability::ManageAccounts],
        }
    }

    /// Whether this role holds `capability`
    #[must_use]
    pub fn can(self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

/// The authenticated caller of a request, tagged by role
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Actor {
    /// A customer account
    Customer(AccountId),
    /// A vendor account
    Vendor(AccountId),
    /// An administrator account
    Admin(AccountId),
}

impl Actor {
    /// Build the actor for an account
    #[must_use]
    pub const fn new(id: AccountId, role: Role) -> Self {
        match role {
            Role::Customer => Self::Customer(id),
            Role::Vendor => Self::Vendor(id),
            Role::Admin => Self::Admin(id),
        }
    }

    /// Account id regardless of role
    #[must_use]
    pub const fn id(&self) -> AccountId {
        match self {
            Self::Customer(id) | Self::Vendor(id) | Self::Admin(id) => *id,
        }
    }

    /// Role of the actor
    #[must_use]
    pub const fn role(&self) -> Role {
        match self {
            Self::Customer(_) => Role::Customer,
            Self::Vendor(_) => Role::Vendor,
            Self::Admin(_) => Role::Admin,
        }
    }

    /// Whether the actor holds `capability`
    #[must_use]
    pub fn can(&self, capability: Capability) -> bool {
        self.role().can(capability)
    }

    /// Whether the actor is `account` itself or an administrator
    #[must_use]
    pub fn is_self_or_admin(&self, account: AccountId) -> bool {
        matches!(self, Self::Admin(_)) || self.id() == account
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_table() {
        assert!(Role::Customer.can(Capability::BookServices));
        assert!(Role::Customer.can(Capability::SubmitFeedback));
        assert!(!Role::Customer.can(Capability::ListServices));
        assert!(Role::Vendor.can(Capability::ListServices));
        assert!(!Role::Vendor.can(Capability::PayBookings));
        assert!(Role::Admin.can(Capability::ManageAccounts));
        assert!(!Role::Admin.can(Capability::BookServices));
    }

    #[test]
    fn test_self_or_admin() {
        let me = AccountId::new();
        let other = AccountId::new();

        assert!(Actor::Customer(me).is_self_or_admin(me));
        assert!(!Actor::Customer(me).is_self_or_admin(other));
        assert!(Actor::Admin(me).is_self_or_admin(other));
    }

    #[test]
    fn test_actor_roundtrip() {
        let id = AccountId::new();
        for role in [Role::Customer, Role::Vendor, Role::Admin] {
            let actor = Actor::new(id, role);
            assert_eq!(actor.role(), role);
            assert_eq!(actor.id(), id);
        }
    }
}
