//! Account registration and removal.
//!
//! Registration validates the submitted fields, refuses self-registration
//! as admin and rejects emails already in use. Removal cascades through
//! everything the account owns in one unit of work; admin accounts cannot be
//! removed.

use super::{MarketplaceEnvironment, commit, required};
use crate::auth::password::hash_password;
use crate::error::MarketplaceError;
use crate::store::{StoreError, UnitOfWork, Write};
use crate::types::{Account, AccountId, Role};
use utshob_core::{SmallVec, effect::Effect, reducer::Reducer, smallvec};

/// Minimum password length
pub const MIN_PASSWORD_LEN: usize = 6;

/// Canonical form of an email address: trimmed and lower-cased
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Records the accounts flow decides on
#[derive(Clone, Debug, Default)]
pub struct AccountsState {
    /// Account already registered under the submitted email
    pub existing: Option<Account>,
    /// Account targeted by a removal
    pub target: Option<Account>,
    /// Result of the command, once settled
    pub outcome: Option<Result<Account, MarketplaceError>>,
}

/// Commands and events of the accounts flow
#[derive(Clone, Debug)]
pub enum AccountsAction {
    // Commands
    /// Register a new account
    Register {
        /// Display name
        name: String,
        /// Login email
        email: String,
        /// Plain-text password
        password: String,
        /// Contact number
        phone: String,
        /// Postal address
        address: String,
        /// Requested role, customer when absent
        role: Option<Role>,
    },

    /// Remove an account and everything it owns
    Remove {
        /// Account to remove
        account_id: AccountId,
    },

    // Events
    /// The new account was stored
    Registered {
        /// Stored account
        account: Account,
    },

    /// The account and its records were deleted
    Removed {
        /// Deleted account
        account: Account,
    },

    /// The command was refused
    Rejected {
        /// Reason
        error: MarketplaceError,
    },
}

/// Reducer for account registration and removal
#[derive(Clone, Copy, Debug, Default)]
pub struct AccountsReducer;

impl AccountsReducer {
    fn validate_registration(
        state: &AccountsState,
        name: &str,
        email: &str,
        password: &str,
        phone: &str,
        address: &str,
        role: Option<Role>,
    ) -> Result<(String, String, String, String), MarketplaceError> {
        let name = required(name, "Name")?;
        let email = normalize_email(&required(email, "Email")?);
        if password.is_empty() {
            return Err(MarketplaceError::invalid("Password is required"));
        }
        let phone = required(phone, "Phone")?;
        let address = required(address, "Address")?;

        if !email.contains('@') {
            return Err(MarketplaceError::invalid("Invalid email address"));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(MarketplaceError::invalid(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if role == Some(Role::Admin) {
            return Err(MarketplaceError::forbidden("Cannot register as admin"));
        }
        if state.existing.is_some() {
            return Err(MarketplaceError::invalid("User already exists"));
        }

        Ok((name, email, phone, address))
    }
}

impl Reducer for AccountsReducer {
    type State = AccountsState;
    type Action = AccountsAction;
    type Environment = MarketplaceEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            AccountsAction::Register {
                name,
                email,
                password,
                phone,
                address,
                role,
            } => {
                let (name, email, phone, address) = match Self::validate_registration(
                    state, &name, &email, &password, &phone, &address, role,
                ) {
                    Ok(fields) => fields,
                    Err(error) => {
                        tracing::warn!(%error, "Registration rejected");
                        state.outcome = Some(Err(error));
                        return SmallVec::new();
                    },
                };

                let password_hash = match hash_password(&password) {
                    Ok(hash) => hash,
                    Err(error) => {
                        tracing::error!(%error, "Registration failed");
                        state.outcome = Some(Err(error.into()));
                        return SmallVec::new();
                    },
                };

                let account = Account {
                    id: AccountId::new(),
                    name,
                    email,
                    password_hash,
                    phone,
                    address,
                    role: role.unwrap_or(Role::Customer),
                    created_at: env.clock.now(),
                };

                let unit = UnitOfWork::new().with(Write::InsertAccount(account.clone()));
                smallvec![commit(
                    env,
                    unit,
                    move || AccountsAction::Registered { account },
                    |err| AccountsAction::Rejected {
                        error: match err {
                            StoreError::Duplicate(_) => MarketplaceError::invalid("User already exists"),
                            other => other.into(),
                        },
                    },
                )]
            },

            AccountsAction::Remove { account_id } => {
                let Some(account) = state.target.clone() else {
                    state.outcome = Some(Err(MarketplaceError::not_found("User", account_id)));
                    return SmallVec::new();
                };
                if account.role == Role::Admin {
                    tracing::warn!(account_id = %account.id, "Refused to delete admin account");
                    state.outcome = Some(Err(MarketplaceError::invalid("Cannot delete admin accounts")));
                    return SmallVec::new();
                }

                let unit = UnitOfWork::new().with(Write::DeleteAccount {
                    id: account.id,
                    role: account.role,
                });
                smallvec![commit(
                    env,
                    unit,
                    move || AccountsAction::Removed { account },
                    |err| AccountsAction::Rejected { error: err.into() },
                )]
            },

            AccountsAction::Registered { account } => {
                tracing::info!(account_id = %account.id, role = %account.role, "Account registered");
                metrics::counter!("marketplace.accounts.registered", "role" => account.role.as_str())
                    .increment(1);
                state.outcome = Some(Ok(account));
                smallvec![Effect::None]
            },

            AccountsAction::Removed { account } => {
                tracing::info!(account_id = %account.id, role = %account.role, "Account deleted with its records");
                state.outcome = Some(Ok(account));
                smallvec![Effect::None]
            },

            AccountsAction::Rejected { error } => {
                tracing::warn!(%error, "Account change rejected");
                state.outcome = Some(Err(error));
                smallvec![Effect::None]
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::auth::password::verify_password;
    use crate::flows::fixtures;
    use utshob_testing::{ReducerTest, assertions, effects::collect_actions};

    fn register(email: &str, password: &str, role: Option<Role>) -> AccountsAction {
        AccountsAction::Register {
            name: "Nusrat".into(),
            email: email.into(),
            password: password.into(),
            phone: "01911111111".into(),
            address: "Sylhet".into(),
            role,
        }
    }

    fn rejected_with(expected: MarketplaceError) -> impl FnOnce(&AccountsState) {
        move |state| assert_eq!(state.outcome, Some(Err(expected)))
    }

    #[test]
    fn test_short_password_rejected() {
        ReducerTest::new(AccountsReducer)
            .with_env(fixtures::env())
            .given_state(AccountsState::default())
            .when_action(register("n@example.com", "12345", None))
            .then_state(rejected_with(MarketplaceError::invalid(
                "Password must be at least 6 characters",
            )))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn test_missing_field_rejected() {
        ReducerTest::new(AccountsReducer)
            .with_env(fixtures::env())
            .given_state(AccountsState::default())
            .when_action(AccountsAction::Register {
                name: "  ".into(),
                email: "n@example.com".into(),
                password: "secret1".into(),
                phone: "0191".into(),
                address: "Sylhet".into(),
                role: None,
            })
            .then_state(rejected_with(MarketplaceError::invalid("Name is required")))
            .run();
    }

    #[test]
    fn test_admin_self_registration_forbidden() {
        ReducerTest::new(AccountsReducer)
            .with_env(fixtures::env())
            .given_state(AccountsState::default())
            .when_action(register("root@example.com", "secret1", Some(Role::Admin)))
            .then_state(rejected_with(MarketplaceError::forbidden("Cannot register as admin")))
            .run();
    }

    #[test]
    fn test_existing_email_rejected() {
        let existing = fixtures::customer("n@example.com");
        ReducerTest::new(AccountsReducer)
            .with_env(fixtures::env())
            .given_state(AccountsState {
                existing: Some(existing),
                ..AccountsState::default()
            })
            .when_action(register("N@Example.com ", "secret1", None))
            .then_state(rejected_with(MarketplaceError::invalid("User already exists")))
            .run();
    }

    #[test]
    fn test_admin_cannot_be_removed() {
        let admin = fixtures::account("admin@example.com", Role::Admin);
        ReducerTest::new(AccountsReducer)
            .with_env(fixtures::env())
            .given_state(AccountsState {
                target: Some(admin.clone()),
                ..AccountsState::default()
            })
            .when_action(AccountsAction::Remove { account_id: admin.id })
            .then_state(rejected_with(MarketplaceError::invalid("Cannot delete admin accounts")))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[tokio::test]
    async fn test_register_commits_normalized_account() {
        let env = fixtures::env();
        let mut state = AccountsState::default();

        let effects = AccountsReducer.reduce(
            &mut state,
            register("  Nusrat@Example.COM", "secret1", Some(Role::Vendor)),
            &env,
        );
        assertions::assert_has_future_effect(&effects);

        let actions = collect_actions(effects).await;
        let Some(AccountsAction::Registered { account }) = actions.into_iter().next() else {
            panic!("expected Registered");
        };
        assert_eq!(account.email, "nusrat@example.com");
        assert_eq!(account.role, Role::Vendor);
        assert_eq!(account.created_at, fixtures::now());
        assert!(verify_password("secret1", &account.password_hash));

        let stored = env.store.account_by_email("nusrat@example.com".into()).await.unwrap();
        assert_eq!(stored.map(|a| a.id), Some(account.id));
    }
}
