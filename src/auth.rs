use thiserror::Error;
use tracing::{info, warn};

use crate::catalog;
use crate::models::{Role, User};
use crate::session::{SessionError, SessionStore};
use crate::store::{DataStore, StoreError};

pub const MIN_PHONE_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("select your stake or district")]
    MissingUnit,
    #[error("unknown stake or district '{0}'")]
    UnknownUnit(String),
    #[error("enter your unit's access key")]
    MissingAccessKey,
    #[error("enter a valid contact number")]
    InvalidPhone,
    #[error("the access key is incorrect, ask your stake clerk for it")]
    WrongAccessKey,
    #[error("incorrect council credentials")]
    WrongCredentials,
    #[error("no user is logged in")]
    NotLoggedIn,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[derive(Debug, Clone, Default)]
pub struct LeaderLogin {
    pub unit_id: String,
    pub access_key: String,
    pub phone: String,
    pub name: String,
}

impl LeaderLogin {
    /// Field checks, in the order the form reports them.
    pub fn validate(&self) -> Result<(), AuthError> {
        let unit_id = self.unit_id.trim();
        if unit_id.is_empty() {
            return Err(AuthError::MissingUnit);
        }
        if catalog::unit_by_id(unit_id).is_none() {
            return Err(AuthError::UnknownUnit(unit_id.to_string()));
        }
        if self.access_key.trim().is_empty() {
            return Err(AuthError::MissingAccessKey);
        }
        if self.phone.trim().chars().count() < MIN_PHONE_LEN {
            return Err(AuthError::InvalidPhone);
        }
        Ok(())
    }
}

/// Logs a leader in with the shared unit key, registering them on first use.
pub async fn login_leader(
    store: &dyn DataStore,
    session: &mut SessionStore,
    form: &LeaderLogin,
) -> Result<User, AuthError> {
    form.validate()?;

    let unit_id = form.unit_id.trim();
    if !session.verify_key(unit_id, &form.access_key) {
        return Err(AuthError::WrongAccessKey);
    }

    let phone = form.phone.trim();
    let user = match store.fetch_user(phone).await? {
        Some(existing) => existing,
        None => {
            let user = store
                .register_user(phone, unit_id, form.name.trim())
                .await?;
            info!(unit = unit_id, phone, "registered new leader");
            user
        }
    };

    session.set_user(user.clone())?;
    Ok(user)
}

#[derive(Debug, Clone)]
pub struct AdminCredentials {
    pub phone: String,
    pub password: String,
}

pub fn admin_login(
    credentials: Option<&AdminCredentials>,
    session: &mut SessionStore,
    phone: &str,
    password: &str,
) -> Result<User, AuthError> {
    let matches = credentials
        .map(|c| c.phone == phone.trim() && c.password == password)
        .unwrap_or(false);
    if !matches {
        return Err(AuthError::WrongCredentials);
    }

    let user = User {
        id: "admin-1".to_string(),
        phone: phone.trim().to_string(),
        unit_id: None,
        name: "Setenta de Área".to_string(),
        role: Role::AreaSeventy,
        profile_image: None,
    };
    session.set_user(user.clone())?;
    Ok(user)
}

/// Deletes the logged-in user remotely and ends the session either way.
pub async fn deregister(store: &dyn DataStore, session: &mut SessionStore) -> Result<(), AuthError> {
    let phone = session
        .current_user()
        .map(|user| user.phone.clone())
        .ok_or(AuthError::NotLoggedIn)?;

    if let Err(err) = store.delete_user(&phone).await {
        warn!(error = %err, phone, "remote user deletion failed");
    }
    session.logout()?;
    Ok(())
}

pub async fn update_profile_image(
    store: &dyn DataStore,
    session: &mut SessionStore,
    image: String,
) -> Result<User, AuthError> {
    let mut user = session.current_user().cloned().ok_or(AuthError::NotLoggedIn)?;
    user.profile_image = Some(image);
    store.update_user(&user).await?;
    session.set_user(user.clone())?;
    Ok(user)
}
