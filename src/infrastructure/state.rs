use std::sync::Arc;

use crate::{
    domain::optimizer::OptimizerSettings,
    infrastructure::{
        auth::{AuthenticatedUser, JwtKeys},
        config::Config,
        store::{ReturnsStore, StoreError},
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn ReturnsStore>,
    pub jwt_keys: JwtKeys,
}

impl AppState {
    pub fn new(config: Arc<Config>, store: Arc<dyn ReturnsStore>) -> Self {
        let jwt_keys = JwtKeys::new(&config.auth.jwt_secret);
        Self {
            config,
            store,
            jwt_keys,
        }
    }

    pub fn optimizer_settings(&self) -> OptimizerSettings {
        OptimizerSettings {
            stale_after: self.config.stale_after(),
        }
    }

    /// Development-only identity used when `auth.bypass_auth` is enabled.
    pub async fn resolve_bypass_user(&self) -> Result<Option<AuthenticatedUser>, StoreError> {
        if !self.config.auth.bypass_auth {
            return Ok(None);
        }
        let Some(email) = self.config.auth.bypass_email.as_deref() else {
            return Ok(None);
        };
        let user = self.store.find_user_by_email(email).await?;
        Ok(user.map(|user| AuthenticatedUser {
            user_id: user.id,
            pharmacy_id: user.pharmacy_id,
            role: user.role,
        }))
    }
}
