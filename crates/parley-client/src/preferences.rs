//! User preferences held in an explicit context value.
//!
//! UI code receives a [`PreferencesContext`] instead of reading globals.
//! Local persistence goes through [`PreferenceStorage`]; an optional
//! [`RemoteSync`] mirrors changes to the server.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use parley_types::{UNSUPPORTED_MODEL_MESSAGE, is_supported_model};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use tracing::{debug, warn};

use crate::error::ClientError;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    /// Follow the operating system.
    #[default]
    System,
}

impl Theme {
    /// The concrete theme to render, given the system's dark-mode setting.
    pub fn resolve(self, system_prefers_dark: bool) -> Theme {
        match self {
            Theme::System if system_prefers_dark => Theme::Dark,
            Theme::System => Theme::Light,
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub model: String,
    pub theme: Theme,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_owned(),
            theme: Theme::default(),
        }
    }
}

/// Device-local persistence.
pub trait PreferenceStorage: Send + Sync {
    fn load(&self) -> Result<Option<Preferences>, ClientError>;
    fn save(&self, preferences: &Preferences) -> Result<(), ClientError>;
}

/// Pull/push pair for keeping preferences in sync with a remote copy.
#[async_trait]
pub trait RemoteSync: Send + Sync {
    async fn pull(&self) -> Result<Option<Preferences>, ClientError>;
    async fn push(&self, preferences: &Preferences) -> Result<(), ClientError>;
}

#[derive(Debug, Default)]
pub struct MemoryPreferenceStorage {
    slot: Mutex<Option<Preferences>>,
}

impl PreferenceStorage for MemoryPreferenceStorage {
    fn load(&self) -> Result<Option<Preferences>, ClientError> {
        Ok(self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, preferences: &Preferences) -> Result<(), ClientError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(preferences.clone());
        Ok(())
    }
}

pub struct PreferencesContext<S> {
    current: Preferences,
    storage: S,
    remote: Option<Arc<dyn RemoteSync>>,
}

impl<S: PreferenceStorage> PreferencesContext<S> {
    /// Start from local storage (or defaults), then let the remote copy win
    /// when it is reachable.
    pub async fn load(storage: S, remote: Option<Arc<dyn RemoteSync>>) -> Self {
        let mut current = match storage.load() {
            Ok(Some(p)) => p,
            Ok(None) => Preferences::default(),
            Err(e) => {
                warn!(error = %e, "local preferences unreadable; using defaults");
                Preferences::default()
            }
        };

        if let Some(remote) = &remote {
            match remote.pull().await {
                Ok(Some(pulled)) if pulled != current => {
                    debug!(model = %pulled.model, theme = %pulled.theme, "remote preferences applied");
                    current = pulled;
                    if let Err(e) = storage.save(&current) {
                        warn!(error = %e, "failed to cache remote preferences locally");
                    }
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "remote preferences unavailable; keeping local copy"),
            }
        }

        Self {
            current,
            storage,
            remote,
        }
    }

    pub fn get(&self) -> &Preferences {
        &self.current
    }

    pub fn theme(&self) -> Theme {
        self.current.theme
    }

    pub fn model(&self) -> &str {
        &self.current.model
    }

    pub async fn set_theme(&mut self, theme: Theme) -> Result<(), ClientError> {
        let mut next = self.current.clone();
        next.theme = theme;
        self.apply(next).await
    }

    pub async fn set_model(&mut self, model: &str) -> Result<(), ClientError> {
        if !is_supported_model(model) {
            return Err(ClientError::Invalid(UNSUPPORTED_MODEL_MESSAGE.to_owned()));
        }
        let mut next = self.current.clone();
        next.model = model.to_owned();
        self.apply(next).await
    }

    /// Save locally first; a failed remote push is logged and the local
    /// change kept.
    async fn apply(&mut self, next: Preferences) -> Result<(), ClientError> {
        self.storage.save(&next)?;
        self.current = next;
        if let Some(remote) = &self.remote {
            if let Err(e) = remote.push(&self.current).await {
                warn!(error = %e, "failed to push preferences");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Remote {
        stored: Mutex<Option<Preferences>>,
        pushes: AtomicUsize,
        offline: bool,
    }

    #[async_trait]
    impl RemoteSync for Remote {
        async fn pull(&self) -> Result<Option<Preferences>, ClientError> {
            if self.offline {
                return Err(ClientError::Status {
                    status: 503,
                    message: "offline".into(),
                });
            }
            Ok(self.stored.lock().unwrap().clone())
        }

        async fn push(&self, preferences: &Preferences) -> Result<(), ClientError> {
            self.pushes.fetch_add(1, Ordering::SeqCst);
            if self.offline {
                return Err(ClientError::Status {
                    status: 503,
                    message: "offline".into(),
                });
            }
            *self.stored.lock().unwrap() = Some(preferences.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn defaults_without_any_storage() {
        let ctx = PreferencesContext::load(MemoryPreferenceStorage::default(), None).await;
        assert_eq!(ctx.get(), &Preferences::default());
        assert_eq!(ctx.theme().resolve(true), Theme::Dark);
        assert_eq!(ctx.theme().resolve(false), Theme::Light);
    }

    #[tokio::test]
    async fn remote_copy_wins_and_is_cached() {
        let remote = Arc::new(Remote::default());
        *remote.stored.lock().unwrap() = Some(Preferences {
            model: "gemini-1.5-pro".into(),
            theme: Theme::Dark,
        });
        let local = MemoryPreferenceStorage::default();
        local.save(&Preferences::default()).unwrap();

        let ctx = PreferencesContext::load(local, Some(remote.clone())).await;
        assert_eq!(ctx.model(), "gemini-1.5-pro");
        assert_eq!(ctx.storage.load().unwrap().unwrap().theme, Theme::Dark);
    }

    #[tokio::test]
    async fn changes_are_saved_and_pushed() {
        let remote = Arc::new(Remote::default());
        let mut ctx =
            PreferencesContext::load(MemoryPreferenceStorage::default(), Some(remote.clone())).await;

        ctx.set_theme(Theme::Light).await.unwrap();
        ctx.set_model("gemini-2.5-pro").await.unwrap();

        assert_eq!(remote.pushes.load(Ordering::SeqCst), 2);
        let pushed = remote.stored.lock().unwrap().clone().unwrap();
        assert_eq!(pushed.theme, Theme::Light);
        assert_eq!(pushed.model, "gemini-2.5-pro");
        assert_eq!(ctx.storage.load().unwrap().unwrap(), pushed);
    }

    #[tokio::test]
    async fn offline_remote_keeps_local_changes() {
        let remote = Arc::new(Remote {
            offline: true,
            ..Default::default()
        });
        let mut ctx =
            PreferencesContext::load(MemoryPreferenceStorage::default(), Some(remote.clone())).await;
        ctx.set_theme(Theme::Dark).await.unwrap();
        assert_eq!(ctx.theme(), Theme::Dark);
    }

    #[tokio::test]
    async fn rejects_unsupported_model() {
        let mut ctx = PreferencesContext::load(MemoryPreferenceStorage::default(), None).await;
        assert!(ctx.set_model("gpt-4").await.is_err());
        assert_eq!(ctx.model(), DEFAULT_MODEL);
    }
}
