//! Process-wide, read-only state shared by every request.

use crate::{
    config::AppConfig,
    models::alias::BucketAliases,
    origin::RequestOrigin,
    services::{
        oauth_service::GoogleOAuthClient, object_store::ObjectStore, session_service::SessionGate,
    },
};
use axum::http::{HeaderMap, Uri};
use std::{fmt, sync::Arc};

/// Settings the handlers read but never change.
#[derive(Debug, Clone)]
pub struct ProxySettings {
    /// Shown on the informational page served when no alias matches.
    pub instance_name: String,
    /// Appended to keys that end in `/`.
    pub index_document: Option<String>,
    /// Used for absolute URLs when a request carries no `Host`.
    pub fallback_host: String,
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ObjectStore>,
    pub aliases: Arc<BucketAliases>,
    pub sessions: SessionGate,
    pub oauth: GoogleOAuthClient,
    pub settings: Arc<ProxySettings>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("aliases", &self.aliases)
            .field("sessions", &self.sessions)
            .field("oauth", &self.oauth)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(cfg: &AppConfig, store: Arc<dyn ObjectStore>) -> Self {
        let oauth = &cfg.oauth;
        Self {
            store,
            aliases: Arc::new(cfg.aliases()),
            sessions: SessionGate::new(
                &oauth.session_secret,
                oauth.allowed_hosted_domains.iter().cloned(),
                oauth.session_max_age_secs,
            ),
            oauth: GoogleOAuthClient::new(
                oauth.client_id.clone(),
                oauth.client_secret.clone(),
                oauth.endpoints(),
            ),
            settings: Arc::new(ProxySettings {
                instance_name: cfg.instance_name.clone(),
                index_document: cfg.store.index_document.clone(),
                fallback_host: cfg.addr(),
            }),
        }
    }

    pub fn origin(&self, headers: &HeaderMap, uri: &Uri) -> RequestOrigin {
        RequestOrigin::from_request(headers, uri, &self.settings.fallback_host)
    }
}
