use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::settings::{Secrets, Settings};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Composition root. Every component is built once here and shared.
pub struct Server {
    pub authentication_gate: Arc<dyn AuthenticationGate>,
    pub refresh_ttl: Duration,
    pub secure_cookie: bool,
    pub dev_login: bool,
    sweeper_handle: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl Server {
    pub async fn try_new(settings: &Settings, secrets: Secrets) -> anyhow::Result<Self> {
        Self::with_clock(settings, secrets, Arc::new(SystemClock)).await
    }

    pub async fn with_clock(
        settings: &Settings,
        secrets: Secrets,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let access_ttl = settings.auth.access_ttl()?;
        let refresh_ttl = settings.auth.refresh_ttl()?;
        if access_ttl >= refresh_ttl {
            warn!(?access_ttl, ?refresh_ttl, "access TTL is not shorter than refresh TTL");
        }

        let token_codec = Arc::new(JwtTokenCodec::try_new(
            JwtConfig {
                issuer: settings.auth.issuer.clone(),
                audience: settings.auth.audience.clone(),
                access_ttl,
                refresh_ttl,
                leeway: settings.auth.leeway(),
                access_secret: secrets.access_secret,
                refresh_secret: secrets.refresh_secret,
            },
            clock.clone(),
        )?);

        let cancel = CancellationToken::new();
        let mut sweeper_handle = None;

        let session_store: Arc<dyn SessionStore> = match settings.session_store.backend.as_str() {
            "memory" => {
                let store = Arc::new(MemorySessionStore::new(clock.clone()));
                sweeper_handle = Some(
                    store
                        .clone()
                        .spawn_sweeper(settings.session_store.sweep_interval(), cancel.clone()),
                );
                store
            }
            "redis" => {
                let url = settings
                    .session_store
                    .redis_url
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("session_store.redis_url is required"))?;
                Arc::new(
                    RedisSessionStore::connect(url, settings.session_store.key_prefix.clone())
                        .await?,
                )
            }
            other => return Err(anyhow::anyhow!("Unknown session store backend: {}", other)),
        };

        let authentication_gate: Arc<dyn AuthenticationGate> =
            Arc::new(RealAuthenticationGate::new(
                token_codec.clone(),
                token_codec,
                session_store,
                clock,
                refresh_ttl,
                settings.session_store.timeout(),
            ));

        info!(
            backend = %settings.session_store.backend,
            ?access_ttl,
            ?refresh_ttl,
            "server started"
        );

        Ok(Self {
            authentication_gate,
            refresh_ttl,
            secure_cookie: settings.http.secure_cookie,
            dev_login: settings.http.dev_login,
            sweeper_handle: Mutex::new(sweeper_handle),
            cancel,
        })
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        self.cancel.cancel();

        let handle = match self.sweeper_handle.lock() {
            Ok(mut lock) => lock.take(),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            let r = handle.await;
            info!("sweeper handle dropped: {:?}", r);
        }
    }
}
