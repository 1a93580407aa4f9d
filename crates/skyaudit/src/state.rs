// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::audit::OperationRegistry;
use crate::config::Config;
use crate::credential::broker::CredentialBroker;
use crate::credential::federation::{CredentialExchange, StsExchange};
use crate::credential::oidc::{IdentityProvider, OidcClient};
use crate::login::LoginFlow;
use crate::notify::Notifier;
use crate::settings::{Settings, SettingsUpdate};
use crate::task::clock::Dispatcher;
use crate::task::executor::JobExecutor;
use crate::task::scheduler::TaskScheduler;

/// Collaborators the service is assembled from.
pub struct Services {
    pub provider: Arc<dyn IdentityProvider>,
    pub exchange: Arc<dyn CredentialExchange>,
    pub notifier: Arc<dyn Notifier>,
    pub registry: OperationRegistry,
}

/// Shared service state. Each component guards its own data; nothing here
/// holds a lock spanning more than one of them.
pub struct AppState {
    pub config: Config,
    pub settings: RwLock<Settings>,
    pub http: reqwest::Client,
    pub broker: Arc<CredentialBroker>,
    pub login: Arc<LoginFlow>,
    pub scheduler: Arc<TaskScheduler>,
    pub executor: Arc<JobExecutor>,
    pub dispatcher: Arc<Dispatcher>,
    pub shutdown: CancellationToken,
    settings_write: Mutex<()>,
}

impl AppState {
    pub fn new(
        config: Config,
        settings: Settings,
        http: reqwest::Client,
        services: Services,
        shutdown: CancellationToken,
    ) -> anyhow::Result<Arc<Self>> {
        let broker = Arc::new(CredentialBroker::new(services.provider, services.exchange)?);
        let login = Arc::new(LoginFlow::new(
            Arc::clone(&broker),
            settings.identity.account_claim.clone(),
            config.login_ttl(),
        ));
        let scheduler = Arc::new(TaskScheduler::new(services.registry));
        let executor = Arc::new(JobExecutor::new(Arc::clone(&broker), services.notifier));
        let dispatcher = Dispatcher::new(Arc::clone(&scheduler), Arc::clone(&executor));

        Ok(Arc::new(Self {
            config,
            settings: RwLock::new(settings),
            http,
            broker,
            login,
            scheduler,
            executor,
            dispatcher,
            shutdown,
            settings_write: Mutex::new(()),
        }))
    }

    /// Create every task the settings file declares. Invalid entries are
    /// logged and skipped.
    pub async fn load_tasks(&self) -> usize {
        let specs = self.settings.read().await.tasks.clone();
        let mut created = 0;
        for spec in specs {
            let name = spec.name.clone();
            match self.scheduler.create(spec).await {
                Ok(_) => created += 1,
                Err(e) => tracing::warn!(task = %name, err = %e, "skipping configured task"),
            }
        }
        created
    }

    /// Validate, rediscover the provider, swap the live collaborators and
    /// persist the file. Returns the new settings, redacted.
    pub async fn update_settings(&self, update: SettingsUpdate) -> anyhow::Result<Settings> {
        let _write = self.settings_write.lock().await;
        let next = self.settings.read().await.apply(update);
        next.validate()?;

        let provider = OidcClient::discover(self.http.clone(), &next.identity).await?;
        crate::settings::save(&self.config.config, &next)?;

        self.broker.set_provider(Arc::new(provider)).await;
        self.broker.set_exchange(Arc::new(StsExchange::new(&next.federation))).await;
        self.login.set_account_claim(next.identity.account_claim.clone()).await;
        self.executor.set_notifier(crate::notify::from_settings(&self.http, &next.slack)).await;

        let redacted = next.redacted();
        *self.settings.write().await = next;
        tracing::info!(provider = %redacted.identity.provider_url, "settings updated");
        Ok(redacted)
    }
}
