use std::sync::Arc;

use epicerie_agent::llm::LlmClient;
use epicerie_agent::runtime::{AssistantRuntime, RuntimeSettings};
use epicerie_agent::tools::ToolSettings;
use epicerie_core::cart::{CartEngine, CartObserver};
use epicerie_core::catalog::{Catalog, CatalogError};
use epicerie_core::config::{AppConfig, ConfigError, LoadOptions};
use epicerie_core::domain::cart::CartEvent;
use epicerie_core::session::SessionClock;
use epicerie_core::storefront::Storefront;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

pub type SharedStorefront = Arc<Mutex<Storefront>>;

pub struct Application {
    pub config: AppConfig,
    pub storefront: SharedStorefront,
    pub tool_settings: ToolSettings,
    pub assistant: Option<Arc<AssistantRuntime>>,
}

impl Application {
    /// Wires a conversational backend behind `POST /api/chat`, using the
    /// `[assistant]` limits from the loaded config.
    pub fn with_assistant(mut self, client: Arc<dyn LlmClient>) -> Self {
        let settings = RuntimeSettings::from(&self.config.assistant);
        self.assistant = Some(Arc::new(AssistantRuntime::new(client, settings)));
        self
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("catalog load failed: {0}")]
    Catalog(#[from] CatalogError),
}

/// Logs every effective cart mutation.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingCartObserver;

impl CartObserver for TracingCartObserver {
    fn cart_changed(&self, event: &CartEvent) {
        let item_id = event.item_id().map(|item_id| item_id.0);
        match event {
            CartEvent::ItemAdded { added, quantity, .. } => info!(
                event_name = event.event_name(),
                item_id = ?item_id,
                added = *added,
                quantity = *quantity,
                "cart item added"
            ),
            CartEvent::QuantityUpdated { from, to, .. } => info!(
                event_name = event.event_name(),
                item_id = ?item_id,
                from = *from,
                to = *to,
                "cart quantity updated"
            ),
            CartEvent::ItemRemoved { quantity, .. } => info!(
                event_name = event.event_name(),
                item_id = ?item_id,
                quantity = *quantity,
                "cart item removed"
            ),
            CartEvent::Cleared { lines } => info!(
                event_name = event.event_name(),
                lines = *lines,
                "cart cleared"
            ),
        }
    }
}

pub fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config)
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let catalog = Arc::new(Catalog::load_or_builtin(config.catalog.path.as_deref())?);
    info!(
        event_name = "system.bootstrap.catalog_loaded",
        correlation_id = "bootstrap",
        items = catalog.len(),
        source = if config.catalog.path.is_some() { "file" } else { "builtin" },
        "catalog loaded"
    );

    let mut cart = CartEngine::new(catalog);
    cart.subscribe(Arc::new(TracingCartObserver));
    let storefront = Storefront::new(cart, SessionClock::system(), config.perfect_cart());

    Ok(Application {
        tool_settings: ToolSettings::from(&config.assistant),
        storefront: Arc::new(Mutex::new(storefront)),
        assistant: None,
        config,
    })
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Arc;

    use anyhow::Result;
    use async_trait::async_trait;
    use epicerie_agent::llm::{BackendStep, CompletionRequest, LlmClient};
    use epicerie_core::config::{ConfigOverrides, LoadOptions};
    use epicerie_core::domain::product::ItemId;
    use tempfile::TempDir;

    use crate::bootstrap::{bootstrap, BootstrapError};

    #[tokio::test]
    async fn bootstrap_uses_builtin_catalog_by_default() {
        let app = bootstrap(LoadOptions {
            config_path: Some(PathBuf::from("does-not-exist/epicerie.toml")),
            ..LoadOptions::default()
        })
        .expect("bootstrap with defaults");

        let storefront = app.storefront.lock().await;
        assert_eq!(storefront.catalog().len(), 30);
        assert_eq!(storefront.perfect_cart().len(), 7);
        assert_eq!(app.tool_settings.default_show_limit, 10);
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_on_invalid_catalog() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("catalog.json");
        fs::write(
            &path,
            r#"[{"id":0,"name":"x","description":"","price_eur":"1","weight_or_count":"","image":"","category":"c"}]"#,
        )
        .expect("write catalog");

        let result = bootstrap(LoadOptions {
            config_path: Some(PathBuf::from("does-not-exist/epicerie.toml")),
            overrides: ConfigOverrides { catalog_path: Some(path), ..ConfigOverrides::default() },
            ..LoadOptions::default()
        });

        assert!(matches!(result, Err(BootstrapError::Catalog(_))));
    }

    #[tokio::test]
    async fn perfect_cart_override_reaches_the_storefront() {
        let app = bootstrap(LoadOptions {
            config_path: Some(PathBuf::from("does-not-exist/epicerie.toml")),
            overrides: ConfigOverrides {
                perfect_cart: Some(vec![4, 7]),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .expect("bootstrap with override");

        let mut storefront = app.storefront.lock().await;
        storefront.cart_mut().add_item(ItemId(4), 1);
        storefront.cart_mut().add_item(ItemId(7), 1);
        assert_eq!(storefront.checkout().score.percentage, 100);
    }

    struct SilentBackend;

    #[async_trait]
    impl LlmClient for SilentBackend {
        async fn next_step(&self, _request: &CompletionRequest) -> Result<BackendStep> {
            Ok(BackendStep::text(""))
        }
    }

    #[tokio::test]
    async fn assistant_is_opt_in_and_follows_config_limits() {
        let app = bootstrap(LoadOptions {
            config_path: Some(PathBuf::from("does-not-exist/epicerie.toml")),
            ..LoadOptions::default()
        })
        .expect("bootstrap with defaults");
        assert!(app.assistant.is_none());

        let mut app = app;
        app.config.assistant.max_tool_steps = 2;
        let app = app.with_assistant(Arc::new(SilentBackend));

        let runtime = app.assistant.expect("assistant wired");
        assert_eq!(runtime.settings().max_tool_steps, 2);
    }
}
