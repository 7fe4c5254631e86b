use anyhow::Context;
use eshtarek::{App, AppContext, ConfigBuilder, storage::InMemoryStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConfigBuilder::new()
        .from_env()
        .build()
        .context("invalid configuration")?;

    eshtarek::init_tracing_with_config(&config);

    let context = AppContext::from_config(&config, InMemoryStore::new()).context("failed to build application context")?;

    if let Some(admin) = context.accounts.bootstrap(&config.bootstrap).await? {
        tracing::info!(username = %admin.user.username, tenant = %admin.tenant.name, "platform admin ready");
    }

    App::new(config, context).serve().await?;
    Ok(())
}
