use dashboard_billing::{App, AppContext, ConfigBuilder};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConfigBuilder::new().from_env().build()?;
    dashboard_billing::init_tracing_with_config(&config);

    let context = AppContext::from_config(&config).await?;
    tracing::info!(
        tiers = context.catalog.len(),
        usage_backend = ?config.usage.backend,
        "Billing dashboard configured"
    );

    App::new(config, context).serve().await?;
    Ok(())
}
