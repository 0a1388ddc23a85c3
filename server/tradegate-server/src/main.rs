use anyhow::{Context, Result};
use auth_identity::{
    InMemoryIdentityStore, OrganizationType, Principal, PrincipalStatus, PrincipalType,
};
use std::sync::Arc;
use tradegate_server::{create_app, GatewayConfig, GatewayServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tradegate_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = GatewayConfig::from_env();
    if config.development_mode {
        tracing::warn!("running in development mode; error detail is exposed to clients");
    }

    let identity = InMemoryIdentityStore::new();
    if config.development_mode {
        seed_dev_accounts(&identity).await?;
    }

    let development_mode = config.development_mode;
    let server = GatewayServer::new(config, Arc::new(identity));
    server.spawn_sweepers();

    let app = create_app(server);

    let addr = std::env::var("TRADEGATE_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    tracing::info!(addr = %addr, development = development_mode, "tradegate listening");
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// Development-only accounts, one per dashboard area.
async fn seed_dev_accounts(identity: &InMemoryIdentityStore) -> Result<()> {
    let accounts = [
        (
            PrincipalType::Admin,
            "super_admin",
            None,
            "root@tradegate.dev",
        ),
        (
            PrincipalType::OrgUser,
            "company_admin",
            Some(OrganizationType::Manufacturer),
            "maker@tradegate.dev",
        ),
        (
            PrincipalType::OrgUser,
            "company_admin",
            Some(OrganizationType::Distributor),
            "dist@tradegate.dev",
        ),
    ];

    for (principal_type, role, organization_type, identifier) in accounts {
        let principal = Principal {
            id: Uuid::new_v4(),
            principal_type,
            role: role.to_string(),
            organization_type,
            permissions: vec![],
            status: PrincipalStatus::Active,
        };
        identity
            .seed(principal, identifier, "devpassword")
            .await
            .context("Failed to seed development account")?;
        tracing::info!(identifier = %identifier, role = %role, "seeded development account");
    }
    Ok(())
}
