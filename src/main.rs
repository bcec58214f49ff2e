use assessment_portal::{
    config::{get_config, init_config},
    models::profile::Role,
    services::listing_service::StatusFilter,
    utils::time::now,
    Portal,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if std::env::var("PORTAL_LOG_FORMAT").map_or(false, |v| v.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    init_config()?;
    let config = get_config()?.clone();
    let role = config.role;

    let portal = Portal::new(config.clone()).await?;

    {
        let mut events = portal.feed.subscribe();
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                info!(?event, "portal event");
            }
        });
    }

    let signed_in = match portal.auth_service.resume().await {
        Some(session) if session.role == role => Some(session),
        _ => match (&config.email, &config.password) {
            (Some(email), Some(password)) => {
                let result = match role {
                    Role::Staff => portal.auth_service.staff_login(email, password).await,
                    Role::Student => portal.auth_service.student_login(email, password).await,
                };
                match result {
                    Ok(session) => Some(session),
                    Err(e) => {
                        warn!(error = %e, "login failed");
                        anyhow::bail!(e.notice());
                    }
                }
            }
            _ => None,
        },
    };
    let Some(session) = signed_in else {
        anyhow::bail!("No stored session. Set PORTAL_EMAIL and PORTAL_PASSWORD to sign in.");
    };
    info!(name = %session.name, %role, "session ready");

    let _ticker = match role {
        Role::Staff => {
            let dashboard = portal
                .test_service
                .dashboard(StatusFilter::All, "", 1, now())
                .await?;
            println!("{}", serde_json::to_string_pretty(&dashboard)?);

            let tests = portal.test_service.all_tests().await?;
            portal.status_ticker.watch(tests, now()).await;
            portal.status_ticker.clone().spawn()
        }
        Role::Student => {
            let profile = portal.profile_service.student_profile().await?;
            let dashboard = portal.student_service.dashboard(&profile.regno, now()).await?;
            println!("{}", serde_json::to_string_pretty(&dashboard)?);

            let tests = dashboard
                .ongoing
                .iter()
                .map(|card| card.assessment.clone())
                .collect();
            portal.status_ticker.watch(tests, now()).await;
            portal.status_ticker.clone().spawn()
        }
    };
    let _refresh = portal
        .profile_service
        .clone()
        .spawn_refresh(role, config.profile_poll_interval);

    if let Ok(Some(avatar)) = portal.profile_service.avatar(role).await {
        info!(len = avatar.len(), "avatar resolved");
    }

    info!("watching for changes, press Ctrl+C to exit");
    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    Ok(())
}
