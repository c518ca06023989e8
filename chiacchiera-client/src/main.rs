use anyhow::Context;
use chiacchiera_client::{ChatStores, ExecutionContext, SessionHolder};
use tracing::info;
use tracing_subscriber::EnvFilter;

// Segue in tempo reale utente, conversazioni e profili della sessione salvata nel cookie.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let base_url =
        std::env::var("POCKETBASE_URL").unwrap_or_else(|_| "http://127.0.0.1:8090".to_string());
    let cookie = std::env::var("PB_AUTH_COOKIE")
        .context("PB_AUTH_COOKIE must contain the pb_auth cookie")?;

    let session = SessionHolder::connect(ExecutionContext::Client, &base_url, &cookie)
        .context("create backend client")?;
    let stores = ChatStores::spawn(&session);

    let mut user = stores.user.watch();
    let mut conversations = stores.conversations.watch();
    let mut profiles = stores.profiles.watch();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = user.changed() => {
                changed.context("user store stopped")?;
                match &*user.borrow_and_update() {
                    Some(user) => info!("signed in as {} ({})", user.display_name(), user.id),
                    None => info!("no user"),
                }
            }
            changed = conversations.changed() => {
                changed.context("conversation store stopped")?;
                if let Some(list) = &*conversations.borrow_and_update() {
                    for conversation in list {
                        info!(
                            "conversation {} - {} members, {} messages",
                            conversation.id,
                            conversation.members.len(),
                            conversation.messages.len()
                        );
                    }
                }
            }
            changed = profiles.changed() => {
                changed.context("profile cache stopped")?;
                info!("{} member profiles cached", profiles.borrow_and_update().len());
            }
        }
    }

    info!("shutting down");
    Ok(())
}
