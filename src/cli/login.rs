//! CLI command handlers for `login` and `config`.

use tokio::sync::broadcast::error::RecvError;

use super::LoginArgs;
use crate::auth::{AuthError, AuthEvent, DeviceAuthFlow, DeviceAuthResult, StartOutcome};
use crate::config::PlayKitConfig;

/// Handle `playkit-auth login`.
pub async fn handle_login(args: LoginArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = apply_login_args(PlayKitConfig::load()?, &args);
    let game_id = config.require_game_id()?.to_string();

    let flow = DeviceAuthFlow::new(&config)?;
    let mut events = flow.subscribe();
    if flow.start(game_id, config.scope()).await? == StartOutcome::AlreadyActive {
        return Err(AuthError::AlreadyActive.into());
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let result = loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(AuthEvent::AuthUrlReady { verification_uri, user_code }) => {
                    eprintln!("🔗 Visit: {verification_uri}");
                    eprintln!("📋 Enter code: {user_code}");
                    eprintln!("⏳ Waiting for authorization...");
                }
                Ok(AuthEvent::StatusChanged { old, new }) => {
                    tracing::debug!(%old, %new, "Status changed");
                }
                Ok(AuthEvent::Success(result)) => break result,
                Ok(AuthEvent::Error { code, message }) => {
                    return Err(AuthError::Flow { code, message }.into());
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return Err(AuthError::FlowClosed.into()),
            },
            _ = &mut ctrl_c => {
                flow.cancel().await?;
                eprintln!("❌ Login cancelled");
                return Err(AuthError::Cancelled.into());
            }
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }
    Ok(())
}

/// Handle `playkit-auth config`.
pub async fn handle_config() -> Result<(), Box<dyn std::error::Error>> {
    let path = PlayKitConfig::default_settings_path();
    let config = PlayKitConfig::load_from(&path)?;

    println!("⚙️  PlayKit configuration\n");
    let file_state = if path.exists() { "" } else { " (not found)" };
    println!("  settings file:       {}{file_state}", path.display());
    println!("  base_url:            {}", config.base_url());
    println!("  game_id:             {}", config.game_id().unwrap_or("❌ Not set"));
    println!("  scope:               {}", config.scope());
    println!("  request_timeout:     {}s", config.request_timeout().as_secs());
    println!("  open_browser:        {}", config.open_browser());
    println!("  slow_down_increment: {}s", config.slow_down_increment().as_secs());
    Ok(())
}

/// Command-line flags take precedence over file and environment.
fn apply_login_args(mut config: PlayKitConfig, args: &LoginArgs) -> PlayKitConfig {
    if let Some(url) = &args.base_url {
        config = config.with_base_url(url.as_str());
    }
    if let Some(game_id) = &args.game_id {
        config = config.with_game_id(game_id.as_str());
    }
    if let Some(scope) = &args.scope {
        config = config.with_scope(scope.as_str());
    }
    if args.no_browser {
        config = config.with_open_browser(false);
    }
    config
}

fn print_result(result: &DeviceAuthResult) {
    println!("✅ PlayKit login successful!");
    println!("   User: {}", result.user_id);
    println!("   Player token: {}", result.player_token);
    println!(
        "   Expires: {}",
        result.player_token_expires_at().format("%Y-%m-%d %H:%M UTC")
    );
}
