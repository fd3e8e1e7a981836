//! Save the LMS hostname and API token.

use crate::config::{config_path, Config, SyncContext};
use crate::error::{Error, Result};
use crate::gateway::{Gateway, HttpGateway, API};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct LoginOutput {
    hostname: String,
    user: String,
    path: PathBuf,
    saved: bool,
}

/// Execute the login command.
///
/// # Errors
///
/// Returns `AlreadyInitialized` if a login exists and `force` is not set, or
/// a remote error if the token is rejected.
pub fn execute(hostname: &str, token: &str, force: bool, ctx: &SyncContext, json: bool) -> Result<()> {
    let path = config_path()?;
    let config = Config::new(hostname, token);
    let gateway = HttpGateway::new(config.clone())?;
    let user = login(&path, &config, &gateway, force, ctx)?;

    if json {
        let output = LoginOutput {
            hostname: config.hostname,
            user,
            path,
            saved: !ctx.dry_run,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else if ctx.dry_run {
        println!("DRYRUN - save login for {user} on {} to {}", config.hostname, path.display());
    } else {
        println!("Logged in to {} as {user}", config.hostname);
        println!("  Saved: {}", path.display());
    }
    Ok(())
}

/// Verify the credentials and save them. Returns the remote user's name.
fn login(path: &Path, config: &Config, gateway: &dyn Gateway, force: bool, ctx: &SyncContext) -> Result<String> {
    if path.exists() && !force {
        return Err(Error::AlreadyInitialized {
            path: path.to_path_buf(),
        });
    }
    if config.hostname.is_empty() || config.token.is_empty() {
        return Err(Error::InvalidArgument("hostname and token must not be empty".to_string()));
    }

    let me = gateway.get(&format!("{API}/users/self"), &[])?;
    let user = me
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::UnexpectedResponse {
            item: "users/self".to_string(),
            body: me.to_string(),
        })?
        .to_string();

    if !ctx.dry_run {
        config.save_to(path)?;
    }
    Ok(user)
}
