//! Profile command: show an account's profile view.

use std::error::Error;

use serde_json::json;

use crate::config::Config;

/// Runs the profile command. With no actor, shows the caller's own
/// profile.
pub fn run(config: &Config, actor: Option<String>, as_json: bool) -> Result<(), Box<dyn Error>> {
    let session = super::open_session(config)?;
    let credential = session.acquire()?;
    let rpc = session.rpc();

    let actor = actor.unwrap_or_else(|| credential.handle.clone());
    let profile = rpc.get_profile(&credential, &actor)?;

    if as_json {
        let rendered = json!({
            "account": profile.account,
            "handle": profile.handle,
            "displayName": profile.display_name,
            "description": profile.description,
            "followers": profile.followers,
            "follows": profile.follows,
        });
        println!("{}", serde_json::to_string_pretty(&rendered)?);
        return Ok(());
    }

    println!("{} ({})", profile.handle, profile.account);
    if let Some(name) = profile.display_name {
        println!("name: {name}");
    }
    if let Some(description) = profile.description {
        println!("{description}");
    }
    println!("followers: {}  follows: {}", profile.followers, profile.follows);
    Ok(())
}
