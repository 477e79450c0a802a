//! Login command: save the profile config and establish a session.

use std::error::Error;

use crate::config::{Config, DEFAULT_SERVICE};

/// Runs the login command.
pub fn run(
    profile: Option<&str>,
    identifier: String,
    secret: String,
    service: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let config = Config {
        service: service.unwrap_or_else(|| DEFAULT_SERVICE.to_string()),
        stream_service: None,
        identifier,
        secret,
    };

    let path = config.save(profile)?;

    // Establish a session right away so a typo'd secret fails loudly
    // here instead of on the first real command.
    let session = super::open_session(&config)?;
    let credential = session.acquire()?;

    println!("logged in as {} ({})", credential.handle, credential.account);
    println!("profile saved to {}", path.display());
    Ok(())
}
