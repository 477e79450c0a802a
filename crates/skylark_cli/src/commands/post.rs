//! Post command: create a post, optionally as a reply.

use std::error::Error;

use skylark_proto::{collections, PostRecord, Record};

use crate::config::Config;

/// Runs the post command.
pub fn run(config: &Config, text: String, reply_to: Option<String>) -> Result<(), Box<dyn Error>> {
    if text.trim().is_empty() {
        return Err("post text must not be empty".into());
    }

    let session = super::open_session(config)?;
    let credential = session.acquire()?;
    let rpc = session.rpc();

    let record = match reply_to {
        Some(uri) => {
            // The reply's root follows the target's declared root when
            // the target is itself a reply; else the target is the root.
            let (target_ref, target_record) = rpc.get_record(&credential, &uri)?;
            let target_reply = target_record.as_post().and_then(|post| post.reply.clone());
            Record::Post(PostRecord::reply_to(
                text,
                super::now_timestamp(),
                target_ref,
                target_reply.as_ref(),
            ))
        }
        None => Record::Post(PostRecord::new(text, super::now_timestamp())),
    };

    let reference = rpc.create_record(&credential, collections::POST, &record)?;
    println!("{}", reference.uri);
    Ok(())
}
