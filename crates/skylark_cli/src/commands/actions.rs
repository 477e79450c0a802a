//! One-shot repository actions: like, repost, follow, delete.

use std::error::Error;

use skylark_proto::{collections, FollowRecord, LikeRecord, Record, RepostRecord};

use crate::config::Config;

/// Likes each of the given post URIs.
pub fn like(config: &Config, uris: &[String]) -> Result<(), Box<dyn Error>> {
    let session = super::open_session(config)?;
    let credential = session.acquire()?;
    let rpc = session.rpc();

    for uri in uris {
        let (subject, _) = rpc.get_record(&credential, uri)?;
        let record = Record::Like(LikeRecord {
            subject,
            created_at: super::now_timestamp(),
        });
        let reference = rpc.create_record(&credential, collections::LIKE, &record)?;
        println!("{}", reference.uri);
    }
    Ok(())
}

/// Reposts each of the given post URIs.
pub fn repost(config: &Config, uris: &[String]) -> Result<(), Box<dyn Error>> {
    let session = super::open_session(config)?;
    let credential = session.acquire()?;
    let rpc = session.rpc();

    for uri in uris {
        let (subject, _) = rpc.get_record(&credential, uri)?;
        let record = Record::Repost(RepostRecord {
            subject,
            created_at: super::now_timestamp(),
        });
        let reference = rpc.create_record(&credential, collections::REPOST, &record)?;
        println!("{}", reference.uri);
    }
    Ok(())
}

/// Follows each of the given accounts.
pub fn follow(config: &Config, accounts: &[String]) -> Result<(), Box<dyn Error>> {
    let session = super::open_session(config)?;
    let credential = session.acquire()?;
    let rpc = session.rpc();

    for account in accounts {
        let record = Record::Follow(FollowRecord {
            subject: account.clone(),
            created_at: super::now_timestamp(),
        });
        let reference = rpc.create_record(&credential, collections::FOLLOW, &record)?;
        println!("{}", reference.uri);
    }
    Ok(())
}

/// Deletes each of the given record URIs from the caller's repository.
pub fn delete(config: &Config, uris: &[String]) -> Result<(), Box<dyn Error>> {
    let session = super::open_session(config)?;
    let credential = session.acquire()?;
    let rpc = session.rpc();

    for uri in uris {
        rpc.delete_record(&credential, uri)?;
        println!("deleted {uri}");
    }
    Ok(())
}
