//! Credential forwarding for remote calls.
//!
//! The tool does not manage authentication; it only hands libgit2 the
//! credentials the ambient setup already provides (SSH keys, the SSH agent,
//! git credential helpers).

use git2::{Cred, CredentialType, RemoteCallbacks};
use std::path::PathBuf;

/// libgit2 keeps asking while credentials are rejected; stop after this many.
const MAX_CREDENTIAL_ATTEMPTS: u32 = 6;

fn ssh_key_paths() -> Vec<PathBuf> {
    let Some(home) = dirs::home_dir() else {
        return Vec::new();
    };
    ["id_ed25519", "id_rsa", "id_ecdsa"]
        .iter()
        .map(|name| home.join(".ssh").join(name))
        .filter(|path| path.exists())
        .collect()
}

/// SSH credential to offer on the `step`-th SSH request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SshCandidate {
    /// Index into the key files found on disk
    Key(usize),
    Agent,
    Exhausted,
}

/// Each rejected offer moves on: key files in order, then the agent.
fn ssh_candidate(step: usize, key_count: usize) -> SshCandidate {
    match step {
        step if step < key_count => SshCandidate::Key(step),
        step if step == key_count => SshCandidate::Agent,
        _ => SshCandidate::Exhausted,
    }
}

/// Remote callbacks with the credential chain installed.
pub fn remote_callbacks<'a>() -> RemoteCallbacks<'a> {
    let mut callbacks = RemoteCallbacks::new();
    let mut attempts = 0u32;
    let mut ssh_step = 0usize;

    callbacks.credentials(move |url, username_from_url, allowed_types| {
        attempts += 1;
        if attempts > MAX_CREDENTIAL_ATTEMPTS {
            return Err(git2::Error::from_str(&format!(
                "authentication to {} failed: no usable credentials",
                url
            )));
        }

        let username = username_from_url.unwrap_or("git");

        if allowed_types.contains(CredentialType::SSH_KEY) {
            let keys = ssh_key_paths();
            loop {
                let candidate = ssh_candidate(ssh_step, keys.len());
                ssh_step += 1;
                let cred = match candidate {
                    SshCandidate::Key(index) => Cred::ssh_key(username, None, &keys[index], None),
                    SshCandidate::Agent => Cred::ssh_key_from_agent(username),
                    SshCandidate::Exhausted => break,
                };
                if let Ok(cred) = cred {
                    return Ok(cred);
                }
            }
        }

        if allowed_types.contains(CredentialType::USER_PASS_PLAINTEXT) {
            if let Ok(config) = git2::Config::open_default() {
                if let Ok(cred) = Cred::credential_helper(&config, url, username_from_url) {
                    return Ok(cred);
                }
            }
        }

        if allowed_types.contains(CredentialType::USERNAME) {
            return Cred::username(username);
        }

        Cred::default()
    });

    callbacks
}
