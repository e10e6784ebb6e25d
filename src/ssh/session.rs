//! Key installation over SSH with libssh2.
//!
//! Host keys are not checked: the workflow onboards machines the operator has
//! only a password for. The SHA-256 host key hash is logged at debug level.

use crate::ssh::keys::GeneratedKey;
use crate::ssh::onboard::SshServerRecord;
use crate::utils::errors::{Result, VaultCliError};
use ssh2::{HashType, Session};
use std::io::Read;
use std::net::TcpStream;

const SSH_DIR_SETUP: &str = "mkdir -p ~/.ssh && chmod 700 ~/.ssh";
const AUTHORIZED_KEYS: &str = "~/.ssh/authorized_keys";

pub trait HostProvisioner {
    /// Install the public key for the record's user and prove the key logs in.
    fn install_key(&self, host: &SshServerRecord, key: &GeneratedKey) -> Result<()>;
}

/// libssh2 transport with its default blocking behaviour; no call timeout is set.
#[derive(Debug, Default)]
pub struct Ssh2Provisioner;

/// Session bound to a connected socket, before the handshake.
fn open_session(tcp: TcpStream) -> Result<Session> {
    let mut session = Session::new()?;
    session.set_tcp_stream(tcp);
    Ok(session)
}

impl Ssh2Provisioner {
    fn connect(&self, host: &SshServerRecord) -> Result<Session> {
        let tcp = TcpStream::connect((host.host.as_str(), host.port))?;
        let mut session = open_session(tcp)?;
        session.handshake()?;

        if let Some(hash) = session.host_key_hash(HashType::Sha256) {
            tracing::debug!(
                "Host key for {}:{} SHA256 {}",
                host.host,
                host.port,
                hex::encode(hash)
            );
        }
        Ok(session)
    }

    fn verify_key_login(&self, host: &SshServerRecord, key: &GeneratedKey) -> Result<()> {
        let session = self.connect(host)?;
        session.userauth_pubkey_memory(
            &host.user,
            None,
            &key.private_key,
            Some(&key.passphrase),
        )?;
        let name = run(&session, "hostname")?;
        tracing::debug!("Key login to {} reports hostname {}", host.host, name.trim());
        Ok(())
    }
}

impl HostProvisioner for Ssh2Provisioner {
    fn install_key(&self, host: &SshServerRecord, key: &GeneratedKey) -> Result<()> {
        let session = self.connect(host)?;
        session.userauth_password(&host.user, &host.password)?;
        if !session.authenticated() {
            return Err(VaultCliError::Ssh(format!(
                "Password authentication failed for {}@{}",
                host.user, host.host
            )));
        }

        run(&session, SSH_DIR_SETUP)?;
        run(&session, &append_key_command(&key.public_key))?;

        if let Err(e) = self.verify_key_login(host, key) {
            if let Err(cleanup) = run(&session, &remove_key_command(&key.public_key)) {
                tracing::warn!(
                    "Could not remove installed key from {}: {cleanup}",
                    host.host
                );
            }
            return Err(e);
        }

        tracing::info!("Key based access set up on {}", host.host);
        Ok(())
    }
}

fn append_key_command(public_key: &str) -> String {
    format!(
        "echo \"{}\" >> {AUTHORIZED_KEYS} && chmod 600 {AUTHORIZED_KEYS}",
        public_key.trim()
    )
}

// '#' never occurs in an authorized_keys line, so it is safe as the sed delimiter
fn remove_key_command(public_key: &str) -> String {
    format!(
        "sed -i.bak '\\#^{}#d' {AUTHORIZED_KEYS}",
        public_key.trim()
    )
}

/// Run one command on a fresh channel, failing on a non-zero exit status.
fn run(session: &Session, command: &str) -> Result<String> {
    let mut channel = session.channel_session()?;
    channel.exec(command)?;

    let mut stdout = String::new();
    channel.read_to_string(&mut stdout)?;
    channel.wait_close()?;

    let status = channel.exit_status()?;
    if status != 0 {
        let program = command.split_whitespace().next().unwrap_or(command);
        return Err(VaultCliError::Ssh(format!(
            "Remote command `{program}` exited with status {status}"
        )));
    }
    Ok(stdout)
}
