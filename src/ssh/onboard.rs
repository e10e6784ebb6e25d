//! Batch onboarding of SSH servers: install a fresh key on every host listed in
//! a CSV, then stage the working ones as "SSH key endpoint" secrets for a CSV
//! import into Vault.

use crate::ssh::keys::{GeneratedKey, KeyMaterialSource};
use crate::ssh::session::HostProvisioner;
use crate::utils::errors::{Result, VaultCliError};
use crate::vault::client::{MultipartParams, VaultClient};
use serde::Serialize;
use serde_json::Value;
use std::io::{Read, Write};
use std::path::Path;

pub const SSH_SECRET_TYPE: &str = "SSH key endpoint";
pub const DEFAULT_SECRET_NAME_PATTERN: &str = "ssh-secret-*";
pub const IMPORT_ACTION: &str = "ImportCSVSecrets";

/// One `host,port,user,password` row.
#[derive(Clone, PartialEq)]
pub struct SshServerRecord {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for SshServerRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshServerRecord")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

/// Attributes shared by every secret created in one onboarding run.
#[derive(Debug, Clone)]
pub struct CommonSecretMetadata {
    pub box_name: String,
    pub tag: String,
    pub secret_expiry: String,
    pub secret_name_pattern: String,
    pub secret_description: String,
    pub lease_duration: String,
    pub exclusive_checkout: bool,
}

impl CommonSecretMetadata {
    pub fn new(box_name: impl Into<String>) -> Self {
        Self {
            box_name: box_name.into(),
            tag: String::new(),
            secret_expiry: String::new(),
            secret_name_pattern: DEFAULT_SECRET_NAME_PATTERN.to_string(),
            secret_description: String::new(),
            lease_duration: String::new(),
            exclusive_checkout: false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.secret_name_pattern.matches('*').count() > 1 {
            return Err(VaultCliError::Request(
                "Only one '*' is allowed in secret-name-pattern flag.".to_string(),
            ));
        }
        Ok(())
    }

    /// Pattern with its first `*` replaced by the 1-based index.
    pub fn secret_name(&self, index: usize) -> String {
        self.secret_name_pattern
            .replacen('*', &index.to_string(), 1)
    }
}

#[derive(Debug, Default)]
pub struct ParsedServers {
    pub records: Vec<SshServerRecord>,
    /// One message per rejected row
    pub skipped: Vec<String>,
}

/// Read `host,port,user,password` rows. The file has no header; leading
/// whitespace of each field is ignored. Bad rows are skipped, not fatal.
pub fn parse_server_csv<R: Read>(reader: R) -> ParsedServers {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut parsed = ParsedServers::default();
    for (index, row) in csv_reader.records().enumerate() {
        let line = index + 1;
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                parsed.skipped.push(format!(
                    "Error reading record {line}. {e}. This row will be skipped from processing."
                ));
                continue;
            }
        };

        let fields: Vec<&str> = row.iter().map(str::trim_start).collect();
        if fields.len() != 4 {
            parsed.skipped.push(format!(
                "Record {line} has {} fields, expected 4. This row will be skipped from processing.",
                fields.len()
            ));
            continue;
        }

        let port = match fields[1].trim_end().parse::<u16>() {
            Ok(port) => port,
            Err(e) => {
                parsed.skipped.push(format!(
                    "Error parsing record {line}. Invalid port {:?}: {e}. This row will be skipped from processing.",
                    fields[1]
                ));
                continue;
            }
        };

        parsed.records.push(SshServerRecord {
            host: fields[0].to_string(),
            port,
            user: fields[2].to_string(),
            password: fields[3].to_string(),
        });
    }
    parsed
}

#[derive(Debug, Clone)]
pub struct ProvisionedHost {
    pub record: SshServerRecord,
    pub key: GeneratedKey,
}

#[derive(Debug, Default)]
pub struct ProvisioningReport {
    pub succeeded: Vec<ProvisionedHost>,
    pub failed: Vec<SshServerRecord>,
    /// Rows dropped before any connection was made
    pub skipped: Vec<String>,
}

/// Generate a key for each host and install it, strictly one host at a time.
pub fn provision_hosts(
    records: Vec<SshServerRecord>,
    keys: &dyn KeyMaterialSource,
    provisioner: &dyn HostProvisioner,
) -> ProvisioningReport {
    let mut report = ProvisioningReport::default();

    for record in records {
        let key = match keys.generate() {
            Ok(key) => key,
            Err(e) => {
                report.skipped.push(format!(
                    "Error occurred. {e}. Server {} will be skipped from setup.",
                    record.host
                ));
                continue;
            }
        };

        match provisioner.install_key(&record, &key) {
            Ok(()) => report.succeeded.push(ProvisionedHost { record, key }),
            Err(e) => {
                tracing::warn!(
                    "Error occurred while setting up key based access for server {}. {e}. \
                     This server will not be onboarded in PASM vault.",
                    record.host
                );
                report.failed.push(record);
            }
        }
    }
    report
}

/// One row of the import CSV.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StagedSecretRow {
    pub box_name: String,
    pub secret_name: String,
    pub host: String,
    pub user: String,
    pub keyfile: String,
    pub desc: String,
    pub port: u16,
    pub keypwd: String,
    #[serde(rename = "lease-duration")]
    pub lease_duration: String,
    #[serde(rename = "exclusive-checkout")]
    pub exclusive_checkout: bool,
    pub tags: String,
    pub expires_at: String,
}

pub fn staged_rows(hosts: &[ProvisionedHost], common: &CommonSecretMetadata) -> Vec<StagedSecretRow> {
    hosts
        .iter()
        .enumerate()
        .map(|(i, host)| StagedSecretRow {
            box_name: common.box_name.clone(),
            secret_name: common.secret_name(i + 1),
            host: host.record.host.clone(),
            user: host.record.user.clone(),
            keyfile: host.key.private_key.replace('"', ""),
            desc: common.secret_description.clone(),
            port: host.record.port,
            keypwd: host.key.passphrase.clone(),
            lease_duration: common.lease_duration.clone(),
            exclusive_checkout: common.exclusive_checkout,
            tags: common.tag.clone(),
            expires_at: common.secret_expiry.clone(),
        })
        .collect()
}

/// Write the header and rows. The header comes from the first row, so an
/// empty slice writes nothing.
pub fn write_staged_csv<W: Write>(writer: W, rows: &[StagedSecretRow]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Parse the server list and provision every host on a blocking thread.
pub async fn provision_from_csv<K, P>(
    servers_csv: &Path,
    common: &CommonSecretMetadata,
    keys: K,
    provisioner: P,
) -> Result<ProvisioningReport>
where
    K: KeyMaterialSource + Send + 'static,
    P: HostProvisioner + Send + 'static,
{
    common.validate()?;
    let file = std::fs::File::open(servers_csv).map_err(|e| {
        VaultCliError::Request(format!(
            "Invalid value provided for parameter 'servers'. {e}"
        ))
    })?;
    let ParsedServers { records, skipped } = parse_server_csv(file);
    tracing::info!(
        "{} server(s) to onboard, {} row(s) skipped",
        records.len(),
        skipped.len()
    );

    let mut report =
        tokio::task::spawn_blocking(move || provision_hosts(records, &keys, &provisioner))
            .await
            .map_err(|e| VaultCliError::Ssh(format!("Provisioning task failed: {e}")))?;
    report.skipped.splice(0..0, skipped);
    Ok(report)
}

/// Stage the provisioned hosts in a temporary CSV and submit it as an
/// "SSH key endpoint" import. Returns the server reply.
pub async fn upload_provisioned(
    client: &VaultClient,
    hosts: &[ProvisionedHost],
    common: &CommonSecretMetadata,
) -> Result<Option<Value>> {
    let rows = staged_rows(hosts, common);
    let mut staged = tempfile::Builder::new()
        .prefix("ssh-secret-csv")
        .suffix(".csv")
        .tempfile()?;
    write_staged_csv(staged.as_file_mut(), &rows)?;
    tracing::debug!("Staged {} secret(s) at {}", rows.len(), staged.path().display());

    let params = MultipartParams {
        csv_file: Some(staged.path().to_path_buf()),
        public_key: None,
        secret_type: Some(SSH_SECRET_TYPE.to_string()),
    };
    let response = client.post_multipart(IMPORT_ACTION, &params).await?;
    // The staged file holds private keys
    staged.close()?;

    response.interpret("Action denied")
}
