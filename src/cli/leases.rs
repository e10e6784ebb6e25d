use crate::cli::args::{CheckinSecretArgs, CheckoutSecretArgs};
use crate::cli::commands::VaultContext;
use crate::storage::lease::lease_file_path;
use crate::storage::LeaseRecord;
use crate::utils::errors::{Result, VaultCliError};
use crate::utils::output::pretty_json;
use crate::utils::time::local_twelve_hour;
use crate::vault::client::ApiResponse;
use crate::vault::types::{display_value, CheckoutResponse, LeaseRef, SecretRef};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Method;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Lease fields of a checkout, rendered for display and for the lease file.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaseSummary {
    pub lease_id: String,
    pub expires_at: Option<String>,
    pub renewable: Option<String>,
}

/// Secret data as printed in text mode; `None` for file secrets.
pub fn secret_text(checkout: &CheckoutResponse) -> Result<Option<String>> {
    let data = checkout.secret_data.as_ref().ok_or_else(|| {
        VaultCliError::NotFound("Error during Secret checkout".to_string())
    })?;
    match data {
        Value::String(_) if checkout.secret_subtype_info.is_file() => Ok(None),
        Value::String(s) => Ok(Some(format!("Secret data: {s}"))),
        Value::Object(_) => Ok(Some(format!("Secret data:\n\n{}", pretty_json(data)))),
        _ => Err(VaultCliError::NotFound("Invalid secret value".to_string())),
    }
}

pub fn lease_summary(checkout: &CheckoutResponse) -> Result<Option<LeaseSummary>> {
    let Some(lease) = &checkout.lease else {
        return Ok(None);
    };
    let lease_id = lease
        .lease_id
        .as_ref()
        .map(display_value)
        .ok_or_else(|| VaultCliError::NotFound("Lease id not found.".to_string()))?;

    Ok(Some(LeaseSummary {
        lease_id,
        expires_at: lease.expires_at.as_deref().map(local_twelve_hour),
        renewable: lease.renewable.as_ref().map(display_value),
    }))
}

/// Decode a checked out file secret into `dir`, keeping only the base name
/// the server recorded.
pub fn write_file_secret(dir: &Path, filename: &str, encoded: &str) -> Result<PathBuf> {
    let name = Path::new(filename).file_name().ok_or_else(|| {
        VaultCliError::UnexpectedResponse(format!("Invalid file secret name: {filename}"))
    })?;
    let content = STANDARD.decode(encoded)?;
    let target = dir.join(name);
    fs::write(&target, content).map_err(|e| {
        VaultCliError::Io(std::io::Error::new(
            e.kind(),
            format!("Unable to write to {} - {e}", target.display()),
        ))
    })?;
    Ok(target)
}

pub async fn checkout_secret(ctx: &VaultContext, args: CheckoutSecretArgs) -> Result<()> {
    if args.dont_save_lease && args.lease_file.is_some() {
        return Err(VaultCliError::InvalidInput(
            "Cannot set both dont-save-lease and lease-file".to_string(),
        ));
    }

    let secret = args.secret;
    let request = SecretRef {
        box_id: secret.boxid.clone(),
        secret_id: secret.secretid.clone(),
        version: secret.version,
    };
    let (value, checkout) = fetch_checkout(ctx, &request).await?;
    let is_file = checkout.secret_subtype_info.is_file();

    let lease = lease_summary(&checkout)?;
    if ctx.output.json {
        ctx.output.print_json(&value);
        if is_file {
            println!(
                "This is a file secret, secret_data above contains base64 of file secret. \
                 Do a base64 decode to get actual file content.\n"
            );
        }
    } else {
        if let Some(text) = secret_text(&checkout)? {
            println!("\n{text}");
        }
        if let Some(lease) = &lease {
            print_lease(lease);
        }
    }

    if let Some(lease) = lease.as_ref().filter(|_| !args.dont_save_lease) {
        let path = match args.lease_file {
            Some(path) => path,
            None => lease_file_path(&secret.boxid, &secret.secretid, secret.version)?,
        };
        let record = LeaseRecord {
            box_id: secret.boxid,
            secret_id: secret.secretid,
            lease_id: lease.lease_id.clone(),
            expires_at: lease.expires_at.clone().unwrap_or_default(),
            renewable: lease.renewable.clone().unwrap_or_default(),
            version: secret.version.unwrap_or(0),
        };
        record.save(&path).map_err(|e| {
            VaultCliError::Storage(format!(
                "Error saving lease info to {} - {e}",
                path.display()
            ))
        })?;
        println!(
            "\nLease id saved in {}. Pass this file if checking in the secret with --lease-file option.",
            path.display()
        );
    }

    if is_file {
        let filename = checkout.secret_subtype_info.filename().ok_or_else(|| {
            VaultCliError::UnexpectedResponse("file secret without filename".to_string())
        })?;
        let encoded = checkout
            .secret_data
            .as_ref()
            .and_then(Value::as_str)
            .unwrap_or_default();
        let target = write_file_secret(&std::env::current_dir()?, filename, encoded)?;
        println!("\nSuccessfully downloaded {}", target.display());
    }
    println!();
    Ok(())
}

/// Check out a secret, returning the raw reply and its decoded form.
pub async fn fetch_checkout(
    ctx: &VaultContext,
    request: &SecretRef,
) -> Result<(Value, CheckoutResponse)> {
    let response = ctx
        .client
        .send(Method::POST, "CheckoutSecret", request)
        .await?;

    if response.status != 200 {
        let body = response.text();
        let message = if body.is_empty() {
            "Secret not found".to_string()
        } else {
            body
        };
        return Err(VaultCliError::NotFound(message));
    }

    let value = response
        .json_value()
        .ok_or_else(|| VaultCliError::UnexpectedResponse(response.text()))?;
    if let Some(error) = value.get("error") {
        if ctx.output.json {
            ctx.output.print_json(&value);
        }
        return Err(VaultCliError::ServerReported(display_value(error)));
    }
    let checkout = serde_json::from_value(value.clone())?;
    Ok((value, checkout))
}

fn print_lease(lease: &LeaseSummary) {
    println!("\nLease:\n");
    if let Some(expires_at) = &lease.expires_at {
        println!("Expires at: {expires_at}");
    }
    println!("Lease id: {}", lease.lease_id);
    if let Some(renewable) = &lease.renewable {
        println!("Renewable: {renewable}");
    }
    println!();
}

/// Where check-in takes its lease id from.
#[derive(Debug, Clone, PartialEq)]
pub enum LeaseSource {
    Id(String),
    File(PathBuf),
}

pub fn lease_source(args: &CheckinSecretArgs) -> Result<LeaseSource> {
    let has_identifiers =
        args.boxid.is_some() || args.secretid.is_some() || args.version.is_some();

    if let Some(lease_id) = &args.leaseid {
        if args.lease_file.is_some() {
            return Err(VaultCliError::InvalidInput(
                "Cannot specify both \"leaseid\" & \"lease-file\" options".to_string(),
            ));
        }
        if has_identifiers {
            return Err(VaultCliError::InvalidInput(
                "Cannot specify both \"leaseid\" & Secret identifiers(\"boxid\", \"secretid\", \"version\") options"
                    .to_string(),
            ));
        }
        return Ok(LeaseSource::Id(lease_id.clone()));
    }

    if let Some(file) = &args.lease_file {
        if has_identifiers {
            return Err(VaultCliError::InvalidInput(
                "Cannot specify both \"lease-file\" & Secret identifiers(\"boxid\", \"secretid\", \"version\")"
                    .to_string(),
            ));
        }
        return Ok(LeaseSource::File(file.clone()));
    }

    match (&args.boxid, &args.secretid) {
        (Some(box_id), Some(secret_id)) => Ok(LeaseSource::File(lease_file_path(
            box_id,
            secret_id,
            args.version,
        )?)),
        (Some(_), None) => Err(VaultCliError::InvalidInput(
            "Please specify \"secretid\" of the Secret".to_string(),
        )),
        (None, Some(_)) => Err(VaultCliError::InvalidInput(
            "Please specify \"boxid\" of the Secret".to_string(),
        )),
        (None, None) => Err(VaultCliError::InvalidInput(
            "Please specify one of \"leaseid\", \"lease-file\" or secret identifiers \
             (\"boxid\", \"secretid\", \"version\"(if provided during checkin)) options"
                .to_string(),
        )),
    }
}

/// Status-only replies: `expected` is success, an empty 404 is "not found",
/// an `error` body is server reported and anything else is unknown.
fn status_outcome(response: &ApiResponse, expected: u16, not_found: &str) -> Result<()> {
    if response.body.is_empty() && response.status == 404 {
        return Err(VaultCliError::NotFound(not_found.to_string()));
    }
    if response.status == expected {
        return Ok(());
    }

    let text = response.text();
    match response.json_value() {
        Some(body) if body.get("error").is_some() => Err(VaultCliError::ServerReported(text)),
        _ => Err(VaultCliError::Unknown {
            message: format!("{text}\n\nUnknown error"),
            code: 100,
        }),
    }
}

pub async fn checkin_secret(ctx: &VaultContext, args: CheckinSecretArgs) -> Result<()> {
    let lease_id = match lease_source(&args)? {
        LeaseSource::Id(id) => id,
        LeaseSource::File(path) => {
            tracing::debug!("Reading lease from {}", path.display());
            LeaseRecord::load(&path)
                .map_err(|e| {
                    VaultCliError::InvalidInput(format!("Error getting lease id: {e}"))
                })?
                .lease_id
        }
    };

    let response = ctx
        .client
        .send(Method::POST, "CheckinSecret", &LeaseRef { lease_id })
        .await?;
    status_outcome(&response, 204, "Secret not found")?;
    println!("\nCheckin successful\n");
    Ok(())
}

pub async fn delete_lease(ctx: &VaultContext, lease_id: String) -> Result<()> {
    let response = ctx
        .client
        .send(Method::POST, "DeleteLease", &LeaseRef { lease_id })
        .await?;
    status_outcome(&response, 200, "Lease not found")?;
    println!("\nLease deleted successfully\n");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::SecretIdArgs;
    use crate::cli::commands::test_support::mock_context;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn checkout(value: Value) -> CheckoutResponse {
        serde_json::from_value(value).unwrap()
    }

    fn checkin_args() -> CheckinSecretArgs {
        CheckinSecretArgs {
            leaseid: None,
            lease_file: None,
            boxid: None,
            secretid: None,
            version: None,
        }
    }

    fn checkout_args(dont_save_lease: bool, lease_file: Option<PathBuf>) -> CheckoutSecretArgs {
        CheckoutSecretArgs {
            secret: SecretIdArgs {
                boxid: "b".into(),
                secretid: "s".into(),
                version: None,
            },
            lease_file,
            dont_save_lease,
        }
    }

    #[test]
    fn test_secret_text_variants() {
        let plain = checkout(json!({"secret_data": "abc"}));
        assert_eq!(secret_text(&plain).unwrap().unwrap(), "Secret data: abc");

        let kv = checkout(json!({"secret_data": {"user": "root"}}));
        assert!(secret_text(&kv).unwrap().unwrap().contains("\"user\": \"root\""));

        let file = checkout(json!({
            "secret_data": "aGVsbG8=",
            "secret_subtype_info": {"type": "file", "info": {"filename": "a.txt"}}
        }));
        assert_eq!(secret_text(&file).unwrap(), None);

        let missing = checkout(json!({}));
        assert_eq!(secret_text(&missing).unwrap_err().exit_code(), 5);
    }

    #[test]
    fn test_lease_summary() {
        let resp = checkout(json!({
            "secret_data": "abc",
            "lease": {"lease_id": 42, "expires_at": "not-a-time", "renewable": false}
        }));
        let lease = lease_summary(&resp).unwrap().unwrap();
        assert_eq!(lease.lease_id, "42");
        assert_eq!(lease.expires_at.as_deref(), Some("not-a-time"));
        assert_eq!(lease.renewable.as_deref(), Some("false"));

        let no_id = checkout(json!({"secret_data": "abc", "lease": {"renewable": true}}));
        assert_eq!(lease_summary(&no_id).unwrap_err().exit_code(), 5);
    }

    #[test]
    fn test_write_file_secret_strips_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let target = write_file_secret(tmp.path(), "../../etc/motd", "aGVsbG8=").unwrap();
        assert_eq!(target, tmp.path().join("motd"));
        assert_eq!(fs::read_to_string(target).unwrap(), "hello");
    }

    #[test]
    fn test_lease_source_conflicts() {
        let args = CheckinSecretArgs {
            leaseid: Some("l1".into()),
            lease_file: Some(PathBuf::from("lease.txt")),
            ..checkin_args()
        };
        assert!(lease_source(&args)
            .unwrap_err()
            .to_string()
            .contains("\"leaseid\" & \"lease-file\""));

        let args = CheckinSecretArgs {
            lease_file: Some(PathBuf::from("lease.txt")),
            version: Some(2),
            ..checkin_args()
        };
        assert_eq!(lease_source(&args).unwrap_err().exit_code(), 1);

        let args = CheckinSecretArgs {
            boxid: Some("b".into()),
            ..checkin_args()
        };
        assert!(lease_source(&args)
            .unwrap_err()
            .to_string()
            .contains("Please specify \"secretid\""));

        assert!(lease_source(&checkin_args()).is_err());
    }

    #[test]
    fn test_lease_source_prefers_explicit_id() {
        let args = CheckinSecretArgs {
            leaseid: Some("l1".into()),
            ..checkin_args()
        };
        assert_eq!(lease_source(&args).unwrap(), LeaseSource::Id("l1".into()));
    }

    #[tokio::test]
    async fn test_checkout_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vault/1.0/CheckoutSecret/"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = checkout_secret(&mock_context(&server), checkout_args(true, None))
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 5);
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_checkout_prints_secret() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vault/1.0/CheckoutSecret/"))
            .and(body_json(json!({"box_id": "b", "secret_id": "s"})))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"secret_data":"abc"}"#))
            .mount(&server)
            .await;

        let ctx = mock_context(&server);
        let request = SecretRef {
            box_id: "b".into(),
            secret_id: "s".into(),
            version: None,
        };
        let (_, checkout) = fetch_checkout(&ctx, &request).await.unwrap();
        assert_eq!(
            secret_text(&checkout).unwrap().as_deref(),
            Some("Secret data: abc")
        );

        checkout_secret(&ctx, checkout_args(true, None))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_checkout_saves_lease_file() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vault/1.0/CheckoutSecret/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"secret_data":"abc","lease":{"lease_id":"l-9","renewable":false}}"#,
            ))
            .mount(&server)
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let lease_file = tmp.path().join("lease.txt");
        checkout_secret(
            &mock_context(&server),
            checkout_args(false, Some(lease_file.clone())),
        )
        .await
        .unwrap();

        let record = LeaseRecord::load(&lease_file).unwrap();
        assert_eq!(record.lease_id, "l-9");
        assert_eq!(record.box_id, "b");
        assert_eq!(record.renewable, "false");
    }

    #[tokio::test]
    async fn test_checkout_rejects_conflicting_lease_flags() {
        let server = MockServer::start().await;
        let err = checkout_secret(
            &mock_context(&server),
            checkout_args(true, Some(PathBuf::from("lease.txt"))),
        )
        .await
        .unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_checkin_with_lease_file() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vault/1.0/CheckinSecret/"))
            .and(body_json(json!({"lease_id": "l-1"})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let lease_file = tmp.path().join("lease.txt");
        LeaseRecord {
            box_id: "b".into(),
            secret_id: "s".into(),
            lease_id: "l-1".into(),
            ..Default::default()
        }
        .save(&lease_file)
        .unwrap();

        let args = CheckinSecretArgs {
            lease_file: Some(lease_file),
            ..checkin_args()
        };
        checkin_secret(&mock_context(&server), args).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_lease_outcomes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vault/1.0/DeleteLease/"))
            .and(body_json(json!({"lease_id": "gone"})))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/vault/1.0/DeleteLease/"))
            .and(body_json(json!({"lease_id": "odd"})))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let ctx = mock_context(&server);
        let err = delete_lease(&ctx, "gone".into()).await.unwrap_err();
        assert_eq!(err.to_string(), "Lease not found");
        let err = delete_lease(&ctx, "odd".into()).await.unwrap_err();
        assert_eq!(err.exit_code(), 100);
    }
}
