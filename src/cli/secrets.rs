use crate::cli::args::{
    CreateFileSecretArgs, CreateKvSecretArgs, CreateSshKeySecretArgs, GenPasswdArgs,
    ListSecretsArgs, SecretIdArgs, SecretSettingsArgs, TagArgs, UpdateSecretArgs,
};
use crate::cli::boxes::{lease_settings, rotation_settings};
use crate::cli::commands::VaultContext;
use crate::ssh::onboard::SSH_SECRET_TYPE;
use crate::utils::errors::{Result, VaultCliError};
use crate::vault::client::ApiResponse;
use crate::vault::types::{
    display_value, key_value_map, text_field, toggle_field, CreateSecretRequest,
    CreateSshKeySecretRequest, FileInfo, GeneratePasswordRequest, ListOptions,
    ListSecretsRequest, PasswordConditions, SecretConfig, SecretRef, SecretSettings,
    SecretSubtype, SshKeyData, UpdateSecretRequest, MANAGED_SECRET,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Method;
use serde_json::Value;
use std::fs;
use std::path::Path;

pub const MAX_FILE_SECRET_BYTES: u64 = 5_000_000;

pub async fn create_kv_secret(ctx: &VaultContext, args: CreateKvSecretArgs) -> Result<()> {
    if args.datakey.is_empty() && args.datavalue.is_empty() {
        return Err(VaultCliError::InvalidInput(
            "Please specify --datakey & --datavalue key-value pairs for static secret".to_string(),
        ));
    }
    let data = key_value_map("data", &args.datakey, &args.datavalue)?.unwrap_or_default();

    let request = CreateSecretRequest {
        box_id: args.boxid,
        name: args.name,
        desc: args.description,
        secret_data: Value::Object(data),
        tags: key_value_map("tag", &args.tags.tagkey, &args.tags.tagvalue)?,
        expires_at: args.expires_at,
        secret_subtype_info: SecretSubtype::Kv,
    };
    let response = ctx.client.send(Method::POST, "CreateSecret", &request).await?;
    ctx.print_response(&response, "Action denied")?;
    Ok(())
}

/// Base64 of a file secret, enforcing the server's size limit.
pub fn encode_file_secret(path: &Path) -> Result<String> {
    let metadata = fs::metadata(path).map_err(|e| {
        VaultCliError::InvalidInput(format!("Cannot read {} - {e}", path.display()))
    })?;
    if metadata.len() > MAX_FILE_SECRET_BYTES {
        return Err(VaultCliError::InvalidInput(
            "File size cannot be greater than 5 MB".to_string(),
        ));
    }

    let content = fs::read(path)?;
    if content.is_empty() {
        return Err(VaultCliError::InvalidInput(format!(
            "Error. Empty file provided: {}",
            path.display()
        )));
    }
    Ok(STANDARD.encode(content))
}

pub async fn create_file_secret(ctx: &VaultContext, args: CreateFileSecretArgs) -> Result<()> {
    let secret_data = encode_file_secret(&args.filename)?;
    let filename = args
        .filename
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            VaultCliError::InvalidInput(format!(
                "Invalid file name: {}",
                args.filename.display()
            ))
        })?;

    let request = CreateSecretRequest {
        box_id: args.boxid,
        name: args.name,
        desc: args.description,
        secret_data: Value::String(secret_data),
        tags: key_value_map("tag", &args.tags.tagkey, &args.tags.tagvalue)?,
        expires_at: args.expires_at,
        secret_subtype_info: SecretSubtype::File {
            info: FileInfo { filename },
        },
    };
    let response = ctx.client.send(Method::POST, "CreateSecret", &request).await?;
    ctx.print_response(&response, "Action denied")?;
    Ok(())
}

/// Secret attributes from flags; `unset` clears a value only when `allow_unset`.
pub fn secret_settings(
    args: SecretSettingsArgs,
    tags: TagArgs,
    allow_unset: bool,
) -> Result<SecretSettings> {
    Ok(SecretSettings {
        lease: lease_settings(
            args.lease_duration,
            args.lease_renewable.as_deref(),
            allow_unset,
        )?,
        rotation: rotation_settings(
            args.rotation_duration,
            args.rotation_force.as_deref(),
            args.rotation_on_checkin.as_deref(),
            allow_unset,
        )?,
        description: text_field(args.description, allow_unset),
        tags: key_value_map("tag", &tags.tagkey, &tags.tagvalue)?,
        exclusive_checkout: toggle_field(
            "exclusive-checkout",
            args.exclusive_checkout.as_deref(),
            allow_unset,
        )?,
        expires_at: text_field(args.expires_at, allow_unset),
    })
}

/// Base64 of a private key file
pub fn encode_key_file(path: &Path) -> Result<String> {
    let content = fs::read(path).map_err(|e| {
        VaultCliError::Io(std::io::Error::new(
            e.kind(),
            format!("Key file error: {} - {e}", path.display()),
        ))
    })?;
    Ok(STANDARD.encode(content))
}

pub async fn create_ssh_key_secret(ctx: &VaultContext, args: CreateSshKeySecretArgs) -> Result<()> {
    let settings = secret_settings(args.settings, args.tags, false)?;
    let request = CreateSshKeySecretRequest {
        secret_type: MANAGED_SECRET,
        box_id: args.boxid,
        name: args.name,
        secret_data: SshKeyData {
            host: args.host,
            port: args.port,
            username: args.user,
            private_key: encode_key_file(&args.key_file)?,
            private_key_pwd: args.key_pwd,
        },
        secret_config: SecretConfig {
            kind: SSH_SECRET_TYPE.to_string(),
        },
        settings,
    };
    let response = ctx.client.send(Method::POST, "CreateSecret", &request).await?;
    ctx.print_response(&response, "Action denied")?;
    Ok(())
}

pub async fn update_secret(ctx: &VaultContext, args: UpdateSecretArgs) -> Result<()> {
    let request = UpdateSecretRequest {
        box_id: args.boxid,
        secret_id: args.secretid,
        revision: args.revision,
        settings: secret_settings(args.settings, args.tags, true)?,
    };
    let response = ctx.client.send(Method::POST, "UpdateSecret", &request).await?;
    ctx.print_response(&response, "Secret not found")?;
    Ok(())
}

pub async fn list_secrets(ctx: &VaultContext, args: ListSecretsArgs) -> Result<()> {
    let request = ListSecretsRequest {
        box_id: args.boxid,
        options: ListOptions {
            prefix: args.prefix,
            ..args.list.into()
        },
    };
    let response = ctx.client.send(Method::POST, "ListSecrets", &request).await?;
    ctx.print_response(&response, "Secrets not found")?;
    Ok(())
}

pub async fn rotate_secret(ctx: &VaultContext, args: SecretIdArgs) -> Result<()> {
    let request = SecretRef {
        box_id: args.boxid,
        secret_id: args.secretid,
        version: args.version,
    };
    let response = ctx.client.send(Method::POST, "RotateSecret", &request).await?;
    let details = rotation_outcome(&response)?;

    if ctx.output.json {
        ctx.output.print_json(&details);
        return Ok(());
    }

    let field = |name: &str| details.get(name).map(display_value).unwrap_or_default();
    println!("\nSecret rotated successfully\n");
    println!("Secret details\n--------------\n");
    ctx.output.print_key_value(&[
        ("id", field("secret_id")),
        ("name", field("name")),
        ("revision", field("revision")),
        ("current version", field("current_version")),
    ]);
    println!();
    Ok(())
}

/// Body of a successful rotation, or the failure it reports.
fn rotation_outcome(response: &ApiResponse) -> Result<Value> {
    if response.body.is_empty() && response.status == 404 {
        return Err(VaultCliError::NotFound("Secret not found".to_string()));
    }

    let body = response.json_value().unwrap_or(Value::Null);
    if response.status == 200 {
        return Ok(body);
    }
    match body.get("error") {
        Some(error) => Err(VaultCliError::ServerReported(format!(
            "Secret rotation failure: {}",
            display_value(error)
        ))),
        None => Err(VaultCliError::Unknown {
            message: format!("{}\n\nUnknown error", response.text()),
            code: 100,
        }),
    }
}

pub async fn generate_password(ctx: &VaultContext, args: GenPasswdArgs) -> Result<()> {
    let conditions = PasswordConditions {
        upper: args.upper,
        lower: args.lower,
        nums: args.nums,
        symbols: args.symbols,
    };
    let request = GeneratePasswordRequest {
        length: args.length,
        conditions: (!conditions.is_empty()).then_some(conditions),
    };
    let response = ctx
        .client
        .send(Method::POST, "GeneratePassword", &request)
        .await?;
    ctx.print_response(&response, "Action denied")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::ListArgs;
    use std::path::PathBuf;
    use crate::cli::commands::test_support::mock_context;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn response(status: u16, body: &str) -> ApiResponse {
        ApiResponse {
            url: "https://vault.example/vault/1.0/RotateSecret/".into(),
            status,
            status_text: status.to_string(),
            content_type: Some("application/json".into()),
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_rotation_outcomes() {
        let ok = rotation_outcome(&response(200, r#"{"secret_id":"s1","revision":2}"#)).unwrap();
        assert_eq!(ok["revision"], 2);

        let err = rotation_outcome(&response(404, "")).unwrap_err();
        assert_eq!(err.exit_code(), 5);

        let err = rotation_outcome(&response(400, r#"{"error":"not managed"}"#)).unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("Secret rotation failure: not managed"));

        let err = rotation_outcome(&response(500, "oops")).unwrap_err();
        assert_eq!(err.exit_code(), 100);
    }

    #[test]
    fn test_encode_file_secret() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("cert.pem");
        fs::write(&file, b"hello").unwrap();
        assert_eq!(encode_file_secret(&file).unwrap(), "aGVsbG8=");

        let empty = tmp.path().join("empty.txt");
        fs::write(&empty, b"").unwrap();
        assert_eq!(encode_file_secret(&empty).unwrap_err().exit_code(), 1);
    }

    #[test]
    fn test_oversized_file_secret_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("big.bin");
        let handle = fs::File::create(&file).unwrap();
        handle.set_len(MAX_FILE_SECRET_BYTES + 1).unwrap();

        let err = encode_file_secret(&file).unwrap_err();
        assert!(err.to_string().contains("File size cannot be greater than 5 MB"));
    }

    fn ssh_key_args(key_file: PathBuf) -> CreateSshKeySecretArgs {
        CreateSshKeySecretArgs {
            boxid: "ssh-box".into(),
            name: "jump".into(),
            host: "10.0.0.5".into(),
            port: 2222,
            user: "admin".into(),
            key_file,
            key_pwd: Some("s3cret".into()),
            settings: SecretSettingsArgs {
                exclusive_checkout: Some("enable".into()),
                ..Default::default()
            },
            tags: TagArgs::default(),
        }
    }

    #[test]
    fn test_secret_settings_unset_only_on_update() {
        let args = || SecretSettingsArgs {
            description: Some("unset".into()),
            expires_at: Some("unset".into()),
            rotation_on_checkin: Some("unset".into()),
            ..Default::default()
        };
        let updated = secret_settings(args(), TagArgs::default(), true).unwrap();
        assert_eq!(
            serde_json::to_value(&updated).unwrap(),
            json!({"desc": null, "rotation": {"on_checkin": null}, "expires_at": null})
        );

        let err = secret_settings(args(), TagArgs::default(), false).unwrap_err();
        assert!(err.to_string().contains("Supported: enable and disable"));
    }

    #[tokio::test]
    async fn test_ssh_key_secret_sends_base64_key() {
        let tmp = tempfile::tempdir().unwrap();
        let key = tmp.path().join("id_rsa");
        fs::write(&key, b"hello").unwrap();

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vault/1.0/CreateSecret/"))
            .and(body_json(json!({
                "secret_type": "managed",
                "box_id": "ssh-box",
                "name": "jump",
                "secret_data": {
                    "host": "10.0.0.5",
                    "port": 2222,
                    "username": "admin",
                    "private_key": "aGVsbG8=",
                    "private_key_pwd": "s3cret"
                },
                "secret_config": {"type": "SSH key endpoint"},
                "exclusive_checkout": true
            })))
            .respond_with(ResponseTemplate::new(201).set_body_string(r#"{"secret_id":"s"}"#))
            .expect(1)
            .mount(&server)
            .await;

        create_ssh_key_secret(&mock_context(&server), ssh_key_args(key))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_ssh_key_secret_missing_key_file() {
        let server = MockServer::start().await;
        let args = ssh_key_args(PathBuf::from("/nonexistent/id_rsa"));
        let err = create_ssh_key_secret(&mock_context(&server), args)
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 4);
        assert!(err.to_string().contains("Key file error"));
    }

    #[tokio::test]
    async fn test_update_secret_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vault/1.0/UpdateSecret/"))
            .and(body_json(json!({
                "box_id": "b",
                "secret_id": "s",
                "revision": 4,
                "lease": {"duration": null}
            })))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let args = UpdateSecretArgs {
            boxid: "b".into(),
            secretid: "s".into(),
            revision: 4,
            settings: SecretSettingsArgs {
                lease_duration: Some("unset".into()),
                ..Default::default()
            },
            tags: TagArgs::default(),
        };
        let err = update_secret(&mock_context(&server), args)
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 5);
        assert_eq!(err.to_string(), "Secret not found");
    }

    #[tokio::test]
    async fn test_kv_secret_requires_data() {
        let server = MockServer::start().await;
        let args = CreateKvSecretArgs {
            boxid: "b".into(),
            name: "n".into(),
            description: None,
            datakey: vec![],
            datavalue: vec![],
            tags: TagArgs::default(),
            expires_at: None,
        };
        let err = create_kv_secret(&mock_context(&server), args)
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_kv_secret_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vault/1.0/CreateSecret/"))
            .and(body_json(json!({
                "box_id": "b",
                "name": "db",
                "secret_data": {"user": "admin", "conn": {"port": 5432}},
                "secret_subtype_info": {"type": "kv"}
            })))
            .respond_with(ResponseTemplate::new(201).set_body_string(r#"{"secret_id":"s"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let args = CreateKvSecretArgs {
            boxid: "b".into(),
            name: "db".into(),
            description: None,
            datakey: vec!["user".into(), "conn".into()],
            datavalue: vec!["admin".into(), r#"{"port":5432}"#.into()],
            tags: TagArgs::default(),
            expires_at: None,
        };
        create_kv_secret(&mock_context(&server), args).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_secrets_error_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vault/1.0/ListSecrets/"))
            .and(body_json(json!({"box_id": "b", "prefix": "db", "max_items": 2})))
            .respond_with(ResponseTemplate::new(403).set_body_string(r#"{"error":"forbidden"}"#))
            .mount(&server)
            .await;

        let args = ListSecretsArgs {
            boxid: "b".into(),
            prefix: Some("db".into()),
            list: ListArgs {
                max_items: Some(2),
                ..Default::default()
            },
        };
        let err = list_secrets(&mock_context(&server), args).await.unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[tokio::test]
    async fn test_gen_passwd_sends_conditions_only_when_given() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vault/1.0/GeneratePassword/"))
            .and(body_json(json!({"length": 16, "conditions": {"nums": 2}})))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"password":"x"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let args = GenPasswdArgs {
            length: 16,
            upper: None,
            lower: None,
            symbols: None,
            nums: Some(2),
        };
        generate_password(&mock_context(&server), args).await.unwrap();
    }
}
