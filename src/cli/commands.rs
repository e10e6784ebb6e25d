use crate::cli::args::*;
use crate::cli::completions::handle_completion_command;
use crate::cli::{admin, auth, boxes, bulk, leases, secrets};
use crate::storage::StoredCredential;
use crate::utils::config::CliConfig;
use crate::utils::errors::Result;
use crate::utils::output::OutputFormat;
use crate::vault::client::{ApiResponse, VaultClient};
use crate::vault::types::ListOptions;
use serde_json::Value;
use std::io;
use std::path::PathBuf;

/// Everything an authenticated command needs, loaded once per invocation.
pub struct VaultContext {
    pub client: VaultClient,
    pub credential: StoredCredential,
    pub token_file: PathBuf,
    pub output: OutputFormat,
}

impl VaultContext {
    pub fn load(token_file: PathBuf, output: OutputFormat) -> Result<Self> {
        let credential = StoredCredential::load(&token_file)?;
        tracing::debug!(
            "Using token {} for server {}",
            credential.masked_token(),
            credential.server
        );
        let client = VaultClient::new(
            &credential.server,
            credential.ca_file(),
            Some(credential.access_token.clone()),
        )?;
        Ok(Self {
            client,
            credential,
            token_file,
            output,
        })
    }

    /// Context around an already built client
    pub fn with_client(
        client: VaultClient,
        credential: StoredCredential,
        token_file: PathBuf,
        output: OutputFormat,
    ) -> Self {
        Self {
            client,
            credential,
            token_file,
            output,
        }
    }

    /// Interpret a raw exchange and print its JSON body, if any.
    pub fn print_response(&self, response: &ApiResponse, not_found: &str) -> Result<Option<Value>> {
        let value = response.interpret(not_found)?;
        if let Some(value) = &value {
            self.output.print_json(value);
        }
        Ok(value)
    }
}

impl From<ListArgs> for ListOptions {
    fn from(args: ListArgs) -> Self {
        Self {
            prefix: None,
            filters: args.filters,
            max_items: args.max_items,
            fields: args.field,
            next_token: args.next_token,
        }
    }
}

pub async fn handle_command(cli: Cli) -> Result<()> {
    let config = CliConfig::load(cli.config.as_deref())?;

    // Initialize logging - always to stderr
    if !cli.quiet {
        let log_level = match (cli.verbose, config.log_filter.as_deref()) {
            (0, Some(filter)) => filter,
            (0, None) => "pasm_vault_cli=warn", // Default: warnings only
            (1, _) => "pasm_vault_cli=info",
            (2, _) => "pasm_vault_cli=debug",
            _ => "pasm_vault_cli=trace",
        };

        tracing_subscriber::fmt()
            .with_writer(io::stderr)
            .with_env_filter(log_level)
            .init();
    }

    let output = OutputFormat::new(cli.json);
    let token_file = config.resolve_token_file(cli.token_file.as_deref())?;
    let context = || VaultContext::load(token_file.clone(), output.clone());

    match cli.command {
        Commands::Login(args) => auth::login(args, &token_file).await,
        Commands::Renew => auth::renew(&context()?).await,
        Commands::CreateBox(args) => boxes::create_box(&context()?, args).await,
        Commands::UpdateBox(args) => boxes::update_box(&context()?, args).await,
        Commands::CreateKvSecret(args) => secrets::create_kv_secret(&context()?, args).await,
        Commands::CreateFileSecret(args) => secrets::create_file_secret(&context()?, args).await,
        Commands::CreateSshKeySecret(args) => {
            secrets::create_ssh_key_secret(&context()?, args).await
        }
        Commands::UpdateSecret(args) => secrets::update_secret(&context()?, args).await,
        Commands::ListSecrets(args) => secrets::list_secrets(&context()?, args).await,
        Commands::RotateSecret(args) => secrets::rotate_secret(&context()?, args).await,
        Commands::GenPasswd(args) => secrets::generate_password(&context()?, args).await,
        Commands::CheckoutSecret(args) => leases::checkout_secret(&context()?, args).await,
        Commands::CheckinSecret(args) => leases::checkin_secret(&context()?, args).await,
        Commands::DeleteLease { leaseid } => leases::delete_lease(&context()?, leaseid).await,
        Commands::CreatePolicy(args) => admin::create_policy(&context()?, args).await,
        Commands::UpdatePolicy(args) => admin::update_policy(&context()?, args).await,
        Commands::ListAuditMessages(args) => admin::list_audit_messages(&context()?, args).await,
        Commands::DownloadAudit(args) => {
            admin::download_bundle(&context()?, admin::AUDIT_BUNDLE, args).await
        }
        Commands::DownloadSshProxyAudit(args) => {
            admin::download_bundle(&context()?, admin::SSH_PROXY_AUDIT_BUNDLE, args).await
        }
        Commands::ListAdSettings(args) => admin::list_ad_settings(&context()?, args).await,
        Commands::UpdateAdSetting(args) => admin::update_ad_setting(&context()?, args).await,
        Commands::GetLocalUser(args) => admin::get_local_user(&context()?, args).await,
        Commands::DeleteLocalUser(args) => admin::delete_local_user(&context()?, args).await,
        Commands::ImportCsv(args) => bulk::import_csv(&context()?, args).await,
        Commands::SetupSshProxy(args) => bulk::setup_ssh_proxy(&context()?, args).await,
        Commands::Completion { command } => handle_completion_command(&command),
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::mock_context;
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_load_without_login_is_credential_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = VaultContext::load(tmp.path().join("missing.txt"), OutputFormat::new(false))
            .err()
            .unwrap();
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("Please login first"));
    }

    #[tokio::test]
    async fn test_mock_context_sends_auth_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vault/1.0/ListSecrets/"))
            .and(header("X-VAULT-AUTH", "tok"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"secrets":[]}"#))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = mock_context(&server);
        let response = ctx
            .client
            .send(reqwest::Method::POST, "ListSecrets", &serde_json::json!({}))
            .await
            .unwrap();
        let value = ctx.print_response(&response, "Secrets not found").unwrap();
        assert_eq!(value, Some(serde_json::json!({"secrets": []})));
    }
}
