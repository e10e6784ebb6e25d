use crate::cli::args::LoginArgs;
use crate::cli::commands::VaultContext;
use crate::storage::StoredCredential;
use crate::utils::errors::{Result, VaultCliError};
use crate::utils::time::local_twelve_hour;
use crate::vault::auth::{LoginTarget, VaultAuth};
use crate::vault::client::VaultClient;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

pub async fn login(args: LoginArgs, token_file: &Path) -> Result<()> {
    let target = LoginTarget::parse(&args.login_url)?;

    let username = match args.username {
        Some(user) => user,
        None => prompt_line("User Name: ")?,
    };
    let password = match args.password {
        Some(pass) => pass,
        None => rpassword::prompt_password("Password: ")
            .map_err(|e| VaultCliError::Auth(format!("Failed to read password: {e}")))?,
    };

    let cacert = args.cacert.as_deref().map(absolute_ca_path).transpose()?;
    let client = VaultClient::new(&target.server, cacert.as_deref(), None)?;
    let response = VaultAuth::new(&client)
        .login(&target.url, &username, &password)
        .await?;

    let cacert_file = cacert
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();
    StoredCredential::new(response.access_token, target.server, cacert_file)
        .save(token_file)
        .map_err(|e| {
            VaultCliError::Storage(format!(
                "Error saving access token to {} - {e}",
                token_file.display()
            ))
        })?;

    println!(
        "\nLogin is successful.\nThe login session expires at {}.",
        local_twelve_hour(&response.expires_at)
    );
    println!("Access Token is saved in {}.\n", token_file.display());
    Ok(())
}

pub async fn renew(ctx: &VaultContext) -> Result<()> {
    let response = VaultAuth::new(&ctx.client).renew().await?;

    let renewed = StoredCredential {
        access_token: response.access_token,
        ..ctx.credential.clone()
    };
    renewed.save(&ctx.token_file).map_err(|e| {
        VaultCliError::Storage(format!(
            "Error saving access token to {} - {e}",
            ctx.token_file.display()
        ))
    })?;

    println!(
        "\nSession is renewed.\nThe login session expires at {}.",
        local_twelve_hour(&response.expires_at)
    );
    println!("New Access Token is saved in {}.\n", ctx.token_file.display());
    Ok(())
}

/// Stored CA paths must survive a change of working directory.
fn absolute_ca_path(path: &Path) -> Result<PathBuf> {
    path.canonicalize().map_err(|e| {
        VaultCliError::Tls(format!(
            "Error reading CA certificate {} - {e}",
            path.display()
        ))
    })
}

fn prompt_line(prompt: &str) -> Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::test_support::mock_context;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_missing_ca_file_is_local_error() {
        let err = absolute_ca_path(Path::new("/nonexistent/ca.pem")).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_login_rejects_plain_http_before_prompting() {
        let tmp = tempfile::tempdir().unwrap();
        let args = LoginArgs {
            login_url: "http://vault.example/vault/1.0/Login/".into(),
            username: None,
            password: None,
            cacert: None,
        };
        let err = login(args, &tmp.path().join("tok.txt")).await.unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_renew_replaces_token_and_keeps_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vault/1.0/Renew/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(
                    r#"{"access_token":"renewed","expires_at":"2030-01-01T00:00:00Z"}"#,
                    "application/json",
                ),
            )
            .mount(&server)
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let mut ctx = mock_context(&server);
        ctx.token_file = tmp.path().join("pasm_token.txt");

        renew(&ctx).await.unwrap();
        let saved = StoredCredential::load(&ctx.token_file).unwrap();
        assert_eq!(saved.access_token, "renewed");
        assert_eq!(saved.server, "localhost");
    }

    #[tokio::test]
    async fn test_renew_failure_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vault/1.0/Renew/"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = renew(&mock_context(&server)).await.unwrap_err();
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("Session Renew failed"));
    }
}
