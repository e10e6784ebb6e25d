use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pasmcli")]
#[command(version = "1.0.0")]
#[command(about = "Command-line client for the PASM Vault secrets service")]
#[command(long_about = None)]
pub struct Cli {
    /// Credential file written by login (default: ~/pasmcli.data/pasm_token.txt)
    #[arg(long, global = true, env = "PASMCLI_TOKEN_FILE")]
    pub token_file: Option<PathBuf>,

    /// YAML config file (default: ~/pasmcli.data/pasmcli.yaml)
    #[arg(long, global = true, env = "PASMCLI_CONFIG")]
    pub config: Option<PathBuf>,

    /// Show JSON formatted output
    #[arg(long, global = true, alias = "json-output")]
    pub json: bool,

    /// Enable verbose logging (repeat for more verbosity: -v INFO, -vv DEBUG, -vvv TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress log output
    #[arg(short, long)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Login to PASM Vault
    Login(LoginArgs),
    /// Renew Access Token
    Renew,
    /// Create a Vault Box
    CreateBox(CreateBoxArgs),
    /// Update Box
    UpdateBox(UpdateBoxArgs),
    /// Create a Vault Key-Value Secret within the specified box
    CreateKvSecret(CreateKvSecretArgs),
    /// Create a Vault File Secret within the specified box
    CreateFileSecret(CreateFileSecretArgs),
    /// Create SSH key-based Secret within the specified Box
    CreateSshKeySecret(CreateSshKeySecretArgs),
    /// Update a Vault Secret within the specified box
    UpdateSecret(UpdateSecretArgs),
    /// List all Secret metadata within a Box
    ListSecrets(ListSecretsArgs),
    /// Manually rotate a managed Secret
    RotateSecret(SecretIdArgs),
    /// Checkout Secret
    CheckoutSecret(CheckoutSecretArgs),
    /// Checkin Secret with one of leaseid, lease-file or the secret identifiers
    CheckinSecret(CheckinSecretArgs),
    /// Delete Lease
    DeleteLease {
        /// Id of the Lease to be deleted
        #[arg(short = 'l', long)]
        leaseid: String,
    },
    /// Generate password
    #[command(name = "gen-passwd")]
    GenPasswd(GenPasswdArgs),
    /// Create a Vault Policy
    CreatePolicy(CreatePolicyArgs),
    /// Update a given Vault Policy
    UpdatePolicy(UpdatePolicyArgs),
    /// List all audit messages
    ListAuditMessages(ListAuditMessagesArgs),
    /// Download audit log bundle
    DownloadAudit(DownloadArgs),
    /// Download SSH Proxy audit log bundle
    DownloadSshProxyAudit(DownloadArgs),
    /// List all AD settings
    #[command(name = "list-ad-settings")]
    ListAdSettings(ListAdSettingsArgs),
    /// Update Active Directory Settings
    #[command(name = "update-ad-setting", alias = "update-ad-settings")]
    UpdateAdSetting(UpdateAdSettingArgs),
    /// Get Local User details
    GetLocalUser(LocalUserArgs),
    /// Delete a Local User
    DeleteLocalUser(LocalUserArgs),
    /// Import CSV Secrets
    ImportCsv(ImportCsvArgs),
    /// Setup key based SSH access on servers and onboard them in PASM vault for SSH proxy
    SetupSshProxy(SetupSshProxyArgs),
    /// Generate shell completion scripts
    Completion {
        #[command(subcommand)]
        command: CompletionCommands,
    },
}

#[derive(Args)]
pub struct LoginArgs {
    /// Login URL, e.g. https://vault.example.com/vault/1.0/Login/
    #[arg(short = 'l', long = "login-url", alias = "login-URL")]
    pub login_url: String,

    /// Login username. You will be prompted to enter if not provided.
    #[arg(short, long)]
    pub username: Option<String>,

    /// Login password. You will be prompted to enter if not provided.
    #[arg(short, long)]
    pub password: Option<String>,

    /// CA Certificate to verify PASM Vault server with
    #[arg(short = 'C', long)]
    pub cacert: Option<PathBuf>,
}

/// Repeated `--tagkey` / `--tagvalue` pairs
#[derive(Args, Default)]
pub struct TagArgs {
    /// Tag key. This option is repeatable.
    #[arg(short = 't', long)]
    pub tagkey: Vec<String>,

    /// Tag value, plain text or a JSON object. This option is repeatable.
    #[arg(short = 'v', long)]
    pub tagvalue: Vec<String>,
}

/// Box attributes shared by create-box and update-box
#[derive(Args, Default)]
pub struct BoxSettingsArgs {
    /// Short description for the Box
    #[arg(short, long)]
    pub description: Option<String>,

    /// Maximum number of Secret versions to persist
    #[arg(short, long)]
    pub max_secret_versions: Option<i64>,

    /// Lease duration enforced for checked out Secrets within the Box
    #[arg(short, long)]
    pub lease_duration: Option<String>,

    /// (FOR FUTURE USE ONLY) Whether leases are renewable
    #[arg(short = 'L', long, hide = true)]
    pub lease_renewable: Option<String>,

    /// Duration on which Secrets in the Box will be rotated
    #[arg(short, long)]
    pub rotation_duration: Option<String>,

    /// Rotate Secrets on checkin: enable or disable
    #[arg(short = 'o', long)]
    pub rotation_on_checkin: Option<String>,

    /// Force rotation of Secrets in the Box: enable or disable
    #[arg(short = 'f', long)]
    pub rotation_force: Option<String>,

    /// Make all Secret checkouts exclusive: enable or disable
    #[arg(short = 'x', long)]
    pub exclusive_checkout: Option<String>,

    /// Expiration duration for Secrets created without --expires-at
    #[arg(short = 'D', long)]
    pub secret_duration: Option<String>,
}

#[derive(Args)]
pub struct CreateBoxArgs {
    /// Name of the Box
    #[arg(short, long)]
    pub name: String,

    #[command(flatten)]
    pub settings: BoxSettingsArgs,

    #[command(flatten)]
    pub tags: TagArgs,
}

/// Use "unset" to clear description, durations and toggles.
#[derive(Args)]
pub struct UpdateBoxArgs {
    /// Id or name of the Box
    #[arg(short, long)]
    pub boxid: String,

    /// Revision number of the box
    #[arg(short = 'R', long)]
    pub revision: i64,

    #[command(flatten)]
    pub settings: BoxSettingsArgs,

    #[command(flatten)]
    pub tags: TagArgs,
}

#[derive(Args)]
pub struct CreateKvSecretArgs {
    /// Id or name of the Box
    #[arg(short, long)]
    pub boxid: String,

    /// Name of the Secret
    #[arg(short, long)]
    pub name: String,

    /// Short description for the Secret
    #[arg(short, long)]
    pub description: Option<String>,

    /// The key to associate with the Secret data. This option is repeatable.
    #[arg(short = 'X', long)]
    pub datakey: Vec<String>,

    /// Value corresponding to specific Secret data. This option is repeatable.
    #[arg(short = 'Y', long)]
    pub datavalue: Vec<String>,

    #[command(flatten)]
    pub tags: TagArgs,

    /// Expiration time in RFC 3339 format
    #[arg(short, long, alias = "expires_at")]
    pub expires_at: Option<String>,
}

#[derive(Args)]
pub struct CreateFileSecretArgs {
    /// Id or name of the Box
    #[arg(short, long)]
    pub boxid: String,

    /// Name of the Secret
    #[arg(short, long)]
    pub name: String,

    /// Short description for the Secret
    #[arg(short, long)]
    pub description: Option<String>,

    /// File to store as Secret data (at most 5 MB)
    #[arg(short, long)]
    pub filename: PathBuf,

    #[command(flatten)]
    pub tags: TagArgs,

    /// Expiration time in RFC 3339 format
    #[arg(short, long, alias = "expires_at")]
    pub expires_at: Option<String>,
}

/// Secret attributes that override the Box settings
#[derive(Args, Default)]
pub struct SecretSettingsArgs {
    /// Short description for the Secret
    #[arg(short, long)]
    pub description: Option<String>,

    /// Lease duration to enforce for the Secret
    #[arg(short, long)]
    pub lease_duration: Option<String>,

    /// (FOR FUTURE USE ONLY) Whether the lease is renewable
    #[arg(short = 'L', long, hide = true)]
    pub lease_renewable: Option<String>,

    /// Duration on which the Secret will be rotated
    #[arg(short, long)]
    pub rotation_duration: Option<String>,

    /// Force rotation of the Secret: enable or disable
    #[arg(short = 'f', long)]
    pub rotation_force: Option<String>,

    /// Rotate the Secret on checkin: enable or disable
    #[arg(short = 'o', long)]
    pub rotation_on_checkin: Option<String>,

    /// Make all checkouts of the Secret exclusive: enable or disable
    #[arg(short = 'x', long)]
    pub exclusive_checkout: Option<String>,

    /// Expiration time in RFC 3339 format
    #[arg(short, long, alias = "expires_at")]
    pub expires_at: Option<String>,
}

#[derive(Args)]
pub struct CreateSshKeySecretArgs {
    /// Id or name of the Box
    #[arg(short, long)]
    pub boxid: String,

    /// Name of the Secret
    #[arg(short, long)]
    pub name: String,

    /// SSH endpoint IP/hostname
    #[arg(short = 'H', long)]
    pub host: String,

    /// SSH port
    #[arg(short = 'P', long, default_value_t = crate::vault::types::DEFAULT_SSH_PORT)]
    pub port: u16,

    /// SSH username
    #[arg(short = 'U', long)]
    pub user: String,

    /// Private key file for SSH endpoint access
    #[arg(short = 'K', long)]
    pub key_file: PathBuf,

    /// Password of the private key, if encrypted
    #[arg(short = 'W', long)]
    pub key_pwd: Option<String>,

    #[command(flatten)]
    pub settings: SecretSettingsArgs,

    #[command(flatten)]
    pub tags: TagArgs,
}

/// Use "unset" to clear description, durations, toggles and expiry.
#[derive(Args)]
pub struct UpdateSecretArgs {
    /// Id or name of the Box
    #[arg(short, long)]
    pub boxid: String,

    /// Id or name of the Secret to update
    #[arg(short, long)]
    pub secretid: String,

    /// Revision number of the Secret
    #[arg(short = 'R', long)]
    pub revision: i64,

    #[command(flatten)]
    pub settings: SecretSettingsArgs,

    #[command(flatten)]
    pub tags: TagArgs,
}

/// Paging and filtering flags of the list commands
#[derive(Args, Default)]
pub struct ListArgs {
    /// Conditional expression to filter the results
    #[arg(short = 'l', long)]
    pub filters: Option<String>,

    /// Maximum number of items to include in response
    #[arg(short, long)]
    pub max_items: Option<i64>,

    /// Field to include in the response. This option is repeatable.
    #[arg(short = 'f', long)]
    pub field: Vec<String>,

    /// Token from which subsequent items would be listed
    #[arg(short, long)]
    pub next_token: Option<String>,
}

#[derive(Args)]
pub struct ListSecretsArgs {
    /// Id or name of the Box under which to list Secrets
    #[arg(short, long)]
    pub boxid: String,

    /// List only those Secrets whose name starts with this string
    #[arg(short, long)]
    pub prefix: Option<String>,

    #[command(flatten)]
    pub list: ListArgs,
}

#[derive(Args)]
pub struct SecretIdArgs {
    /// Id or name of the Box where the Secret is
    #[arg(short, long)]
    pub boxid: String,

    /// Id or name of the Secret
    #[arg(short, long)]
    pub secretid: String,

    /// Version of the Secret
    #[arg(short, long)]
    pub version: Option<i64>,
}

#[derive(Args)]
pub struct CheckoutSecretArgs {
    #[command(flatten)]
    pub secret: SecretIdArgs,

    /// File to save lease details to (default: ~/pasmcli.data/vault_lease_<id>.txt)
    #[arg(short, long)]
    pub lease_file: Option<PathBuf>,

    /// Do not save lease info in a file
    #[arg(short, long)]
    pub dont_save_lease: bool,
}

#[derive(Args)]
pub struct CheckinSecretArgs {
    /// Lease Id with which to Checkin the Secret
    #[arg(short = 'l', long)]
    pub leaseid: Option<String>,

    /// Lease file written by checkout-secret
    #[arg(short = 'f', long)]
    pub lease_file: Option<PathBuf>,

    /// Box id or name of the Secret
    #[arg(short, long)]
    pub boxid: Option<String>,

    /// Secret id or name
    #[arg(short, long)]
    pub secretid: Option<String>,

    /// Version given at checkout
    #[arg(short, long)]
    pub version: Option<i64>,
}

#[derive(Args)]
pub struct GenPasswdArgs {
    /// Length of the password
    #[arg(short, long)]
    pub length: i64,

    /// Minimum number of upper case characters
    #[arg(short, long)]
    pub upper: Option<i64>,

    /// Minimum number of lower case characters
    #[arg(short = 'w', long)]
    pub lower: Option<i64>,

    /// Minimum number of special characters
    #[arg(short, long)]
    pub symbols: Option<i64>,

    /// Minimum number of digits
    #[arg(short, long)]
    pub nums: Option<i64>,
}

/// Policy principals; every flag is repeatable
#[derive(Args, Default)]
pub struct PrincipalArgs {
    /// Local user to add as principal
    #[arg(short = 'l', long)]
    pub local_user: Vec<String>,

    /// UPN of an AD user to add as principal
    #[arg(short = 'u', long)]
    pub ad_upn: Vec<String>,

    /// Logon name of an AD user to add as principal
    #[arg(short = 'L', long)]
    pub ad_logon_name: Vec<String>,

    /// "<DN> || <display name>" of an AD group to add as principal
    #[arg(short = 'g', long)]
    pub ad_group: Vec<String>,
}

#[derive(Args)]
pub struct CreatePolicyArgs {
    /// Name of the Policy
    #[arg(short, long)]
    pub name: String,

    /// Role of the user
    #[arg(short, long)]
    pub role: String,

    /// Short description for the Policy
    #[arg(short, long)]
    pub description: Option<String>,

    #[command(flatten)]
    pub principals: PrincipalArgs,

    /// "<box>,<secret>[,<secret>...]"; use * after the box to include all Secrets
    #[arg(short = 'R', long)]
    pub resource: Vec<String>,

    #[command(flatten)]
    pub tags: TagArgs,
}

/// Given principals and resources replace the current ones.
#[derive(Args)]
pub struct UpdatePolicyArgs {
    /// Id or name of the Policy to update
    #[arg(short, long)]
    pub policyid: String,

    /// Revision number of the Policy
    #[arg(short = 'R', long)]
    pub revision: i64,

    /// Short description for the Policy. "unset" to clear.
    #[arg(short, long)]
    pub description: Option<String>,

    #[command(flatten)]
    pub principals: PrincipalArgs,

    /// "<box>,<secret>[,<secret>...]"; use * after the box to include all Secrets
    #[arg(short = 'e', long)]
    pub resource: Vec<String>,

    #[command(flatten)]
    pub tags: TagArgs,
}

#[derive(Args)]
pub struct ListAuditMessagesArgs {
    #[command(flatten)]
    pub list: ListArgs,

    /// Show Additional Information if available
    #[arg(short, long)]
    pub include_info: bool,

    /// Convert audit message timestamp to local time
    #[arg(short = 't', long)]
    pub local_time: bool,
}

#[derive(Args)]
pub struct DownloadArgs {
    /// Directory to save the bundle in
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,
}

#[derive(Args)]
pub struct ListAdSettingsArgs {
    /// List only those AD settings prefixed with this string
    #[arg(short, long)]
    pub prefix: Option<String>,

    #[command(flatten)]
    pub list: ListArgs,
}

#[derive(Args)]
pub struct UpdateAdSettingArgs {
    /// Active Directory Setting ID or Name
    #[arg(short, long)]
    pub ad_setting_id: String,

    /// Active Directory Setting Current Revision
    #[arg(short, long)]
    pub revision: i64,

    /// Active Directory UID Attribute
    #[arg(short, long)]
    pub uid_attribute: Option<String>,

    /// Domain type
    #[arg(short = 't', long = "type")]
    pub domain_type: Option<String>,

    /// Active Directory NetBIOS name
    #[arg(short, long)]
    pub netbios_name: Option<String>,

    /// Service Account User Name. To clear, set it to "unset".
    #[arg(short, long)]
    pub service_account: Option<String>,

    /// Service Account Password
    #[arg(short = 'p', long)]
    pub service_password: Option<String>,

    /// JSON array of Domain Controllers: server_url, cacert (path), user_base_dn,
    /// group_base_dn, timeout, tls
    #[arg(short = 'j', long)]
    pub servers_json_file: Option<PathBuf>,
}

#[derive(Args)]
pub struct LocalUserArgs {
    /// Username of the local user
    #[arg(short, long)]
    pub user: String,
}

#[derive(Args)]
pub struct ImportCsvArgs {
    /// CSV file to import
    #[arg(short, long, alias = "csv_file")]
    pub csv_file: PathBuf,

    /// Secret type of the CSV rows: esxi, static or "SSH key endpoint"
    #[arg(short = 't', long, alias = "secret_type")]
    pub secret_type: String,
}

#[derive(Args)]
pub struct SetupSshProxyArgs {
    /// CSV of host,port,user,password rows for the servers to set up
    #[arg(long)]
    pub servers_csv: PathBuf,

    /// Name of the box in which the secrets should be uploaded
    #[arg(short, long)]
    pub box_name: String,

    /// Secret name pattern; its '*' is replaced by a running number
    #[arg(long, default_value = crate::ssh::onboard::DEFAULT_SECRET_NAME_PATTERN)]
    pub secret_name_pattern: String,

    /// Description common to all created secrets
    #[arg(long, default_value = "")]
    pub secret_description: String,

    /// Expiry of the secrets in "YYYY-MM-DD" format
    #[arg(long, default_value = "")]
    pub secret_expiry: String,

    /// Lease duration for the secrets in ISO8601 format
    #[arg(long, default_value = "")]
    pub lease_duration: String,

    /// Tag assigned to the secrets
    #[arg(long, default_value = "")]
    pub tag: String,

    /// Enable exclusive checkout for the secrets
    #[arg(long)]
    pub exclusive_checkout: bool,
}

#[derive(Subcommand)]
pub enum CompletionCommands {
    /// Generate bash completion script
    Bash,
    /// Generate zsh completion script
    Zsh,
    /// Generate fish completion script
    Fish,
    /// Generate PowerShell completion script
    PowerShell,
}

impl CompletionCommands {
    pub fn shell(&self) -> Shell {
        match self {
            CompletionCommands::Bash => Shell::Bash,
            CompletionCommands::Zsh => Shell::Zsh,
            CompletionCommands::Fish => Shell::Fish,
            CompletionCommands::PowerShell => Shell::PowerShell,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "pasmcli",
            "list-secrets",
            "-b",
            "box1",
            "--json",
            "--token-file",
            "/tmp/tok.txt",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.token_file, Some(PathBuf::from("/tmp/tok.txt")));
        match cli.command {
            Commands::ListSecrets(args) => assert_eq!(args.boxid, "box1"),
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn test_repeated_tag_pairs() {
        let cli = Cli::try_parse_from([
            "pasmcli", "create-box", "-n", "b", "-t", "env", "-v", "prod", "-t", "team", "-v",
            "ops",
        ])
        .unwrap();
        match cli.command {
            Commands::CreateBox(args) => {
                assert_eq!(args.tags.tagkey, vec!["env", "team"]);
                assert_eq!(args.tags.tagvalue, vec!["prod", "ops"]);
            }
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn test_checkout_version_is_optional() {
        let cli =
            Cli::try_parse_from(["pasmcli", "checkout-secret", "-b", "b", "-s", "s"]).unwrap();
        match cli.command {
            Commands::CheckoutSecret(args) => {
                assert_eq!(args.secret.version, None);
                assert!(!args.dont_save_lease);
            }
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn test_ssh_key_secret_port_defaults_to_22() {
        let cli = Cli::try_parse_from([
            "pasmcli",
            "create-ssh-key-secret",
            "-b",
            "b",
            "-n",
            "jump",
            "-H",
            "10.0.0.5",
            "-U",
            "root",
            "-K",
            "id_rsa",
        ])
        .unwrap();
        match cli.command {
            Commands::CreateSshKeySecret(args) => {
                assert_eq!(args.port, 22);
                assert_eq!(args.key_file, PathBuf::from("id_rsa"));
                assert!(args.key_pwd.is_none());
            }
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn test_update_policy_resource_short_flag() {
        let cli = Cli::try_parse_from([
            "pasmcli", "update-policy", "-p", "ops", "-R", "2", "-e", "box1,*", "-l", "alice",
        ])
        .unwrap();
        match cli.command {
            Commands::UpdatePolicy(args) => {
                assert_eq!(args.revision, 2);
                assert_eq!(args.resource, vec!["box1,*"]);
                assert_eq!(args.principals.local_user, vec!["alice"]);
            }
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn test_update_secret_requires_revision() {
        assert!(Cli::try_parse_from(["pasmcli", "update-secret", "-b", "b", "-s", "s"]).is_err());
    }

    #[test]
    fn test_update_ad_settings_alias() {
        assert!(Cli::try_parse_from([
            "pasmcli",
            "update-ad-settings",
            "-a",
            "ad1",
            "-r",
            "2",
            "-t",
            "ad"
        ])
        .is_ok());
    }
}
