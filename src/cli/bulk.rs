use crate::cli::args::{ImportCsvArgs, SetupSshProxyArgs};
use crate::cli::commands::VaultContext;
use crate::ssh::onboard::IMPORT_ACTION;
use crate::ssh::{
    provision_from_csv, upload_provisioned, CommonSecretMetadata, RsaKeySource, Ssh2Provisioner,
};
use crate::utils::errors::Result;
use crate::vault::client::MultipartParams;

pub async fn import_csv(ctx: &VaultContext, args: ImportCsvArgs) -> Result<()> {
    let params = MultipartParams {
        csv_file: Some(args.csv_file.clone()),
        public_key: None,
        secret_type: Some(args.secret_type),
    };
    let response = ctx.client.post_multipart(IMPORT_ACTION, &params).await?;
    ctx.print_response(&response, "Action denied")?;
    println!(
        "CSV file {} accepted. Starting import...\n",
        args.csv_file.display()
    );
    Ok(())
}

impl From<&SetupSshProxyArgs> for CommonSecretMetadata {
    fn from(args: &SetupSshProxyArgs) -> Self {
        Self {
            box_name: args.box_name.clone(),
            tag: args.tag.clone(),
            secret_expiry: args.secret_expiry.clone(),
            secret_name_pattern: args.secret_name_pattern.clone(),
            secret_description: args.secret_description.clone(),
            lease_duration: args.lease_duration.clone(),
            exclusive_checkout: args.exclusive_checkout,
        }
    }
}

pub async fn setup_ssh_proxy(ctx: &VaultContext, args: SetupSshProxyArgs) -> Result<()> {
    let common = CommonSecretMetadata::from(&args);
    let report = provision_from_csv(
        &args.servers_csv,
        &common,
        RsaKeySource::default(),
        Ssh2Provisioner,
    )
    .await?;

    for message in &report.skipped {
        println!("{message}");
    }
    if !report.failed.is_empty() {
        println!("\nCould not setup and onboard following servers.");
        for record in &report.failed {
            println!("{}", record.host);
        }
    }

    if report.succeeded.is_empty() {
        tracing::warn!("No server was set up, nothing to upload");
        return Ok(());
    }

    if let Some(reply) = upload_provisioned(&ctx.client, &report.succeeded, &common).await? {
        ctx.output.print_json(&reply);
    }
    println!("\n{}", upload_started_message(&common.box_name));
    Ok(())
}

/// Command that lists what a finished import created
const IMPORT_CHECK_COMMAND: &str = "list-secrets";

fn upload_started_message(box_name: &str) -> String {
    format!(
        "CSV upload started for servers for which key based SSH access setup was successful. \
         Check the created secrets using '{IMPORT_CHECK_COMMAND} --boxid {box_name}'."
    )
}
