use crate::cli::args::{
    CreatePolicyArgs, DownloadArgs, ListAdSettingsArgs, ListAuditMessagesArgs, LocalUserArgs,
    PrincipalArgs, UpdateAdSettingArgs, UpdatePolicyArgs,
};
use crate::cli::commands::VaultContext;
use crate::utils::errors::{Result, VaultCliError};
use crate::utils::output::pretty_json;
use crate::utils::time::{parse_server_time, rfc1123};
use crate::vault::client::RawResponse;
use crate::vault::tls::load_ca_roots;
use crate::vault::types::{
    display_value, key_value_map, AdServer, AdSettingResponse, AdUser, AuditMessages,
    text_field, CreatePolicyRequest, Field, ListOptions, PolicyResource, Principal,
    UpdateAdSettingRequest, UpdatePolicyRequest, UsernameRequest,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Local;
use reqwest::Method;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Downloadable audit bundle: server action and the name used in messages.
#[derive(Debug, Clone, Copy)]
pub struct Bundle {
    pub action: &'static str,
    pub label: &'static str,
}

pub const AUDIT_BUNDLE: Bundle = Bundle {
    action: "GetAuditBundle",
    label: "audit log bundle",
};

pub const SSH_PROXY_AUDIT_BUNDLE: Bundle = Bundle {
    action: "GetSSHProxyAuditBundle",
    label: "ssh proxy audit log bundle",
};

pub fn policy_principals(args: &PrincipalArgs) -> Result<Option<Vec<Principal>>> {
    let mut principals: Vec<Principal> = args
        .local_user
        .iter()
        .map(|username| Principal::LocalUser {
            username: username.clone(),
        })
        .collect();
    principals.extend(
        args.ad_upn
            .iter()
            .map(|upn| Principal::AdUser(AdUser::Upn { upn: upn.clone() })),
    );
    principals.extend(args.ad_logon_name.iter().map(|name| {
        Principal::AdUser(AdUser::LogonName {
            logon_name: name.clone(),
        })
    }));
    for group in &args.ad_group {
        principals.push(Principal::ad_group(group)?);
    }

    Ok((!principals.is_empty()).then_some(principals))
}

/// Parse `--resource` flags, `None` when none were given.
pub fn policy_resources(resources: &[String]) -> Result<Option<Vec<PolicyResource>>> {
    if resources.is_empty() {
        return Ok(None);
    }
    resources
        .iter()
        .map(|r| PolicyResource::parse(r))
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

pub async fn create_policy(ctx: &VaultContext, args: CreatePolicyArgs) -> Result<()> {
    let request = CreatePolicyRequest {
        name: args.name,
        role: args.role,
        desc: args.description,
        principals: policy_principals(&args.principals)?,
        resources: policy_resources(&args.resource)?,
        tags: key_value_map("tag", &args.tags.tagkey, &args.tags.tagvalue)?,
    };
    let response = ctx.client.send(Method::POST, "CreatePolicy", &request).await?;
    ctx.print_response(&response, "Action denied")?;
    Ok(())
}

pub async fn update_policy(ctx: &VaultContext, args: UpdatePolicyArgs) -> Result<()> {
    let request = UpdatePolicyRequest {
        policy_id: args.policyid,
        revision: args.revision,
        description: text_field(args.description, true),
        principals: policy_principals(&args.principals)?,
        resources: policy_resources(&args.resource)?,
        tags: key_value_map("tag", &args.tags.tagkey, &args.tags.tagvalue)?,
    };
    let response = ctx.client.send(Method::POST, "UpdatePolicy", &request).await?;
    ctx.print_response(&response, "Policy not found")?;
    Ok(())
}

/// Text rendering of audit messages: `<timestamp> <user> <message>`, then
/// `name: value` lines for additional info when requested.
pub fn format_audit_messages(
    messages: &AuditMessages,
    include_info: bool,
    local_time: bool,
) -> Vec<String> {
    let mut lines = Vec::new();
    for msg in &messages.messages {
        // Unparseable timestamps are skipped
        let Some(created_at) = parse_server_time(&msg.created_at) else {
            continue;
        };
        let ts = if local_time {
            rfc1123(&created_at.with_timezone(&Local))
        } else {
            rfc1123(&created_at)
        };
        lines.push(format!("{ts} {} {}", msg.user_context, msg.message));

        if let Some(info) = msg.info.as_ref().filter(|_| include_info) {
            lines.extend(
                info.iter()
                    .map(|(name, value)| format!("{name}: {}", display_value(value))),
            );
        }
    }
    lines
}

pub async fn list_audit_messages(ctx: &VaultContext, args: ListAuditMessagesArgs) -> Result<()> {
    let request: ListOptions = args.list.into();
    let url = ctx.client.endpoint("ListAuditMessages");
    let data = ctx
        .client
        .call(Method::POST, &url, &request, &RawResponse)
        .await
        .map_err(|e| match e {
            VaultCliError::Api(api) if api.is_not_found() => {
                VaultCliError::NotFound("Audit messages not found".to_string())
            }
            other => other,
        })?;

    if data.is_empty() {
        return Err(VaultCliError::ServerReported("Empty response".to_string()));
    }

    if ctx.output.json {
        let value: Value = serde_json::from_slice(&data).map_err(|_| {
            VaultCliError::UnexpectedResponse(String::from_utf8_lossy(&data).into_owned())
        })?;
        println!("{}", pretty_json(&value));
        return Ok(());
    }

    let messages: AuditMessages = serde_json::from_slice(&data).map_err(|e| {
        VaultCliError::UnexpectedResponse(format!("Invalid response - {e}"))
    })?;
    ctx.output
        .print_list(&format_audit_messages(&messages, args.include_info, args.local_time));
    Ok(())
}

pub async fn download_bundle(ctx: &VaultContext, bundle: Bundle, args: DownloadArgs) -> Result<()> {
    let target = ctx.client.download(bundle.action, &args.output_dir).await?;
    println!(
        "\nSuccessfully downloaded {} as - {}\n",
        bundle.label,
        target.display()
    );
    Ok(())
}

pub async fn list_ad_settings(ctx: &VaultContext, args: ListAdSettingsArgs) -> Result<()> {
    let request = ListOptions {
        prefix: args.prefix,
        ..args.list.into()
    };
    let response = ctx
        .client
        .send(Method::POST, "ListADSettings", &request)
        .await?;
    ctx.print_response(&response, "AD Settings not found")?;
    Ok(())
}

/// Read the domain controller list, replacing each `cacert` path with the
/// base64 of the PEM file it names.
pub fn load_ad_servers(path: &Path) -> Result<Vec<AdServer>> {
    let content = fs::read_to_string(path).map_err(|e| {
        VaultCliError::InvalidInput(format!("Error opening file {} - {e}", path.display()))
    })?;
    let mut servers: Vec<AdServer> = serde_json::from_str(&content).map_err(|e| {
        VaultCliError::InvalidInput(format!("Error decoding Servers JSON - {e}"))
    })?;

    for server in servers.iter_mut().filter(|s| !s.cacert.is_empty()) {
        let ca_path = Path::new(&server.cacert);
        load_ca_roots(ca_path)?;
        let pem = fs::read(ca_path)?;
        server.cacert = STANDARD.encode(pem);
    }
    Ok(servers)
}

pub fn ad_setting_request(args: UpdateAdSettingArgs) -> Result<UpdateAdSettingRequest> {
    let servers = match &args.servers_json_file {
        Some(path) => load_ad_servers(path)?,
        None => Vec::new(),
    };
    let service_account = match args.service_account {
        // The server clears the account on an empty string, not null
        Some(account) if account == "unset" => Field::Value(String::new()),
        other => other.into(),
    };

    let request = UpdateAdSettingRequest {
        ad_setting_id: args.ad_setting_id,
        revision: args.revision,
        service_account,
        service_password: args.service_password,
        uid_attribute: args.uid_attribute,
        domain_type: args.domain_type,
        netbios_name: args.netbios_name,
        servers,
    };
    if request.is_noop() {
        return Err(VaultCliError::InvalidInput(
            "One or more parameter(s) is missing.".to_string(),
        ));
    }
    Ok(request)
}

pub async fn update_ad_setting(ctx: &VaultContext, args: UpdateAdSettingArgs) -> Result<()> {
    let request = ad_setting_request(args)?;
    let response: AdSettingResponse = ctx.client.post_json("UpdateADSetting", &request).await?;

    if !ctx.output.json {
        println!("\nActive Directory Setting updated successfully.\n");
    }
    ctx.output.print_key_value(&[
        ("Revision", response.revision.to_string()),
        ("Name", response.name),
        ("ID", response.ad_setting_id),
    ]);
    Ok(())
}

pub async fn get_local_user(ctx: &VaultContext, args: LocalUserArgs) -> Result<()> {
    let request = UsernameRequest { username: args.user };
    let response = ctx
        .client
        .send(Method::POST, "GetLocalUser", &request)
        .await?;
    ctx.print_response(&response, "Action denied")?;
    Ok(())
}

pub async fn delete_local_user(ctx: &VaultContext, args: LocalUserArgs) -> Result<()> {
    let request = UsernameRequest {
        username: args.user.clone(),
    };
    let response = ctx
        .client
        .send(Method::POST, "DeleteLocalUser", &request)
        .await?;
    ctx.print_response(&response, "Action denied")?;
    println!(
        "Local user successfully deleted for username/ID {}\n",
        args.user
    );
    Ok(())
}
