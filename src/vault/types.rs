//! Request and response bodies of the Vault REST API.

use crate::utils::errors::{Result, VaultCliError};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Optional request field that distinguishes "not given" from "cleared".
///
/// `Absent` is skipped on the wire, `Null` is sent as JSON `null` and
/// `Value` carries the new setting.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Field<T> {
    #[default]
    Absent,
    Null,
    Value(T),
}

impl<T> Field<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Field::Absent)
    }
}

impl<T> From<Option<T>> for Field<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Field::Value(v),
            None => Field::Absent,
        }
    }
}

impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Field::Value(v) => v.serialize(serializer),
            Field::Absent | Field::Null => serializer.serialize_none(),
        }
    }
}

const UNSET: &str = "unset";

/// Text flag where `unset` clears the server value.
pub fn text_field(value: Option<String>, allow_unset: bool) -> Field<String> {
    match value {
        None => Field::Absent,
        Some(v) if allow_unset && v == UNSET => Field::Null,
        Some(v) => Field::Value(v),
    }
}

/// `enable` / `disable` flag, plus `unset` where clearing is allowed.
pub fn toggle_field(flag: &str, value: Option<&str>, allow_unset: bool) -> Result<Field<bool>> {
    match value {
        None => Ok(Field::Absent),
        Some("enable") => Ok(Field::Value(true)),
        Some("disable") => Ok(Field::Value(false)),
        Some(UNSET) if allow_unset => Ok(Field::Null),
        Some(other) => {
            let supported = if allow_unset {
                "enable, disable and unset"
            } else {
                "enable and disable"
            };
            Err(VaultCliError::InvalidInput(format!(
                "Invalid --{flag} option {other}. Supported: {supported}"
            )))
        }
    }
}

/// Pair up repeated `--xkey` / `--xvalue` flags. JSON object values are
/// embedded as objects, anything else is sent as a string.
pub fn key_value_map(what: &str, keys: &[String], values: &[String]) -> Result<Option<Map<String, Value>>> {
    if keys.is_empty() && values.is_empty() {
        return Ok(None);
    }
    if keys.is_empty() || values.is_empty() {
        return Err(VaultCliError::InvalidInput(format!(
            "Please provide both {what} key & values"
        )));
    }
    if keys.len() != values.len() {
        return Err(VaultCliError::InvalidInput(format!(
            "Please provide equal number of {what} keys & values"
        )));
    }

    let map = keys
        .iter()
        .zip(values)
        .map(|(k, v)| {
            let value = match serde_json::from_str::<Value>(v) {
                Ok(obj @ Value::Object(_)) => obj,
                _ => Value::String(v.clone()),
            };
            (k.clone(), value)
        })
        .collect();
    Ok(Some(map))
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub expires_at: String,
    #[serde(default)]
    pub user: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenewResponse {
    pub access_token: String,
    pub expires_at: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct LeaseSettings {
    #[serde(skip_serializing_if = "Field::is_absent")]
    pub duration: Field<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct RotationSettings {
    #[serde(skip_serializing_if = "Field::is_absent")]
    pub duration: Field<String>,
    #[serde(skip_serializing_if = "Field::is_absent")]
    pub force: Field<bool>,
    #[serde(skip_serializing_if = "Field::is_absent")]
    pub on_checkin: Field<bool>,
}

impl RotationSettings {
    pub fn is_empty(&self) -> bool {
        self.duration.is_absent() && self.force.is_absent() && self.on_checkin.is_absent()
    }
}

/// Box attributes shared by create and update.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct BoxSettings {
    #[serde(skip_serializing_if = "Field::is_absent")]
    pub description: Field<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease: Option<LeaseSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_secret_versions: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<RotationSettings>,
    #[serde(skip_serializing_if = "Field::is_absent")]
    pub exclusive_checkout: Field<bool>,
    #[serde(skip_serializing_if = "Field::is_absent")]
    pub secret_duration: Field<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateBoxRequest {
    pub name: String,
    #[serde(flatten)]
    pub settings: BoxSettings,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateBoxRequest {
    pub box_id: String,
    pub revision: i64,
    #[serde(flatten)]
    pub settings: BoxSettings,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SecretSubtype {
    Kv,
    File { info: FileInfo },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FileInfo {
    pub filename: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateSecretRequest {
    pub box_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    pub secret_data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    pub secret_subtype_info: SecretSubtype,
}

/// Secret level overrides of the box attributes, shared by the SSH key
/// secret and update-secret payloads.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct SecretSettings {
    #[serde(rename = "desc", skip_serializing_if = "Field::is_absent")]
    pub description: Field<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease: Option<LeaseSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<RotationSettings>,
    #[serde(skip_serializing_if = "Field::is_absent")]
    pub exclusive_checkout: Field<bool>,
    #[serde(skip_serializing_if = "Field::is_absent")]
    pub expires_at: Field<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateSecretRequest {
    pub box_id: String,
    pub secret_id: String,
    pub revision: i64,
    #[serde(flatten)]
    pub settings: SecretSettings,
}

pub const MANAGED_SECRET: &str = "managed";
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Connection data of an SSH key endpoint; the private key is base64 of the key file.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SshKeyData {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub private_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key_pwd: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SecretConfig {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateSshKeySecretRequest {
    pub secret_type: &'static str,
    pub box_id: String,
    pub name: String,
    pub secret_data: SshKeyData,
    pub secret_config: SecretConfig,
    #[serde(flatten)]
    pub settings: SecretSettings,
}

/// Paging and filtering options common to the list endpoints.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ListOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListSecretsRequest {
    pub box_id: String,
    #[serde(flatten)]
    pub options: ListOptions,
}

#[derive(Debug, Clone, Serialize)]
pub struct SecretRef {
    pub box_id: String,
    pub secret_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaseRef {
    pub lease_id: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PasswordConditions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nums: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbols: Option<i64>,
}

impl PasswordConditions {
    pub fn is_empty(&self) -> bool {
        self.upper.is_none() && self.lower.is_none() && self.nums.is_none() && self.symbols.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratePasswordRequest {
    pub length: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<PasswordConditions>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Principal {
    LocalUser { username: String },
    AdUser(AdUser),
    AdGroup { dn: String, display_name: String },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum AdUser {
    Upn { upn: String },
    LogonName { logon_name: String },
}

impl Principal {
    /// Parse `"<dn> || <display name>"`.
    pub fn ad_group(value: &str) -> Result<Self> {
        let parts: Vec<&str> = value.split("||").map(str::trim).collect();
        match parts.as_slice() {
            [dn, display_name] => Ok(Principal::AdGroup {
                dn: dn.to_string(),
                display_name: display_name.to_string(),
            }),
            _ => Err(VaultCliError::InvalidInput(format!(
                "Invalid ad-group argument: {value}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PolicyResource {
    pub box_id: String,
    pub secret_id: Vec<String>,
}

impl PolicyResource {
    /// Parse `"<box>,<secret>[,<secret>...]"`; `*` selects every secret.
    pub fn parse(value: &str) -> Result<Self> {
        let mut parts = value.split(',').map(str::trim);
        let box_id = parts.next().unwrap_or_default().to_string();
        let secret_id: Vec<String> = parts.map(str::to_string).collect();
        if secret_id.is_empty() {
            return Err(VaultCliError::InvalidInput(format!(
                "Invalid resource argument: {value}"
            )));
        }
        Ok(Self { box_id, secret_id })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatePolicyRequest {
    pub name: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principals: Option<Vec<Principal>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<Vec<PolicyResource>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdatePolicyRequest {
    pub policy_id: String,
    pub revision: i64,
    #[serde(rename = "desc", skip_serializing_if = "Field::is_absent")]
    pub description: Field<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principals: Option<Vec<Principal>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<Vec<PolicyResource>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AdServer {
    pub server_url: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub tls: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_base_dn: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub group_base_dn: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub timeout: i64,
    /// Path on input, base64 of the PEM file on the wire
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cacert: String,
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateAdSettingRequest {
    pub ad_setting_id: String,
    pub revision: i64,
    #[serde(skip_serializing_if = "Field::is_absent")]
    pub service_account: Field<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid_attribute: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub domain_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub netbios_name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<AdServer>,
}

impl UpdateAdSettingRequest {
    /// True when no attribute besides id and revision would change
    pub fn is_noop(&self) -> bool {
        self.service_account.is_absent()
            && self.service_password.is_none()
            && self.uid_attribute.is_none()
            && self.domain_type.is_none()
            && self.netbios_name.is_none()
            && self.servers.is_empty()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdSettingResponse {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ad_setting_id: String,
    #[serde(default)]
    pub revision: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsernameRequest {
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuditMessage {
    pub created_at: String,
    #[serde(default)]
    pub user_context: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub info: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuditMessages {
    #[serde(default, rename = "audit_messages")]
    pub messages: Vec<AuditMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutLease {
    #[serde(default)]
    pub lease_id: Option<Value>,
    #[serde(default)]
    pub expires_at: Option<String>,
    #[serde(default)]
    pub renewable: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubtypeInfo {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub info: Option<Map<String, Value>>,
}

impl SubtypeInfo {
    pub fn is_file(&self) -> bool {
        self.kind.as_deref() == Some("file")
    }

    pub fn filename(&self) -> Option<&str> {
        self.info.as_ref()?.get("filename")?.as_str()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutResponse {
    pub secret_data: Option<Value>,
    #[serde(default)]
    pub secret_subtype_info: SubtypeInfo,
    #[serde(default)]
    pub lease: Option<CheckoutLease>,
}

/// Render a JSON scalar the way the server sent it, without quotes for strings.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
