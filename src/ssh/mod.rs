pub mod keys;
pub mod onboard;
pub mod session;

pub use keys::{GeneratedKey, KeyMaterialSource, RsaKeySource};
pub use onboard::{
    provision_from_csv, upload_provisioned, CommonSecretMetadata, ProvisioningReport,
    SshServerRecord,
};
pub use session::{HostProvisioner, Ssh2Provisioner};
