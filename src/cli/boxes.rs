use crate::cli::args::{BoxSettingsArgs, CreateBoxArgs, TagArgs, UpdateBoxArgs};
use crate::cli::commands::VaultContext;
use crate::utils::errors::{Result, VaultCliError};
use crate::vault::types::{
    key_value_map, text_field, toggle_field, BoxSettings, CreateBoxRequest, LeaseSettings,
    RotationSettings, UpdateBoxRequest,
};
use reqwest::Method;

/// Lease attributes; `--lease-renewable` is reserved and always rejected.
pub fn lease_settings(
    duration: Option<String>,
    renewable: Option<&str>,
    allow_unset: bool,
) -> Result<Option<LeaseSettings>> {
    if renewable.is_some() {
        return Err(VaultCliError::InvalidInput(
            "FOR FUTURE USE ONLY: --lease-renewable not supported yet".to_string(),
        ));
    }
    Ok(duration.map(|duration| LeaseSettings {
        duration: text_field(Some(duration), allow_unset),
    }))
}

/// Rotation attributes, `None` when no rotation flag was given.
pub fn rotation_settings(
    duration: Option<String>,
    force: Option<&str>,
    on_checkin: Option<&str>,
    allow_unset: bool,
) -> Result<Option<RotationSettings>> {
    let rotation = RotationSettings {
        duration: text_field(duration, allow_unset),
        force: toggle_field("rotation-force", force, allow_unset)?,
        on_checkin: toggle_field("rotation-on-checkin", on_checkin, allow_unset)?,
    };
    Ok((!rotation.is_empty()).then_some(rotation))
}

/// Build box attributes from flags. With `allow_unset`, the value `unset`
/// clears the attribute on the server.
pub fn box_settings(args: BoxSettingsArgs, tags: TagArgs, allow_unset: bool) -> Result<BoxSettings> {
    let lease = lease_settings(
        args.lease_duration,
        args.lease_renewable.as_deref(),
        allow_unset,
    )?;
    let rotation = rotation_settings(
        args.rotation_duration,
        args.rotation_force.as_deref(),
        args.rotation_on_checkin.as_deref(),
        allow_unset,
    )?;

    Ok(BoxSettings {
        description: text_field(args.description, allow_unset),
        lease,
        max_secret_versions: args.max_secret_versions,
        tags: key_value_map("tag", &tags.tagkey, &tags.tagvalue)?,
        rotation,
        exclusive_checkout: toggle_field(
            "exclusive-checkout",
            args.exclusive_checkout.as_deref(),
            allow_unset,
        )?,
        secret_duration: text_field(args.secret_duration, allow_unset),
    })
}

pub async fn create_box(ctx: &VaultContext, args: CreateBoxArgs) -> Result<()> {
    let request = CreateBoxRequest {
        name: args.name,
        settings: box_settings(args.settings, args.tags, false)?,
    };
    let response = ctx.client.send(Method::POST, "CreateBox", &request).await?;
    ctx.print_response(&response, "Action denied")?;
    Ok(())
}

pub async fn update_box(ctx: &VaultContext, args: UpdateBoxArgs) -> Result<()> {
    let request = UpdateBoxRequest {
        box_id: args.boxid,
        revision: args.revision,
        settings: box_settings(args.settings, args.tags, true)?,
    };
    let response = ctx.client.send(Method::POST, "UpdateBox", &request).await?;
    ctx.print_response(&response, "Box not found")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::test_support::mock_context;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_create_settings_reject_unset() {
        let args = BoxSettingsArgs {
            exclusive_checkout: Some("unset".into()),
            ..Default::default()
        };
        let err = box_settings(args, TagArgs::default(), false).unwrap_err();
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("Supported: enable and disable"));
    }

    #[test]
    fn test_lease_renewable_is_not_supported() {
        let args = BoxSettingsArgs {
            lease_renewable: Some("enable".into()),
            ..Default::default()
        };
        let err = box_settings(args, TagArgs::default(), true).unwrap_err();
        assert!(err.to_string().contains("--lease-renewable not supported yet"));
    }

    #[test]
    fn test_update_settings_serialize_unset_as_null() {
        let args = BoxSettingsArgs {
            description: Some("unset".into()),
            lease_duration: Some("unset".into()),
            rotation_force: Some("enable".into()),
            ..Default::default()
        };
        let settings = box_settings(args, TagArgs::default(), true).unwrap();
        let request = UpdateBoxRequest {
            box_id: "b1".into(),
            revision: 3,
            settings,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "box_id": "b1",
                "revision": 3,
                "description": null,
                "lease": {"duration": null},
                "rotation": {"force": true}
            })
        );
    }

    #[tokio::test]
    async fn test_create_box_posts_name_and_tags() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vault/1.0/CreateBox/"))
            .and(body_json(json!({
                "name": "prod",
                "tags": {"env": "prod", "meta": {"team": "ops"}},
                "max_secret_versions": 5
            })))
            .respond_with(ResponseTemplate::new(201).set_body_string(r#"{"box_id":"b-1"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let args = CreateBoxArgs {
            name: "prod".into(),
            settings: BoxSettingsArgs {
                max_secret_versions: Some(5),
                ..Default::default()
            },
            tags: TagArgs {
                tagkey: vec!["env".into(), "meta".into()],
                tagvalue: vec!["prod".into(), r#"{"team":"ops"}"#.into()],
            },
        };
        create_box(&mock_context(&server), args).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_box_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vault/1.0/UpdateBox/"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let args = UpdateBoxArgs {
            boxid: "missing".into(),
            revision: 1,
            settings: BoxSettingsArgs::default(),
            tags: TagArgs::default(),
        };
        let err = update_box(&mock_context(&server), args).await.unwrap_err();
        assert_eq!(err.exit_code(), 5);
        assert_eq!(err.to_string(), "Box not found");
    }
}
