//! Pass-through converter.
//!
//! Copies each resource spec into its configuration section under a
//! stage-qualified id. SSL entries pair a TLS binding's SNIs with the PEM
//! material of the secret it references.

use serde_json::json;

use crate::convert::{ConvertError, Converter, StageResources};
use crate::model::resource::{SECRET_CA_FIELD, SECRET_CERT_FIELD, SECRET_KEY_FIELD};
use crate::model::{Resource, StageInfo};
use crate::synchronizer::StageConfiguration;

#[derive(Debug, Clone, Default)]
pub struct DefaultConverter;

impl DefaultConverter {
    pub fn new() -> Self {
        Self
    }

    fn resource_id(stage: &StageInfo, resource: &Resource) -> String {
        format!("{}.{}.{}", stage.gateway_name, stage.stage_name, resource.name)
    }

    fn ssl_entry(
        resource: &Resource,
        resources: &StageResources,
    ) -> Result<serde_json::Value, ConvertError> {
        let binding = resource
            .tls_binding()
            .map_err(|e| ConvertError::InvalidResource {
                kind: resource.kind.clone(),
                name: resource.name.clone(),
                reason: e.to_string(),
            })?;

        let secret = resources
            .secrets
            .iter()
            .find(|s| s.name == binding.secret_ref)
            .ok_or_else(|| ConvertError::MissingSecret {
                binding: resource.name.clone(),
                secret: binding.secret_ref.clone(),
            })?;
        let data = secret
            .secret_data()
            .map_err(|e| ConvertError::InvalidResource {
                kind: secret.kind.clone(),
                name: secret.name.clone(),
                reason: e.to_string(),
            })?;

        Ok(json!({
            "snis": binding.snis,
            "cert": data.field(SECRET_CERT_FIELD),
            "key": data.field(SECRET_KEY_FIELD),
            "ca": data.field(SECRET_CA_FIELD),
        }))
    }
}

impl Converter for DefaultConverter {
    fn convert(
        &self,
        stage: &StageInfo,
        resources: &StageResources,
    ) -> Result<StageConfiguration, ConvertError> {
        let mut config = StageConfiguration::empty(&stage.gateway_name, &stage.stage_name);

        for route in &resources.routes {
            config
                .routes
                .insert(Self::resource_id(stage, route), route.spec.clone());
        }
        for service in &resources.services {
            config
                .services
                .insert(Self::resource_id(stage, service), service.spec.clone());
        }
        for metadata in &resources.plugin_metadata {
            // Plugin metadata is keyed by plugin name, not by stage
            config
                .plugin_metadata
                .insert(metadata.name.clone(), metadata.spec.clone());
        }
        for binding in &resources.tls_bindings {
            let entry = Self::ssl_entry(binding, resources)?;
            config.ssls.insert(Self::resource_id(stage, binding), entry);
        }

        Ok(config)
    }
}
