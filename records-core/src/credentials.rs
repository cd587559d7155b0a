use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use tracing::debug;

use crate::config::{AuthFlavour, DirectSettings};
use crate::error::RecordError;

/// Produces the password used for the next connection attempt.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn token(&self) -> Result<String, RecordError>;
}

enum Signer {
    Rds(aws_sdk_rds::auth_token::AuthTokenGenerator),
    Dsql {
        generator: aws_sdk_dsql::auth_token::AuthTokenGenerator,
        admin: bool,
    },
}

/// IAM database authentication: every call signs a fresh token with the
/// function's execution role.
pub struct IamTokenProvider {
    sdk_config: SdkConfig,
    signer: Signer,
}

impl IamTokenProvider {
    pub async fn new(settings: &DirectSettings) -> Result<Self, RecordError> {
        let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        Self::with_sdk_config(settings, sdk_config)
    }

    pub fn with_sdk_config(
        settings: &DirectSettings,
        sdk_config: SdkConfig,
    ) -> Result<Self, RecordError> {
        if settings.host.is_empty() || settings.user.is_empty() {
            return Err(RecordError::Config(
                "token signing needs a host and a user".to_string(),
            ));
        }
        let region: Region = sdk_config
            .region()
            .cloned()
            .ok_or_else(|| RecordError::Config("AWS region not configured".to_string()))?;

        let signer = match settings.auth {
            AuthFlavour::Rds => {
                let config = aws_sdk_rds::auth_token::Config::builder()
                    .hostname(&settings.host)
                    .port(u64::from(settings.port))
                    .username(&settings.user)
                    .region(region)
                    .build()
                    .map_err(|e| RecordError::Config(e.to_string()))?;
                Signer::Rds(aws_sdk_rds::auth_token::AuthTokenGenerator::new(config))
            }
            AuthFlavour::Dsql => {
                let config = aws_sdk_dsql::auth_token::Config::builder()
                    .hostname(&settings.host)
                    .region(region)
                    .build()
                    .map_err(|e| RecordError::Config(e.to_string()))?;
                Signer::Dsql {
                    generator: aws_sdk_dsql::auth_token::AuthTokenGenerator::new(config),
                    admin: settings.user == "admin",
                }
            }
        };

        Ok(Self { sdk_config, signer })
    }
}

#[async_trait]
impl CredentialProvider for IamTokenProvider {
    async fn token(&self) -> Result<String, RecordError> {
        let token = match &self.signer {
            Signer::Rds(generator) => generator
                .auth_token(&self.sdk_config)
                .await
                .map(|t| t.to_string()),
            Signer::Dsql { generator, admin } if *admin => generator
                .db_connect_admin_auth_token(&self.sdk_config)
                .await
                .map(|t| t.to_string()),
            Signer::Dsql { generator, .. } => generator
                .db_connect_auth_token(&self.sdk_config)
                .await
                .map(|t| t.to_string()),
        }
        .map_err(|e| RecordError::Connectivity(format!("token generation failed: {e}")))?;

        debug!("generated database auth token");
        Ok(token)
    }
}
