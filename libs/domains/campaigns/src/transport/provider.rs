use crate::error::{CampaignError, CampaignResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which delivery backend a job uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    /// The platform's own SES account
    #[default]
    SharedSes,
    /// The customer's SES account
    CustomSes,
    Smtp,
}

#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    #[serde(default, alias = "user")]
    pub username: String,
    #[serde(default, alias = "pass")]
    pub password: String,
}

impl fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SesSettings {
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl fmt::Debug for SesSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SesSettings")
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Per-job delivery settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    #[serde(default)]
    pub provider: ProviderKind,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub reply_to: Option<String>,
    /// Footer language (`ro`, `en`, `el`)
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub smtp_config: Option<SmtpSettings>,
    #[serde(default)]
    pub ses_config: Option<SesSettings>,
}

/// Identity of a transport instance.
///
/// Configs that differ only in sender, reply-to or language share one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TransportKey {
    SharedSes,
    CustomSes(SesSettings),
    Smtp(SmtpSettings),
}

impl ProviderConfig {
    pub fn shared_ses() -> Self {
        Self::default()
    }

    pub fn smtp(settings: SmtpSettings) -> Self {
        Self {
            provider: ProviderKind::Smtp,
            smtp_config: Some(settings),
            ..Self::default()
        }
    }

    pub fn custom_ses(settings: SesSettings) -> Self {
        Self {
            provider: ProviderKind::CustomSes,
            ses_config: Some(settings),
            ..Self::default()
        }
    }

    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Check that the selected provider has the settings it needs
    pub fn validate(&self) -> CampaignResult<()> {
        self.transport_key().map(|_| ())
    }

    pub fn transport_key(&self) -> CampaignResult<TransportKey> {
        match self.provider {
            ProviderKind::SharedSes => Ok(TransportKey::SharedSes),
            ProviderKind::CustomSes => {
                let settings = self.ses_config.clone().ok_or_else(|| {
                    CampaignError::ProviderConfig("custom-ses requires sesConfig".into())
                })?;
                if settings.region.trim().is_empty()
                    || settings.access_key_id.trim().is_empty()
                    || settings.secret_access_key.trim().is_empty()
                {
                    return Err(CampaignError::ProviderConfig(
                        "sesConfig needs region, accessKeyId and secretAccessKey".into(),
                    ));
                }
                Ok(TransportKey::CustomSes(settings))
            }
            ProviderKind::Smtp => {
                let settings = self.smtp_config.clone().ok_or_else(|| {
                    CampaignError::ProviderConfig("smtp requires smtpConfig".into())
                })?;
                if settings.host.trim().is_empty() || settings.port == 0 {
                    return Err(CampaignError::ProviderConfig(
                        "smtpConfig needs host and port".into(),
                    ));
                }
                Ok(TransportKey::Smtp(settings))
            }
        }
    }
}
