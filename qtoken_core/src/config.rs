//! Configuration surface: security parameter, verifier identity and the
//! pre-shared holder secrets.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::store::{SecretRegistry, SharedSecret};

pub const DEFAULT_LAMBDA: usize = 8;
pub const REFERENCE_HOLDER_ID: &str = "client_alice";
pub const REFERENCE_SECRET: &str = "secret_token_abc123";
pub const REFERENCE_VERIFIER_ID: &str = "merchant_shop_xyz";

/// Secrets are held as [`SharedSecret`] from the moment they are parsed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HolderEntry {
    pub holder_id: String,
    pub secret: SharedSecret,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProtocolConfig {
    #[serde(default = "default_lambda")]
    pub lambda: usize,
    pub verifier_id: String,
    #[serde(default)]
    pub holders: Vec<HolderEntry>,
}

fn default_lambda() -> usize {
    DEFAULT_LAMBDA
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self::reference()
    }
}

impl ProtocolConfig {
    /// λ = 8, one holder, one merchant.
    pub fn reference() -> Self {
        Self {
            lambda: DEFAULT_LAMBDA,
            verifier_id: REFERENCE_VERIFIER_ID.to_string(),
            holders: vec![HolderEntry {
                holder_id: REFERENCE_HOLDER_ID.to_string(),
                secret: SharedSecret::from(REFERENCE_SECRET),
            }],
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self, ProtocolError> {
        let config: Self = serde_json::from_str(text)
            .map_err(|err| ProtocolError::invalid_config(format!("parsing config: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ProtocolError> {
        let text = fs::read_to_string(path).map_err(|err| {
            ProtocolError::invalid_config(format!("reading {}: {err}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    pub fn with_lambda(mut self, lambda: usize) -> Self {
        self.lambda = lambda;
        self
    }

    pub fn with_verifier(mut self, verifier_id: impl Into<String>) -> Self {
        self.verifier_id = verifier_id.into();
        self
    }

    pub fn with_holder(
        mut self,
        holder_id: impl Into<String>,
        secret: impl Into<SharedSecret>,
    ) -> Self {
        let holder_id = holder_id.into();
        self.holders.retain(|entry| entry.holder_id != holder_id);
        self.holders.push(HolderEntry {
            holder_id,
            secret: secret.into(),
        });
        self
    }

    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.lambda == 0 {
            return Err(ProtocolError::invalid_config("lambda must be positive"));
        }
        if self.verifier_id.is_empty() {
            return Err(ProtocolError::invalid_config("verifier_id must not be empty"));
        }
        let mut seen = HashSet::new();
        for entry in &self.holders {
            if entry.holder_id.is_empty() {
                return Err(ProtocolError::invalid_config("holder_id must not be empty"));
            }
            if !seen.insert(entry.holder_id.as_str()) {
                return Err(ProtocolError::invalid_config(format!(
                    "duplicate holder_id {:?}",
                    entry.holder_id
                )));
            }
        }
        Ok(())
    }

    pub fn secret_registry(&self) -> SecretRegistry {
        self.holders
            .iter()
            .map(|entry| (entry.holder_id.clone(), entry.secret.clone()))
            .collect()
    }

    pub fn secret_for(&self, holder_id: &str) -> Option<SharedSecret> {
        self.holders
            .iter()
            .find(|entry| entry.holder_id == holder_id)
            .map(|entry| entry.secret.clone())
    }
}
