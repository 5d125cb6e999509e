//! FOS REST client
//!
//! A poll logs in, fetches the chassis-scoped modules once, discovers the
//! virtual fabrics, fetches every per-vf module for each of them and logs out.
//! A failed request becomes a [`VfResponse::Failure`] for that module only;
//! the cycle always yields a snapshot.

use crate::config::SwitchConfig;
use crate::diff::{VF_DISABLED, VfId};
use crate::error::{Result, TelemetryError};
use crate::telemetry::{Module, TelemetrySnapshot, VfResponse, discover_vf_ids};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde_json::Value;
use tracing::{debug, warn};

const YANG_JSON: &str = "application/yang-data+json";

/// Anything that can produce one telemetry snapshot per poll
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    async fn fetch(&self) -> Result<TelemetrySnapshot>;
}

/// Pull `errors.error[].error-message` out of a FOS error body
pub fn fos_error_message(body: &Value) -> Option<String> {
    let errors = body.get("errors")?.get("error")?;
    let messages: Vec<&str> = match errors {
        Value::Array(items) => items
            .iter()
            .filter_map(|e| e.get("error-message").and_then(Value::as_str))
            .collect(),
        single => single
            .get("error-message")
            .and_then(Value::as_str)
            .into_iter()
            .collect(),
    };
    if messages.is_empty() {
        None
    } else {
        Some(messages.join("; "))
    }
}

/// Brocade FOS REST client for one switch
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    vf_ids: Option<Vec<VfId>>,
}

impl RestClient {
    pub fn new(config: &SwitchConfig) -> Result<Self> {
        if config.address.trim().is_empty() {
            return Err(TelemetryError::Configuration(
                "switch address is required".to_string(),
            ));
        }
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url(),
            username: config.username.clone(),
            password: config.resolve_password()?,
            vf_ids: config.vf_ids.clone(),
        })
    }

    /// URL of a module for one virtual fabric
    pub fn module_url(&self, module: Module, vf_id: VfId) -> String {
        if vf_id == VF_DISABLED {
            format!("{}/rest/running/{}", self.base_url, module.uri())
        } else {
            format!(
                "{}/rest/running/{}?vf-id={}",
                self.base_url,
                module.uri(),
                vf_id
            )
        }
    }

    async fn login(&self) -> Result<String> {
        let response = self
            .http
            .post(format!("{}/rest/login", self.base_url))
            .basic_auth(&self.username, Some(&self.password))
            .header(ACCEPT, YANG_JSON)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TelemetryError::LoginRejected {
                url: self.base_url.clone(),
                status: status.as_u16(),
            });
        }

        response
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                TelemetryError::Authentication("no token in login response".to_string())
            })
    }

    async fn logout(&self, token: &str) {
        let result = self
            .http
            .post(format!("{}/rest/logout", self.base_url))
            .header(AUTHORIZATION, token)
            .header(ACCEPT, YANG_JSON)
            .send()
            .await;
        if let Err(e) = result {
            warn!(error = %e, "logout failed");
        }
    }

    async fn get(&self, token: &str, module: Module, vf_id: VfId) -> VfResponse {
        let url = self.module_url(module, vf_id);
        debug!(vf_id, module = %module, "fetching");
        let response = match self
            .http
            .get(&url)
            .header(AUTHORIZATION, token)
            .header(ACCEPT, YANG_JSON)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                return VfResponse::failure(e.status().map(|s| s.as_u16()), Some(e.to_string()));
            }
        };

        let status = response.status();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => return VfResponse::failure(Some(status.as_u16()), Some(e.to_string())),
        };
        let json = serde_json::from_slice::<Value>(&body).ok();

        if status.is_success() {
            return match json.and_then(|mut v| v.get_mut("Response").map(Value::take)) {
                Some(response) => VfResponse::Payload { response },
                None if status == StatusCode::NO_CONTENT => VfResponse::Payload {
                    response: Value::Null,
                },
                None => VfResponse::failure(
                    Some(status.as_u16()),
                    Some("response without Response container".to_string()),
                ),
            };
        }

        let message = json
            .as_ref()
            .and_then(fos_error_message)
            .or_else(|| status.canonical_reason().map(str::to_string));
        VfResponse::failure(Some(status.as_u16()), message)
    }

    /// Every module marked failed with the same cause, used when login fails
    fn failed_snapshot(&self, error: &TelemetryError) -> TelemetrySnapshot {
        let mut snapshot = TelemetrySnapshot::new(Utc::now());
        let status_code = match error {
            TelemetryError::Http(e) => e.status().map(|s| s.as_u16()),
            TelemetryError::LoginRejected { status, .. } => Some(*status),
            _ => None,
        };
        let vf_ids = self.vf_ids.clone().unwrap_or_else(|| vec![VF_DISABLED]);
        for module in Module::ALL {
            let targets: &[VfId] = if module.is_chassis_scoped() {
                &[VF_DISABLED]
            } else {
                &vf_ids
            };
            for vf_id in targets {
                snapshot.insert(
                    module,
                    *vf_id,
                    VfResponse::failure(status_code, Some(error.to_string())),
                );
            }
        }
        snapshot
    }
}

#[async_trait]
impl TelemetrySource for RestClient {
    async fn fetch(&self) -> Result<TelemetrySnapshot> {
        let token = match self.login().await {
            Ok(token) => token,
            Err(e) => {
                warn!(switch = %self.base_url, error = %e, "login failed");
                return Ok(self.failed_snapshot(&e));
            }
        };

        let mut snapshot = TelemetrySnapshot::new(Utc::now());
        for module in Module::ALL.into_iter().filter(|m| m.is_chassis_scoped()) {
            let response = self.get(&token, module, VF_DISABLED).await;
            snapshot.insert(module, VF_DISABLED, response);
        }

        let vf_ids = match &self.vf_ids {
            Some(ids) => ids.clone(),
            None => discover_vf_ids(
                snapshot
                    .module(Module::LogicalSwitch)
                    .and_then(|data| data.get(&VF_DISABLED)),
            ),
        };
        debug!(?vf_ids, "virtual fabrics");

        for vf_id in &vf_ids {
            for module in Module::ALL.into_iter().filter(|m| !m.is_chassis_scoped()) {
                let response = self.get(&token, module, *vf_id).await;
                snapshot.insert(module, *vf_id, response);
            }
        }

        self.logout(&token).await;
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::RequestStatus;
    use serde_json::json;

    fn client(vf_ids: Option<Vec<VfId>>) -> RestClient {
        let config = SwitchConfig {
            address: "10.0.0.5".to_string(),
            password: "secret".to_string(),
            vf_ids,
            ..SwitchConfig::default()
        };
        RestClient::new(&config).unwrap()
    }

    #[test]
    fn test_new_requires_address() {
        assert!(RestClient::new(&SwitchConfig::default()).is_err());
    }

    #[test]
    fn test_module_url() {
        let client = client(None);
        assert_eq!(
            client.module_url(Module::FcInterface, -1),
            "https://10.0.0.5/rest/running/brocade-interface/fibrechannel"
        );
        assert_eq!(
            client.module_url(Module::FcStatistics, 128),
            "https://10.0.0.5/rest/running/brocade-interface/fibrechannel-statistics?vf-id=128"
        );
    }

    #[test]
    fn test_fos_error_message() {
        let body = json!({"errors": {"error": [
            {"error-type": "application", "error-message": "VF feature is not enabled"}
        ]}});
        assert_eq!(
            fos_error_message(&body).as_deref(),
            Some("VF feature is not enabled")
        );

        let two = json!({"errors": {"error": [
            {"error-message": "first"},
            {"error-message": "second"}
        ]}});
        assert_eq!(fos_error_message(&two).as_deref(), Some("first; second"));

        let single = json!({"errors": {"error": {"error-message": "No Rules"}}});
        assert_eq!(fos_error_message(&single).as_deref(), Some("No Rules"));

        assert_eq!(fos_error_message(&json!({"Response": {}})), None);
    }

    #[test]
    fn test_failed_snapshot_covers_every_module() {
        let client = client(Some(vec![10, 20]));
        let err = TelemetryError::LoginRejected {
            url: "https://10.0.0.5".to_string(),
            status: 401,
        };
        let snapshot = client.failed_snapshot(&err);
        let chassis = snapshot.module(Module::Chassis).unwrap();
        assert_eq!(chassis.len(), 1);
        assert!(chassis.contains_key(&VF_DISABLED));
        let stats = snapshot.module(Module::FcStatistics).unwrap();
        assert_eq!(stats.keys().copied().collect::<Vec<_>>(), vec![10, 20]);
        match &stats[&10] {
            VfResponse::Failure { status_code, .. } => assert_eq!(*status_code, Some(401)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unavailable_login_is_a_warning() {
        let client = client(None);
        let err = TelemetryError::LoginRejected {
            url: "https://10.0.0.5".to_string(),
            status: 503,
        };
        let snapshot = client.failed_snapshot(&err);
        let response = &snapshot.module(Module::FcInterface).unwrap()[&VF_DISABLED];
        match response {
            VfResponse::Failure { status_code, .. } => assert_eq!(*status_code, Some(503)),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(RequestStatus::classify(response), RequestStatus::Warning);
        let chassis = &snapshot.module(Module::Chassis).unwrap()[&VF_DISABLED];
        assert_eq!(RequestStatus::classify(chassis), RequestStatus::Warning);
    }

    #[test]
    fn test_rejected_login_is_a_failure() {
        let client = client(None);
        let err = TelemetryError::LoginRejected {
            url: "https://10.0.0.5".to_string(),
            status: 401,
        };
        let snapshot = client.failed_snapshot(&err);
        let response = &snapshot.module(Module::Chassis).unwrap()[&VF_DISABLED];
        assert_eq!(RequestStatus::classify(response), RequestStatus::Fail);

        let missing_token =
            TelemetryError::Authentication("no token in login response".to_string());
        let snapshot = client.failed_snapshot(&missing_token);
        let response = &snapshot.module(Module::Chassis).unwrap()[&VF_DISABLED];
        assert_eq!(RequestStatus::classify(response), RequestStatus::Fail);
    }
}
