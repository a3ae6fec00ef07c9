// iControl REST LTM pool endpoints

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::BigIpClient;
use crate::error::ProviderError;

/// Pool collection.
pub const LTM_POOL: &str = "/mgmt/tm/ltm/pool";

/// Load balancing methods accepted by pools and FAST templates.
pub const LOAD_BALANCING_MODES: &[&str] = &[
    "dynamic-ratio-member",
    "dynamic-ratio-node",
    "fastest-app-response",
    "fastest-node",
    "least-connections-member",
    "least-connections-node",
    "least-sessions",
    "observed-member",
    "observed-node",
    "predictive-member",
    "predictive-node",
    "ratio-least-connections-member",
    "ratio-least-connections-node",
    "ratio-member",
    "ratio-node",
    "ratio-session",
    "round-robin",
    "weighted-least-connections-member",
    "weighted-least-connections-node",
];

/// A pool as iControl REST represents it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LtmPool {
    /// Pool name without partition.
    pub name: String,
    /// Partition; `Common` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<String>,
    /// `/Partition/name`, as read back.
    #[serde(default, skip_serializing)]
    pub full_path: Option<String>,
    /// Free text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// One of `LOAD_BALANCING_MODES`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_balancing_mode: Option<String>,
    /// Monitor rule, e.g. `/Common/http and /Common/tcp`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitor: Option<String>,
    /// Seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slow_ramp_time: Option<i64>,
    /// `yes` or `no`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_snat: Option<String>,
    /// `yes` or `no`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_nat: Option<String>,
    /// Reselection attempts after a member goes down.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reselect_tries: Option<i64>,
    /// `none`, `reset`, `drop` or `reselect`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_down_action: Option<String>,
}

/// Split `/Partition/name` into its parts; a bare name lives in `Common`.
pub fn split_full_path(full_path: &str) -> (String, String) {
    let trimmed = full_path.trim_start_matches('/');
    match trimmed.split_once('/') {
        Some((partition, name)) => (partition.to_string(), name.to_string()),
        None => ("Common".to_string(), trimmed.to_string()),
    }
}

/// iControl REST object path: `/Common/web` becomes `~Common~web`.
pub fn rest_name(full_path: &str) -> String {
    let (partition, name) = split_full_path(full_path);
    format!("~{}~{}", partition, name.replace('/', "~"))
}

impl BigIpClient {
    /// Create a pool.
    pub async fn ltm_pool_create(&self, pool: &LtmPool) -> Result<(), ProviderError> {
        self.post(LTM_POOL, &serde_json::to_value(pool)?).await?;
        Ok(())
    }

    /// Fetch a pool by full path.
    pub async fn ltm_pool(&self, full_path: &str) -> Result<LtmPool, ProviderError> {
        let resp = self
            .get(&format!("{LTM_POOL}/{}", rest_name(full_path)))
            .await?;
        resp.json()
    }

    /// Modify a pool in place.
    pub async fn ltm_pool_modify(&self, full_path: &str, pool: &LtmPool) -> Result<(), ProviderError> {
        let mut body = serde_json::to_value(pool)?;
        if let Value::Object(map) = &mut body {
            map.remove("name");
            map.remove("partition");
        }
        self.patch(&format!("{LTM_POOL}/{}", rest_name(full_path)), &body)
            .await?;
        Ok(())
    }

    /// Delete a pool.
    pub async fn ltm_pool_delete(&self, full_path: &str) -> Result<(), ProviderError> {
        self.delete(&format!("{LTM_POOL}/{}", rest_name(full_path)))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rest_name() {
        assert_eq!(rest_name("/Common/web"), "~Common~web");
        assert_eq!(rest_name("web"), "~Common~web");
        assert_eq!(rest_name("/tenant/app/pool"), "~tenant~app~pool");
    }

    #[test]
    fn test_pool_wire_shape() {
        let pool = LtmPool {
            name: "web".into(),
            partition: Some("Common".into()),
            load_balancing_mode: Some("round-robin".into()),
            allow_snat: Some("yes".into()),
            ..LtmPool::default()
        };
        assert_eq!(
            serde_json::to_value(&pool).unwrap(),
            json!({
                "name": "web",
                "partition": "Common",
                "loadBalancingMode": "round-robin",
                "allowSnat": "yes"
            })
        );

        let read: LtmPool = serde_json::from_value(json!({
            "kind": "tm:ltm:pool:poolstate",
            "name": "web",
            "partition": "Common",
            "fullPath": "/Common/web",
            "monitor": "/Common/http and /Common/tcp ",
            "slowRampTime": 10
        }))
        .unwrap();
        assert_eq!(read.full_path.as_deref(), Some("/Common/web"));
        assert_eq!(read.slow_ramp_time, Some(10));
    }
}
