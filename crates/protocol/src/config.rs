use serde::{Deserialize, Serialize};

/// Device connection settings.
///
/// Field names match the `config.json` keys. The struct is also returned
/// verbatim by `GET /api/auth`, so it carries the password in clear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(rename = "ip_address")]
    pub address: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub target_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_config_keys() {
        let json = r#"{"ip_address":"10.0.0.5","username":"u","password":"p","target_id":"t1"}"#;
        let cfg: DeviceConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.address, "10.0.0.5");
        assert_eq!(cfg.username, "u");
        assert_eq!(cfg.password, "p");
        assert_eq!(cfg.target_id, "t1");
    }

    #[test]
    fn target_id_is_optional() {
        let json = r#"{"ip_address":"10.0.0.5","username":"u","password":"p"}"#;
        let cfg: DeviceConfig = serde_json::from_str(json).unwrap();
        assert!(cfg.target_id.is_empty());
    }

    #[test]
    fn serializes_with_config_keys() {
        let cfg = DeviceConfig {
            address: "10.0.0.5".into(),
            username: "u".into(),
            password: "p".into(),
            target_id: String::new(),
        };
        let v = serde_json::to_value(&cfg).unwrap();
        assert_eq!(v["ip_address"], "10.0.0.5");
        assert_eq!(v["password"], "p");
        assert_eq!(v["target_id"], "");
    }
}
