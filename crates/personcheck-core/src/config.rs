//! Harness configuration: target API, credentials, fixtures, probe values

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Scheme and host, e.g. "https://api.example.edu"
    pub hostname: String,

    /// Version prefix, e.g. "/v2"
    #[serde(default)]
    pub version: String,

    /// API root, e.g. "/persons/"
    #[serde(default)]
    pub api: String,

    /// OAuth2 client-credentials grant
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub token_api_url: Option<String>,

    /// Use HTTP basic auth instead of a bearer token
    #[serde(default)]
    pub use_basic_auth: bool,
    #[serde(default)]
    pub basic_auth_username: Option<String>,
    #[serde(default)]
    pub basic_auth_password: Option<String>,

    /// Fixture identifiers the scenarios run against
    #[serde(default)]
    pub test_cases: TestCases,

    /// Probe values per endpoint, then per parameter name
    #[serde(default)]
    pub query_params: BTreeMap<String, BTreeMap<String, QueryParamSpec>>,

    /// Testing against a local instance: self-signed certificates accepted,
    /// credentials optional
    #[serde(default)]
    pub local_test: bool,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: f64,

    /// Soft latency limit in seconds (disabled by default)
    #[serde(default)]
    pub max_elapsed_seconds: Option<f64>,
}

const fn default_timeout() -> f64 {
    30.0
}

/// Fixture identifiers. Every scenario needing a missing fixture is skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TestCases {
    pub valid_osu_ids: Vec<String>,
    pub invalid_osu_ids: Vec<String>,
    pub ids_person: Option<PersonIds>,
    pub jobs_person: Option<String>,
    pub no_job_person: Option<String>,
    pub phones_person: Option<String>,
    /// A person whose backend data holds a phone number that is not E.164
    pub long_phone_person: Option<String>,
    pub image_person: Option<String>,
    pub addresses_person: Option<String>,
    pub emails_person: Option<String>,
    pub meal_plan_person: Option<String>,
    /// A job accepted by `POST /persons/{osuId}/jobs`
    pub valid_job_body: Option<Value>,
}

impl Default for TestCases {
    fn default() -> Self {
        Self {
            valid_osu_ids: Vec::new(),
            invalid_osu_ids: vec!["999999999".to_string()],
            ids_person: None,
            jobs_person: None,
            no_job_person: None,
            phones_person: None,
            long_phone_person: None,
            image_person: None,
            addresses_person: None,
            emails_person: None,
            meal_plan_person: None,
            valid_job_body: None,
        }
    }
}

impl TestCases {
    /// `person` if set, else the first valid OSU ID.
    #[must_use]
    pub fn person_or_default<'a>(&'a self, person: Option<&'a String>) -> Option<&'a str> {
        person
            .or_else(|| self.valid_osu_ids.first())
            .map(String::as_str)
    }
}

/// The three identifiers of one person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonIds {
    pub osu_id: String,
    pub onid: String,
    pub osuuid: String,
    /// Where the API expects and returns each identifier
    #[serde(default)]
    pub names: IdentifierNames,
}

impl PersonIds {
    /// `(query parameter, value)` pairs, in a fixed order.
    #[must_use]
    pub fn params(&self) -> [(&str, &str); 3] {
        [
            (self.names.osu_id_param.as_str(), self.osu_id.as_str()),
            (self.names.onid_param.as_str(), self.onid.as_str()),
            (self.names.osuuid_param.as_str(), self.osuuid.as_str()),
        ]
    }
}

/// Query parameter and response attribute names of the person identifiers.
///
/// Defaults follow the v2 API: `?osuId=`, `?onid=`, `?osuUid=`, with the
/// ONID returned as `attributes.username` and the OSU UID as
/// `attributes.osuUID`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentifierNames {
    pub osu_id_param: String,
    pub onid_param: String,
    pub osuuid_param: String,
    pub onid_attribute: String,
    pub osuuid_attribute: String,
}

impl Default for IdentifierNames {
    fn default() -> Self {
        Self {
            osu_id_param: "osuId".to_string(),
            onid_param: "onid".to_string(),
            osuuid_param: "osuUid".to_string(),
            onid_attribute: "username".to_string(),
            osuuid_attribute: "osuUID".to_string(),
        }
    }
}

/// Values to probe one query parameter with.
///
/// Valid values must yield 200, invalid ones 400.
///
/// ```toml
/// [query_params.image.width]
/// valid = [500]
/// invalid = [0, 2001]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryParamSpec {
    /// Parameter name, taken from the config key
    #[serde(skip)]
    pub name: String,
    #[serde(default)]
    pub valid: Vec<Value>,
    #[serde(default)]
    pub invalid: Vec<Value>,
}

/// How requests are authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthConfig {
    Basic {
        username: String,
        password: String,
    },
    ClientCredentials {
        token_url: String,
        client_id: String,
        client_secret: String,
    },
    /// No credentials; only allowed with `local_test`
    Anonymous,
}

impl Config {
    /// Load config from file: TOML for `.toml`, JSON otherwise
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e.to_string()))?;

        if path.extension().is_some_and(|ext| ext == "toml") {
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        }
    }

    /// `hostname + version + api`, without a trailing slash
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("{}{}{}", self.hostname, self.version, self.api)
            .trim_end_matches('/')
            .to_string()
    }

    /// Resolve the credentials to use.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if the selected scheme lacks a key,
    /// or if no scheme is configured outside `local_test`.
    pub fn auth(&self) -> Result<AuthConfig, ConfigError> {
        if self.use_basic_auth {
            return Ok(AuthConfig::Basic {
                username: required(&self.basic_auth_username, "basic_auth_username")?,
                password: required(&self.basic_auth_password, "basic_auth_password")?,
            });
        }
        match (&self.token_api_url, &self.client_id, &self.client_secret) {
            (None, None, None) if self.local_test => Ok(AuthConfig::Anonymous),
            _ => Ok(AuthConfig::ClientCredentials {
                token_url: required(&self.token_api_url, "token_api_url")?,
                client_id: required(&self.client_id, "client_id")?,
                client_secret: required(&self.client_secret, "client_secret")?,
            }),
        }
    }

    /// Probe specs of one endpoint, sorted by parameter name.
    #[must_use]
    pub fn param_specs(&self, endpoint: &str) -> Vec<QueryParamSpec> {
        self.query_params
            .get(endpoint)
            .map(|params| {
                params
                    .iter()
                    .map(|(name, spec)| QueryParamSpec {
                        name: name.clone(),
                        ..spec.clone()
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Example config file
    #[must_use]
    pub fn example() -> &'static str {
        r#"# personcheck configuration

# Base URL = hostname + version + api
hostname = "https://api.example.edu"
version = "/v2"
api = "/persons/"

# OAuth2 client-credentials grant
client_id = "your-client-id"
client_secret = "your-client-secret"
token_api_url = "https://api.example.edu/oauth2/token"

# Or HTTP basic auth
# use_basic_auth = true
# basic_auth_username = "user"
# basic_auth_password = "secret"

# Local instance: accept self-signed certificates, credentials optional
local_test = false

# Per-request timeout and soft latency limit, in seconds
timeout_seconds = 30.0
# max_elapsed_seconds = 5.0

[test_cases]
valid_osu_ids = ["930000000"]
invalid_osu_ids = ["999999999"]
jobs_person = "930000000"
# no_job_person = "930000001"
# phones_person = "930000000"
# long_phone_person = "930000002"
# image_person = "930000000"
# addresses_person = "930000000"
# emails_person = "930000000"
# meal_plan_person = "930000000"

# [test_cases.ids_person]
# osu_id = "930000000"
# onid = "smithj"
# osuuid = "12345678901"

# Only needed when the API names identifiers differently
# [test_cases.ids_person.names]
# osu_id_param = "osuId"
# onid_param = "onid"
# osuuid_param = "osuUid"
# onid_attribute = "username"
# osuuid_attribute = "osuUID"

# [test_cases.valid_job_body.data]
# type = "jobs"
# attributes = { positionNumber = "C12345", suffix = "00", beginDate = "2019-01-01", endDate = "2019-12-31" }

# Query parameter probes: valid values expect 200, invalid ones 400
[query_params.image.width]
valid = [500]
invalid = [0, 2001]

# [query_params.jobs.beginDate]
# valid = ["2019-01-01"]
# invalid = ["2019-13-01", "not-a-date"]
"#
    }
}

fn required(value: &Option<String>, key: &str) -> Result<String, ConfigError> {
    value
        .clone()
        .ok_or_else(|| ConfigError::Missing(key.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read {0}: {1}")]
    Io(PathBuf, String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Missing config key: {0}")]
    Missing(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn minimal() -> Config {
        serde_json::from_value(json!({"hostname": "https://localhost:8080"})).unwrap()
    }

    #[test]
    fn parse_json_config() {
        let config: Config = serde_json::from_value(json!({
            "hostname": "https://api.example.edu",
            "version": "/v2",
            "api": "/persons/",
            "client_id": "id",
            "client_secret": "secret",
            "token_api_url": "https://api.example.edu/oauth2/token",
            "use_basic_auth": false,
            "local_test": false,
            "test_cases": {
                "valid_osu_ids": ["930000000", "930000001"],
                "ids_person": {"osu_id": "930000000", "onid": "smithj", "osuuid": "123"}
            }
        }))
        .unwrap();

        assert_eq!(config.base_url(), "https://api.example.edu/v2/persons");
        assert_eq!(config.test_cases.valid_osu_ids.len(), 2);
        assert_eq!(config.test_cases.invalid_osu_ids, vec!["999999999"]);
        assert_eq!(config.timeout_seconds, 30.0);
        assert!(config.max_elapsed_seconds.is_none());
        assert_eq!(
            config.test_cases.ids_person.as_ref().unwrap().params()[1],
            ("onid", "smithj")
        );
    }

    #[test]
    fn identifier_names_default_to_v2_and_can_be_overridden() {
        let ids: PersonIds =
            serde_json::from_value(json!({"osu_id": "1", "onid": "smithj", "osuuid": "2"})).unwrap();
        assert_eq!(ids.params(), [("osuId", "1"), ("onid", "smithj"), ("osuUid", "2")]);
        assert_eq!(ids.names.onid_attribute, "username");
        assert_eq!(ids.names.osuuid_attribute, "osuUID");

        let ids: PersonIds = serde_json::from_value(json!({
            "osu_id": "1", "onid": "smithj", "osuuid": "2",
            "names": {"osu_id_param": "osuID", "osuuid_param": "osuUID"}
        }))
        .unwrap();
        assert_eq!(ids.params(), [("osuID", "1"), ("onid", "smithj"), ("osuUID", "2")]);
    }

    #[test]
    fn parse_toml_example() {
        let config: Config = toml::from_str(Config::example()).unwrap();
        assert_eq!(config.base_url(), "https://api.example.edu/v2/persons");
        assert_eq!(config.test_cases.jobs_person.as_deref(), Some("930000000"));
        let specs = config.param_specs("image");
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name, "width");
        assert_eq!(specs[0].valid, vec![json!(500)]);
        assert_eq!(specs[0].invalid, vec![json!(0), json!(2001)]);
    }

    #[test]
    fn param_specs_sorted_and_named() {
        let config: Config = serde_json::from_value(json!({
            "hostname": "h",
            "query_params": {"jobs": {
                "endDate": {"invalid": ["x"]},
                "beginDate": {"valid": ["2019-01-01"]}
            }}
        }))
        .unwrap();
        let names: Vec<String> = config.param_specs("jobs").into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["beginDate", "endDate"]);
        assert!(config.param_specs("phones").is_empty());
    }

    #[test]
    fn auth_client_credentials() {
        let mut config = minimal();
        config.client_id = Some("id".into());
        config.client_secret = Some("secret".into());
        config.token_api_url = Some("https://t".into());
        assert_eq!(
            config.auth().unwrap(),
            AuthConfig::ClientCredentials {
                token_url: "https://t".into(),
                client_id: "id".into(),
                client_secret: "secret".into()
            }
        );
    }

    #[test]
    fn auth_basic_requires_password() {
        let mut config = minimal();
        config.use_basic_auth = true;
        config.basic_auth_username = Some("u".into());
        let err = config.auth().unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ref k) if k == "basic_auth_password"));
    }

    #[test]
    fn anonymous_only_for_local_test() {
        let mut config = minimal();
        assert!(matches!(config.auth(), Err(ConfigError::Missing(_))));
        config.local_test = true;
        assert_eq!(config.auth().unwrap(), AuthConfig::Anonymous);
    }

    #[test]
    fn person_or_default_falls_back() {
        let mut cases = TestCases::default();
        assert_eq!(cases.person_or_default(None), None);
        cases.valid_osu_ids = vec!["1".into()];
        assert_eq!(cases.person_or_default(None), Some("1"));
        let image = "2".to_string();
        assert_eq!(cases.person_or_default(Some(&image)), Some("2"));
    }

    #[test]
    fn load_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let json_path = dir.path().join("config.json");
        std::fs::File::create(&json_path)
            .unwrap()
            .write_all(br#"{"hostname": "http://a", "api": "/persons"}"#)
            .unwrap();
        assert_eq!(Config::load(&json_path).unwrap().base_url(), "http://a/persons");

        let toml_path = dir.path().join("personcheck.toml");
        std::fs::write(&toml_path, "hostname = \"http://b\"\n").unwrap();
        assert_eq!(Config::load(&toml_path).unwrap().base_url(), "http://b");
    }

    #[test]
    fn load_errors() {
        let err = Config::load(Path::new("/nonexistent/personcheck.json")).unwrap_err();
        assert!(err.to_string().starts_with("Cannot read"));

        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{").unwrap();
        assert!(matches!(Config::load(&bad), Err(ConfigError::Parse(_))));
    }
}
