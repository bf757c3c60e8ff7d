use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use volley_http::HttpRequest;

use super::duration::ConfigDuration;
use super::error::{Error, Result};
use crate::metrics::{Field, FieldPolicy, FieldType, MetricValue};
use crate::runner::{self, RunSpec};
use crate::suite::{Predicate, TestCase};

pub const DEFAULT_METHOD: &str = "GET";
pub const DEFAULT_REQUESTS: i64 = 100;
pub const DEFAULT_CONCURRENCY: usize = 10;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_GLOBAL_TIMEOUT: Duration = Duration::from_secs(30);

/// On-disk (and on-the-wire) run configuration. Every field is optional so files can be layered
/// through `extends` and CLI overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigFile {
    /// Parent config, relative to the file declaring it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,

    #[serde(default, skip_serializing_if = "RequestConfig::is_empty")]
    pub request: RequestConfig,

    #[serde(default, skip_serializing_if = "RunnerConfig::is_empty")]
    pub runner: RunnerConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tests: Option<Vec<TestConfig>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RequestConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query_params: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub header: BTreeMap<String, Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<BodyConfig>,
}

impl RequestConfig {
    fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyType {
    #[default]
    Raw,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BodyConfig {
    #[serde(rename = "type")]
    pub kind: BodyType,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RunnerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<ConfigDuration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<ConfigDuration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_timeout: Option<ConfigDuration>,
}

impl RunnerConfig {
    fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TestConfig {
    pub name: String,
    pub field: String,
    pub predicate: Predicate,
    pub target: TargetConfig,
}

/// Test target before it is typed against its field: `120ms`, `"42"` or `42`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetConfig {
    Int(i64),
    Text(String),
}

impl TargetConfig {
    fn parse(&self, ty: FieldType) -> std::result::Result<MetricValue, String> {
        match (self, ty) {
            (Self::Int(v), FieldType::Int) => Ok(MetricValue::Int(*v)),
            (Self::Int(v), FieldType::Duration) => Err(format!(
                "duration target {v} needs a unit (e.g. \"{v}ms\")"
            )),
            (Self::Int(v), FieldType::Text) => Ok(MetricValue::Text(v.to_string())),
            (Self::Text(raw), ty) => MetricValue::parse(ty, raw),
        }
    }
}

impl ConfigFile {
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    pub fn from_yaml(raw: &str) -> serde_yaml::Result<Self> {
        serde_yaml::from_str(raw)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Reads `path` and resolves its `extends` chain. The returned config has no `extends`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        Self::load_chain(path.as_ref(), &mut chain, &mut seen)
    }

    fn load_chain(
        path: &Path,
        chain: &mut Vec<PathBuf>,
        seen: &mut HashSet<PathBuf>,
    ) -> Result<Self> {
        let canonical = path.canonicalize().map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        chain.push(canonical.clone());
        if !seen.insert(canonical.clone()) {
            return Err(Error::CircularExtends(chain.clone()));
        }

        let mut file = Self::read_file(&canonical)?;
        tracing::debug!(path = %canonical.display(), "loaded config file");

        let Some(parent) = file.extends.take() else {
            return Ok(file);
        };
        let base_dir = canonical.parent().unwrap_or_else(|| Path::new("."));
        let parent = Self::load_chain(&base_dir.join(parent), chain, seen)?;
        Ok(parent.overlay(file))
    }

    fn read_file(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .map(str::to_ascii_lowercase);
        let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;

        match ext.as_deref() {
            Some("json") => Self::from_json(&raw).map_err(|source| Error::Json {
                path: path.to_path_buf(),
                source,
            }),
            Some("yml" | "yaml") => Self::from_yaml(&raw).map_err(|source| Error::Yaml {
                path: path.to_path_buf(),
                source,
            }),
            _ => Err(Error::UnsupportedFormat(path.to_path_buf())),
        }
    }

    /// Layers `over` on top of `self`: every field set in `over` wins, headers and query
    /// parameters merge per key, and a `tests` list in `over` replaces the whole list.
    #[must_use]
    pub fn overlay(self, over: Self) -> Self {
        let mut query_params = self.request.query_params;
        query_params.extend(over.request.query_params);
        let mut header = self.request.header;
        header.extend(over.request.header);

        Self {
            extends: over.extends,
            request: RequestConfig {
                method: over.request.method.or(self.request.method),
                url: over.request.url.or(self.request.url),
                query_params,
                header,
                body: over.request.body.or(self.request.body),
            },
            runner: RunnerConfig {
                requests: over.runner.requests.or(self.runner.requests),
                concurrency: over.runner.concurrency.or(self.runner.concurrency),
                interval: over.runner.interval.or(self.runner.interval),
                request_timeout: over.runner.request_timeout.or(self.runner.request_timeout),
                global_timeout: over.runner.global_timeout.or(self.runner.global_timeout),
            },
            tests: over.tests.or(self.tests),
        }
    }

    /// Rejects configs that still point at a parent file.
    pub fn ensure_self_contained(&self) -> Result<()> {
        match self.extends {
            Some(_) => Err(Error::ExtendsNotAllowed),
            None => Ok(()),
        }
    }

    /// Applies defaults and builds a validated [`RunSpec`].
    pub fn into_run_spec(self) -> Result<RunSpec> {
        self.ensure_self_contained()?;

        let mut issues = Vec::new();
        let request = build_request(self.request, &mut issues);

        let mut tests = Vec::new();
        for (i, test) in self.tests.unwrap_or_default().into_iter().enumerate() {
            let field = Field::new(test.field);
            let Some(ty) = field.field_type() else {
                issues.push(format!("tests[{i}] ({}): unknown field {:?}", test.name, field.path()));
                continue;
            };
            match test.target.parse(ty) {
                Ok(target) => tests.push(TestCase {
                    name: test.name,
                    field,
                    predicate: test.predicate,
                    target,
                }),
                Err(err) => issues.push(format!("tests[{i}] ({}): {err}", test.name)),
            }
        }

        let Some(request) = request else {
            return Err(Error::Invalid(issues));
        };
        if !issues.is_empty() {
            return Err(Error::Invalid(issues));
        }

        let runner = self.runner;
        let spec = RunSpec {
            request,
            requests: runner.requests.unwrap_or(DEFAULT_REQUESTS),
            concurrency: runner.concurrency.unwrap_or(DEFAULT_CONCURRENCY),
            interval: runner
                .interval
                .map(ConfigDuration::into_inner)
                .unwrap_or_default(),
            request_timeout: runner
                .request_timeout
                .map_or(DEFAULT_REQUEST_TIMEOUT, ConfigDuration::into_inner),
            global_timeout: runner
                .global_timeout
                .map_or(DEFAULT_GLOBAL_TIMEOUT, ConfigDuration::into_inner),
            tests,
        };

        match spec.validate(&FieldPolicy::default()) {
            Ok(()) => Ok(spec),
            Err(runner::Error::InvalidSpec(issues)) => Err(Error::Invalid(issues)),
            Err(other) => Err(Error::Invalid(vec![other.to_string()])),
        }
    }
}

fn build_request(cfg: RequestConfig, issues: &mut Vec<String>) -> Option<HttpRequest> {
    let method_raw = cfg.method.as_deref().unwrap_or(DEFAULT_METHOD);
    let method = match http::Method::from_bytes(method_raw.to_ascii_uppercase().as_bytes()) {
        Ok(method) => Some(method),
        Err(_) => {
            issues.push(format!("request.method: invalid method {method_raw:?}"));
            None
        }
    };

    let url = match cfg.url.as_deref() {
        None => {
            issues.push("request.url: missing".to_string());
            None
        }
        Some(raw) => match url::Url::parse(raw) {
            Ok(mut url) => {
                if !cfg.query_params.is_empty() {
                    let mut pairs = url.query_pairs_mut();
                    for (k, v) in &cfg.query_params {
                        pairs.append_pair(k, v);
                    }
                }
                Some(url.to_string())
            }
            Err(err) => {
                issues.push(format!("request.url: {err} ({raw:?})"));
                None
            }
        },
    };

    let mut request = HttpRequest::new(method?, url?);
    for (name, values) in cfg.header {
        for value in values {
            request.headers.push((name.clone(), value));
        }
    }
    if let Some(body) = cfg.body {
        match body.kind {
            BodyType::Raw => request.body = Bytes::from(body.content),
        }
    }
    Some(request)
}
