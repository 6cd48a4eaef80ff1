//! Immutable run context shared by every check

use personcheck_core::{
    Config, QueryParamSpec, SchemaCatalog, SchemaDocument, SchemaError, TestCases,
};

use crate::checker::EndpointChecker;
use crate::http::{HttpClient, HttpError, ReqwestClient};

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Http(#[from] HttpError),
}

/// Base URL, authenticated client, resolved schemas and fixtures.
///
/// Built once before any check, then only read; scenario threads share it
/// by reference.
pub struct HarnessContext {
    base_url: String,
    client: Box<dyn HttpClient>,
    catalog: SchemaCatalog,
    config: Config,
}

impl HarnessContext {
    #[must_use]
    pub fn new(config: Config, client: Box<dyn HttpClient>, catalog: SchemaCatalog) -> Self {
        Self {
            base_url: config.base_url(),
            client,
            catalog,
            config,
        }
    }

    /// Resolve `schemas` and authenticate against the configured API.
    ///
    /// Schemas are resolved first so a broken document fails without any
    /// network traffic.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Schema`] on resolution failure and
    /// [`ContextError::Http`] if the client cannot be built or authenticated.
    pub fn connect<I, S>(config: Config, doc: &SchemaDocument, schemas: I) -> Result<Self, ContextError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let catalog = SchemaCatalog::build(doc, schemas)?;
        let client = ReqwestClient::connect(&config)?;
        tracing::info!(
            base_url = %config.base_url(),
            schemas = catalog.len(),
            "harness ready"
        );
        Ok(Self::new(config, Box::new(client), catalog))
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `base_url + path`; `path` is empty or starts with `/`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    #[must_use]
    pub fn client(&self) -> &dyn HttpClient {
        self.client.as_ref()
    }

    #[must_use]
    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn test_cases(&self) -> &TestCases {
        &self.config.test_cases
    }

    #[must_use]
    pub fn param_specs(&self, endpoint: &str) -> Vec<QueryParamSpec> {
        self.config.param_specs(endpoint)
    }

    /// Default soft latency limit for every check.
    #[must_use]
    pub fn max_elapsed(&self) -> Option<f64> {
        self.config.max_elapsed_seconds
    }

    #[must_use]
    pub fn checker(&self) -> EndpointChecker<'_> {
        EndpointChecker::new(self)
    }
}
