//! personcheck-runner: issues requests against the persons API and judges
//! the responses
//!
//! [`HarnessContext`] holds the authenticated client and resolved schemas,
//! [`EndpointChecker`] performs one request and its checks,
//! [`QueryParameterProbe`] sweeps configured query parameter values, and
//! [`Suite`] runs the built-in scenarios.

pub mod checker;
pub mod context;
pub mod http;
pub mod probe;
pub mod suite;

pub use checker::{CheckOptions, EndpointChecker, Inspection};
pub use context::{ContextError, HarnessContext};
pub use http::{HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestClient};
pub use probe::{ProbeCase, QueryParameterProbe, probe_cases};
pub use suite::{Scenario, Suite, SuiteError};
