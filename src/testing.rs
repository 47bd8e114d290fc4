//! Table tests against a running API tree
//!
//! A [`TableTest`] runs [`TestCase`]s in order against one server. Each case
//! is a [`Command`] dispatched through the [`ClientMap`] client of the
//! resource the command names, so one table can walk a whole tree. A case
//! can also build its command from the responses of earlier cases, which is
//! how a child is created under a parent whose ID the server generated.
//!
//! ```rust,ignore
//! let mut table = TableTest::new(&api, &handle.url())?;
//! table
//!     .run_all(&[
//!         TestCase::command("create artist", Command::parse(&["post", "artists", r#"{"name":"A"}"#])?)
//!             .expect(ExpectedResponse::body_matching(r#""name":"A""#)),
//!         TestCase::chained("get artist", |prev| {
//!             Command::new(Verb::Get, "artists").with_args([prev.id("create artist").unwrap_or_default()])
//!         }),
//!         TestCase::command("missing", Command::new(Verb::Get, "artists").with_args(["nope"]))
//!             .expect(ExpectedResponse::error(
//!                 StatusCode::NOT_FOUND,
//!                 "error getting resource: unexpected response with text: Resource not found.",
//!             )),
//!     ])
//!     .await?;
//! ```

use crate::api::ApiNode;
use crate::client::{ClientError, ClientMap, Command};
use axum::http::StatusCode;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

/// What a case must produce
///
/// Everything left unset is not checked. Without an `error`, the command
/// must succeed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpectedResponse {
    /// Status of the failed request, checked together with `error`
    pub status: Option<StatusCode>,
    /// The whole response data
    pub body: Option<Value>,
    /// Pattern searched in the response data, rendered as compact JSON
    pub body_regexp: Option<String>,
    /// Full text of the error the command fails with
    pub error: Option<String>,
    /// The response carries no data, as after a delete
    pub no_body: bool,
}

impl ExpectedResponse {
    pub fn body(body: Value) -> Self {
        Self {
            body: Some(body),
            ..Self::default()
        }
    }

    pub fn body_matching(pattern: impl Into<String>) -> Self {
        Self {
            body_regexp: Some(pattern.into()),
            ..Self::default()
        }
    }

    pub fn no_body() -> Self {
        Self {
            no_body: true,
            ..Self::default()
        }
    }

    pub fn error(status: StatusCode, text: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            error: Some(text.into()),
            ..Self::default()
        }
    }
}

type CommandFn = Box<dyn Fn(&Responses) -> Command + Send + Sync>;
type AssertFn = Box<dyn Fn(&Value) -> anyhow::Result<()> + Send + Sync>;

enum Step {
    Command(Command),
    Chained(CommandFn),
}

/// One named step of a table test
pub struct TestCase {
    name: String,
    step: Step,
    expected: ExpectedResponse,
    assert: Option<AssertFn>,
}

impl TestCase {
    /// Run a fixed command
    pub fn command(name: impl Into<String>, command: Command) -> Self {
        Self::with_step(name, Step::Command(command))
    }

    /// Build the command from the responses of earlier cases
    pub fn chained<F>(name: impl Into<String>, build: F) -> Self
    where
        F: Fn(&Responses) -> Command + Send + Sync + 'static,
    {
        Self::with_step(name, Step::Chained(Box::new(build)))
    }

    fn with_step(name: impl Into<String>, step: Step) -> Self {
        Self {
            name: name.into(),
            step,
            expected: ExpectedResponse::default(),
            assert: None,
        }
    }

    pub fn expect(mut self, expected: ExpectedResponse) -> Self {
        self.expected = expected;
        self
    }

    /// Extra check on the response data of a successful command
    pub fn assert<F>(mut self, check: F) -> Self
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.assert = Some(Box::new(check));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Response data of the cases run so far, by case name
#[derive(Debug, Clone, Default)]
pub struct Responses {
    by_case: HashMap<String, Value>,
}

impl Responses {
    pub fn get(&self, case: &str) -> Option<&Value> {
        self.by_case.get(case)
    }

    /// The `id` field of a case's response
    pub fn id(&self, case: &str) -> Option<&str> {
        self.get(case)?.get("id")?.as_str()
    }
}

/// A case whose outcome differs from its [`ExpectedResponse`]
#[derive(Debug, thiserror::Error)]
pub enum CaseError {
    #[error("{case}: command failed: {source}")]
    Failed {
        case: String,
        #[source]
        source: ClientError,
    },

    #[error("{case}: expected error '{expected}', but the command succeeded")]
    Succeeded { case: String, expected: String },

    #[error("{case}: expected error '{expected}', got '{actual}'")]
    WrongError {
        case: String,
        expected: String,
        actual: String,
    },

    #[error("{case}: expected status {expected}, got {actual:?}")]
    WrongStatus {
        case: String,
        expected: StatusCode,
        actual: Option<StatusCode>,
    },

    #[error("{case}: expected body {expected}, got {actual}")]
    WrongBody {
        case: String,
        expected: String,
        actual: String,
    },

    #[error("{case}: invalid body pattern: {source}")]
    Pattern {
        case: String,
        #[source]
        source: regex::Error,
    },

    #[error("{case}: {message}")]
    Assertion { case: String, message: String },
}

/// Runs cases in order against one API tree, remembering their responses
pub struct TableTest {
    clients: ClientMap,
    responses: Responses,
}

impl TableTest {
    /// Clients for every resource below `top`, served at `address`
    pub fn new(top: &dyn ApiNode, address: &str) -> Result<Self, ClientError> {
        Ok(Self::from_clients(ClientMap::new(top, address)?))
    }

    pub fn from_clients(clients: ClientMap) -> Self {
        Self {
            clients,
            responses: Responses::default(),
        }
    }

    pub fn responses(&self) -> &Responses {
        &self.responses
    }

    /// Run `case` and check it, returning its response data
    pub async fn run(&mut self, case: &TestCase) -> Result<Value, CaseError> {
        let command = match &case.step {
            Step::Command(command) => command.clone(),
            Step::Chained(build) => build(&self.responses),
        };
        tracing::debug!(
            case = %case.name,
            verb = %command.verb,
            resource = %command.resource,
            "running test case"
        );

        let result = self.clients.run(&command).await;
        let value = check_outcome(case, result)?;
        if case.expected.error.is_some() {
            return Ok(value);
        }
        check_body(case, &value)?;

        if let Some(assert) = &case.assert {
            assert(&value).map_err(|err| CaseError::Assertion {
                case: case.name.clone(),
                message: format!("{:#}", err),
            })?;
        }

        self.responses
            .by_case
            .insert(case.name.clone(), value.clone());
        Ok(value)
    }

    /// Run every case in order, stopping at the first failure
    pub async fn run_all(&mut self, cases: &[TestCase]) -> Result<(), CaseError> {
        for case in cases {
            self.run(case).await?;
        }
        Ok(())
    }
}

fn check_outcome(case: &TestCase, result: Result<Value, ClientError>) -> Result<Value, CaseError> {
    let expected = &case.expected;
    match (result, &expected.error) {
        (Ok(value), None) => Ok(value),
        (Err(source), None) => Err(CaseError::Failed {
            case: case.name.clone(),
            source,
        }),
        (Ok(_), Some(text)) => Err(CaseError::Succeeded {
            case: case.name.clone(),
            expected: text.clone(),
        }),
        (Err(err), Some(text)) => {
            if err.to_string() != *text {
                return Err(CaseError::WrongError {
                    case: case.name.clone(),
                    expected: text.clone(),
                    actual: err.to_string(),
                });
            }
            match expected.status {
                Some(status) if err.status() != Some(status) => Err(CaseError::WrongStatus {
                    case: case.name.clone(),
                    expected: status,
                    actual: err.status(),
                }),
                _ => Ok(Value::Null),
            }
        }
    }
}

fn check_body(case: &TestCase, value: &Value) -> Result<(), CaseError> {
    let expected = &case.expected;
    let wrong_body = |wanted: String| CaseError::WrongBody {
        case: case.name.clone(),
        expected: wanted,
        actual: value.to_string(),
    };

    if expected.no_body && !value.is_null() {
        return Err(wrong_body("no body".to_string()));
    }
    if let Some(pattern) = &expected.body_regexp {
        let regex = Regex::new(pattern).map_err(|source| CaseError::Pattern {
            case: case.name.clone(),
            source,
        })?;
        if !regex.is_match(&value.to_string()) {
            return Err(wrong_body(format!("matching /{}/", pattern)));
        }
    }
    match &expected.body {
        Some(body) if body != value => Err(wrong_body(body.to_string())),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Verb;
    use serde_json::json;

    fn case(expected: ExpectedResponse) -> TestCase {
        TestCase::command("case", Command::new(Verb::Get, "albums")).expect(expected)
    }

    fn not_found() -> ClientError {
        ClientError::UnexpectedResponse {
            status: StatusCode::NOT_FOUND,
            text: "Resource not found.".to_string(),
            body: String::new(),
        }
    }

    #[test]
    fn test_outcome_requires_success_by_default() {
        let value = check_outcome(&case(ExpectedResponse::default()), Ok(json!({}))).unwrap();
        assert_eq!(value, json!({}));

        let err = check_outcome(&case(ExpectedResponse::default()), Err(not_found())).unwrap_err();
        assert!(matches!(err, CaseError::Failed { .. }));
    }

    #[test]
    fn test_outcome_checks_error_text_and_status() {
        let text = "unexpected response with text: Resource not found.";
        assert!(
            check_outcome(
                &case(ExpectedResponse::error(StatusCode::NOT_FOUND, text)),
                Err(not_found())
            )
            .is_ok()
        );

        let err = check_outcome(
            &case(ExpectedResponse::error(StatusCode::FORBIDDEN, text)),
            Err(not_found()),
        )
        .unwrap_err();
        assert!(matches!(err, CaseError::WrongStatus { .. }));

        let err = check_outcome(
            &case(ExpectedResponse::error(StatusCode::NOT_FOUND, "other")),
            Err(not_found()),
        )
        .unwrap_err();
        assert!(matches!(err, CaseError::WrongError { .. }));

        let err = check_outcome(
            &case(ExpectedResponse::error(StatusCode::NOT_FOUND, text)),
            Ok(json!({})),
        )
        .unwrap_err();
        assert!(matches!(err, CaseError::Succeeded { .. }));
    }

    #[test]
    fn test_body_checks() {
        let value = json!({ "id": "a1", "title": "Album1" });

        assert!(check_body(&case(ExpectedResponse::body(value.clone())), &value).is_ok());
        let pattern = ExpectedResponse::body_matching(r#""title":"Album\d""#);
        assert!(check_body(&case(pattern), &value).is_ok());
        assert!(matches!(
            check_body(&case(ExpectedResponse::body_matching("Album2")), &value),
            Err(CaseError::WrongBody { .. })
        ));
        assert!(matches!(
            check_body(&case(ExpectedResponse::body_matching("(")), &value),
            Err(CaseError::Pattern { .. })
        ));
        assert!(matches!(
            check_body(&case(ExpectedResponse::no_body()), &value),
            Err(CaseError::WrongBody { .. })
        ));
        assert!(check_body(&case(ExpectedResponse::no_body()), &Value::Null).is_ok());
    }

    #[test]
    fn test_responses_expose_ids() {
        let mut responses = Responses::default();
        responses
            .by_case
            .insert("create".to_string(), json!({ "id": "a1" }));
        assert_eq!(responses.id("create"), Some("a1"));
        assert_eq!(responses.id("missing"), None);
    }
}
