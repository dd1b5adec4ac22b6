//! Actions invoked on a system or object class.
//!
//! Scripts and authentication are forwarded to the connector; their results
//! and failures are normalized into the response shapes callers expect.

use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use xavyo_connector::error::ConnectorError;
use xavyo_connector::schema::ObjectClass;
use xavyo_connector::traits::{AuthenticateOp, ScriptOp};

use crate::error::{ResourceError, ResourceResult};
use crate::translate::translate;

/// A requested action with its parsed parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Run one live sync cycle.
    LiveSync,
    /// Run a script inside the target system.
    Script { script_id: String, params: Value },
    /// Verify credentials.
    Authenticate { username: String, password: String },
    /// Check the system configuration and connection.
    Test,
}

impl Action {
    /// Parse an action name and its parameters.
    ///
    /// `script` expects `scriptId`; the remaining parameters are handed to
    /// the script. `authenticate` expects `username` and `password`.
    pub fn parse(name: &str, params: &Value) -> ResourceResult<Self> {
        match name {
            "liveSync" => Ok(Self::LiveSync),
            "test" => Ok(Self::Test),
            "script" => {
                let script_id = required_string(params, "scriptId")?;
                let mut rest = params.as_object().cloned().unwrap_or_default();
                rest.remove("scriptId");
                Ok(Self::Script {
                    script_id,
                    params: Value::Object(rest),
                })
            }
            "authenticate" => Ok(Self::Authenticate {
                username: required_string(params, "username")?,
                password: required_string(params, "password")?,
            }),
            other => Err(ResourceError::bad_request(format!(
                "Unsupported action '{other}'"
            ))),
        }
    }

    /// Action name as used in requests.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::LiveSync => "liveSync",
            Self::Script { .. } => "script",
            Self::Authenticate { .. } => "authenticate",
            Self::Test => "test",
        }
    }
}

fn required_string(params: &Value, key: &str) -> ResourceResult<String> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ResourceError::bad_request(format!("Missing parameter '{key}'")))
}

/// Forwards script and authentication actions to a connector.
pub struct ActionDispatcher<'a, C: ?Sized> {
    system: &'a str,
    connector: &'a C,
}

impl<'a, C> ActionDispatcher<'a, C>
where
    C: ScriptOp + AuthenticateOp + ?Sized,
{
    /// Create a dispatcher for one system's connector.
    pub fn new(system: &'a str, connector: &'a C) -> Self {
        Self { system, connector }
    }

    /// Run a script.
    ///
    /// A failure raised by the script itself is reported inside the
    /// response; every other failure is translated.
    pub async fn run_script(&self, script_id: &str, params: &Value) -> ResourceResult<Value> {
        debug!(system = %self.system, script_id, "Running script action");
        match self.connector.run_script(script_id, params).await {
            Ok(result) => Ok(json!({ "actions": [{ "result": result }] })),
            Err(ConnectorError::ScriptFailed { message, .. }) => {
                warn!(system = %self.system, script_id, error = %message, "Script failed");
                Ok(json!({ "actions": [{ "error": message }] }))
            }
            Err(err) => Err(translate(err)),
        }
    }

    /// Authenticate against an object class, returning `{"_id": uid}`.
    pub async fn authenticate(
        &self,
        object_class: &ObjectClass,
        username: &str,
        password: &str,
    ) -> ResourceResult<Value> {
        debug!(
            system = %self.system,
            object_class = %object_class.name,
            "Authenticating"
        );
        let uid = self
            .connector
            .authenticate(&object_class.native_name, username, password)
            .await?;

        let mut response = Map::new();
        response.insert("_id".to_string(), Value::String(uid.value().to_string()));
        Ok(Value::Object(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use xavyo_connector::error::ConnectorResult;
    use xavyo_connector::operation::Uid;
    use xavyo_connector::traits::Connector;
    use xavyo_connector::types::ConnectorType;

    struct ScriptHost {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Connector for ScriptHost {
        fn connector_type(&self) -> ConnectorType {
            ConnectorType::Scripted
        }

        fn display_name(&self) -> &str {
            "script-host"
        }

        async fn test_connection(&self) -> ConnectorResult<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl ScriptOp for ScriptHost {
        async fn run_script(&self, script_id: &str, params: &Value) -> ConnectorResult<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match script_id {
                "echo" => Ok(params.clone()),
                "broken" => Err(ConnectorError::script_failed("broken", "syntax error")),
                _ => Err(ConnectorError::connection_failed("host down")),
            }
        }
    }

    #[async_trait]
    impl AuthenticateOp for ScriptHost {
        async fn authenticate(
            &self,
            _object_class: &str,
            username: &str,
            password: &str,
        ) -> ConnectorResult<Uid> {
            if password == "secret" {
                Ok(Uid::from_value(format!("id-{username}")))
            } else {
                Err(ConnectorError::InvalidPassword {
                    message: "wrong password".to_string(),
                })
            }
        }
    }

    fn host() -> ScriptHost {
        ScriptHost {
            calls: AtomicUsize::new(0),
        }
    }

    #[test]
    fn test_parse_script_action() {
        let action = Action::parse("script", &json!({"scriptId": "echo", "x": 1})).unwrap();
        assert_eq!(
            action,
            Action::Script {
                script_id: "echo".to_string(),
                params: json!({"x": 1}),
            }
        );
        assert_eq!(action.name(), "script");
    }

    #[test]
    fn test_parse_rejects_unknown_and_incomplete() {
        assert!(matches!(
            Action::parse("reboot", &Value::Null),
            Err(ResourceError::BadRequest { .. })
        ));
        assert!(matches!(
            Action::parse("authenticate", &json!({"username": "bob"})),
            Err(ResourceError::BadRequest { .. })
        ));
        assert_eq!(Action::parse("liveSync", &Value::Null).unwrap(), Action::LiveSync);
    }

    #[tokio::test]
    async fn test_script_result_shape() {
        let host = host();
        let dispatcher = ActionDispatcher::new("xml", &host);
        let response = dispatcher
            .run_script("echo", &json!({"x": 1}))
            .await
            .unwrap();
        assert_eq!(response, json!({"actions": [{"result": {"x": 1}}]}));
        assert_eq!(host.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_script_failure_reported_in_body() {
        let host = host();
        let dispatcher = ActionDispatcher::new("xml", &host);
        let response = dispatcher.run_script("broken", &json!({})).await.unwrap();
        assert_eq!(response, json!({"actions": [{"error": "syntax error"}]}));
    }

    #[tokio::test]
    async fn test_script_other_failure_translated() {
        let host = host();
        let dispatcher = ActionDispatcher::new("xml", &host);
        let err = dispatcher.run_script("other", &json!({})).await.unwrap_err();
        assert!(matches!(err, ResourceError::ServiceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_authenticate() {
        let host = host();
        let dispatcher = ActionDispatcher::new("xml", &host);
        let accounts = ObjectClass::new("account", "__ACCOUNT__");

        let response = dispatcher
            .authenticate(&accounts, "bob", "secret")
            .await
            .unwrap();
        assert_eq!(response, json!({"_id": "id-bob"}));

        let err = dispatcher
            .authenticate(&accounts, "bob", "nope")
            .await
            .unwrap_err();
        assert!(matches!(err, ResourceError::Unauthorized { .. }));
        assert!(!err.is_retryable());
    }
}
