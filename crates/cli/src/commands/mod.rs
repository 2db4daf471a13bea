pub mod config;
pub mod estimate;
pub mod migrate;
pub mod quote;
pub mod seed;

use std::future::Future;

use renoquote_core::config::{AppConfig, LoadOptions};
use renoquote_core::errors::{ApplicationError, InterfaceError};
use renoquote_db::{connect_with_config, migrations, DbPool};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data: None,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    /// Success carrying a structured payload under `data`.
    pub fn success_with(command: &str, message: impl Into<String>, data: impl Serialize) -> Self {
        match serde_json::to_value(data) {
            Ok(data) => {
                let payload = CommandOutcome {
                    command: command.to_string(),
                    status: "ok".to_string(),
                    error_class: None,
                    message: message.into(),
                    data: Some(data),
                };
                Self { exit_code: 0, output: serialize_payload(payload) }
            }
            Err(error) => Self::failure(command, "serialization", error.to_string(), 10),
        }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

/// `(error_class, message, exit_code)` carried out of a command body.
pub type Failure = (&'static str, String, u8);

pub fn config_failure(error: impl std::fmt::Display) -> Failure {
    ("config_validation", format!("configuration issue: {error}"), 2)
}

pub fn application_failure(error: ApplicationError) -> Failure {
    let interface = InterfaceError::from(error);
    let exit_code = match interface {
        InterfaceError::BadRequest { .. } => 7,
        InterfaceError::NotFound { .. } => 8,
        InterfaceError::ServiceUnavailable { .. } => 9,
        InterfaceError::Internal { .. } => 10,
    };
    (interface.error_class(), interface.to_string(), exit_code)
}

/// Loads config, starts a current-thread runtime, connects and migrates, then
/// runs `body`. Every failure becomes a structured `CommandResult`.
pub fn run_with_database<F, Fut>(command: &str, body: F) -> CommandResult
where
    F: FnOnce(AppConfig, DbPool) -> Fut,
    Fut: Future<Output = Result<CommandResult, Failure>>,
{
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            let (error_class, message, exit_code) = config_failure(error);
            return CommandResult::failure(command, error_class, message, exit_code);
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                command,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;
        let outcome = body(config, pool.clone()).await;
        pool.close().await;
        outcome
    });

    match result {
        Ok(result) => result,
        Err((error_class, message, exit_code)) => {
            CommandResult::failure(command, error_class, message, exit_code)
        }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

#[cfg(test)]
mod tests {
    use renoquote_core::errors::{ApplicationError, DomainError};

    use super::{application_failure, CommandResult};

    #[test]
    fn not_found_gets_its_own_exit_code() {
        let (class, message, code) =
            application_failure(DomainError::not_found("quote", "Q-404").into());

        assert_eq!(class, "not_found");
        assert!(message.contains("Q-404"));
        assert_eq!(code, 8);
    }

    #[test]
    fn persistence_failures_are_distinct_from_validation() {
        let (class, _, code) =
            application_failure(ApplicationError::Persistence("database is locked".into()));
        assert_eq!((class, code), ("persistence", 9));

        let (class, _, code) =
            application_failure(DomainError::validation("negative discount").into());
        assert_eq!((class, code), ("validation", 7));
    }

    #[test]
    fn success_with_nests_data_and_plain_success_omits_it() {
        let with_data = CommandResult::success_with("quote", "ok", serde_json::json!({"n": 1}));
        let payload: serde_json::Value = serde_json::from_str(&with_data.output).expect("json");
        assert_eq!(payload["data"]["n"], 1);

        let plain = CommandResult::success("migrate", "done");
        let payload: serde_json::Value = serde_json::from_str(&plain.output).expect("json");
        assert!(payload.get("data").is_none());
        assert!(payload["error_class"].is_null());
    }
}
