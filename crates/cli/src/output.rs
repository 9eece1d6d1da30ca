//! JSON output envelope: the CLI's user-facing contract on stdout.
//!
//! Success payloads are printed as-is; failures become
//! `{"error": {"message": ...}}`. Internal error detail is only appended
//! when the `verbose-errors` feature flag is on; by default no stack
//! traces or provider chatter reach the user.

use avalanche_common::AuthError;
use serde_json::{json, Value};

/// A command failure ready for the error envelope.
#[derive(Debug)]
pub struct CliError {
    /// User-facing message.
    pub message: String,
    /// Underlying error, rendered only with `verbose-errors`.
    pub source: Option<AuthError>,
}

impl CliError {
    pub fn new(message: impl Into<String>, source: Option<AuthError>) -> Self {
        Self { message: message.into(), source }
    }

    /// Wrap a guard failure, preferring the requirement's message override.
    pub fn from_guard(override_message: Option<&str>, source: AuthError) -> Self {
        let message = override_message
            .map_or_else(|| source.to_string(), ToString::to_string);
        Self { message, source: Some(source) }
    }

    /// Render the error envelope.
    #[must_use]
    pub fn to_value(&self, verbose: bool) -> Value {
        let mut error = json!({ "message": self.message });
        if verbose {
            if let (Some(source), Some(obj)) = (&self.source, error.as_object_mut()) {
                obj.insert("detail".to_string(), Value::String(source.to_string()));
            }
        }
        json!({ "error": error })
    }
}

fn render(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// Print a success payload to stdout.
pub fn print_success(value: &Value) {
    println!("{}", render(value));
}

/// Print the error envelope to stdout.
pub fn print_error(err: &CliError, verbose: bool) {
    println!("{}", render(&err.to_value(verbose)));
}

/// Humanize a remaining lifetime.
///
/// Below two minutes the exact seconds matter (tokens are short-lived),
/// above that a rough natural delta reads better.
#[must_use]
pub fn adaptive_naturaldelta(seconds: i64) -> String {
    const EXACT_THRESHOLD: i64 = 120;

    if seconds < EXACT_THRESHOLD {
        format!("{seconds} seconds")
    } else {
        use chrono_humanize::{Accuracy, HumanTime, Tense};
        HumanTime::from(chrono::Duration::seconds(seconds))
            .to_text_en(Accuracy::Rough, Tense::Present)
    }
}
