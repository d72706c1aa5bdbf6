//! `jwt decode <token>`: shows the header and payload of a JSON Web Token.
//!
//! The signature is not verified.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{json, Value};

use crate::commands::context::ExecutionContext;
use crate::commands::descriptor::CommandProcessor;
use crate::commands::parser::ProcessCommand;
use crate::error::Result;

const MALFORMED: &str = "Invalid JWT token (expected 3 parts separated by dots)";

/// Decodes the header and payload segments of `token`.
pub fn decode_token(token: &str) -> std::result::Result<(Value, Value), String> {
    let parts: Vec<&str> = token.trim().split('.').collect();
    let [header, payload, _signature] = parts.as_slice() else {
        return Err(MALFORMED.to_string());
    };
    Ok((decode_segment("header", header)?, decode_segment("payload", payload)?))
}

fn decode_segment(name: &str, segment: &str) -> std::result::Result<Value, String> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|e| format!("Invalid JWT {name}: {e}"))?;
    serde_json::from_slice(&bytes).map_err(|e| format!("Invalid JWT {name}: {e}"))
}

pub struct DecodeCommand;

#[async_trait]
impl CommandProcessor for DecodeCommand {
    async fn process_command(&self, command: &ProcessCommand, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        let token = command.payload().unwrap_or_default();
        let (header, payload) = match decode_token(&token) {
            Ok(decoded) => decoded,
            Err(message) => {
                ctx.writer().write_error(&message);
                return ctx.process().exit(-1);
            }
        };

        let decoded = json!({ "header": header, "payload": payload });
        let mut writer = ctx.writer();
        writer.write_json(&decoded);
        if let Some(exp) = decoded["payload"].get("exp").and_then(Value::as_i64) {
            writer.write_info(&format!("Expires at unix time {exp}"));
        }
        ctx.process().output(decoded);
        Ok(())
    }
}
