//! Forwarding operator input from stdin to the push channel.

use sortwatch_socket::{Payload, SocketClient};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

/// Interpret one input line.
///
/// Blank lines are skipped. A line that parses as JSON is sent as JSON,
/// anything else as plain text.
pub fn parse_input(line: &str) -> Option<Payload> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<serde_json::Value>(line) {
        Ok(value) => Some(Payload::Json(value)),
        Err(_) => Some(Payload::Text(line.to_owned())),
    }
}

/// Send every line of `reader` through `client` until end of input.
///
/// End of input only stops forwarding; the connection stays up.
pub async fn forward_lines<R>(reader: R, client: SocketClient)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if let Some(payload) = parse_input(&line) {
                    client.send(payload);
                }
            }
            Ok(None) => {
                debug!("input closed; no longer forwarding");
                return;
            }
            Err(e) => {
                warn!(error = %e, "failed to read input; no longer forwarding");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn blank_lines_are_skipped() {
        assert_eq!(parse_input(""), None);
        assert_eq!(parse_input("   \t"), None);
    }

    #[test]
    fn json_lines_become_json() {
        assert_eq!(
            parse_input(r#"{"subscribe":"bin-7"}"#),
            Some(Payload::Json(json!({ "subscribe": "bin-7" })))
        );
    }

    #[test]
    fn other_lines_become_text() {
        assert_eq!(
            parse_input("status please\n"),
            Some(Payload::Text("status please".to_owned()))
        );
    }
}
