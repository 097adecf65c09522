//! Newline-delimited JSON-RPC over stdin/stdout
//!
//! One message per line in, one response per line out. Messages are handled
//! in arrival order; notifications produce no output line.

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tracing::{debug, info, warn};

use crate::mcp::{
    rpc::{json_rpc_error, PARSE_ERROR},
    server::handle_json_rpc_payload,
};
use crate::AppState;

pub async fn serve_stdio(state: AppState) -> std::io::Result<()> {
    info!("stdio transport started");
    let reader = BufReader::new(tokio::io::stdin());
    let writer = BufWriter::new(tokio::io::stdout());
    serve_lines(&state, reader, writer).await?;
    info!("stdio transport stopped, stdin closed");
    Ok(())
}

/// Serves until `reader` reaches end of input.
pub async fn serve_lines<R, W>(state: &AppState, mut reader: R, mut writer: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = Vec::new();

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            break;
        }

        let Some(response) = handle_line(state, &line).await else {
            continue;
        };
        write_message(&mut writer, &response).await?;
    }

    writer.flush().await
}

/// Undecodable lines are answered with a parse error and never end the session.
async fn handle_line(state: &AppState, line: &[u8]) -> Option<Value> {
    let text = match std::str::from_utf8(line) {
        Ok(text) => text.trim(),
        Err(err) => {
            warn!(error = %err, "discarding message that is not valid UTF-8");
            return Some(json_rpc_error(None, PARSE_ERROR, "Parse error"));
        }
    };
    if text.is_empty() {
        return None;
    }

    let response = match serde_json::from_str::<Value>(text) {
        Ok(payload) => handle_json_rpc_payload(state, payload).await,
        Err(err) => {
            warn!(error = %err, "discarding unparseable message");
            Some(json_rpc_error(None, PARSE_ERROR, "Parse error"))
        }
    };
    if response.is_none() {
        debug!("no response for notification");
    }
    response
}

async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, message: &Value) -> std::io::Result<()> {
    let mut encoded = serde_json::to_vec(message)?;
    encoded.push(b'\n');
    writer.write_all(&encoded).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestContext;
    use serde_json::json;

    async fn exchange(input: &str) -> Vec<Value> {
        exchange_bytes(input.as_bytes()).await
    }

    async fn exchange_bytes(input: &[u8]) -> Vec<Value> {
        let context = TestContext::new();
        let mut output = Vec::new();
        serve_lines(&context.state(), input, &mut output)
            .await
            .expect("stdio exchange");

        String::from_utf8(output)
            .expect("utf-8 output")
            .lines()
            .map(|line| serde_json::from_str(line).expect("json line"))
            .collect()
    }

    #[tokio::test]
    async fn answers_each_request_on_its_own_line() {
        let responses = exchange(concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"ping","arguments":{}}}"#,
            "\n",
        ))
        .await;

        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], json!(1));
        assert_eq!(responses[0]["result"], json!({}));
        assert_eq!(responses[1]["result"]["content"][0]["text"], json!("pong"));
    }

    #[tokio::test]
    async fn malformed_line_yields_parse_error_and_serving_continues() {
        let responses = exchange(concat!(
            "{not json\n",
            r#"{"jsonrpc":"2.0","id":7,"method":"ping"}"#,
            "\n",
        ))
        .await;

        assert_eq!(responses[0]["error"]["code"], json!(PARSE_ERROR));
        assert_eq!(responses[0]["id"], Value::Null);
        assert_eq!(responses[1]["id"], json!(7));
    }

    #[tokio::test]
    async fn batches_are_answered_as_one_line() {
        let responses = exchange(concat!(
            r#"[{"jsonrpc":"2.0","id":1,"method":"ping"},{"jsonrpc":"2.0","id":2,"method":"nope"}]"#,
            "\n",
        ))
        .await;

        assert_eq!(responses.len(), 1);
        let batch = responses[0].as_array().expect("batch response");
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[1]["error"]["code"], json!(-32601));
    }

    #[tokio::test]
    async fn invalid_utf8_line_yields_parse_error_and_serving_continues() {
        let mut input = Vec::new();
        input.extend_from_slice(br#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#);
        input.extend_from_slice(b"\n\xff\xfe garbage\n");
        input.extend_from_slice(br#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#);
        input.push(b'\n');

        let responses = exchange_bytes(&input).await;

        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0]["id"], json!(1));
        assert_eq!(responses[1]["error"]["code"], json!(PARSE_ERROR));
        assert_eq!(responses[2]["id"], json!(2));
        assert_eq!(responses[2]["result"], json!({}));
    }

    #[tokio::test]
    async fn final_line_without_newline_is_answered() {
        let responses = exchange(r#"{"jsonrpc":"2.0","id":9,"method":"ping"}"#).await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["id"], json!(9));
    }
}
