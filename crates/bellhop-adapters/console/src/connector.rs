use async_trait::async_trait;
use bellhop_core::Event;
use bellhop_runtime::{Connector, ConnectorError, ConnectorResult};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};
use tokio::sync::Mutex;
use tracing::trace;

use crate::parse::{parse_line, render};

/// Console connector over the process's stdin and stdout.
pub type StdioConsole = ConsoleConnector<BufReader<Stdin>, Stdout>;

/// Line-oriented connector over any async reader and writer.
pub struct ConsoleConnector<R, W> {
    name: String,
    reader: Mutex<R>,
    writer: Mutex<W>,
}

impl StdioConsole {
    /// Reads from stdin and prints to stdout.
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> ConsoleConnector<R, W> {
    /// Creates a connector named `console`.
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            name: "console".to_owned(),
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
        }
    }

    /// Renames the connector, e.g. to run two consoles side by side.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[async_trait]
impl<R, W> Connector for ConsoleConnector<R, W>
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    type Payload = String;
    type Outbound = String;

    fn name(&self) -> &str {
        &self.name
    }

    /// Next non-blank line. End of input closes the connector.
    async fn receive_one(&self) -> ConnectorResult<String> {
        let mut reader = self.reader.lock().await;
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).await? == 0 {
                return Err(ConnectorError::Closed);
            }
            if !line.trim().is_empty() {
                trace!(line = line.trim_end(), "Console input");
                return Ok(line);
            }
        }
    }

    async fn send_one(&self, outbound: String) -> ConnectorResult<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(outbound.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }

    fn to_internal_event(&self, payload: String) -> ConnectorResult<Event> {
        Ok(parse_line(&payload)?.into_event())
    }

    fn to_platform_payload(&self, event: &Event) -> ConnectorResult<String> {
        render(event)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use bellhop_core::message::plain_text;
    use bellhop_core::{Bus, kinds};
    use bellhop_runtime::{Adapter, AdapterState};

    use super::*;

    fn console(input: &'static str) -> ConsoleConnector<BufReader<&'static [u8]>, Vec<u8>> {
        ConsoleConnector::new(BufReader::new(input.as_bytes()), Vec::new())
    }

    #[tokio::test]
    async fn skips_blank_lines_and_closes_at_eof() {
        let connector = console("\n  \n@1 hi\n");
        assert_eq!(connector.receive_one().await.unwrap(), "@1 hi\n");
        assert!(matches!(
            connector.receive_one().await,
            Err(ConnectorError::Closed)
        ));
    }

    #[tokio::test]
    async fn echoes_through_an_adapter() {
        let bus = Arc::new(Bus::default());
        bus.on(&kinds::MESSAGE).handle_sync(|ctx| {
            let text = ctx.event().get("message").map(plain_text).unwrap_or_default();
            format!("echo {text}")
        });

        let adapter = Adapter::new(console("#3 hello\n@9 hi\n"));
        adapter.start(Arc::clone(&bus)).unwrap();

        let written = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let output = adapter.connector().writer.lock().await.clone();
                if output.iter().filter(|b| **b == b'\n').count() == 2 {
                    return output;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let mut lines: Vec<_> = String::from_utf8(written)
            .unwrap()
            .lines()
            .map(str::to_owned)
            .collect();
        lines.sort();
        assert_eq!(
            lines,
            vec!["Bot: [group 3] echo hello", "Bot: [user 9] echo hi"]
        );

        adapter.stop().await.unwrap();
        assert_eq!(adapter.state(), AdapterState::Stopped);
    }
}
