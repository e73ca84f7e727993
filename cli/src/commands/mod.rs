//! Subcommand implementations
//!
//! Every subcommand talks to the host the same way: envelopes are written to
//! stdout one per line, and replies are read from stdin one per line. Results
//! are printed to stderr so stdout carries nothing but protocol.

pub mod answer;
pub mod query;
pub mod stream;

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_io::Timer;
use blocking::Unblock;
use futures_lite::io::BufReader;
use futures_lite::{AsyncBufReadExt, AsyncRead, Stream, StreamExt, future};
use wongus_bridge::{Bridge, CommandSpec, LineChannel};

use crate::cli::CommandArgs;
use crate::config::MergedConfig;
use crate::error::CliResult;

/// Create a bridge that posts to stdout
pub fn connect(config: &MergedConfig) -> Arc<Bridge> {
    Arc::new(Bridge::with_config(
        LineChannel::new(io::stdout()),
        config.bridge.clone(),
    ))
}

/// Host messages read from stdin
pub fn stdin_lines() -> impl Stream<Item = String> + Send + 'static {
    host_lines(Unblock::new(io::stdin()))
}

/// Split `reader` into newline-delimited host messages
///
/// Lines that are not UTF-8 are logged and skipped. The stream ends at EOF
/// or on a read error.
pub fn host_lines<R>(reader: R) -> impl Stream<Item = String> + Send + 'static
where
    R: AsyncRead + Unpin + Send + 'static,
{
    BufReader::new(reader)
        .split(b'\n')
        .take_while(|read| match read {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read from host");
                false
            }
        })
        .filter_map(|read| {
            let mut bytes = read.ok()?;
            if bytes.last() == Some(&b'\r') {
                bytes.pop();
            }
            if bytes.is_empty() {
                return None;
            }
            match String::from_utf8(bytes) {
                Ok(line) => Some(line),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping host message that is not UTF-8");
                    None
                }
            }
        })
}

/// Run `work` against a fresh bridge while pumping stdin into it
///
/// Fails if `--wait-secs` elapses first.
pub async fn session<T, F, Fut>(config: &MergedConfig, work: F) -> CliResult<T>
where
    F: FnOnce(Arc<Bridge>) -> Fut,
    Fut: Future<Output = CliResult<T>>,
{
    let bridge = connect(config);
    drive(&bridge, stdin_lines(), config.wait, work).await
}

/// Run `work` while `inbound` is pumped into `bridge`
///
/// When `inbound` ends the pump shuts the bridge down, which completes
/// anything still unanswered with `Error::Shutdown`. Replies delivered
/// before that are kept, so `work` decides the outcome.
async fn drive<T, S, F, Fut>(
    bridge: &Arc<Bridge>,
    inbound: S,
    wait: Option<Duration>,
    work: F,
) -> CliResult<T>
where
    S: Stream<Item = String>,
    F: FnOnce(Arc<Bridge>) -> Fut,
    Fut: Future<Output = CliResult<T>>,
{
    let pump = async {
        bridge.pump(inbound).await;
        future::pending().await
    };
    let sweeper = async {
        bridge.run_sweeper().await;
        future::pending().await
    };
    let deadline = async {
        match wait {
            Some(wait) => {
                Timer::after(wait).await;
                Err(anyhow!("no reply from host within {}s", wait.as_secs()))
            }
            None => future::pending().await,
        }
    };

    let result = future::or(
        work(Arc::clone(bridge)),
        future::or(pump, future::or(sweeper, deadline)),
    )
    .await;
    bridge.shutdown();
    result
}

/// Build a host command from command-line arguments
pub fn command_spec(args: &CommandArgs) -> CliResult<CommandSpec> {
    let mut spec = CommandSpec::new(args.command.iter().cloned());
    if let Some(cwd) = &args.cwd {
        spec = spec.working_dir(cwd.clone());
    }
    for env_str in &args.envs {
        let Some((key, value)) = env_str.split_once('=') else {
            anyhow::bail!("invalid env format (expected KEY=VALUE): {}", env_str);
        };
        spec = spec.env(key, value);
    }
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_lite::io::Cursor;
    use smol::channel::Receiver;
    use wongus_bridge::Error;

    fn bridge() -> (Arc<Bridge>, Receiver<String>) {
        let (tx, rx) = smol::channel::unbounded::<String>();
        (Arc::new(Bridge::new(tx)), rx)
    }

    fn host(lines: &[&str]) -> impl Stream<Item = String> {
        futures_lite::stream::iter(lines.iter().map(|l| l.to_string()).collect::<Vec<_>>())
    }

    #[test]
    fn test_reply_then_eof_succeeds() {
        let (bridge, outbound) = bridge();
        let inbound = host(&[r#"{"id":1,"body":{"ok":"hello"}}"#]);

        let content = smol::block_on(drive(&bridge, inbound, None, |bridge| async move {
            Ok(bridge.read("/etc/hosts").await?)
        }))
        .unwrap();

        assert_eq!(content, "hello");
        assert!(outbound.try_recv().unwrap().contains("/etc/hosts"));
        assert!(bridge.is_shut_down());
    }

    #[test]
    fn test_eof_without_reply_is_shutdown() {
        let (bridge, _outbound) = bridge();

        let result = smol::block_on(drive(&bridge, host(&[]), None, |bridge| async move {
            Ok(bridge.read("/etc/hosts").await?)
        }));

        let error = result.unwrap_err();
        assert!(matches!(error.downcast_ref::<Error>(), Some(Error::Shutdown)));
    }

    #[test]
    fn test_finished_stream_then_eof_succeeds() {
        let (bridge, _outbound) = bridge();
        let inbound = host(&[
            r#"{"id":1,"line":"a"}"#,
            r#"{"id":1,"body":{"ok":{}}}"#,
            r#"{"id":1,"line":"b"}"#,
            r#"{"id":1,"end":{}}"#,
        ]);

        let lines = smol::block_on(drive(&bridge, inbound, None, |bridge| async move {
            let mut stream = bridge.stream_command(CommandSpec::new(["tail"])).await?;
            let mut lines = Vec::new();
            while let Some(line) = stream.next().await {
                lines.push(line?);
            }
            Ok(lines)
        }))
        .unwrap();

        assert_eq!(lines, ["a", "b"]);
    }

    #[test]
    fn test_deadline() {
        let (bridge, _outbound) = bridge();
        let inbound = futures_lite::stream::pending::<String>();

        let result = smol::block_on(drive(
            &bridge,
            inbound,
            Some(Duration::from_millis(20)),
            |bridge| async move { Ok(bridge.read("/slow").await?) },
        ));
        assert!(result.unwrap_err().to_string().contains("no reply from host"));
    }

    #[test]
    fn test_host_lines_skip_invalid_utf8() {
        let input = b"\xff\xfe garbage\n{\"id\":1}\r\n\nlast".to_vec();
        let lines: Vec<String> = smol::block_on(host_lines(Cursor::new(input)).collect());
        assert_eq!(lines, [r#"{"id":1}"#, "last"]);
    }

    fn args(envs: &[&str]) -> CommandArgs {
        CommandArgs {
            command: vec!["env".to_string()],
            cwd: Some("/srv".to_string()),
            envs: envs.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_command_spec() {
        let spec = command_spec(&args(&["A=1", "B=x=y"])).unwrap();
        assert_eq!(spec.command, ["env"]);
        assert_eq!(spec.working_dir.as_deref(), Some("/srv"));
        assert_eq!(spec.environment["A"], "1");
        assert_eq!(spec.environment["B"], "x=y");
    }

    #[test]
    fn test_command_spec_rejects_bad_env() {
        assert!(command_spec(&args(&["NOEQUALS"])).is_err());
    }
}
