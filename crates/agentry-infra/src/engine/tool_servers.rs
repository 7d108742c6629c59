//! Tool-server process launcher.
//!
//! Stdio tool servers run as child processes owned by the engine that
//! launched them. Children are spawned with `kill_on_drop`, so an engine that
//! is dropped without an explicit shutdown still reaps its servers.
//! Network transports (`sse`, `streamable_http`) have no local process; their
//! `command` is the endpoint URL and is only recorded.
//!
//! Stdin stays piped so a server that exits on EOF keeps running. Stdout and
//! stderr go to the null device until something reads them.

use std::process::Stdio;

use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use agentry_types::agent::{ToolServerConfig, TransportKind};
use agentry_types::error::EngineError;

/// One launched or attached tool server.
struct ToolServerHandle {
    name: String,
    child: Option<Mutex<Child>>,
}

impl ToolServerHandle {
    async fn stop(&self) -> Result<(), EngineError> {
        let Some(child) = &self.child else {
            return Ok(());
        };
        let mut child = child.lock().await;

        // Already exited (or killed by an earlier shutdown).
        if let Ok(Some(_)) = child.try_wait() {
            return Ok(());
        }

        child.kill().await.map_err(|e| {
            EngineError::Shutdown(format!("failed to stop tool server '{}': {e}", self.name))
        })
    }
}

/// All tool servers belonging to one engine, in configuration order.
#[derive(Default)]
pub struct ToolServerSet {
    servers: Vec<ToolServerHandle>,
}

impl ToolServerSet {
    /// Launch every configured server.
    ///
    /// Fails on the first server that cannot be started; servers launched
    /// before it are killed when the partial set is dropped.
    pub fn launch(configs: &[ToolServerConfig]) -> Result<Self, EngineError> {
        let mut servers = Vec::with_capacity(configs.len());
        for config in configs {
            servers.push(launch_one(config)?);
        }
        Ok(Self { servers })
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    /// Stop every server. Keeps going after a failure and reports the first one.
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        let mut first_error = None;
        for server in &self.servers {
            if let Err(e) = server.stop().await {
                tracing::warn!(server = %server.name, error = %e, "tool server did not stop cleanly");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn launch_one(config: &ToolServerConfig) -> Result<ToolServerHandle, EngineError> {
    if config.transport != TransportKind::Stdio {
        tracing::debug!(
            server = %config.name,
            transport = %config.transport,
            endpoint = %config.command,
            "attaching remote tool server"
        );
        return Ok(ToolServerHandle {
            name: config.name.clone(),
            child: None,
        });
    }

    let child = Command::new(&config.command)
        .args(&config.args)
        .envs(&config.env)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| EngineError::ToolServer {
            name: config.name.clone(),
            message: format!("failed to launch '{}': {e}", config.command),
        })?;

    tracing::debug!(server = %config.name, pid = ?child.id(), "tool server started");

    Ok(ToolServerHandle {
        name: config.name.clone(),
        child: Some(Mutex::new(child)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_missing_binary_names_server() {
        let configs = vec![ToolServerConfig::stdio(
            "calc",
            "/nonexistent/agentry-calc-server",
            vec![],
        )];
        match ToolServerSet::launch(&configs) {
            Err(EngineError::ToolServer { name, message }) => {
                assert_eq!(name, "calc");
                assert!(message.contains("/nonexistent/agentry-calc-server"));
            }
            other => panic!("expected ToolServer error, got {:?}", other.map(|s| s.len())),
        }
    }

    #[tokio::test]
    async fn test_remote_transport_has_no_process() {
        let mut config = ToolServerConfig::stdio("search", "http://localhost:9000/sse", vec![]);
        config.transport = TransportKind::Sse;

        let set = ToolServerSet::launch(&[config]).unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.servers[0].child.is_none());
        assert!(set.shutdown().await.is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stdio_server_lifecycle() {
        let configs = vec![ToolServerConfig::stdio(
            "sleeper",
            "sleep",
            vec!["30".to_string()],
        )];
        let set = ToolServerSet::launch(&configs).unwrap();
        assert_eq!(set.len(), 1);

        set.shutdown().await.unwrap();
        let child = set.servers[0].child.as_ref().unwrap();
        assert!(child.lock().await.try_wait().unwrap().is_some());
        // Second shutdown is a no-op.
        set.shutdown().await.unwrap();
    }
}
