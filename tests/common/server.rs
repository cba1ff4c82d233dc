//! Test server management: spawns and tears down a `banchod` instance
//! against a scratch config/database pair.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Child, Command};
use std::time::Duration;

use tokio::time::sleep;

pub struct TestServer {
    child: Child,
    pub port: u16,
    pub db_path: String,
    data_dir: PathBuf,
}

impl TestServer {
    /// Spawns a server listening on `127.0.0.1:{port}` with its store at
    /// `{data_dir}/bancho.db`. The caller seeds that database (via
    /// [`super::seed::seed_user`]) either before or after spawning — the
    /// store only needs to exist by the time a login request arrives.
    pub async fn spawn(port: u16) -> anyhow::Result<Self> {
        let data_dir = std::env::temp_dir().join(format!("bancho-test-{port}"));
        std::fs::create_dir_all(&data_dir)?;

        let db_path = data_dir.join("bancho.db");
        let config_path = data_dir.join("config.toml");
        let config_content = format!(
            r#"
[listen]
addr = "127.0.0.1:{port}"

[store]
path = "{db}"

[redis]
url = "redis://127.0.0.1:1/0"

[bancho]
minimum_client_year = 2000
welcome_channels = []
"#,
            port = port,
            db = db_path.display(),
        );
        std::fs::write(&config_path, config_content)?;

        let cargo_manifest_dir = env!("CARGO_MANIFEST_DIR");
        let binary_path = PathBuf::from(cargo_manifest_dir).join("target/debug/banchod");

        let child = Command::new(&binary_path).arg(&config_path).spawn()?;

        let server = Self { child, port, db_path: db_path.display().to_string(), data_dir };
        server.wait_until_ready().await?;
        Ok(server)
    }

    async fn wait_until_ready(&self) -> anyhow::Result<()> {
        for _ in 0..50 {
            if tokio::net::TcpStream::connect(("127.0.0.1", self.port)).await.is_ok() {
                return Ok(());
            }
            sleep(Duration::from_millis(100)).await;
        }
        anyhow::bail!("server failed to start within 5 seconds")
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        let _ = std::fs::remove_dir_all(&self.data_dir);
    }
}
