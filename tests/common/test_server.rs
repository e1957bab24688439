use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::LazyLock;

use serde_json::{Value, json};
use tempfile::TempDir;

pub struct TestServer {
    pub temp_dir: TempDir,
    pub base_url: String,
    pub admin_token: String,
    pub client: reqwest::Client,
    server_process: Option<Child>,
}

static BUILD_RELEASE: LazyLock<()> = LazyLock::new(|| {
    let build_status = Command::new("cargo")
        .args(["build", "--release"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .expect("build release binary");
    assert!(build_status.success(), "Failed to build release binary");
});

impl TestServer {
    pub async fn start() -> Self {
        LazyLock::force(&BUILD_RELEASE);

        let temp_dir = TempDir::new().expect("create temp dir");
        let data_dir = temp_dir.path();
        let binary = Path::new(env!("CARGO_MANIFEST_DIR")).join("target/release/ladle");

        let init_output = Command::new(&binary)
            .args(["admin", "init", "--data-dir"])
            .arg(data_dir)
            .arg("--non-interactive")
            .output()
            .expect("run init");
        assert!(
            init_output.status.success(),
            "Failed to initialize database"
        );

        let admin_token = std::fs::read_to_string(data_dir.join(".admin_token"))
            .expect("read admin token")
            .trim()
            .to_string();

        // Bind to a free port, then release it for the server to claim.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        drop(listener);

        let base_url = format!("http://127.0.0.1:{}", port);

        let server_process = Command::new(&binary)
            .args(["serve", "--data-dir"])
            .arg(data_dir)
            .args(["--host", "127.0.0.1", "--port"])
            .arg(port.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("start server");

        Self::wait_for_ready(&base_url).await;

        Self {
            temp_dir,
            base_url,
            admin_token,
            client: reqwest::Client::new(),
            server_process: Some(server_process),
        }
    }

    async fn wait_for_ready(base_url: &str) {
        let client = reqwest::Client::new();
        for _ in 0..50 {
            if client
                .get(format!("{}/health", base_url))
                .send()
                .await
                .is_ok()
            {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
        panic!("Server did not become ready");
    }

    pub fn data_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Registers a user and logs them in, returning `(user_id, token)`.
    pub async fn register_and_login(&self, username: &str, password: &str) -> (String, String) {
        let email = format!("{}@example.com", username);

        let resp: Value = self
            .client
            .post(self.url("/api/v1/users"))
            .json(&json!({
                "email": email,
                "username": username,
                "first_name": "Test",
                "last_name": "User",
                "password": password,
            }))
            .send()
            .await
            .expect("register user")
            .json()
            .await
            .expect("parse register response");
        let user_id = resp["data"]["id"].as_str().expect("user id").to_string();

        let resp: Value = self
            .client
            .post(self.url("/api/v1/auth/token"))
            .json(&json!({"email": email, "password": password}))
            .send()
            .await
            .expect("log in")
            .json()
            .await
            .expect("parse login response");
        let token = resp["data"]["token"].as_str().expect("token").to_string();

        (user_id, token)
    }

    /// Creates a catalog ingredient via the admin API, returning its id.
    pub async fn create_ingredient(&self, name: &str, unit: &str) -> String {
        let resp: Value = self
            .client
            .post(self.url("/api/v1/admin/ingredients"))
            .bearer_auth(&self.admin_token)
            .json(&json!({"name": name, "measurement_unit": unit}))
            .send()
            .await
            .expect("create ingredient")
            .json()
            .await
            .expect("parse ingredient response");
        resp["data"]["id"].as_str().expect("ingredient id").to_string()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(mut process) = self.server_process.take() {
            let _ = process.kill();
            let _ = process.wait();
        }
    }
}
