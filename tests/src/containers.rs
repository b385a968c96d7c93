//! Testcontainer setup for Postgres.

use std::time::Duration;
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};

const DB_NAME: &str = "events";
const DB_USER: &str = "events";
const DB_PASSWORD: &str = "events";

/// Container handle for Postgres.
pub struct TestContainers {
    #[allow(dead_code)]
    postgres: Option<ContainerAsync<GenericImage>>,
    pub database_url: String,
}

impl TestContainers {
    /// Start a Postgres container, unless an external database is given.
    pub async fn start() -> Self {
        if let Some(url) = std::env::var("ANALYTICS_TEST_DATABASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
        {
            return Self {
                postgres: None,
                database_url: url,
            };
        }

        let (postgres, database_url) = start_postgres().await;

        Self {
            postgres: Some(postgres),
            database_url,
        }
    }
}

/// Start a Postgres container, return container and connection URL.
pub async fn start_postgres() -> (ContainerAsync<GenericImage>, String) {
    let image = GenericImage::new("postgres", "16-alpine")
        .with_wait_for(WaitFor::message_on_stderr(
            "database system is ready to accept connections",
        ))
        .with_exposed_port(5432.tcp())
        .with_env_var("POSTGRES_DB", DB_NAME)
        .with_env_var("POSTGRES_USER", DB_USER)
        .with_env_var("POSTGRES_PASSWORD", DB_PASSWORD);

    let container = image.start().await.expect("Failed to start Postgres");

    let port = container.get_host_port_ipv4(5432).await.unwrap();
    let url = format!(
        "postgres://{}:{}@127.0.0.1:{}/{}",
        DB_USER, DB_PASSWORD, port, DB_NAME
    );

    // The readiness message can fire during the initdb restart; verify with
    // a real connection before handing the URL to tests.
    wait_for_connect(&url, Duration::from_secs(30)).await;

    (container, url)
}

/// Wait until the database accepts connections.
async fn wait_for_connect(url: &str, timeout: Duration) {
    let start = std::time::Instant::now();

    while start.elapsed() < timeout {
        if let Ok(pool) = sqlx::postgres::PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(2))
            .connect(url)
            .await
        {
            if sqlx::query_scalar::<_, i32>("SELECT 1")
                .fetch_one(&pool)
                .await
                .is_ok()
            {
                pool.close().await;
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    panic!("Postgres {} not ready after {:?}", url, timeout);
}
