use std::sync::Arc;
use std::time::Duration;

use livewire::prelude::*;

const DEMO_EMAIL: &str = "demo@example.com";
const DEMO_PASSWORD: &str = "demo-password";

// ---------------------------------------------------------------------------
// Fake analysis job
// ---------------------------------------------------------------------------

/// Pretends to import a dataset in `steps` chunks, then reports a cluster.
async fn import_job(
    sessions: Arc<SessionRegistry>,
    sid: SessionId,
    steps: u64,
    pace: Duration,
) -> Result<(), LivewireError> {
    let source = "dataset-7";
    let _ = sessions.progress_start(sid, source, "import").await?;

    for step in 1..steps {
        tokio::time::sleep(pace).await;
        if sessions.progress_at(sid, source, "import", step, steps).await? == Delivery::Dropped {
            tracing::debug!(%sid, step, "no client attached");
        }
    }

    let cluster = Aggregate {
        id: 1,
        pid: 7,
        size: steps as i64,
        mean: 21.5,
        valid: true,
        ..Aggregate::default()
    };
    let _ = sessions.send_cluster(sid, source, cluster).await?;
    let _ = sessions.progress_complete(sid, source, "import").await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

fn load_config() -> ServerConfig {
    match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(error = %e, "falling back to development config");
            ServerConfig::development()
        }
    }
}

/// Registers the demo account and opens a session for it.
async fn demo_session(
    accounts: &AccountService<MemoryUserStore, RecordingMailer>,
) -> Result<Session, LivewireError> {
    accounts
        .register(Registration {
            name: "Demo".into(),
            email: DEMO_EMAIL.into(),
            password: DEMO_PASSWORD.into(),
            password_confirm: DEMO_PASSWORD.into(),
        })
        .await?;
    accounts.login(DEMO_EMAIL, DEMO_PASSWORD).await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    livewire::telemetry::init_tracing();

    let server = LivewireServer::<MemoryUserStore, RecordingMailer>::builder()
        .config(load_config())
        .build(MemoryUserStore::new(), RecordingMailer::new())
        .await?;
    let addr = server.local_addr()?;
    let accounts = server.accounts();

    let session = demo_session(&accounts).await?;
    tracing::info!(
        url = %format!("ws://{addr}/live?sid={}&access_token={}", session.id, session.tokens.access),
        "demo session ready"
    );

    let sessions = Arc::clone(accounts.sessions());
    let sid = session.id;
    tokio::spawn(async move {
        loop {
            if let Err(e) = import_job(Arc::clone(&sessions), sid, 10, Duration::from_secs(1)).await {
                tracing::warn!(error = %e, "import job stopped");
                break;
            }
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
    });

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
    }
    Ok(())
}
