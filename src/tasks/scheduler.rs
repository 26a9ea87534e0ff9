use anyhow::Result;
use tokio::sync::watch;
use tokio::time::{interval, sleep, Duration};

use crate::core::state::AppState;
use crate::services::media_tools::MediaToolService;
use crate::tasks::{maintenance, pipeline};

const TRANSCODE_WORKER_CONCURRENCY: usize = 3;
const ASSEMBLY_WORKER_CONCURRENCY: usize = 1;

pub(crate) async fn run(state: AppState) -> Result<()> {
    let media = MediaToolService::from_settings(state.settings());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut handles =
        Vec::with_capacity(TRANSCODE_WORKER_CONCURRENCY + ASSEMBLY_WORKER_CONCURRENCY + 3);

    for _ in 0..ASSEMBLY_WORKER_CONCURRENCY {
        handles.push(tokio::spawn(assembly_worker(
            state.clone(),
            media.clone(),
            shutdown_rx.clone(),
        )));
    }
    for _ in 0..TRANSCODE_WORKER_CONCURRENCY {
        handles.push(tokio::spawn(transcode_worker(
            state.clone(),
            media.clone(),
            shutdown_rx.clone(),
        )));
    }

    handles.push(tokio::spawn(attempt_expiry_loop(state.clone(), shutdown_rx.clone())));
    handles.push(tokio::spawn(upload_expiry_loop(state.clone(), shutdown_rx.clone())));
    handles.push(tokio::spawn(recovery_loop(state.clone(), media.clone(), shutdown_rx.clone())));

    crate::core::shutdown::shutdown_signal().await;
    if shutdown_tx.send(true).is_err() {
        tracing::warn!("Failed to broadcast shutdown signal to background tasks");
    }

    for handle in handles {
        if let Err(err) = handle.await {
            tracing::error!(error = %err, "Background task join failed");
        }
    }

    Ok(())
}

async fn assembly_worker(
    state: AppState,
    media: MediaToolService,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        match pipeline::assembly::claim_next_session(&state).await {
            Ok(Some(session_id)) => {
                if let Err(err) =
                    pipeline::assembly::process_session(&state, &media, &session_id).await
                {
                    tracing::error!(
                        session_id = %session_id,
                        error = %err,
                        "Failed to assemble upload session"
                    );
                    pipeline::assembly::mark_session_failed(&state, &session_id, &err.to_string())
                        .await;
                }
                continue;
            }
            Ok(None) => {}
            Err(err) => tracing::error!(error = %err, "Failed to claim upload session"),
        }

        tokio::select! {
            _ = shutdown.changed() => break,
            _ = sleep(Duration::from_secs(3)) => {}
        }
    }
}

async fn transcode_worker(
    state: AppState,
    media: MediaToolService,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        match pipeline::transcode::claim_next_quality(&state).await {
            Ok(Some(claimed)) => {
                let quality_id = claimed.id.clone();
                let video_id = claimed.video_id.clone();
                if let Err(err) =
                    pipeline::transcode::process_quality(&state, &media, claimed).await
                {
                    tracing::error!(
                        quality_id = %quality_id,
                        video_id = %video_id,
                        error = %err,
                        "Transcode unit processing failed"
                    );
                }
                continue;
            }
            Ok(None) => {}
            Err(err) => tracing::error!(error = %err, "Failed to claim transcode unit"),
        }

        tokio::select! {
            _ = shutdown.changed() => break,
            _ = sleep(Duration::from_secs(2)) => {}
        }
    }
}

async fn attempt_expiry_loop(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let mut tick = interval(Duration::from_secs(60));
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                if let Err(err) = maintenance::close_expired_attempts(&state).await {
                    tracing::error!(error = %err, "close_expired_attempts failed");
                }
            }
        }
    }
}

async fn upload_expiry_loop(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let mut tick = interval(Duration::from_secs(300));
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                if let Err(err) = maintenance::expire_upload_sessions(&state).await {
                    tracing::error!(error = %err, "expire_upload_sessions failed");
                }
            }
        }
    }
}

async fn recovery_loop(
    state: AppState,
    media: MediaToolService,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut tick = interval(Duration::from_secs(900));
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                if let Err(err) = maintenance::recover_stale_transcodes(&state).await {
                    tracing::error!(error = %err, "recover_stale_transcodes failed");
                }
                if let Err(err) = maintenance::resume_stalled_videos(&state, &media).await {
                    tracing::error!(error = %err, "resume_stalled_videos failed");
                }
            }
        }
    }
}
