use crate::infra::{InMemoryAlertPublisher, InMemoryQualityStore, LocalCollaborators};
use clap::Args;
use pod_quality::config::{AppConfig, WorkflowSettings};
use pod_quality::error::AppError;
use pod_quality::workflows::privacy::{FaceRedactor, RedactionOutcome, RedactionServiceError};
use pod_quality::workflows::quality::{DeliveryQualityService, QualityRecord, ReviewAlert};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct AssessArgs {
    /// Delivery event JSON (object-storage event shape)
    #[arg(long)]
    pub(crate) event: PathBuf,
    /// Directory holding the delivery photos (defaults to LOCAL_ASSET_ROOT)
    #[arg(long)]
    pub(crate) asset_root: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct RedactArgs {
    /// Image to redact
    #[arg(long)]
    pub(crate) input: PathBuf,
    /// Where to write the blurred JPEG
    #[arg(long)]
    pub(crate) output: PathBuf,
    /// Haar cascade XML (defaults to FACE_CASCADE_PATH)
    #[arg(long)]
    pub(crate) cascade: Option<PathBuf>,
}

pub(crate) async fn run_assess(args: AssessArgs) -> Result<(), AppError> {
    blocking(move || {
        let config = AppConfig::load()?;
        let (record, alerts) = assess(config.workflow, &args)?;

        let rendered = serde_json::to_string_pretty(&record).map_err(std::io::Error::from)?;
        println!("{rendered}");
        for alert in alerts {
            eprintln!(
                "review alert raised for {} (quality index {:.3}): {}",
                alert.object_name,
                alert.quality_index,
                alert.issues.join("; ")
            );
        }
        Ok(())
    })
    .await
}

pub(crate) async fn run_redact(args: RedactArgs) -> Result<(), AppError> {
    blocking(move || {
        let config = AppConfig::load()?;
        let outcome = redact(&config.workflow, &args)?;

        println!(
            "{} face(s) blurred; wrote {}",
            outcome.face_count(),
            args.output.display()
        );
        for face in &outcome.faces {
            println!(
                "  face at ({}, {}) {}x{}",
                face.x, face.y, face.width, face.height
            );
        }
        Ok(())
    })
    .await
}

/// The HTTP reasoner's blocking client cannot live on the async executor.
async fn blocking<F>(task: F) -> Result<(), AppError>
where
    F: FnOnce() -> Result<(), AppError> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| AppError::Io(std::io::Error::other(err)))?
}

pub(crate) fn assess(
    mut settings: WorkflowSettings,
    args: &AssessArgs,
) -> Result<(QualityRecord, Vec<ReviewAlert>), AppError> {
    if let Some(root) = &args.asset_root {
        settings.storage.local_asset_root = root.clone();
    }
    let payload = fs::read(&args.event)?;

    let store = Arc::new(InMemoryQualityStore::new(
        settings.persistence.quality_table.clone(),
    ));
    let alerts = Arc::new(InMemoryAlertPublisher::new(
        settings.persistence.notification_topic_id.clone(),
    ));
    let service = DeliveryQualityService::new(
        Arc::new(LocalCollaborators::from_settings(&settings)?),
        settings.aggregator.clone(),
        store.clone(),
        alerts.clone(),
    );

    let record = service.handle_event(&payload)?;
    for stored in store.records() {
        tracing::debug!(
            table = %stored.table,
            stored_at = %stored.stored_at.to_rfc3339(),
            "record persisted"
        );
    }
    Ok((record, alerts.events()))
}

pub(crate) fn redact(
    settings: &WorkflowSettings,
    args: &RedactArgs,
) -> Result<RedactionOutcome, AppError> {
    let cascade = args
        .cascade
        .clone()
        .unwrap_or_else(|| settings.face_cascade_path.clone());
    let redactor = FaceRedactor::for_policy(cascade, settings.privacy.clone())?;

    let bytes = fs::read(&args.input)?;
    let outcome = redactor
        .redact(&bytes)
        .map_err(RedactionServiceError::from)?;

    if let Some(parent) = args.output.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(&args.output, &outcome.bytes)?;
    Ok(outcome)
}
