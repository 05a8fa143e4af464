//! Sync command implementation.

use crate::client::ReqwestClient;
use crate::commands::open_store;
use crate::credentials::FileCredentialProvider;
use crate::device::read_identity;
use crate::experience;
use crate::settings::Settings;
use crate::telemetry::Telemetry2Client;
use rfc_store::ConfigStore;
use rfc_sync_engine::{
    markers, CycleOutcome, CycleStatus, HttpTransport, NoCredentials, SyncConfig, SyncEngine,
    Telemetry, TransportClient,
};
use rfc_sync_protocol::DeviceIdentity;
use std::sync::Arc;
use tracing::info;

/// Runs one sync cycle.
pub fn run(settings: &Settings, no_mtls: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = settings.sync_config();
    let store = Arc::new(open_store(settings)?);
    let identity = read_identity(&settings.device, &config.device_properties);
    let telemetry = Telemetry2Client::new(&settings.telemetry.client, &settings.telemetry.daemon);
    let experience = experience::lookup(
        &settings.experience.endpoint,
        config.timeout,
        &settings.experience.fallback,
    );
    let client = ReqwestClient::new(config.timeout);

    let outcome = if no_mtls || !settings.credentials.enabled {
        info!("mutual TLS disabled");
        execute(
            config,
            identity,
            HttpTransport::new(client, NoCredentials),
            store,
            telemetry,
            experience,
        )?
    } else {
        let credentials = FileCredentialProvider::new(
            settings.credentials.certificates.clone(),
            settings.credentials.passphrase_command.clone(),
        );
        execute(
            config,
            identity,
            HttpTransport::new(client, credentials),
            store,
            telemetry,
            experience,
        )?
    };

    print_outcome(&outcome);
    Ok(())
}

fn execute<T, S, M>(
    config: SyncConfig,
    identity: DeviceIdentity,
    transport: T,
    store: Arc<S>,
    telemetry: M,
    experience: String,
) -> Result<CycleOutcome, Box<dyn std::error::Error>>
where
    T: TransportClient,
    S: ConfigStore,
    M: Telemetry,
{
    let engine = SyncEngine::new(config, identity, transport, store, telemetry)
        .with_experience(experience);
    let outcome = engine.sync()?;
    if outcome.reboot_required {
        info!("feature changes take effect after reboot");
        engine.telemetry().count(markers::REBOOT_REQUIRED);
    }
    Ok(outcome)
}

fn print_outcome(outcome: &CycleOutcome) {
    match outcome.status {
        CycleStatus::Applied => {
            println!("Manifest applied after {} attempt(s)", outcome.attempts);
            let report = &outcome.report;
            let reapplied = report.applied.len().saturating_sub(report.changed.len());
            println!("  Updated:   {}", report.changed.len());
            println!("  Reapplied: {reapplied}");
            println!("  Skipped:   {}", report.skipped.len());
            println!("  Failed:    {}", report.failed.len());
            for key in &report.failed {
                println!("    {key}");
            }
        }
        CycleStatus::NoUpdate => println!("No feature update required"),
        CycleStatus::NoFeatures => println!("No features enabled for this device"),
    }
    if let Some(features) = &outcome.features {
        println!("Features: {features}");
    }
    if outcome.reboot_required {
        println!("Reboot required");
    }
}
