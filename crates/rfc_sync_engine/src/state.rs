//! Sync engine state machine.

use crate::artifacts::ArtifactStore;
use crate::breaker::{BlockStatus, DirectBlock};
use crate::cache::CacheTracker;
use crate::config::SyncConfig;
use crate::context::SyncContext;
use crate::error::{SyncError, SyncResult};
use crate::properties::{server_url_from, DeviceProperties};
use crate::reconciler::{ReconcileReport, Reconciler};
use crate::telemetry::{markers, Telemetry};
use crate::transport::{FetchRequest, TransportClient};
use parking_lot::RwLock;
use rfc_store::ConfigStore;
use rfc_sync_protocol::{
    base_host, keys, DeviceIdentity, Manifest, OverrideMap, UrlBuilder, UrlFields, SETTINGS_PATH,
    UNKNOWN,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const DEFAULT_EXPERIENCE: &str = "X1";

/// Where a cycle stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    /// No session has been started.
    #[default]
    Invalid,
    /// Production cycle; the first response decides what comes next.
    Init,
    /// Cycle against a local override; reconciles after one parse.
    Local,
    /// The remote selector asked for one more request.
    Redo,
    /// Identity was corrected; the request is repeated with the new values.
    RedoWithValidData,
    /// The current response is reconciled.
    Finish,
}

impl SyncState {
    /// Returns true if a 200 response in this state is reconciled.
    pub fn reconciles(&self) -> bool {
        matches!(self, SyncState::Local | SyncState::Finish)
    }
}

/// Selector lane recorded after a completed pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    /// Local override or non-production build.
    Local,
    /// Production service.
    Prod,
}

impl Lane {
    /// Persisted name of the lane.
    pub fn as_str(self) -> &'static str {
        match self {
            Lane::Local => "local",
            Lane::Prod => "prod",
        }
    }
}

/// Everything that changes during one cycle.
#[derive(Debug, Clone)]
pub struct SyncSession {
    /// Current state.
    pub state: SyncState,
    /// Selector lane fixed at session start.
    pub lane: Lane,
    /// Identity sent in the query.
    pub context: SyncContext,
    /// Working manifest URL without query.
    pub server_url: String,
    /// Bootstrap base URL, if one is configured.
    pub bootstrap_url: Option<String>,
    /// The server URL came from the local override file.
    pub local_override: bool,
    /// Firmware version of the last applied manifest.
    pub last_firmware: Option<String>,
    /// No manifest has been seen for the running firmware yet.
    pub is_first_request: bool,
    /// Slot chosen by the remote selector.
    pub selector_slot: Option<u8>,
    /// The remote selector replaced the server URL.
    pub selector_url_override: bool,
    /// Hash sent with the last conditional request.
    pub backup_hash: Option<String>,
    /// Applied changes need a reboot.
    pub reboot_required: bool,
    /// Device switches read at session start.
    pub device: DeviceProperties,
}

impl SyncSession {
    /// Creates a production session against `server_url`.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            state: SyncState::Init,
            lane: Lane::Prod,
            context: SyncContext::new(),
            server_url: server_url.into(),
            bootstrap_url: None,
            local_override: false,
            last_firmware: None,
            is_first_request: false,
            selector_slot: None,
            selector_url_override: false,
            backup_hash: None,
            reboot_required: false,
            device: DeviceProperties::default(),
        }
    }
}

/// How a successful cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStatus {
    /// A manifest was reconciled.
    Applied,
    /// The server reported no change since the cached token.
    NoUpdate,
    /// The server has no features for this device.
    NoFeatures,
}

/// Result of a successful cycle.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    /// How the cycle ended.
    pub status: CycleStatus,
    /// Fetches made, probes excluded.
    pub attempts: u32,
    /// Applied changes need a reboot.
    pub reboot_required: bool,
    /// Enabled-feature list, if one is known.
    pub features: Option<String>,
    /// Reconciliation details for an applied manifest.
    pub report: ReconcileReport,
}

/// Statistics about sync cycles run by one engine.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Cycles that ended successfully.
    pub cycles_completed: u64,
    /// Manifest fetches issued.
    pub fetches: u64,
    /// Fetches after the first of a cycle.
    pub retries: u64,
    /// Last successful cycle.
    pub last_sync_time: Option<Instant>,
    /// Last failure message.
    pub last_error: Option<String>,
}

/// The sync engine runs feature-control cycles for one device.
pub struct SyncEngine<T: TransportClient, S: ConfigStore, M: Telemetry> {
    config: SyncConfig,
    identity: DeviceIdentity,
    transport: T,
    store: Arc<S>,
    telemetry: M,
    experience: String,
    stats: RwLock<SyncStats>,
}

impl<T: TransportClient, S: ConfigStore, M: Telemetry> SyncEngine<T, S, M> {
    /// Creates a new sync engine.
    pub fn new(
        config: SyncConfig,
        identity: DeviceIdentity,
        transport: T,
        store: Arc<S>,
        telemetry: M,
    ) -> Self {
        Self {
            config,
            identity,
            transport,
            store,
            telemetry,
            experience: DEFAULT_EXPERIENCE.to_string(),
            stats: RwLock::new(SyncStats::default()),
        }
    }

    /// Sets the experience sent in the query. Empty means the default.
    #[must_use]
    pub fn with_experience(mut self, experience: impl Into<String>) -> Self {
        let experience = experience.into();
        if !experience.is_empty() {
            self.experience = experience;
        }
        self
    }

    /// Engine configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Device identity.
    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Config store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Telemetry sink.
    pub fn telemetry(&self) -> &M {
        &self.telemetry
    }

    /// Artifact directory.
    pub fn artifacts(&self) -> ArtifactStore {
        ArtifactStore::new(&self.config.artifact_dir)
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Runs one cycle: start a session, then fetch and reconcile.
    pub fn sync(&self) -> SyncResult<CycleOutcome> {
        let mut session = self.begin_session()?;
        self.run_cycle(&mut session)
    }

    /// Builds the session for a new cycle from the store, property files and artifacts.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::MissingServerUrl`] if neither a properties file
    /// nor the bootstrap configuration names a server.
    pub fn begin_session(&self) -> SyncResult<SyncSession> {
        let device = DeviceProperties::load(&self.config.device_properties).unwrap_or_else(|e| {
            warn!(error = %e, "device properties unreadable, using defaults");
            DeviceProperties::default()
        });

        let debug_services = self.read(keys::DEBUG_SERVICES).as_deref() == Some("true");
        let bootstrap_url = self.read_bootstrap_url();
        let non_prod = !self.identity.build_class.is_prod() || debug_services;
        let local_override = non_prod && self.config.rfc_properties_override.exists();

        let properties = if local_override {
            &self.config.rfc_properties_override
        } else {
            &self.config.rfc_properties
        };
        let server_url = match (server_url_from(properties), bootstrap_url.as_deref()) {
            (Some(url), _) => url,
            (None, Some(bootstrap)) => {
                warn!(path = %properties.display(), "no server URL configured, using bootstrap");
                format!("{bootstrap}{SETTINGS_PATH}")
            }
            (None, None) => return Err(SyncError::MissingServerUrl),
        };

        let (state, lane) = if non_prod {
            (SyncState::Local, Lane::Local)
        } else {
            (SyncState::Init, Lane::Prod)
        };

        let firmware = self.identity.firmware_version.as_str();
        let last_firmware = self.artifacts().last_firmware().filter(|v| !v.is_empty());
        let same_firmware = last_firmware.as_deref() == Some(firmware);

        let account_id = self
            .read(keys::ACCOUNT_ID)
            .filter(|_| same_firmware)
            .unwrap_or_else(|| UNKNOWN.to_string());
        let partner = if device.whoami_support {
            self.read(keys::PARTNER_NAME)
        } else {
            Some(self.identity.partner_id.clone()).filter(|p| !p.is_empty())
        };
        let partner_id = partner.unwrap_or_else(|| UNKNOWN.to_string());
        let os_class = if device.whoami_support {
            self.read(keys::OS_CLASS).unwrap_or_default()
        } else {
            String::new()
        };

        let is_first_request = last_firmware.is_none() || (!firmware.is_empty() && !same_firmware);

        let context = SyncContext {
            account_id,
            partner_id,
            experience: self.experience.clone(),
            os_class,
            ..SyncContext::new()
        };

        info!(
            state = ?state,
            lane = lane.as_str(),
            server_url = %server_url,
            bootstrap = bootstrap_url.as_deref().unwrap_or(""),
            first_request = is_first_request,
            "sync session started"
        );

        Ok(SyncSession {
            state,
            lane,
            context,
            server_url,
            bootstrap_url,
            local_override,
            last_firmware,
            is_first_request,
            device,
            ..SyncSession::new(String::new())
        })
    }

    /// Runs the fetch loop for `session`.
    ///
    /// # Errors
    ///
    /// - [`SyncError::DirectBlocked`] if the direct-block marker is fresh; no fetch is made
    /// - [`SyncError::Manifest`] if a 200 body could not be reconciled
    /// - [`SyncError::RetriesExhausted`] if no attempt produced a terminal response
    pub fn run_cycle(&self, session: &mut SyncSession) -> SyncResult<CycleOutcome> {
        let block = DirectBlock::new(
            &self.config.direct_block_marker,
            self.config.direct_block_window,
        );
        match block.check() {
            Ok(BlockStatus::Blocked { remaining }) => {
                warn!(remaining_secs = remaining.as_secs(), "direct path blocked, skipping cycle");
                let err = SyncError::DirectBlocked { remaining };
                self.stats.write().last_error = Some(err.to_string());
                return Err(err);
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "direct-block marker unreadable, proceeding"),
        }

        let result = self.fetch_loop(session);
        let mut stats = self.stats.write();
        match &result {
            Ok(_) => {
                stats.cycles_completed += 1;
                stats.last_sync_time = Some(Instant::now());
                stats.last_error = None;
            }
            Err(e) => stats.last_error = Some(e.to_string()),
        }
        drop(stats);

        if matches!(result, Err(SyncError::RetriesExhausted { .. }))
            && self.config.block_on_exhaustion
        {
            if let Err(e) = block.arm() {
                warn!(error = %e, "failed to arm direct-block marker");
            }
        }
        result
    }

    fn fetch_loop(&self, session: &mut SyncSession) -> SyncResult<CycleOutcome> {
        let artifacts = self.artifacts();
        let tracker = CacheTracker::new(self.store.as_ref(), &self.config.sync_done_marker);
        let retry = &self.config.retry;
        let mut last_failure = String::from("no attempt made");

        for attempt in 0..retry.max_attempts {
            sleep(retry.delay_for_attempt(attempt));
            {
                let mut stats = self.stats.write();
                stats.fetches += 1;
                if attempt > 0 {
                    stats.retries += 1;
                }
            }

            self.resolve_server_url(session);
            let fields = self.url_fields(session);
            let url = self.url_builder().build(&session.server_url, &fields);
            let token = tracker.request_token(session, &self.identity.firmware_version);
            let request = FetchRequest::new(url).with_headers(token.headers());
            debug!(attempt = attempt + 1, url = %request.url, "requesting manifest");

            let response = match self.transport.fetch(&request) {
                Ok(response) => response,
                Err(e) => {
                    if e.code.is_reported() {
                        self.telemetry
                            .transport_error(e.code.0, base_host(&session.server_url));
                    }
                    warn!(attempt = attempt + 1, error = %e, "manifest request failed");
                    last_failure = e.to_string();
                    continue;
                }
            };

            match response.status {
                200 => {
                    self.clean_artifacts(&artifacts);
                    self.pre_process(session, &response.body);
                    match session.state {
                        SyncState::Redo => {
                            info!(server_url = %session.server_url, "selector requires another request");
                            last_failure = "selector redo not completed".into();
                        }
                        SyncState::RedoWithValidData => {
                            info!(
                                account_id = %session.context.account_id,
                                partner_id = %session.context.partner_id,
                                "repeating request with corrected identity"
                            );
                            session.state = SyncState::Init;
                            last_failure = "identity redo not completed".into();
                        }
                        _ => {
                            return self.finish(
                                session,
                                &artifacts,
                                &tracker,
                                &request,
                                &response.headers,
                                &response.body,
                                attempt + 1,
                            );
                        }
                    }
                }
                304 => {
                    let features = artifacts.feature_list_head();
                    info!(
                        features = features.as_deref().unwrap_or(""),
                        "no feature update required"
                    );
                    if let Some(list) = &features {
                        self.telemetry.value(markers::ACTIVE_FEATURES, list);
                    }
                    return Ok(CycleOutcome {
                        status: CycleStatus::NoUpdate,
                        attempts: attempt + 1,
                        reboot_required: session.reboot_required,
                        features,
                        report: ReconcileReport::default(),
                    });
                }
                404 => {
                    if let Err(e) = artifacts.purge_features() {
                        warn!(error = %e, "failed to purge feature artifacts");
                    }
                    if let Err(e) = artifacts.remove_feature_list() {
                        warn!(error = %e, "failed to remove feature list");
                    }
                    info!("no features enabled for this device");
                    self.telemetry.count(markers::FEATURES_NONE);
                    return Ok(CycleOutcome {
                        status: CycleStatus::NoFeatures,
                        attempts: attempt + 1,
                        reboot_required: session.reboot_required,
                        features: None,
                        report: ReconcileReport::default(),
                    });
                }
                status => {
                    warn!(attempt = attempt + 1, status, "manifest request failed");
                    last_failure = SyncError::HttpStatus(status).to_string();
                }
            }
        }

        warn!(attempts = retry.max_attempts, last = %last_failure, "sync cycle failed");
        Err(SyncError::RetriesExhausted {
            attempts: retry.max_attempts,
            last: last_failure,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        session: &mut SyncSession,
        artifacts: &ArtifactStore,
        tracker: &CacheTracker<'_, S>,
        request: &FetchRequest,
        response_headers: &[(String, String)],
        body: &[u8],
        attempts: u32,
    ) -> SyncResult<CycleOutcome> {
        let processed = self.process_manifest(session, artifacts, &request.headers, body);
        let bookkeeping = match &processed {
            Ok(_) => tracker.record_success(response_headers, session),
            Err(e) => {
                warn!(error = %e, "manifest processing failed, clearing cache token");
                tracker.record_failure()
            }
        };
        if let Err(e) = bookkeeping {
            warn!(error = %e, "failed to persist cache token");
        }

        info!("completed feature-control pass");
        self.telemetry.count(markers::COMPLETE);
        for (key, value) in [
            (keys::XCONF_SELECTOR, session.lane.as_str()),
            (keys::XCONF_URL, session.server_url.as_str()),
        ] {
            if let Err(e) = self.store.set(keys::OWNER_RFC, key, value) {
                warn!(key, error = %e, "failed to persist selector");
            }
        }

        let (features, report) = processed?;
        Ok(CycleOutcome {
            status: CycleStatus::Applied,
            attempts,
            reboot_required: session.reboot_required,
            features,
            report,
        })
    }

    /// Decides the next state from a 200 body.
    fn pre_process(&self, session: &mut SyncSession, body: &[u8]) {
        if session.state == SyncState::Init || session.is_first_request {
            let overrides = match Manifest::parse(body) {
                Ok(manifest) => manifest.overrides(),
                Err(e) => {
                    warn!(error = %e, "manifest unreadable, skipping pre-processing");
                    return;
                }
            };

            if session.is_first_request {
                let account = session
                    .context
                    .correct_account(overrides.get(keys::ACCOUNT_ID));
                let partner = session
                    .context
                    .correct_partner(overrides.get(keys::PARTNER_ID));
                session.is_first_request = false;

                if account.wants_retry() || partner.wants_retry() {
                    if session.device.whoami_support {
                        info!("identity service in use, not repeating request");
                    } else {
                        session.state = SyncState::RedoWithValidData;
                    }
                }
            }

            if session.state == SyncState::Init {
                if session.lane == Lane::Local {
                    session.state = SyncState::Finish;
                } else {
                    self.select(session, &overrides);
                }
            }
        } else if session.state == SyncState::Redo {
            session.state = SyncState::Finish;
        }
    }

    /// Applies the remote selector from the override map.
    fn select(&self, session: &mut SyncSession, overrides: &OverrideMap) {
        if let Some(url) = overrides.get(keys::XCONF_URL).filter(|u| !u.is_empty()) {
            info!(url, "remote selector configured a new server URL");
            session.server_url = url.to_string();
            session.selector_url_override = true;
        }

        let (slot, state) = match overrides.get(keys::XCONF_SELECTOR).filter(|s| !s.is_empty()) {
            Some("ci") => (Some(16), SyncState::Redo),
            Some("automation") => (Some(19), SyncState::Redo),
            Some(_) => (Some(8), SyncState::Finish),
            None => (None, SyncState::Finish),
        };
        session.selector_slot = slot;
        session.state = state;
        debug!(slot = ?slot, state = ?state, url = %session.server_url, "selector applied");
    }

    fn process_manifest(
        &self,
        session: &mut SyncSession,
        artifacts: &ArtifactStore,
        request_headers: &[(String, String)],
        body: &[u8],
    ) -> SyncResult<(Option<String>, ReconcileReport)> {
        let manifest = Manifest::parse(body)?;

        let mut list = String::new();
        for (index, feature) in manifest.features().enumerate() {
            let feature = match feature {
                Ok(feature) => feature,
                Err(e) => {
                    warn!(index, error = %e, "skipping malformed feature");
                    continue;
                }
            };
            match feature.list_entry() {
                Some(entry) => {
                    list.push_str(&entry);
                    if let Err(e) = artifacts.append_feature_file(&feature) {
                        warn!(feature = %feature.name, error = %e, "failed to write feature file");
                    }
                }
                None => debug!(feature = %feature.name, "feature instance not configured"),
            }
            if let Err(e) = artifacts.append_variables(&feature) {
                warn!(feature = %feature.name, error = %e, "failed to write feature variables");
            }
        }

        let fields = self.url_fields(session);
        let mut probe = |candidate: &str| self.probe_bootstrap(candidate, &fields, request_headers);
        let report = Reconciler::new(self.store.as_ref(), &self.telemetry, artifacts)
            .with_maintenance(session.device.maintenance_enabled)
            .apply(&manifest.overrides(), &mut probe);
        if report.reboot_required {
            session.reboot_required = true;
        }

        if let Err(e) = artifacts.write_feature_list(&list) {
            warn!(error = %e, "failed to write feature list");
        }
        let features = artifacts.feature_list_head();
        match &features {
            Some(head) => {
                info!(features = %head, "features staged");
                self.telemetry.value(markers::STAGED_FEATURES, head);
            }
            None => info!("no feature instances staged"),
        }
        if let Err(e) = artifacts.write_version(&self.identity.firmware_version) {
            warn!(error = %e, "failed to record firmware version");
        }

        Ok((features, report))
    }

    /// Issues throwaway fetches against a candidate bootstrap URL.
    fn probe_bootstrap(
        &self,
        candidate: &str,
        fields: &UrlFields,
        headers: &[(String, String)],
    ) -> bool {
        let url = self
            .url_builder()
            .build(&format!("{candidate}{SETTINGS_PATH}"), fields);
        let request = FetchRequest::new(url).with_headers(headers.to_vec());

        for attempt in 0..self.config.probe_attempts {
            if attempt > 0 {
                sleep(self.config.retry.delay);
            }
            match self.transport.fetch(&request) {
                Ok(r) if r.status == 200 || r.status == 304 => {
                    info!(candidate, "bootstrap URL validated");
                    return true;
                }
                Ok(r) => warn!(candidate, status = r.status, "bootstrap URL validation failed"),
                Err(e) => warn!(candidate, error = %e, "bootstrap URL validation failed"),
            }
        }
        false
    }

    fn resolve_server_url(&self, session: &mut SyncSession) {
        if session.local_override {
            info!(url = %session.server_url, "using local override URL");
            self.telemetry
                .value(markers::XCONF_LOCAL_URL, &session.server_url);
        } else if let Some(bootstrap) = session.bootstrap_url.as_deref() {
            if !session.selector_url_override {
                session.server_url = format!("{bootstrap}{SETTINGS_PATH}");
                info!(url = %session.server_url, "using bootstrap URL");
                self.telemetry
                    .value(markers::XCONF_BS_URL, &session.server_url);
            }
        }
    }

    fn url_fields(&self, session: &SyncSession) -> UrlFields {
        UrlFields {
            mac: self.identity.mac.clone(),
            firmware_version: self.identity.firmware_version.clone(),
            env: self.identity.build_class.as_str().to_string(),
            model: self.identity.model.clone(),
            manufacturer: self.identity.manufacturer.clone(),
            partner_id: session.context.partner_id.clone(),
            os_class: session.context.os_class.clone(),
            account_id: session.context.account_id.clone(),
            experience: session.context.experience.clone(),
        }
    }

    fn url_builder(&self) -> UrlBuilder {
        UrlBuilder::new().with_encoding(self.config.encode_url)
    }

    fn clean_artifacts(&self, artifacts: &ArtifactStore) {
        if let Err(e) = artifacts.purge_features() {
            warn!(error = %e, "failed to purge feature artifacts");
        }
        if let Err(e) = artifacts.remove_tr181_list() {
            warn!(error = %e, "failed to remove tr181 list");
        }
    }

    /// Reads the bootstrap URL, retrying while the store warms up.
    fn read_bootstrap_url(&self) -> Option<String> {
        let attempts = self.config.bootstrap_read_attempts.max(1);
        for attempt in 0..attempts {
            match self.store.get_value(keys::BOOTSTRAP_XCONF_URL) {
                Ok(Some(url)) => {
                    debug!(url = %url, attempt = attempt + 1, "bootstrap URL read");
                    return Some(url).filter(|u| !u.is_empty());
                }
                Ok(None) => debug!(attempt = attempt + 1, "bootstrap URL not present"),
                Err(e) => debug!(attempt = attempt + 1, error = %e, "bootstrap URL read failed"),
            }
            if attempt + 1 < attempts {
                sleep(self.config.bootstrap_read_delay);
            }
        }
        info!("no bootstrap URL configured");
        None
    }

    fn read(&self, name: &str) -> Option<String> {
        match self.store.get_value(name) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                debug!(name, error = %e, "parameter unreadable");
                None
            }
        }
    }
}

fn sleep(delay: Duration) {
    if !delay.is_zero() {
        std::thread::sleep(delay);
    }
}
