//! Certificate manager: the background issuance pipeline
//!
//! A single serialized worker drives every certificate request toward a
//! terminal state by talking to the certificate authority, the secret
//! vault, and the store. Each tick evaluates, in order: requests waiting to
//! be submitted, requests the CA is processing, and requests whose bundle
//! is ready to download. At most one tick executes at a time, so all
//! mutations of a request past `READY_TO_SUBMIT` are serialized here; the
//! registration API never touches a request beyond that state and this
//! loop never creates one.
//!
//! External failures (CA transport, email) are logged and retried on the
//! next tick. Store and vault contract violations propagate out of the
//! tick and shut the service down.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use uuid::Uuid;

use gds_models::{
    Certificate, CertificateRequest, CertificateRequestState, CertificateState, Vasp,
    VerificationState, AUTOMATED,
};
use gds_sectigo::types::{
    BATCH_STATUS_NOT_ACCEPTABLE, BATCH_STATUS_REJECTED, PARAM_COMMON_NAME, PARAM_PKCS12_PASSWORD,
};
use gds_sectigo::{BatchResponse, CertificateAuthority};

use crate::config::CertManConfig;
use crate::emails::EmailCourier;
use crate::pkcs12::parse_identity_certificate;
use crate::secrets::{SecretVault, SecretsError, CERT_SECRET, PASSWORD_SECRET};
use crate::storage::{DirectoryStore, StorageError};

const REASON_BAD_VASP_STATE: &str = "vasp not in valid state for submission";

/// Contract violations that shut the pipeline down; everything external is
/// logged and retried instead.
#[derive(Debug, thiserror::Error)]
pub enum CertManError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Secrets(#[from] SecretsError),
}

/// The background worker driving the certificate request state machine.
pub struct CertificateManager {
    store: Arc<dyn DirectoryStore>,
    vault: Arc<dyn SecretVault>,
    courier: Arc<EmailCourier>,
    ca: Arc<dyn CertificateAuthority>,
    conf: CertManConfig,
}

impl CertificateManager {
    pub fn new(
        store: Arc<dyn DirectoryStore>,
        vault: Arc<dyn SecretVault>,
        courier: Arc<EmailCourier>,
        ca: Arc<dyn CertificateAuthority>,
        conf: CertManConfig,
    ) -> Self {
        CertificateManager {
            store,
            vault,
            courier,
            ca,
            conf,
        }
    }

    /// Run the manager until the stop signal fires. The stop signal is
    /// honored at tick boundaries; a tick in flight completes first.
    pub async fn run(self, mut stop: watch::Receiver<bool>) -> Result<(), CertManError> {
        let mut ticker = tokio::time::interval(self.conf.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval = ?self.conf.interval, "certificate manager started");

        loop {
            tokio::select! {
                _ = stop.changed() => {
                    info!("certificate manager stopped");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    self.handle_certificate_requests().await?;
                }
            }
        }
    }

    /// One tick of the pipeline. Public so tests can drive the manager
    /// deterministically without the timer.
    pub async fn handle_certificate_requests(&self) -> Result<(), CertManError> {
        let requests = self
            .store
            .list_cert_reqs(&[
                CertificateRequestState::ReadyToSubmit,
                CertificateRequestState::Processing,
                CertificateRequestState::Downloading,
            ])
            .await?;

        for mut request in requests {
            match request.status {
                CertificateRequestState::ReadyToSubmit => {
                    self.submit_request(&mut request).await?
                }
                CertificateRequestState::Processing => self.check_request(&mut request).await?,
                CertificateRequestState::Downloading => {
                    self.download_request(&mut request).await?
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Retrieve the owning VASP and require it to still be eligible for
    /// issuance. The gate runs before any VASP mutation and on every tick
    /// of a live request: an administrator rejecting the VASP mid-issuance
    /// must abort the certificate, not let it complete silently. On
    /// violation the request moves to CR_REJECTED, the contacts are
    /// notified, the VASP itself is left untouched, and `None` is
    /// returned.
    async fn gate_vasp_state(
        &self,
        request: &mut CertificateRequest,
    ) -> Result<Option<Vasp>, CertManError> {
        let mut vasp = self.store.retrieve_vasp(&request.vasp).await?;

        if matches!(
            vasp.verification_status,
            VerificationState::Reviewed
                | VerificationState::IssuingCertificate
                | VerificationState::Verified
        ) {
            return Ok(Some(vasp));
        }

        warn!(
            request = %request.id,
            vasp = %vasp.id,
            status = %vasp.verification_status,
            "rejecting certificate request: vasp not in valid state"
        );
        request.update_status(
            CertificateRequestState::CrRejected,
            REASON_BAD_VASP_STATE,
            AUTOMATED,
        );
        self.store.update_cert_req(request).await?;

        if self
            .courier
            .send_rejection(&mut vasp, &request.id, REASON_BAD_VASP_STATE)
            .await
            > 0
        {
            self.store.update_vasp(&vasp).await?;
        }
        Ok(None)
    }

    /// Drive a READY_TO_SUBMIT request toward the CA.
    async fn submit_request(&self, request: &mut CertificateRequest) -> Result<(), CertManError> {
        let Some(mut vasp) = self.gate_vasp_state(request).await? else {
            return Ok(());
        };

        // The VASP now enters certificate issuance; administrative actions
        // are rejected until the request terminates.
        if vasp.verification_status == VerificationState::Reviewed {
            vasp.update_verification_status(
                VerificationState::IssuingCertificate,
                "certificate submission started",
                AUTOMATED,
            );
            self.store.update_vasp(&vasp).await?;
        }

        // The submission needs the PKCS#12 password created at
        // registration; without it the request waits.
        let password = match self.vault.latest_version(&request.id, PASSWORD_SECRET).await {
            Ok(password) => password,
            Err(SecretsError::NotFound { .. }) => {
                warn!(request = %request.id, "no pkcs12 password in vault, deferring submission");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };

        // Zero balance starves the pipeline silently; the request retries
        // every tick until the account is topped up.
        match self.ca.user_available_balance().await {
            Ok(balance) if balance > 0 => {}
            Ok(_) => {
                warn!(request = %request.id, "certificate authority balance exhausted, deferring submission");
                return Ok(());
            }
            Err(err) => {
                warn!(request = %request.id, error = %err, "could not check authority balance");
                return Ok(());
            }
        }

        // Assemble submission parameters; the password plaintext goes to
        // the CA only and is never persisted on the request.
        let mut params = request.params.clone();
        params
            .entry(PARAM_COMMON_NAME.to_owned())
            .or_insert_with(|| request.common_name.clone());
        params.insert(
            PARAM_PKCS12_PASSWORD.to_owned(),
            String::from_utf8_lossy(&password).into_owned(),
        );

        match self.ca.submit_batch(&request.profile, &params).await {
            Ok(batch) => {
                request.authority_id = batch.authority_id;
                request.batch_id = batch.batch_id;
                request.order_number = batch.order_number;
                request.creation_date = batch.creation_date;
                request.batch_name = batch.batch_name;
                request.batch_status = batch.status;
                request.update_status(
                    CertificateRequestState::Processing,
                    "certificate request submitted",
                    AUTOMATED,
                );
                self.store.update_cert_req(request).await?;
                info!(request = %request.id, batch = request.batch_id, "certificate request submitted to authority");
            }
            Err(err) if err.is_transient() => {
                // Expected to clear on its own; retried next tick.
                warn!(request = %request.id, error = %err, "could not submit certificate batch, will retry");
            }
            Err(err) => {
                // The submission itself is wrong; retrying will not help
                // until an operator corrects the request.
                error!(request = %request.id, error = %err, "certificate batch refused, request needs operator attention");
            }
        }
        Ok(())
    }

    /// Poll a PROCESSING request's batch and advance it when the CA is
    /// done.
    async fn check_request(&self, request: &mut CertificateRequest) -> Result<(), CertManError> {
        // A VASP rejected while the batch was processing aborts the
        // request before any further CA interaction.
        if self.gate_vasp_state(request).await?.is_none() {
            return Ok(());
        }

        let info = match self.ca.batch_processing_info(request.batch_id).await {
            Ok(info) => info,
            Err(err) => {
                warn!(request = %request.id, error = %err, "could not fetch batch processing info");
                return Ok(());
            }
        };

        if info.active > 0 {
            // Still enrolling; record the CA's status when it changed so
            // operators can tell a stuck request from an acknowledged one.
            return self.observe_batch_status(request).await;
        }

        if info.failed > 0 && info.success == 0 {
            let Some((status, detail)) = self.fetch_batch_status(request).await else {
                return Ok(());
            };

            if status == BATCH_STATUS_REJECTED {
                if let Some(detail) = &detail {
                    request.batch_name = detail.batch_name.clone();
                    request.reject_reason = detail.reject_reason.clone();
                }
                if request.reject_reason.is_empty() {
                    request.reject_reason = BATCH_STATUS_REJECTED.to_owned();
                }
                request.batch_status = status;
                request.update_status(
                    CertificateRequestState::CrRejected,
                    "certificate batch rejected by authority",
                    AUTOMATED,
                );
                self.store.update_cert_req(request).await?;

                let mut vasp = self.store.retrieve_vasp(&request.vasp).await?;
                let reason = request.reject_reason.clone();
                if self.courier.send_rejection(&mut vasp, &request.id, &reason).await > 0 {
                    self.store.update_vasp(&vasp).await?;
                }
            } else if status == BATCH_STATUS_NOT_ACCEPTABLE {
                request.batch_status = status;
                request.update_status(
                    CertificateRequestState::CrErrored,
                    "certificate batch could not be processed by authority",
                    AUTOMATED,
                );
                self.store.update_cert_req(request).await?;
            } else {
                // Failure counters without a conclusive status: keep
                // polling.
                self.record_status_change(request, status, detail).await?;
            }
            return Ok(());
        }

        if info.success > 0 {
            request.update_status(
                CertificateRequestState::Downloading,
                "certificate ready for download",
                AUTOMATED,
            );
            self.store.update_cert_req(request).await?;
            // Attempt the download in the same tick.
            return self.download_request(request).await;
        }

        // Nothing active, nothing failed, nothing succeeded: record any
        // status movement and keep waiting.
        self.observe_batch_status(request).await
    }

    /// Download the issued bundle and commit the issuance. Commit order is
    /// chosen so a crash at any point re-enters DOWNLOADING on restart:
    /// vault first, then the certificate record, then the VASP, then the
    /// request transition, and mail last.
    async fn download_request(&self, request: &mut CertificateRequest) -> Result<(), CertManError> {
        // Never commit an issuance for a VASP that has since left the
        // issuing states; the rejection must win over the download.
        let Some(mut vasp) = self.gate_vasp_state(request).await? else {
            return Ok(());
        };

        let bundle = match self.ca.download(request.batch_id).await {
            Ok(bundle) => bundle,
            Err(err) => {
                warn!(request = %request.id, error = %err, "could not download certificate bundle");
                return Ok(());
            }
        };

        self.vault.create(&request.id, CERT_SECRET).await?;
        self.vault
            .add_version(&request.id, CERT_SECRET, bundle.clone())
            .await?;

        // Operator-convenience artifact; never blocks the commit.
        self.archive_bundle(request, &bundle);

        let password = self.vault.latest_version(&request.id, PASSWORD_SECRET).await?;
        let details = match parse_identity_certificate(&bundle, &password) {
            Ok(details) => details,
            Err(err) => {
                error!(request = %request.id, error = %err, "could not parse downloaded PKCS#12 bundle");
                return Ok(());
            }
        };

        // A crash between the certificate write and the request transition
        // re-enters here; reuse the certificate already recorded for this
        // request instead of issuing a duplicate.
        let mut certificate_id = None;
        for id in &vasp.extra.certificate_ids {
            if let Ok(existing) = self.store.retrieve_cert(id).await {
                if existing.request == request.id {
                    certificate_id = Some(existing.id);
                    break;
                }
            }
        }
        let certificate_id = match certificate_id {
            Some(id) => id,
            None => {
                let certificate = Certificate {
                    id: Uuid::new_v4().to_string(),
                    request: request.id.clone(),
                    vasp: vasp.id.clone(),
                    status: CertificateState::Issued,
                    details: details.clone(),
                };
                self.store.create_cert(&certificate).await?;
                certificate.id
            }
        };

        if vasp.identity_certificate.as_ref().map(|c| &c.fingerprint)
            != Some(&details.fingerprint)
        {
            vasp.signing_certificates.push(details.clone());
        }
        vasp.identity_certificate = Some(details);
        vasp.append_cert_id(&certificate_id);
        vasp.verified_on = Some(Utc::now());
        vasp.update_verification_status(
            VerificationState::Verified,
            "certificate issued",
            AUTOMATED,
        );
        self.store.update_vasp(&vasp).await?;

        request.certificate = certificate_id;
        request.update_status(
            CertificateRequestState::Downloaded,
            "certificate bundle downloaded from authority",
            AUTOMATED,
        );
        request.update_status(
            CertificateRequestState::Completed,
            "certificate issuance complete",
            AUTOMATED,
        );
        self.store.update_cert_req(request).await?;
        info!(request = %request.id, vasp = %vasp.id, "certificate issued and delivered to vault");

        // Deliver the bundle to the verified contacts; email failure never
        // rolls back the issuance.
        if self
            .courier
            .send_deliver_certs(&mut vasp, &request.id, &bundle)
            .await
            > 0
        {
            self.store.update_vasp(&vasp).await?;
        }
        Ok(())
    }

    /// Batch status via the detail endpoint, falling back to the status
    /// endpoint when the detail payload cannot render one. `None` means the
    /// status could not be determined this tick.
    async fn fetch_batch_status(
        &self,
        request: &CertificateRequest,
    ) -> Option<(String, Option<BatchResponse>)> {
        match self.ca.batch_detail(request.batch_id).await {
            Ok(detail) if !detail.status.is_empty() => {
                let status = detail.status.clone();
                Some((status, Some(detail)))
            }
            Ok(detail) => match self.ca.batch_status(request.batch_id).await {
                Ok(status) => Some((status, Some(detail))),
                Err(err) => {
                    warn!(request = %request.id, error = %err, "could not fetch batch status");
                    None
                }
            },
            Err(err) => {
                warn!(request = %request.id, error = %err, "could not fetch batch detail");
                None
            }
        }
    }

    /// Record a CA status movement as a PROCESSING self-transition; a tick
    /// that observes no change appends nothing.
    async fn observe_batch_status(
        &self,
        request: &mut CertificateRequest,
    ) -> Result<(), CertManError> {
        let Some((status, detail)) = self.fetch_batch_status(request).await else {
            return Ok(());
        };
        self.record_status_change(request, status, detail).await
    }

    async fn record_status_change(
        &self,
        request: &mut CertificateRequest,
        status: String,
        detail: Option<BatchResponse>,
    ) -> Result<(), CertManError> {
        if status == request.batch_status {
            return Ok(());
        }

        if let Some(detail) = detail {
            request.batch_name = detail.batch_name;
            request.reject_reason = detail.reject_reason;
        }
        let description = format!("batch status changed to {status}");
        request.batch_status = status;
        request.update_status(CertificateRequestState::Processing, &description, AUTOMATED);
        self.store.update_cert_req(request).await?;
        Ok(())
    }

    /// Write the downloaded bundle into the certs directory for operator
    /// inspection. The artifact is never read back by the service.
    fn archive_bundle(&self, request: &CertificateRequest, bundle: &[u8]) {
        let name = if request.batch_name.is_empty() {
            request.id.clone()
        } else {
            request.batch_name.clone()
        };
        let path = self.conf.storage.join(format!("{name}.p12"));

        let result = std::fs::create_dir_all(&self.conf.storage)
            .and_then(|_| std::fs::write(&path, bundle));
        match result {
            Ok(()) => info!(path = %path.display(), "archived certificate bundle"),
            Err(err) => {
                error!(path = %path.display(), error = %err, "could not archive certificate bundle")
            }
        }
    }
}

/// Convenience used by the binary: spawn the manager on its own task with a
/// stop channel, returning the sender half.
pub fn start(
    manager: CertificateManager,
) -> (
    watch::Sender<bool>,
    tokio::task::JoinHandle<Result<(), CertManError>>,
) {
    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(manager.run(rx));
    (tx, handle)
}
