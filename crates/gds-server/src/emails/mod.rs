//! Email courier for the registration and issuance workflows
//!
//! Four templated sends drive the pipeline's out-of-band traffic: contact
//! verification, admin review requests, certificate delivery, and
//! rejection notices. Contacts iterate in the fixed order {legal,
//! administrative, technical, billing}; every successful send is recorded
//! on the contact's (or the VASP's) send-log so duplicates are suppressed
//! across process restarts. Delivery failures are logged at high severity
//! and never fail the calling workflow.

pub mod transport;

pub use transport::{Attachment, EmailError, EmailMessage, EmailTransport, LogTransport, MockTransport};

use std::sync::Arc;

use tracing::{error, info};

use gds_models::Vasp;

// Subject lines, also used by tests to pick messages out of the outbox.
pub const VERIFY_CONTACT_SUBJECT: &str = "TRISA: Please verify your email address";
pub const REVIEW_REQUEST_SUBJECT: &str = "New TRISA Global Directory Registration Request";
pub const DELIVER_CERTS_SUBJECT: &str = "Welcome to the TRISA network!";
pub const REJECT_REGISTRATION_SUBJECT: &str = "TRISA Global Directory Registration Update";

// Template names recorded on send-logs for dedupe.
const REASON_VERIFY_CONTACT: &str = "verify_contact";
const REASON_REVIEW_REQUEST: &str = "review_request";
const REASON_DELIVER_CERTS: &str = "deliver_certs";
const REASON_REJECT_REGISTRATION: &str = "reject_registration";

/// Composes, deduplicates, and dispatches directory mail.
pub struct EmailCourier {
    transport: Arc<dyn EmailTransport>,
    service_email: String,
    admin_email: String,
    verify_base_url: String,
}

impl EmailCourier {
    pub fn new(
        transport: Arc<dyn EmailTransport>,
        service_email: &str,
        admin_email: &str,
        verify_base_url: &str,
    ) -> Self {
        EmailCourier {
            transport,
            service_email: service_email.to_owned(),
            admin_email: admin_email.to_owned(),
            verify_base_url: verify_base_url.trim_end_matches('/').to_owned(),
        }
    }

    async fn dispatch(&self, message: EmailMessage) -> bool {
        match self.transport.send(&message).await {
            Ok(()) => true,
            Err(err) => {
                // Never fatal for the calling workflow; operators resend.
                error!(
                    to = %message.to,
                    subject = %message.subject,
                    error = %err,
                    "could not send email"
                );
                false
            }
        }
    }

    /// Send verification mail to every unverified contact holding a token.
    /// Returns the number of successful sends; send-log entries are
    /// appended to the VASP record, which the caller persists.
    pub async fn send_verify_contacts(&self, vasp: &mut Vasp) -> usize {
        let vasp_id = vasp.id.clone();
        let base_url = self.verify_base_url.clone();

        let mut sends = Vec::new();
        for (kind, contact) in vasp.contacts.iter() {
            let Some(token) = contact.token() else {
                continue;
            };
            if contact.is_verified() || contact.email.is_empty() {
                continue;
            }
            if contact.has_email_log(REASON_VERIFY_CONTACT, Some(token)) {
                continue;
            }

            let link = format!("{base_url}/verify-contact?vaspID={vasp_id}&token={token}");
            sends.push((
                kind,
                token.to_owned(),
                EmailMessage {
                    to: contact.email.clone(),
                    from: self.service_email.clone(),
                    subject: VERIFY_CONTACT_SUBJECT.into(),
                    body: format!(
                        "Hello {},\n\n\
                         You have been registered as the {} contact of a TRISA Global \
                         Directory registration. Please verify your email address by \
                         following this link:\n\n{}\n\n\
                         If you did not expect this registration you can ignore this \
                         message.\n",
                        contact.name, kind, link
                    ),
                    attachment: None,
                },
            ));
        }

        let mut sent = 0;
        for (kind, token, message) in sends {
            if self.dispatch(message).await {
                if let Some((_, contact)) =
                    vasp.contacts.iter_mut().find(|(k, _)| *k == kind)
                {
                    contact.log_email(REASON_VERIFY_CONTACT, Some(&token));
                }
                sent += 1;
            }
        }
        if sent > 0 {
            info!(vasp = %vasp.id, sent = sent, "contact verification emails sent");
        }
        sent
    }

    /// Ask the directory admins to review the registration. Sent at most
    /// once per VASP lifetime.
    pub async fn send_review_request(&self, vasp: &mut Vasp) -> usize {
        if vasp.has_email_log(REASON_REVIEW_REQUEST, None) {
            return 0;
        }

        let name = vasp.name().unwrap_or(&vasp.common_name).to_owned();
        let message = EmailMessage {
            to: self.admin_email.clone(),
            from: self.service_email.clone(),
            subject: REVIEW_REQUEST_SUBJECT.into(),
            body: format!(
                "A new registration is pending review.\n\n\
                 VASP: {} ({})\nCommon name: {}\nEndpoint: {}\n\n\
                 The admin verification token for this registration is attached \
                 to the record; use it to approve or reject the request.\n",
                name, vasp.id, vasp.common_name, vasp.trisa_endpoint
            ),
            attachment: None,
        };

        if self.dispatch(message).await {
            let recipient = self.admin_email.clone();
            vasp.log_email(REASON_REVIEW_REQUEST, &recipient, None);
            info!(vasp = %vasp.id, "review request email sent to admins");
            1
        } else {
            0
        }
    }

    /// Deliver the issued PKCS#12 bundle to every verified contact. Sent at
    /// most once per contact per certificate request.
    pub async fn send_deliver_certs(
        &self,
        vasp: &mut Vasp,
        request_id: &str,
        pkcs12: &[u8],
    ) -> usize {
        let filename = format!("{}.p12", vasp.common_name);
        let common_name = vasp.common_name.clone();

        let mut sends = Vec::new();
        for (kind, contact) in vasp.contacts.iter() {
            if !contact.is_verified() || contact.email.is_empty() {
                continue;
            }
            if contact.has_email_log(REASON_DELIVER_CERTS, Some(request_id)) {
                continue;
            }

            sends.push((
                kind,
                EmailMessage {
                    to: contact.email.clone(),
                    from: self.service_email.clone(),
                    subject: DELIVER_CERTS_SUBJECT.into(),
                    body: format!(
                        "Hello {},\n\n\
                         The identity certificate for {} has been issued and is \
                         attached as a PKCS#12 file. Decrypt it with the password \
                         from your registration reply; the directory does not \
                         retain it.\n",
                        contact.name, common_name
                    ),
                    attachment: Some(Attachment {
                        filename: filename.clone(),
                        content: pkcs12.to_vec(),
                    }),
                },
            ));
        }

        let mut sent = 0;
        for (kind, message) in sends {
            if self.dispatch(message).await {
                if let Some((_, contact)) =
                    vasp.contacts.iter_mut().find(|(k, _)| *k == kind)
                {
                    contact.log_email(REASON_DELIVER_CERTS, Some(request_id));
                }
                sent += 1;
            }
        }
        if sent > 0 {
            info!(vasp = %vasp.id, request = request_id, sent = sent, "certificate delivery emails sent");
        }
        sent
    }

    /// Notify verified contacts that the certificate request was rejected.
    /// Sent at most once per contact per certificate request.
    pub async fn send_rejection(
        &self,
        vasp: &mut Vasp,
        request_id: &str,
        reason: &str,
    ) -> usize {
        let common_name = vasp.common_name.clone();

        let mut sends = Vec::new();
        for (kind, contact) in vasp.contacts.iter() {
            if !contact.is_verified() || contact.email.is_empty() {
                continue;
            }
            if contact.has_email_log(REASON_REJECT_REGISTRATION, Some(request_id)) {
                continue;
            }

            sends.push((
                kind,
                EmailMessage {
                    to: contact.email.clone(),
                    from: self.service_email.clone(),
                    subject: REJECT_REGISTRATION_SUBJECT.into(),
                    body: format!(
                        "Hello {},\n\n\
                         The certificate request for {} could not be completed:\n\n\
                         {}\n\n\
                         Please contact the directory administrators for next \
                         steps.\n",
                        contact.name, common_name, reason
                    ),
                    attachment: None,
                },
            ));
        }

        let mut sent = 0;
        for (kind, message) in sends {
            if self.dispatch(message).await {
                if let Some((_, contact)) =
                    vasp.contacts.iter_mut().find(|(k, _)| *k == kind)
                {
                    contact.log_email(REASON_REJECT_REGISTRATION, Some(request_id));
                }
                sent += 1;
            }
        }
        sent
    }
}
