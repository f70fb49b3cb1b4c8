//! In-memory storage backend
//!
//! Default storage implementation using in-memory hashmaps guarded by
//! RwLocks. Suitable for development and tests; data is lost on restart.
//! The VASP map and its secondary indices live behind a single lock so that
//! uniqueness checks and index maintenance stay atomic with the record
//! write.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use gds_models::{Certificate, CertificateRequest, CertificateRequestState, Vasp};

use super::{DirectoryStore, SearchQuery, StorageError};

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

#[derive(Default)]
struct VaspTable {
    records: HashMap<String, Vasp>,
    /// Unique index: normalized common name → vasp id
    common_names: HashMap<String, String>,
    /// Non-unique indices: normalized value → ids
    names: HashMap<String, HashSet<String>>,
    websites: HashMap<String, HashSet<String>>,
    countries: HashMap<String, HashSet<String>>,
    categories: HashMap<String, HashSet<String>>,
}

impl VaspTable {
    fn index(&mut self, vasp: &Vasp) {
        self.common_names
            .insert(normalize(&vasp.common_name), vasp.id.clone());
        if let Some(name) = vasp.name() {
            self.names
                .entry(normalize(name))
                .or_default()
                .insert(vasp.id.clone());
        }
        if !vasp.website.is_empty() {
            self.websites
                .entry(normalize(&vasp.website))
                .or_default()
                .insert(vasp.id.clone());
        }
        if !vasp.entity.country_of_registration.is_empty() {
            self.countries
                .entry(normalize(&vasp.entity.country_of_registration))
                .or_default()
                .insert(vasp.id.clone());
        }
        let business = serde_json::to_value(vasp.business_category)
            .ok()
            .and_then(|v| v.as_str().map(str::to_owned));
        for category in vasp.vasp_categories.iter().cloned().chain(business) {
            self.categories
                .entry(normalize(&category))
                .or_default()
                .insert(vasp.id.clone());
        }
    }

    fn unindex(&mut self, vasp: &Vasp) {
        self.common_names.remove(&normalize(&vasp.common_name));
        for index in [
            &mut self.names,
            &mut self.websites,
            &mut self.countries,
            &mut self.categories,
        ] {
            index.retain(|_, ids| {
                ids.remove(&vasp.id);
                !ids.is_empty()
            });
        }
    }

    /// Ids matching one candidate list within a single index.
    fn candidates(
        &self,
        index: &HashMap<String, HashSet<String>>,
        values: &[String],
        include_common_names: bool,
    ) -> HashSet<String> {
        let mut ids = HashSet::new();
        for value in values {
            let value = normalize(value);
            if let Some(matched) = index.get(&value) {
                ids.extend(matched.iter().cloned());
            }
            if include_common_names {
                if let Some(id) = self.common_names.get(&value) {
                    ids.insert(id.clone());
                }
            }
        }
        ids
    }
}

/// In-memory directory store implementation
#[derive(Default)]
pub struct MemoryStore {
    vasps: RwLock<VaspTable>,
    cert_reqs: RwLock<HashMap<String, CertificateRequest>>,
    certs: RwLock<HashMap<String, Certificate>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DirectoryStore for MemoryStore {
    async fn create_vasp(&self, mut vasp: Vasp) -> Result<Vasp, StorageError> {
        let mut table = self.vasps.write().unwrap();

        let key = normalize(&vasp.common_name);
        if table.common_names.contains_key(&key) {
            return Err(StorageError::AlreadyExists(vasp.common_name));
        }

        vasp.id = Uuid::new_v4().to_string();
        let now = Utc::now();
        vasp.first_listed = Some(now);
        vasp.last_updated = Some(now);

        info!(id = %vasp.id, common_name = %vasp.common_name, "created VASP record");
        table.index(&vasp);
        table.records.insert(vasp.id.clone(), vasp.clone());
        Ok(vasp)
    }

    async fn retrieve_vasp(&self, id: &str) -> Result<Vasp, StorageError> {
        let table = self.vasps.read().unwrap();
        table
            .records
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(id.to_owned()))
    }

    async fn update_vasp(&self, vasp: &Vasp) -> Result<(), StorageError> {
        let mut table = self.vasps.write().unwrap();

        let previous = table
            .records
            .get(&vasp.id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(vasp.id.clone()))?;

        // The common name is immutable in practice, but guard against an
        // update colliding with another record's name.
        let key = normalize(&vasp.common_name);
        if let Some(holder) = table.common_names.get(&key) {
            if holder != &vasp.id {
                return Err(StorageError::AlreadyExists(vasp.common_name.clone()));
            }
        }

        table.unindex(&previous);
        let mut updated = vasp.clone();
        updated.last_updated = Some(Utc::now());
        table.index(&updated);
        table.records.insert(updated.id.clone(), updated);
        Ok(())
    }

    async fn search_vasps(&self, query: &SearchQuery) -> Result<Vec<Vasp>, StorageError> {
        let table = self.vasps.read().unwrap();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let mut result: Option<HashSet<String>> = None;
        let keys = [
            (&query.name, &table.names, true),
            (&query.website, &table.websites, false),
            (&query.country, &table.countries, false),
            (&query.category, &table.categories, false),
        ];
        for (values, index, with_common_names) in keys {
            if values.is_empty() {
                continue;
            }
            let ids = table.candidates(index, values, with_common_names);
            result = Some(match result {
                None => ids,
                Some(acc) => acc.intersection(&ids).cloned().collect(),
            });
        }

        let mut vasps: Vec<Vasp> = result
            .unwrap_or_default()
            .iter()
            .filter_map(|id| table.records.get(id).cloned())
            .collect();
        vasps.sort_by(|a, b| a.common_name.cmp(&b.common_name));
        Ok(vasps)
    }

    async fn create_cert_req(&self, request: &CertificateRequest) -> Result<(), StorageError> {
        let mut requests = self.cert_reqs.write().unwrap();
        if requests.contains_key(&request.id) {
            return Err(StorageError::AlreadyExists(request.id.clone()));
        }
        info!(id = %request.id, vasp = %request.vasp, "created certificate request");
        requests.insert(request.id.clone(), request.clone());
        Ok(())
    }

    async fn retrieve_cert_req(&self, id: &str) -> Result<CertificateRequest, StorageError> {
        let requests = self.cert_reqs.read().unwrap();
        requests
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(id.to_owned()))
    }

    async fn update_cert_req(&self, request: &CertificateRequest) -> Result<(), StorageError> {
        let mut requests = self.cert_reqs.write().unwrap();
        if !requests.contains_key(&request.id) {
            return Err(StorageError::NotFound(request.id.clone()));
        }
        requests.insert(request.id.clone(), request.clone());
        Ok(())
    }

    async fn list_cert_reqs(
        &self,
        statuses: &[CertificateRequestState],
    ) -> Result<Vec<CertificateRequest>, StorageError> {
        let requests = self.cert_reqs.read().unwrap();
        let mut listed: Vec<CertificateRequest> = requests
            .values()
            .filter(|r| statuses.is_empty() || statuses.contains(&r.status))
            .cloned()
            .collect();
        listed.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(listed)
    }

    async fn create_cert(&self, certificate: &Certificate) -> Result<(), StorageError> {
        let mut certs = self.certs.write().unwrap();
        if certs.contains_key(&certificate.id) {
            return Err(StorageError::AlreadyExists(certificate.id.clone()));
        }
        info!(id = %certificate.id, vasp = %certificate.vasp, "created certificate record");
        certs.insert(certificate.id.clone(), certificate.clone());
        Ok(())
    }

    async fn retrieve_cert(&self, id: &str) -> Result<Certificate, StorageError> {
        let certs = self.certs.read().unwrap();
        certs
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(id.to_owned()))
    }
}
