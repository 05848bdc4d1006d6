use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use amanah_core::commerce::DonorDirectory;
use amanah_core::domain::donor::{Donor, DonorId, NewDonor};
use amanah_core::errors::FacadeError;
use amanah_core::parsers::normalize_phone;

/// Donors keyed by normalized phone number.
#[derive(Default)]
pub struct InMemoryDonorDirectory {
    donors: RwLock<HashMap<String, Donor>>,
}

impl InMemoryDonorDirectory {
    pub async fn insert(&self, donor: Donor) {
        let key = normalize_phone(&donor.phone).unwrap_or_else(|| donor.phone.clone());
        self.donors.write().await.insert(key, donor);
    }

    pub async fn len(&self) -> usize {
        self.donors.read().await.len()
    }
}

#[async_trait]
impl DonorDirectory for InMemoryDonorDirectory {
    async fn find_by_phone(&self, phone: &str) -> Result<Option<Donor>, FacadeError> {
        let Some(key) = normalize_phone(phone) else {
            return Ok(None);
        };
        Ok(self.donors.read().await.get(&key).cloned())
    }

    async fn register(&self, new: NewDonor) -> Result<Donor, FacadeError> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(FacadeError::Rejected("donor name is required".to_string()));
        }
        let phone = normalize_phone(&new.phone)
            .ok_or_else(|| FacadeError::Rejected(format!("`{}` is not a phone number", new.phone)))?;

        let mut donors = self.donors.write().await;
        if let Some(existing) = donors.get(&phone) {
            return Ok(existing.clone());
        }

        let donor = Donor {
            id: DonorId(format!("donor-{}", Uuid::new_v4().simple())),
            name: name.to_string(),
            phone: phone.clone(),
            email: new.email.filter(|email| !email.trim().is_empty()),
        };
        donors.insert(phone, donor.clone());
        tracing::info!(event_name = "donor.registered", donor_id = %donor.id.0, "donor registered");
        Ok(donor)
    }
}
