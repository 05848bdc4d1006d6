use async_trait::async_trait;
use tokio::sync::RwLock;

use amanah_core::commerce::CatalogFacade;
use amanah_core::domain::catalog::{
    Campaign, FidyahProgram, PackageType, PeriodId, ProductId, QurbanPackage, QurbanPeriod,
    ZakatProgram, ZakatType,
};
use amanah_core::errors::FacadeError;

#[derive(Default)]
struct CatalogData {
    campaigns: Vec<Campaign>,
    zakat_types: Vec<ZakatType>,
    zakat_programs: Vec<ZakatProgram>,
    fidyah_program: Option<FidyahProgram>,
    qurban_periods: Vec<QurbanPeriod>,
    qurban_packages: Vec<QurbanPackage>,
}

#[derive(Default)]
pub struct InMemoryCatalog {
    data: RwLock<CatalogData>,
}

impl InMemoryCatalog {
    pub async fn add_campaign(&self, campaign: Campaign) {
        self.data.write().await.campaigns.push(campaign);
    }

    pub async fn add_zakat_type(&self, zakat_type: ZakatType) {
        self.data.write().await.zakat_types.push(zakat_type);
    }

    pub async fn add_zakat_program(&self, program: ZakatProgram) {
        self.data.write().await.zakat_programs.push(program);
    }

    pub async fn set_fidyah_program(&self, program: FidyahProgram) {
        self.data.write().await.fidyah_program = Some(program);
    }

    pub async fn add_qurban_period(&self, period: QurbanPeriod) {
        self.data.write().await.qurban_periods.push(period);
    }

    pub async fn add_qurban_package(&self, package: QurbanPackage) {
        self.data.write().await.qurban_packages.push(package);
    }

    pub async fn zakat_program(&self, id: &ProductId) -> Option<ZakatProgram> {
        self.data.read().await.zakat_programs.iter().find(|program| &program.id == id).cloned()
    }

    pub async fn qurban_package(&self, id: &ProductId) -> Option<QurbanPackage> {
        self.data.read().await.qurban_packages.iter().find(|package| &package.id == id).cloned()
    }

    /// Takes stock (individual) or one slot (shared) for a new qurban order.
    pub async fn reserve_package(
        &self,
        id: &ProductId,
        quantity: u32,
    ) -> Result<QurbanPackage, FacadeError> {
        let mut data = self.data.write().await;
        let package = data
            .qurban_packages
            .iter_mut()
            .find(|package| &package.id == id)
            .ok_or_else(|| FacadeError::NotFound { entity: "qurban package", id: id.0.clone() })?;

        match package.package_type {
            PackageType::Individual => {
                if package.stock < quantity {
                    return Err(FacadeError::Rejected(format!(
                        "only {} of `{}` left",
                        package.stock, package.name
                    )));
                }
                package.stock -= quantity;
            }
            PackageType::Shared => {
                if quantity != 1 {
                    return Err(FacadeError::Rejected(
                        "a shared package is ordered one slot at a time".to_string(),
                    ));
                }
                if package.slots_available == 0 {
                    return Err(FacadeError::Rejected(format!(
                        "no slots left in `{}`",
                        package.name
                    )));
                }
                package.slots_available -= 1;
            }
        }

        tracing::debug!(
            event_name = "catalog.package_reserved",
            package_id = %package.id,
            quantity,
            stock = package.stock,
            slots_available = package.slots_available,
            "qurban package reserved"
        );
        Ok(package.clone())
    }
}

#[async_trait]
impl CatalogFacade for InMemoryCatalog {
    async fn search_campaigns(&self, query: &str) -> Result<Vec<Campaign>, FacadeError> {
        let needle = query.trim().to_lowercase();
        let data = self.data.read().await;
        Ok(data
            .campaigns
            .iter()
            .filter(|campaign| {
                needle.is_empty()
                    || campaign.title.to_lowercase().contains(&needle)
                    || campaign.description.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect())
    }

    async fn find_campaign(&self, id: &ProductId) -> Result<Option<Campaign>, FacadeError> {
        let data = self.data.read().await;
        Ok(data.campaigns.iter().find(|campaign| &campaign.id == id).cloned())
    }

    async fn zakat_types(&self) -> Result<Vec<ZakatType>, FacadeError> {
        Ok(self.data.read().await.zakat_types.clone())
    }

    async fn zakat_programs(
        &self,
        zakat_type: &ProductId,
    ) -> Result<Vec<ZakatProgram>, FacadeError> {
        let data = self.data.read().await;
        Ok(data
            .zakat_programs
            .iter()
            .filter(|program| &program.zakat_type_id == zakat_type)
            .cloned()
            .collect())
    }

    async fn fidyah_program(&self) -> Result<Option<FidyahProgram>, FacadeError> {
        Ok(self.data.read().await.fidyah_program.clone())
    }

    async fn active_qurban_periods(&self) -> Result<Vec<QurbanPeriod>, FacadeError> {
        Ok(self.data.read().await.qurban_periods.clone())
    }

    async fn qurban_packages(&self, period: &PeriodId) -> Result<Vec<QurbanPackage>, FacadeError> {
        let data = self.data.read().await;
        Ok(data
            .qurban_packages
            .iter()
            .filter(|package| &package.period_id == period)
            .cloned()
            .collect())
    }
}
