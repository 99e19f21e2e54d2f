use karavan_db::repositories::payment_repo::PaymentRepository;
use karavan_db::repositories::plan_repo::PlanRepository;
use karavan_db::repositories::purchase_repo::PurchaseRepository;
use karavan_db::repositories::server_repo::ServerRepository;
use karavan_db::repositories::user_repo::UserRepository;

use crate::config::BotConfig;
use crate::services::payment_service::PaymentService;
use crate::services::provision_service::ProvisionService;
use crate::services::sync_service::SyncService;
use crate::wizard::WizardStore;

#[derive(Clone)]
pub struct AppState {
    pub config: BotConfig,
    pub users: UserRepository,
    pub servers: ServerRepository,
    pub plans: PlanRepository,
    pub purchases: PurchaseRepository,
    pub sync_service: SyncService,
    pub provision_service: ProvisionService,
    pub payment_service: PaymentService,
    pub wizards: WizardStore,
}

impl AppState {
    pub fn new(pool: karavan_db::sqlx::PgPool, config: BotConfig) -> Self {
        let users = UserRepository::new(pool.clone());
        let servers = ServerRepository::new(pool.clone());
        let plans = PlanRepository::new(pool.clone());
        let purchases = PurchaseRepository::new(pool.clone());
        let payments = PaymentRepository::new(pool);

        let sync_service = SyncService::new(servers.clone());
        let provision_service =
            ProvisionService::new(servers.clone(), plans.clone(), purchases.clone());
        let payment_service =
            PaymentService::new(payments, plans.clone(), provision_service.clone());

        Self {
            config,
            users,
            servers,
            plans,
            purchases,
            sync_service,
            provision_service,
            payment_service,
            wizards: WizardStore::new(),
        }
    }
}
