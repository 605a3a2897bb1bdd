use anyhow::Result;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use crate::auth::{AuthService, LoginManager};
use crate::blog::BlogService;
use crate::core::config::Settings;
use crate::crypto::service::CryptoService;
use crate::i18n::Localizer;
use crate::notify::{self, Mailer};
use crate::queue::{task_queue, TaskQueue, TASK_QUEUE_NAME};
use crate::search::Search;
use crate::social::SocialService;
use crate::storage::database::Database;
use crate::storage::migrations::Migrations;
use crate::translate::Translator;
use crate::web::routes;
use crate::web::templates::Templates;

/// Composition root: one per process, or one per test.
pub struct Application {
    state: Arc<AppState>,
    router: Router,
}

impl Application {
    pub async fn build(settings: Settings) -> Result<Self> {
        // Sinks go first so the rest of assembly is already captured.
        notify::attach(&settings.observer_sinks())?;

        info!("Initializing application components");

        let db = Arc::new(Database::new(&settings.database).await?);

        let migrations = Migrations::new(&db);
        migrations.upgrade().await?;
        let applied = migrations.applied().await?;
        info!(revisions = applied.len(), latest = ?applied.last(), "Database schema ready");

        let crypto = Arc::new(CryptoService::new(&settings.secret_key));
        let login_manager = LoginManager::default();
        let auth_service = Arc::new(AuthService::new(Arc::clone(&db), crypto));

        let mailer = Mailer::from_config(&settings.mail)?;
        let templates = Arc::new(Templates::new()?);
        let localizer = Arc::new(Localizer::new(&settings.languages));

        let search = Arc::new(Search::from_url(settings.elasticsearch_url.as_deref())?);

        let cache = task_queue::connect(&settings.redis_url)?;
        let task_queue = TaskQueue::new(TASK_QUEUE_NAME, cache.clone());

        let translator = Arc::new(Translator::new(&settings.translator, Arc::clone(&localizer))?);
        let blog_service = Arc::new(BlogService::new(Arc::clone(&db), Arc::clone(&search)));
        let social_service = Arc::new(SocialService::new(Arc::clone(&db)));

        let state = Arc::new(AppState {
            settings,
            db,
            migrations,
            login_manager,
            auth_service,
            blog_service,
            social_service,
            mailer,
            templates,
            localizer,
            search,
            cache,
            task_queue,
            translator,
        });

        let router = routes::create_router(Arc::clone(&state));

        if state.settings.is_production() {
            info!("Microblog startup");
        }

        Ok(Self { state, router })
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub async fn run(self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.state.settings.server.host, self.state.settings.server.port)
            .parse()?;
        info!("Server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, self.router).await?;

        Ok(())
    }
}

#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub db: Arc<Database>,
    pub migrations: Migrations,
    pub login_manager: LoginManager,
    pub auth_service: Arc<AuthService>,
    pub blog_service: Arc<BlogService>,
    pub social_service: Arc<SocialService>,
    pub mailer: Option<Mailer>,
    pub templates: Arc<Templates>,
    pub localizer: Arc<Localizer>,
    pub search: Arc<Search>,
    pub cache: redis::Client,
    pub task_queue: TaskQueue,
    pub translator: Arc<Translator>,
}
