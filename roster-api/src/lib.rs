#[macro_use]
extern crate rocket;

pub mod auth;
pub mod config;
pub mod db;
pub mod employees;
pub mod error;
pub mod models;
pub mod request_logger;
pub mod routes;
pub mod views;

use crate::auth::{
    AuthState, MemorySessionStore, PasswordService, PgCredentialStore, PgSessionStore,
    SessionBackend, SessionStore,
};
use crate::config::AppConfig;
use crate::db::RosterDb;
use crate::employees::{PgEmployeeStore, SharedEmployeeStore};
use crate::request_logger::RequestLogger;
use env_logger::Env;
use rocket::fairing::AdHoc;
use rocket::{Build, Rocket};
use rocket_db_pools::Database;
use rocket_okapi::{
    openapi_get_routes,
    swagger_ui::{SwaggerUIConfig, make_swagger_ui},
};
use std::sync::{Arc, Once};
use std::time::Duration;

static LOGGER: Once = Once::new();

pub fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(
            Env::default().default_filter_or("info,rocket::server=warn,rocket::request=warn"),
        )
        .init();
    });
}

pub fn rocket(config: AppConfig) -> Rocket<Build> {
    init_logger();
    log::info!("starting roster-api with {:?}", config);

    let auth_config = config.auth.clone();

    let rocket = rocket::custom(config.figment())
        .attach(RequestLogger)
        .attach(RosterDb::init())
        .attach(AdHoc::try_on_ignite(
            "Run Migrations",
            |rocket| async move {
                match RosterDb::fetch(&rocket) {
                    Some(pool) => match db::run_migrations(pool).await {
                        Ok(()) => Ok(rocket),
                        Err(e) => {
                            log::error!("database migrations failed: {}", e);
                            Err(rocket)
                        }
                    },
                    None => {
                        log::error!("database pool not available for migrations");
                        Err(rocket)
                    }
                }
            },
        ))
        .attach(AdHoc::try_on_ignite("Manage Stores", move |rocket| async move {
            let Some(db) = RosterDb::fetch(&rocket) else {
                log::error!("database pool not available for stores");
                return Err(rocket);
            };
            let pool = (**db).clone();

            let passwords = match PasswordService::with_params(auth_config.password) {
                Ok(passwords) => passwords,
                Err(e) => {
                    log::error!("invalid password hashing parameters: {}", e);
                    return Err(rocket);
                }
            };

            let sessions: Arc<dyn SessionStore> = match auth_config.session_backend {
                SessionBackend::Memory => {
                    log::warn!("sessions are kept in memory and will not survive a restart");
                    Arc::new(MemorySessionStore::new())
                }
                SessionBackend::Postgres => Arc::new(PgSessionStore::new(pool.clone())),
            };
            let auth = AuthState::new(
                auth_config,
                passwords,
                Arc::new(PgCredentialStore::new(pool.clone())),
                sessions,
            );
            let employees: SharedEmployeeStore = Arc::new(PgEmployeeStore::new(pool));

            Ok(rocket.manage(auth).manage(employees))
        }))
        .attach(AdHoc::on_liftoff("Spawn Session Purger", |rocket| {
            Box::pin(async move {
                match rocket.state::<AuthState>() {
                    Some(auth) => spawn_session_purger(auth),
                    None => log::error!("failed to spawn session purger: auth state not found"),
                }
            })
        }));

    mount_app(rocket)
}

/// Mount every route, the API docs and the 401 catcher. Expects
/// [`AuthState`] and [`SharedEmployeeStore`] to be managed by the caller.
pub fn mount_app(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .mount("/", auth::routes::routes())
        .mount(
            "/",
            routes![
                routes::employees::add_employee_form,
                routes::employees::add_employee,
                routes::employees::update_employee,
                routes::employees::delete_employee,
            ],
        )
        .mount(
            "/",
            openapi_get_routes![
                routes::health::health_check,
                routes::employees::list_employees,
                routes::employees::get_employee,
            ],
        )
        .mount(
            "/docs/swagger/",
            make_swagger_ui(&SwaggerUIConfig {
                url: "../../openapi.json".to_owned(),
                ..Default::default()
            }),
        )
        .register("/", auth::routes::catchers())
}

fn spawn_session_purger(auth: &AuthState) {
    let every = auth.config.session_purge_interval_secs;
    if every == 0 {
        log::info!("session purger disabled");
        return;
    }

    let sessions = auth.sessions.clone();
    tokio::spawn(async move {
        log::info!("starting session purger (every {}s)", every);
        let mut ticker = tokio::time::interval(Duration::from_secs(every));
        loop {
            ticker.tick().await;
            match sessions.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => log::info!("purged {} expired sessions", purged),
                Err(e) => log::warn!("session purge failed: {}", e),
            }
        }
    });
}

#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support {
    use std::sync::Arc;

    use rocket::config::LogLevel;
    use rocket::figment::Figment;
    use rocket::local::asynchronous::Client as AsyncClient;
    use rocket::local::blocking::Client;
    use rocket::{Build, Rocket};
    use rocket_db_pools::sqlx::PgPool;

    use crate::auth::{
        AuthConfig, AuthState, CredentialStore, MemoryCredentialStore, MemorySessionStore,
        PasswordParams, PasswordService, PgCredentialStore, PgSessionStore, SessionBackend,
        SessionStore,
    };
    use crate::config::derive_secret_key;
    use crate::employees::{MemoryEmployeeStore, PgEmployeeStore, SharedEmployeeStore};

    pub use database::{TestDatabase, TestDatabaseError};

    /// Work factors low enough to keep hashing out of the test wall clock.
    pub const FAST_PASSWORD_PARAMS: PasswordParams = PasswordParams {
        m_cost: 1024,
        t_cost: 1,
        p_cost: 1,
    };

    const TEST_SECRET: &str = "roster-api-test-secret-0123456789abcdef";

    pub fn test_auth_config() -> AuthConfig {
        AuthConfig {
            session_backend: SessionBackend::Memory,
            cookie_secure: false,
            session_purge_interval_secs: 0,
            password: FAST_PASSWORD_PARAMS,
            ..AuthConfig::default()
        }
    }

    pub mod database {
        use log::LevelFilter;
        use rocket_db_pools::sqlx::postgres::{PgConnectOptions, PgPoolOptions};
        use rocket_db_pools::sqlx::{self, ConnectOptions, PgPool};
        use testcontainers::{GenericImage, ImageExt, core::WaitFor};
        use testcontainers_modules::testcontainers::{
            ContainerAsync, core::error::TestcontainersError, runners::AsyncRunner,
        };
        use thiserror::Error;
        use tokio::runtime::Handle;
        use uuid::Uuid;

        static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

        #[derive(Debug, Error)]
        pub enum TestDatabaseError {
            #[error("neither TEST_DATABASE_URL nor ROSTER_TEST_CONTAINERS is set")]
            MissingUrl,
            #[error("database error: {0}")]
            Sqlx(#[from] sqlx::Error),
            #[error("migration error: {0}")]
            Migration(#[from] sqlx::migrate::MigrateError),
            #[error("container error: {0}")]
            Container(#[from] TestcontainersError),
        }

        /// Ephemeral database for integration tests, created next to the
        /// server named by `TEST_DATABASE_URL` or inside a throwaway
        /// Postgres container when `ROSTER_TEST_CONTAINERS` is set.
        pub struct TestDatabase {
            pool: Option<PgPool>,
            admin_options: PgConnectOptions,
            database_name: String,
            container: Option<ContainerAsync<GenericImage>>,
        }

        impl TestDatabase {
            pub async fn new_from_env() -> Result<Self, TestDatabaseError> {
                if let Ok(url) = std::env::var("TEST_DATABASE_URL") {
                    return Self::new(&url, None).await;
                }
                if std::env::var_os("ROSTER_TEST_CONTAINERS").is_some() {
                    return Self::new_in_container().await;
                }
                Err(TestDatabaseError::MissingUrl)
            }

            async fn new_in_container() -> Result<Self, TestDatabaseError> {
                let container = GenericImage::new("postgres", "16-alpine")
                    .with_wait_for(WaitFor::message_on_stderr(
                        "database system is ready to accept connections",
                    ))
                    .with_env_var("POSTGRES_DB", "postgres")
                    .with_env_var("POSTGRES_USER", "postgres")
                    .with_env_var("POSTGRES_PASSWORD", "postgres")
                    .start()
                    .await?;

                let host = container.get_host().await?.to_string();
                let port = container.get_host_port_ipv4(5432).await?;
                let admin_url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);
                Self::new(&admin_url, Some(container)).await
            }

            async fn new(
                base_url: &str,
                container: Option<ContainerAsync<GenericImage>>,
            ) -> Result<Self, TestDatabaseError> {
                let base_options: PgConnectOptions = base_url.parse()?;
                let base_options = base_options.log_statements(LevelFilter::Off);

                let base_name = base_options
                    .get_database()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "postgres".to_string());

                let admin_options = base_options.clone().database("postgres");
                let admin_pool = PgPoolOptions::new()
                    .max_connections(1)
                    .connect_with(admin_options.clone())
                    .await?;

                let new_db_name = format!("{}_{}", base_name, Uuid::new_v4().simple());
                let create_sql = format!("CREATE DATABASE \"{}\" TEMPLATE template0", new_db_name);
                sqlx::query(&create_sql).execute(&admin_pool).await?;
                admin_pool.close().await;

                let pool = PgPoolOptions::new()
                    .max_connections(20)
                    .connect_with(base_options.database(&new_db_name))
                    .await?;

                MIGRATOR.run(&pool).await?;

                Ok(Self {
                    pool: Some(pool),
                    admin_options,
                    database_name: new_db_name,
                    container,
                })
            }

            pub fn pool(&self) -> &PgPool {
                self.pool.as_ref().expect("test database pool is available")
            }

            pub fn pool_clone(&self) -> PgPool {
                self.pool().clone()
            }

            /// Close pool connections and drop the ephemeral database.
            pub async fn close(mut self) -> Result<(), TestDatabaseError> {
                if let Some(pool) = self.pool.take() {
                    pool.close().await;
                }

                drop_database_with_fallback(self.admin_options.clone(), &self.database_name)
                    .await?;

                if let Some(container) = self.container.take() {
                    drop(container);
                }

                Ok(())
            }
        }

        async fn drop_database_with_fallback(
            admin_options: PgConnectOptions,
            database_name: &str,
        ) -> Result<(), sqlx::Error> {
            let admin_pool = PgPoolOptions::new()
                .max_connections(1)
                .connect_with(admin_options)
                .await?;

            let drop_force = format!("DROP DATABASE \"{}\" WITH (FORCE)", database_name);
            match sqlx::query(&drop_force).execute(&admin_pool).await {
                Ok(_) => Ok(()),
                Err(err) if force_drop_unsupported(&err) => {
                    let drop_sql = format!("DROP DATABASE \"{}\"", database_name);
                    sqlx::query(&drop_sql).execute(&admin_pool).await?;
                    Ok(())
                }
                Err(err) => Err(err),
            }
        }

        fn force_drop_unsupported(err: &sqlx::Error) -> bool {
            matches!(
                err,
                sqlx::Error::Database(db_err)
                    if db_err
                        .code()
                        .map(|code| code == "42601" || code == "0A000")
                        .unwrap_or(false)
            )
        }

        impl Drop for TestDatabase {
            fn drop(&mut self) {
                if let Some(pool) = self.pool.take() {
                    let admin_options = self.admin_options.clone();
                    let db_name = self.database_name.clone();
                    if let Ok(handle) = Handle::try_current() {
                        handle.spawn(async move {
                            pool.close().await;
                            let _ = drop_database_with_fallback(admin_options, &db_name).await;
                        });
                    } else {
                        std::thread::spawn(move || {
                            if let Ok(rt) = tokio::runtime::Runtime::new() {
                                rt.block_on(async move {
                                    pool.close().await;
                                    let _ =
                                        drop_database_with_fallback(admin_options, &db_name).await;
                                });
                            }
                        });
                    }
                }

                if let Some(container) = self.container.take() {
                    drop(container);
                }
            }
        }
    }

    /// Builds the full application over in-memory stores unless a pool or
    /// explicit stores are supplied.
    pub struct TestRocketBuilder {
        figment: Figment,
        auth_config: AuthConfig,
        pg_pool: Option<PgPool>,
        credentials: Option<Arc<dyn CredentialStore>>,
        sessions: Option<Arc<dyn SessionStore>>,
        employees: Option<SharedEmployeeStore>,
    }

    impl Default for TestRocketBuilder {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TestRocketBuilder {
        /// Random port, logging disabled, fixed cookie key.
        pub fn new() -> Self {
            let figment = rocket::Config::figment()
                .merge(("port", 0))
                .merge(("log_level", LogLevel::Off))
                .merge(("cli_colors", false))
                .merge(("secret_key", derive_secret_key(TEST_SECRET)));

            Self {
                figment,
                auth_config: test_auth_config(),
                pg_pool: None,
                credentials: None,
                sessions: None,
                employees: None,
            }
        }

        pub fn auth_config(mut self, config: AuthConfig) -> Self {
            self.auth_config = config;
            self
        }

        /// Back every store that was not set explicitly with Postgres.
        pub fn manage_pg_pool(mut self, pool: PgPool) -> Self {
            self.pg_pool = Some(pool);
            self.auth_config.session_backend = SessionBackend::Postgres;
            self
        }

        pub fn credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
            self.credentials = Some(store);
            self
        }

        pub fn session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
            self.sessions = Some(store);
            self
        }

        pub fn employee_store(mut self, store: SharedEmployeeStore) -> Self {
            self.employees = Some(store);
            self
        }

        pub fn build(self) -> Rocket<Build> {
            let pool = self.pg_pool;
            let credentials: Arc<dyn CredentialStore> = match (self.credentials, &pool) {
                (Some(store), _) => store,
                (None, Some(pool)) => Arc::new(PgCredentialStore::new(pool.clone())),
                (None, None) => Arc::new(MemoryCredentialStore::new()),
            };
            let sessions: Arc<dyn SessionStore> = match (self.sessions, &pool) {
                (Some(store), _) => store,
                (None, Some(pool)) => Arc::new(PgSessionStore::new(pool.clone())),
                (None, None) => Arc::new(MemorySessionStore::new()),
            };
            let employees: SharedEmployeeStore = match (self.employees, &pool) {
                (Some(store), _) => store,
                (None, Some(pool)) => Arc::new(PgEmployeeStore::new(pool.clone())),
                (None, None) => Arc::new(MemoryEmployeeStore::new()),
            };

            let passwords = PasswordService::with_params(self.auth_config.password)
                .expect("valid test password parameters");
            let auth = AuthState::new(self.auth_config, passwords, credentials, sessions);

            let rocket = rocket::custom(self.figment).manage(auth).manage(employees);
            crate::mount_app(rocket)
        }

        pub fn blocking_client(self) -> Client {
            Client::tracked(self.build()).expect("valid Rocket instance")
        }

        pub async fn async_client(self) -> AsyncClient {
            AsyncClient::tracked(self.build())
                .await
                .expect("valid Rocket instance")
        }
    }
}
