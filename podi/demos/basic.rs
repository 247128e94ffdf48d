//! Basic example of the Podi DI container.

use podi::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

// === Define your traits and types ===

trait Logger: Send + Sync {
    fn log(&self, msg: &str);
}

struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn log(&self, msg: &str) {
        println!("[LOG] {msg}");
    }
}

#[derive(Clone)]
struct Config {
    database_url: String,
    debug: bool,
}

struct Database {
    url: String,
    logger: Arc<dyn Logger>,
    open: AtomicBool,
}

impl Database {
    fn query(&self, sql: &str) -> String {
        self.logger.log(&format!("Executing: {sql}"));
        format!("Results from {}", self.url)
    }

    async fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        self.logger.log("Database connection closed");
    }
}

impl Construct for Database {
    type Args = (Config, Arc<dyn Logger>);

    fn construct((config, logger): Self::Args) -> Self {
        Database {
            url: config.database_url,
            logger,
            open: AtomicBool::new(true),
        }
    }
}

struct UserRepository {
    db: Arc<Database>,
}

impl Construct for UserRepository {
    type Args = Arc<Database>;

    fn construct(db: Arc<Database>) -> Self {
        UserRepository { db }
    }
}

impl UserRepository {
    fn find_user(&self, id: u64) -> String {
        self.db.query(&format!("SELECT * FROM users WHERE id = {id}"))
    }
}

struct Tokens {
    config: Token<Config>,
    logger: Token<Arc<dyn Logger>>,
    database: Token<Arc<Database>>,
    users: Token<Arc<UserRepository>>,
    middleware: Token<&'static str>,
}

impl Tokens {
    fn create() -> Result<Self> {
        Ok(Tokens {
            config: create_token("config", TokenOptions::default())?,
            logger: create_token("logger", TokenOptions::default())?,
            database: create_token("database", TokenOptions::default())?,
            users: create_token("users", TokenOptions::default())?,
            middleware: create_token("middleware", TokenOptions::default().multiton())?,
        })
    }
}

/// Application-wide services.
struct InfrastructureProvider<'a> {
    tokens: &'a Tokens,
}

impl Provider for InfrastructureProvider<'_> {
    fn register(&self, container: &Container) {
        let t = self.tokens;
        container.register(
            &t.config,
            as_value(
                Config {
                    database_url: "postgres://localhost/myapp".to_string(),
                    debug: true,
                },
                ResolverOptions::new(),
            ),
        );
        container.register(
            &t.logger,
            as_function(
                || Arc::new(ConsoleLogger) as Arc<dyn Logger>,
                ResolverOptions::new(),
            ),
        );

        let (config, logger) = (t.config.clone(), t.logger.clone());
        container.register(
            &t.database,
            as_class_with::<Database, _>(
                move |c: &Container| {
                    let config = c.resolve(&config).expect("config is registered");
                    let logger = c.resolve(&logger).expect("logger is registered");
                    (config, logger)
                },
                ResolverOptions::new().disposer(|db: Arc<Database>, _| async move {
                    db.close().await;
                    Ok(())
                }),
            ),
        );
        container.register(&t.middleware, as_value("auth", ResolverOptions::new().weight(10)));
        container.register(&t.middleware, as_value("logging", ResolverOptions::new()));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing (logging)
    tracing_subscriber::fmt()
        .with_env_filter("podi_container=debug")
        .init();

    let tokens = Tokens::create()?;

    let container = Container::new();
    container.add_provider(&InfrastructureProvider { tokens: &tokens });

    println!("✅ Container ready: {container:?}");

    let config = container.resolve(&tokens.config).expect("config is registered");
    println!("📋 Config: database_url={}, debug={}", config.database_url, config.debug);

    // === Create a scope (e.g., for an HTTP request) ===
    {
        let scope = container.create_scope();
        println!("🔭 Scope: {scope}");

        let db = tokens.database.clone();
        scope.register(
            &tokens.users,
            as_class_with::<UserRepository, _>(
                move |c: &Container| c.resolve(&db).expect("database is registered"),
                ResolverOptions::new(),
            ),
        );
        scope.register(&tokens.middleware, as_value("rate-limit", ResolverOptions::new().weight(5)));

        let users = scope.resolve(&tokens.users).expect("users are registered");
        println!("👤 {}", users.find_user(42));

        // weight orders across the whole scope chain
        println!("🧱 Middleware: {:?}", scope.resolve_all(&tokens.middleware));

        let report = scope.dispose().await?;
        println!("🧹 Scope disposed: {report:?}");
    }

    let report = container.dispose().await?;
    println!("🧹 Root disposed: {report:?}");

    println!("\n🎉 Everything works!");
    Ok(())
}
