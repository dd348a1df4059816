use std::sync::Arc;
use tokio;
use tracing_subscriber::{fmt, EnvFilter};
use tracing::{info, Level};
use songs_backend::{
    controllers::{BlobCleanupPolicy, SongController, SongOptions},
    db::{Database, MemoryDatabase, SongStore},
    routers,
    secrets::{DEFAULT_MAX_UPLOAD_BYTES, SECRET_MANAGER},
    storage::{MemoryObjectStore, ObjectStore, SupabaseStorage},
};

fn object_store() -> anyhow::Result<Arc<dyn ObjectStore>> {
    match SECRET_MANAGER.get("OBJECT_STORE").as_str() {
        "supabase" => {
            let url = SECRET_MANAGER.require("SUPABASE_URL")?;
            let key = SECRET_MANAGER.require("SUPABASE_KEY")?;
            Ok(Arc::new(SupabaseStorage::new(&url, key)?))
        }
        "memory" => {
            info!("📦 Object store: in-memory");
            Ok(Arc::new(MemoryObjectStore::new(SECRET_MANAGER.get("BACKEND_URL"))))
        }
        other => anyhow::bail!("unknown OBJECT_STORE: {}", other),
    }
}

async fn metadata_store() -> anyhow::Result<Arc<dyn SongStore>> {
    match SECRET_MANAGER.get("METADATA_STORE").as_str() {
        "postgres" => {
            let database_url = SECRET_MANAGER.require("DATABASE_URL")?;
            let database = Database::new(&database_url).await?;
            info!("📊 Connected to PostgreSQL database");

            sqlx::migrate!("./migrations").run(database.pool()).await?;
            info!("📊 Database migrations completed");
            Ok(Arc::new(database))
        }
        "memory" => {
            info!("📊 Metadata store: in-memory");
            Ok(Arc::new(MemoryDatabase::new()))
        }
        other => anyhow::bail!("unknown METADATA_STORE: {}", other),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is the normal case in containers.
    let _ = dotenvy::dotenv();

    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_target(false)
        .init();

    let options = SongOptions {
        audio_bucket: SECRET_MANAGER.get("AUDIO_BUCKET"),
        image_bucket: SECRET_MANAGER.get("IMAGE_BUCKET"),
        cleanup: SECRET_MANAGER
            .get("BLOB_CLEANUP_POLICY")
            .parse::<BlobCleanupPolicy>()
            .map_err(anyhow::Error::msg)?,
        normalize_category_on_write: SECRET_MANAGER.get_bool("NORMALIZE_CATEGORY_ON_WRITE"),
    };
    let controller = SongController::new(object_store()?, metadata_store().await?, options);
    info!(
        "🎵 Buckets: audio={} image={}, blob cleanup: {:?}, normalize category on write: {}",
        controller.options().audio_bucket,
        controller.options().image_bucket,
        controller.options().cleanup,
        controller.options().normalize_category_on_write,
    );

    let port = SECRET_MANAGER.get("PORT");
    let backend_url = SECRET_MANAGER.get("BACKEND_URL");
    let max_upload_bytes = SECRET_MANAGER.get_usize("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    let app = routers::app(controller, max_upload_bytes);

    info!("🎧 Songs backend listening on {}", backend_url);
    info!("📡 Song API endpoints: /songs/*");

    axum::serve(listener, app).await?;
    Ok(())
}
