use anyhow::Result;
use tracing::error;

use microblog::{Application, Settings};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    let settings = Settings::load();

    // Sinks and logging are attached while the application is assembled
    let app = Application::build(settings).await?;

    if let Err(e) = app.run().await {
        error!("Application error: {}", e);
        return Err(e);
    }

    Ok(())
}
