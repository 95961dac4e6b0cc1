use anyhow::Result;

use exam_extract::orchestrator::App;
use exam_extract::utils;
use exam_extract::Config;

#[tokio::main]
async fn main() -> Result<()> {
    utils::init();

    let config = Config::from_env();

    App::initialize(config)?.run().await?;

    Ok(())
}
