//! Generate static files

use anyhow::{Context, Result};

use crate::cms::PrismicClient;
use crate::generator::{GenerateReport, Generator};
use crate::SpaceTraveling;

/// Fetch every published post and generate the static site
pub async fn run(site: &SpaceTraveling) -> Result<GenerateReport> {
    let start = std::time::Instant::now();

    let client = PrismicClient::new(&site.config.cms)?;
    let posts = client
        .fetch_all()
        .await
        .with_context(|| format!("Failed to fetch posts from {}", site.config.cms.endpoint))?;
    tracing::info!("Fetched {} posts", posts.len());

    let generator = Generator::new(site)?;
    let report = generator.generate(&posts)?;

    let duration = start.elapsed();
    tracing::info!("Generated in {:.2}s", duration.as_secs_f64());

    Ok(report)
}
