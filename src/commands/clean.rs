//! Clean the public directory

use anyhow::Result;
use std::fs;

use crate::SpaceTraveling;

/// Remove everything generated into the public directory
pub fn run(site: &SpaceTraveling) -> Result<()> {
    if site.public_dir.exists() {
        fs::remove_dir_all(&site.public_dir)?;
        tracing::info!("Deleted: {:?}", site.public_dir);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_removes_public_dir() {
        let dir = tempfile::tempdir().unwrap();
        let site = SpaceTraveling::new(dir.path()).unwrap();
        fs::create_dir_all(site.public_dir.join("post/a")).unwrap();
        fs::write(site.public_dir.join("index.html"), "x").unwrap();

        run(&site).unwrap();
        assert!(!site.public_dir.exists());

        // Cleaning twice is fine
        run(&site).unwrap();
    }
}
