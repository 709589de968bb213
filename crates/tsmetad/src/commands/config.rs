use std::path::Path;

use tsmeta_core::WorkerConfig;

pub fn check(config_path: &Path) -> anyhow::Result<()> {
    let config = WorkerConfig::from_file(config_path)?;
    println!("{}", config.to_toml_string()?);
    println!("configuration ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_inverted_thresholds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tsmeta.toml");
        std::fs::write(
            &path,
            "[metrics]\nupdate_throttle = \"7d\"\npush_threshold = \"1d\"\n",
        )
        .unwrap();
        assert!(check(&path).is_err());
    }

    #[test]
    fn accepts_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tsmeta.toml");
        std::fs::write(&path, "").unwrap();
        check(&path).unwrap();
    }
}
