use crate::cli::telemetry;
use crate::teller::{
    self,
    state::{AppState, TellerConfig, Variant},
    store::UserStore,
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::{fs, path::PathBuf, sync::Arc};
use tracing::{debug, warn};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub variant: Variant,
    pub secret_key: SecretString,
    pub users_path: Option<PathBuf>,
    pub legacy_quirks: bool,
}

/// Load the user store from a seed file or the variant defaults.
///
/// # Errors
/// Returns an error if the seed file cannot be read or holds invalid records.
pub fn load_store(variant: Variant, users_path: Option<&PathBuf>) -> Result<UserStore> {
    let kind = variant.key_kind();
    match users_path {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("Failed to read users file: {}", path.display()))?;
            UserStore::from_json(kind, &json)
                .with_context(|| format!("Invalid users file: {}", path.display()))
        }
        None => UserStore::new(kind, UserStore::seed(variant)).context("Invalid default seed"),
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the user store cannot be loaded or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let store = load_store(args.variant, args.users_path.as_ref())?;

    debug!("Server args: {:?}", args);

    if args.legacy_quirks {
        if args.variant == Variant::Loader {
            warn!("legacy quirks enabled: funds guard and request-loader password check are inverted");
        } else {
            warn!("legacy quirks have no effect on the {} variant", args.variant);
        }
    }

    let config = TellerConfig::new(args.secret_key)
        .with_variant(args.variant)
        .with_legacy_quirks(args.legacy_quirks);

    let result = teller::new(args.port, Arc::new(AppState::new(config, store))).await;

    telemetry::shutdown_tracer();

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn default_seed_per_variant() -> Result<()> {
        let store = load_store(Variant::Basic, None)?;
        assert!(store.find("test").await.is_some());
        assert!(store.find_by_username("alice").await.is_none());
        let store = load_store(Variant::Loader, None)?;
        assert!(store.find("1").await.is_some());
        assert!(store.find("2").await.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn seed_file_overrides_defaults() -> Result<()> {
        let path = std::env::temp_dir().join(format!("teller-users-{}.json", ulid::Ulid::new()));
        let mut file = fs::File::create(&path)?;
        file.write_all(
            br#"[{"id": 3, "username": "dana", "password": "pw", "balance": 77}]"#,
        )?;
        drop(file);

        let store = load_store(Variant::Basic, Some(&path));
        fs::remove_file(&path)?;
        let store = store?;
        assert_eq!(store.find("dana").await.map(|user| user.balance), Some(77));
        assert!(store.find("test").await.is_none());
        Ok(())
    }

    #[test]
    fn missing_seed_file_is_an_error() {
        let path = PathBuf::from("/nonexistent/teller-users.json");
        let err = load_store(Variant::Basic, Some(&path)).unwrap_err();
        assert!(err.to_string().contains("Failed to read users file"));
    }
}
