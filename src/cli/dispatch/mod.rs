//! Command-line argument dispatch.
//!
//! Maps validated CLI arguments to the action the binary runs.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{ARG_LEGACY_QUIRKS, ARG_PORT, ARG_SECRET_KEY, ARG_USERS, ARG_VARIANT};
use crate::teller::state::Variant;
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::path::PathBuf;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let variant = matches
        .get_one::<Variant>(ARG_VARIANT)
        .copied()
        .unwrap_or_default();
    let secret_key = matches
        .get_one::<String>(ARG_SECRET_KEY)
        .cloned()
        .context("missing required argument: --secret-key")?;

    Ok(Action::Server(Args {
        port,
        variant,
        secret_key: SecretString::from(secret_key),
        users_path: matches.get_one::<String>(ARG_USERS).map(PathBuf::from),
        legacy_quirks: matches.get_flag(ARG_LEGACY_QUIRKS),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn builds_server_action() -> Result<()> {
        temp_env::with_vars(
            [
                ("TELLER_SECRET_KEY", None::<&str>),
                ("TELLER_VARIANT", None),
                ("TELLER_USERS", None),
                ("TELLER_LEGACY_QUIRKS", None),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec![
                    "teller",
                    "--secret-key",
                    "secret_sauce",
                    "--variant",
                    "loader",
                    "--users",
                    "/tmp/users.json",
                    "--legacy-quirks",
                ]);
                let Action::Server(args) = handler(&matches)?;
                assert_eq!(args.port, 8080);
                assert_eq!(args.variant, Variant::Loader);
                assert_eq!(args.secret_key.expose_secret(), "secret_sauce");
                assert_eq!(args.users_path, Some(PathBuf::from("/tmp/users.json")));
                assert!(args.legacy_quirks);
                Ok(())
            },
        )
    }

    #[test]
    fn defaults_without_optional_arguments() -> Result<()> {
        temp_env::with_vars(
            [
                ("TELLER_SECRET_KEY", Some("from-env")),
                ("TELLER_VARIANT", None),
                ("TELLER_USERS", None),
                ("TELLER_LEGACY_QUIRKS", None),
                ("TELLER_PORT", None),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["teller"]);
                let Action::Server(args) = handler(&matches)?;
                assert_eq!(args.variant, Variant::Basic);
                assert_eq!(args.users_path, None);
                assert!(!args.legacy_quirks);
                assert_eq!(args.secret_key.expose_secret(), "from-env");
                Ok(())
            },
        )
    }
}
