use crate::cli::{
    actions::Action,
    commands::{self, logging},
    dispatch, telemetry,
};
use anyhow::Result;

/// Parse the command line, start telemetry and return the action to run.
///
/// # Errors
///
/// Returns an error if telemetry initialization or action dispatch fails
pub fn start() -> Result<Action> {
    let matches = commands::new().get_matches();

    let verbosity = matches
        .get_one::<u8>(logging::ARG_VERBOSITY)
        .copied()
        .unwrap_or(0);
    telemetry::init(logging::level_for(verbosity))?;

    dispatch::handler(&matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(logging::level_for(0), None);
        assert_eq!(logging::level_for(1), Some(Level::WARN));
        assert_eq!(logging::level_for(2), Some(Level::INFO));
        assert_eq!(logging::level_for(3), Some(Level::DEBUG));
        assert_eq!(logging::level_for(4), Some(Level::TRACE));
        assert_eq!(logging::level_for(9), Some(Level::TRACE));
    }
}
