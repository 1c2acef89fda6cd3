pub mod logging;

use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        ValueParser,
    },
    Arg, ArgAction, ColorChoice, Command,
};

use crate::teller::state::Variant;

pub const ARG_PORT: &str = "port";
pub const ARG_VARIANT: &str = "variant";
pub const ARG_SECRET_KEY: &str = "secret-key";
pub const ARG_USERS: &str = "users";
pub const ARG_LEGACY_QUIRKS: &str = "legacy-quirks";

#[must_use]
pub fn validator_variant() -> ValueParser {
    ValueParser::from(move |value: &str| -> std::result::Result<Variant, String> {
        value.parse::<Variant>()
    })
}

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("teller")
        .about("Login and balance demo banking service")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("TELLER_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_VARIANT)
                .long("variant")
                .help("Application variant: basic, csrf, loader")
                .default_value("basic")
                .env("TELLER_VARIANT")
                .value_parser(validator_variant()),
        )
        .arg(
            Arg::new(ARG_SECRET_KEY)
                .long("secret-key")
                .help("Key used to sign session tokens")
                .env("TELLER_SECRET_KEY")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_USERS)
                .long("users")
                .help("JSON file with the initial user records")
                .long_help(
                    "JSON file with the initial user records, an array of {id, username, password, balance}. Defaults to the variant's built-in seed.",
                )
                .env("TELLER_USERS"),
        )
        .arg(
            Arg::new(ARG_LEGACY_QUIRKS)
                .long("legacy-quirks")
                .help("loader variant only: invert the funds guard and the request-loader password check")
                .env("TELLER_LEGACY_QUIRKS")
                .action(ArgAction::SetTrue),
        );

    logging::with_args(command)
}
