use super::Parser;

#[derive(Parser, Debug)]
#[command(version, about = "Token and session lifecycle service")]
pub struct Cli {
    /// Path to the settings file, without or with the `.toml` extension.
    #[arg(long)]
    pub settings: Option<String>,
}
