use clap::Parser;
use gridcrack_core::crypt;

/// Generate a crypt-format hash for seeding shadow files.
#[derive(Parser, Debug)]
#[command(
    name = "genhash",
    version,
    about = "Generate a crypt-format hash for seeding shadow files",
    after_help = "Examples:\n  \
        genhash ABC '$1$saltsalt$'                # MD5\n  \
        genhash ABC '$2b$05$abcdefghijklmnopqrstuv'  # bcrypt\n  \
        genhash ABC '$5$saltsalt$'                # SHA-256\n  \
        genhash ABC '$6$saltsalt$'                # SHA-512\n  \
        genhash ABC '$y$j9T$saltsalt'             # yescrypt"
)]
struct Cli {
    /// Cleartext password to hash
    password: String,

    /// Setting string selecting the scheme and salt, e.g. "$1$saltsalt$"
    setting: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let hash = crypt::crypt(&cli.password, &cli.setting)?;
    println!("{hash}");
    Ok(())
}
