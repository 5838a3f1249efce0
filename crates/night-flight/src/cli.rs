use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "night-flight", about = "Beat-synchronized flight through a procedural night city")]
pub struct Cli {
    /// Run in a window instead of fullscreen
    #[arg(short, long)]
    pub windowed: bool,

    /// Start with the debug HUD visible
    #[arg(short, long)]
    pub debug: bool,

    /// Config file (default: ~/.night-flight.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// World seed; the same seed always builds the same city
    #[arg(long)]
    pub seed: Option<u64>,

    /// List audio devices and exit
    #[arg(long)]
    pub list_devices: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let cli = Cli::parse_from(["night-flight", "-w", "--seed", "42", "--config", "/tmp/nf.toml"]);
        assert!(cli.windowed);
        assert!(!cli.debug);
        assert_eq!(cli.seed, Some(42));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/nf.toml")));
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["night-flight"]);
        assert!(!cli.windowed && !cli.debug && !cli.list_devices);
        assert_eq!(cli.seed, None);
    }
}
