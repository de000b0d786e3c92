use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_SHA"),
    ", ",
    env!("BUILD_DATE"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "soundboard", version = VERSION, about = "Organize audio clips into soundboards and play them")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Flags accepted by every subcommand.
#[derive(ClapArgs, Debug)]
pub struct GlobalArgs {
    /// TOML config file (defaults to <data-dir>/config.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the persisted soundboards
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Use a specific output device by substring match
    #[arg(long, global = true)]
    pub device: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show all soundboards
    List,

    /// Create an empty soundboard
    Create {
        /// Soundboard name
        name: String,
    },

    /// Open a soundboard (by id, name or list number) and show its clips
    Open {
        board: String,
    },

    /// Leave the open soundboard and show the list again
    Back,

    /// Show the clips of the open soundboard
    Clips {
        /// Soundboard to show instead of the open one
        #[arg(long)]
        board: Option<String>,
    },

    /// Add audio files to the open soundboard
    Add {
        /// Audio files to add, in order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Soundboard to add to instead of the open one
        #[arg(long)]
        board: Option<String>,
    },

    /// Play a clip (by id, name or grid number) and wait for it to finish
    Play {
        clip: String,

        #[arg(long)]
        board: Option<String>,
    },

    /// Interactive pad: type a clip number or name to play it
    Pad {
        #[arg(long)]
        board: Option<String>,
    },

    /// List output devices
    Devices,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "soundboard",
            "play",
            "2",
            "--board",
            "Memes",
            "--device",
            "usb",
        ])
        .unwrap();

        assert_eq!(args.global.device.as_deref(), Some("usb"));
        match args.cmd {
            Command::Play { clip, board } => {
                assert_eq!(clip, "2");
                assert_eq!(board.as_deref(), Some("Memes"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn add_requires_files() {
        assert!(Args::try_parse_from(["soundboard", "add"]).is_err());
        let args = Args::try_parse_from(["soundboard", "add", "a.mp3", "b.wav"]).unwrap();
        match args.cmd {
            Command::Add { files, board } => {
                assert_eq!(files, vec![PathBuf::from("a.mp3"), PathBuf::from("b.wav")]);
                assert!(board.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn devices_takes_global_flags_without_a_store() {
        let args = Args::try_parse_from(["soundboard", "devices", "--device", "usb"]).unwrap();
        assert!(matches!(args.cmd, Command::Devices));
        assert_eq!(args.global.device.as_deref(), Some("usb"));
        assert!(args.global.data_dir.is_none());
    }

    #[test]
    fn command_definition_is_consistent() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
