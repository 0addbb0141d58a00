use dirs_next as dirs;
use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone)]
pub struct ConfigFile(Option<PathBuf>);

impl ConfigFile {
    pub fn path(&self) -> eyre::Result<&Path> {
        self.0
            .as_ref()
            .map(|p| p.as_path())
            .ok_or_else(|| eyre::eyre!("failed to get default config file path"))
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        let default_path = dirs::config_dir().map(|dir| dir.join("packrat").join("packrat.toml"));
        ConfigFile(default_path)
    }
}

impl From<&OsStr> for ConfigFile {
    fn from(s: &OsStr) -> Self {
        ConfigFile(Some(PathBuf::from(s)))
    }
}

impl std::fmt::Display for ConfigFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Some(path) => write!(f, "{}", path.display()),
            None => write!(f, "<none>"),
        }
    }
}

/// Backs up folders to local and cloud destinations on a schedule.
#[derive(clap::Parser, Debug)]
#[command(name = "packrat", disable_version_flag = true)]
pub struct Cli {
    /// Sets a custom configuration file path
    #[arg(short, long, env = "PACKRAT_CONFIG_FILE", default_value_t)]
    pub config_file: ConfigFile,

    #[command(subcommand)]
    pub subcommand: Cmd,
}

#[derive(clap::Subcommand, Debug)]
pub enum Cmd {
    /// Runs the scheduler until interrupted
    Daemon(daemon::Cli),

    /// Runs a job now
    Run(run::Cli),

    /// Restores files from an archive
    Restore(restore::Cli),

    /// Manages backup jobs
    #[command(alias = "jobs")]
    Job(job::Cli),

    /// Manages destinations
    #[command(alias = "destinations")]
    Destination(destination::Cli),

    /// Checks that packaging, cloud transfers and email work
    Check(check::Cli),

    /// Searches archived files
    Search(search::Cli),

    /// Lists past restores
    History,

    /// Prints the active configuration
    Config,

    /// Prints version information
    Version,
}

pub mod daemon {
    use std::path::PathBuf;

    #[derive(clap::Args, Debug)]
    pub struct Cli {
        /// Also writes the log to this file
        #[arg(long)]
        pub log_file: Option<PathBuf>,
    }
}

pub mod run {
    #[derive(clap::ValueEnum, Debug, Copy, Clone, PartialEq, Eq)]
    pub enum OnConflict {
        Overwrite,
        Rename,
        Cancel,
        /// Asks on the terminal
        Ask,
    }

    #[derive(clap::Args, Debug)]
    pub struct Cli {
        /// The job to run
        #[arg(value_name = "JOB")]
        pub job: String,

        /// What to do if the archive already exists
        #[arg(long, value_enum, default_value_t = OnConflict::Rename)]
        pub on_conflict: OnConflict,
    }
}

pub mod restore {
    use std::path::PathBuf;

    #[derive(clap::Args, Debug)]
    pub struct Cli {
        /// Directory to restore into
        #[arg(long)]
        pub to: PathBuf,

        /// Sends a summary to this address when done
        #[arg(long)]
        pub email: Option<String>,

        /// Archive path or remote URI, as shown by `search`
        #[arg(value_name = "ARCHIVE")]
        pub archive: String,

        /// Entries to restore; all recorded entries if none are given
        #[arg(value_name = "ENTRY")]
        pub entries: Vec<String>,
    }
}

pub mod job {
    use std::path::PathBuf;

    #[derive(clap::Args, Debug)]
    pub struct Cli {
        #[command(subcommand)]
        pub subcommand: Cmd,
    }

    #[derive(clap::Subcommand, Debug)]
    pub enum Cmd {
        /// Adds a job
        Add(Add),

        /// Lists all jobs with their state
        List,

        /// Removes a job
        Remove {
            #[arg(value_name = "NAME")]
            name: String,
        },
    }

    #[derive(clap::Args, Debug)]
    pub struct Add {
        #[arg(value_name = "NAME")]
        pub name: String,

        /// Directory (or file) to back up
        #[arg(long)]
        pub source: PathBuf,

        /// Name of the destination to write archives to
        #[arg(long)]
        pub destination: String,

        /// manual, daily, hourly, once or weekly
        #[arg(long, default_value = "manual")]
        pub schedule: String,

        /// Time of day as HH:MM, for daily, once and weekly schedules
        #[arg(long)]
        pub at: Option<String>,

        /// Minute past the hour, for hourly schedules
        #[arg(long)]
        pub minute: Option<i64>,

        /// Date as YYYY-MM-DD, for once schedules
        #[arg(long)]
        pub date: Option<String>,

        /// Day of the week, for weekly schedules
        #[arg(long)]
        pub day: Option<String>,

        /// Sends a summary to this address after every run
        #[arg(long)]
        pub email: Option<String>,

        /// Stored with the job
        #[arg(long)]
        pub move_files: bool,
    }
}

pub mod destination {
    #[derive(clap::Args, Debug)]
    pub struct Cli {
        #[command(subcommand)]
        pub subcommand: Cmd,
    }

    #[derive(clap::Subcommand, Debug)]
    pub enum Cmd {
        /// Adds a destination
        Add {
            #[arg(value_name = "NAME")]
            name: String,

            /// Directory for local destinations, folder inside the drive for cloud ones
            #[arg(long)]
            location: String,

            /// local, gdrive or onedrive
            #[arg(long, default_value = "local")]
            provider: String,
        },

        /// Lists all destinations
        List,

        /// Removes a destination that no job uses
        Remove {
            #[arg(value_name = "NAME")]
            name: String,
        },
    }
}

pub mod check {
    #[derive(clap::Args, Debug)]
    pub struct Cli {
        /// Also sends a test email to this address
        #[arg(long)]
        pub email: Option<String>,
    }
}

pub mod search {
    #[derive(clap::Args, Debug)]
    pub struct Cli {
        /// Matches entry names and original paths; lists recent files if omitted
        #[arg(value_name = "QUERY")]
        pub query: Option<String>,

        #[arg(long, default_value_t = 50)]
        pub limit: u32,

        /// Lists files stored in more than one archive instead
        #[arg(long, conflicts_with = "query")]
        pub duplicates: bool,
    }
}
