use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use shasthyo_core::SymptomDuration;

#[derive(Parser)]
#[command(name = "shasthyo")]
#[command(about = "Offline-first health triage from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Backend base URL override
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,

    /// Skip the reachability probe and run fully offline
    #[arg(long, global = true)]
    pub offline: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Triage a set of symptoms
    Triage {
        /// Symptom IDs from the catalog (e.g. fever cough)
        #[arg(required = true)]
        symptoms: Vec<String>,
        /// How long the symptoms have been present
        #[arg(long, value_enum)]
        duration: Option<DurationArg>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the symptom catalog
    Symptoms {
        /// Force a refresh from the backend
        #[arg(long)]
        refresh: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage the user profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Show queued actions awaiting synchronization
    Queue {
        /// Number of items to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Drain the sync queue against the backend
    Sync,
    /// Show engine status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List past consultations from the backend
    Consultations {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum ProfileCommands {
    /// Create or update the profile
    Set {
        /// Age in years
        #[arg(long)]
        age: u32,
        /// Gender (female, male, other)
        #[arg(long)]
        gender: String,
        /// Free-form location (village/upazila)
        #[arg(long)]
        location: Option<String>,
    },
    /// Show the stored profile
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum DurationArg {
    LessThanDay,
    OneToThreeDays,
    MoreThanThreeDays,
    MoreThanWeek,
}

impl DurationArg {
    pub const fn to_duration(self) -> SymptomDuration {
        match self {
            Self::LessThanDay => SymptomDuration::LessThanDay,
            Self::OneToThreeDays => SymptomDuration::OneToThreeDays,
            Self::MoreThanThreeDays => SymptomDuration::MoreThanThreeDays,
            Self::MoreThanWeek => SymptomDuration::MoreThanWeek,
        }
    }
}
