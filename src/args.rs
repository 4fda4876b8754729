use clap::Parser;

/// Standardises the OPHI Multidimensional Poverty Index tables into national,
/// subnational and trend datasets.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, default config/project_configuration.json) The JSON project configuration.
    /// It lists the source tables, the column revisions, the output columns and the dataset metadata.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (directory) Where the datasets are written. Setting this option overrides the outputDirectory
    /// that may be specified in the configuration.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// If passed as an argument, the downloaded source files are kept in the saved data directory.
    #[clap(long, takes_value = false)]
    pub save: bool,

    /// If passed as an argument, the source files are read from the saved data directory instead
    /// of being downloaded.
    #[clap(long, takes_value = false)]
    pub use_saved: bool,

    /// (directory, default saved_data) The saved data directory used by --save and --use-saved.
    #[clap(long, value_parser)]
    pub saved_dir: Option<String>,

    /// (directory) A directory of reference outputs. If provided, every file written is compared
    /// with the file of the same name in this directory, and the program fails on any difference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// If passed as an argument, only the global dataset is written.
    #[clap(long, takes_value = false)]
    pub global_only: bool,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
