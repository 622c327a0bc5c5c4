use anyhow::Result;
use clap::Parser;
use trials::{
    record::DataRecord,
    settings::{Args, Settings},
    {application, parallel},
};

pub fn run_application(settings: &Settings) -> Result<DataRecord> {
    if settings.parallel() {
        parallel::run_parallel(settings)
    } else {
        application::run(settings)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let settings = Settings::from_args(args)?;
    run_application(&settings)?;
    Ok(())
}
