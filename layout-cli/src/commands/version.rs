use anyhow::Result;
use colored::Colorize;
use layout_service::build_info::BuildInfo;

pub fn execute() -> Result<()> {
    let info = BuildInfo::current();
    println!("{} {}", "app-layout".bold(), info.version);
    println!("{}", info.summary());
    Ok(())
}
