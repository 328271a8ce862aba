use std::process::ExitCode;

fn main() -> ExitCode {
    redmine_report_lib::run()
}
