fn main() {
    env_logger::init();

    if let Err(error) = nuspec_deploy::cli::execute() {
        eprintln!("Error: {error:#}");
    }
}
