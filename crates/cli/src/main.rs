fn main() -> std::process::ExitCode {
    shutterbook_cli::run()
}
