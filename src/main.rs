fn main() -> std::process::ExitCode {
    labelscan_lib::run()
}
