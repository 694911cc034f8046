fn main() {
    eb_cli::init_tracing();
    let exit_code = eb_cli::run_cli_from_args(std::env::args_os());
    std::process::exit(exit_code);
}
