fn main() {
    if let Err(e) = rill::cli::run_cli() {
        eprintln!("Error: {e}");
        std::process::exit(e.exit_code());
    }
}
