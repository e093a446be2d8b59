fn main() {
    if let Err(err) = scangate::cli::run() {
        scangate::ui::eprintln_error(&err);
        std::process::exit(scangate::exit::exit_code(&err));
    }
}
