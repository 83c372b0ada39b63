fn main() {
    if let Err(err) = sigscan_lib::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
