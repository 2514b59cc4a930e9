fn main() {
    if let Err(e) = orc::run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
