fn main() {
    if let Err(err) = avr_lib::run() {
        eprintln!("❌ Error: {err:#}");
        std::process::exit(1);
    }
}
