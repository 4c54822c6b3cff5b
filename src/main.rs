fn main() {
    std::process::exit(goldrun::cli::run());
}
