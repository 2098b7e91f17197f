fn main() {
    upi_extract::cli::run();
}
