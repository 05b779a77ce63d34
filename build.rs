fn main() {
    // ESP-IDF sysenv is only needed for target builds; host tests run
    // with `--no-default-features`.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
