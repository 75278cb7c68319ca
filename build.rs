fn main() {
    // Device builds need the ESP-IDF environment forwarded to rustc; host
    // builds (unit tests, fuzzing) skip it.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
