fn main() {
    launchkit_lib::run()
}
