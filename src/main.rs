fn main() -> anyhow::Result<()> {
    swiftread_lib::run()
}
