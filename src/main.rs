/// Entry point for the keygate shell
fn main() {
    // Log the panic and exit non-zero instead of unwinding through the runtime
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {:?}", panic_info);
        std::process::exit(1);
    }));

    keygate_lib::run();
}
